//! SQLite adapter: bar history plus idempotent persistence of pattern
//! candidates, regime observations, and trading signals.
//!
//! All writes are `INSERT OR IGNORE` against the entity's uniqueness key,
//! so replayed bar-close events and re-scanned windows are no-ops.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::bar::Bar;
use crate::domain::error::TrendgateError;
use crate::domain::pattern::{Bias, PatternCandidate, PatternType};
use crate::domain::regime::RegimeObservation;
use crate::domain::signal::TradingSignal;
use crate::ports::bar_feed::BarFeed;
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_store::SignalStore;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: impl std::fmt::Display) -> TrendgateError {
    TrendgateError::Database {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TrendgateError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TrendgateError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TrendgateError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn initialize_schema(&self) -> Result<(), TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bars (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS pattern_candidates (
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                direction TEXT NOT NULL,
                confidence REAL NOT NULL,
                PRIMARY KEY (symbol, timestamp, pattern_type)
            );
            CREATE TABLE IF NOT EXISTS regime_observations (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                as_of TEXT NOT NULL,
                hurst REAL NOT NULL,
                atr REAL NOT NULL,
                regime TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe, as_of)
            );
            CREATE TABLE IF NOT EXISTS trading_signals (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL,
                position_size REAL NOT NULL,
                model_probability REAL NOT NULL,
                regime TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe, timestamp)
            );",
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Bulk-load bars; existing (symbol, timeframe, timestamp) rows are
    /// left untouched. Returns the number of newly inserted rows.
    pub fn insert_bars(&self, timeframe: &str, bars: &[Bar]) -> Result<usize, TrendgateError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(db_err)?;
        let mut inserted = 0usize;

        for bar in bars {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO bars
                     (symbol, timeframe, timestamp, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        bar.symbol,
                        timeframe,
                        bar.timestamp.to_rfc3339(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume,
                    ],
                )
                .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(inserted)
    }

    /// Persisted signal count for one (symbol, timeframe) pair.
    pub fn count_signals(&self, symbol: &str, timeframe: &str) -> Result<usize, TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM trading_signals WHERE symbol = ?1 AND timeframe = ?2",
                params![symbol, timeframe],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Stored candidates for a symbol, ascending by timestamp.
    pub fn candidates(&self, symbol: &str) -> Result<Vec<PatternCandidate>, TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, timestamp, pattern_type, direction, confidence
                 FROM pattern_candidates WHERE symbol = ?1
                 ORDER BY timestamp, pattern_type",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(db_err)?;

        let mut candidates = Vec::new();
        for row in rows {
            let (symbol, timestamp, pattern_type, direction, confidence) = row.map_err(db_err)?;
            candidates.push(PatternCandidate {
                symbol,
                timestamp: parse_ts(&timestamp)?,
                pattern_type: PatternType::parse(&pattern_type).ok_or_else(|| {
                    db_err(format!("unknown pattern_type {pattern_type}"))
                })?,
                direction: Bias::parse(&direction)
                    .ok_or_else(|| db_err(format!("unknown direction {direction}")))?,
                confidence,
            });
        }
        Ok(candidates)
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, TrendgateError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| db_err(format!("bad timestamp {raw}: {e}")))
}

impl BarFeed for SqliteAdapter {
    fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, timestamp, open, high, low, close, volume
                 FROM bars
                 WHERE symbol = ?1 AND timeframe = ?2 AND timestamp >= ?3 AND timestamp <= ?4
                 ORDER BY timestamp",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(
                params![symbol, timeframe, start.to_rfc3339(), end.to_rfc3339()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, f64>(6)?,
                    ))
                },
            )
            .map_err(db_err)?;

        let mut bars = Vec::new();
        for row in rows {
            let (symbol, timestamp, open, high, low, close, volume) = row.map_err(db_err)?;
            bars.push(Bar {
                symbol,
                timestamp: parse_ts(&timestamp)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        let row: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp), COUNT(*)
                 FROM bars WHERE symbol = ?1 AND timeframe = ?2",
                params![symbol, timeframe],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(db_err)?;

        Ok(match row {
            (Some(min), Some(max), count) if count > 0 => {
                Some((parse_ts(&min)?, parse_ts(&max)?, count as usize))
            }
            _ => None,
        })
    }
}

impl SignalStore for SqliteAdapter {
    fn upsert_candidate(&self, candidate: &PatternCandidate) -> Result<bool, TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO pattern_candidates
                 (symbol, timestamp, pattern_type, direction, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    candidate.symbol,
                    candidate.timestamp.to_rfc3339(),
                    candidate.pattern_type.as_str(),
                    candidate.direction.as_str(),
                    candidate.confidence,
                ],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    fn save_signal(&self, signal: &TradingSignal) -> Result<bool, TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO trading_signals
                 (symbol, timeframe, timestamp, direction, entry_price, stop_loss,
                  take_profit, position_size, model_probability, regime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    signal.symbol,
                    signal.timeframe,
                    signal.timestamp.to_rfc3339(),
                    signal.direction.as_str(),
                    signal.entry_price,
                    signal.stop_loss,
                    signal.take_profit,
                    signal.position_size,
                    signal.model_probability,
                    signal.regime.as_str(),
                ],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    fn save_regime(&self, observation: &RegimeObservation) -> Result<(), TrendgateError> {
        let conn = self.pool.get().map_err(db_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO regime_observations
             (symbol, timeframe, as_of, hurst, atr, regime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                observation.symbol,
                observation.timeframe,
                observation.as_of.to_rfc3339(),
                observation.hurst,
                observation.atr,
                observation.regime.as_str(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}
