//! CLI definition and dispatch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvBarFeed;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::model_file_adapter::FileModelRegistry;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::backtest;
use crate::domain::config;
use crate::domain::error::TrendgateError;
use crate::domain::model::ModelGateway;
use crate::domain::pattern;
use crate::domain::regime;
use crate::domain::signal::Decision;
use crate::pipeline::DecisionRunner;
use crate::ports::bar_feed::BarFeed;
use crate::ports::config_port::ConfigPort;
use crate::training::dataset;

#[derive(Parser, Debug)]
#[command(name = "trendgate", about = "Regime-gated trading signal pipeline and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the decision chain over history and report performance
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Write the full JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one live decision for a bar-close event
    Decide {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
        /// Bar-close timestamp; defaults to the latest stored bar
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Classify the current market regime
    Regime {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Scan a bar range for pattern candidates
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Export a triple-barrier training dataset as CSV
    Label {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Load a CSV bar file into the SQLite store
    #[cfg(feature = "sqlite")]
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
    },
    /// Manage the model registry
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Show the stored data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "H1")]
        timeframe: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelAction {
    /// Register a model artifact (inactive)
    Register {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        file: String,
        #[arg(long)]
        asset_class: Option<String>,
    },
    /// Activate a registered model version
    Activate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        version: String,
    },
    /// List registered models
    List {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            timeframe,
            start,
            end,
            output,
        } => run_backtest(&config, &symbol, &timeframe, start, end, output),
        Command::Decide {
            config,
            symbol,
            timeframe,
            as_of,
        } => run_decide(&config, &symbol, &timeframe, as_of),
        Command::Regime {
            config,
            symbol,
            timeframe,
            as_of,
        } => run_regime(&config, &symbol, &timeframe, as_of),
        Command::Scan {
            config,
            symbol,
            timeframe,
            start,
            end,
        } => run_scan(&config, &symbol, &timeframe, start, end),
        Command::Label {
            config,
            symbol,
            timeframe,
            output,
        } => run_label(&config, &symbol, &timeframe, &output),
        #[cfg(feature = "sqlite")]
        Command::Ingest {
            config,
            file,
            symbol,
            timeframe,
        } => run_ingest(&config, &file, &symbol, &timeframe),
        Command::Model { action } => run_model(action),
        Command::Info {
            config,
            symbol,
            timeframe,
        } => run_info(&config, &symbol, &timeframe),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            (&err).into()
        }
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, TrendgateError> {
    FileConfigAdapter::from_file(path).map_err(|e| TrendgateError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

enum DataBackend {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteAdapter),
    Csv(CsvBarFeed),
}

impl DataBackend {
    fn from_config(config: &dyn ConfigPort) -> Result<Self, TrendgateError> {
        let default_source = if cfg!(feature = "sqlite") { "sqlite" } else { "csv" };
        let source = config
            .get_string("data", "source")
            .unwrap_or_else(|| default_source.to_string());

        match source.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(DataBackend::Sqlite(SqliteAdapter::from_config(config)?)),
            "csv" => {
                let dir = config.get_string("data", "csv_dir").ok_or_else(|| {
                    TrendgateError::ConfigMissing {
                        section: "data".into(),
                        key: "csv_dir".into(),
                    }
                })?;
                Ok(DataBackend::Csv(CsvBarFeed::new(PathBuf::from(dir))))
            }
            other => Err(TrendgateError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: format!("unknown source {other}"),
            }),
        }
    }

    fn feed(&self) -> &dyn BarFeed {
        match self {
            #[cfg(feature = "sqlite")]
            DataBackend::Sqlite(adapter) => adapter,
            DataBackend::Csv(feed) => feed,
        }
    }
}

fn build_registry(config: &dyn ConfigPort) -> Result<FileModelRegistry, TrendgateError> {
    let path =
        config
            .get_string("model", "registry_path")
            .ok_or_else(|| TrendgateError::ConfigMissing {
                section: "model".into(),
                key: "registry_path".into(),
            })?;
    Ok(FileModelRegistry::new(PathBuf::from(path)))
}

fn asset_class(config: &dyn ConfigPort) -> String {
    config
        .get_string("model", "asset_class")
        .unwrap_or_else(|| "commodity".to_string())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, TrendgateError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(start) = date.and_hms_opt(0, 0, 0) {
            return Ok(start.and_utc());
        }
    }
    Err(TrendgateError::ConfigInvalid {
        section: "cli".into(),
        key: "timestamp".into(),
        reason: format!("cannot parse {raw}"),
    })
}

fn resolve_range(
    feed: &dyn BarFeed,
    symbol: &str,
    timeframe: &str,
    start: Option<String>,
    end: Option<String>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), TrendgateError> {
    let stored = feed.data_range(symbol, timeframe)?;
    let (first, last) = match stored {
        Some((first, last, _)) => (first, last),
        None => {
            return Err(TrendgateError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no bars stored for {timeframe}"),
            });
        }
    };

    let start = match start {
        Some(raw) => parse_time(&raw)?,
        None => first,
    };
    let end = match end {
        Some(raw) => parse_time(&raw)?,
        None => last,
    };
    Ok((start, end))
}

fn run_backtest(
    config_path: &PathBuf,
    symbol: &str,
    timeframe: &str,
    start: Option<String>,
    end: Option<String>,
    output: Option<PathBuf>,
) -> Result<(), TrendgateError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let decision_cfg = config::decision_config(&adapter)?;
    let backtest_cfg = config::backtest_config(&adapter)?;

    let backend = DataBackend::from_config(&adapter)?;
    let (start, end) = resolve_range(backend.feed(), symbol, timeframe, start, end)?;
    eprintln!("Fetching {symbol} {timeframe} bars {start} .. {end}");
    let bars = backend.feed().fetch(symbol, timeframe, start, end)?;

    let registry = build_registry(&adapter)?;
    let gateway = ModelGateway::new(&registry, &asset_class(&adapter));

    eprintln!("Replaying {} bars", bars.len());
    let report = backtest::run(symbol, timeframe, &bars, &gateway, &decision_cfg, &backtest_cfg)?;

    println!("trades:            {}", report.trade_count);
    println!("win rate:          {:.1}%", report.win_rate * 100.0);
    println!("total return:      {:.2}%", report.total_return * 100.0);
    println!("annualized return: {:.2}%", report.annualized_return * 100.0);
    println!("max drawdown:      {:.2}%", report.max_drawdown * 100.0);
    println!("profit factor:     {:.2}", report.profit_factor);
    println!("final balance:     {:.2}", report.final_balance);
    if !report.rejection_counts.is_empty() {
        println!("rejections:");
        for (reason, count) in &report.rejection_counts {
            println!("  {reason}: {count}");
        }
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report).map_err(|e| TrendgateError::Database {
            reason: format!("cannot serialize report: {e}"),
        })?;
        fs::write(&path, json)?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_decide(
    config_path: &PathBuf,
    symbol: &str,
    timeframe: &str,
    as_of: Option<String>,
) -> Result<(), TrendgateError> {
    let adapter = load_config(config_path)?;
    let decision_cfg = config::decision_config(&adapter)?;
    let lookback = adapter.get_int("decision", "lookback_bars", 300).max(1) as usize;

    let store = SqliteAdapter::from_config(&adapter)?;
    let registry = build_registry(&adapter)?;
    let gateway = ModelGateway::new(&registry, &asset_class(&adapter));

    let as_of = match as_of {
        Some(raw) => parse_time(&raw)?,
        None => match store.data_range(symbol, timeframe)? {
            Some((_, last, _)) => last,
            None => {
                return Err(TrendgateError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: format!("no bars stored for {timeframe}"),
                });
            }
        },
    };

    let runner = DecisionRunner::new(&store, &store, gateway, decision_cfg, lookback);
    match runner.run_decision(symbol, timeframe, as_of)? {
        Decision::Emitted(signal) => {
            println!(
                "SIGNAL {} {} @ {}: entry={:.5} stop={:.5} target={:.5} size={:.4} p={:.3}",
                signal.direction,
                signal.symbol,
                signal.timestamp,
                signal.entry_price,
                signal.stop_loss,
                signal.take_profit,
                signal.position_size,
                signal.model_probability,
            );
        }
        Decision::Rejected { timestamp, reason } => {
            println!("REJECTED {symbol} @ {timestamp}: {reason}");
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_decide(
    _config_path: &PathBuf,
    _symbol: &str,
    _timeframe: &str,
    _as_of: Option<String>,
) -> Result<(), TrendgateError> {
    Err(TrendgateError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "decide requires the sqlite feature for signal persistence".into(),
    })
}

fn run_regime(
    config_path: &PathBuf,
    symbol: &str,
    timeframe: &str,
    as_of: Option<String>,
) -> Result<(), TrendgateError> {
    let adapter = load_config(config_path)?;
    let regime_cfg = config::regime_config(&adapter)?;
    let backend = DataBackend::from_config(&adapter)?;

    let (start, end) = resolve_range(backend.feed(), symbol, timeframe, None, as_of)?;
    let bars = backend.feed().fetch(symbol, timeframe, start, end)?;
    let observation = regime::classify(symbol, timeframe, &bars, &regime_cfg)?;

    println!(
        "{} {} @ {}: regime={} hurst={:.3} atr={:.5}",
        observation.symbol,
        observation.timeframe,
        observation.as_of,
        observation.regime,
        observation.hurst,
        observation.atr,
    );
    Ok(())
}

fn run_scan(
    config_path: &PathBuf,
    symbol: &str,
    timeframe: &str,
    start: Option<String>,
    end: Option<String>,
) -> Result<(), TrendgateError> {
    let adapter = load_config(config_path)?;
    let pattern_cfg = config::pattern_config(&adapter)?;
    let backend = DataBackend::from_config(&adapter)?;

    let (start, end) = resolve_range(backend.feed(), symbol, timeframe, start, end)?;
    let bars = backend.feed().fetch(symbol, timeframe, start, end)?;
    let candidates = pattern::scan(symbol, &bars, &pattern_cfg);

    for candidate in &candidates {
        println!(
            "{} {} {} conf={:.2}",
            candidate.timestamp,
            candidate.pattern_type,
            candidate.direction.as_str(),
            candidate.confidence,
        );
    }
    eprintln!("{} candidates in {} bars", candidates.len(), bars.len());

    // with a SQLite backend the scan is also persisted, idempotently
    #[cfg(feature = "sqlite")]
    if let DataBackend::Sqlite(store) = &backend {
        use crate::ports::signal_store::SignalStore;
        let mut fresh = 0usize;
        for candidate in &candidates {
            if store.upsert_candidate(candidate)? {
                fresh += 1;
            }
        }
        eprintln!("{fresh} new candidates persisted");
    }
    Ok(())
}

fn run_label(
    config_path: &PathBuf,
    symbol: &str,
    timeframe: &str,
    output: &PathBuf,
) -> Result<(), TrendgateError> {
    let adapter = load_config(config_path)?;
    let label_cfg = config::label_config(&adapter)?;
    let backend = DataBackend::from_config(&adapter)?;

    let (start, end) = resolve_range(backend.feed(), symbol, timeframe, None, None)?;
    let bars = backend.feed().fetch(symbol, timeframe, start, end)?;

    eprintln!("Labeling {} bars", bars.len());
    let rows = dataset::build(symbol, timeframe, &bars, &label_cfg)?;
    let file = fs::File::create(output)?;
    dataset::write_csv(&rows, file)?;
    eprintln!("{} rows written to {}", rows.len(), output.display());
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_ingest(
    config_path: &PathBuf,
    file: &PathBuf,
    symbol: &str,
    timeframe: &str,
) -> Result<(), TrendgateError> {
    let adapter = load_config(config_path)?;
    let store = SqliteAdapter::from_config(&adapter)?;

    let bars = crate::adapters::csv_adapter::load_bars(file, symbol)?;
    let inserted = store.insert_bars(timeframe, &bars)?;
    println!("{} bars read, {} inserted", bars.len(), inserted);
    Ok(())
}

fn run_model(action: ModelAction) -> Result<(), TrendgateError> {
    match action {
        ModelAction::Register {
            config,
            file,
            asset_class: class,
        } => {
            let adapter = load_config(&config)?;
            let registry = build_registry(&adapter)?;
            let class = class.unwrap_or_else(|| asset_class(&adapter));
            let handle = registry.register(&file, &class)?;
            println!("registered {} ({})", handle.version, handle.file_hash);
        }
        ModelAction::Activate { config, version } => {
            let adapter = load_config(&config)?;
            let registry = build_registry(&adapter)?;
            let handle = registry.activate(&version)?;
            println!("active: {} ({})", handle.version, handle.asset_class);
        }
        ModelAction::List { config } => {
            let adapter = load_config(&config)?;
            let registry = build_registry(&adapter)?;
            for handle in registry.list()? {
                println!(
                    "{} {} {} {}",
                    handle.version,
                    handle.asset_class,
                    if handle.is_active { "active" } else { "inactive" },
                    handle.file_hash,
                );
            }
        }
    }
    Ok(())
}

fn run_info(
    config_path: &PathBuf,
    symbol: &str,
    timeframe: &str,
) -> Result<(), TrendgateError> {
    let adapter = load_config(config_path)?;
    let backend = DataBackend::from_config(&adapter)?;
    match backend.feed().data_range(symbol, timeframe)? {
        Some((first, last, count)) => {
            println!("{symbol} {timeframe}: {count} bars, {first} .. {last}");
        }
        None => println!("{symbol} {timeframe}: no data"),
    }
    Ok(())
}
