//! Domain error types.

/// Top-level error type for trendgate.
#[derive(Debug, thiserror::Error)]
pub enum TrendgateError {
    #[error("insufficient history for {symbol}: have {have} bars, need {need}")]
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("no active model for asset class {asset_class}")]
    NoActiveModel { asset_class: String },

    #[error("model {version} hash mismatch: registered {expected}, artifact {actual}")]
    HashMismatch {
        version: String,
        expected: String,
        actual: String,
    },

    #[error("model {version} is invalid: {reason}")]
    ModelInvalid { version: String, reason: String },

    #[error("degenerate stop distance from atr {atr}")]
    DegenerateStop { atr: f64 },

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TrendgateError> for std::process::ExitCode {
    fn from(err: &TrendgateError) -> Self {
        let code: u8 = match err {
            TrendgateError::Io(_) => 1,
            TrendgateError::ConfigParse { .. }
            | TrendgateError::ConfigMissing { .. }
            | TrendgateError::ConfigInvalid { .. } => 2,
            TrendgateError::Database { .. } => 3,
            TrendgateError::NoActiveModel { .. }
            | TrendgateError::HashMismatch { .. }
            | TrendgateError::ModelInvalid { .. } => 4,
            TrendgateError::InsufficientHistory { .. }
            | TrendgateError::DataUnavailable { .. }
            | TrendgateError::DegenerateStop { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_history() {
        let err = TrendgateError::InsufficientHistory {
            symbol: "XAUUSD".into(),
            have: 40,
            need: 100,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history for XAUUSD: have 40 bars, need 100"
        );
    }

    #[test]
    fn display_hash_mismatch() {
        let err = TrendgateError::HashMismatch {
            version: "1.2.0".into(),
            expected: "aaaa".into(),
            actual: "bbbb".into(),
        };
        assert!(err.to_string().contains("1.2.0"));
        assert!(err.to_string().contains("aaaa"));
    }

    #[test]
    fn exit_codes_by_class() {
        use std::process::ExitCode;

        let config = TrendgateError::ConfigMissing {
            section: "risk".into(),
            key: "risk_fraction".into(),
        };
        assert_eq!(ExitCode::from(&config), ExitCode::from(2));

        let model = TrendgateError::NoActiveModel {
            asset_class: "commodity".into(),
        };
        assert_eq!(ExitCode::from(&model), ExitCode::from(4));

        let data = TrendgateError::DataUnavailable {
            symbol: "XAUUSD".into(),
            reason: "feed down".into(),
        };
        assert_eq!(ExitCode::from(&data), ExitCode::from(5));
    }
}
