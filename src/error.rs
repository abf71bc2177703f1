use crate::models::OptionSide;

/// Rejections from the trading core
///
/// All of these are local and recoverable; none leaves state half-mutated.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("invalid entry: {reason}")]
    InvalidEntry { reason: String },

    #[error("instrument catalog not loaded, call refresh() first")]
    CatalogNotLoaded,

    #[error("no {side} instrument at strike {strike}")]
    NoInstrument { side: OptionSide, strike: f64 },
}

/// Trade log / daily summary write failures
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}
