// Core modules
pub mod api;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use error::{ConfigError, PersistenceError, TradeError};
pub use models::*;
pub use settings::BotConfig;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
