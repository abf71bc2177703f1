use crate::error::ConfigError;
use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime configuration for the paper-trading bot
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub initial_capital: f64,
    pub contract_multiplier: f64, // Units per lot
    pub lots: u32,
    pub candle_interval_minutes: u32,
    pub day_high_cutoff: NaiveTime,
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    pub enforce_market_hours: bool,
    pub utc_offset_minutes: i32, // Exchange local time (IST = +330)
    pub poll_interval_secs: u64,
    pub lookback_candles: usize,
    pub stop_loss_pct: f64,
    pub target_pct: f64,
    pub underlying: String,
    pub strike_step: f64,
    pub trade_log_path: String,
    pub daily_summary_path: String,
    pub force_close_reason: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            contract_multiplier: 25.0,
            lots: 2,
            candle_interval_minutes: 15,
            day_high_cutoff: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            market_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            enforce_market_hours: true,
            utc_offset_minutes: 330,
            poll_interval_secs: 10,
            lookback_candles: 50,
            stop_loss_pct: 0.20,
            target_pct: 0.40,
            underlying: "SENSEX".to_string(),
            strike_step: 100.0,
            trade_log_path: "trade_log.csv".to_string(),
            daily_summary_path: "daily_summary.csv".to_string(),
            force_close_reason: "Session End".to_string(),
        }
    }
}

impl BotConfig {
    /// Load from an optional TOML file, then `OPTIONBOT_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(::config::Environment::with_prefix("OPTIONBOT").try_parsing(true))
            .build()?;

        let config: BotConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_string(),
            })
        };

        if self.initial_capital <= 0.0 {
            return invalid("initial_capital must be positive");
        }
        if self.contract_multiplier <= 0.0 {
            return invalid("contract_multiplier must be positive");
        }
        if self.lots == 0 {
            return invalid("lots must be at least 1");
        }
        if self.candle_interval_minutes == 0 || (24 * 60) % self.candle_interval_minutes != 0 {
            return invalid("candle_interval_minutes must divide a day");
        }
        if self.stop_loss_pct <= 0.0 || self.stop_loss_pct >= 1.0 {
            return invalid("stop_loss_pct must be in (0, 1)");
        }
        if self.target_pct <= 0.0 {
            return invalid("target_pct must be positive");
        }
        if self.strike_step <= 0.0 {
            return invalid("strike_step must be positive");
        }
        if self.market_open >= self.market_close {
            return invalid("market_open must be before market_close");
        }
        if self.utc_offset().is_none() {
            return invalid("utc_offset_minutes out of range");
        }

        Ok(())
    }

    /// Exchange timezone as a fixed offset
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.contract_multiplier, 25.0);
        assert_eq!(config.candle_interval_minutes, 15);
        assert_eq!(config.day_high_cutoff, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn test_rejects_interval_not_dividing_day() {
        let config = BotConfig {
            candle_interval_minutes: 7,
            ..BotConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_lots() {
        let config = BotConfig {
            lots: 0,
            ..BotConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "initial_capital = 35000.0").unwrap();
        writeln!(file, "lots = 4").unwrap();
        writeln!(file, "day_high_cutoff = \"09:45:00\"").unwrap();

        let config = BotConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.initial_capital, 35000.0);
        assert_eq!(config.lots, 4);
        assert_eq!(config.day_high_cutoff, NaiveTime::from_hms_opt(9, 45, 0).unwrap());
        // Untouched fields keep defaults
        assert_eq!(config.underlying, "SENSEX");
    }
}
