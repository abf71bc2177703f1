use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Spot price observation for the underlying index
///
/// Timestamps are exchange-local wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: NaiveDateTime,
    pub last_price: f64,
    pub volume: u64,
}

/// OHLC bar covering one fixed-length bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub bucket_start: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    /// Start a fresh candle from the first tick of a bucket
    pub fn open_at(bucket_start: NaiveDateTime, price: f64, volume: u64) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Fold another tick of the same bucket into this candle
    pub fn update(&mut self, price: f64, volume: u64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }
}

/// Option side: call (CE) or put (PE)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptionSide {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl OptionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionSide::Call => "CE",
            OptionSide::Put => "PE",
        }
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ExitReason {
    StopLoss,
    Target,
    Forced(String), // External trigger, e.g. end of session
}

impl ExitReason {
    /// Result label written to the trade log
    pub fn label(&self) -> &str {
        match self {
            ExitReason::StopLoss => "SL Hit",
            ExitReason::Target => "Target Hit",
            ExitReason::Forced(reason) => reason,
        }
    }
}

/// Parameters of a simulated entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrder {
    pub side: OptionSide,
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub lots: u32,
}

/// Simulated option position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub side: OptionSide,
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub lots: u32,
    pub cost: f64, // entry_price * lots * contract_multiplier
    pub status: PositionStatus,
    pub opened_at: NaiveDateTime,
}

/// Immutable snapshot of a position at close time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub position_id: Uuid,
    pub side: OptionSide,
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub lots: u32,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    pub exit_price: f64,
    pub result: ExitReason,
    pub pnl: f64,
    pub capital_used: f64,
    pub running_pnl: f64,
}

/// Crossover signal emitted by the signal generator
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    pub side: OptionSide,
    pub histogram: f64, // macd - signal at the crossover point
    pub last_price: f64,
    pub day_high: f64,
}

/// Tradable option contract from the instrument list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub name: String,
    pub strike: f64,
    pub side: OptionSide,
    pub trading_symbol: String,
}

/// At-the-money contracts for a spot price
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtmSymbols {
    pub strike: f64,
    pub call: Option<String>,
    pub put: Option<String>,
}

impl AtmSymbols {
    pub fn symbol_for(&self, side: OptionSide) -> Option<&str> {
        match side {
            OptionSide::Call => self.call.as_deref(),
            OptionSide::Put => self.put.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_candle_update_keeps_bounds() {
        let mut candle = Candle::open_at(at(9, 15), 100.0, 10);
        candle.update(104.0, 5);
        candle.update(97.0, 5);
        candle.update(101.0, 1);

        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 104.0);
        assert_eq!(candle.low, 97.0);
        assert_eq!(candle.close, 101.0);
        assert_eq!(candle.volume, 21);
    }

    #[test]
    fn test_exit_reason_labels() {
        assert_eq!(ExitReason::StopLoss.label(), "SL Hit");
        assert_eq!(ExitReason::Target.label(), "Target Hit");
        assert_eq!(ExitReason::Forced("Session End".into()).label(), "Session End");
    }

    #[test]
    fn test_atm_symbol_lookup() {
        let atm = AtmSymbols {
            strike: 72000.0,
            call: Some("SENSEX72000CE".to_string()),
            put: None,
        };

        assert_eq!(atm.symbol_for(OptionSide::Call), Some("SENSEX72000CE"));
        assert_eq!(atm.symbol_for(OptionSide::Put), None);
        assert_eq!(OptionSide::Put.to_string(), "PE");
    }
}
