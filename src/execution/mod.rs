// Candle aggregation, position bookkeeping and the cycle driver
pub mod bot;
pub mod candle_aggregator;
pub mod position_book;

pub use bot::{exchange_now, CycleOutcome, CycleReport, TradingBot};
pub use candle_aggregator::CandleAggregator;
pub use position_book::{CapitalLedger, PositionBook, SessionSummary};
