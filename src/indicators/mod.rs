// EWMA and MACD over closing prices

pub mod macd;
pub mod moving_average;

pub use macd::{compute_macd, MacdSeries, MacdState};
pub use moving_average::ewma_series;
