// Trading signal module
pub mod signals;

pub use signals::{detect_crossover, Crossover, SignalGenerator};
