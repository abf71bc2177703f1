use super::moving_average::{ewma_alpha, ewma_series};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// MACD line and its signal line, index-aligned with the input closes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
}

impl MacdSeries {
    pub fn len(&self) -> usize {
        self.macd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macd.is_empty()
    }

    /// macd - signal at each point
    pub fn histogram(&self) -> Vec<f64> {
        self.macd
            .iter()
            .zip(&self.signal)
            .map(|(m, s)| m - s)
            .collect()
    }
}

/// MACD(12, 26, 9) over a closing-price series
///
/// Never fails on short input; output shorter than the slow span is not
/// meaningful and callers must check the length before acting on it.
pub fn compute_macd(closes: &[f64]) -> MacdSeries {
    compute_macd_with(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

pub fn compute_macd_with(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ewma_series(closes, fast);
    let slow_ema = ewma_series(closes, slow);

    let macd: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal = ewma_series(&macd, signal);

    MacdSeries { macd, signal }
}

/// Running MACD that updates one close at a time
///
/// Produces the same values as `compute_macd` over the full history, without
/// re-walking it every cycle.
#[derive(Debug, Clone, Default)]
pub struct MacdState {
    fast: Option<f64>,
    slow: Option<f64>,
    signal: Option<f64>,
    count: usize,
}

impl MacdState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next close; returns the updated (macd, signal)
    pub fn update(&mut self, close: f64) -> (f64, f64) {
        let step = |prev: Option<f64>, value: f64, span: usize| match prev {
            Some(prev) => {
                let alpha = ewma_alpha(span);
                alpha * value + (1.0 - alpha) * prev
            }
            None => value,
        };

        let fast = step(self.fast, close, DEFAULT_FAST);
        let slow = step(self.slow, close, DEFAULT_SLOW);
        let macd = fast - slow;
        let signal = step(self.signal, macd, DEFAULT_SIGNAL);

        self.fast = Some(fast);
        self.slow = Some(slow);
        self.signal = Some(signal);
        self.count += 1;

        (macd, signal)
    }

    /// Number of closes folded in so far
    pub fn count(&self) -> usize {
        self.count
    }
}
