use crate::indicators::macd::{MacdSeries, DEFAULT_SLOW};
use crate::models::{OptionSide, TradeSignal};

/// Crossover direction of MACD against its signal line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossover {
    Bullish,
    Bearish,
}

impl Crossover {
    /// Option side a crossover trades: calls on bullish, puts on bearish
    pub fn side(&self) -> OptionSide {
        match self {
            Crossover::Bullish => OptionSide::Call,
            Crossover::Bearish => OptionSide::Put,
        }
    }
}

/// Detect a crossover between the last two points of the histogram
///
/// `<= 0` to `> 0` is bullish, `>= 0` to `< 0` is bearish.
pub fn detect_crossover(series: &MacdSeries) -> Option<Crossover> {
    let histogram = series.histogram();
    let [prev, curr] = histogram.get(histogram.len().checked_sub(2)?..)? else {
        return None;
    };

    if *prev <= 0.0 && *curr > 0.0 {
        Some(Crossover::Bullish)
    } else if *prev >= 0.0 && *curr < 0.0 {
        Some(Crossover::Bearish)
    } else {
        None
    }
}

/// MACD crossover signals gated by a day-high breakout filter
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    min_closes: usize,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self {
            min_closes: DEFAULT_SLOW,
        }
    }
}

impl SignalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum number of closes before a signal can fire
    pub fn min_closes(&self) -> usize {
        self.min_closes
    }

    /// Evaluate the latest indicator values; at most one signal per call
    ///
    /// A bullish crossover fires CE only if `last_price > day_high`; a bearish
    /// one fires PE only if `last_price < day_high`. No signal when history is
    /// too short, there is no crossover, the filter rejects, no watermark is
    /// known yet, or a position is already open on that side.
    pub fn evaluate(
        &self,
        series: &MacdSeries,
        last_price: f64,
        day_high: Option<f64>,
        has_open_position: impl Fn(OptionSide) -> bool,
    ) -> Option<TradeSignal> {
        if series.len() < self.min_closes {
            tracing::debug!(
                "Collecting data... ({}/{} closes)",
                series.len(),
                self.min_closes
            );
            return None;
        }

        let crossover = detect_crossover(series)?;
        let histogram = series.macd.last()? - series.signal.last()?;

        let Some(day_high) = day_high else {
            tracing::debug!("{:?} crossover ignored: no day high recorded", crossover);
            return None;
        };

        let breakout = match crossover {
            Crossover::Bullish => last_price > day_high,
            Crossover::Bearish => last_price < day_high,
        };
        if !breakout {
            tracing::debug!(
                "{:?} crossover rejected by filter: price {:.2} vs day high {:.2}",
                crossover,
                last_price,
                day_high
            );
            return None;
        }

        let side = crossover.side();
        if has_open_position(side) {
            tracing::debug!("{:?} crossover skipped: {} position already open", crossover, side);
            return None;
        }

        tracing::info!(
            "📶 {:?} crossover → {} signal (hist={:.4}, price={:.2}, day high={:.2})",
            crossover,
            side,
            histogram,
            last_price,
            day_high
        );

        Some(TradeSignal {
            side,
            histogram,
            last_price,
            day_high,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Series of `len` points whose histogram ends with `prev`, `curr`
    fn series_ending(len: usize, prev: f64, curr: f64) -> MacdSeries {
        let mut macd = vec![0.0; len];
        let signal = vec![0.0; len];
        macd[len - 2] = prev;
        macd[len - 1] = curr;
        MacdSeries { macd, signal }
    }

    fn none_open(_: OptionSide) -> bool {
        false
    }

    #[test]
    fn test_detect_crossover() {
        assert_eq!(detect_crossover(&series_ending(5, -1.0, 1.0)), Some(Crossover::Bullish));
        assert_eq!(detect_crossover(&series_ending(5, 0.0, 0.5)), Some(Crossover::Bullish));
        assert_eq!(detect_crossover(&series_ending(5, 1.0, -1.0)), Some(Crossover::Bearish));
        assert_eq!(detect_crossover(&series_ending(5, 0.0, -0.5)), Some(Crossover::Bearish));
        assert_eq!(detect_crossover(&series_ending(5, 1.0, 2.0)), None);
        assert_eq!(detect_crossover(&series_ending(5, -1.0, -2.0)), None);
        assert_eq!(detect_crossover(&series_ending(5, 0.0, 0.0)), None);
        assert_eq!(detect_crossover(&MacdSeries::default()), None);
    }

    #[test]
    fn test_bullish_breakout_fires_call() {
        let generator = SignalGenerator::new();
        let signal = generator
            .evaluate(&series_ending(30, -0.5, 0.5), 110.0, Some(100.0), none_open)
            .unwrap();

        assert_eq!(signal.side, OptionSide::Call);
        assert_eq!(signal.histogram, 0.5);
        assert_eq!(signal.day_high, 100.0);
    }

    #[test]
    fn test_bearish_breakdown_fires_put() {
        let generator = SignalGenerator::new();
        let signal = generator
            .evaluate(&series_ending(30, 0.5, -0.5), 90.0, Some(100.0), none_open)
            .unwrap();

        assert_eq!(signal.side, OptionSide::Put);
    }

    #[test]
    fn test_filter_rejects_without_breakout() {
        let generator = SignalGenerator::new();
        // Bullish but below day high
        assert!(generator
            .evaluate(&series_ending(30, -0.5, 0.5), 99.0, Some(100.0), none_open)
            .is_none());
        // Bearish but above day high
        assert!(generator
            .evaluate(&series_ending(30, 0.5, -0.5), 101.0, Some(100.0), none_open)
            .is_none());
        // Equal to the watermark is not a breakout either way
        assert!(generator
            .evaluate(&series_ending(30, -0.5, 0.5), 100.0, Some(100.0), none_open)
            .is_none());
    }

    #[test]
    fn test_no_signal_without_day_high() {
        let generator = SignalGenerator::new();
        assert!(generator
            .evaluate(&series_ending(30, -0.5, 0.5), 110.0, None, none_open)
            .is_none());
    }

    #[test]
    fn test_insufficient_history() {
        let generator = SignalGenerator::new();
        assert!(generator
            .evaluate(&series_ending(25, -0.5, 0.5), 110.0, Some(100.0), none_open)
            .is_none());
        assert!(generator
            .evaluate(&series_ending(26, -0.5, 0.5), 110.0, Some(100.0), none_open)
            .is_some());
    }

    #[test]
    fn test_open_position_on_same_side_blocks_signal() {
        let generator = SignalGenerator::new();
        let calls_open = |side: OptionSide| side == OptionSide::Call;

        assert!(generator
            .evaluate(&series_ending(30, -0.5, 0.5), 110.0, Some(100.0), calls_open)
            .is_none());
        // Opposite side is unaffected
        assert!(generator
            .evaluate(&series_ending(30, 0.5, -0.5), 90.0, Some(100.0), calls_open)
            .is_some());
    }
}
