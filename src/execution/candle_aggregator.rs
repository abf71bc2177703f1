use crate::models::{Candle, Tick};
use chrono::{NaiveDateTime, NaiveTime, Timelike};

/// Builds fixed-interval OHLC candles from a tick stream
///
/// Closed candles are append-only. The in-progress candle is mutated in place
/// until a tick lands in a later bucket. Also tracks the day-high watermark:
/// the highest price seen up to `cutoff`, frozen after it.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    interval_secs: u32,
    cutoff: NaiveTime,
    closed: Vec<Candle>,
    current: Option<Candle>,
    day_high: Option<f64>,
}

impl CandleAggregator {
    /// Create a new aggregator
    ///
    /// # Arguments
    /// * `interval_minutes` - Candle length; must be non-zero
    /// * `cutoff` - Local time after which the day high is frozen
    pub fn new(interval_minutes: u32, cutoff: NaiveTime) -> Self {
        Self {
            interval_secs: interval_minutes.max(1) * 60,
            cutoff,
            closed: Vec::new(),
            current: None,
            day_high: None,
        }
    }

    /// Start of the bucket containing `timestamp`
    pub fn bucket_start(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        let secs = timestamp.time().num_seconds_from_midnight();
        let floored = secs - secs % self.interval_secs;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(floored, 0)
            .unwrap_or_default();
        timestamp.date().and_time(time)
    }

    /// Fold a tick into the current candle, rolling over on a new bucket
    pub fn ingest(&mut self, tick: &Tick) {
        let price = tick.last_price;
        let bucket = self.bucket_start(tick.timestamp);

        match self.current.as_mut() {
            Some(candle) if candle.bucket_start == bucket => candle.update(price, tick.volume),
            _ => {
                if let Some(finished) = self.current.take() {
                    tracing::debug!(
                        "Closed candle {} O={:.2} H={:.2} L={:.2} C={:.2}",
                        finished.bucket_start.format("%H:%M"),
                        finished.open,
                        finished.high,
                        finished.low,
                        finished.close
                    );
                    self.closed.push(finished);
                }
                self.current = Some(Candle::open_at(bucket, price, tick.volume));
            }
        }

        if tick.timestamp.time() <= self.cutoff {
            self.day_high = Some(match self.day_high {
                Some(high) => high.max(price),
                None => price,
            });
        }
    }

    /// Closes of the last `n` closed candles, plus the in-progress close
    ///
    /// Output length is at most `n + 1`; empty before the first tick.
    pub fn recent_closes(&self, n: usize) -> Vec<f64> {
        let skip = self.closed.len().saturating_sub(n);
        let mut closes: Vec<f64> = self.closed[skip..].iter().map(|c| c.close).collect();

        if let Some(current) = &self.current {
            closes.push(current.close);
        }

        closes
    }

    /// All closed candles, oldest first
    pub fn closed_candles(&self) -> &[Candle] {
        &self.closed
    }

    pub fn current_candle(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Highest price seen up to the cutoff, if any tick arrived before it
    pub fn day_high(&self) -> Option<f64> {
        self.day_high
    }

    /// Forget the watermark for a new trading session
    pub fn reset_day_high(&mut self) {
        self.day_high = None;
    }
}
