use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use std::collections::HashMap;
use uuid::Uuid;

use super::{CandleAggregator, PositionBook, SessionSummary};
use crate::api::{InstrumentCatalog, InstrumentSource, QuoteSource};
use crate::indicators::compute_macd;
use crate::models::{EntryOrder, Tick, TradeRecord, TradeSignal};
use crate::persistence::{DailySummary, TradeSink};
use crate::settings::BotConfig;
use crate::strategy::SignalGenerator;

/// Result of one orchestration cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// Outside trading hours, nothing was touched
    MarketClosed,
    Completed(CycleReport),
}

#[derive(Debug)]
pub struct CycleReport {
    pub tick: Tick,
    pub closed: Vec<TradeRecord>,
    pub signal: Option<TradeSignal>,
    pub opened: Option<Uuid>,
    /// Cash plus open positions marked at this cycle's quotes
    pub equity: f64,
}

/// Current wall-clock time at the exchange
pub fn exchange_now(config: &BotConfig) -> NaiveDateTime {
    match config.utc_offset() {
        Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
        None => Utc::now().naive_utc(),
    }
}

/// Drives the paper-trading core, one cycle per timer tick
///
/// Cycle order: fetch spot → aggregate → exit checks → signal → entry.
/// Cycles must not overlap; `run_cycle` takes `&mut self`.
pub struct TradingBot<Q, I, S> {
    config: BotConfig,
    quotes: Q,
    instruments: I,
    sink: S,
    aggregator: CandleAggregator,
    signals: SignalGenerator,
    book: PositionBook,
    catalog: InstrumentCatalog,
    /// Candle in which the last entry was placed
    last_entry_bucket: Option<NaiveDateTime>,
    ran_cycle: bool,
    /// Stored daily row from before this process first wrote it
    day_baseline: Option<DailySummary>,
}

impl<Q, I, S> TradingBot<Q, I, S>
where
    Q: QuoteSource,
    I: InstrumentSource,
    S: TradeSink,
{
    pub fn new(config: BotConfig, quotes: Q, instruments: I, sink: S) -> Self {
        let aggregator =
            CandleAggregator::new(config.candle_interval_minutes, config.day_high_cutoff);
        let book = PositionBook::new(config.initial_capital, config.contract_multiplier);
        let catalog = InstrumentCatalog::new(config.underlying.clone(), config.strike_step);

        Self {
            config,
            quotes,
            instruments,
            sink,
            aggregator,
            signals: SignalGenerator::new(),
            book,
            catalog,
            last_entry_bucket: None,
            ran_cycle: false,
            day_baseline: None,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Weekday and within `market_open..=market_close`
    pub fn is_market_hours(&self, now: NaiveDateTime) -> bool {
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = now.time();
        self.config.market_open <= time && time <= self.config.market_close
    }

    /// Reset per-day state: day-high watermark and instrument cache
    pub fn start_session(&mut self) {
        self.aggregator.reset_day_high();
        self.catalog.invalidate();
        self.last_entry_bucket = None;
        tracing::info!("🔔 New trading session");
    }

    /// Run one full cycle at exchange time `now`
    ///
    /// Errors only when the spot tick cannot be fetched; everything after
    /// ingestion degrades to logging.
    pub async fn run_cycle(&mut self, now: NaiveDateTime) -> anyhow::Result<CycleOutcome> {
        if self.config.enforce_market_hours && !self.is_market_hours(now) {
            tracing::debug!("Market closed at {}", now.format("%a %H:%M:%S"));
            return Ok(CycleOutcome::MarketClosed);
        }

        let tick = self.quotes.spot().await?;
        self.aggregator.ingest(&tick);
        self.ran_cycle = true;

        let prices = self.quote_open_positions().await;
        let closed = match &prices {
            Some(prices) => self.check_exits(prices, now),
            None => Vec::new(),
        };

        let signal = self.evaluate_signal(&tick);
        let opened = match &signal {
            Some(signal) => self.enter(signal, tick.last_price, now).await,
            None => None,
        };
        if opened.is_some() {
            self.last_entry_bucket = self.aggregator.current_candle().map(|c| c.bucket_start);
        }

        let prices = prices.unwrap_or_default();
        let equity = self.book.equity(&prices);
        self.log_portfolio_summary(&tick, &prices);

        Ok(CycleOutcome::Completed(CycleReport {
            tick,
            closed,
            signal,
            opened,
            equity,
        }))
    }

    /// Quotes for every open symbol; None when the request fails
    async fn quote_open_positions(&self) -> Option<HashMap<String, f64>> {
        let symbols = self.book.open_symbols();
        if symbols.is_empty() {
            return Some(HashMap::new());
        }

        match self.quotes.quotes(&symbols).await {
            Ok(prices) => Some(prices),
            Err(e) => {
                tracing::warn!("Failed to fetch option quotes, skipping exit checks: {}", e);
                None
            }
        }
    }

    fn check_exits(
        &mut self,
        prices: &HashMap<String, f64>,
        now: NaiveDateTime,
    ) -> Vec<TradeRecord> {
        if self.book.open_positions().is_empty() {
            return Vec::new();
        }

        let closed = self.book.check_exits_at(prices, Some(now));
        self.persist_trades(&closed);
        closed
    }

    fn evaluate_signal(&self, tick: &Tick) -> Option<TradeSignal> {
        let bucket = self.aggregator.current_candle()?.bucket_start;
        if self.last_entry_bucket == Some(bucket) {
            tracing::debug!("Already entered in candle {}", bucket.format("%H:%M"));
            return None;
        }

        let closes = self.aggregator.recent_closes(self.config.lookback_candles);
        let series = compute_macd(&closes);
        let book = &self.book;

        self.signals.evaluate(
            &series,
            tick.last_price,
            self.aggregator.day_high(),
            |side| book.has_open_position(side),
        )
    }

    /// Place an ATM entry for a signal; None if any step is unavailable
    async fn enter(&mut self, signal: &TradeSignal, spot: f64, now: NaiveDateTime) -> Option<Uuid> {
        if !self.catalog.is_loaded() {
            if let Err(e) = self.catalog.refresh(&self.instruments).await {
                tracing::warn!("Failed to load instruments, skipping entry: {}", e);
                return None;
            }
        }

        let symbol = match self.catalog.atm_symbol(spot, signal.side) {
            Ok(symbol) => symbol,
            Err(e) => {
                tracing::warn!("No ATM contract for {} signal: {}", signal.side, e);
                return None;
            }
        };

        let entry_price = match self.quotes.quotes(std::slice::from_ref(&symbol)).await {
            Ok(prices) => prices.get(&symbol).copied(),
            Err(e) => {
                tracing::warn!("Failed to quote {}: {}", symbol, e);
                return None;
            }
        };
        let Some(entry_price) = entry_price else {
            tracing::warn!("No quote for {}, skipping entry", symbol);
            return None;
        };

        let order = EntryOrder {
            side: signal.side,
            symbol,
            entry_price,
            stop_loss: entry_price * (1.0 - self.config.stop_loss_pct),
            target: entry_price * (1.0 + self.config.target_pct),
            lots: self.config.lots,
        };

        match self.book.place_at(order, Some(now)) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Entry rejected: {}", e);
                None
            }
        }
    }

    /// Close everything at session end and fold this session into the daily summary
    pub async fn stop(&mut self, now: NaiveDateTime) -> SessionSummary {
        let symbols = self.book.open_symbols();
        let prices = if symbols.is_empty() {
            HashMap::new()
        } else {
            self.quotes.quotes(&symbols).await.unwrap_or_else(|e| {
                tracing::warn!("Failed to fetch closing quotes, closing at entry: {}", e);
                HashMap::new()
            })
        };

        let reason = self.config.force_close_reason.clone();
        let closed = self.book.force_close_all_at(&prices, &reason, Some(now));
        self.persist_trades(&closed);

        let summary = self.book.summary();
        self.write_daily_summary(now.date(), &summary);

        tracing::info!(
            "⏹ Session stopped: {} trades ({} won, {} lost), P&L {:.2}, capital {:.2}",
            summary.total_trades,
            summary.winning_trades,
            summary.losing_trades,
            summary.total_pnl,
            self.book.ledger().current_capital()
        );

        summary
    }

    /// Stored row for the day plus this process's totals
    ///
    /// Skipped when no cycle ran, so a run started after the close leaves the
    /// day untouched.
    fn write_daily_summary(&mut self, date: NaiveDate, session: &SessionSummary) {
        if !self.ran_cycle {
            tracing::info!("No cycles ran, leaving daily summary for {} untouched", date);
            return;
        }

        let baseline = match &self.day_baseline {
            Some(baseline) if baseline.date == date => baseline.clone(),
            _ => match self.sink.daily_summary(date) {
                Ok(stored) => {
                    let baseline = stored.unwrap_or_else(|| DailySummary::empty(date));
                    self.day_baseline = Some(baseline.clone());
                    baseline
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to read daily summary for {}, not overwriting: {}",
                        date,
                        e
                    );
                    return;
                }
            },
        };

        let daily = DailySummary {
            date,
            total_trades: baseline.total_trades + session.total_trades,
            total_pnl: baseline.total_pnl + session.total_pnl,
        };
        if let Err(e) = self.sink.record_daily_summary(&daily) {
            tracing::error!("Failed to write daily summary: {}", e);
        }
    }

    fn persist_trades(&mut self, records: &[TradeRecord]) {
        for record in records {
            if let Err(e) = self.sink.record_trade(record) {
                tracing::error!("Failed to log trade on {}: {}", record.symbol, e);
            }
        }
    }

    fn log_portfolio_summary(&self, tick: &Tick, prices: &HashMap<String, f64>) {
        tracing::info!(
            "💹 Spot {:.2} | day high {} | closes {} | open {} | capital {:.2} | realized {:.2} | unrealized {:.2} | equity {:.2}",
            tick.last_price,
            self.aggregator
                .day_high()
                .map(|h| format!("{:.2}", h))
                .unwrap_or_else(|| "-".to_string()),
            self.aggregator.closed_candles().len(),
            self.book.open_positions().len(),
            self.book.ledger().current_capital(),
            self.book.realized_pnl(),
            self.book.unrealized_pnl(prices),
            self.book.equity(prices)
        );
    }
}
