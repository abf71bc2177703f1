use crate::error::PersistenceError;
use crate::models::TradeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Destination for closed trades and end-of-day totals
///
/// Writes are best-effort from the bot's point of view: a failure is logged
/// and never rolls back the in-memory ledger.
pub trait TradeSink {
    fn record_trade(&mut self, record: &TradeRecord) -> Result<(), PersistenceError>;

    fn record_daily_summary(&mut self, summary: &DailySummary) -> Result<(), PersistenceError>;

    /// Row already stored for `date`, if any
    fn daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>, PersistenceError>;
}

/// One row per calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_trades: usize,
    pub total_pnl: f64,
}

impl DailySummary {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_trades: 0,
            total_pnl: 0.0,
        }
    }
}

/// Trade log row layout
#[derive(Debug, Serialize, Deserialize)]
struct TradeLogRow {
    timestamp: String,
    side: String,
    symbol: String,
    entry: f64,
    stop_loss: f64,
    target: f64,
    exit: f64,
    result_label: String,
    pnl: f64,
    capital_used: f64,
    lots: u32,
    running_pnl: f64,
}

impl From<&TradeRecord> for TradeLogRow {
    fn from(record: &TradeRecord) -> Self {
        Self {
            timestamp: record.closed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            side: record.side.to_string(),
            symbol: record.symbol.clone(),
            entry: record.entry_price,
            stop_loss: record.stop_loss,
            target: record.target,
            exit: record.exit_price,
            result_label: record.result.label().to_string(),
            pnl: record.pnl,
            capital_used: record.capital_used,
            lots: record.lots,
            running_pnl: record.running_pnl,
        }
    }
}

const TRADE_LOG_HEADER: [&str; 12] = [
    "timestamp",
    "side",
    "symbol",
    "entry",
    "stop_loss",
    "target",
    "exit",
    "result_label",
    "pnl",
    "capital_used",
    "lots",
    "running_pnl",
];

/// Append-only CSV of closed trades, restarted each session
pub struct TradeLog {
    path: PathBuf,
}

impl TradeLog {
    /// Truncate `path` and write the header row
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(TRADE_LOG_HEADER)?;
        writer.flush()?;

        tracing::info!("Started trade log at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &TradeRecord) -> Result<(), PersistenceError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(TradeLogRow::from(record))?;
        writer.flush()?;
        Ok(())
    }

    /// Number of trade rows written so far
    pub fn row_count(&self) -> Result<usize, PersistenceError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut count = 0;
        for row in reader.records() {
            row?;
            count += 1;
        }
        Ok(count)
    }
}

/// CSV of per-day totals, one row per date
pub struct DailySummaryStore {
    path: PathBuf,
}

impl DailySummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows, oldest first; empty if the file does not exist yet
    pub fn load(&self) -> Result<Vec<DailySummary>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Stored row for `date`
    pub fn get(&self, date: NaiveDate) -> Result<Option<DailySummary>, PersistenceError> {
        Ok(self.load()?.into_iter().find(|r| r.date == date))
    }

    /// Insert a new date or update the existing row for it in place
    pub fn upsert(&self, summary: &DailySummary) -> Result<(), PersistenceError> {
        let mut rows = self.load()?;

        match rows.iter_mut().find(|r| r.date == summary.date) {
            Some(existing) => *existing = summary.clone(),
            None => rows.push(summary.clone()),
        }

        // Write aside then rename so a failed write leaves the old file intact
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::info!(
            "📁 Daily summary {}: {} trades, P&L {:.2}",
            summary.date,
            summary.total_trades,
            summary.total_pnl
        );
        Ok(())
    }
}

/// Trade log plus daily summary on local CSV files
pub struct CsvJournal {
    trades: TradeLog,
    daily: DailySummaryStore,
}

impl CsvJournal {
    /// Starts a fresh trade log for the session
    pub fn open(
        trade_log_path: impl Into<PathBuf>,
        daily_summary_path: impl Into<PathBuf>,
    ) -> Result<Self, PersistenceError> {
        Ok(Self {
            trades: TradeLog::create(trade_log_path)?,
            daily: DailySummaryStore::new(daily_summary_path),
        })
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trades
    }

    pub fn daily_summaries(&self) -> &DailySummaryStore {
        &self.daily
    }
}

impl TradeSink for CsvJournal {
    fn record_trade(&mut self, record: &TradeRecord) -> Result<(), PersistenceError> {
        self.trades.append(record)
    }

    fn record_daily_summary(&mut self, summary: &DailySummary) -> Result<(), PersistenceError> {
        self.daily.upsert(summary)
    }

    fn daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>, PersistenceError> {
        self.daily.get(date)
    }
}

/// Keeps everything in memory; for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    pub trades: Vec<TradeRecord>,
    pub summaries: Vec<DailySummary>,
}

impl TradeSink for MemorySink {
    fn record_trade(&mut self, record: &TradeRecord) -> Result<(), PersistenceError> {
        self.trades.push(record.clone());
        Ok(())
    }

    fn record_daily_summary(&mut self, summary: &DailySummary) -> Result<(), PersistenceError> {
        match self.summaries.iter_mut().find(|s| s.date == summary.date) {
            Some(existing) => *existing = summary.clone(),
            None => self.summaries.push(summary.clone()),
        }
        Ok(())
    }

    fn daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>, PersistenceError> {
        Ok(self.summaries.iter().find(|s| s.date == date).cloned())
    }
}
