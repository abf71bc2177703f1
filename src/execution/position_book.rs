use chrono::NaiveDateTime;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::TradeError;
use crate::models::{EntryOrder, ExitReason, OptionSide, Position, PositionStatus, TradeRecord};

/// Cash ledger for the simulated account
#[derive(Debug, Clone, PartialEq)]
pub struct CapitalLedger {
    initial_capital: f64,
    current_capital: f64,
}

impl CapitalLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn current_capital(&self) -> f64 {
        self.current_capital
    }

    fn debit(&mut self, amount: f64) {
        self.current_capital -= amount;
    }

    fn credit(&mut self, amount: f64) {
        self.current_capital += amount;
    }
}

/// Totals over the closed trades of a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl: f64,
}

/// Owns the capital ledger, open positions and closed-trade history
///
/// Mutated only through `place`, `check_exits` and `force_close_all`.
/// Between calls: `current_capital + capital_in_use == initial_capital + realized_pnl`.
pub struct PositionBook {
    contract_multiplier: f64,
    ledger: CapitalLedger,
    open: Vec<Position>,
    history: Vec<TradeRecord>,
    realized_pnl: f64,
}

impl PositionBook {
    pub fn new(initial_capital: f64, contract_multiplier: f64) -> Self {
        Self {
            contract_multiplier,
            ledger: CapitalLedger::new(initial_capital),
            open: Vec::new(),
            history: Vec::new(),
            realized_pnl: 0.0,
        }
    }

    /// Open a position at the current local time
    pub fn place(&mut self, order: EntryOrder) -> Result<Uuid, TradeError> {
        self.place_at(order, None)
    }

    /// Open a position with an explicit timestamp
    ///
    /// Rejects without touching state if lots is zero or any price is not
    /// strictly positive. No cap on concurrent positions is enforced here.
    pub fn place_at(
        &mut self,
        order: EntryOrder,
        timestamp: Option<NaiveDateTime>,
    ) -> Result<Uuid, TradeError> {
        validate_order(&order)?;

        let id = Uuid::new_v4();
        let cost = order.entry_price * order.lots as f64 * self.contract_multiplier;
        let opened_at = timestamp.unwrap_or_else(|| chrono::Local::now().naive_local());

        self.ledger.debit(cost);

        tracing::info!(
            "🟢 Opened {} {} x{} @ {:.2} (SL {:.2}, target {:.2}, cost {:.2}, capital {:.2})",
            order.side,
            order.symbol,
            order.lots,
            order.entry_price,
            order.stop_loss,
            order.target,
            cost,
            self.ledger.current_capital()
        );

        self.open.push(Position {
            id,
            side: order.side,
            symbol: order.symbol,
            entry_price: order.entry_price,
            stop_loss: order.stop_loss,
            target: order.target,
            lots: order.lots,
            cost,
            status: PositionStatus::Open,
            opened_at,
        });

        Ok(id)
    }

    /// Close every open position whose stop-loss or target is hit
    pub fn check_exits(&mut self, prices: &HashMap<String, f64>) -> Vec<TradeRecord> {
        self.check_exits_at(prices, None)
    }

    /// Exit check with explicit timestamp
    ///
    /// A symbol missing from `prices` is priced at its own entry price.
    /// Stop-loss is checked before target, so it wins when both hold.
    pub fn check_exits_at(
        &mut self,
        prices: &HashMap<String, f64>,
        timestamp: Option<NaiveDateTime>,
    ) -> Vec<TradeRecord> {
        let to_close: Vec<(Uuid, f64, ExitReason)> = self
            .open
            .iter()
            .filter_map(|position| {
                let price = exit_price_for(position, prices);
                let reason = if price <= position.stop_loss {
                    ExitReason::StopLoss
                } else if price >= position.target {
                    ExitReason::Target
                } else {
                    return None;
                };
                Some((position.id, price, reason))
            })
            .collect();

        to_close
            .into_iter()
            .filter_map(|(id, price, reason)| self.close(id, price, reason, timestamp))
            .collect()
    }

    /// Close every open position regardless of levels, e.g. at session end
    pub fn force_close_all(
        &mut self,
        prices: &HashMap<String, f64>,
        reason: &str,
    ) -> Vec<TradeRecord> {
        self.force_close_all_at(prices, reason, None)
    }

    pub fn force_close_all_at(
        &mut self,
        prices: &HashMap<String, f64>,
        reason: &str,
        timestamp: Option<NaiveDateTime>,
    ) -> Vec<TradeRecord> {
        let to_close: Vec<(Uuid, f64)> = self
            .open
            .iter()
            .map(|position| (position.id, exit_price_for(position, prices)))
            .collect();

        to_close
            .into_iter()
            .filter_map(|(id, price)| {
                self.close(id, price, ExitReason::Forced(reason.to_string()), timestamp)
            })
            .collect()
    }

    fn close(
        &mut self,
        position_id: Uuid,
        exit_price: f64,
        reason: ExitReason,
        timestamp: Option<NaiveDateTime>,
    ) -> Option<TradeRecord> {
        let index = self.open.iter().position(|p| p.id == position_id)?;
        let mut position = self.open.remove(index);
        position.status = PositionStatus::Closed;

        let pnl = (exit_price - position.entry_price) * position.lots as f64 * self.contract_multiplier;
        self.ledger.credit(position.cost + pnl);
        self.realized_pnl += pnl;

        let record = TradeRecord {
            position_id: position.id,
            side: position.side,
            symbol: position.symbol,
            entry_price: position.entry_price,
            stop_loss: position.stop_loss,
            target: position.target,
            lots: position.lots,
            opened_at: position.opened_at,
            closed_at: timestamp.unwrap_or_else(|| chrono::Local::now().naive_local()),
            exit_price,
            result: reason,
            pnl,
            capital_used: position.cost,
            running_pnl: self.realized_pnl,
        };

        let marker = if pnl >= 0.0 { "✅" } else { "❌" };
        tracing::info!(
            "{} Closed {} {} @ {:.2} ({}) P&L {:.2}, running {:.2}, capital {:.2}",
            marker,
            record.side,
            record.symbol,
            exit_price,
            record.result.label(),
            pnl,
            self.realized_pnl,
            self.ledger.current_capital()
        );

        self.history.push(record.clone());
        Some(record)
    }

    /// Whether any position is open on the given side
    pub fn has_open_position(&self, side: OptionSide) -> bool {
        self.open.iter().any(|p| p.side == side)
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open
    }

    /// Distinct symbols of open positions, for quoting
    pub fn open_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.open.iter().map(|p| p.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Closed trades, in close order
    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn ledger(&self) -> &CapitalLedger {
        &self.ledger
    }

    pub fn contract_multiplier(&self) -> f64 {
        self.contract_multiplier
    }

    /// Sum of P&L over closed trades
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Cost of all open positions (debited from the ledger)
    pub fn capital_in_use(&self) -> f64 {
        self.open.iter().map(|p| p.cost).sum()
    }

    /// Mark-to-market P&L of open positions; unquoted symbols count as flat
    pub fn unrealized_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        self.open
            .iter()
            .filter_map(|p| {
                prices
                    .get(&p.symbol)
                    .map(|&price| (price - p.entry_price) * p.lots as f64 * self.contract_multiplier)
            })
            .sum()
    }

    /// Cash plus the market value of open positions
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.ledger.current_capital() + self.capital_in_use() + self.unrealized_pnl(prices)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            total_trades: self.history.len(),
            winning_trades: self.history.iter().filter(|t| t.pnl > 0.0).count(),
            losing_trades: self.history.iter().filter(|t| t.pnl < 0.0).count(),
            total_pnl: self.realized_pnl,
        }
    }
}

fn validate_order(order: &EntryOrder) -> Result<(), TradeError> {
    let reject = |reason: String| Err(TradeError::InvalidEntry { reason });

    if order.lots == 0 {
        return reject("lots must be positive".to_string());
    }
    for (name, value) in [
        ("entry price", order.entry_price),
        ("stop loss", order.stop_loss),
        ("target", order.target),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return reject(format!("{} must be positive, got {}", name, value));
        }
    }

    Ok(())
}

/// Quoted price for the position, falling back to its entry price
fn exit_price_for(position: &Position, prices: &HashMap<String, f64>) -> f64 {
    match prices.get(&position.symbol) {
        Some(&price) => price,
        None => {
            tracing::warn!(
                "No quote for {}, using entry price {:.2}",
                position.symbol,
                position.entry_price
            );
            position.entry_price
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn order(side: OptionSide, symbol: &str, entry: f64, sl: f64, target: f64, lots: u32) -> EntryOrder {
        EntryOrder {
            side,
            symbol: symbol.to_string(),
            entry_price: entry,
            stop_loss: sl,
            target,
            lots,
        }
    }

    fn prices(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn test_place_debits_cost() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        let id = book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();

        assert_eq!(book.open_positions().len(), 1);
        let position = &book.open_positions()[0];
        assert_eq!(position.id, id);
        assert_eq!(position.cost, 5_000.0);
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(book.ledger().current_capital(), 95_000.0);
        assert_eq!(book.capital_in_use(), 5_000.0);
        assert!(book.has_open_position(OptionSide::Call));
        assert!(!book.has_open_position(OptionSide::Put));
    }

    #[test]
    fn test_invalid_entries_rejected_without_state_change() {
        let mut book = PositionBook::new(100_000.0, 25.0);

        let bad = [
            order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 0),
            order(OptionSide::Call, "X", 0.0, 90.0, 120.0, 2),
            order(OptionSide::Call, "X", 100.0, -1.0, 120.0, 2),
            order(OptionSide::Call, "X", 100.0, 90.0, 0.0, 2),
            order(OptionSide::Call, "X", f64::NAN, 90.0, 120.0, 2),
        ];
        for o in bad {
            let result = book.place(o);
            assert!(matches!(result, Err(TradeError::InvalidEntry { .. })));
        }

        assert!(book.open_positions().is_empty());
        assert_eq!(book.ledger().current_capital(), 100_000.0);
    }

    #[test]
    fn test_stop_loss_hit() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();

        let closed = book.check_exits(&prices(&[("X", 90.0)]));

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].result.label(), "SL Hit");
        assert_eq!(closed[0].pnl, -500.0);
        assert_eq!(closed[0].capital_used, 5_000.0);
        assert_eq!(closed[0].running_pnl, -500.0);
        assert!(book.open_positions().is_empty());
        assert_eq!(book.ledger().current_capital(), 99_500.0);
    }

    #[test]
    fn test_target_hit() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Put, "Y", 100.0, 90.0, 120.0, 1)).unwrap();

        let closed = book.check_exits(&prices(&[("Y", 125.0)]));

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].result, ExitReason::Target);
        assert_eq!(closed[0].exit_price, 125.0);
        assert_eq!(closed[0].pnl, 625.0);
        assert_eq!(book.ledger().current_capital(), 100_625.0);
    }

    #[test]
    fn test_no_exit_between_levels() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();

        assert!(book.check_exits(&prices(&[("X", 105.0)])).is_empty());
        assert_eq!(book.open_positions().len(), 1);
    }

    #[test]
    fn test_stop_loss_wins_when_levels_overlap() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 110.0, 120.0, 100.0, 1)).unwrap();

        let closed = book.check_exits(&prices(&[("X", 110.0)]));

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].result, ExitReason::StopLoss);
    }

    #[test]
    fn test_missing_quote_falls_back_to_entry_price() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();

        // Entry price sits between SL and target, so nothing closes
        assert!(book.check_exits(&HashMap::new()).is_empty());

        // Degenerate levels: entry itself breaches the stop
        book.place(order(OptionSide::Put, "Z", 100.0, 100.0, 120.0, 1)).unwrap();
        let closed = book.check_exits(&HashMap::new());
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].symbol, "Z");
        assert_eq!(closed[0].exit_price, 100.0);
        assert_eq!(closed[0].pnl, 0.0);
    }

    #[test]
    fn test_force_close_all_uses_reason() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();
        book.place(order(OptionSide::Put, "Y", 200.0, 150.0, 260.0, 1)).unwrap();

        let closed = book.force_close_all(&prices(&[("X", 105.0)]), "Session End");

        assert_eq!(closed.len(), 2);
        for record in &closed {
            assert_eq!(record.result.label(), "Session End");
        }
        // Y had no quote and closes flat
        let y = closed.iter().find(|r| r.symbol == "Y").unwrap();
        assert_eq!(y.exit_price, 200.0);
        assert_eq!(y.pnl, 0.0);

        assert!(book.open_positions().is_empty());
        assert_eq!(book.ledger().current_capital(), 100_250.0);
        assert_eq!(book.history().len(), 2);
    }

    #[test]
    fn test_closed_position_never_reopens() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();
        book.check_exits(&prices(&[("X", 80.0)]));

        // Further checks see nothing to close
        assert!(book.check_exits(&prices(&[("X", 200.0)])).is_empty());
        assert!(book.force_close_all(&HashMap::new(), "Session End").is_empty());
        assert_eq!(book.history().len(), 1);
    }

    #[test]
    fn test_open_symbols_are_distinct() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "B", 100.0, 90.0, 120.0, 1)).unwrap();
        book.place(order(OptionSide::Call, "A", 100.0, 90.0, 120.0, 1)).unwrap();
        book.place(order(OptionSide::Put, "B", 100.0, 90.0, 120.0, 1)).unwrap();

        assert_eq!(book.open_symbols(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_equity_and_unrealized_pnl() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 2)).unwrap();

        let quotes = prices(&[("X", 110.0)]);
        assert_eq!(book.unrealized_pnl(&quotes), 500.0);
        assert_eq!(book.equity(&quotes), 100_500.0);
        assert_eq!(book.equity(&HashMap::new()), 100_000.0);
    }

    #[test]
    fn test_summary() {
        let mut book = PositionBook::new(100_000.0, 25.0);
        book.place(order(OptionSide::Call, "X", 100.0, 90.0, 120.0, 1)).unwrap();
        book.place(order(OptionSide::Put, "Y", 100.0, 90.0, 120.0, 1)).unwrap();
        book.check_exits(&prices(&[("X", 85.0), ("Y", 130.0)]));

        let summary = book.summary();
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
        assert_eq!(summary.total_pnl, -375.0 + 750.0);
    }

    #[test]
    fn test_ledger_balances_over_random_sequences() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let mut book = PositionBook::new(35_000.0, 25.0);

            for step in 0..rng.gen_range(1..30) {
                if rng.gen_bool(0.5) {
                    let entry: f64 = rng.gen_range(50.0..500.0);
                    let side = if rng.gen_bool(0.5) { OptionSide::Call } else { OptionSide::Put };
                    book.place(order(
                        side,
                        &format!("S{}", step % 4),
                        entry,
                        entry * 0.8,
                        entry * 1.4,
                        rng.gen_range(1..5),
                    ))
                    .unwrap();
                } else {
                    let quotes: HashMap<String, f64> = (0..4)
                        .map(|i| (format!("S{}", i), rng.gen_range(30.0..700.0)))
                        .collect();
                    book.check_exits(&quotes);
                }

                let ledger = book.ledger();
                assert_abs_diff_eq!(
                    ledger.current_capital() + book.capital_in_use(),
                    ledger.initial_capital() + book.realized_pnl(),
                    epsilon = 1e-6
                );
            }

            book.force_close_all(&HashMap::new(), "Session End");

            let total: f64 = book.history().iter().map(|t| t.pnl).sum();
            assert_abs_diff_eq!(
                book.ledger().current_capital(),
                book.ledger().initial_capital() + total,
                epsilon = 1e-6
            );
        }
    }
}
