use super::InstrumentSource;
use crate::error::TradeError;
use crate::models::{AtmSymbols, Instrument, OptionSide};

/// In-memory cache of the option instrument list
///
/// Loading is explicit: call `refresh` before querying, `invalidate` to drop
/// the cache (e.g. at the start of a new session or after an expiry roll).
#[derive(Debug, Clone)]
pub struct InstrumentCatalog {
    underlying: String,
    strike_step: f64,
    cache: Option<Vec<Instrument>>,
}

impl InstrumentCatalog {
    pub fn new(underlying: impl Into<String>, strike_step: f64) -> Self {
        Self {
            underlying: underlying.into(),
            strike_step,
            cache: None,
        }
    }

    /// Reload the instrument list from `source`, keeping only the underlying
    pub async fn refresh<S: InstrumentSource>(&mut self, source: &S) -> anyhow::Result<usize> {
        let instruments: Vec<Instrument> = source
            .instruments()
            .await?
            .into_iter()
            .filter(|i| i.name == self.underlying)
            .collect();

        tracing::info!(
            "📂 Loaded {} {} option instruments",
            instruments.len(),
            self.underlying
        );

        let count = instruments.len();
        self.cache = Some(instruments);
        Ok(count)
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// Strike closest to spot on the strike grid; exact half-steps go to the even strike
    pub fn atm_strike(&self, spot: f64) -> f64 {
        (spot / self.strike_step).round_ties_even() * self.strike_step
    }

    /// CE and PE trading symbols at the ATM strike
    pub fn atm_symbols(&self, spot: f64) -> Result<AtmSymbols, TradeError> {
        let instruments = self.cache.as_ref().ok_or(TradeError::CatalogNotLoaded)?;
        let strike = self.atm_strike(spot);

        let mut atm = AtmSymbols {
            strike,
            ..AtmSymbols::default()
        };
        for instrument in instruments {
            if (instrument.strike - strike).abs() > 1e-6 {
                continue;
            }
            let slot = match instrument.side {
                OptionSide::Call => &mut atm.call,
                OptionSide::Put => &mut atm.put,
            };
            slot.get_or_insert_with(|| instrument.trading_symbol.clone());
        }

        Ok(atm)
    }

    /// ATM trading symbol for one side
    pub fn atm_symbol(&self, spot: f64, side: OptionSide) -> Result<String, TradeError> {
        let atm = self.atm_symbols(spot)?;
        atm.symbol_for(side)
            .map(str::to_string)
            .ok_or(TradeError::NoInstrument {
                side,
                strike: atm.strike,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticInstruments {
        calls: AtomicUsize,
    }

    impl InstrumentSource for StaticInstruments {
        async fn instruments(&self) -> anyhow::Result<Vec<Instrument>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut list = Vec::new();
            for strike in [71_900.0, 72_000.0, 72_100.0] {
                for side in [OptionSide::Call, OptionSide::Put] {
                    list.push(Instrument {
                        name: "SENSEX".to_string(),
                        strike,
                        side,
                        trading_symbol: format!("SENSEX{}{}", strike, side),
                    });
                }
            }
            list.push(Instrument {
                name: "BANKEX".to_string(),
                strike: 72_000.0,
                side: OptionSide::Call,
                trading_symbol: "BANKEX72000CE".to_string(),
            });
            Ok(list)
        }
    }

    fn source() -> StaticInstruments {
        StaticInstruments {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_unloaded_catalog_errors() {
        let catalog = InstrumentCatalog::new("SENSEX", 100.0);
        assert!(!catalog.is_loaded());
        assert!(matches!(
            catalog.atm_symbols(72_000.0),
            Err(TradeError::CatalogNotLoaded)
        ));
    }

    #[test]
    fn test_atm_strike_rounding() {
        let catalog = InstrumentCatalog::new("SENSEX", 100.0);
        assert_eq!(catalog.atm_strike(72_049.0), 72_000.0);
        assert_eq!(catalog.atm_strike(72_051.0), 72_100.0);
        assert_eq!(catalog.atm_strike(71_960.5), 72_000.0);
    }

    #[test]
    fn test_atm_strike_half_step_goes_even() {
        let catalog = InstrumentCatalog::new("SENSEX", 100.0);
        assert_eq!(catalog.atm_strike(72_050.0), 72_000.0);
        assert_eq!(catalog.atm_strike(72_150.0), 72_200.0);
        assert_eq!(catalog.atm_strike(71_950.0), 72_000.0);
    }

    #[tokio::test]
    async fn test_refresh_filters_underlying() {
        let src = source();
        let mut catalog = InstrumentCatalog::new("SENSEX", 100.0);

        let count = catalog.refresh(&src).await.unwrap();
        assert_eq!(count, 6);
        assert!(catalog.is_loaded());

        let atm = catalog.atm_symbols(72_010.0).unwrap();
        assert_eq!(atm.strike, 72_000.0);
        assert_eq!(atm.call.as_deref(), Some("SENSEX72000CE"));
        assert_eq!(atm.put.as_deref(), Some("SENSEX72000PE"));
    }

    #[tokio::test]
    async fn test_missing_strike() {
        let src = source();
        let mut catalog = InstrumentCatalog::new("SENSEX", 100.0);
        catalog.refresh(&src).await.unwrap();

        let result = catalog.atm_symbol(80_000.0, OptionSide::Put);
        assert!(matches!(result, Err(TradeError::NoInstrument { .. })));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let src = source();
        let mut catalog = InstrumentCatalog::new("SENSEX", 100.0);
        catalog.refresh(&src).await.unwrap();

        catalog.invalidate();
        assert!(!catalog.is_loaded());
        assert!(catalog.atm_symbols(72_000.0).is_err());

        catalog.refresh(&src).await.unwrap();
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            catalog.atm_symbol(72_100.0, OptionSide::Call).unwrap(),
            "SENSEX72100CE"
        );
    }
}
