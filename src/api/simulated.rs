use super::{InstrumentSource, QuoteSource};
use crate::models::{Instrument, OptionSide, Tick};
use chrono::{FixedOffset, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

/// Strikes listed on each side of the starting spot
const STRIKES_EACH_SIDE: i64 = 40;
/// Time value of an ATM option, in index points
const BASE_TIME_VALUE: f64 = 250.0;

/// Random-walk market for running the bot without a broker
///
/// Seeded for reproducibility. Option premiums are derived from the current
/// spot: intrinsic value plus a noisy time value.
pub struct SimulatedMarket {
    state: Mutex<MarketState>,
    instruments: Vec<Instrument>,
    by_symbol: HashMap<String, Instrument>,
    offset: FixedOffset,
}

struct MarketState {
    rng: StdRng,
    spot: f64,
}

impl SimulatedMarket {
    pub fn new(
        seed: u64,
        initial_spot: f64,
        underlying: &str,
        strike_step: f64,
        offset: FixedOffset,
    ) -> Self {
        let atm = (initial_spot / strike_step).round() as i64;
        let mut instruments = Vec::new();

        for i in (atm - STRIKES_EACH_SIDE)..=(atm + STRIKES_EACH_SIDE) {
            let strike = i as f64 * strike_step;
            for side in [OptionSide::Call, OptionSide::Put] {
                instruments.push(Instrument {
                    name: underlying.to_string(),
                    strike,
                    side,
                    trading_symbol: format!("{}{}{}", underlying, strike, side),
                });
            }
        }

        let by_symbol = instruments
            .iter()
            .map(|i| (i.trading_symbol.clone(), i.clone()))
            .collect();

        Self {
            state: Mutex::new(MarketState {
                rng: StdRng::seed_from_u64(seed),
                spot: initial_spot,
            }),
            instruments,
            by_symbol,
            offset,
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, MarketState>> {
        self.state
            .lock()
            .map_err(|e| anyhow::anyhow!("simulated market state poisoned: {}", e))
    }

    fn premium(spot: f64, instrument: &Instrument, noise: f64) -> f64 {
        let intrinsic = match instrument.side {
            OptionSide::Call => (spot - instrument.strike).max(0.0),
            OptionSide::Put => (instrument.strike - spot).max(0.0),
        };
        // Time value decays away from the money
        let distance = (spot - instrument.strike).abs();
        let time_value = BASE_TIME_VALUE * (-distance / 1_000.0).exp();
        ((intrinsic + time_value) * (1.0 + noise)).max(1.0)
    }
}

impl QuoteSource for SimulatedMarket {
    async fn spot(&self) -> anyhow::Result<Tick> {
        let mut state = self.lock()?;
        let drift: f64 = state.rng.gen_range(-0.0008..0.0008);
        state.spot *= 1.0 + drift;
        let volume = state.rng.gen_range(100..5_000);

        Ok(Tick {
            timestamp: Utc::now().with_timezone(&self.offset).naive_local(),
            last_price: state.spot,
            volume,
        })
    }

    async fn quotes(&self, symbols: &[String]) -> anyhow::Result<HashMap<String, f64>> {
        let mut state = self.lock()?;
        let spot = state.spot;
        let mut prices = HashMap::new();

        for symbol in symbols {
            if let Some(instrument) = self.by_symbol.get(symbol) {
                let noise: f64 = state.rng.gen_range(-0.02..0.02);
                prices.insert(symbol.clone(), Self::premium(spot, instrument, noise));
            }
        }

        Ok(prices)
    }
}

impl InstrumentSource for SimulatedMarket {
    async fn instruments(&self) -> anyhow::Result<Vec<Instrument>> {
        Ok(self.instruments.clone())
    }
}
