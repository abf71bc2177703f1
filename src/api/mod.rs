// Market data capability boundary: the bot only sees these traits
pub mod instruments;
pub mod simulated;

use crate::models::{Instrument, Tick};
use std::collections::HashMap;
use std::future::Future;

pub use instruments::InstrumentCatalog;
pub use simulated::SimulatedMarket;

/// Live quotes for the underlying and its options
pub trait QuoteSource {
    /// Latest tick of the underlying index
    fn spot(&self) -> impl Future<Output = anyhow::Result<Tick>> + Send;

    /// Last traded price per symbol; symbols without a quote are omitted
    fn quotes(
        &self,
        symbols: &[String],
    ) -> impl Future<Output = anyhow::Result<HashMap<String, f64>>> + Send;
}

/// Tradable option contracts for the underlying
pub trait InstrumentSource {
    fn instruments(&self) -> impl Future<Output = anyhow::Result<Vec<Instrument>>> + Send;
}

impl<T: QuoteSource + Send + Sync> QuoteSource for std::sync::Arc<T> {
    fn spot(&self) -> impl Future<Output = anyhow::Result<Tick>> + Send {
        (**self).spot()
    }

    fn quotes(
        &self,
        symbols: &[String],
    ) -> impl Future<Output = anyhow::Result<HashMap<String, f64>>> + Send {
        (**self).quotes(symbols)
    }
}

impl<T: InstrumentSource + Send + Sync> InstrumentSource for std::sync::Arc<T> {
    fn instruments(&self) -> impl Future<Output = anyhow::Result<Vec<Instrument>>> + Send {
        (**self).instruments()
    }
}
