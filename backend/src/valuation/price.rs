//! Price observations
//!
//! A price observation for `source → target` says that `volume` units of
//! `source` traded for `price_amount` units of `target`, so one unit of
//! source is worth `price_amount / volume` target units.

use crate::models::coin::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest observed price for a denom pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price_amount: Amount,
    pub volume: u64,
}

/// Source of price observations consumed by the valuation engine
pub trait PriceSource {
    /// Latest observation for `source → target`, if any
    fn lookup(&self, source: &str, target: &str) -> Option<PriceObservation>;
}

/// In-memory price table keyed by `(source, target)`
///
/// # Example
/// ```
/// use vault_engine_core_rs::valuation::{PriceSource, PriceTable};
///
/// let mut prices = PriceTable::new();
/// prices.set_price("uylds", "uusd", 3, 2);
///
/// let obs = prices.lookup("uylds", "uusd").unwrap();
/// assert_eq!((obs.price_amount, obs.volume), (3, 2));
/// assert!(prices.lookup("uusd", "uylds").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    prices: BTreeMap<String, BTreeMap<String, PriceObservation>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `volume` units of `source` cost `price_amount` of `target`
    pub fn set_price(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        price_amount: Amount,
        volume: u64,
    ) {
        self.prices.entry(source.into()).or_default().insert(
            target.into(),
            PriceObservation {
                price_amount,
                volume,
            },
        );
    }

    pub fn remove_price(&mut self, source: &str, target: &str) {
        if let Some(targets) = self.prices.get_mut(source) {
            targets.remove(target);
            if targets.is_empty() {
                self.prices.remove(source);
            }
        }
    }
}

impl PriceSource for PriceTable {
    fn lookup(&self, source: &str, target: &str) -> Option<PriceObservation> {
        self.prices.get(source)?.get(target).copied()
    }
}
