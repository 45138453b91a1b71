//! Coin model
//!
//! A `Coin` is an amount of a single denomination. All amounts are `i128`
//! base units so that products such as `amount * total_shares` fit without
//! leaving integer arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer amount in base units of some denomination
pub type Amount = i128;

/// An amount of a single denomination
///
/// # Example
/// ```
/// use vault_engine_core_rs::Coin;
///
/// let coin = Coin::new("uusd", 1_500);
/// assert_eq!(coin.to_string(), "1500uusd");
/// assert!(coin.is_positive());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Amount,
}

impl Coin {
    /// Create a coin
    pub fn new(denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Zero amount of `denom`
    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(denom, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}
