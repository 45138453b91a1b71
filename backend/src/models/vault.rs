//! Vault entity
//!
//! A vault pools an underlying asset on behalf of share holders. The engine
//! reads and writes only a handful of its fields: the reconciliation period
//! pair, the paused snapshot, the interest rate (when disabling accrual), and
//! the total share supply after a swap-out burn.
//!
//! Two accounts belong to every vault:
//! - the **vault account** (`address`) holds interest reserves and escrowed
//!   shares/assets of pending payouts
//! - the **principal account** (`principal_address`) holds the pooled
//!   principal that backs share value
//!
//! The reconciliation state machine works against the [`VaultAccount`]
//! capability trait rather than the concrete struct.

use crate::interest::{check_rate_within_limits, InterestError};
use crate::models::coin::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for vault configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Vault address cannot be empty")]
    EmptyAddress,

    #[error("Vault {address} has an empty {field}")]
    EmptyField { address: String, field: &'static str },

    #[error("Vault {0} has negative total shares")]
    NegativeShares(String),

    #[error("Vault {0} share denom cannot equal its underlying asset")]
    ShareDenomCollision(String),

    #[error("Vault {0} is paused without a frozen valuation")]
    MissingPausedValuation(String),

    #[error("Vault {address} has invalid interest configuration: {source}")]
    InterestConfig {
        address: String,
        #[source]
        source: InterestError,
    },
}

/// Valuation frozen at the moment a vault was paused
///
/// While paused, total vault value and NAV per share are served from this
/// snapshot instead of live balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausedValuation {
    pub total_value: Amount,
    pub nav_per_share: Amount,
}

/// Capability surface the reconciliation state machine needs from an entity
pub trait VaultAccount {
    fn address(&self) -> &str;
    fn total_shares(&self) -> Amount;
    fn interest_rate(&self) -> &str;
    fn period_start(&self) -> i64;
    fn period_timeout(&self) -> i64;
    fn is_paused(&self) -> bool;

    /// Overwrite the reconciliation period pair
    fn set_period(&mut self, start: i64, timeout: i64);
}

/// A pooled-asset vault
///
/// # Example
/// ```
/// use vault_engine_core_rs::models::vault::{Vault, VaultAccount};
///
/// let vault = Vault::new("vault1", "vshare", "uusd", "vault1-principal")
///     .with_interest_rate("0.05");
/// assert_eq!(vault.interest_rate(), "0.05");
/// assert!(vault.accepts_denom("uusd"));
/// assert!(vault.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    pub address: String,
    pub share_denom: String,
    pub underlying_asset: String,
    pub payment_denom: Option<String>,
    pub principal_address: String,
    pub total_shares: Amount,

    /// Signed decimal rate, e.g. "0.05". Empty means no rate configured.
    pub current_interest_rate: String,
    /// Optional lower bound for `current_interest_rate`; empty means unset
    pub min_interest_rate: String,
    /// Optional upper bound for `current_interest_rate`; empty means unset
    pub max_interest_rate: String,

    pub period_start: i64,
    /// 0 while the vault is awaiting verification
    pub period_timeout: i64,

    pub paused: bool,
    pub paused_reason: String,
    pub paused_valuation: Option<PausedValuation>,
}

impl Vault {
    pub fn new(
        address: impl Into<String>,
        share_denom: impl Into<String>,
        underlying_asset: impl Into<String>,
        principal_address: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            share_denom: share_denom.into(),
            underlying_asset: underlying_asset.into(),
            payment_denom: None,
            principal_address: principal_address.into(),
            total_shares: 0,
            current_interest_rate: String::new(),
            min_interest_rate: String::new(),
            max_interest_rate: String::new(),
            period_start: 0,
            period_timeout: 0,
            paused: false,
            paused_reason: String::new(),
            paused_valuation: None,
        }
    }

    pub fn with_payment_denom(mut self, denom: impl Into<String>) -> Self {
        self.payment_denom = Some(denom.into());
        self
    }

    pub fn with_interest_rate(mut self, rate: impl Into<String>) -> Self {
        self.current_interest_rate = rate.into();
        self
    }

    pub fn with_rate_limits(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_interest_rate = min.into();
        self.max_interest_rate = max.into();
        self
    }

    pub fn with_total_shares(mut self, total_shares: Amount) -> Self {
        self.total_shares = total_shares;
        self
    }

    /// True if `denom` may be deposited into or redeemed from this vault
    pub fn accepts_denom(&self, denom: &str) -> bool {
        denom == self.underlying_asset || self.payment_denom.as_deref() == Some(denom)
    }

    /// Check structural fields and interest-rate limits
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.address.is_empty() {
            return Err(VaultError::EmptyAddress);
        }
        for (field, value) in [
            ("share denom", &self.share_denom),
            ("underlying asset", &self.underlying_asset),
            ("principal address", &self.principal_address),
        ] {
            if value.is_empty() {
                return Err(VaultError::EmptyField {
                    address: self.address.clone(),
                    field,
                });
            }
        }
        if self.share_denom == self.underlying_asset {
            return Err(VaultError::ShareDenomCollision(self.address.clone()));
        }
        if self.total_shares < 0 {
            return Err(VaultError::NegativeShares(self.address.clone()));
        }
        if self.paused && self.paused_valuation.is_none() {
            return Err(VaultError::MissingPausedValuation(self.address.clone()));
        }
        check_rate_within_limits(
            &self.current_interest_rate,
            &self.min_interest_rate,
            &self.max_interest_rate,
        )
        .map_err(|source| VaultError::InterestConfig {
            address: self.address.clone(),
            source,
        })
    }

    /// Pause the vault and freeze its valuation
    pub fn pause(&mut self, reason: impl Into<String>, valuation: PausedValuation) {
        self.paused = true;
        self.paused_reason = reason.into();
        self.paused_valuation = Some(valuation);
    }

    /// Resume the vault and drop the frozen valuation
    pub fn unpause(&mut self) {
        self.paused = false;
        self.paused_reason.clear();
        self.paused_valuation = None;
    }
}

impl VaultAccount for Vault {
    fn address(&self) -> &str {
        &self.address
    }

    fn total_shares(&self) -> Amount {
        self.total_shares
    }

    fn interest_rate(&self) -> &str {
        &self.current_interest_rate
    }

    fn period_start(&self) -> i64 {
        self.period_start
    }

    fn period_timeout(&self) -> i64 {
        self.period_timeout
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_period(&mut self, start: i64, timeout: i64) {
        self.period_start = start;
        self.period_timeout = timeout;
    }
}
