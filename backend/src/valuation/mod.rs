//! Valuation Engine
//!
//! Converts between the vault's underlying asset, other accepted
//! denominations, and shares. All functions are read-only over the ledger
//! and price source.
//!
//! # Price fractions
//!
//! `(numerator, denominator)` means one unit of a source denom is worth
//! `numerator / denominator` units of the vault's underlying asset. The
//! identity `(1, 1)` applies when the source is the underlying or either
//! side is the configured universal-peg denom.
//!
//! # Critical Invariants
//!
//! 1. **Floor per term**: every balance is converted and floored on its own
//!    before summing into total vault value
//! 2. **Frozen while paused**: a paused vault reports its snapshot valuation
//!    without reading balances
//! 3. **Denominator > 0**: a zero-volume observation is rejected

pub mod price;

pub use price::{PriceObservation, PriceSource, PriceTable};

use crate::core::shares::{assets_from_shares, shares_from_assets, ShareMathError};
use crate::ledger::BankLedger;
use crate::models::coin::{Amount, Coin};
use crate::models::vault::{PausedValuation, Vault};
use thiserror::Error;

/// Errors produced by valuation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValuationError {
    #[error("No price found for {source_denom} -> {target_denom}")]
    PriceNotFound {
        source_denom: String,
        target_denom: String,
    },

    #[error("Price for {source_denom} -> {target_denom} has zero volume")]
    ZeroPriceVolume {
        source_denom: String,
        target_denom: String,
    },

    #[error("Price for {0} is zero")]
    ZeroPrice(String),

    #[error("Price for {source_denom} -> {target_denom} is negative: {price_amount}")]
    NegativePrice {
        source_denom: String,
        target_denom: String,
        price_amount: Amount,
    },

    #[error("Arithmetic overflow in valuation")]
    Overflow,

    #[error("Share math error: {0}")]
    ShareMath(#[from] ShareMathError),
}

/// Price fraction: one source unit = `numerator / denominator` underlying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFraction {
    pub numerator: Amount,
    pub denominator: Amount,
}

impl PriceFraction {
    pub const IDENTITY: PriceFraction = PriceFraction {
        numerator: 1,
        denominator: 1,
    };
}

/// Stateless valuation over a ledger and a price source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuationEngine {
    peg_denom: Option<String>,
}

impl ValuationEngine {
    /// Create an engine; `peg_denom` is valued 1:1 against every underlying
    pub fn new(peg_denom: Option<String>) -> Self {
        Self { peg_denom }
    }

    pub fn peg_denom(&self) -> Option<&str> {
        self.peg_denom.as_deref()
    }

    fn is_peg(&self, denom: &str) -> bool {
        self.peg_denom.as_deref() == Some(denom)
    }

    /// Price of one `source` unit in `underlying` units
    ///
    /// # Example
    /// ```
    /// use vault_engine_core_rs::valuation::{PriceFraction, PriceTable, ValuationEngine};
    ///
    /// let engine = ValuationEngine::new(Some("upeg".to_string()));
    /// let mut prices = PriceTable::new();
    /// prices.set_price("uylds", "uusd", 3, 2);
    ///
    /// assert_eq!(engine.unit_price_fraction(&prices, "uusd", "uusd").unwrap(), PriceFraction::IDENTITY);
    /// assert_eq!(engine.unit_price_fraction(&prices, "upeg", "uusd").unwrap(), PriceFraction::IDENTITY);
    /// assert_eq!(
    ///     engine.unit_price_fraction(&prices, "uylds", "uusd").unwrap(),
    ///     PriceFraction { numerator: 3, denominator: 2 }
    /// );
    /// ```
    pub fn unit_price_fraction(
        &self,
        prices: &impl PriceSource,
        source: &str,
        underlying: &str,
    ) -> Result<PriceFraction, ValuationError> {
        if source == underlying || self.is_peg(source) || self.is_peg(underlying) {
            return Ok(PriceFraction::IDENTITY);
        }

        let observation =
            prices
                .lookup(source, underlying)
                .ok_or_else(|| ValuationError::PriceNotFound {
                    source_denom: source.to_string(),
                    target_denom: underlying.to_string(),
                })?;

        if observation.volume == 0 {
            return Err(ValuationError::ZeroPriceVolume {
                source_denom: source.to_string(),
                target_denom: underlying.to_string(),
            });
        }
        if observation.price_amount < 0 {
            return Err(ValuationError::NegativePrice {
                source_denom: source.to_string(),
                target_denom: underlying.to_string(),
                price_amount: observation.price_amount,
            });
        }

        Ok(PriceFraction {
            numerator: observation.price_amount,
            denominator: Amount::from(observation.volume),
        })
    }

    /// Value of `coin` in the vault's underlying asset, floored
    pub fn to_underlying(
        &self,
        prices: &impl PriceSource,
        vault: &Vault,
        coin: &Coin,
    ) -> Result<Amount, ValuationError> {
        let fraction = self.unit_price_fraction(prices, &coin.denom, &vault.underlying_asset)?;
        let scaled = coin
            .amount
            .checked_mul(fraction.numerator)
            .ok_or(ValuationError::Overflow)?;
        Ok(scaled / fraction.denominator)
    }

    /// Total value of the vault's principal holdings in underlying units
    ///
    /// Share-denom balances and the vault account's own reserves are not
    /// counted. Paused vaults report their frozen snapshot.
    pub fn total_vault_value(
        &self,
        ledger: &impl BankLedger,
        prices: &impl PriceSource,
        vault: &Vault,
    ) -> Result<Amount, ValuationError> {
        if let (true, Some(snapshot)) = (vault.paused, vault.paused_valuation) {
            return Ok(snapshot.total_value);
        }
        self.live_total_vault_value(ledger, prices, vault)
    }

    fn live_total_vault_value(
        &self,
        ledger: &impl BankLedger,
        prices: &impl PriceSource,
        vault: &Vault,
    ) -> Result<Amount, ValuationError> {
        let mut total: Amount = 0;
        for balance in ledger.all_balances(&vault.principal_address) {
            if balance.denom == vault.share_denom {
                continue;
            }
            let value = self.to_underlying(prices, vault, &balance)?;
            total = total.checked_add(value).ok_or(ValuationError::Overflow)?;
        }
        Ok(total)
    }

    /// Underlying value per share, floored; 0 when no shares exist
    pub fn nav_per_share(
        &self,
        ledger: &impl BankLedger,
        prices: &impl PriceSource,
        vault: &Vault,
    ) -> Result<Amount, ValuationError> {
        if let (true, Some(snapshot)) = (vault.paused, vault.paused_valuation) {
            return Ok(snapshot.nav_per_share);
        }
        let total_value = self.live_total_vault_value(ledger, prices, vault)?;
        Ok(nav_from(total_value, vault.total_shares))
    }

    /// Live valuation to freeze when pausing `vault`
    pub fn snapshot(
        &self,
        ledger: &impl BankLedger,
        prices: &impl PriceSource,
        vault: &Vault,
    ) -> Result<PausedValuation, ValuationError> {
        let total_value = self.live_total_vault_value(ledger, prices, vault)?;
        Ok(PausedValuation {
            total_value,
            nav_per_share: nav_from(total_value, vault.total_shares),
        })
    }

    /// Shares minted for depositing `deposit` into `vault`
    ///
    /// The deposit is priced as a fraction so that nothing is floored before
    /// the single division in the share formula.
    pub fn deposit_to_shares(
        &self,
        ledger: &impl BankLedger,
        prices: &impl PriceSource,
        vault: &Vault,
        deposit: &Coin,
    ) -> Result<Coin, ValuationError> {
        let fraction =
            self.unit_price_fraction(prices, &deposit.denom, &vault.underlying_asset)?;
        let total_value = self.total_vault_value(ledger, prices, vault)?;

        let amount_numerator = deposit
            .amount
            .checked_mul(fraction.numerator)
            .ok_or(ValuationError::Overflow)?;
        let shares = shares_from_assets(
            amount_numerator,
            fraction.denominator,
            total_value,
            vault.total_shares,
        )?;
        Ok(Coin::new(vault.share_denom.clone(), shares))
    }

    /// Payout in `redeem_denom` for redeeming `shares`
    ///
    /// Non-positive `shares` yield a zero coin without error.
    pub fn shares_to_redeem(
        &self,
        ledger: &impl BankLedger,
        prices: &impl PriceSource,
        vault: &Vault,
        shares: Amount,
        redeem_denom: &str,
    ) -> Result<Coin, ValuationError> {
        if shares <= 0 {
            return Ok(Coin::zero(redeem_denom));
        }

        let total_value = self.total_vault_value(ledger, prices, vault)?;
        let fraction = self.unit_price_fraction(prices, redeem_denom, &vault.underlying_asset)?;
        if fraction.numerator == 0 {
            return Err(ValuationError::ZeroPrice(redeem_denom.to_string()));
        }

        let payout = assets_from_shares(
            shares,
            vault.total_shares,
            total_value,
            fraction.numerator,
            fraction.denominator,
        )?;
        Ok(Coin::new(redeem_denom, payout))
    }
}

fn nav_from(total_value: Amount, total_shares: Amount) -> Amount {
    if total_shares == 0 {
        0
    } else {
        total_value / total_shares
    }
}
