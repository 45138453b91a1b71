//! Fixed-point share math
//!
//! Converts between underlying-asset amounts and vault shares using fixed
//! virtual offsets. The offsets make first-depositor inflation and donation
//! attacks unprofitable: an attacker who mints the first share and then
//! donates a large balance cannot round later depositors down to zero,
//! because the ratio always includes `VIRTUAL_SHARES` shares that nobody owns.
//!
//! # Critical Invariants
//!
//! 1. **Single floor**: every formula performs all multiplications before its
//!    one division. Callers must not pre-floor intermediate ratios.
//! 2. **Integer only**: no floating point anywhere in the conversion path.
//! 3. **Neutral start**: a first deposit (raw total assets of zero) mints
//!    `amount * SHARE_SCALAR` shares.

use crate::models::coin::Amount;
use thiserror::Error;

/// Neutral precision: one asset unit maps to this many shares.
pub const SHARE_SCALAR: Amount = 1_000_000;

/// One base unit of underlying added to total assets in every conversion.
pub const VIRTUAL_ASSETS: Amount = 1;

/// Shares added to total shares in every conversion.
pub const VIRTUAL_SHARES: Amount = SHARE_SCALAR;

/// Errors produced by share conversions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareMathError {
    #[error("Invalid input: negative values not allowed")]
    NegativeInput,

    #[error("Invalid input: amount denominator is zero")]
    ZeroDenominator,

    #[error("Arithmetic overflow in share conversion")]
    Overflow,
}

fn checked_mul(a: Amount, b: Amount) -> Result<Amount, ShareMathError> {
    a.checked_mul(b).ok_or(ShareMathError::Overflow)
}

/// Compute shares minted for a deposit expressed as a fraction of underlying
///
/// The deposit value is `amount_numerator / amount_denominator` underlying
/// units, which lets callers pass a priced deposit (`amount * price_num`,
/// `price_den`) without flooring it first.
///
/// ```text
/// if total_assets == 0:
///     shares = amount_num * SHARE_SCALAR / amount_den
/// else:
///     shares = amount_num * (total_shares + VIRTUAL_SHARES)
///              / (amount_den * (total_assets + VIRTUAL_ASSETS))
/// ```
///
/// # Example
/// ```
/// use vault_engine_core_rs::core::shares::{shares_from_assets, SHARE_SCALAR};
///
/// // First deposit mints at the neutral ratio
/// assert_eq!(shares_from_assets(5, 1, 0, 0).unwrap(), 5 * SHARE_SCALAR);
/// ```
pub fn shares_from_assets(
    amount_numerator: Amount,
    amount_denominator: Amount,
    total_assets: Amount,
    total_shares: Amount,
) -> Result<Amount, ShareMathError> {
    if amount_numerator < 0 || amount_denominator < 0 || total_assets < 0 || total_shares < 0 {
        return Err(ShareMathError::NegativeInput);
    }
    if amount_numerator == 0 {
        return Ok(0);
    }
    if amount_denominator == 0 {
        return Err(ShareMathError::ZeroDenominator);
    }

    // Checked on the raw total, before the virtual offset is applied
    if total_assets == 0 {
        return Ok(checked_mul(amount_numerator, SHARE_SCALAR)? / amount_denominator);
    }

    let ta = total_assets
        .checked_add(VIRTUAL_ASSETS)
        .ok_or(ShareMathError::Overflow)?;
    let ts = total_shares
        .checked_add(VIRTUAL_SHARES)
        .ok_or(ShareMathError::Overflow)?;

    let numerator = checked_mul(amount_numerator, ts)?;
    let denominator = checked_mul(amount_denominator, ta)?;
    Ok(numerator / denominator)
}

/// Compute the payout for redeeming `shares`, expressed in a denom priced at
/// `price_numerator / price_denominator` underlying per unit
///
/// ```text
/// payout = shares * (total_assets + VIRTUAL_ASSETS) * price_den
///          / ((total_shares + VIRTUAL_SHARES) * price_num)
/// ```
///
/// Passing `(1, 1)` as the price yields the payout in underlying units.
/// A zero price numerator is rejected by the valuation layer before this
/// function is reached; here it is reported as [`ShareMathError::ZeroDenominator`].
pub fn assets_from_shares(
    shares: Amount,
    total_shares: Amount,
    total_assets: Amount,
    price_numerator: Amount,
    price_denominator: Amount,
) -> Result<Amount, ShareMathError> {
    if shares < 0
        || total_shares < 0
        || total_assets < 0
        || price_numerator < 0
        || price_denominator < 0
    {
        return Err(ShareMathError::NegativeInput);
    }
    if shares == 0 {
        return Ok(0);
    }

    let ts = total_shares
        .checked_add(VIRTUAL_SHARES)
        .ok_or(ShareMathError::Overflow)?;
    if ts == 0 {
        return Ok(0);
    }
    let ta = total_assets
        .checked_add(VIRTUAL_ASSETS)
        .ok_or(ShareMathError::Overflow)?;

    let numerator = checked_mul(checked_mul(shares, ta)?, price_denominator)?;
    let denominator = checked_mul(ts, price_numerator)?;
    if denominator == 0 {
        return Err(ShareMathError::ZeroDenominator);
    }
    Ok(numerator / denominator)
}
