//! Interest Accrual Engine
//!
//! Continuous-compound interest using deterministic decimal arithmetic:
//!
//! ```text
//! interest = P * e^(r * t) - P        t = elapsed_seconds / SECONDS_PER_YEAR
//! ```
//!
//! `e^x` is approximated by a fixed-length Maclaurin series ([`exp_dec`]).
//! The term count is fixed so results are bit-identical on every node; it is
//! not adaptive. Arguments whose series leaves the decimal range are rejected
//! with [`InterestError::Overflow`] instead of silently diverging.
//!
//! # Critical Invariants
//!
//! 1. **No floating point**: rates are parsed into `rust_decimal::Decimal`
//! 2. **Truncation toward zero**: fractional interest is dropped, so a
//!    negative rate never claws back more than the exact amount
//! 3. **Caller policy for durations**: zero or negative durations are not
//!    rejected here; call sites skip accrual when nothing has elapsed

use crate::core::time::SECONDS_PER_YEAR;
use crate::models::coin::{Amount, Coin};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Number of series terms used by [`exp_dec`] for interest accrual.
pub const EXP_SERIES_TERMS: u32 = 18;

/// Upper bound on simulated periods in [`calculate_periods`] when a caller
/// has no tighter limit.
pub const CALCULATE_PERIODS_LIMIT: u64 = 100_000;

/// Errors produced by interest calculations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterestError {
    #[error("Invalid rate string {rate:?}: {reason}")]
    InvalidRate { rate: String, reason: String },

    #[error("Period seconds must be positive, got {0}")]
    NonPositivePeriod(i64),

    #[error("Start time must be positive, got {0}")]
    NonPositiveStartTime(i64),

    #[error("Rate cannot be negative: {0}")]
    NegativeRate(String),

    #[error("Principal and reserve denoms must match, got {principal} and {reserves}")]
    DenomMismatch { principal: String, reserves: String },

    #[error("Minimum interest rate {min} cannot be greater than maximum interest rate {max}")]
    InvalidRateLimits { min: String, max: String },

    #[error("Interest rate {rate} is outside limits [{min}, {max}]")]
    RateOutOfLimits { rate: String, min: String, max: String },

    #[error("Decimal overflow while computing interest")]
    Overflow,
}

/// Parse a signed decimal rate such as `"0.05"` or `"-0.10"`
pub fn parse_rate(rate: &str) -> Result<Decimal, InterestError> {
    Decimal::from_str(rate).map_err(|e| InterestError::InvalidRate {
        rate: rate.to_string(),
        reason: e.to_string(),
    })
}

/// Approximate `e^x` with the first `terms + 1` Maclaurin terms
///
/// ```text
/// e^x = 1 + x + x^2/2! + x^3/3! + ... + x^terms/terms!
/// ```
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use vault_engine_core_rs::interest::exp_dec;
///
/// assert_eq!(exp_dec(Decimal::ZERO, 18).unwrap(), Decimal::ONE);
/// ```
pub fn exp_dec(x: Decimal, terms: u32) -> Result<Decimal, InterestError> {
    let mut result = Decimal::ONE;
    let mut power = Decimal::ONE;
    let mut factorial = Decimal::ONE;

    for i in 1..=terms {
        power = power.checked_mul(x).ok_or(InterestError::Overflow)?;
        factorial = factorial
            .checked_mul(Decimal::from(i))
            .ok_or(InterestError::Overflow)?;
        let term = power.checked_div(factorial).ok_or(InterestError::Overflow)?;
        result = result.checked_add(term).ok_or(InterestError::Overflow)?;
    }

    Ok(result)
}

/// Compute continuously compounded interest on `principal` over `elapsed_seconds`
///
/// Returns a coin in the principal's denom. The amount is negative for a
/// negative rate.
///
/// # Example
/// ```
/// use vault_engine_core_rs::Coin;
/// use vault_engine_core_rs::interest::calculate_interest_earned;
/// use vault_engine_core_rs::core::time::SECONDS_PER_YEAR;
///
/// let earned = calculate_interest_earned(&Coin::new("uusd", 100_000_000), "0.05", SECONDS_PER_YEAR).unwrap();
/// assert_eq!(earned.amount, 5_127_109);
/// ```
pub fn calculate_interest_earned(
    principal: &Coin,
    rate: &str,
    elapsed_seconds: i64,
) -> Result<Coin, InterestError> {
    let r = parse_rate(rate)?;

    let p = Decimal::from_i128(principal.amount).ok_or(InterestError::Overflow)?;
    let t = Decimal::from(elapsed_seconds)
        .checked_div(Decimal::from(SECONDS_PER_YEAR))
        .ok_or(InterestError::Overflow)?;
    let rt = r.checked_mul(t).ok_or(InterestError::Overflow)?;
    let e_rt = exp_dec(rt, EXP_SERIES_TERMS)?;

    let final_amount = p.checked_mul(e_rt).ok_or(InterestError::Overflow)?;
    let interest = final_amount
        .checked_sub(p)
        .ok_or(InterestError::Overflow)?
        .trunc();

    let amount = interest.to_i128().ok_or(InterestError::Overflow)?;
    Ok(Coin::new(principal.denom.clone(), amount))
}

/// Count how many compounding periods `reserves` can fund
///
/// Each period's interest is paid from the remaining reserves and added to
/// the principal. Simulation stops when the interest for the next period is
/// not positive, exceeds what is left, or `limit` periods have been counted.
pub fn calculate_periods(
    reserves: &Coin,
    principal: &Coin,
    rate: &str,
    period_seconds: i64,
    limit: u64,
) -> Result<u64, InterestError> {
    if period_seconds <= 0 {
        return Err(InterestError::NonPositivePeriod(period_seconds));
    }

    let mut remaining = reserves.amount;
    let mut current_principal = principal.clone();
    let mut periods = 0u64;

    while periods < limit {
        let interest = calculate_interest_earned(&current_principal, rate, period_seconds)?;
        if interest.amount <= 0 || remaining < interest.amount {
            break;
        }
        remaining -= interest.amount;
        current_principal.amount = current_principal
            .amount
            .checked_add(interest.amount)
            .ok_or(InterestError::Overflow)?;
        periods += 1;
    }

    Ok(periods)
}

/// Epoch second at which `reserves` can no longer fund interest on `principal`
///
/// A zero rate or zero principal never depletes reserves; `start_time` is
/// returned in that case.
pub fn calculate_expiration(
    principal: &Coin,
    reserves: &Coin,
    rate: &str,
    period_seconds: i64,
    start_time: i64,
    limit: u64,
) -> Result<i64, InterestError> {
    if principal.denom != reserves.denom {
        return Err(InterestError::DenomMismatch {
            principal: principal.denom.clone(),
            reserves: reserves.denom.clone(),
        });
    }
    if period_seconds <= 0 {
        return Err(InterestError::NonPositivePeriod(period_seconds));
    }
    if start_time <= 0 {
        return Err(InterestError::NonPositiveStartTime(start_time));
    }
    let r = parse_rate(rate)?;
    if r.is_sign_negative() && !r.is_zero() {
        return Err(InterestError::NegativeRate(rate.to_string()));
    }
    if r.is_zero() || principal.is_zero() {
        return Ok(start_time);
    }

    let periods = calculate_periods(reserves, principal, rate, period_seconds, limit)?;
    let periods = i64::try_from(periods).map_err(|_| InterestError::Overflow)?;

    period_seconds
        .checked_mul(periods)
        .and_then(|total| start_time.checked_add(total))
        .ok_or(InterestError::Overflow)
}

/// Total assets including interest accrued since `period_start` but not yet
/// reconciled
///
/// Nothing is transferred; this only estimates what a reconciliation at
/// `now` would produce. An empty rate or a non-positive elapsed time returns
/// `total_assets` unchanged.
pub fn estimate_total_assets(
    total_assets: &Coin,
    rate: &str,
    period_start: i64,
    now: i64,
) -> Result<Amount, InterestError> {
    if rate.is_empty() {
        return Ok(total_assets.amount);
    }
    let elapsed = now - period_start;
    if elapsed <= 0 {
        return Ok(total_assets.amount);
    }
    let earned = calculate_interest_earned(total_assets, rate, elapsed)?;
    total_assets
        .amount
        .checked_add(earned.amount)
        .ok_or(InterestError::Overflow)
}

/// Check that `min` and `max` parse and that `min <= max`
///
/// Empty strings mean "unset" and always pass.
pub fn validate_interest_rate_limits(min: &str, max: &str) -> Result<(), InterestError> {
    if min.is_empty() || max.is_empty() {
        return Ok(());
    }
    let min_rate = parse_rate(min)?;
    let max_rate = parse_rate(max)?;
    if min_rate > max_rate {
        return Err(InterestError::InvalidRateLimits {
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

/// Check that `rate` lies within the optional `[min, max]` limits
pub fn check_rate_within_limits(rate: &str, min: &str, max: &str) -> Result<(), InterestError> {
    validate_interest_rate_limits(min, max)?;
    if rate.is_empty() {
        return Ok(());
    }
    let r = parse_rate(rate)?;
    let below = !min.is_empty() && r < parse_rate(min)?;
    let above = !max.is_empty() && r > parse_rate(max)?;
    if below || above {
        return Err(InterestError::RateOutOfLimits {
            rate: rate.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}
