//! Interest Calculation Tests
//!
//! Reference values for continuously compounded interest, expiration of
//! reserves, and rate-limit validation.

use rust_decimal::Decimal;
use vault_engine_core_rs::core::time::SECONDS_PER_YEAR;
use vault_engine_core_rs::interest::{
    calculate_expiration, calculate_interest_earned, calculate_periods, check_rate_within_limits,
    estimate_total_assets, exp_dec, validate_interest_rate_limits, InterestError,
    CALCULATE_PERIODS_LIMIT, EXP_SERIES_TERMS,
};
use vault_engine_core_rs::Coin;

// ============================================================================
// Test Helpers
// ============================================================================

fn coin(amount: i128) -> Coin {
    Coin::new("uatom", amount)
}

fn earned(principal: i128, rate: &str, seconds: i64) -> i128 {
    calculate_interest_earned(&coin(principal), rate, seconds)
        .unwrap()
        .amount
}

/// 2025-07-17T14:58:41Z
const START: i64 = 1_752_764_321;

// ============================================================================
// Interest Earned
// ============================================================================

#[test]
fn test_one_year_at_five_percent() {
    assert_eq!(earned(100_000_000, "0.05", SECONDS_PER_YEAR), 5_127_109);
}

#[test]
fn test_six_months_at_ten_percent() {
    assert_eq!(earned(500_000_000, "0.10", SECONDS_PER_YEAR / 2), 25_635_548);
}

#[test]
fn test_tiny_rate_over_one_minute_is_zero() {
    assert_eq!(earned(1_000_000, "0.00001", 60), 0);
}

#[test]
fn test_large_amount_over_ten_years() {
    assert_eq!(
        earned(1_000_000_000_000, "0.03", SECONDS_PER_YEAR * 10),
        349_858_807_576
    );
}

#[test]
fn test_result_keeps_principal_denom() {
    let result = calculate_interest_earned(&coin(1_000), "0.05", 60).unwrap();
    assert_eq!(result.denom, "uatom");
}

#[test]
fn test_negative_rate_truncates_toward_zero() {
    // 1e8 * (e^-0.05 - 1) = -4_877_057.55
    assert_eq!(earned(100_000_000, "-0.05", SECONDS_PER_YEAR), -4_877_057);
}

#[test]
fn test_sign_symmetry() {
    for (principal, rate, seconds) in [
        (100_000_000, "0.05", SECONDS_PER_YEAR),
        (1_000_000_000_000, "0.08", 86_400),
        (525_500_000, "1.0", 3_600),
    ] {
        let negative_rate = format!("-{}", rate);
        let gain = earned(principal, rate, seconds);
        let loss = earned(principal, &negative_rate, seconds);

        assert!(gain > 0);
        assert!(loss < 0);
        // e^x - 1 >= 1 - e^-x, so the clawback is never larger than the gain
        assert!(-loss <= gain, "gain {} loss {}", gain, loss);
    }
}

#[test]
fn test_zero_rate_and_zero_principal_earn_nothing() {
    assert_eq!(earned(100_000_000, "0", SECONDS_PER_YEAR), 0);
    assert_eq!(earned(0, "0.05", SECONDS_PER_YEAR), 0);
}

#[test]
fn test_invalid_rate_rejected() {
    let err = calculate_interest_earned(&coin(100), "not_a_rate", SECONDS_PER_YEAR).unwrap_err();
    assert!(matches!(err, InterestError::InvalidRate { .. }));
}

#[test]
fn test_exp_series_anchor_points() {
    assert_eq!(exp_dec(Decimal::ZERO, EXP_SERIES_TERMS).unwrap(), Decimal::ONE);

    let e = exp_dec(Decimal::ONE, EXP_SERIES_TERMS).unwrap();
    assert!(e > Decimal::new(2_718_281, 6) && e < Decimal::new(2_718_282, 6));
}

// ============================================================================
// Periods and Expiration
// ============================================================================

#[test]
fn test_calculate_periods_with_empty_reserves() {
    let periods = calculate_periods(&coin(0), &coin(1_000_000), "0.05", 86_400, 10).unwrap();
    assert_eq!(periods, 0);
}

#[test]
fn test_calculate_periods_respects_limit() {
    let periods =
        calculate_periods(&coin(1_000_000_000), &coin(1_000_000), "0.05", 86_400, 7).unwrap();
    assert_eq!(periods, 7);
}

#[test]
fn test_calculate_periods_rejects_non_positive_period() {
    assert_eq!(
        calculate_periods(&coin(10), &coin(10), "0.05", 0, 10),
        Err(InterestError::NonPositivePeriod(0))
    );
}

#[test]
fn test_expiration_never_with_zero_rate() {
    let exp = calculate_expiration(
        &coin(100_000),
        &coin(500_000),
        "0.0",
        60,
        START,
        CALCULATE_PERIODS_LIMIT,
    )
    .unwrap();
    assert_eq!(exp, START);
}

#[test]
fn test_expiration_never_with_zero_principal() {
    let exp = calculate_expiration(
        &coin(0),
        &coin(500_000),
        "0.1",
        60,
        START,
        CALCULATE_PERIODS_LIMIT,
    )
    .unwrap();
    assert_eq!(exp, START);
}

#[test]
fn test_expiration_depletes_quickly_with_high_rate() {
    // One minute at 100% on 525.5M is ~999 units; 1000 reserves fund one period
    let exp = calculate_expiration(
        &coin(525_500_000),
        &coin(1_000),
        "1.0",
        60,
        START,
        CALCULATE_PERIODS_LIMIT,
    )
    .unwrap();
    assert_eq!(exp, START + 60);
}

#[test]
fn test_expiration_errors() {
    let err = calculate_expiration(
        &Coin::new("foo", 1_000),
        &Coin::new("bar", 1_000),
        "0.1",
        60,
        START,
        CALCULATE_PERIODS_LIMIT,
    )
    .unwrap_err();
    assert!(matches!(err, InterestError::DenomMismatch { .. }));

    assert_eq!(
        calculate_expiration(&coin(1_000), &coin(1_000), "0.1", 0, START, 10),
        Err(InterestError::NonPositivePeriod(0))
    );
    assert!(matches!(
        calculate_expiration(&coin(1_000), &coin(1_000), "not-a-number", 60, START, 10),
        Err(InterestError::InvalidRate { .. })
    ));
    assert!(matches!(
        calculate_expiration(&coin(1_000), &coin(1_000), "-0.1", 60, START, 10),
        Err(InterestError::NegativeRate(_))
    ));
    assert!(matches!(
        calculate_expiration(&coin(1_000), &coin(1_000), "0.1", 60, 0, 10),
        Err(InterestError::NonPositiveStartTime(0))
    ));
}

// ============================================================================
// Estimation and Limits
// ============================================================================

#[test]
fn test_estimate_total_assets() {
    let total = coin(100_000_000);
    assert_eq!(
        estimate_total_assets(&total, "0.05", 1, 1 + SECONDS_PER_YEAR).unwrap(),
        105_127_109
    );
    assert_eq!(
        estimate_total_assets(&total, "", 1, 1 + SECONDS_PER_YEAR).unwrap(),
        100_000_000
    );
    assert_eq!(
        estimate_total_assets(&total, "0.05", 500, 500).unwrap(),
        100_000_000
    );
}

#[test]
fn test_rate_limit_validation() {
    assert!(validate_interest_rate_limits("", "").is_ok());
    assert!(validate_interest_rate_limits("", "0.05").is_ok());
    assert!(validate_interest_rate_limits("0.01", "0.05").is_ok());
    assert!(matches!(
        validate_interest_rate_limits("0.1", "0.05"),
        Err(InterestError::InvalidRateLimits { .. })
    ));
}

#[test]
fn test_rate_within_limits() {
    assert!(check_rate_within_limits("0.05", "0.0", "0.1").is_ok());
    assert!(check_rate_within_limits("", "0.0", "0.1").is_ok());
    assert!(check_rate_within_limits("0.5", "", "").is_ok());
    assert!(matches!(
        check_rate_within_limits("0.2", "0.0", "0.1"),
        Err(InterestError::RateOutOfLimits { .. })
    ));
    assert!(matches!(
        check_rate_within_limits("-0.01", "0.0", ""),
        Err(InterestError::RateOutOfLimits { .. })
    ));
}
