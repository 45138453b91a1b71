//! Share Math Tests
//!
//! Covers the pro-rata conversions with virtual offsets:
//! - Neutral first deposit
//! - Anti-dilution after a large donation
//! - Floor consistency (deposit then redeem never gains)
//! - Dust floors to zero without error

use proptest::prelude::*;
use vault_engine_core_rs::core::shares::{
    assets_from_shares, shares_from_assets, ShareMathError, SHARE_SCALAR, VIRTUAL_SHARES,
};

// ============================================================================
// Deposit → Shares
// ============================================================================

#[test]
fn test_first_deposit_mints_at_neutral_ratio() {
    assert_eq!(shares_from_assets(1, 1, 0, 0).unwrap(), SHARE_SCALAR);
    assert_eq!(shares_from_assets(250, 1, 0, 0).unwrap(), 250 * SHARE_SCALAR);
}

#[test]
fn test_first_deposit_check_uses_raw_total_assets() {
    // Existing shares but zero assets still counts as a first deposit
    assert_eq!(shares_from_assets(3, 1, 0, 999).unwrap(), 3 * SHARE_SCALAR);
}

#[test]
fn test_priced_deposit_is_not_pre_floored() {
    // 3 units at 3/2 = 4.5 underlying; flooring first would give 4
    assert_eq!(shares_from_assets(9, 2, 0, 0).unwrap(), 4_500_000);
}

#[test]
fn test_deposit_into_existing_vault() {
    // 100 units into a vault holding 1000 units and 1000 * SCALAR shares
    let shares = shares_from_assets(100, 1, 1_000, 1_000 * SHARE_SCALAR).unwrap();
    // 100 * (1e9 + 1e6) / 1001
    assert_eq!(shares, 100 * (1_000 * SHARE_SCALAR + VIRTUAL_SHARES) / 1_001);
}

#[test]
fn test_zero_deposit_mints_nothing() {
    assert_eq!(shares_from_assets(0, 0, 10, 10).unwrap(), 0);
}

#[test]
fn test_deposit_input_errors() {
    assert_eq!(
        shares_from_assets(-1, 1, 0, 0),
        Err(ShareMathError::NegativeInput)
    );
    assert_eq!(
        shares_from_assets(1, 1, -5, 0),
        Err(ShareMathError::NegativeInput)
    );
    assert_eq!(
        shares_from_assets(1, 0, 10, 10),
        Err(ShareMathError::ZeroDenominator)
    );
    assert_eq!(
        shares_from_assets(i128::MAX, 1, 0, 0),
        Err(ShareMathError::Overflow)
    );
}

// ============================================================================
// Shares → Payout
// ============================================================================

#[test]
fn test_redeem_in_underlying() {
    // 100 units of a 1000-unit vault with 1000 * SCALAR shares
    let payout = assets_from_shares(100 * SHARE_SCALAR, 1_000 * SHARE_SCALAR, 1_000, 1, 1).unwrap();
    assert_eq!(payout, 100);
}

#[test]
fn test_redeem_in_priced_denom() {
    // Payout denom worth 2 underlying per unit halves the payout
    let payout = assets_from_shares(100 * SHARE_SCALAR, 1_000 * SHARE_SCALAR, 1_000, 2, 1).unwrap();
    assert_eq!(payout, 50);
}

#[test]
fn test_zero_shares_redeem_nothing() {
    assert_eq!(assets_from_shares(0, 10, 10, 1, 1).unwrap(), 0);
}

#[test]
fn test_redeem_input_errors() {
    assert_eq!(
        assets_from_shares(-1, 10, 10, 1, 1),
        Err(ShareMathError::NegativeInput)
    );
    assert_eq!(
        assets_from_shares(1, 10, 10, -1, 1),
        Err(ShareMathError::NegativeInput)
    );
}

// ============================================================================
// Manipulation Resistance
// ============================================================================

#[test]
fn test_anti_dilution_after_donation() {
    // Attacker deposits 1 unit first
    let attacker_shares = shares_from_assets(1, 1, 0, 0).unwrap();
    assert_eq!(attacker_shares, SHARE_SCALAR);

    // Then donates 1e9 units directly, minting nothing
    let total_assets: i128 = 1 + 1_000_000_000;
    let total_shares = attacker_shares;

    let payout = assets_from_shares(attacker_shares, total_shares, total_assets, 1, 1).unwrap();
    assert!(payout >= 1, "payout {} below original deposit", payout);
    assert!(payout <= total_assets, "payout {} above vault assets", payout);

    // The virtual shares absorb part of the donation
    assert!(payout < total_assets);

    // A later depositor of 1000 units is not rounded down to zero shares
    let victim_shares = shares_from_assets(1_000, 1, total_assets, total_shares).unwrap();
    assert!(victim_shares > 0);
}

#[test]
fn test_dust_deposit_floors_to_zero_shares() {
    let shares = shares_from_assets(1, 1, 1_000_000_000_000, 0).unwrap();
    assert_eq!(shares, 0);
}

#[test]
fn test_dust_shares_floor_to_zero_payout() {
    let payout = assets_from_shares(1, 1_000_000_000_000, 10, 1, 1).unwrap();
    assert_eq!(payout, 0);
}

proptest! {
    /// Deposit then immediate redeem at unchanged totals never returns more
    #[test]
    fn prop_deposit_then_redeem_never_gains(
        deposit in 0i128..1_000_000_000_000,
        total_assets in 0i128..1_000_000_000_000,
        total_shares in 0i128..1_000_000_000_000_000_000,
    ) {
        let shares = shares_from_assets(deposit, 1, total_assets, total_shares).unwrap();
        let payout = assets_from_shares(shares, total_shares, total_assets, 1, 1).unwrap();
        prop_assert!(payout <= deposit, "deposit {} redeemed for {}", deposit, payout);
    }

    /// Redeeming never pays more than the vault plus its virtual unit
    #[test]
    fn prop_redeem_bounded_by_total_assets(
        total_shares in 1i128..1_000_000_000_000_000_000,
        total_assets in 0i128..1_000_000_000_000,
        fraction in 0u32..=1_000,
    ) {
        let shares = total_shares * i128::from(fraction) / 1_000;
        let payout = assets_from_shares(shares, total_shares, total_assets, 1, 1).unwrap();
        prop_assert!(payout <= total_assets + 1);
    }
}
