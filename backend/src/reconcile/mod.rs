//! Interest Reconciliation
//!
//! When a vault's period timeout comes due, the interest accrued on its
//! principal since `period_start` is settled between the vault account
//! (reserves) and the principal account:
//!
//! - positive interest moves reserves → principal
//! - negative interest moves principal → reserves
//!
//! Afterwards the vault re-enters verification, where [`can_payout`] decides
//! whether its reserves can fund another window.
//!
//! Pending withdrawals are escrowed in the vault account too. That escrow
//! belongs to the withdrawing owner and is never counted as reserves.
//!
//! # Critical Invariants
//!
//! 1. **Paused vaults do not accrue**
//! 2. **No partial transfers**: a shortfall is an error before any funds move
//! 3. **Zero elapsed is a no-op**
//! 4. **Escrow is untouchable**: interest is paid only from
//!    `balance(vault) - escrowed`

pub mod state_machine;

pub use state_machine::{PeriodState, PeriodStateError, PeriodStateExport, PeriodStateMachine};

use crate::interest::{
    calculate_interest_earned, calculate_periods, estimate_total_assets, parse_rate,
    InterestError,
};
use crate::ledger::{BankLedger, LedgerError};
use crate::models::coin::{Amount, Coin};
use crate::models::event::{Event, EventLog};
use crate::models::vault::Vault;
use crate::queue::WithdrawalQueue;
use rust_decimal::Decimal;
use std::ops::ControlFlow;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Interest calculation failed: {0}")]
    Interest(#[from] InterestError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Insufficient reserves in {vault} to pay interest: required {required}, available {available}")]
    InsufficientReserves {
        vault: String,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient principal in {vault} to reclaim negative interest: required {required}, available {available}")]
    InsufficientPrincipal {
        vault: String,
        required: Amount,
        available: Amount,
    },

    #[error("Pending withdrawal escrow for {0} overflows")]
    EscrowOverflow(String),
}

/// Underlying assets escrowed at `vault`'s account for pending withdrawals
pub fn withdrawal_escrow(queue: &WithdrawalQueue, vault: &Vault) -> Result<Amount, ReconcileError> {
    let mut total: Amount = 0;
    queue.walk_by_owner::<ReconcileError, _>(&vault.address, |_, _, request| {
        if request.assets.denom == vault.underlying_asset {
            total = total
                .checked_add(request.assets.amount)
                .ok_or_else(|| ReconcileError::EscrowOverflow(vault.address.clone()))?;
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(total)
}

/// Vault account balance not held for pending withdrawals
fn available_reserves<L: BankLedger>(ledger: &L, vault: &Vault, escrowed: Amount) -> Amount {
    ledger
        .balance(&vault.address, &vault.underlying_asset)
        .saturating_sub(escrowed)
        .max(0)
}

/// Settle interest accrued on `vault` from `period_start` to `now`
///
/// `escrowed` is the underlying held at the vault account for pending
/// withdrawals (see [`withdrawal_escrow`]); it is never paid out as interest.
/// Returns the signed interest moved, or `None` when nothing was due
/// (paused vault, no rate, nothing elapsed, or zero interest). The caller
/// starts the next period.
pub fn reconcile_vault_interest<L: BankLedger>(
    ledger: &mut L,
    vault: &Vault,
    escrowed: Amount,
    events: &mut EventLog,
    now: i64,
) -> Result<Option<Coin>, ReconcileError> {
    if vault.paused || vault.current_interest_rate.is_empty() {
        return Ok(None);
    }
    let elapsed = now - vault.period_start;
    if elapsed <= 0 {
        return Ok(None);
    }

    let denom = &vault.underlying_asset;
    let principal = Coin::new(
        denom.clone(),
        ledger.balance(&vault.principal_address, denom),
    );
    let interest = calculate_interest_earned(&principal, &vault.current_interest_rate, elapsed)?;

    if interest.is_zero() {
        return Ok(None);
    }

    if interest.is_positive() {
        let reserves = available_reserves(ledger, vault, escrowed);
        if reserves < interest.amount {
            return Err(ReconcileError::InsufficientReserves {
                vault: vault.address.clone(),
                required: interest.amount,
                available: reserves,
            });
        }
        ledger.transfer(&vault.address, &vault.principal_address, &interest)?;
    } else {
        let owed = Coin::new(denom.clone(), -interest.amount);
        if principal.amount < owed.amount {
            return Err(ReconcileError::InsufficientPrincipal {
                vault: vault.address.clone(),
                required: owed.amount,
                available: principal.amount,
            });
        }
        ledger.transfer(&vault.principal_address, &vault.address, &owed)?;
    }

    events.log(Event::InterestReconciled {
        time: now,
        vault: vault.address.clone(),
        principal,
        interest: interest.clone(),
        rate: vault.current_interest_rate.clone(),
        period_start: vault.period_start,
        period_end: now,
    });

    Ok(Some(interest))
}

/// True if `vault`'s reserves can fund at least one `window` of interest
///
/// Nothing needs funding when the rate is unset, zero or negative, or when
/// principal is empty; such vaults are always payable. Reserves exclude the
/// `escrowed` pending-withdrawal balance.
pub fn can_payout<L: BankLedger>(
    ledger: &L,
    vault: &Vault,
    escrowed: Amount,
    window: i64,
) -> Result<bool, ReconcileError> {
    let rate = &vault.current_interest_rate;
    if rate.is_empty() {
        return Ok(true);
    }
    let parsed = parse_rate(rate)?;
    if parsed <= Decimal::ZERO {
        return Ok(true);
    }

    let denom = &vault.underlying_asset;
    let principal = Coin::new(
        denom.clone(),
        ledger.balance(&vault.principal_address, denom),
    );
    if !principal.is_positive() {
        return Ok(true);
    }
    let reserves = Coin::new(denom.clone(), available_reserves(ledger, vault, escrowed));

    let periods = calculate_periods(&reserves, &principal, rate, window, 1)?;
    Ok(periods > 0)
}

/// `total_assets` plus interest accrued since the vault's `period_start`
pub fn estimate_vault_total_assets(
    vault: &Vault,
    total_assets: &Coin,
    now: i64,
) -> Result<Amount, ReconcileError> {
    if vault.period_start <= 0 {
        return Ok(total_assets.amount);
    }
    Ok(estimate_total_assets(
        total_assets,
        &vault.current_interest_rate,
        vault.period_start,
        now,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::SECONDS_PER_YEAR;
    use crate::ledger::InMemoryLedger;

    fn setup(rate: &str, principal: Amount, reserves: Amount) -> (InMemoryLedger, Vault) {
        let mut ledger = InMemoryLedger::new();
        ledger.mint("p1", &Coin::new("uusd", principal)).unwrap();
        ledger.mint("v1", &Coin::new("uusd", reserves)).unwrap();
        let mut vault = Vault::new("v1", "vshare", "uusd", "p1").with_interest_rate(rate);
        vault.period_start = 1;
        (ledger, vault)
    }

    #[test]
    fn test_positive_interest_moves_reserves_to_principal() {
        let (mut ledger, vault) = setup("0.05", 100_000_000, 10_000_000);
        let mut events = EventLog::new();

        let moved = reconcile_vault_interest(&mut ledger, &vault, 0, &mut events, 1 + SECONDS_PER_YEAR)
            .unwrap()
            .unwrap();

        assert_eq!(moved.amount, 5_127_109);
        assert_eq!(ledger.balance("p1", "uusd"), 105_127_109);
        assert_eq!(ledger.balance("v1", "uusd"), 10_000_000 - 5_127_109);
        assert_eq!(events.events_of_type("InterestReconciled").len(), 1);
    }

    #[test]
    fn test_negative_interest_moves_principal_to_reserves() {
        let (mut ledger, vault) = setup("-0.05", 100_000_000, 0);
        let mut events = EventLog::new();

        let moved = reconcile_vault_interest(&mut ledger, &vault, 0, &mut events, 1 + SECONDS_PER_YEAR)
            .unwrap()
            .unwrap();

        assert!(moved.is_negative());
        assert_eq!(ledger.balance("v1", "uusd"), -moved.amount);
        assert_eq!(ledger.balance("p1", "uusd"), 100_000_000 + moved.amount);
    }

    #[test]
    fn test_short_reserves_is_an_error_and_moves_nothing() {
        let (mut ledger, vault) = setup("0.05", 100_000_000, 10);
        let mut events = EventLog::new();

        let err = reconcile_vault_interest(&mut ledger, &vault, 0, &mut events, 1 + SECONDS_PER_YEAR)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InsufficientReserves { .. }));
        assert_eq!(ledger.balance("p1", "uusd"), 100_000_000);
        assert!(events.is_empty());
    }

    #[test]
    fn test_paused_or_zero_elapsed_is_noop() {
        let (mut ledger, mut vault) = setup("0.05", 100_000_000, 10_000_000);
        let mut events = EventLog::new();

        assert_eq!(
            reconcile_vault_interest(&mut ledger, &vault, 0, &mut events, 1),
            Ok(None)
        );
        vault.paused = true;
        assert_eq!(
            reconcile_vault_interest(&mut ledger, &vault, 0, &mut events, 1 + SECONDS_PER_YEAR),
            Ok(None)
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_can_payout() {
        let (ledger, vault) = setup("0.05", 100_000_000, 10_000_000);
        assert_eq!(can_payout(&ledger, &vault, 0, 72_000), Ok(true));

        let (ledger, vault) = setup("0.05", 100_000_000, 0);
        assert_eq!(can_payout(&ledger, &vault, 0, 72_000), Ok(false));

        let (ledger, vault) = setup("0", 100_000_000, 0);
        assert_eq!(can_payout(&ledger, &vault, 0, 72_000), Ok(true));

        let (ledger, vault) = setup("-0.1", 100_000_000, 0);
        assert_eq!(can_payout(&ledger, &vault, 0, 72_000), Ok(true));

        let (ledger, vault) = setup("0.05", 0, 0);
        assert_eq!(can_payout(&ledger, &vault, 0, 72_000), Ok(true));
    }

    #[test]
    fn test_escrowed_balance_is_not_reserves() {
        let (mut ledger, vault) = setup("0.05", 100_000_000, 10_000_000);
        let mut events = EventLog::new();

        assert_eq!(can_payout(&ledger, &vault, 10_000_000, 72_000), Ok(false));
        let err = reconcile_vault_interest(
            &mut ledger,
            &vault,
            10_000_000,
            &mut events,
            1 + SECONDS_PER_YEAR,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InsufficientReserves {
                vault: "v1".to_string(),
                required: 5_127_109,
                available: 0,
            }
        );
        assert_eq!(ledger.balance("v1", "uusd"), 10_000_000);
    }

    #[test]
    fn test_withdrawal_escrow_sums_underlying_for_vault() {
        use crate::models::payout::PendingWithdrawal;

        let (_, vault) = setup("0.05", 0, 0);
        let mut queue = WithdrawalQueue::new();
        for (owner, vault_address, coin) in [
            ("alice", "v1", Coin::new("uusd", 300)),
            ("bob", "v1", Coin::new("uusd", 200)),
            ("carol", "v1", Coin::new("upay", 999)),
            ("dave", "v2", Coin::new("uusd", 50)),
        ] {
            queue
                .enqueue(
                    10,
                    vault_address,
                    PendingWithdrawal {
                        owner: owner.to_string(),
                        vault_address: vault_address.to_string(),
                        assets: coin,
                    },
                )
                .unwrap();
        }

        assert_eq!(withdrawal_escrow(&queue, &vault), Ok(500));
    }

    #[test]
    fn test_estimate_adds_unreconciled_interest() {
        let (_, vault) = setup("0.05", 0, 0);
        let estimate =
            estimate_vault_total_assets(&vault, &Coin::new("uusd", 100_000_000), 1 + SECONDS_PER_YEAR)
                .unwrap();
        assert_eq!(estimate, 105_127_109);
    }
}
