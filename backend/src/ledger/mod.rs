//! Balance ledger
//!
//! The engine moves funds only through the [`BankLedger`] trait. Every call
//! is atomic: either the whole transfer or burn happens, or no balance
//! changes. [`InMemoryLedger`] is the in-process implementation used by the
//! engine's tests and by embedders without their own bank.
//!
//! # Critical Invariants
//!
//! - **Atomicity**: debit and credit happen together, or neither
//! - **Conservation**: transfers never change total supply; only burns and
//!   mints do
//! - **No overdraft**: balances never go negative

use crate::models::coin::{Amount, Coin};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors returned by ledger primitives
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds in {account}: required {required}{denom}, available {available}{denom}")]
    InsufficientFunds {
        account: String,
        denom: String,
        required: Amount,
        available: Amount,
    },

    #[error("Account {0} is restricted from sending or receiving")]
    SendRestricted(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Amount),
}

/// Balance transfer primitive consumed by the engine
pub trait BankLedger {
    /// Balance of `denom` held by `account` (0 if none)
    fn balance(&self, account: &str, denom: &str) -> Amount;

    /// Every non-zero balance held by `account`, ordered by denom
    fn all_balances(&self, account: &str) -> Vec<Coin>;

    /// Move `coin` from `from` to `to`
    fn transfer(&mut self, from: &str, to: &str, coin: &Coin) -> Result<(), LedgerError>;

    /// Destroy `coin` held by `account`
    fn burn(&mut self, account: &str, coin: &Coin) -> Result<(), LedgerError>;
}

/// In-memory ledger with per-denom supply tracking
///
/// # Example
/// ```
/// use vault_engine_core_rs::Coin;
/// use vault_engine_core_rs::ledger::{BankLedger, InMemoryLedger};
///
/// let mut ledger = InMemoryLedger::new();
/// ledger.mint("alice", &Coin::new("uusd", 1_000)).unwrap();
/// ledger.transfer("alice", "bob", &Coin::new("uusd", 400)).unwrap();
///
/// assert_eq!(ledger.balance("alice", "uusd"), 600);
/// assert_eq!(ledger.balance("bob", "uusd"), 400);
/// assert_eq!(ledger.supply("uusd"), 1_000);
///
/// // Overdraft leaves balances untouched
/// assert!(ledger.transfer("bob", "alice", &Coin::new("uusd", 401)).is_err());
/// assert_eq!(ledger.balance("bob", "uusd"), 400);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryLedger {
    balances: BTreeMap<String, BTreeMap<String, Amount>>,
    supply: BTreeMap<String, Amount>,
    restricted: BTreeSet<String>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `coin` in `account`
    pub fn mint(&mut self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
        if coin.is_negative() {
            return Err(LedgerError::InvalidAmount(coin.amount));
        }
        let supply = self.supply.get(&coin.denom).copied().unwrap_or(0);
        let new_supply = supply
            .checked_add(coin.amount)
            .ok_or(LedgerError::InvalidAmount(coin.amount))?;
        let balance = self.balance(account, &coin.denom);
        let new_balance = balance
            .checked_add(coin.amount)
            .ok_or(LedgerError::InvalidAmount(coin.amount))?;

        self.supply.insert(coin.denom.clone(), new_supply);
        self.set_balance(account, &coin.denom, new_balance);
        Ok(())
    }

    /// Total minted minus burned for `denom`
    pub fn supply(&self, denom: &str) -> Amount {
        self.supply.get(denom).copied().unwrap_or(0)
    }

    /// Block `account` from sending or receiving
    pub fn restrict(&mut self, account: impl Into<String>) {
        self.restricted.insert(account.into());
    }

    pub fn unrestrict(&mut self, account: &str) {
        self.restricted.remove(account);
    }

    fn set_balance(&mut self, account: &str, denom: &str, amount: Amount) {
        let balances = self.balances.entry(account.to_string()).or_default();
        if amount == 0 {
            balances.remove(denom);
        } else {
            balances.insert(denom.to_string(), amount);
        }
    }

    fn check_debit(&self, account: &str, coin: &Coin) -> Result<Amount, LedgerError> {
        if coin.is_negative() {
            return Err(LedgerError::InvalidAmount(coin.amount));
        }
        if self.restricted.contains(account) {
            return Err(LedgerError::SendRestricted(account.to_string()));
        }
        let available = self.balance(account, &coin.denom);
        if available < coin.amount {
            return Err(LedgerError::InsufficientFunds {
                account: account.to_string(),
                denom: coin.denom.clone(),
                required: coin.amount,
                available,
            });
        }
        Ok(available - coin.amount)
    }
}

impl BankLedger for InMemoryLedger {
    fn balance(&self, account: &str, denom: &str) -> Amount {
        self.balances
            .get(account)
            .and_then(|balances| balances.get(denom))
            .copied()
            .unwrap_or(0)
    }

    fn all_balances(&self, account: &str) -> Vec<Coin> {
        self.balances
            .get(account)
            .map(|balances| {
                balances
                    .iter()
                    .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn transfer(&mut self, from: &str, to: &str, coin: &Coin) -> Result<(), LedgerError> {
        let remaining = self.check_debit(from, coin)?;
        if self.restricted.contains(to) {
            return Err(LedgerError::SendRestricted(to.to_string()));
        }
        if coin.is_zero() || from == to {
            return Ok(());
        }
        let credited = self
            .balance(to, &coin.denom)
            .checked_add(coin.amount)
            .ok_or(LedgerError::InvalidAmount(coin.amount))?;

        // All checks passed; apply both sides
        self.set_balance(from, &coin.denom, remaining);
        self.set_balance(to, &coin.denom, credited);
        Ok(())
    }

    fn burn(&mut self, account: &str, coin: &Coin) -> Result<(), LedgerError> {
        let remaining = self.check_debit(account, coin)?;
        if coin.is_zero() {
            return Ok(());
        }
        let supply = self.supply(&coin.denom) - coin.amount;
        self.set_balance(account, &coin.denom, remaining);
        self.supply.insert(coin.denom.clone(), supply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded() -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new();
        ledger.mint("alice", &Coin::new("uusd", 1_000)).unwrap();
        ledger
    }

    #[test]
    fn test_insufficient_funds_reports_shortfall() {
        let mut ledger = funded();
        let err = ledger
            .transfer("alice", "bob", &Coin::new("uusd", 1_001))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account: "alice".to_string(),
                denom: "uusd".to_string(),
                required: 1_001,
                available: 1_000,
            }
        );
    }

    #[test]
    fn test_restricted_receiver_blocks_transfer() {
        let mut ledger = funded();
        ledger.restrict("bob");
        assert_eq!(
            ledger.transfer("alice", "bob", &Coin::new("uusd", 1)),
            Err(LedgerError::SendRestricted("bob".to_string()))
        );
        assert_eq!(ledger.balance("alice", "uusd"), 1_000);

        ledger.unrestrict("bob");
        assert!(ledger.transfer("alice", "bob", &Coin::new("uusd", 1)).is_ok());
    }

    #[test]
    fn test_burn_reduces_supply() {
        let mut ledger = funded();
        ledger.burn("alice", &Coin::new("uusd", 250)).unwrap();
        assert_eq!(ledger.balance("alice", "uusd"), 750);
        assert_eq!(ledger.supply("uusd"), 750);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut ledger = funded();
        assert_eq!(
            ledger.transfer("alice", "bob", &Coin::new("uusd", -5)),
            Err(LedgerError::InvalidAmount(-5))
        );
    }

    #[test]
    fn test_all_balances_sorted_and_non_zero() {
        let mut ledger = funded();
        ledger.mint("alice", &Coin::new("aaa", 3)).unwrap();
        ledger.transfer("alice", "bob", &Coin::new("aaa", 3)).unwrap();
        assert_eq!(ledger.all_balances("alice"), vec![Coin::new("uusd", 1_000)]);
        assert_eq!(ledger.all_balances("bob"), vec![Coin::new("aaa", 3)]);
    }
}
