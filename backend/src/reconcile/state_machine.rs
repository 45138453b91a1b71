//! Reconciliation period state machine
//!
//! Every tracked vault is in exactly one of two states:
//!
//! ```text
//!                  to_timeout_scheduled(now)
//!   AwaitingVerification ─────────────────────► TimeoutScheduled(now + window)
//!            ▲                                          │
//!            └──────────── to_verification(now) ◄───────┘
//!                       (timeout came due, interest reconciled)
//! ```
//!
//! The verification set and the timeout queue are private to
//! [`PeriodStateMachine`]; the only mutating operations are the two
//! transitions and whole-vault removal, and each transition removes the vault
//! from the other side. Mutual exclusion is therefore structural.
//!
//! Both transitions also write the vault's `(period_start, period_timeout)`
//! pair through the [`VaultAccount`] capability.

use crate::models::vault::VaultAccount;
use crate::queue::{DueEntry, DueQueue, QueueError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::ops::ControlFlow;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodStateError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Timeout overflows: now {now} + window {window}")]
    TimeoutOverflow { now: i64, window: i64 },

    #[error("Vault {0} is both awaiting verification and scheduled")]
    MutualExclusionViolated(String),

    #[error("Vault {0} has more than one scheduled timeout")]
    DuplicateTimeout(String),
}

/// Where a vault currently is in its reconciliation period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodState {
    AwaitingVerification,
    TimeoutScheduled { timeout: i64 },
}

/// Serialized form of the state machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStateExport {
    pub verification: Vec<String>,
    pub timeouts: Vec<DueEntry<String, ()>>,
}

/// Owner of the timeout queue and the verification set
///
/// # Example
/// ```
/// use vault_engine_core_rs::models::vault::{Vault, VaultAccount};
/// use vault_engine_core_rs::reconcile::{PeriodState, PeriodStateMachine};
///
/// let mut periods = PeriodStateMachine::new(72_000);
/// let mut vault = Vault::new("vault1", "vshare", "uusd", "p1");
///
/// periods.to_verification(&mut vault, 100).unwrap();
/// assert_eq!(periods.state("vault1"), Some(PeriodState::AwaitingVerification));
///
/// periods.to_timeout_scheduled(&mut vault, 200).unwrap();
/// assert_eq!(periods.state("vault1"), Some(PeriodState::TimeoutScheduled { timeout: 72_200 }));
/// assert_eq!((vault.period_start(), vault.period_timeout()), (200, 72_200));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStateMachine {
    window: i64,
    timeouts: DueQueue<String>,
    /// vault → its single entry in `timeouts`
    scheduled: BTreeMap<String, i64>,
    verification: BTreeSet<String>,
}

impl PeriodStateMachine {
    /// Create an empty machine scheduling timeouts `window` seconds out
    pub fn new(window: i64) -> Self {
        Self {
            window,
            timeouts: DueQueue::new(),
            scheduled: BTreeMap::new(),
            verification: BTreeSet::new(),
        }
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    fn clear_timeout(&mut self, address: &str) -> Result<(), QueueError> {
        if let Some(timeout) = self.scheduled.remove(address) {
            self.timeouts.dequeue(timeout, &address.to_string())?;
        }
        Ok(())
    }

    /// Move `vault` to AwaitingVerification
    ///
    /// Clears any scheduled timeout, starts a new period at `now` with no
    /// timeout, and adds the vault to the verification set. Idempotent.
    pub fn to_verification<V: VaultAccount>(
        &mut self,
        vault: &mut V,
        now: i64,
    ) -> Result<(), PeriodStateError> {
        let address = vault.address().to_string();
        self.clear_timeout(&address)?;
        vault.set_period(now, 0);
        self.verification.insert(address);
        Ok(())
    }

    /// Move `vault` to TimeoutScheduled at `now + window`
    ///
    /// Removes the vault from the verification set and replaces any
    /// existing timeout. Returns the new timeout.
    pub fn to_timeout_scheduled<V: VaultAccount>(
        &mut self,
        vault: &mut V,
        now: i64,
    ) -> Result<i64, PeriodStateError> {
        let timeout = now
            .checked_add(self.window)
            .ok_or(PeriodStateError::TimeoutOverflow {
                now,
                window: self.window,
            })?;
        if timeout < 0 {
            return Err(QueueError::NegativeDueTime(timeout).into());
        }
        let address = vault.address().to_string();

        self.clear_timeout(&address)?;
        self.timeouts.enqueue(timeout, address.clone(), ())?;
        self.scheduled.insert(address.clone(), timeout);
        self.verification.remove(&address);
        vault.set_period(now, timeout);
        Ok(timeout)
    }

    /// Forget `address` entirely; returns true if it was tracked
    pub fn remove_vault(&mut self, address: &str) -> bool {
        let was_verifying = self.verification.remove(address);
        self.scheduled.remove(address);
        let timeouts_removed = self.timeouts.remove_all_for_owner(address);
        was_verifying || timeouts_removed > 0
    }

    pub fn state(&self, address: &str) -> Option<PeriodState> {
        if let Some(timeout) = self.scheduled.get(address) {
            return Some(PeriodState::TimeoutScheduled { timeout: *timeout });
        }
        if self.verification.contains(address) {
            return Some(PeriodState::AwaitingVerification);
        }
        None
    }

    pub fn is_awaiting_verification(&self, address: &str) -> bool {
        self.verification.contains(address)
    }

    pub fn timeout_for(&self, address: &str) -> Option<i64> {
        self.scheduled.get(address).copied()
    }

    /// Vaults awaiting verification, in address order
    pub fn awaiting_verification(&self) -> Vec<String> {
        self.verification.iter().cloned().collect()
    }

    /// Timeouts due at or before `now`, ascending
    pub fn due_timeouts(&self, now: i64) -> Vec<(i64, String)> {
        let mut due = Vec::new();
        let walked = self.timeouts.walk_due(now, |timeout, address, _| {
            due.push((timeout, address.clone()));
            Ok::<_, Infallible>(ControlFlow::Continue(()))
        });
        match walked {
            Ok(()) => due,
            Err(never) => match never {},
        }
    }

    pub fn scheduled_count(&self) -> usize {
        self.timeouts.len()
    }

    pub fn verification_count(&self) -> usize {
        self.verification.len()
    }

    pub fn export(&self) -> PeriodStateExport {
        PeriodStateExport {
            verification: self.awaiting_verification(),
            timeouts: self.timeouts.export(),
        }
    }

    /// Rebuild from an export, checking that no vault is on both sides and
    /// no vault has two timeouts
    pub fn import(window: i64, export: PeriodStateExport) -> Result<Self, PeriodStateError> {
        let mut machine = Self::new(window);
        for entry in export.timeouts {
            if machine.scheduled.contains_key(&entry.key) {
                return Err(PeriodStateError::DuplicateTimeout(entry.key));
            }
            machine
                .timeouts
                .enqueue(entry.due_time, entry.key.clone(), ())?;
            machine.scheduled.insert(entry.key, entry.due_time);
        }
        for address in export.verification {
            if machine.scheduled.contains_key(&address) {
                return Err(PeriodStateError::MutualExclusionViolated(address));
            }
            machine.verification.insert(address);
        }
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vault::Vault;

    #[test]
    fn test_remove_vault_clears_both_sides() {
        let mut periods = PeriodStateMachine::new(10);
        let mut a = Vault::new("a", "s", "u", "p");
        let mut b = Vault::new("b", "s2", "u", "p2");
        periods.to_verification(&mut a, 1).unwrap();
        periods.to_timeout_scheduled(&mut b, 1).unwrap();

        assert!(periods.remove_vault("a"));
        assert!(periods.remove_vault("b"));
        assert!(!periods.remove_vault("c"));
        assert_eq!(periods.scheduled_count(), 0);
        assert_eq!(periods.verification_count(), 0);
        assert_eq!(periods.timeout_for("b"), None);
        assert!(periods.due_timeouts(i64::MAX).is_empty());
    }

    #[test]
    fn test_due_timeouts_stop_at_now() {
        let mut periods = PeriodStateMachine::new(10);
        let mut a = Vault::new("a", "s", "u", "p");
        let mut b = Vault::new("b", "s2", "u", "p2");
        periods.to_timeout_scheduled(&mut a, 0).unwrap();
        periods.to_timeout_scheduled(&mut b, 5).unwrap();

        assert!(periods.due_timeouts(9).is_empty());
        assert_eq!(periods.due_timeouts(10), vec![(10, "a".to_string())]);
        assert_eq!(
            periods.due_timeouts(15),
            vec![(10, "a".to_string()), (15, "b".to_string())]
        );
    }

    #[test]
    fn test_timeout_overflow_rejected() {
        let mut periods = PeriodStateMachine::new(10);
        let mut v = Vault::new("a", "s", "u", "p");
        assert_eq!(
            periods.to_timeout_scheduled(&mut v, i64::MAX),
            Err(PeriodStateError::TimeoutOverflow {
                now: i64::MAX,
                window: 10
            })
        );
        assert_eq!(periods.state("a"), None);
    }

    #[test]
    fn test_import_rejects_vault_on_both_sides() {
        let export = PeriodStateExport {
            verification: vec!["a".to_string()],
            timeouts: vec![DueEntry {
                due_time: 5,
                key: "a".to_string(),
                value: (),
            }],
        };
        assert_eq!(
            PeriodStateMachine::import(10, export),
            Err(PeriodStateError::MutualExclusionViolated("a".to_string()))
        );
    }

    #[test]
    fn test_import_rejects_negative_timeout() {
        let export = PeriodStateExport {
            verification: vec![],
            timeouts: vec![DueEntry {
                due_time: -5,
                key: "a".to_string(),
                value: (),
            }],
        };
        assert_eq!(
            PeriodStateMachine::import(10, export),
            Err(PeriodStateError::Queue(QueueError::NegativeDueTime(-5)))
        );
    }
}
