//! Event logging for auditing engine activity.
//!
//! This module defines the Event enum which captures every state change the
//! engine makes on a vault's behalf. Events enable:
//! - Auditing (verify every payout was settled or refunded exactly once)
//! - Debugging (understand what happened and when)
//! - Alerting (critical failures are recorded, not just logged)
//!
//! # Event Types
//!
//! - **Reconciliation**: interest reconciled, interest disabled
//! - **Request**: swap-out / withdrawal requested, payout expedited
//! - **Payout**: swap-out / withdrawal completed or refunded
//! - **Safety**: vault paused or unpaused, critical failure
//!
//! # Example
//!
//! ```rust
//! use vault_engine_core_rs::models::event::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::InterestDisabled {
//!     time: 1_700_000_000,
//!     vault: "vault1".to_string(),
//!     previous_rate: "0.05".to_string(),
//! });
//!
//! assert_eq!(log.events_for_vault("vault1").len(), 1);
//! assert_eq!(log.events()[0].event_type(), "InterestDisabled");
//! ```

use crate::models::coin::{Amount, Coin};
use crate::models::payout::RefundReason;
use serde::{Deserialize, Serialize};

/// Engine event capturing a state change.
///
/// All events carry the tick timestamp at which they occurred.
/// Events are logged in the order they occur within a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Interest for a period was moved between reserves and principal
    InterestReconciled {
        time: i64,
        vault: String,
        principal: Coin,
        /// Signed: negative when interest flowed from principal to reserves
        interest: Coin,
        rate: String,
        period_start: i64,
        period_end: i64,
    },

    /// Reserves could not fund another period; the rate was set to zero
    InterestDisabled {
        time: i64,
        vault: String,
        previous_rate: String,
    },

    /// Shares escrowed and a swap-out queued
    SwapOutRequested {
        time: i64,
        request_id: u64,
        vault: String,
        owner: String,
        shares: Coin,
        redeem_denom: String,
        due_time: i64,
    },

    /// Assets escrowed and a withdrawal queued
    WithdrawalRequested {
        time: i64,
        request_id: u64,
        vault: String,
        owner: String,
        assets: Coin,
        due_time: i64,
    },

    /// A queued payout was moved to due time zero
    PayoutExpedited {
        time: i64,
        request_id: u64,
        vault: String,
        previous_due_time: i64,
    },

    SwapOutCompleted {
        time: i64,
        request_id: u64,
        vault: String,
        owner: String,
        shares: Coin,
        payout: Coin,
    },

    SwapOutRefunded {
        time: i64,
        request_id: u64,
        vault: String,
        owner: String,
        shares: Coin,
        reason: RefundReason,
    },

    WithdrawalCompleted {
        time: i64,
        request_id: u64,
        vault: String,
        owner: String,
        assets: Coin,
    },

    WithdrawalRefunded {
        time: i64,
        request_id: u64,
        vault: String,
        owner: String,
        assets: Coin,
        reason: RefundReason,
    },

    /// Vault was paused and its valuation frozen
    VaultPaused {
        time: i64,
        vault: String,
        reason: String,
        total_value: Amount,
        nav_per_share: Amount,
    },

    /// Vault resumed; live valuation applies again
    VaultUnpaused { time: i64, vault: String },

    /// A failure that left state needing operator attention
    CriticalFailure {
        time: i64,
        vault: String,
        request_id: Option<u64>,
        detail: String,
    },
}

impl Event {
    /// Get the tick timestamp when this event occurred
    pub fn time(&self) -> i64 {
        match self {
            Event::InterestReconciled { time, .. } => *time,
            Event::InterestDisabled { time, .. } => *time,
            Event::SwapOutRequested { time, .. } => *time,
            Event::WithdrawalRequested { time, .. } => *time,
            Event::PayoutExpedited { time, .. } => *time,
            Event::SwapOutCompleted { time, .. } => *time,
            Event::SwapOutRefunded { time, .. } => *time,
            Event::WithdrawalCompleted { time, .. } => *time,
            Event::WithdrawalRefunded { time, .. } => *time,
            Event::VaultPaused { time, .. } => *time,
            Event::VaultUnpaused { time, .. } => *time,
            Event::CriticalFailure { time, .. } => *time,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::InterestReconciled { .. } => "InterestReconciled",
            Event::InterestDisabled { .. } => "InterestDisabled",
            Event::SwapOutRequested { .. } => "SwapOutRequested",
            Event::WithdrawalRequested { .. } => "WithdrawalRequested",
            Event::PayoutExpedited { .. } => "PayoutExpedited",
            Event::SwapOutCompleted { .. } => "SwapOutCompleted",
            Event::SwapOutRefunded { .. } => "SwapOutRefunded",
            Event::WithdrawalCompleted { .. } => "WithdrawalCompleted",
            Event::WithdrawalRefunded { .. } => "WithdrawalRefunded",
            Event::VaultPaused { .. } => "VaultPaused",
            Event::VaultUnpaused { .. } => "VaultUnpaused",
            Event::CriticalFailure { .. } => "CriticalFailure",
        }
    }

    /// Get the vault this event relates to
    pub fn vault(&self) -> &str {
        match self {
            Event::InterestReconciled { vault, .. }
            | Event::InterestDisabled { vault, .. }
            | Event::SwapOutRequested { vault, .. }
            | Event::WithdrawalRequested { vault, .. }
            | Event::PayoutExpedited { vault, .. }
            | Event::SwapOutCompleted { vault, .. }
            | Event::SwapOutRefunded { vault, .. }
            | Event::WithdrawalCompleted { vault, .. }
            | Event::WithdrawalRefunded { vault, .. }
            | Event::VaultPaused { vault, .. }
            | Event::VaultUnpaused { vault, .. }
            | Event::CriticalFailure { vault, .. } => vault,
        }
    }

    /// Get the payout request id if the event relates to one
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Event::SwapOutRequested { request_id, .. } => Some(*request_id),
            Event::WithdrawalRequested { request_id, .. } => Some(*request_id),
            Event::PayoutExpedited { request_id, .. } => Some(*request_id),
            Event::SwapOutCompleted { request_id, .. } => Some(*request_id),
            Event::SwapOutRefunded { request_id, .. } => Some(*request_id),
            Event::WithdrawalCompleted { request_id, .. } => Some(*request_id),
            Event::WithdrawalRefunded { request_id, .. } => Some(*request_id),
            Event::CriticalFailure { request_id, .. } => *request_id,
            _ => None,
        }
    }
}

/// Event log for storing and querying engine events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events for a specific tick timestamp
    pub fn events_at_time(&self, time: i64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.time() == time).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific vault
    pub fn events_for_vault(&self, vault: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.vault() == vault).collect()
    }

    /// Get events for a specific payout request
    pub fn events_for_request(&self, request_id: u64) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.request_id() == Some(request_id))
            .collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refunded(time: i64, request_id: u64) -> Event {
        Event::WithdrawalRefunded {
            time,
            request_id,
            vault: "vault1".to_string(),
            owner: "alice".to_string(),
            assets: Coin::new("uusd", 100),
            reason: RefundReason::InsufficientFunds,
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = refunded(42, 7);
        assert_eq!(event.time(), 42);
        assert_eq!(event.event_type(), "WithdrawalRefunded");
        assert_eq!(event.vault(), "vault1");
        assert_eq!(event.request_id(), Some(7));
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.log(refunded(1, 0));
        log.log(refunded(2, 1));
        log.log(Event::InterestDisabled {
            time: 2,
            vault: "vault2".to_string(),
            previous_rate: "0.1".to_string(),
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_at_time(2).len(), 2);
        assert_eq!(log.events_of_type("WithdrawalRefunded").len(), 2);
        assert_eq!(log.events_for_vault("vault2").len(), 1);
        assert_eq!(log.events_for_request(1).len(), 1);

        log.clear();
        assert!(log.is_empty());
    }
}
