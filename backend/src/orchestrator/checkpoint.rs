//! Checkpoint - Export/Import Engine State
//!
//! Serializes everything the engine owns (vault registry, reconciliation
//! periods, both payout queues with their sequences, and the tick clock) so
//! an engine can be stopped and resumed. Balances and prices belong to the
//! ledger and price source and are not part of a checkpoint.
//!
//! # Critical Invariants
//!
//! - **No negative times**: clock, timeouts and payout due times
//! - **Unique ids**: no request id appears twice in one queue
//! - **Sequences ahead**: each queue's next sequence exceeds all its ids
//! - **Mutual exclusion**: no vault both awaiting verification and scheduled
//! - **Config Matching**: state can only be loaded with matching config

use crate::models::payout::{PendingSwapOut, PendingWithdrawal};
use crate::models::registry::Account;
use crate::orchestrator::EngineError;
use crate::queue::IndexedQueueExport;
use crate::reconcile::PeriodStateExport;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete engine state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Ticks processed so far
    pub current_height: u64,

    /// Timestamp of the last processed tick
    pub current_time: i64,

    /// Vaults and plain accounts, in address order
    pub accounts: Vec<Account>,

    /// Verification set and timeout queue
    pub periods: PeriodStateExport,

    pub pending_swap_outs: IndexedQueueExport<PendingSwapOut>,

    pub pending_withdrawals: IndexedQueueExport<PendingWithdrawal>,

    /// SHA256 hash of the engine config (for validation)
    pub config_hash: String,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| {
            EngineError::Serialization(format!("Snapshot serialization failed: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| {
            EngineError::Serialization(format!("Snapshot deserialization failed: {}", e))
        })
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on field or map ordering.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, EngineError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        EngineError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    // Recursively sort all object keys for canonical representation
    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        EngineError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

fn invalid(msg: String) -> EngineError {
    EngineError::StateValidation(msg)
}

fn validate_queue<V>(name: &str, export: &IndexedQueueExport<V>) -> Result<(), EngineError> {
    let mut seen = BTreeSet::new();
    for entry in &export.entries {
        if entry.due_time < 0 {
            return Err(invalid(format!(
                "{} entry {} has negative due time {}",
                name, entry.id, entry.due_time
            )));
        }
        if !seen.insert(entry.id) {
            return Err(invalid(format!("{} has duplicate id {}", name, entry.id)));
        }
        if entry.id >= export.next_sequence {
            return Err(invalid(format!(
                "{} sequence {} is not ahead of id {}",
                name, export.next_sequence, entry.id
            )));
        }
    }
    Ok(())
}

/// Validate snapshot integrity
///
/// Checks config hash, time and id invariants, and mutual exclusion of the
/// reconciliation sets.
pub fn validate_snapshot(
    snapshot: &EngineSnapshot,
    expected_config_hash: &str,
) -> Result<(), EngineError> {
    // 1. Config match
    if snapshot.config_hash != expected_config_hash {
        return Err(EngineError::ConfigMismatch {
            expected: expected_config_hash.to_string(),
            found: snapshot.config_hash.clone(),
        });
    }

    // 2. Clock
    if snapshot.current_time < 0 {
        return Err(invalid(format!(
            "Negative current time {}",
            snapshot.current_time
        )));
    }

    // 3. Account uniqueness
    let mut addresses = BTreeSet::new();
    for account in &snapshot.accounts {
        if !addresses.insert(account.address()) {
            return Err(invalid(format!(
                "Duplicate account {}",
                account.address()
            )));
        }
    }

    // 4. Reconciliation periods
    let mut scheduled = BTreeSet::new();
    for entry in &snapshot.periods.timeouts {
        if entry.due_time < 0 {
            return Err(invalid(format!(
                "Vault {} has negative timeout {}",
                entry.key, entry.due_time
            )));
        }
        if !scheduled.insert(entry.key.as_str()) {
            return Err(invalid(format!(
                "Vault {} has more than one timeout",
                entry.key
            )));
        }
    }
    for address in &snapshot.periods.verification {
        if scheduled.contains(address.as_str()) {
            return Err(invalid(format!(
                "Vault {} is both awaiting verification and scheduled",
                address
            )));
        }
    }

    // 5. Payout queues
    validate_queue("pending swap-outs", &snapshot.pending_swap_outs)?;
    validate_queue("pending withdrawals", &snapshot.pending_withdrawals)?;

    Ok(())
}
