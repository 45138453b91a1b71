//! Checkpoint Tests - Save/Load Engine State
//!
//! Critical invariants tested:
//! - Determinism: a restored engine produces identical results
//! - Sequence continuity: ids are never reused across a restore
//! - Integrity: malformed snapshots are rejected
//! - Config matching: reject state from a different config

use vault_engine_core_rs::core::shares::SHARE_SCALAR;
use vault_engine_core_rs::core::time::SECONDS_PER_YEAR;
use vault_engine_core_rs::ledger::InMemoryLedger;
use vault_engine_core_rs::models::registry::Account;
use vault_engine_core_rs::models::vault::{Vault, VaultError};
use vault_engine_core_rs::orchestrator::{Engine, EngineConfig, EngineError, EngineSnapshot};
use vault_engine_core_rs::valuation::PriceTable;
use vault_engine_core_rs::Coin;

// ============================================================================
// Test Helpers
// ============================================================================

type TestEngine = Engine<InMemoryLedger, PriceTable>;

fn config() -> EngineConfig {
    EngineConfig {
        reconciliation_window: SECONDS_PER_YEAR,
        ..Default::default()
    }
}

/// Engine mid-flight: one scheduled vault, one awaiting verification, and
/// pending requests in both queues
fn create_test_engine() -> TestEngine {
    let mut engine = Engine::new(config(), InMemoryLedger::new(), PriceTable::new())
        .expect("Failed to create test engine");
    let ledger = engine.ledger_mut();
    ledger.mint("p1", &Coin::new("uusd", 100_000_000)).unwrap();
    ledger.mint("v1", &Coin::new("uusd", 100_000_000)).unwrap();
    ledger
        .mint("alice", &Coin::new("vshare", 10 * SHARE_SCALAR))
        .unwrap();

    engine
        .register_vault(
            Vault::new("v1", "vshare", "uusd", "p1")
                .with_interest_rate("0.05")
                .with_total_shares(100_000_000 * SHARE_SCALAR),
        )
        .unwrap();
    engine.register_account("alice");
    engine.tick(1).unwrap();

    engine
        .register_vault(Vault::new("v2", "v2share", "uusd", "p2"))
        .unwrap();
    engine
        .enqueue_withdrawal("bob", "v1", Coin::new("uusd", 5_000), 1_000)
        .unwrap();
    engine
        .enqueue_swap_out(
            "alice",
            "v1",
            Coin::new("vshare", 10 * SHARE_SCALAR),
            "uusd",
            2_000,
        )
        .unwrap();
    engine
}

fn restore(snapshot: EngineSnapshot, ledger: InMemoryLedger) -> Result<TestEngine, EngineError> {
    Engine::restore(config(), ledger, PriceTable::new(), snapshot)
}

fn assert_invalid(result: Result<TestEngine, EngineError>) {
    match result {
        Err(EngineError::StateValidation(_)) => {}
        Err(other) => panic!("expected StateValidation, got {:?}", other),
        Ok(_) => panic!("expected StateValidation, got a restored engine"),
    }
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_snapshot_survives_json() {
    let engine = create_test_engine();
    let snapshot = engine.snapshot();

    let json = snapshot.to_json().unwrap();
    let decoded = EngineSnapshot::from_json(&json).unwrap();

    assert_eq!(decoded, snapshot);
    assert_eq!(decoded.current_height, 1);
    assert_eq!(decoded.accounts.len(), 3);
    assert_eq!(decoded.periods.verification, vec!["v2".to_string()]);
    assert_eq!(decoded.periods.timeouts.len(), 1);
    assert_eq!(decoded.pending_withdrawals.entries.len(), 1);
    assert_eq!(decoded.pending_swap_outs.next_sequence, 1);
}

#[test]
fn test_restore_reproduces_state() {
    let engine = create_test_engine();
    let snapshot = engine.snapshot();

    let restored = restore(snapshot.clone(), engine.ledger().clone()).unwrap();

    assert_eq!(restored.snapshot(), snapshot);
    assert_eq!(restored.current_time(), 1);
    assert_eq!(restored.vault("v1").unwrap(), engine.vault("v1").unwrap());
    assert!(restored.event_log().is_empty());
}

#[test]
fn test_restored_engine_continues_identically() {
    let mut original = create_test_engine();
    let snapshot = EngineSnapshot::from_json(&original.snapshot().to_json().unwrap()).unwrap();
    let mut restored = restore(snapshot, original.ledger().clone()).unwrap();
    let logged_before = original.event_log().len();

    for now in [1_000, 2_000, 1 + SECONDS_PER_YEAR, 1 + 2 * SECONDS_PER_YEAR] {
        let a = original.tick(now).unwrap();
        let b = restored.tick(now).unwrap();
        assert_eq!(a, b, "tick results diverged at {}", now);
    }

    assert_eq!(
        &original.event_log().events()[logged_before..],
        restored.event_log().events()
    );
    assert_eq!(original.ledger(), restored.ledger());
    assert_eq!(original.snapshot(), restored.snapshot());
}

#[test]
fn test_sequences_continue_after_restore() {
    let mut original = create_test_engine();
    let mut restored = restore(original.snapshot(), original.ledger().clone()).unwrap();

    let a = original
        .enqueue_withdrawal("carol", "v1", Coin::new("uusd", 1), 10)
        .unwrap();
    let b = restored
        .enqueue_withdrawal("carol", "v1", Coin::new("uusd", 1), 10)
        .unwrap();

    assert_eq!(a, 1);
    assert_eq!(a, b);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_config_mismatch_rejected() {
    let engine = create_test_engine();
    let other = EngineConfig {
        swap_out_batch_size: 7,
        ..config()
    };

    let result = Engine::restore(
        other,
        engine.ledger().clone(),
        PriceTable::new(),
        engine.snapshot(),
    );
    assert!(matches!(result, Err(EngineError::ConfigMismatch { .. })));
}

#[test]
fn test_negative_time_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    snapshot.current_time = -1;
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_duplicate_account_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    snapshot.accounts.push(Account::Base {
        address: "alice".to_string(),
    });
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_vault_on_both_sides_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    snapshot.periods.verification.push("v1".to_string());
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_duplicate_timeout_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    let mut extra = snapshot.periods.timeouts[0].clone();
    extra.due_time += 1;
    snapshot.periods.timeouts.push(extra);
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_duplicate_request_id_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    let mut copy = snapshot.pending_withdrawals.entries[0].clone();
    copy.due_time += 10;
    snapshot.pending_withdrawals.entries.push(copy);
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_sequence_behind_stored_ids_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    snapshot.pending_swap_outs.next_sequence = 0;
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_negative_due_time_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    snapshot.pending_withdrawals.entries[0].due_time = -5;
    assert_invalid(restore(snapshot, engine.ledger().clone()));
}

#[test]
fn test_paused_vault_without_frozen_valuation_rejected() {
    let engine = create_test_engine();
    let mut snapshot = engine.snapshot();
    for account in &mut snapshot.accounts {
        if let Account::Vault(vault) = account {
            if vault.address == "v1" {
                vault.paused = true;
                vault.paused_valuation = None;
            }
        }
    }

    match restore(snapshot, engine.ledger().clone()) {
        Err(EngineError::Vault(VaultError::MissingPausedValuation(address))) => {
            assert_eq!(address, "v1")
        }
        Err(other) => panic!("expected MissingPausedValuation, got {:?}", other),
        Ok(_) => panic!("paused vault without a valuation was restored"),
    }
}

#[test]
fn test_malformed_json_is_serialization_error() {
    assert!(matches!(
        EngineSnapshot::from_json("{not json"),
        Err(EngineError::Serialization(_))
    ));
}
