//! Vault Engine Core - Rust Engine
//!
//! Deterministic accounting and scheduling for pooled-asset vaults.
//!
//! # Architecture
//!
//! - **core**: Tick time and fixed-point share math
//! - **models**: Domain types (Vault, Coin, payouts, events)
//! - **queue**: Due-time ordered queues with sequence ids
//! - **interest**: Continuously compounded interest
//! - **valuation**: Price conversion, TVV, NAV, share pricing
//! - **ledger**: Bank ledger seam and in-memory implementation
//! - **settlement**: Swap-out and withdrawal processing
//! - **reconcile**: Interest reconciliation and period state machine
//! - **orchestrator**: Tick loop and checkpoints
//!
//! # Critical Invariants
//!
//! 1. All amounts are i128 in base units; no floating point
//! 2. Identical inputs produce identical state, events and ids
//! 3. Every due payout is settled, refunded or recorded as critical exactly once

// Module declarations
pub mod core;
pub mod interest;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod reconcile;
pub mod settlement;
pub mod valuation;

// Re-exports for convenience
pub use core::time::TimeManager;
pub use ledger::{BankLedger, InMemoryLedger, LedgerError};
pub use models::{
    coin::{Amount, Coin},
    event::{Event, EventLog},
    payout::{PendingSwapOut, PendingWithdrawal, RefundReason},
    registry::{Account, VaultRegistry},
    vault::{Vault, VaultError},
};
pub use orchestrator::{Engine, EngineConfig, EngineError, EngineSnapshot, TickResult};
pub use settlement::{PayoutProcessingResult, SettlementError};
pub use valuation::{PriceSource, PriceTable, ValuationEngine};
