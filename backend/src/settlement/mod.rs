//! Settlement Module
//!
//! Settles pending swap-outs and withdrawals once they come due:
//! - Immediate settlement when balances allow
//! - Compensating refund with a typed reason when they don't
//! - Critical-failure recording (and optional vault pause) when a refund or
//!   a post-payout step fails
//!
//! # Critical Invariants
//!
//! 1. **Atomicity**: each ledger call is all-or-nothing
//! 2. **Exactly one outcome**: every processed entry is settled, refunded,
//!    skipped, or recorded as critical, then removed from its queue

pub mod payout;

// Re-export public API
pub use payout::{
    process_due_payouts, PayoutContext, PayoutProcessingResult, PayoutRequest, SettlementError,
};
