//! Orchestrator - tick-driven vault engine
//!
//! Integrates reconciliation, verification scheduling and payout
//! processing into a single deterministic tick loop.
//!
//! See `engine.rs` for full implementation.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use engine::{
    Engine, EngineConfig, EngineError, TickResult, AUTO_RECONCILE_TIMEOUT,
    DEFAULT_SWAP_OUT_BATCH_SIZE,
};

// Re-export checkpoint types
pub use checkpoint::{compute_config_hash, validate_snapshot, EngineSnapshot};
