//! Due queues
//!
//! One generic ordered collection, [`DueQueue`], keyed by
//! `(due_time, key)`, and a sequence-indexed wrapper, [`IndexedDueQueue`],
//! for the two payout queues. The engine instantiates:
//! - the reconciliation timeout queue (`DueQueue<String>`, keyed by vault)
//! - the pending swap-out queue ([`SwapOutQueue`])
//! - the pending withdrawal queue ([`WithdrawalQueue`])
//!
//! The verification set lives beside the timeout queue in
//! [`crate::reconcile::PeriodStateMachine`].

pub mod due_queue;
pub mod indexed;
pub mod owner_index;
pub mod sequence;

pub use due_queue::{DueEntry, DueQueue, QueueError, QueueKey};
pub use indexed::{IndexedDueQueue, IndexedQueueExport, QueuedRequest, SeqKey};
pub use owner_index::OwnerIndex;
pub use sequence::Sequence;

use crate::models::payout::{PendingSwapOut, PendingWithdrawal};

pub type SwapOutQueue = IndexedDueQueue<PendingSwapOut>;
pub type WithdrawalQueue = IndexedDueQueue<PendingWithdrawal>;
