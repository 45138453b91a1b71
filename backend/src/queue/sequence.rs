//! Monotonic id sequence for payout requests

use crate::queue::due_queue::QueueError;
use serde::{Deserialize, Serialize};

/// Monotonically increasing id counter
///
/// `next` returns the current value and then advances, so the first id
/// handed out is 0. Values are never reused; the counter is persisted with
/// its queue in checkpoints.
///
/// # Example
/// ```
/// use vault_engine_core_rs::queue::Sequence;
///
/// let mut seq = Sequence::new();
/// assert_eq!(seq.next().unwrap(), 0);
/// assert_eq!(seq.next().unwrap(), 1);
/// assert_eq!(seq.peek(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    next: u64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a sequence whose next value is `next`
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Allocate the next id
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<u64, QueueError> {
        let id = self.next;
        self.next = id.checked_add(1).ok_or(QueueError::SequenceExhausted)?;
        Ok(id)
    }

    /// The id the next call to [`Sequence::next`] will return
    pub fn peek(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_continues_from_stored_value() {
        let mut seq = Sequence::starting_at(41);
        assert_eq!(seq.next().unwrap(), 41);
        assert_eq!(seq.peek(), 42);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut seq = Sequence::starting_at(u64::MAX);
        assert_eq!(seq.next(), Err(QueueError::SequenceExhausted));
        assert_eq!(seq.peek(), u64::MAX);
    }
}
