//! Generic time-ordered due queue
//!
//! Entries are keyed by `(due_time, key)` and visited in ascending order of
//! due time, then key. A `BTreeMap` gives the same ordered iteration a
//! durable ordered store would, so walks are deterministic.
//!
//! # Critical Invariants
//!
//! 1. **No negative due times**: rejected on enqueue and dequeue
//! 2. **Immutable entries**: changing an entry's time is remove + re-insert
//! 3. **Idempotent dequeue**: removing an absent key is a no-op

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use thiserror::Error;

/// Errors produced by due queue operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Due time cannot be negative: {0}")]
    NegativeDueTime(i64),

    #[error("Request id {0} not found")]
    IdNotFound(u64),

    #[error("Duplicate request id {0}")]
    DuplicateId(u64),

    #[error("Sequence {sequence} must be greater than stored id {id}")]
    SequenceBehind { sequence: u64, id: u64 },

    #[error("Sequence exhausted")]
    SequenceExhausted,
}

/// A queue key that belongs to an owning entity
///
/// Used by [`DueQueue::remove_all_for_owner`] to find every entry for one
/// owner without a secondary index.
pub trait QueueKey: Ord + Clone {
    type Owner: ?Sized + PartialEq;

    fn owner(&self) -> &Self::Owner;
}

impl QueueKey for String {
    type Owner = str;

    fn owner(&self) -> &str {
        self
    }
}

/// One exported queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueEntry<K, V> {
    pub due_time: i64,
    pub key: K,
    pub value: V,
}

/// Ordered collection keyed by `(due_time, key)`
///
/// # Example
/// ```
/// use std::ops::ControlFlow;
/// use vault_engine_core_rs::queue::DueQueue;
///
/// let mut queue: DueQueue<String> = DueQueue::new();
/// queue.enqueue(30, "c".to_string(), ()).unwrap();
/// queue.enqueue(10, "a".to_string(), ()).unwrap();
/// queue.enqueue(20, "b".to_string(), ()).unwrap();
///
/// let mut due = Vec::new();
/// queue
///     .walk_due(20, |_, key, _| {
///         due.push(key.clone());
///         Ok::<_, ()>(ControlFlow::Continue(()))
///     })
///     .unwrap();
/// assert_eq!(due, vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DueQueue<K: Ord, V = ()> {
    entries: BTreeMap<(i64, K), V>,
}

impl<K: Ord, V> Default for DueQueue<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: QueueKey, V> DueQueue<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry due at `due_time`
    ///
    /// Re-inserting an existing `(due_time, key)` replaces its payload.
    pub fn enqueue(&mut self, due_time: i64, key: K, value: V) -> Result<(), QueueError> {
        if due_time < 0 {
            return Err(QueueError::NegativeDueTime(due_time));
        }
        self.entries.insert((due_time, key), value);
        Ok(())
    }

    /// Remove the entry at `(due_time, key)`, returning its payload if present
    pub fn dequeue(&mut self, due_time: i64, key: &K) -> Result<Option<V>, QueueError> {
        if due_time < 0 {
            return Err(QueueError::NegativeDueTime(due_time));
        }
        Ok(self.entries.remove(&(due_time, key.clone())))
    }

    pub fn get(&self, due_time: i64, key: &K) -> Option<&V> {
        self.entries.get(&(due_time, key.clone()))
    }

    pub fn contains(&self, due_time: i64, key: &K) -> bool {
        self.get(due_time, key).is_some()
    }

    /// Visit entries with `due_time <= threshold` in ascending order
    ///
    /// The walk stops at the first entry past the threshold, when the
    /// callback returns `ControlFlow::Break`, or when it returns an error
    /// (which is propagated).
    pub fn walk_due<E, F>(&self, threshold: i64, mut f: F) -> Result<(), E>
    where
        F: FnMut(i64, &K, &V) -> Result<ControlFlow<()>, E>,
    {
        for ((due_time, key), value) in &self.entries {
            if *due_time > threshold {
                break;
            }
            if f(*due_time, key, value)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Visit every entry in ascending order
    pub fn walk<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(i64, &K, &V) -> Result<ControlFlow<()>, E>,
    {
        for ((due_time, key), value) in &self.entries {
            if f(*due_time, key, value)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Remove every entry whose key belongs to `owner`
    ///
    /// Full scan: keys are collected first, then removed. Returns the
    /// number of entries removed.
    pub fn remove_all_for_owner(&mut self, owner: &K::Owner) -> usize {
        let doomed: Vec<(i64, K)> = self
            .entries
            .keys()
            .filter(|(_, key)| key.owner() == owner)
            .cloned()
            .collect();
        for entry in &doomed {
            self.entries.remove(entry);
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &K, &V)> {
        self.entries
            .iter()
            .map(|((due_time, key), value)| (*due_time, key, value))
    }
}

impl<K: QueueKey + Clone, V: Clone> DueQueue<K, V> {
    /// Snapshot all entries in ascending order
    pub fn export(&self) -> Vec<DueEntry<K, V>> {
        self.iter()
            .map(|(due_time, key, value)| DueEntry {
                due_time,
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Rebuild a queue from exported entries
    pub fn import(entries: Vec<DueEntry<K, V>>) -> Result<Self, QueueError> {
        let mut queue = Self::new();
        for entry in entries {
            queue.enqueue(entry.due_time, entry.key, entry.value)?;
        }
        Ok(queue)
    }
}
