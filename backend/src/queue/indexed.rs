//! Sequence-indexed due queue for pending payouts
//!
//! Wraps a [`DueQueue`] keyed by `(due_time, id, owner)` and keeps two
//! projections in step with it:
//! - owner → keys ([`OwnerIndex`]), for per-vault walks and cleanup
//! - id → `(due_time, owner)`, unique, for lookup and expedite by id
//!
//! Ids come from a dedicated [`Sequence`] and are never reused.
//!
//! # Critical Invariants
//!
//! 1. Every primary entry has exactly one owner-index entry and one id entry
//! 2. The sequence's next value is greater than every stored id

use crate::queue::due_queue::{DueQueue, QueueError, QueueKey};
use crate::queue::owner_index::OwnerIndex;
use crate::queue::sequence::Sequence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::ControlFlow;

/// Disambiguating key of a payout entry: request id, then owning vault
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeqKey {
    pub id: u64,
    pub owner: String,
}

impl QueueKey for SeqKey {
    type Owner = str;

    fn owner(&self) -> &str {
        &self.owner
    }
}

/// One exported payout entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest<V> {
    pub due_time: i64,
    pub id: u64,
    pub owner: String,
    pub payload: V,
}

/// Exported queue contents plus the next sequence value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedQueueExport<V> {
    pub entries: Vec<QueuedRequest<V>>,
    pub next_sequence: u64,
}

/// Due queue with owner and id projections
///
/// # Example
/// ```
/// use vault_engine_core_rs::queue::IndexedDueQueue;
///
/// let mut queue: IndexedDueQueue<&str> = IndexedDueQueue::new();
/// let first = queue.enqueue(100, "vault1", "payload-a").unwrap();
/// let second = queue.enqueue(50, "vault1", "payload-b").unwrap();
/// assert_eq!((first, second), (0, 1));
///
/// queue.expedite(first).unwrap();
/// assert_eq!(queue.get_by_id(first).map(|(due, _, _)| due), Some(0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDueQueue<V> {
    queue: DueQueue<SeqKey, V>,
    by_owner: OwnerIndex,
    by_id: BTreeMap<u64, (i64, String)>,
    sequence: Sequence,
}

impl<V> Default for IndexedDueQueue<V> {
    fn default() -> Self {
        Self {
            queue: DueQueue::new(),
            by_owner: OwnerIndex::new(),
            by_id: BTreeMap::new(),
            sequence: Sequence::new(),
        }
    }
}

impl<V> IndexedDueQueue<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and insert `payload` for `owner` at `due_time`
    ///
    /// The due time is validated before an id is consumed.
    pub fn enqueue(&mut self, due_time: i64, owner: &str, payload: V) -> Result<u64, QueueError> {
        if due_time < 0 {
            return Err(QueueError::NegativeDueTime(due_time));
        }
        let id = self.sequence.next()?;
        self.insert_entry(due_time, id, owner.to_string(), payload)?;
        Ok(id)
    }

    fn insert_entry(
        &mut self,
        due_time: i64,
        id: u64,
        owner: String,
        payload: V,
    ) -> Result<(), QueueError> {
        let key = SeqKey {
            id,
            owner: owner.clone(),
        };
        self.queue.enqueue(due_time, key, payload)?;
        self.by_owner.insert(&owner, due_time, id);
        self.by_id.insert(id, (due_time, owner));
        Ok(())
    }

    /// Remove the entry at `(due_time, id, owner)`; absent keys are a no-op
    pub fn dequeue(
        &mut self,
        due_time: i64,
        owner: &str,
        id: u64,
    ) -> Result<Option<V>, QueueError> {
        let key = SeqKey {
            id,
            owner: owner.to_string(),
        };
        let removed = self.queue.dequeue(due_time, &key)?;
        if removed.is_some() {
            self.by_owner.remove(owner, due_time, id);
            self.by_id.remove(&id);
        }
        Ok(removed)
    }

    /// Look up an entry by id: `(due_time, owner, payload)`
    pub fn get_by_id(&self, id: u64) -> Option<(i64, &str, &V)> {
        let (due_time, owner) = self.by_id.get(&id)?;
        let key = SeqKey {
            id,
            owner: owner.clone(),
        };
        self.queue
            .get(*due_time, &key)
            .map(|payload| (*due_time, owner.as_str(), payload))
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Move entry `id` to due time 0, keeping its id and payload
    ///
    /// Returns the due time it had before.
    pub fn expedite(&mut self, id: u64) -> Result<i64, QueueError> {
        let (due_time, owner) = self
            .by_id
            .get(&id)
            .cloned()
            .ok_or(QueueError::IdNotFound(id))?;
        let payload = self
            .dequeue(due_time, &owner, id)?
            .ok_or(QueueError::IdNotFound(id))?;
        self.insert_entry(0, id, owner, payload)?;
        Ok(due_time)
    }

    /// Visit entries with `due_time <= threshold` in ascending order
    pub fn walk_due<E, F>(&self, threshold: i64, f: F) -> Result<(), E>
    where
        F: FnMut(i64, &SeqKey, &V) -> Result<ControlFlow<()>, E>,
    {
        self.queue.walk_due(threshold, f)
    }

    /// Visit every entry in ascending order
    pub fn walk<E, F>(&self, f: F) -> Result<(), E>
    where
        F: FnMut(i64, &SeqKey, &V) -> Result<ControlFlow<()>, E>,
    {
        self.queue.walk(f)
    }

    /// Visit `owner`'s entries in ascending order via the owner index
    pub fn walk_by_owner<E, F>(&self, owner: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(i64, &SeqKey, &V) -> Result<ControlFlow<()>, E>,
    {
        for (due_time, id) in self.by_owner.entries_for(owner) {
            let key = SeqKey {
                id,
                owner: owner.to_string(),
            };
            if let Some(payload) = self.queue.get(due_time, &key) {
                if f(due_time, &key, payload)?.is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Remove every entry owned by `owner` via the owner index
    pub fn remove_all_for_owner(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        for (due_time, id) in self.by_owner.take_owner(owner) {
            let key = SeqKey {
                id,
                owner: owner.to_string(),
            };
            // Times from the index are never negative
            if let Ok(Some(_)) = self.queue.dequeue(due_time, &key) {
                removed += 1;
            }
            self.by_id.remove(&id);
        }
        removed
    }

    pub fn count_for_owner(&self, owner: &str) -> usize {
        self.by_owner.count_for(owner)
    }

    /// The id the next enqueue will allocate
    pub fn next_sequence(&self) -> u64 {
        self.sequence.peek()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<V: Clone> IndexedDueQueue<V> {
    /// Snapshot entries in ascending order together with the sequence
    pub fn export(&self) -> IndexedQueueExport<V> {
        let entries = self
            .queue
            .iter()
            .map(|(due_time, key, payload)| QueuedRequest {
                due_time,
                id: key.id,
                owner: key.owner.clone(),
                payload: payload.clone(),
            })
            .collect();
        IndexedQueueExport {
            entries,
            next_sequence: self.sequence.peek(),
        }
    }

    /// Rebuild a queue from an export
    ///
    /// Rejects negative due times, duplicate ids, and any id not below the
    /// stored next sequence value.
    pub fn import(export: IndexedQueueExport<V>) -> Result<Self, QueueError> {
        let mut queue = Self {
            sequence: Sequence::starting_at(export.next_sequence),
            ..Self::default()
        };
        for entry in export.entries {
            if entry.due_time < 0 {
                return Err(QueueError::NegativeDueTime(entry.due_time));
            }
            if queue.by_id.contains_key(&entry.id) {
                return Err(QueueError::DuplicateId(entry.id));
            }
            if entry.id >= export.next_sequence {
                return Err(QueueError::SequenceBehind {
                    sequence: export.next_sequence,
                    id: entry.id,
                });
            }
            queue.insert_entry(entry.due_time, entry.id, entry.owner, entry.payload)?;
        }
        Ok(queue)
    }
}
