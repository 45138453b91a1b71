//! Owner Queue Index
//!
//! Provides direct lookup of payout queue entries by owning vault.
//!
//! # Problem
//!
//! Without an index, finding every pending payout for one vault requires
//! scanning the whole queue: O(Queue_Size). That happens whenever a vault is
//! removed or its pending requests are listed.
//!
//! # Solution
//!
//! Maintain a `BTreeMap<Owner, BTreeSet<(DueTime, Id)>>` alongside the
//! primary map. Unlike a rebuild-per-tick cache, the index is updated on
//! every insert and remove so it never goes stale between ticks.
//!
//! Lookup cost: O(log Owners + k) for k entries of one owner

use std::collections::{BTreeMap, BTreeSet};

/// Owner-indexed view of a payout queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerIndex {
    /// Map: Owner → set of (due_time, id), ascending
    by_owner: BTreeMap<String, BTreeSet<(i64, u64)>>,
}

impl OwnerIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner` has an entry at `(due_time, id)`
    pub fn insert(&mut self, owner: &str, due_time: i64, id: u64) {
        self.by_owner
            .entry(owner.to_string())
            .or_default()
            .insert((due_time, id));
    }

    /// Forget `(due_time, id)` for `owner`; empty owners are dropped
    pub fn remove(&mut self, owner: &str, due_time: i64, id: u64) {
        if let Some(entries) = self.by_owner.get_mut(owner) {
            entries.remove(&(due_time, id));
            if entries.is_empty() {
                self.by_owner.remove(owner);
            }
        }
    }

    /// Drop the whole owner, returning its entries in ascending order
    pub fn take_owner(&mut self, owner: &str) -> Vec<(i64, u64)> {
        self.by_owner
            .remove(owner)
            .map(|entries| entries.into_iter().collect())
            .unwrap_or_default()
    }

    /// Entries for `owner` in ascending `(due_time, id)` order
    pub fn entries_for(&self, owner: &str) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.by_owner
            .get(owner)
            .into_iter()
            .flat_map(|entries| entries.iter().copied())
    }

    /// Number of entries indexed for `owner`
    pub fn count_for(&self, owner: &str) -> usize {
        self.by_owner.get(owner).map_or(0, BTreeSet::len)
    }

    /// Number of owners with at least one entry
    pub fn owner_count(&self) -> usize {
        self.by_owner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = OwnerIndex::new();
        assert_eq!(index.count_for("vault1"), 0);
        assert_eq!(index.entries_for("vault1").count(), 0);
        assert_eq!(index.owner_count(), 0);
    }

    #[test]
    fn test_entries_are_ordered_by_time_then_id() {
        let mut index = OwnerIndex::new();
        index.insert("vault1", 20, 0);
        index.insert("vault1", 10, 2);
        index.insert("vault1", 10, 1);
        index.insert("vault2", 5, 3);

        let entries: Vec<_> = index.entries_for("vault1").collect();
        assert_eq!(entries, vec![(10, 1), (10, 2), (20, 0)]);
        assert_eq!(index.owner_count(), 2);
    }

    #[test]
    fn test_remove_last_entry_drops_owner() {
        let mut index = OwnerIndex::new();
        index.insert("vault1", 10, 0);
        index.remove("vault1", 10, 0);
        assert_eq!(index.owner_count(), 0);

        // Removing again is a no-op
        index.remove("vault1", 10, 0);
        assert_eq!(index.owner_count(), 0);
    }

    #[test]
    fn test_take_owner() {
        let mut index = OwnerIndex::new();
        index.insert("vault1", 10, 0);
        index.insert("vault1", 11, 1);
        assert_eq!(index.take_owner("vault1"), vec![(10, 0), (11, 1)]);
        assert!(index.take_owner("vault1").is_empty());
    }
}
