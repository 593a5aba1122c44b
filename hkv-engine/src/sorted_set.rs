//! # Sorted Set
//!
//! Purpose: a Redis-style sorted set - a `member -> score` map paired with
//! an `OrderedIndex` kept in sync on every mutation, so rank/range queries
//! never have to rebuild order from the map.
//!
//! Grounded on `original_source/pkg/data_structure/sorted_set/sorted_set.go`
//! and `ordered_index_factory.go`'s choice between the B+-tree and skip
//! list backends. `IndexBackend` plays the factory's role here, chosen once
//! per sorted set at creation time.

use ahash::RandomState;
use hashbrown::HashMap;

use crate::btree_index::BTreeIndex;
use crate::ordered_index::{AddOutcome, Item, OrderedIndex};
use crate::skiplist_index::SkipListIndex;

/// Which `OrderedIndex` implementation a `SortedSet` is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    BTree,
    SkipList,
}

#[derive(Debug)]
enum Index {
    BTree(BTreeIndex),
    SkipList(SkipListIndex),
}

impl OrderedIndex for Index {
    fn add(&mut self, item: Item, previous_score: Option<f64>) -> AddOutcome {
        match self {
            Index::BTree(i) => i.add(item, previous_score),
            Index::SkipList(i) => i.add(item, previous_score),
        }
    }

    fn remove_by_score(&mut self, member: &[u8], score: f64) -> bool {
        match self {
            Index::BTree(i) => i.remove_by_score(member, score),
            Index::SkipList(i) => i.remove_by_score(member, score),
        }
    }

    fn rank(&self, member: &[u8], score: f64) -> Option<u64> {
        match self {
            Index::BTree(i) => i.rank(member, score),
            Index::SkipList(i) => i.rank(member, score),
        }
    }

    fn range_by_score(&self, min: f64, max: f64) -> Vec<Item> {
        match self {
            Index::BTree(i) => i.range_by_score(min, max),
            Index::SkipList(i) => i.range_by_score(min, max),
        }
    }

    fn get_by_rank(&self, rank: u64) -> Option<Item> {
        match self {
            Index::BTree(i) => i.get_by_rank(rank),
            Index::SkipList(i) => i.get_by_rank(rank),
        }
    }

    fn range_by_rank(&self, start: u64, stop: u64) -> Vec<Item> {
        match self {
            Index::BTree(i) => i.range_by_rank(start, stop),
            Index::SkipList(i) => i.range_by_rank(start, stop),
        }
    }

    fn count(&self) -> u64 {
        match self {
            Index::BTree(i) => i.count(),
            Index::SkipList(i) => i.count(),
        }
    }
}

/// A sorted set keyed by member, ordered by score.
#[derive(Debug)]
pub struct SortedSet {
    scores: HashMap<Vec<u8>, f64, RandomState>,
    index: Index,
}

impl SortedSet {
    pub fn new(backend: IndexBackend) -> Self {
        let index = match backend {
            IndexBackend::BTree => Index::BTree(BTreeIndex::default()),
            IndexBackend::SkipList => Index::SkipList(SkipListIndex::new()),
        };
        SortedSet {
            scores: HashMap::default(),
            index,
        }
    }

    /// Adds or updates `member` with `score`. An empty member is rejected
    /// as a no-op, matching `ZADD`'s refusal of the empty-string member
    /// name at the executor layer.
    pub fn add(&mut self, member: Vec<u8>, score: f64) -> AddOutcome {
        if member.is_empty() {
            return AddOutcome::Unchanged;
        }

        let previous = self.scores.get(&member).copied();
        let outcome = self
            .index
            .add(Item::new(member.clone(), score), previous);
        self.scores.insert(member, score);
        outcome
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.index.remove_by_score(member, score);
                true
            }
            None => false,
        }
    }

    pub fn rank(&self, member: &[u8]) -> Option<u64> {
        let score = self.scores.get(member)?;
        self.index.rank(member, *score)
    }

    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<Item> {
        self.index.range_by_score(min, max)
    }

    /// `start`/`stop` must already be non-negative and clamped; negative
    /// index normalization (`-1` == last) is the executor's job.
    pub fn range_by_rank(&self, start: u64, stop: u64) -> Vec<Item> {
        self.index.range_by_rank(start, stop)
    }

    pub fn card(&self) -> u64 {
        self.scores.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_for_same_score() {
        let mut zset = SortedSet::new(IndexBackend::SkipList);
        assert_eq!(zset.add(b"m".to_vec(), 1.0), AddOutcome::Inserted);
        assert_eq!(zset.add(b"m".to_vec(), 1.0), AddOutcome::Unchanged);
        assert_eq!(zset.card(), 1);
    }

    #[test]
    fn add_reorders_on_score_change() {
        let mut zset = SortedSet::new(IndexBackend::BTree);
        zset.add(b"a".to_vec(), 1.0);
        zset.add(b"b".to_vec(), 2.0);
        assert_eq!(zset.rank(b"a"), Some(0));
        assert_eq!(zset.add(b"a".to_vec(), 5.0), AddOutcome::Updated);
        assert_eq!(zset.rank(b"a"), Some(1));
    }

    #[test]
    fn empty_member_is_rejected() {
        let mut zset = SortedSet::new(IndexBackend::SkipList);
        assert_eq!(zset.add(Vec::new(), 1.0), AddOutcome::Unchanged);
        assert_eq!(zset.card(), 0);
    }

    #[test]
    fn remove_drops_from_both_map_and_index() {
        let mut zset = SortedSet::new(IndexBackend::SkipList);
        zset.add(b"a".to_vec(), 1.0);
        assert!(zset.remove(b"a"));
        assert!(!zset.remove(b"a"));
        assert_eq!(zset.score(b"a"), None);
        assert_eq!(zset.rank(b"a"), None);
    }
}
