//! # Skip List Ordered Index
//!
//! Purpose: the second `OrderedIndex` implementation, a span-counted skip
//! list offering the same rank/range operations as `btree_index` with
//! simpler, rotation-free insert/delete at the cost of probabilistic
//! (rather than guaranteed) balance.
//!
//! Ported close to `original_source/pkg/data_structure/sorted_set/skiplist_index.go`,
//! itself modeled on Redis's `zskiplist`: a sentinel header node holds
//! `MAX_LEVEL` forward pointers, every real node's level is chosen by a
//! fair-coin climb capped at `MAX_LEVEL`, and each forward pointer carries a
//! `span` - the number of bottom-level nodes it skips - so rank queries
//! never need to walk the whole list.
//!
//! Unlike the B+-tree, a skip list's forward-only links never form an
//! ownership cycle, so nodes here also carry a `backward` pointer for
//! completeness (unused by this module's query surface today but kept
//! because every node already needs an arena handle for it, and it is the
//! natural place a future `ZREVRANGE` would hang off of).

use crate::ordered_index::{AddOutcome, Item, OrderedIndex};

const MAX_LEVEL: usize = 32;
const LEVEL_UP_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Level {
    forward: Option<usize>,
    span: u64,
}

#[derive(Debug)]
struct Node {
    item: Option<Item>,
    backward: Option<usize>,
    levels: Vec<Level>,
}

/// A span-counted skip list of `Item`s, addressed by integer node handle.
#[derive(Debug)]
pub struct SkipListIndex {
    arena: Vec<Option<Node>>,
    free: Vec<usize>,
    header: usize,
    /// Highest level currently in use, in `1..=MAX_LEVEL`.
    level: usize,
    length: u64,
}

impl Default for SkipListIndex {
    fn default() -> Self {
        SkipListIndex::new()
    }
}

impl SkipListIndex {
    pub fn new() -> Self {
        let header = Node {
            item: None,
            backward: None,
            levels: vec![Level { forward: None, span: 0 }; MAX_LEVEL],
        };
        SkipListIndex {
            arena: vec![Some(header)],
            free: Vec::new(),
            header: 0,
            level: 1,
            length: 0,
        }
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(id) = self.free.pop() {
            self.arena[id] = Some(node);
            id
        } else {
            self.arena.push(Some(node));
            self.arena.len() - 1
        }
    }

    fn free_node(&mut self, id: usize) {
        self.arena[id] = None;
        self.free.push(id);
    }

    fn node(&self, id: usize) -> &Node {
        self.arena[id].as_ref().expect("dangling node handle")
    }

    fn node_mut(&mut self, id: usize) -> &mut Node {
        self.arena[id].as_mut().expect("dangling node handle")
    }

    fn random_level(&self) -> usize {
        let mut level = 1;
        let mut rng = rand::thread_rng();
        use rand::Rng;
        while level < MAX_LEVEL && rng.gen_bool(LEVEL_UP_PROBABILITY) {
            level += 1;
        }
        level
    }

    /// Locates the traversal path to the insertion/removal point for
    /// `key`: `update[i]` is the last node at level `i` whose item is
    /// strictly less than `key`, and `rank[i]` is the 0-based bottom-level
    /// position of `update[i]`.
    fn search_path(&self, key: &Item) -> ([usize; MAX_LEVEL], [u64; MAX_LEVEL]) {
        let mut update = [self.header; MAX_LEVEL];
        let mut rank = [0u64; MAX_LEVEL];
        let mut cursor = self.header;

        for i in (0..self.level).rev() {
            if i + 1 < self.level {
                rank[i] = rank[i + 1];
            }
            loop {
                let next = self.node(cursor).levels[i];
                match next.forward {
                    Some(next_id) if self.node(next_id).item.as_ref().unwrap() < key => {
                        rank[i] += next.span;
                        cursor = next_id;
                    }
                    _ => break,
                }
            }
            update[i] = cursor;
        }

        (update, rank)
    }
}

impl OrderedIndex for SkipListIndex {
    fn add(&mut self, item: Item, previous_score: Option<f64>) -> AddOutcome {
        if let Some(prev) = previous_score {
            if prev == item.score {
                return AddOutcome::Unchanged;
            }
            self.remove_by_score(&item.member, prev);
        }

        let (mut update, rank) = self.search_path(&item);
        let new_level = self.random_level();

        if new_level > self.level {
            let length = self.length;
            for lvl in self.level..new_level {
                update[lvl] = self.header;
                self.node_mut(self.header).levels[lvl].span = length;
            }
            self.level = new_level;
        }

        let mut levels = Vec::with_capacity(new_level);
        for i in 0..new_level {
            let update_level = self.node(update[i]).levels[i];
            levels.push(Level {
                forward: update_level.forward,
                span: update_level.span.saturating_sub(rank[0] - rank[i]),
            });
        }

        let backward = if update[0] == self.header { None } else { Some(update[0]) };
        let new_id = self.alloc(Node { item, backward, levels });

        for i in 0..new_level {
            let update_id = update[i];
            let forward = self.node(update_id).levels[i].forward;
            self.node_mut(new_id).levels[i].forward = forward;
            self.node_mut(update_id).levels[i].forward = Some(new_id);
            self.node_mut(update_id).levels[i].span = (rank[0] - rank[i]) + 1;
        }

        for i in new_level..self.level {
            self.node_mut(update[i]).levels[i].span += 1;
        }

        if let Some(next_id) = self.node(new_id).levels[0].forward {
            self.node_mut(next_id).backward = Some(new_id);
        }

        self.length += 1;
        if previous_score.is_some() {
            AddOutcome::Updated
        } else {
            AddOutcome::Inserted
        }
    }

    fn remove_by_score(&mut self, member: &[u8], score: f64) -> bool {
        let key = Item::new(member.to_vec(), score);
        let (update, _) = self.search_path(&key);

        let target = self.node(update[0]).levels[0].forward;
        let target_id = match target {
            Some(id) if self.node(id).item.as_ref().unwrap().member == member
                && self.node(id).item.as_ref().unwrap().score == score =>
            {
                id
            }
            _ => return false,
        };

        let target_level = self.node(target_id).levels.len();
        for i in 0..self.level {
            let update_id = update[i];
            if i < target_level && self.node(update_id).levels[i].forward == Some(target_id) {
                let target_span = self.node(target_id).levels[i].span;
                let target_forward = self.node(target_id).levels[i].forward;
                self.node_mut(update_id).levels[i].span += target_span.saturating_sub(1);
                self.node_mut(update_id).levels[i].forward = target_forward;
            } else {
                self.node_mut(update_id).levels[i].span = self.node(update_id).levels[i].span.saturating_sub(1);
            }
        }

        let next = self.node(target_id).levels[0].forward;
        let prev = self.node(target_id).backward;
        if let Some(next_id) = next {
            self.node_mut(next_id).backward = prev;
        }

        while self.level > 1 && self.node(self.header).levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }

        self.free_node(target_id);
        self.length -= 1;
        true
    }

    fn rank(&self, member: &[u8], score: f64) -> Option<u64> {
        let key = Item::new(member.to_vec(), score);
        let mut cursor = self.header;
        let mut traversed = 0u64;

        for i in (0..self.level).rev() {
            loop {
                let next = self.node(cursor).levels[i];
                match next.forward {
                    Some(next_id) if self.node(next_id).item.as_ref().unwrap() <= &key => {
                        traversed += next.span;
                        cursor = next_id;
                        let found = self.node(cursor).item.as_ref().unwrap();
                        if found.member == member && found.score == score {
                            return Some(traversed - 1);
                        }
                    }
                    _ => break,
                }
            }
        }
        None
    }

    fn range_by_score(&self, min: f64, max: f64) -> Vec<Item> {
        if min > max {
            return Vec::new();
        }
        let key = Item::new(Vec::new(), min);
        let (update, _) = self.search_path(&key);
        let mut cursor = self.node(update[0]).levels[0].forward;
        let mut out = Vec::new();

        while let Some(id) = cursor {
            let item = self.node(id).item.as_ref().unwrap();
            if item.score > max {
                break;
            }
            if item.score >= min {
                out.push(item.clone());
            }
            cursor = self.node(id).levels[0].forward;
        }
        out
    }

    fn get_by_rank(&self, rank: u64) -> Option<Item> {
        if rank >= self.length {
            return None;
        }
        let target_rank = rank + 1;
        let mut cursor = self.header;
        let mut traversed = 0u64;

        for i in (0..self.level).rev() {
            loop {
                let next = self.node(cursor).levels[i];
                match next.forward {
                    Some(next_id) if traversed + next.span <= target_rank => {
                        traversed += next.span;
                        cursor = next_id;
                        if traversed == target_rank {
                            return self.node(cursor).item.clone();
                        }
                    }
                    _ => break,
                }
            }
        }
        None
    }

    fn range_by_rank(&self, start: u64, stop: u64) -> Vec<Item> {
        if self.length == 0 || start > stop {
            return Vec::new();
        }
        let stop = stop.min(self.length.saturating_sub(1));
        let mut out = Vec::with_capacity((stop - start + 1) as usize);
        let mut rank = start;
        while rank <= stop {
            match self.get_by_rank(rank) {
                Some(item) => out.push(item),
                None => break,
            }
            rank += 1;
        }
        out
    }

    fn count(&self) -> u64 {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordered_index::conformance;

    #[test]
    fn conforms_to_shared_ordered_index_behavior() {
        conformance::exercise(SkipListIndex::new());
    }

    #[test]
    fn survives_many_inserts_and_reports_ascending_ranks() {
        let mut index = SkipListIndex::new();
        for i in 0..500u64 {
            index.add(Item::new(format!("m{i}").into_bytes(), i as f64), None);
        }
        assert_eq!(index.count(), 500);
        for i in 0..500u64 {
            assert_eq!(index.rank(format!("m{i}").as_bytes(), i as f64), Some(i));
        }
        let whole = index.range_by_rank(0, 499);
        assert_eq!(whole.len(), 500);
        assert_eq!(whole[0].score, 0.0);
        assert_eq!(whole[499].score, 499.0);
    }

    #[test]
    fn survives_interleaved_inserts_and_deletes() {
        let mut index = SkipListIndex::new();
        for i in 0..200u64 {
            index.add(Item::new(format!("m{i}").into_bytes(), i as f64), None);
        }
        for i in (0..200u64).step_by(2) {
            assert!(index.remove_by_score(format!("m{i}").as_bytes(), i as f64));
        }
        assert_eq!(index.count(), 100);
        let remaining = index.range_by_score(0.0, 1000.0);
        assert_eq!(remaining.len(), 100);
        for item in &remaining {
            assert_eq!(item.score as u64 % 2, 1);
        }
    }
}
