//! # Dict Shard
//!
//! Purpose: the String-type keyspace store owned by a single worker shard -
//! `key -> value` with optional TTL, lazy expiration on read, a periodic
//! active-expiration sweep, and size-triggered eviction.
//!
//! Grounded on the teacher's `hkv-engine/src/memory.rs` `ShardInner`
//! structure (separate maps for value/expiry/access-order rather than one
//! struct per entry) and `original_source/pkg/data_structure/hash_table/dict.go`'s
//! `Dict`/expiry-map split. Unlike the teacher's `MemoryEngine`, a `Dict` here
//! is never wrapped in a lock: it is exclusively owned by the worker thread
//! that pins its shard, so every method takes `&mut self`.
//!
//! ## Design Principles
//! 1. **No Internal Clock**: every time-sensitive method takes `now_ms`
//!    explicitly, so the active-expire sweep and eviction pool are
//!    deterministic and testable without real sleeps.
//! 2. **Coarse Last-Access**: access recency is a caller-supplied logical
//!    tick, not a wall-clock read per `GET` - cheap enough to bump on every
//!    access without syscall overhead.
//! 3. **Lazy + Active Expiration**: a `GET` on an expired key deletes it and
//!    reports a miss; `active_expire_cycle` additionally sweeps a random
//!    sample so idle expired keys do not linger forever.

use ahash::RandomState;
use hashbrown::HashMap;
use rand::seq::IteratorRandom;

use hkv_common::config::EvictionPolicy;

/// The String-type keyspace owned by one worker shard.
#[derive(Debug)]
pub struct Dict {
    store: HashMap<Vec<u8>, Vec<u8>, RandomState>,
    expiry: HashMap<Vec<u8>, i64, RandomState>,
    last_access: HashMap<Vec<u8>, u64, RandomState>,
    /// Eviction candidates under the approximate-LRU policy, sorted
    /// ascending by last-access tick (oldest first).
    eviction_pool: Vec<(Vec<u8>, u64)>,
}

impl Default for Dict {
    fn default() -> Self {
        Dict::new()
    }
}

impl Dict {
    pub fn new() -> Self {
        Dict {
            store: HashMap::default(),
            expiry: HashMap::default(),
            last_access: HashMap::default(),
            eviction_pool: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn is_expired(&self, key: &[u8], now_ms: i64) -> bool {
        matches!(self.expiry.get(key), Some(&deadline) if deadline <= now_ms)
    }

    /// Removes `key` and all its auxiliary state if it has expired, and
    /// reports whether it did.
    fn expire_if_due(&mut self, key: &[u8], now_ms: i64) -> bool {
        if self.is_expired(key, now_ms) {
            self.store.remove(key);
            self.expiry.remove(key);
            self.last_access.remove(key);
            true
        } else {
            false
        }
    }

    /// Sets `key` to `value`, with an optional absolute expiry deadline in
    /// epoch milliseconds. Clears any prior TTL when `expire_at_ms` is
    /// `None`, matching `SET key value` with no TTL option.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>, expire_at_ms: Option<i64>, now_tick: u64) {
        match expire_at_ms {
            Some(deadline) => {
                self.expiry.insert(key.clone(), deadline);
            }
            None => {
                self.expiry.remove(&key);
            }
        }
        self.last_access.insert(key.clone(), now_tick);
        self.store.insert(key, value);
    }

    /// Reads `key`, applying lazy expiration first. Bumps the access tick
    /// on a hit.
    pub fn get(&mut self, key: &[u8], now_ms: i64, now_tick: u64) -> Option<&Vec<u8>> {
        self.expire_if_due(key, now_ms);
        if self.store.contains_key(key) {
            self.last_access.insert(key.to_vec(), now_tick);
            self.store.get(key)
        } else {
            None
        }
    }

    /// Checks whether `key` is present without affecting access recency
    /// (used by `EXISTS`/`TTL` style commands to avoid distorting LRU order).
    pub fn peek_exists(&mut self, key: &[u8], now_ms: i64) -> bool {
        self.expire_if_due(key, now_ms);
        self.store.contains_key(key)
    }

    /// Deletes `key` unconditionally, reporting whether it was present
    /// (and unexpired).
    pub fn del(&mut self, key: &[u8], now_ms: i64) -> bool {
        let existed = !self.expire_if_due(key, now_ms) && self.store.contains_key(key);
        self.store.remove(key);
        self.expiry.remove(key);
        self.last_access.remove(key);
        existed
    }

    /// Remaining TTL in milliseconds: `None` if the key is missing or
    /// expired, `Some(-1)` if it has no TTL, `Some(ms)` otherwise.
    pub fn ttl_ms(&mut self, key: &[u8], now_ms: i64) -> Option<i64> {
        self.expire_if_due(key, now_ms);
        if !self.store.contains_key(key) {
            return None;
        }
        match self.expiry.get(key) {
            Some(&deadline) => Some((deadline - now_ms).max(0)),
            None => Some(-1),
        }
    }

    /// Removes any TTL from `key`, reporting whether a TTL had been set.
    pub fn persist(&mut self, key: &[u8], now_ms: i64) -> bool {
        self.expire_if_due(key, now_ms);
        self.expiry.remove(key).is_some()
    }

    /// Sets an absolute expiry deadline on `key` if it currently exists,
    /// reporting whether the TTL was applied. A no-op on a missing or
    /// already-expired key, matching `EXPIRE`'s Redis semantics.
    pub fn expire_at(&mut self, key: &[u8], deadline_ms: i64, now_ms: i64) -> bool {
        self.expire_if_due(key, now_ms);
        if self.store.contains_key(key) {
            self.expiry.insert(key.to_vec(), deadline_ms);
            true
        } else {
            false
        }
    }

    /// Number of live keys that currently carry a TTL. Mirrors
    /// `original_source/.../dict.go`'s `ExpiringKeysCount`, but reports the
    /// raw map size rather than filtering already-past deadlines, since
    /// both maps are reconciled lazily on access.
    pub fn expiry_len(&self) -> usize {
        self.expiry.len()
    }

    /// Mean remaining TTL in milliseconds across keys that carry one,
    /// clamped to zero for already-past deadlines. Returns `0` when no key
    /// has a TTL. Mirrors `original_source/.../dict.go`'s `TLL_Avg`.
    pub fn avg_ttl_ms(&self, now_ms: i64) -> i64 {
        if self.expiry.is_empty() {
            return 0;
        }
        let total: i64 = self.expiry.values().map(|&deadline| (deadline - now_ms).max(0)).sum();
        total / self.expiry.len() as i64
    }

    /// Active expiration sweep: samples up to `sample_size` keys that carry
    /// a TTL, removes the expired ones, and repeats while the expired
    /// fraction of the sample meets `threshold`. Mirrors the Go source's
    /// `activeExpireCycle`, bounded here by `max_rounds` instead of a wall
    /// clock budget so it stays deterministic under test.
    pub fn active_expire_cycle(
        &mut self,
        now_ms: i64,
        sample_size: usize,
        threshold: f64,
        max_rounds: usize,
    ) -> usize {
        let mut total_expired = 0;
        let mut rng = rand::thread_rng();

        for _ in 0..max_rounds {
            if self.expiry.is_empty() {
                break;
            }
            let sampled: Vec<Vec<u8>> = self
                .expiry
                .keys()
                .cloned()
                .choose_multiple(&mut rng, sample_size);
            if sampled.is_empty() {
                break;
            }

            let mut expired_in_round = 0;
            for key in &sampled {
                if self.expire_if_due(key, now_ms) {
                    expired_in_round += 1;
                }
            }
            total_expired += expired_in_round;

            let fraction = expired_in_round as f64 / sampled.len() as f64;
            if fraction < threshold {
                break;
            }
        }

        total_expired
    }

    /// Refills the eviction pool (approximate-LRU only) by sampling
    /// `sample_size` random keys, merging them into the pool, and keeping
    /// only the `pool_cap` oldest entries by access tick.
    fn refill_eviction_pool(&mut self, pool_cap: usize, sample_size: usize) {
        let mut rng = rand::thread_rng();
        let sampled: Vec<(Vec<u8>, u64)> = self
            .store
            .keys()
            .choose_multiple(&mut rng, sample_size)
            .into_iter()
            .map(|k| {
                let tick = *self.last_access.get(k).unwrap_or(&0);
                (k.clone(), tick)
            })
            .collect();

        self.eviction_pool.retain(|(k, _)| self.store.contains_key(k));
        for candidate in sampled {
            if !self.eviction_pool.iter().any(|(k, _)| k == &candidate.0) {
                self.eviction_pool.push(candidate);
            }
        }
        self.eviction_pool.sort_by_key(|(_, tick)| *tick);
        self.eviction_pool.truncate(pool_cap);
    }

    /// Evicts keys once `self.len()` has reached `max_keys`, removing
    /// `floor(max_keys * ratio)` keys per the configured policy. Called
    /// both pre-insert (to hold `|store| <= max_keys` at every instant,
    /// not just between maintenance ticks) and from idle maintenance.
    /// Returns the evicted keys (the caller drops their auxiliary state,
    /// e.g. `KeyKind` registry entries, for each).
    pub fn evict(
        &mut self,
        max_keys: usize,
        ratio: f64,
        policy: EvictionPolicy,
        pool_cap: usize,
        sample_size: usize,
    ) -> Vec<Vec<u8>> {
        if self.len() < max_keys {
            return Vec::new();
        }

        let to_evict = ((max_keys as f64) * ratio).floor() as usize;
        let to_evict = to_evict.max(1).min(self.len());
        let mut evicted = Vec::with_capacity(to_evict);

        match policy {
            EvictionPolicy::AllKeysRandom => {
                let mut rng = rand::thread_rng();
                let keys: Vec<Vec<u8>> = self
                    .store
                    .keys()
                    .cloned()
                    .choose_multiple(&mut rng, to_evict);
                for key in keys {
                    self.store.remove(&key);
                    self.expiry.remove(&key);
                    self.last_access.remove(&key);
                    evicted.push(key);
                }
            }
            EvictionPolicy::AllKeysLru => {
                while evicted.len() < to_evict {
                    if self.eviction_pool.is_empty() {
                        self.refill_eviction_pool(pool_cap, sample_size);
                        if self.eviction_pool.is_empty() {
                            break;
                        }
                    }
                    let (key, _) = self.eviction_pool.remove(0);
                    if self.store.remove(&key).is_some() {
                        self.expiry.remove(&key);
                        self.last_access.remove(&key);
                        evicted.push(key);
                    }
                }
            }
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_round_trip() {
        let mut dict = Dict::new();
        dict.set(b"k".to_vec(), b"v".to_vec(), None, 1);
        assert_eq!(dict.get(b"k", 0, 2), Some(&b"v".to_vec()));
    }

    #[test]
    fn expired_key_is_a_miss_and_is_reaped() {
        let mut dict = Dict::new();
        dict.set(b"k".to_vec(), b"v".to_vec(), Some(100), 1);
        assert_eq!(dict.get(b"k", 200, 2), None);
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn ttl_reports_none_missing_minus_one_no_ttl_and_remaining() {
        let mut dict = Dict::new();
        assert_eq!(dict.ttl_ms(b"missing", 0), None);

        dict.set(b"k".to_vec(), b"v".to_vec(), None, 1);
        assert_eq!(dict.ttl_ms(b"k", 0), Some(-1));

        dict.set(b"k2".to_vec(), b"v".to_vec(), Some(500), 1);
        assert_eq!(dict.ttl_ms(b"k2", 100), Some(400));
    }

    #[test]
    fn persist_clears_ttl() {
        let mut dict = Dict::new();
        dict.set(b"k".to_vec(), b"v".to_vec(), Some(500), 1);
        assert!(dict.persist(b"k", 0));
        assert_eq!(dict.ttl_ms(b"k", 0), Some(-1));
        assert!(!dict.persist(b"k", 0));
    }

    #[test]
    fn expire_at_applies_only_to_existing_keys() {
        let mut dict = Dict::new();
        assert!(!dict.expire_at(b"missing", 500, 0));

        dict.set(b"k".to_vec(), b"v".to_vec(), None, 1);
        assert!(dict.expire_at(b"k", 500, 0));
        assert_eq!(dict.ttl_ms(b"k", 100), Some(400));
    }

    #[test]
    fn ttl_stats_report_count_and_mean_remaining() {
        let mut dict = Dict::new();
        assert_eq!(dict.expiry_len(), 0);
        assert_eq!(dict.avg_ttl_ms(0), 0);

        dict.set(b"k1".to_vec(), b"v".to_vec(), Some(1_000), 1);
        dict.set(b"k2".to_vec(), b"v".to_vec(), Some(2_000), 2);
        dict.set(b"k3".to_vec(), b"v".to_vec(), None, 3);

        assert_eq!(dict.expiry_len(), 2);
        assert_eq!(dict.avg_ttl_ms(0), 1_500);
    }

    #[test]
    fn active_expire_cycle_reaps_expired_sample() {
        let mut dict = Dict::new();
        for i in 0..10u32 {
            dict.set(format!("k{i}").into_bytes(), b"v".to_vec(), Some(100), i as u64);
        }
        let reaped = dict.active_expire_cycle(200, 20, 0.25, 5);
        assert_eq!(reaped, 10);
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn evict_triggers_at_the_cap_not_only_past_it() {
        let mut dict = Dict::new();
        for i in 0..10u32 {
            dict.set(format!("k{i}").into_bytes(), b"v".to_vec(), None, i as u64);
        }
        assert_eq!(dict.len(), 10);
        let evicted = dict.evict(10, 0.5, EvictionPolicy::AllKeysRandom, 16, 5);
        assert_eq!(evicted.len(), 5);
        assert_eq!(dict.len(), 5);
    }

    #[test]
    fn random_eviction_shrinks_to_quota() {
        let mut dict = Dict::new();
        for i in 0..100u32 {
            dict.set(format!("k{i}").into_bytes(), b"v".to_vec(), None, i as u64);
        }
        let evicted = dict.evict(90, 0.5, EvictionPolicy::AllKeysRandom, 16, 5);
        assert_eq!(evicted.len(), 45);
        assert_eq!(dict.len(), 55);
    }

    #[test]
    fn lru_eviction_prefers_oldest_access_tick() {
        let mut dict = Dict::new();
        for i in 0..20u32 {
            dict.set(format!("k{i}").into_bytes(), b"v".to_vec(), None, i as u64);
        }
        // Force every key into consideration by using a large sample size.
        let evicted = dict.evict(10, 0.5, EvictionPolicy::AllKeysLru, 20, 20);
        assert_eq!(evicted.len(), 5);
        for key in &evicted {
            let idx: u32 = std::str::from_utf8(&key[1..]).unwrap().parse().unwrap();
            assert!(idx < 5, "expected an early (cold) key to be evicted, got k{idx}");
        }
    }
}
