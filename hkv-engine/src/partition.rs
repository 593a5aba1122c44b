//! # Keyspace Partitioning
//!
//! Purpose: the one hash function that decides which worker shard owns a
//! given key. Used both by the server's acceptor/I/O-handler layer to
//! route a command's first argument to a worker, and by the executor to
//! reject multi-key commands whose keys do not all land on the shard
//! already handling them (`ERR cross-slot keys in request`).
//!
//! A stable, non-cryptographic hash is enough here: `xxh3_64` already
//! backs the sketch and Bloom filter hashing, so reusing it keeps the
//! dependency surface to one hashing family for the whole keyspace engine.

use xxhash_rust::xxh3::xxh3_64;

/// Maps `key` to a shard index in `0..num_shards`.
///
/// `num_shards == 0` always returns `0`; callers that dispatch non-keyed
/// commands (`PING`, `HELP`, `INFO`) to a fixed shard use shard `0`
/// directly rather than calling this function.
pub fn key_slot(key: &[u8], num_shards: usize) -> usize {
    if num_shards == 0 {
        return 0;
    }
    (xxh3_64(key) % num_shards as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_always_maps_to_same_shard() {
        for _ in 0..5 {
            assert_eq!(key_slot(b"hello", 16), key_slot(b"hello", 16));
        }
    }

    #[test]
    fn distributes_across_the_full_range_given_enough_keys() {
        let num_shards = 8;
        let mut seen = vec![false; num_shards];
        for i in 0..10_000u32 {
            let slot = key_slot(format!("key-{i}").as_bytes(), num_shards);
            seen[slot] = true;
        }
        assert!(seen.iter().all(|&s| s), "expected every shard to receive at least one key");
    }

    #[test]
    fn zero_shards_is_handled_without_panicking() {
        assert_eq!(key_slot(b"k", 0), 0);
    }
}
