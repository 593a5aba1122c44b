//! # Bloom Filter
//!
//! Purpose: a fixed-capacity probabilistic set membership test for the
//! `BF.*` command family. Ported from
//! `original_source/pkg/data_structure/probabilistic/bloom.go`: bit count
//! and hash count are derived once from the target capacity and false
//! positive rate, and every `add`/`contains` call derives `hash_count`
//! independent bit positions from a single 128-bit hash via double hashing
//! (`h_i = a + i*b mod bits`), rather than computing `hash_count` separate
//! hashes.
//!
//! Uses `xxhash-rust`'s `xxh3_128`, the same family already pulled in for
//! `sketch`'s row hashing, split into its high/low 64-bit halves as the `a`
//! and `b` terms of the double-hashing scheme.

use xxhash_rust::xxh3::xxh3_128_with_seed;

#[derive(Debug)]
pub struct BloomFilter {
    bits: Vec<u64>,
    bit_count: u64,
    hash_count: u32,
}

impl BloomFilter {
    /// Sizes a filter for `capacity` expected entries at false positive
    /// rate `error_rate`. `bit_count` is rounded up to a multiple of 64 so
    /// the backing `Vec<u64>` has no partial word.
    pub fn new(capacity: u64, error_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let ln2 = std::f64::consts::LN_2;
        let bits_per_entry = error_rate.ln().abs() / (ln2 * ln2);

        let raw_bits = (capacity as f64 * bits_per_entry).ceil() as u64;
        let bit_count = raw_bits.max(64).div_ceil(64) * 64;
        let hash_count = ((bits_per_entry * ln2).ceil() as u32).max(1);

        BloomFilter {
            bits: vec![0u64; (bit_count / 64) as usize],
            bit_count,
            hash_count,
        }
    }

    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    fn positions(&self, item: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let hash = xxh3_128_with_seed(item, 0);
        let a = (hash >> 64) as u64;
        let b = hash as u64;
        (0..self.hash_count as u64).map(move |i| a.wrapping_add(i.wrapping_mul(b)) % self.bit_count)
    }

    fn set_bit(&mut self, pos: u64) {
        let word = (pos / 64) as usize;
        let bit = pos % 64;
        self.bits[word] |= 1 << bit;
    }

    fn get_bit(&self, pos: u64) -> bool {
        let word = (pos / 64) as usize;
        let bit = pos % 64;
        self.bits[word] & (1 << bit) != 0
    }

    /// Adds `item`, returning whether it may already have been present
    /// (`true` if every derived bit was already set before this call).
    pub fn add(&mut self, item: &[u8]) -> bool {
        let positions: Vec<u64> = self.positions(item).collect();
        let already_present = positions.iter().all(|&p| self.get_bit(p));
        for pos in positions {
            self.set_bit(pos);
        }
        already_present
    }

    /// Tests membership. `false` is a certain negative; `true` may be a
    /// false positive.
    pub fn contains(&self, item: &[u8]) -> bool {
        self.positions(item).all(|p| self.get_bit(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_bit_count_to_a_multiple_of_64() {
        let bf = BloomFilter::new(1000, 0.01);
        assert_eq!(bf.bit_count() % 64, 0);
        assert!(bf.hash_count() >= 1);
    }

    #[test]
    fn no_false_negatives() {
        let mut bf = BloomFilter::new(1000, 0.01);
        let items: Vec<String> = (0..500).map(|i| format!("item-{i}")).collect();
        for item in &items {
            bf.add(item.as_bytes());
        }
        for item in &items {
            assert!(bf.contains(item.as_bytes()));
        }
    }

    #[test]
    fn false_positive_rate_is_reasonably_bounded() {
        let mut bf = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            bf.add(format!("in-{i}").as_bytes());
        }
        let mut false_positives = 0;
        let trials = 2000;
        for i in 0..trials {
            if bf.contains(format!("out-{i}").as_bytes()) {
                false_positives += 1;
            }
        }
        let rate = false_positives as f64 / trials as f64;
        assert!(rate < 0.05, "observed false positive rate too high: {rate}");
    }

    #[test]
    fn add_reports_prior_presence() {
        let mut bf = BloomFilter::new(100, 0.01);
        assert!(!bf.add(b"x"));
        assert!(bf.add(b"x"));
    }
}
