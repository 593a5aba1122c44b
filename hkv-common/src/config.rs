//! # Environment Configuration
//!
//! Purpose: Load the fixed set of `REDIS_*` / `LISTENER_NUM` environment
//! variables into a typed `Config`, falling back to documented defaults on
//! missing or malformed values.
//!
//! This is the "environment-variable configuration loader" collaborator
//! named as out-of-core in the specification: THE CORE's `hkv_server::run`
//! takes an already-parsed `Config`, it never reads the environment itself.
//!
//! ## Design Principles
//! 1. **Never Fail Startup on a Bad Value**: an invalid value logs a warning
//!    and falls back to the default, matching the Go source's
//!    `getEnvAsInt`/`getEnvAsFloat` behavior.
//! 2. **One Source of Truth**: every tunable the core consults is named here.

use std::env;
use std::str::FromStr;

/// Keyspace eviction policy, selected by `REDIS_EVICTION_POLICY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict arbitrary keys until the quota is met.
    AllKeysRandom,
    /// Evict via the approximate-LRU eviction pool.
    AllKeysLru,
}

impl EvictionPolicy {
    fn parse(raw: &str) -> Self {
        match raw {
            "allkeys-lru" => EvictionPolicy::AllKeysLru,
            "allkeys-random" => EvictionPolicy::AllKeysRandom,
            other => {
                tracing::warn!(policy = %other, "unknown eviction policy, defaulting to allkeys-random");
                EvictionPolicy::AllKeysRandom
            }
        }
    }
}

/// Full set of server-tunable knobs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener network, e.g. "tcp".
    pub protocol: String,
    /// Listener address, e.g. ":6379".
    pub port: String,
    /// Multiplexer event buffer size (max simultaneous tracked connections).
    pub max_connection: usize,
    /// Per-shard key cap before eviction kicks in.
    pub max_key_number: usize,
    /// Fraction of `max_key_number` evicted per trigger.
    pub eviction_ratio: f64,
    /// Eviction policy.
    pub eviction_policy: EvictionPolicy,
    /// Eviction-pool capacity for the approximate-LRU policy.
    pub epool_max_size: usize,
    /// Random sample size used to refill the eviction pool.
    pub epool_lru_sample_size: usize,
    /// Number of acceptor threads sharing one port via `SO_REUSEPORT`.
    pub listener_num: usize,
    /// Number of worker shards the keyspace is partitioned across.
    pub worker_num: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            protocol: "tcp".to_string(),
            port: ":6379".to_string(),
            max_connection: 20_000,
            max_key_number: 1_000_000,
            eviction_ratio: 0.1,
            eviction_policy: EvictionPolicy::AllKeysRandom,
            epool_max_size: 16,
            epool_lru_sample_size: 5,
            listener_num: 4,
            worker_num: 8,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to
    /// defaults on missing or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            protocol: get_env("REDIS_PROTOCOL", defaults.protocol),
            port: get_env("REDIS_PORT", defaults.port),
            max_connection: get_env_as("REDIS_MAX_CONNECTION", defaults.max_connection),
            max_key_number: get_env_as("REDIS_MAX_KEY_NUMBER", defaults.max_key_number),
            eviction_ratio: get_env_as("REDIS_EVICTION_RATIO", defaults.eviction_ratio),
            eviction_policy: env::var("REDIS_EVICTION_POLICY")
                .ok()
                .map(|raw| EvictionPolicy::parse(&raw))
                .unwrap_or(defaults.eviction_policy),
            epool_max_size: get_env_as("REDIS_EPOOL_MAX_SIZE", defaults.epool_max_size),
            epool_lru_sample_size: get_env_as(
                "REDIS_EPOOL_LRU_SAMPLE_SIZE",
                defaults.epool_lru_sample_size,
            ),
            listener_num: get_env_as("LISTENER_NUM", defaults.listener_num),
            worker_num: get_env_as("REDIS_WORKER_NUM", defaults.worker_num),
        }
    }
}

fn get_env(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn get_env_as<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw, "invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.port, ":6379");
        assert_eq!(cfg.max_key_number, 1_000_000);
        assert_eq!(cfg.eviction_policy, EvictionPolicy::AllKeysRandom);
        assert_eq!(cfg.listener_num, 4);
    }

    #[test]
    fn eviction_policy_unknown_defaults_to_random() {
        assert_eq!(EvictionPolicy::parse("garbage"), EvictionPolicy::AllKeysRandom);
        assert_eq!(EvictionPolicy::parse("allkeys-lru"), EvictionPolicy::AllKeysLru);
    }
}
