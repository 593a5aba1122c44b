//! # Shared Error Taxonomy
//!
//! Purpose: One error enum shared by the engine and server crates so wire
//! replies and internal `Result`s stay aligned with the RESP error frame
//! kinds the client actually sees.
//!
//! ## Design Principles
//! 1. **One Taxonomy, One Wire Mapping**: Every variant knows how to render
//!    itself as the `-ERR ...` / `-WRONGTYPE ...` text the codec writes out.
//! 2. **No Silent Failures**: Eviction and lazy expiration are not errors;
//!    only genuine command/arity/type violations are.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type HkvResult<T> = Result<T, HkvError>;

/// Errors surfaced by the keyspace engine and command executor.
///
/// The `Display` impl matches the exact wire text the codec writes after the
/// `-` prefix (see `hkv_engine::protocol::encode_error`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HkvError {
    /// Command arity mismatch, e.g. `GET` with no key.
    #[error("ERR wrong number of arguments for '{0}'")]
    WrongArity(String),

    /// A numeric argument (TTL seconds, score, count) failed to parse.
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// An unrecognized option in an otherwise well-formed command.
    #[error("ERR syntax error")]
    SyntaxError,

    /// `INFO` with an unsupported section name.
    #[error("ERR unknown INFO section")]
    UnknownInfoSection,

    /// No handler registered for the verb.
    #[error("CMD NOT FOUND")]
    UnknownCommand,

    /// The key exists but holds a value of a different logical type.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// A multi-key command (`DEL k1 k2`) whose keys hash to different
    /// shards; THE CORE has no cross-shard atomicity so this is rejected
    /// rather than silently executed against one partition.
    #[error("ERR cross-slot keys in request")]
    CrossSlot,
}
