// hkv-engine - Keyspace storage engine and command executor for HybridKV
//
// This crate owns everything that runs inside a single worker shard: the
// wire codec, the Dict keyspace with expiry and eviction, the ordered-index
// implementations backing sorted sets, the probabilistic structures, and the
// pure command executor that turns a parsed `Command` into a reply `Value`.
//
// Nothing in this crate touches a socket or spawns a thread - that is
// `hkv-server`'s job. A `Shard` here is a plain, single-threaded owner of a
// disjoint keyspace slice; the server crate is the one that pins it to a
// worker thread and feeds it a channel of tasks.

pub mod bloom;
pub mod btree_index;
pub mod dict;
pub mod executor;
pub mod ordered_index;
pub mod partition;
pub mod protocol;
pub mod shard;
pub mod simple_set;
pub mod skiplist_index;
pub mod sketch;
pub mod sorted_set;

pub use dict::Dict;
pub use executor::execute;
pub use partition::key_slot;
pub use protocol::{Command, Value};
pub use shard::{KeyKind, Shard, Task};
pub use sorted_set::SortedSet;
