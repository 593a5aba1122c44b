//! # Worker Pool (C6)
//!
//! Purpose: spawn the fixed pool of single-threaded worker shards and hand
//! back the bounded senders the I/O handlers dispatch tasks through.
//!
//! Grounded on `original_source/pkg/core/worker.go`'s one-goroutine-per-shard
//! model; `hkv_engine::Shard::run` already implements the per-task
//! execute-and-reply loop plus the maintenance sweep between tasks (see its
//! doc comment), so this module is just the thread-spawning glue the
//! specification's C6 responsibility names.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;

use hkv_common::config::Config;
use hkv_engine::{Shard, Task};

/// Bounded MPSC queue capacity per worker shard (`TaskBufferSize`, spec §4.6).
pub const TASK_BUFFER_SIZE: usize = 1024;

/// How often an idle worker runs its maintenance sweep (active expiration +
/// eviction) between tasks.
const MAINTENANCE_PERIOD: Duration = Duration::from_millis(100);

/// A running worker pool: one sender per shard, plus the join handles used
/// to wait for clean shutdown.
pub struct WorkerPool {
    pub senders: Vec<Sender<Task>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_workers` shard threads, each owning its own `Shard` and
    /// draining its own bounded queue until `shutdown` is observed.
    pub fn spawn(num_workers: usize, config: Config, shutdown: Arc<AtomicBool>) -> Self {
        let num_workers = num_workers.max(1);
        let mut senders = Vec::with_capacity(num_workers);
        let mut handles = Vec::with_capacity(num_workers);

        for id in 0..num_workers {
            let (tx, rx) = crossbeam_channel::bounded::<Task>(TASK_BUFFER_SIZE);
            let shard = Shard::new(config.clone());
            let shutdown = Arc::clone(&shutdown);

            let handle = std::thread::Builder::new()
                .name(format!("hkv-worker-{id}"))
                .spawn(move || {
                    tracing::info!(worker = id, "worker shard started");
                    shard.run(rx, shutdown, MAINTENANCE_PERIOD);
                    tracing::info!(worker = id, "worker shard stopped");
                })
                .expect("failed to spawn worker thread");

            senders.push(tx);
            handles.push(handle);
        }

        WorkerPool { senders, handles }
    }

    pub fn num_workers(&self) -> usize {
        self.senders.len()
    }

    /// Drops every sender (closing each worker's queue) and joins every
    /// worker thread. Called after the shutdown flag has been raised so
    /// the worker loops observe a closed channel and exit.
    pub fn join(self) {
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}
