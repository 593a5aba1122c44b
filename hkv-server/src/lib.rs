//! # HybridKV Server (C7-C8)
//!
//! Wires the worker pool, I/O handlers, and acceptor threads together and
//! exposes the one entry point the binary (and integration tests) call:
//! `run`. Nothing here reads the environment or installs a signal handler -
//! both are the caller's job, per spec.md §1's explicit exclusion of a
//! startup harness from THE CORE.

pub mod acceptor;
pub mod connection;
pub mod io_handler;
pub mod metrics;
pub mod worker;

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use hkv_common::config::Config;

use acceptor::Acceptor;
use io_handler::IoHandler;
use metrics::Metrics;
use worker::WorkerPool;

/// Runs the server until `shutdown` is observed by every acceptor and I/O
/// handler thread, then joins all of them (including the worker pool)
/// before returning. Binds `config.listener_num` `SO_REUSEPORT` listeners
/// feeding `config.listener_num` I/O handlers (one per listener keeps the
/// accept-to-dispatch path on the same core pinning the spec's lifecycle
/// section describes), each of which dispatches parsed commands across
/// `config.worker_num` worker shards.
pub fn run(config: Config, shutdown: Arc<AtomicBool>) -> io::Result<()> {
    let metrics = Arc::new(Metrics::new());
    let listen_addr = acceptor::resolve_listen_addr(&config.port)?;

    let workers = WorkerPool::spawn(config.worker_num, config.clone(), Arc::clone(&shutdown));

    let handler_count = config.listener_num.max(1);
    let mut handler_threads = Vec::with_capacity(handler_count);
    let mut handler_conn_senders = Vec::with_capacity(handler_count);

    for id in 0..handler_count {
        let (conn_tx, conn_rx) = crossbeam_channel::unbounded();
        let handler = IoHandler::new(id, conn_rx, workers.senders.clone(), Arc::clone(&metrics))?;
        let handler_shutdown = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name(format!("hkv-io-{id}"))
            .spawn(move || handler.run(handler_shutdown))?;
        handler_threads.push(thread);
        handler_conn_senders.push(conn_tx);
    }

    let mut acceptor_threads = Vec::with_capacity(handler_count);
    for id in 0..handler_count {
        let acceptor = Acceptor::bind(id, listen_addr, handler_conn_senders.clone())?;
        let acceptor_shutdown = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name(format!("hkv-acceptor-{id}"))
            .spawn(move || acceptor.run(acceptor_shutdown))?;
        acceptor_threads.push(thread);
    }

    tracing::info!(
        addr = %listen_addr,
        listeners = handler_count,
        workers = workers.num_workers(),
        "hkv-server listening"
    );

    for thread in acceptor_threads {
        let _ = thread.join();
    }
    for thread in handler_threads {
        let _ = thread.join();
    }
    workers.join();

    Ok(())
}
