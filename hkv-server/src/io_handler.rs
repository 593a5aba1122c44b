//! # I/O Handler (C7)
//!
//! Purpose: one multiplexer-driven thread that owns a subset of accepted
//! connections, reads frames, dispatches parsed commands to the worker
//! pool by partition, and writes replies back. Implemented against `mio`
//! (see SPEC_FULL.md §4.7 for why `mio` rather than the teacher's `tokio`
//! runtime: the specification mandates an explicit thread-per-handler,
//! non-async loop, which an async runtime's scheduler does not give
//! control over).
//!
//! State machine (REDESIGN FLAGS "Coroutine-style I/O loop"): each call to
//! `run` loops through `{Running, ShuttingDown}` - there is no separate
//! `Sweeping` state here because active expiration runs inside the worker
//! threads (`hkv_engine::Shard::run`), not the I/O loop, a deliberate
//! placement choice recorded in `DESIGN.md`.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;

use hkv_engine::protocol::{self, CommandError, DecodeError};
use hkv_engine::{Command, Task, Value};

use crate::connection::Connection;
use crate::metrics::Metrics;

/// How long `Poll::poll` blocks per iteration when idle. Bounds how
/// quickly the handler notices a new connection handed off by the
/// acceptor or the process-wide shutdown flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Non-keyed commands (`PING`, `HELP`, `INFO`) are dispatched to this fixed
/// shard rather than a randomly chosen one, per the specification's
/// REDESIGN FLAG making non-keyed dispatch deterministic for tests.
const FIXED_SHARD_FOR_NONKEYED: usize = 0;

/// A thread-owned multiplexer over a subset of accepted connections.
///
/// The `fd -> Connection` map is the one mutex named in the specification's
/// concurrency model (§5): the acceptor thread inserts new connections
/// concurrently with this handler's own thread reading the map during
/// `run`, so it is the only piece of shared state that needs a lock - held
/// only for the duration of a single map operation, never across I/O.
pub struct IoHandler {
    id: usize,
    poll: Poll,
    connections: Arc<Mutex<HashMap<Token, Connection>>>,
    next_token: usize,
    new_conn_rx: crossbeam_channel::Receiver<mio::net::TcpStream>,
    worker_senders: Vec<Sender<Task>>,
    metrics: Arc<Metrics>,
}

impl IoHandler {
    pub fn new(
        id: usize,
        new_conn_rx: crossbeam_channel::Receiver<mio::net::TcpStream>,
        worker_senders: Vec<Sender<Task>>,
        metrics: Arc<Metrics>,
    ) -> io::Result<Self> {
        Ok(IoHandler {
            id,
            poll: Poll::new()?,
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_token: 0,
            new_conn_rx,
            worker_senders,
            metrics,
        })
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        token
    }

    /// Registers a freshly accepted connection for read readiness.
    fn add_connection(&mut self, mut stream: mio::net::TcpStream) -> io::Result<()> {
        let token = self.next_token();
        self.poll.registry().register(&mut stream, token, Interest::READABLE)?;
        self.connections.lock().insert(token, Connection::new(stream));
        Ok(())
    }

    fn close_connection(&mut self, token: Token) {
        let mut connections = self.connections.lock();
        if let Some(mut conn) = connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
    }

    /// Blocks in the multiplexer, processing readiness events until
    /// `shutdown` is observed.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        let mut events = Events::with_capacity(1024);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Drain any connections the acceptor handed off since the last
            // iteration before blocking in `poll` again.
            while let Ok(stream) = self.new_conn_rx.try_recv() {
                if let Err(err) = self.add_connection(stream) {
                    tracing::warn!(handler = self.id, error = %err, "failed to register connection");
                }
            }

            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::error!(handler = self.id, error = %err, "multiplexer wait failed");
                    continue;
                }
            }

            let tokens: Vec<Token> = events.iter().map(|event| event.token()).collect();
            for token in tokens {
                self.service_connection(token);
            }
        }

        tracing::info!(handler = self.id, "io handler stopped");
    }

    /// Reads all currently-available bytes for `token`'s connection,
    /// decodes as many complete frames as are buffered, and dispatches
    /// each in turn. A connection is closed on EOF, a read error, or a
    /// malformed frame.
    fn service_connection(&mut self, token: Token) {
        let mut buf = [0u8; 4096];
        loop {
            let read_result = {
                let mut connections = self.connections.lock();
                let Some(conn) = connections.get_mut(&token) else { return };
                conn.stream.read(&mut buf)
            };

            match read_result {
                Ok(0) => {
                    self.close_connection(token);
                    return;
                }
                Ok(n) => {
                    let mut connections = self.connections.lock();
                    if let Some(conn) = connections.get_mut(&token) {
                        conn.reader.feed(&buf[..n]);
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::debug!(handler = self.id, error = %err, "connection read error");
                    self.close_connection(token);
                    return;
                }
            }
        }

        loop {
            let next = {
                let mut connections = self.connections.lock();
                let Some(conn) = connections.get_mut(&token) else { return };
                conn.reader.next_command()
            };

            match next {
                Ok(Some(command)) => {
                    let reply = self.dispatch(command);
                    if !self.write_reply(token, &reply) {
                        return;
                    }
                }
                Ok(None) => break,
                Err(CommandError::Decode(DecodeError::MalformedFrame)) => {
                    tracing::debug!(handler = self.id, "malformed frame, closing connection");
                    self.close_connection(token);
                    return;
                }
                Err(CommandError::EmptyCommand) => break,
                Err(CommandError::Decode(DecodeError::TruncatedFrame)) => break,
            }
        }
    }

    /// Routes `command` to its owning worker: `PING`/`HELP`/`INFO` always go
    /// to the fixed shard regardless of their (non-keyed) arguments, every
    /// other verb hashes its first argument to pick a shard. Blocks on the
    /// single-shot reply channel and returns the reply value.
    fn dispatch(&self, command: Command) -> Value {
        self.metrics.record_request_start();
        let start = std::time::Instant::now();

        let is_nonkeyed = matches!(command.verb.as_slice(), b"PING" | b"HELP" | b"INFO");
        let shard_index = if is_nonkeyed || command.args.is_empty() {
            FIXED_SHARD_FOR_NONKEYED
        } else {
            hkv_engine::key_slot(&command.args[0], self.worker_senders.len())
        };

        let (reply_tx, reply_rx) = std::sync::mpsc::sync_channel(1);
        let task = Task { command, reply: reply_tx };

        let value = match self.worker_senders[shard_index].send(task) {
            Ok(()) => match reply_rx.recv() {
                Ok(value) => value,
                Err(_) => protocol::error("SHUTDOWN"),
            },
            Err(_) => protocol::error("SHUTDOWN"),
        };

        if matches!(value, Value::Error(_)) {
            self.metrics.record_error();
        }
        self.metrics.record_request_end(start.elapsed());
        value
    }

    /// Encodes and writes `value` to `token`'s socket. Returns `false` if
    /// the connection was closed as a result (write error), `true`
    /// otherwise.
    fn write_reply(&mut self, token: Token, value: &Value) -> bool {
        let mut out = Vec::new();
        protocol::encode(value, &mut out);

        let mut connections = self.connections.lock();
        let Some(conn) = connections.get_mut(&token) else { return false };

        match conn.stream.write_all(&out) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(handler = self.id, error = %err, "write failed, closing connection");
                drop(connections);
                self.close_connection(token);
                false
            }
        }
    }
}
