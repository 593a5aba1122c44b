//! # Acceptor (C8)
//!
//! Purpose: bind the listening port and hand off accepted connections to
//! the I/O handlers. Supports the specification's multi-listener mode,
//! where `listener_num` threads each bind their own socket to the same
//! address with `SO_REUSEPORT` so the kernel load-balances inbound
//! connections across them instead of funneling everything through one
//! `accept` call.
//!
//! Grounded on `original_source/pkg/core/acceptor.go`'s "one listener per
//! OS thread, `SO_REUSEPORT` shared port" model; `socket2` is the crate the
//! rest of the pack (not the teacher, which never needed raw socket
//! options) uses to set that flag before handing the socket to a standard
//! listener type.

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use mio::net::TcpStream;
use socket2::{Domain, Protocol, Socket, Type};

/// Resolves the specification's `Config::port` field (e.g. `":6379"`,
/// `"127.0.0.1:6379"`) into a concrete `SocketAddr`, defaulting an
/// address-less port to all interfaces the way the Go source's listener
/// setup does.
pub fn resolve_listen_addr(port: &str) -> io::Result<SocketAddr> {
    let spec = if port.starts_with(':') { format!("0.0.0.0{port}") } else { port.to_string() };
    spec.to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("unresolvable listen address: {port}")))
}

/// Builds one `SO_REUSEPORT`-enabled, non-blocking listener bound to
/// `addr`. Every acceptor thread calls this against the same address so
/// the kernel distributes inbound connections across them.
fn bind_reuseport(addr: SocketAddr) -> io::Result<StdTcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(socket.into())
}

/// One acceptor thread's loop: accepts connections from its own
/// `SO_REUSEPORT` listener and round-robins each accepted stream to one of
/// `handler_senders` by index.
pub struct Acceptor {
    id: usize,
    listener: StdTcpListener,
    handler_senders: Vec<crossbeam_channel::Sender<TcpStream>>,
    next_handler: AtomicUsize,
}

impl Acceptor {
    /// Binds a fresh `SO_REUSEPORT` listener on `addr` for this acceptor.
    pub fn bind(
        id: usize,
        addr: SocketAddr,
        handler_senders: Vec<crossbeam_channel::Sender<TcpStream>>,
    ) -> io::Result<Self> {
        let listener = bind_reuseport(addr)?;
        Ok(Acceptor { id, listener, handler_senders, next_handler: AtomicUsize::new(0) })
    }

    /// Polls for inbound connections until `shutdown` is observed. The
    /// listener is non-blocking so the loop can re-check `shutdown` between
    /// spurious `WouldBlock` results without ever hanging in `accept`.
    pub fn run(self, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        tracing::warn!(acceptor = self.id, error = %err, "failed to set connection non-blocking");
                        continue;
                    }
                    let mio_stream = TcpStream::from_std(stream);
                    let index = self.next_handler.fetch_add(1, Ordering::Relaxed) % self.handler_senders.len();
                    if self.handler_senders[index].send(mio_stream).is_err() {
                        tracing::warn!(acceptor = self.id, "io handler channel closed, dropping connection");
                    } else {
                        tracing::debug!(acceptor = self.id, handler = index, %peer, "accepted connection");
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::error!(acceptor = self.id, error = %err, "accept failed");
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        tracing::info!(acceptor = self.id, "acceptor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_colon_prefixed_port_to_all_interfaces() {
        let addr = resolve_listen_addr(":16379").unwrap();
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
        assert_eq!(addr.port(), 16379);
    }

    #[test]
    fn resolves_explicit_host_port() {
        let addr = resolve_listen_addr("127.0.0.1:16380").unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 16380);
    }
}
