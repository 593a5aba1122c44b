//! # Per-Connection State (C7 helper)
//!
//! Purpose: the read-accumulation buffer and partial-frame decoder an I/O
//! handler keeps for each socket it owns, per the specification's "Frame
//! reassembly" REDESIGN FLAG - a completed frame is dispatched as soon as
//! it arrives, partial frames are retained across reads.

use mio::net::TcpStream;

use hkv_engine::protocol::FrameReader;

/// One accepted connection, owned exclusively by the I/O handler that
/// registered it with its multiplexer.
pub struct Connection {
    pub stream: TcpStream,
    pub reader: FrameReader,
    /// Bytes queued to write back once the socket reports writable, used
    /// only when a reply could not be written in full on the first try.
    pub pending_write: Vec<u8>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            reader: FrameReader::new(),
            pending_write: Vec::new(),
        }
    }
}
