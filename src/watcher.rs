//! Client disconnection detection
//!
//! While a pull runs, the dispatcher asks a [`DisconnectProbe`] once per poll
//! tick whether the caller is still there. The socket-backed probe peeks at
//! the connection without consuming anything the HTTP layer still needs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use tokio::net::TcpStream;

/// Answers "has the peer gone away?"
///
/// Implementations must be cheap and must not block.
pub trait DisconnectProbe: Send + Sync {
    /// `true` once the peer is known to be gone
    fn is_disconnected(&self) -> bool;
}

/// Probe for callers without a connection (in-process use, the legacy worker)
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverDisconnects;

impl DisconnectProbe for NeverDisconnects {
    fn is_disconnected(&self) -> bool {
        false
    }
}

/// Probe driven by a flag, for callers that learn about disconnection elsewhere
#[derive(Clone, Debug, Default)]
pub struct DisconnectFlag(Arc<AtomicBool>);

impl DisconnectFlag {
    /// Create a flag in the connected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the peer as gone
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl DisconnectProbe for DisconnectFlag {
    fn is_disconnected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared handle to an accepted TCP connection
///
/// The HTTP server reads and writes through the same socket (see
/// [`crate::api::listener`]); this handle only ever peeks.
#[derive(Clone, Debug)]
pub struct PeerConnection {
    stream: Arc<TcpStream>,
}

impl PeerConnection {
    /// Wrap a shared stream
    pub fn new(stream: Arc<TcpStream>) -> Self {
        Self { stream }
    }
}

impl DisconnectProbe for PeerConnection {
    fn is_disconnected(&self) -> bool {
        let mut buf = [0u8; 1];
        match self.stream.peek(&mut buf).now_or_never() {
            // Nothing buffered and no EOF: peer still connected.
            None => false,
            // Readable with zero bytes: orderly close.
            Some(Ok(0)) => true,
            // Pipelined bytes are waiting; the peer is alive. A reset that
            // arrives behind unread bytes stays hidden until they are read.
            Some(Ok(_)) => false,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "peek on client socket failed");
                true
            }
        }
    }
}
