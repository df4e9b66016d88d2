//! TCP listener that keeps a handle on every accepted socket
//!
//! axum's built-in listener hands the socket to hyper and keeps nothing. To
//! notice a client leaving while its pull is still running, every accepted
//! stream is shared: hyper reads and writes through [`PeerStream`] while the
//! request handler receives a [`ClientConnection`] whose probe peeks at the
//! same socket.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use axum::extract::connect_info::Connected;
use axum::serve::{IncomingStream, Listener};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use crate::watcher::PeerConnection;

/// Pause after a failed accept (e.g. EMFILE) before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Listener handing out shared [`PeerStream`]s
#[derive(Debug)]
pub struct PeerListener {
    inner: TcpListener,
}

impl PeerListener {
    /// Bind to `addr`
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr).await?,
        })
    }
}

impl From<TcpListener> for PeerListener {
    fn from(inner: TcpListener) -> Self {
        Self { inner }
    }
}

impl Listener for PeerListener {
    type Io = PeerStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(peer = %addr, "accepted connection");
                    return (PeerStream::new(stream), addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Accepted socket, shared between hyper and the disconnect probe
#[derive(Clone, Debug)]
pub struct PeerStream {
    stream: Arc<TcpStream>,
}

impl PeerStream {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream: Arc::new(stream),
        }
    }

    /// Probe answering whether the peer on this socket is gone
    pub fn probe(&self) -> PeerConnection {
        PeerConnection::new(Arc::clone(&self.stream))
    }
}

impl AsyncRead for PeerStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            ready!(self.stream.poll_read_ready(cx))?;
            match self.stream.try_read(buf.initialize_unfilled()) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                // Readiness was cleared; register interest again.
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Poll::Ready(Err(e)),
            }
        }
    }
}

impl AsyncWrite for PeerStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            ready!(self.stream.poll_write_ready(cx))?;
            match self.stream.try_write(buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Poll::Ready(Err(e)),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(shutdown_write(&self.stream))
    }
}

#[cfg(unix)]
fn shutdown_write(stream: &TcpStream) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is owned by `stream` and stays open for the
    // duration of the call.
    let rc = unsafe { libc::shutdown(stream.as_raw_fd(), libc::SHUT_WR) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    // Peer already gone.
    if err.kind() == io::ErrorKind::NotConnected {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn shutdown_write(_stream: &TcpStream) -> io::Result<()> {
    // The socket is closed once the last handle is dropped.
    Ok(())
}

/// Per-connection information made available to handlers
///
/// Extract it with `ConnectInfo<ClientConnection>` when the router is served
/// through [`PeerListener`].
#[derive(Clone, Debug)]
pub struct ClientConnection {
    /// Address of the client
    pub remote_addr: SocketAddr,
    /// Probe over the client's socket
    pub peer: PeerConnection,
}

impl Connected<IncomingStream<'_, PeerListener>> for ClientConnection {
    fn connect_info(stream: IncomingStream<'_, PeerListener>) -> Self {
        Self {
            remote_addr: *stream.remote_addr(),
            peer: stream.io().probe(),
        }
    }
}
