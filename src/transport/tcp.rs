//! Raw TCP transport with WebSocket framing.
//!
//! Both ends frame messages with the WebSocket wire format directly over
//! the TCP stream, skipping the HTTP upgrade. Only peers that use this
//! module (or implement the same framing) can talk to each other.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::debug;

use crate::error::{Error, Result};

use super::websocket::{WebSocketConnection, set_nodelay};

// ============================================================================
// Listener
// ============================================================================

/// TCP listener producing framed connections.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Binds to `addr`. Use port 0 for a random port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        debug!(addr = ?inner.local_addr().ok(), "TCP listener bound");
        Ok(Self { inner })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accepts the next connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if accepting fails.
    pub async fn accept(&self) -> Result<WebSocketConnection<TcpStream>> {
        let (stream, addr) = self.inner.accept().await?;
        debug!(?addr, "TCP connection accepted");
        Ok(framed(stream, Role::Server).await)
    }
}

// ============================================================================
// Dialing
// ============================================================================

/// Dials `addr` and returns a framed connection.
///
/// # Errors
///
/// Returns [`Error::Io`] if the TCP connection fails.
pub async fn dial(addr: impl ToSocketAddrs) -> Result<WebSocketConnection<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    Ok(framed(stream, Role::Client).await)
}

/// Dials `addr`, giving up after `connect_timeout`.
///
/// # Errors
///
/// - [`Error::DeadlineExceeded`] if the connection is not established in time
/// - [`Error::Io`] if the TCP connection fails
pub async fn dial_timeout(
    addr: impl ToSocketAddrs,
    connect_timeout: Duration,
) -> Result<WebSocketConnection<TcpStream>> {
    timeout(connect_timeout, dial(addr))
        .await
        .map_err(|_| Error::deadline_exceeded("dial"))?
}

async fn framed(stream: TcpStream, role: Role) -> WebSocketConnection<TcpStream> {
    set_nodelay(&stream);
    let ws_stream = WebSocketStream::from_raw_socket(stream, role, None).await;
    WebSocketConnection::from_tcp(ws_stream)
}

// ============================================================================
// Tests
// ============================================================================
