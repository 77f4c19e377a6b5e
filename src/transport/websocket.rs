//! WebSocket connection adapter.
//!
//! Wraps a `tokio-tungstenite` stream split into reader and writer halves
//! so the read pump and the write pump can use it concurrently.
//!
//! # Lifecycle
//!
//! 1. [`accept`] (server) or [`connect`] (client) performs the handshake
//! 2. [`WebSocketConnection`] is handed to a [`Session`](crate::Session)
//! 3. [`Connection::close`] aborts pending I/O and sends a close frame
//!    from a background task

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Response};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{Message, MessageKind};

use super::connection::{Connection, PongHandler, Shutdown, check_read_limit, expired};

pub use tokio_tungstenite::tungstenite::handshake::server::Request;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for the background close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Writer half of a WebSocket stream.
type Writer<S> = SplitSink<WebSocketStream<S>, WsMessage>;

/// Reader half of a WebSocket stream.
type Reader<S> = SplitStream<WebSocketStream<S>>;

// ============================================================================
// WebSocketConnection
// ============================================================================

/// [`Connection`] over a WebSocket stream.
pub struct WebSocketConnection<S> {
    reader: AsyncMutex<Reader<S>>,
    writer: Arc<AsyncMutex<Writer<S>>>,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    read_deadline: Mutex<Option<Instant>>,
    write_deadline: Mutex<Option<Instant>>,
    read_limit: AtomicUsize,
    pong_handler: Mutex<Option<PongHandler>>,
    shutdown: Shutdown,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an established WebSocket stream.
    ///
    /// The addresses are reported by [`Connection::local_addr`] and
    /// [`Connection::remote_addr`]; pass `None` when unknown.
    pub fn new(
        ws_stream: WebSocketStream<S>,
        local_addr: Option<SocketAddr>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let (writer, reader) = ws_stream.split();

        Self {
            reader: AsyncMutex::new(reader),
            writer: Arc::new(AsyncMutex::new(writer)),
            local_addr,
            remote_addr,
            read_deadline: Mutex::new(None),
            write_deadline: Mutex::new(None),
            read_limit: AtomicUsize::new(0),
            pong_handler: Mutex::new(None),
            shutdown: Shutdown::new(),
        }
    }

    fn on_pong(&self, payload: &[u8]) -> Result<()> {
        let handler = self.pong_handler.lock().clone();
        match handler {
            Some(handler) => handler(payload),
            None => Ok(()),
        }
    }
}

impl WebSocketConnection<TcpStream> {
    /// Wraps a WebSocket stream over TCP, reading both socket addresses.
    pub fn from_tcp(ws_stream: WebSocketStream<TcpStream>) -> Self {
        let local_addr = ws_stream.get_ref().local_addr().ok();
        let remote_addr = ws_stream.get_ref().peer_addr().ok();
        Self::new(ws_stream, local_addr, remote_addr)
    }
}

#[async_trait]
impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn close(&self) -> Result<()> {
        if !self.shutdown.trigger() {
            return Ok(());
        }

        debug!(remote = ?self.remote_addr, "WebSocket connection closing");

        // Pending writes abort on the shutdown signal, so the writer frees up quickly.
        if let Ok(handle) = Handle::try_current() {
            let writer = Arc::clone(&self.writer);
            handle.spawn(async move {
                let _ = timeout(CLOSE_TIMEOUT, async move {
                    let mut writer = writer.lock().await;
                    let _ = writer.send(WsMessage::Close(None)).await;
                    let _ = writer.close().await;
                })
                .await;
            });
        }

        Ok(())
    }

    async fn write_message(&self, kind: MessageKind, payload: Bytes) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(Error::ConnectionClosed);
        }

        let message = to_ws_message(kind, payload)?;
        let deadline = *self.write_deadline.lock();

        tokio::select! {
            () = self.shutdown.wait() => Err(Error::ConnectionClosed),
            () = expired(deadline) => Err(Error::deadline_exceeded("write")),
            result = async {
                let mut writer = self.writer.lock().await;
                writer.send(message).await
            } => {
                trace!(%kind, "WebSocket frame sent");
                result.map_err(Error::from)
            }
        }
    }

    fn set_read_limit(&self, limit: usize) {
        self.read_limit.store(limit, Ordering::Relaxed);
    }

    fn set_read_deadline(&self, deadline: Instant) -> Result<()> {
        *self.read_deadline.lock() = Some(deadline);
        Ok(())
    }

    fn set_write_deadline(&self, deadline: Instant) -> Result<()> {
        *self.write_deadline.lock() = Some(deadline);
        Ok(())
    }

    fn set_pong_handler(&self, handler: PongHandler) {
        *self.pong_handler.lock() = Some(handler);
    }

    async fn read_message(&self) -> Result<Message> {
        let mut reader = self.reader.lock().await;

        loop {
            let deadline = *self.read_deadline.lock();

            let next = tokio::select! {
                () = self.shutdown.wait() => return Err(Error::ConnectionClosed),
                () = expired(deadline) => return Err(Error::deadline_exceeded("read")),
                next = reader.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::ConnectionClosed),
            };

            let limit = self.read_limit.load(Ordering::Relaxed);

            match message {
                WsMessage::Text(text) => {
                    check_read_limit(text.len(), limit)?;
                    return Ok(Message::new(
                        MessageKind::Text,
                        Bytes::copy_from_slice(text.as_bytes()),
                    ));
                }

                WsMessage::Binary(data) => {
                    check_read_limit(data.len(), limit)?;
                    return Ok(Message::new(MessageKind::Binary, data));
                }

                WsMessage::Pong(payload) => self.on_pong(&payload)?,

                WsMessage::Close(frame) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return Err(Error::ConnectionClosed);
                }

                // Pings are answered by tungstenite while reading
                WsMessage::Ping(_) | WsMessage::Frame(_) => {}
            }
        }
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Maps a message kind and payload onto a tungstenite frame.
fn to_ws_message(kind: MessageKind, payload: Bytes) -> Result<WsMessage> {
    let message = match kind {
        MessageKind::Text => {
            let text = String::from_utf8(payload.to_vec())
                .map_err(|e| Error::protocol(format!("text payload is not UTF-8: {e}")))?;
            WsMessage::text(text)
        }
        MessageKind::Binary => WsMessage::Binary(payload),
        MessageKind::Ping => WsMessage::Ping(payload),
        MessageKind::Pong => WsMessage::Pong(payload),
        MessageKind::Close => WsMessage::Close(None),
    };
    Ok(message)
}

// ============================================================================
// Handshakes
// ============================================================================

/// Performs the server-side WebSocket upgrade on an accepted TCP stream.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the upgrade fails.
pub async fn accept(stream: TcpStream) -> Result<WebSocketConnection<TcpStream>> {
    let (connection, ()) = accept_with(stream, |_| ()).await?;
    Ok(connection)
}

/// Performs the server-side upgrade, handing the upgrade request to `inspect`.
///
/// `inspect` runs once during the handshake; its result is returned with
/// the connection.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the upgrade fails.
pub async fn accept_with<F, T>(
    stream: TcpStream,
    inspect: F,
) -> Result<(WebSocketConnection<TcpStream>, T)>
where
    F: FnOnce(&Request) -> T + Send + Unpin,
    T: Send,
{
    set_nodelay(&stream);

    let mut inspected = None;
    let callback = |request: &Request, response: Response| {
        inspected = Some(inspect(request));
        Ok::<_, ErrorResponse>(response)
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

    let inspected = inspected
        .ok_or_else(|| Error::protocol("WebSocket upgrade completed without a request"))?;

    Ok((WebSocketConnection::from_tcp(ws_stream), inspected))
}

/// Dials a `ws://` URL and performs the client handshake.
///
/// # Errors
///
/// - [`Error::Url`] if the URL does not parse
/// - [`Error::Config`] if the scheme is not `ws` or the host is missing
/// - [`Error::Io`] if the TCP connection fails
/// - [`Error::Connection`] if the handshake fails
pub async fn connect(url: &str) -> Result<WebSocketConnection<TcpStream>> {
    let url = Url::parse(url)?;

    if url.scheme() != "ws" {
        return Err(Error::config(format!(
            "unsupported scheme '{}', only ws:// is supported",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("URL has no host: {url}")))?;
    let port = url.port_or_known_default().unwrap_or(80);

    let stream = TcpStream::connect((host, port)).await?;
    set_nodelay(&stream);
    let (ws_stream, _response) = tokio_tungstenite::client_async(url.as_str(), stream)
        .await
        .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

    debug!(%url, "WebSocket connection established");

    Ok(WebSocketConnection::from_tcp(ws_stream))
}

/// Disables Nagle's algorithm so pings and pongs leave immediately.
pub(super) fn set_nodelay(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY");
    }
}

// ============================================================================
// Tests
// ============================================================================
