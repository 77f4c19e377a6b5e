//! In-process connection pair.
//!
//! [`MemoryConnection::pair`] returns two connected ends backed by
//! unbounded channels. Frames keep their [`MessageKind`], so the pair
//! behaves like a framed transport: pings are answered while the
//! receiving end is reading, pongs reach the pong handler, and closing
//! one end delivers a close frame to the other.
//!
//! Useful for tests and for wiring sessions together inside one process.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::Instant;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{Message, MessageKind};

use super::connection::{Connection, PongHandler, Shutdown, check_read_limit, expired};

// ============================================================================
// MemoryConnection
// ============================================================================

/// One end of an in-process connection pair.
pub struct MemoryConnection {
    /// Frames sent by the peer.
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Message>>,
    /// Frames sent to the peer.
    outbound: mpsc::UnboundedSender<Message>,
    read_deadline: Mutex<Option<Instant>>,
    write_deadline: Mutex<Option<Instant>>,
    read_limit: AtomicUsize,
    pong_handler: Mutex<Option<PongHandler>>,
    auto_pong: AtomicBool,
    shutdown: Shutdown,
}

impl MemoryConnection {
    /// Creates two connected ends.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(b_rx, a_tx), Self::new(a_rx, b_tx))
    }

    fn new(
        inbound: mpsc::UnboundedReceiver<Message>,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            inbound: AsyncMutex::new(inbound),
            outbound,
            read_deadline: Mutex::new(None),
            write_deadline: Mutex::new(None),
            read_limit: AtomicUsize::new(0),
            pong_handler: Mutex::new(None),
            auto_pong: AtomicBool::new(true),
            shutdown: Shutdown::new(),
        }
    }

    /// Enables or disables answering pings. Enabled by default.
    pub fn set_auto_pong(&self, enabled: bool) {
        self.auto_pong.store(enabled, Ordering::Relaxed);
    }

    /// Returns `true` once this end has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    fn send(&self, message: Message) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| Error::ConnectionClosed)
    }

    fn on_pong(&self, payload: &[u8]) -> Result<()> {
        let handler = self.pong_handler.lock().clone();
        match handler {
            Some(handler) => handler(payload),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn close(&self) -> Result<()> {
        if self.shutdown.trigger() {
            // Peer may already be gone.
            let _ = self.outbound.send(Message::close());
        }
        Ok(())
    }

    async fn write_message(&self, kind: MessageKind, payload: Bytes) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(Error::ConnectionClosed);
        }
        let deadline = *self.write_deadline.lock();
        if let Some(deadline) = deadline
            && deadline <= Instant::now()
        {
            return Err(Error::deadline_exceeded("write"));
        }
        trace!(%kind, len = payload.len(), "memory frame sent");
        self.send(Message::new(kind, payload))
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
        let mut inbound = self.inbound.lock().await;

        loop {
            let deadline = *self.read_deadline.lock();

            let frame = tokio::select! {
                () = self.shutdown.wait() => return Err(Error::ConnectionClosed),
                () = expired(deadline) => return Err(Error::deadline_exceeded("read")),
                frame = inbound.recv() => frame,
            };

            let Some(message) = frame else {
                return Err(Error::ConnectionClosed);
            };

            match message.kind {
                MessageKind::Text | MessageKind::Binary => {
                    check_read_limit(message.len(), self.read_limit.load(Ordering::Relaxed))?;
                    return Ok(message);
                }
                MessageKind::Ping => {
                    if self.auto_pong.load(Ordering::Relaxed) {
                        let _ = self.send(Message::pong(message.payload));
                    }
                }
                MessageKind::Pong => self.on_pong(&message.payload)?,
                MessageKind::Close => return Err(Error::ConnectionClosed),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pair_delivers_data_frames() {
        let (a, b) = MemoryConnection::pair();
        a.write_message(MessageKind::Text, Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let message = b.read_message().await.unwrap();
        assert_eq!(message, Message::text("hello"));
    }

    #[tokio::test]
    async fn test_ping_is_answered_while_reading() {
        let (a, b) = MemoryConnection::pair();
        let pongs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pongs);
        a.set_pong_handler(Arc::new(move |_: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        a.write_message(MessageKind::Ping, Bytes::new()).await.unwrap();

        // b answers the ping while waiting for data; a runs the handler likewise.
        let _ = tokio::time::timeout(Duration::from_millis(20), b.read_message()).await;
        let _ = tokio::time::timeout(Duration::from_millis(20), a.read_message()).await;

        assert_eq!(pongs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auto_pong_can_be_disabled() {
        let (a, b) = MemoryConnection::pair();
        b.set_auto_pong(false);
        a.write_message(MessageKind::Ping, Bytes::new()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), b.read_message()).await;
        assert!(result.is_err(), "ping must not surface as data");

        a.set_read_deadline(Instant::now() + Duration::from_millis(20))
            .unwrap();
        let err = a.read_message().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_close_reaches_peer() {
        let (a, b) = MemoryConnection::pair();
        a.close().unwrap();
        assert!(a.is_closed());
        assert!(matches!(b.read_message().await, Err(Error::ConnectionClosed)));
        assert!(matches!(
            a.write_message(MessageKind::Text, Bytes::new()).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let (a, _b) = MemoryConnection::pair();
        let a = Arc::new(a);
        let reader = Arc::clone(&a);
        let pending = tokio::spawn(async move { reader.read_message().await });

        tokio::task::yield_now().await;
        a.close().unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_limit_rejects_large_frames() {
        let (a, b) = MemoryConnection::pair();
        b.set_read_limit(4);
        a.write_message(MessageKind::Binary, Bytes::from_static(b"too long"))
            .await
            .unwrap();

        let err = b.read_message().await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 8, limit: 4 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline_expires() {
        let (a, _b) = MemoryConnection::pair();
        a.set_read_deadline(Instant::now() + Duration::from_secs(3))
            .unwrap();

        let err = a.read_message().await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded { .. }));
    }
}
