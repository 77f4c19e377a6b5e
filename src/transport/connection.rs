//! Connection capability.
//!
//! A [`Connection`] is the narrow surface a transport exposes to the
//! session engine: read one message, write one message, arm deadlines,
//! limit inbound size, react to pongs, and close. The engine only ever
//! talks to `Arc<dyn Connection>`, never to a concrete transport.
//!
//! # Contract
//!
//! - `read_message` returns data frames only. Pings are answered by the
//!   transport, pongs run the installed [`PongHandler`] (its error becomes
//!   the read error), and a close frame or end of stream yields
//!   [`Error::ConnectionClosed`].
//! - Deadlines are absolute. A deadline is sampled when an operation
//!   starts waiting; an expired one yields [`Error::DeadlineExceeded`].
//! - `close` is idempotent and never blocks. Pending and later reads and
//!   writes fail with [`Error::ConnectionClosed`].
//! - One task reads at a time and one task writes at a time; reads and
//!   writes may run concurrently.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

use crate::error::{Error, Result};
use crate::protocol::{Message, MessageKind};

// ============================================================================
// Types
// ============================================================================

/// Callback run for every pong received from the peer.
///
/// Receives the pong payload. Returning an error fails the pending read.
pub type PongHandler = Arc<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

// ============================================================================
// Connection
// ============================================================================

/// Duplex message channel implemented once per transport.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Returns the local socket address, if the transport has one.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Returns the remote socket address, if the transport has one.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Closes the connection.
    fn close(&self) -> Result<()>;

    /// Writes one message before the current write deadline.
    async fn write_message(&self, kind: MessageKind, payload: Bytes) -> Result<()>;

    /// Sets the maximum inbound data payload size. `0` disables the limit.
    fn set_read_limit(&self, limit: usize);

    /// Sets the read deadline.
    fn set_read_deadline(&self, deadline: Instant) -> Result<()>;

    /// Sets the write deadline.
    fn set_write_deadline(&self, deadline: Instant) -> Result<()>;

    /// Installs the pong handler, replacing any previous one.
    fn set_pong_handler(&self, handler: PongHandler);

    /// Reads the next data message.
    async fn read_message(&self) -> Result<Message>;
}

// ============================================================================
// Shutdown
// ============================================================================

/// One-shot close signal shared by the transport adapters.
pub(crate) struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fires the signal. Returns `true` only for the first call.
    pub(crate) fn trigger(&self) -> bool {
        self.tx.send_if_modified(|closed| !std::mem::replace(closed, true))
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired.
    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once triggered.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Deadline Helpers
// ============================================================================

/// Resolves when `deadline` passes; never resolves for `None`.
pub(crate) async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

/// Rejects data payloads above `limit` (`0` = unlimited).
pub(crate) fn check_read_limit(size: usize, limit: usize) -> Result<()> {
    if limit > 0 && size > limit {
        return Err(Error::message_too_large(size, limit));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_shutdown_triggers_once() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_shutdown_wait_after_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait should resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_waits_for_deadline() {
        let start = Instant::now();
        expired(Some(start + Duration::from_secs(5))).await;
        assert!(Instant::now() >= start + Duration::from_secs(5));
    }

    #[test]
    fn test_check_read_limit() {
        assert!(check_read_limit(10, 0).is_ok());
        assert!(check_read_limit(10, 10).is_ok());
        assert!(matches!(
            check_read_limit(11, 10),
            Err(Error::MessageTooLarge { size: 11, limit: 10 })
        ));
    }
}
