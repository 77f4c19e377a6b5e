//! Session engine.
//!
//! A [`Session`] owns one [`Connection`] and drives it with two tasks:
//!
//! - **Read pump**: reads data messages and hands them to
//!   [`Handler::did_received_data`]. Pongs push the read deadline forward;
//!   a missed deadline is how a silently dead peer is detected.
//! - **Write pump**: drains the bounded outbound queue and sends a ping
//!   every [`SessionConfig::ping_period`].
//!
//! # Lifecycle
//!
//! ```text
//!  open() ──► pumps set up ──► did_open_session ──► pumps run
//!                                                      │
//!   read error │ write error │ queue overflow │ close()
//!                                                      ▼
//!             closed (once) ──► connection closed ──► did_closed_session
//! ```
//!
//! Whichever trigger comes first runs the close sequence; the others are
//! no-ops.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::MessageKind;
use crate::transport::Connection;

use super::builder::SessionBuilder;
use super::handler::Handler;
use super::options::{DEFAULT_TAG, SessionConfig};

// ============================================================================
// Types
// ============================================================================

/// Value stored in a session's key/value store.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Key/value store attached to a session.
type ValueMap = FxHashMap<String, Value>;

/// Lower bound for the keep-alive interval.
const MIN_PING_PERIOD: Duration = Duration::from_millis(1);

// ============================================================================
// State
// ============================================================================

/// Mutable session state, guarded by the session lock.
struct State {
    closed: bool,
    connection: Option<Arc<dyn Connection>>,
    handler: Option<Arc<dyn Handler>>,
    /// Producer side of the outbound queue; dropping it ends the write pump.
    outbound: Option<mpsc::Sender<Bytes>>,
    values: Option<ValueMap>,
}

struct Inner {
    id: SessionId,
    identifier: String,
    tag: String,
    config: SessionConfig,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    state: Mutex<State>,
    /// Serializes writes from the write pump and [`Session::write`].
    write_lock: AsyncMutex<()>,
}

// ============================================================================
// Session
// ============================================================================

/// Managed, keep-alive message channel over one connection.
///
/// `Session` is a cheap handle; clones refer to the same session.
///
/// # Thread Safety
///
/// `Session` is `Send + Sync`. All methods may be called from any task,
/// including from inside [`Handler`] callbacks.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Returns a builder for a new session.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Opens a session with the given connection, handler and configuration.
    ///
    /// Shorthand for the builder with default identifier and tag.
    pub async fn open(
        connection: impl Connection,
        handler: Option<Arc<dyn Handler>>,
        config: SessionConfig,
    ) -> Self {
        Self::start(Arc::new(connection), handler, None, None, config.normalized()).await
    }

    /// Spawns both pumps, waits for their setup, then fires the open callback.
    pub(crate) async fn start(
        connection: Arc<dyn Connection>,
        handler: Option<Arc<dyn Handler>>,
        identifier: Option<String>,
        tag: Option<String>,
        config: SessionConfig,
    ) -> Self {
        let id = SessionId::generate();
        let local_addr = connection.local_addr();
        let remote_addr = connection.remote_addr();

        let identifier = identifier
            .filter(|identifier| !identifier.is_empty())
            .or_else(|| remote_addr.map(|addr| addr.to_string()))
            .unwrap_or_else(|| id.to_string());
        let tag = tag
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| DEFAULT_TAG.to_string());

        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);

        let session = Self {
            inner: Arc::new(Inner {
                id,
                identifier,
                tag,
                config,
                local_addr,
                remote_addr,
                state: Mutex::new(State {
                    closed: false,
                    connection: Some(Arc::clone(&connection)),
                    handler,
                    outbound: Some(outbound_tx),
                    values: Some(ValueMap::default()),
                }),
                write_lock: AsyncMutex::new(()),
            }),
        };

        let (read_ready_tx, read_ready_rx) = oneshot::channel();
        let (write_ready_tx, write_ready_rx) = oneshot::channel();
        let (start_tx, start_rx) = watch::channel(false);

        tokio::spawn(session.clone().read_pump(
            Arc::clone(&connection),
            read_ready_tx,
            start_rx.clone(),
        ));
        tokio::spawn(session.clone().write_pump(
            connection,
            outbound_rx,
            write_ready_tx,
            start_rx,
        ));

        // A pump that dies before reporting drops its sender; either way it is past setup.
        let _ = read_ready_rx.await;
        let _ = write_ready_rx.await;

        debug!(
            session_id = %session.id(),
            identifier = %session.identifier(),
            tag = %session.tag(),
            "Session opened"
        );

        if let Some(handler) = session.handler() {
            handler.did_open_session(&session);
        }

        let _ = start_tx.send(true);
        session
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the unique ID of this session instance.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Returns the logical peer identity.
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// Returns the tag distinguishing connections of one identifier.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// Returns the effective configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Returns the connection's local address, captured at open.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    /// Returns the connection's remote address, captured at open.
    #[inline]
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Returns the connection, or `None` once closed.
    #[must_use]
    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.inner.state.lock().connection.clone()
    }

    /// Returns `true` once the session has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns `true` if both handles refer to the same session.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn handler(&self) -> Option<Arc<dyn Handler>> {
        self.inner.state.lock().handler.clone()
    }
}

// ============================================================================
// Session - Key/Value Store
// ============================================================================

impl Session {
    /// Stores a value under `key`, replacing any previous value.
    ///
    /// Ignored once the session's store has been released.
    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        if let Some(values) = self.inner.state.lock().values.as_mut() {
            values.insert(key.into(), Arc::new(value));
        }
    }

    /// Returns the value under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get_any(key)?.downcast::<T>().ok()
    }

    /// Returns the value under `key` without a type check.
    #[must_use]
    pub fn get_any(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().values.as_ref()?.get(key).cloned()
    }

    /// Removes and returns the value under `key`.
    pub fn del(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().values.as_mut()?.remove(key)
    }
}

// ============================================================================
// Session - Writing
// ============================================================================

impl Session {
    /// Queues a data message for the write pump.
    ///
    /// Never blocks. A full queue means the peer cannot keep up: the
    /// session is closed and [`Error::QueueFull`] returned.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session is closed
    /// - [`Error::QueueFull`] if the outbound queue is full
    pub fn write_message(&self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();

        let sent = {
            let state = self.inner.state.lock();
            match state.outbound.as_ref() {
                Some(outbound) => outbound.try_send(data),
                None => return Err(Error::SessionClosed),
            }
        };

        match sent {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let capacity = self.inner.config.queue_capacity;
                warn!(
                    session_id = %self.id(),
                    identifier = %self.identifier(),
                    capacity,
                    "Send queue full, closing session"
                );
                let _ = self.close_with(Some(Error::queue_full(capacity)));
                Err(Error::queue_full(capacity))
            }
            Err(TrySendError::Closed(_)) => Err(Error::SessionClosed),
        }
    }

    /// Writes a data message directly to the connection, bypassing the queue.
    ///
    /// Waits for any in-flight pump write. The error is returned to the
    /// caller only; the session stays open.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session is closed
    /// - Any transport error from the write
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<usize> {
        let data = data.into();

        {
            let _guard = self.inner.write_lock.lock().await;
            let connection = self.connection().ok_or(Error::SessionClosed)?;
            self.send(&connection, self.inner.config.data_kind, data.clone())
                .await?;
        }

        if let Some(handler) = self.handler() {
            handler.did_written_data(self, &data);
        }
        Ok(data.len())
    }

    /// Arms the write deadline and writes one frame. Caller holds the write lock.
    async fn send(
        &self,
        connection: &Arc<dyn Connection>,
        kind: MessageKind,
        payload: Bytes,
    ) -> Result<()> {
        connection.set_write_deadline(Instant::now() + self.inner.config.write_deadline)?;
        connection.write_message(kind, payload).await
    }
}

// ============================================================================
// Session - Closing
// ============================================================================

impl Session {
    /// Closes the session.
    ///
    /// Idempotent. The first call closes the connection, fires
    /// [`Handler::did_closed_session`] with no cause, and returns the
    /// connection's close result; later calls return `Ok(())`.
    pub fn close(&self) -> Result<()> {
        self.close_with(None)
    }

    fn close_with(&self, cause: Option<Error>) -> Result<()> {
        let (connection, handler) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.outbound = None;
            (state.connection.take(), state.handler.take())
        };

        match &cause {
            Some(e) => debug!(session_id = %self.id(), error = %e, "Session closed"),
            None => debug!(session_id = %self.id(), "Session closed"),
        }

        let result = connection.map_or(Ok(()), |connection| connection.close());

        if let Some(handler) = handler {
            handler.did_closed_session(self, cause.as_ref());
        }

        self.inner.state.lock().values = None;
        result
    }
}

// ============================================================================
// Session - Pumps
// ============================================================================

impl Session {
    /// Installs the read limit, the first read deadline and the pong handler.
    fn prepare_read(&self, connection: &Arc<dyn Connection>) -> Result<()> {
        let read_deadline = self.inner.config.read_deadline;

        connection.set_read_limit(self.inner.config.max_message_size);
        connection.set_read_deadline(Instant::now() + read_deadline)?;

        let weak = Arc::downgrade(connection);
        connection.set_pong_handler(Arc::new(move |_: &[u8]| match weak.upgrade() {
            Some(connection) => connection.set_read_deadline(Instant::now() + read_deadline),
            None => Ok(()),
        }));

        Ok(())
    }

    async fn read_pump(
        self,
        connection: Arc<dyn Connection>,
        ready: oneshot::Sender<()>,
        mut start: watch::Receiver<bool>,
    ) {
        let setup = self.prepare_read(&connection);
        let _ = ready.send(());

        let started = start.wait_for(|started| *started).await.is_ok();
        if !started {
            let _ = self.close_with(Some(Error::connection("session opening was abandoned")));
            return;
        }

        let cause = match setup {
            Err(e) => e,
            Ok(()) => loop {
                match connection.read_message().await {
                    Ok(message) => {
                        trace!(session_id = %self.id(), kind = %message.kind, len = message.len(), "Message received");
                        if let Some(handler) = self.handler() {
                            handler.did_received_data(&self, &message.payload);
                        }
                    }
                    Err(e) => break e,
                }
            },
        };

        debug!(session_id = %self.id(), error = %cause, "Read pump stopped");
        let _ = self.close_with(Some(cause));
    }

    async fn write_pump(
        self,
        connection: Arc<dyn Connection>,
        mut outbound: mpsc::Receiver<Bytes>,
        ready: oneshot::Sender<()>,
        mut start: watch::Receiver<bool>,
    ) {
        let period = self.inner.config.ping_period().max(MIN_PING_PERIOD);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let _ = ready.send(());

        let started = start.wait_for(|started| *started).await.is_ok();
        if !started {
            let _ = self.close_with(Some(Error::connection("session opening was abandoned")));
            return;
        }

        let cause = loop {
            tokio::select! {
                data = outbound.recv() => {
                    let Some(data) = data else {
                        // Queue closed by close(): say goodbye, best effort.
                        let _guard = self.inner.write_lock.lock().await;
                        let _ = self.send(&connection, MessageKind::Close, Bytes::new()).await;
                        break None;
                    };

                    let written = {
                        let _guard = self.inner.write_lock.lock().await;
                        self.send(&connection, self.inner.config.data_kind, data.clone()).await
                    };
                    if let Err(e) = written {
                        break Some(e);
                    }

                    trace!(session_id = %self.id(), len = data.len(), "Message written");
                    if let Some(handler) = self.handler() {
                        handler.did_written_data(&self, &data);
                    }
                }

                _ = ticker.tick() => {
                    let pinged = {
                        let _guard = self.inner.write_lock.lock().await;
                        self.send(&connection, MessageKind::Ping, Bytes::new()).await
                    };
                    if let Err(e) = pinged {
                        break Some(e);
                    }
                    trace!(session_id = %self.id(), "Ping sent");
                }
            }
        };

        debug!(session_id = %self.id(), "Write pump stopped");
        let _ = self.close_with(cause);
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("identifier", &self.inner.identifier)
            .field("tag", &self.inner.tag)
            .field("remote_addr", &self.inner.remote_addr)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
