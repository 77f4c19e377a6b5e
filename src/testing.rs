//! Test doubles shared by the unit tests.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::{Message, MessageKind};
use crate::session::{Handler, Session};
use crate::transport::{Connection, PongHandler};
use crate::transport::connection::Shutdown;

// ============================================================================
// ScriptedConnection
// ============================================================================

enum Step {
    Read(Message),
    Fail(Error),
}

/// Connection that replays a fixed script of reads and records writes.
///
/// Once the script runs out, reads wait until the connection is closed.
pub(crate) struct ScriptedConnection {
    script: Mutex<VecDeque<Step>>,
    written: Arc<Mutex<Vec<Message>>>,
    closes: Arc<AtomicUsize>,
    remote_addr: Option<SocketAddr>,
    stall_writes: bool,
    write_failure: Mutex<Option<Error>>,
    shutdown: Shutdown,
}

impl ScriptedConnection {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            written: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
            remote_addr: None,
            stall_writes: false,
            write_failure: Mutex::new(None),
            shutdown: Shutdown::new(),
        }
    }

    pub(crate) fn then_read(self, message: Message) -> Self {
        self.script.lock().push_back(Step::Read(message));
        self
    }

    pub(crate) fn then_fail(self, error: Error) -> Self {
        self.script.lock().push_back(Step::Fail(error));
        self
    }

    /// Writes never complete until the connection is closed.
    pub(crate) fn stall_writes(mut self) -> Self {
        self.stall_writes = true;
        self
    }

    /// The next write, data or ping, fails with `error`.
    pub(crate) fn fail_next_write(self, error: Error) -> Self {
        *self.write_failure.lock() = Some(error);
        self
    }

    pub(crate) fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn written(&self) -> Arc<Mutex<Vec<Message>>> {
        Arc::clone(&self.written)
    }

    pub(crate) fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.shutdown.trigger();
        Ok(())
    }

    async fn write_message(&self, kind: MessageKind, payload: Bytes) -> Result<()> {
        if self.stall_writes {
            self.shutdown.wait().await;
        }
        if self.shutdown.is_triggered() {
            return Err(Error::ConnectionClosed);
        }
        if let Some(error) = self.write_failure.lock().take() {
            return Err(error);
        }
        self.written.lock().push(Message::new(kind, payload));
        Ok(())
    }

    fn set_read_limit(&self, _limit: usize) {}

    fn set_read_deadline(&self, _deadline: Instant) -> Result<()> {
        Ok(())
    }

    fn set_write_deadline(&self, _deadline: Instant) -> Result<()> {
        Ok(())
    }

    fn set_pong_handler(&self, _handler: PongHandler) {}

    async fn read_message(&self) -> Result<Message> {
        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Read(message)) => Ok(message),
            Some(Step::Fail(error)) => Err(error),
            None => {
                self.shutdown.wait().await;
                Err(Error::ConnectionClosed)
            }
        }
    }
}

// ============================================================================
// RecordingHandler
// ============================================================================

/// A handler callback as observed by [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Opened,
    Received(Bytes),
    Written(Bytes),
    /// Close cause rendered with `Display`.
    Closed(Option<String>),
}

/// Handler forwarding every callback to a channel.
pub(crate) struct RecordingHandler {
    events: mpsc::UnboundedSender<Event>,
}

impl RecordingHandler {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }
}

impl Handler for RecordingHandler {
    fn did_open_session(&self, _session: &Session) {
        let _ = self.events.send(Event::Opened);
    }

    fn did_closed_session(&self, _session: &Session, cause: Option<&Error>) {
        let _ = self.events.send(Event::Closed(cause.map(ToString::to_string)));
    }

    fn did_written_data(&self, _session: &Session, data: &Bytes) {
        let _ = self.events.send(Event::Written(data.clone()));
    }

    fn did_received_data(&self, _session: &Session, data: &Bytes) {
        let _ = self.events.send(Event::Received(data.clone()));
    }
}
