//! Handler that keeps a registry in sync with session lifecycle.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Error;
use crate::session::{Handler, Session};

use super::registry::Hub;
use super::unique::UniqueHub;

// ============================================================================
// Registry
// ============================================================================

/// A session directory that [`HubHandler`] can maintain.
pub trait Registry: Send + Sync + 'static {
    /// Records a newly opened session.
    fn register(&self, session: &Session);

    /// Forgets a closed session.
    fn unregister(&self, session: &Session);
}

impl Registry for Hub {
    fn register(&self, session: &Session) {
        self.add(session);
    }

    fn unregister(&self, session: &Session) {
        self.remove(session);
    }
}

impl Registry for UniqueHub {
    fn register(&self, session: &Session) {
        self.add(session);
    }

    fn unregister(&self, session: &Session) {
        self.remove(session);
    }
}

// ============================================================================
// HubHandler
// ============================================================================

/// Wraps a [`Handler`], adding sessions to a registry when they open and
/// removing them when they close.
///
/// The session is registered before the inner `did_open_session` runs and
/// unregistered after the inner `did_closed_session` returns, so the inner
/// handler always sees itself in the registry.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tether::{Hub, HubHandler, Server, SessionConfig};
///
/// let hub = Arc::new(Hub::new());
/// let handler = HubHandler::new(Arc::clone(&hub), MyHandler);
/// let server = Server::bind("127.0.0.1:8080", SessionConfig::default(), Arc::new(handler)).await?;
/// ```
pub struct HubHandler<H, R = Hub> {
    registry: Arc<R>,
    inner: H,
}

impl<H: Handler, R: Registry> HubHandler<H, R> {
    /// Creates a handler maintaining `registry` and forwarding to `inner`.
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<R>, inner: H) -> Self {
        Self { registry, inner }
    }

    /// Returns the registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Returns the wrapped handler.
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: Handler, R: Registry> Handler for HubHandler<H, R> {
    fn did_open_session(&self, session: &Session) {
        self.registry.register(session);
        self.inner.did_open_session(session);
    }

    fn did_closed_session(&self, session: &Session, cause: Option<&Error>) {
        self.inner.did_closed_session(session, cause);
        self.registry.unregister(session);
    }

    fn did_written_data(&self, session: &Session, data: &Bytes) {
        self.inner.did_written_data(session, data);
    }

    fn did_received_data(&self, session: &Session, data: &Bytes) {
        self.inner.did_received_data(session, data);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::Message;
    use crate::testing::{Event, RecordingHandler, ScriptedConnection};

    #[tokio::test]
    async fn test_registers_on_open_and_evicts_on_close() {
        let hub = Arc::new(Hub::new());
        let (recorder, mut events) = RecordingHandler::new();
        let handler = Arc::new(HubHandler::new(Arc::clone(&hub), recorder));

        let session = Session::builder()
            .connection(ScriptedConnection::new())
            .shared_handler(handler)
            .identifier("alice")
            .open()
            .await
            .unwrap();

        assert_eq!(events.recv().await, Some(Event::Opened));
        assert_eq!(hub.get("alice", session.tag()), Some(session.clone()));

        session.close().unwrap();
        assert_eq!(events.recv().await, Some(Event::Closed(None)));
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_inner_handler_sees_itself_registered() {
        struct Probe(Arc<Hub>, tokio::sync::mpsc::UnboundedSender<(bool, bool)>);

        impl Handler for Probe {
            fn did_open_session(&self, session: &Session) {
                let present = self.0.get(session.identifier(), session.tag()).is_some();
                let _ = self.1.send((true, present));
            }

            fn did_closed_session(&self, session: &Session, _cause: Option<&Error>) {
                let present = self.0.get(session.identifier(), session.tag()).is_some();
                let _ = self.1.send((false, present));
            }
        }

        let hub = Arc::new(Hub::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = HubHandler::new(Arc::clone(&hub), Probe(Arc::clone(&hub), tx));

        let connection = ScriptedConnection::new()
            .then_read(Message::text("hi"))
            .then_fail(Error::ConnectionClosed);
        let _session = Session::builder()
            .connection(connection)
            .handler(handler)
            .identifier("bob")
            .open()
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some((true, true)));
        assert_eq!(rx.recv().await, Some((false, true)));
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_unique_hub_registry() {
        let hub = Arc::new(UniqueHub::new());
        let handler = HubHandler::new(Arc::clone(&hub), RecordingHandler::new().0);

        let session = Session::builder()
            .connection(ScriptedConnection::new())
            .handler(handler)
            .identifier("carol")
            .open()
            .await
            .unwrap();
        assert_eq!(hub.get("carol"), Some(session.clone()));

        // Evicting closes the session, whose close callback unregisters again.
        assert!(hub.remove(&session));
        assert!(session.is_closed());
        assert_eq!(hub.count(), 0);
    }
}
