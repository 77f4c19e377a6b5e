//! Builder for opening sessions.
//!
//! Options are applied in call order; a later call overrides an earlier
//! one for the same field, including fields set through
//! [`SessionBuilder::config`].
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether::Session;
//!
//! let session = Session::builder()
//!     .connection(connection)
//!     .handler(MyHandler)
//!     .identifier("user-42")
//!     .tag("phone")
//!     .read_deadline(Duration::from_secs(30))
//!     .open()
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::MessageKind;
use crate::transport::Connection;

use super::core::Session;
use super::handler::Handler;
use super::options::SessionConfig;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    connection: Option<Arc<dyn Connection>>,
    handler: Option<Arc<dyn Handler>>,
    identifier: Option<String>,
    tag: Option<String>,
    config: SessionConfig,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default configuration and no connection.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection the session will own.
    #[inline]
    #[must_use]
    pub fn connection(mut self, connection: impl Connection) -> Self {
        self.connection = Some(Arc::new(connection));
        self
    }

    /// Sets an already shared connection.
    #[inline]
    #[must_use]
    pub fn shared_connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Sets the handler. Without one, lifecycle events are dropped.
    #[inline]
    #[must_use]
    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets a handler shared with other sessions.
    #[inline]
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the identifier. Empty means "derive from the connection".
    #[inline]
    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Sets the tag. Empty means [`DEFAULT_TAG`](super::options::DEFAULT_TAG).
    #[inline]
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the maximum inbound message size.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the read deadline interval.
    #[inline]
    #[must_use]
    pub fn read_deadline(mut self, deadline: Duration) -> Self {
        self.config.read_deadline = deadline;
        self
    }

    /// Sets the write deadline interval.
    #[inline]
    #[must_use]
    pub fn write_deadline(mut self, deadline: Duration) -> Self {
        self.config.write_deadline = deadline;
        self
    }

    /// Sets the frame kind used for outbound data.
    #[inline]
    #[must_use]
    pub fn data_kind(mut self, kind: MessageKind) -> Self {
        self.config.data_kind = kind;
        self
    }

    /// Opens the session.
    ///
    /// Returns once both pumps are running and
    /// [`Handler::did_open_session`] has returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no connection was set.
    pub async fn open(self) -> Result<Session> {
        let connection = self.connection.ok_or_else(|| {
            Error::config(
                "Connection is required. Use .connection() to set it.\n\
                 Example: Session::builder().connection(conn).open().await",
            )
        })?;

        Ok(Session::start(
            connection,
            self.handler,
            self.identifier,
            self.tag,
            self.config.normalized(),
        )
        .await)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = SessionBuilder::new();
        assert!(builder.connection.is_none());
        assert!(builder.handler.is_none());
        assert!(builder.identifier.is_none());
        assert_eq!(builder.config, SessionConfig::default());
    }

    #[test]
    fn test_later_options_override_earlier() {
        let builder = SessionBuilder::new()
            .queue_capacity(4)
            .config(SessionConfig::new().with_queue_capacity(16))
            .read_deadline(Duration::from_secs(5))
            .identifier("first")
            .identifier("second");

        assert_eq!(builder.config.queue_capacity, 16);
        assert_eq!(builder.config.read_deadline, Duration::from_secs(5));
        assert_eq!(builder.identifier.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_open_without_connection_fails() {
        let result = SessionBuilder::new().identifier("x").open().await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
