//! Error types for the session layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tether::{Result, Session};
//!
//! fn greet(session: &Session) -> Result<()> {
//!     session.write_message("hello")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::DeadlineExceeded`] |
//! | Session | [`Error::SessionClosed`], [`Error::QueueFull`] |
//! | Protocol | [`Error::Protocol`], [`Error::MessageTooLarge`] |
//! | External | [`Error::Io`], [`Error::WebSocket`], [`Error::Url`] |
//!
//! Connection errors are terminal for a session: the engine never retries
//! them and reports them through
//! [`Handler::did_closed_session`](crate::Handler::did_closed_session).

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::ParseError as UrlError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a session or transport is built from invalid input,
    /// including a session builder without a connection.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport failure.
    ///
    /// Returned when a connection cannot be established or breaks.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed.
    ///
    /// Returned when the peer closed the connection, the stream ended,
    /// or the connection was closed locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A read or write deadline passed before the operation completed.
    #[error("Deadline exceeded during {operation}")]
    DeadlineExceeded {
        /// The operation that missed its deadline (`read` or `write`).
        operation: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Write attempted on a closed session.
    #[error("Session is closed")]
    SessionClosed,

    /// Outbound queue is full.
    ///
    /// The session is closed when this is returned.
    #[error("Send queue full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation.
    ///
    /// Returned for unknown message kinds or payloads a frame kind cannot
    /// carry.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Inbound message exceeded the read limit.
    #[error("Message of {size} bytes exceeds read limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Configured read limit.
        limit: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] UrlError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a deadline exceeded error.
    #[inline]
    pub fn deadline_exceeded(operation: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
        }
    }

    /// Creates a queue full error.
    #[inline]
    pub fn queue_full(capacity: usize) -> Self {
        Self::QueueFull { capacity }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a message too large error.
    #[inline]
    pub fn message_too_large(size: usize, limit: usize) -> Self {
        Self::MessageTooLarge { size, limit }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a deadline error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::DeadlineExceeded { .. }
                | Self::Io(_)
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error means the peer or session is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::SessionClosed
                | Self::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
