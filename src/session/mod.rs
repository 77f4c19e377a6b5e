//! Session engine.
//!
//! A session turns one [`Connection`](crate::transport::Connection) into a
//! managed channel with keep-alive, a bounded outbound queue and a single,
//! well-defined close.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Handle to a running session |
//! | [`SessionBuilder`] | Named options for opening a session |
//! | [`SessionConfig`] | Size, queue and deadline settings |
//! | [`Handler`] | Application callbacks |
//!
//! # Example
//!
//! ```ignore
//! use tether::{Handler, Session};
//! use tether::transport::websocket;
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn did_received_data(&self, session: &Session, data: &bytes::Bytes) {
//!         let _ = session.write_message(data.clone());
//!     }
//! }
//!
//! let connection = websocket::connect("ws://127.0.0.1:8080/ws").await?;
//! let session = Session::builder()
//!     .connection(connection)
//!     .handler(Echo)
//!     .open()
//!     .await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for opening sessions.
pub mod builder;

/// Session engine and pumps.
pub mod core;

/// Handler capability.
pub mod handler;

/// Per-session configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::{Session, Value};
pub use handler::Handler;
pub use options::{
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_DEADLINE,
    DEFAULT_TAG, DEFAULT_WRITE_DEADLINE, SessionConfig,
};
