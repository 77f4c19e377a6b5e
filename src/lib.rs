//! Tether - transport-agnostic session layer.
//!
//! Turns a raw bidirectional message connection into a managed
//! [`Session`] with keep-alive, a bounded outbound queue, a single
//! well-defined close, and a per-session key/value store. A [`Hub`]
//! indexes live sessions by identity and device tag.
//!
//! # Architecture
//!
//! ```text
//!  transport (WebSocket, TCP, memory, ...)
//!        │ Connection
//!        ▼
//!  ┌──────────────────────────────┐        ┌──────────────┐
//!  │ Session                      │ events │   Handler    │
//!  │  read pump  ─► received      │───────►│  (your code) │
//!  │  write pump ◄─ queue ◄─ write│◄───────│              │
//!  │  keep-alive ping / pong      │        └──────┬───────┘
//!  └──────────────────────────────┘               │ add / remove
//!                                                 ▼
//!                                          ┌──────────────┐
//!                                          │     Hub      │
//!                                          └──────────────┘
//! ```
//!
//! Key behaviors:
//!
//! - Pings every nine tenths of the read deadline; a peer that stops
//!   answering is dropped when the deadline passes
//! - [`Session::write_message`] never blocks: a full queue closes the session
//! - Every session reports [`Handler::did_closed_session`] exactly once
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use tether::{Handler, Hub, HubHandler, Result, Server, Session, SessionConfig};
//!
//! struct Broadcast(Arc<Hub>);
//!
//! impl Handler for Broadcast {
//!     fn did_received_data(&self, _session: &Session, data: &Bytes) {
//!         for peer in self.0.get_all() {
//!             let _ = peer.write_message(data.clone());
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Arc::new(Hub::new());
//!     let handler = HubHandler::new(Arc::clone(&hub), Broadcast(Arc::clone(&hub)));
//!     let server = Server::bind("127.0.0.1:8080", SessionConfig::default(), Arc::new(handler)).await?;
//!
//!     println!("Listening on {}", server.ws_url());
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`hub`] | Session registries |
//! | [`identifiers`] | Session instance IDs |
//! | [`protocol`] | Message kinds and frames |
//! | [`session`] | Session engine, builder, configuration, handler |
//! | [`transport`] | Connection capability and adapters |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Session registries.
///
/// [`Hub`] for identifier and tag keys, [`UniqueHub`] for one session per
/// identifier, [`HubHandler`] to keep either in sync automatically.
pub mod hub;

/// Type-safe identifiers.
pub mod identifiers;

/// Message kinds and frames exchanged with a [`Connection`](transport::Connection).
pub mod protocol;

/// Session engine.
///
/// Use [`Session::builder()`] to open a session over any connection.
pub mod session;

/// Transport layer.
///
/// The [`Connection`](transport::Connection) capability and its WebSocket,
/// TCP and in-memory adapters.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Hub types
pub use hub::{Hub, HubHandler, Registry, UniqueHub};

// Identifier types
pub use identifiers::SessionId;

// Protocol types
pub use protocol::{Message, MessageKind};

// Session types
pub use session::{Handler, Session, SessionBuilder, SessionConfig};

// Transport types
pub use transport::{
    Connection, Identity, IdentityResolver, MemoryConnection, PongHandler, Server,
    WebSocketConnection,
};
