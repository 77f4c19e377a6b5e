//! Transport layer.
//!
//! Every transport implements [`Connection`]; the session engine never
//! sees anything else.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   read_message / write_message   ┌──────────────────┐
//! │   Session    │◄────────────────────────────────►│  Arc<dyn         │
//! │  read pump   │   deadlines, pong handler, close │   Connection>    │
//! │  write pump  │                                  │                  │
//! └──────────────┘                                  └────────┬─────────┘
//!                                                            │
//!                        ┌───────────────┬───────────────────┼──────────────┐
//!                        ▼               ▼                   ▼              ▼
//!                   WebSocket        raw TCP              memory         custom
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection capability trait |
//! | `websocket` | WebSocket adapter (accept and dial) |
//! | `tcp` | WebSocket framing over raw TCP |
//! | `memory` | In-process connection pair |
//! | `server` | Accept loop opening a session per connection |

// ============================================================================
// Submodules
// ============================================================================

/// Connection capability trait.
pub mod connection;

/// In-process connection pair.
pub mod memory;

/// WebSocket server opening a session per connection.
pub mod server;

/// WebSocket framing over raw TCP.
pub mod tcp;

/// WebSocket adapter.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, PongHandler};
pub use memory::MemoryConnection;
pub use server::{Identity, IdentityResolver, Server};
pub use websocket::WebSocketConnection;
