//! Message framing types.
//!
//! Every transport speaks the same five message kinds, numbered after the
//! WebSocket opcode taxonomy so framed and unframed transports agree:
//!
//! | Kind | Code | Carried by |
//! |------|------|------------|
//! | `Text` | 1 | data frames (UTF-8) |
//! | `Binary` | 2 | data frames |
//! | `Close` | 8 | close handshake |
//! | `Ping` | 9 | keep-alive probe |
//! | `Pong` | 10 | keep-alive answer |
//!
//! Only data frames ever reach a [`Handler`](crate::Handler); control
//! frames are consumed by the transport and the session engine.

// ============================================================================
// Submodules
// ============================================================================

/// Message kinds and messages.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{Message, MessageKind};
