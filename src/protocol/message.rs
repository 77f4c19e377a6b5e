//! Message kinds and messages.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// MessageKind
// ============================================================================

/// Kind of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MessageKind {
    /// UTF-8 text data.
    #[default]
    Text = 1,
    /// Binary data.
    Binary = 2,
    /// Close handshake.
    Close = 8,
    /// Liveness probe.
    Ping = 9,
    /// Liveness probe answer.
    Pong = 10,
}

impl MessageKind {
    /// Returns the numeric code of this kind.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for `Text` and `Binary`.
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Text | Self::Binary)
    }

    /// Returns `true` for `Close`, `Ping` and `Pong`.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        !self.is_data()
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Text),
            2 => Ok(Self::Binary),
            8 => Ok(Self::Close),
            9 => Ok(Self::Ping),
            10 => Ok(Self::Pong),
            other => Err(Error::protocol(format!("unknown message kind {other}"))),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::Pong => "pong",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A discrete message read from or written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Kind of the message.
    pub kind: MessageKind,
    /// Message payload.
    pub payload: Bytes,
}

impl Message {
    /// Creates a message of the given kind.
    #[inline]
    #[must_use]
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Creates a text message.
    #[inline]
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, Bytes::from(payload.into()))
    }

    /// Creates a binary message.
    #[inline]
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Binary, payload)
    }

    /// Creates a ping message.
    #[inline]
    #[must_use]
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Ping, payload)
    }

    /// Creates a pong message.
    #[inline]
    #[must_use]
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Pong, payload)
    }

    /// Creates an empty close message.
    #[inline]
    #[must_use]
    pub fn close() -> Self {
        Self::new(MessageKind::Close, Bytes::new())
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
