//! Per-session configuration.
//!
//! Every session carries its own [`SessionConfig`], so sessions on the same
//! server can run independent keep-alive policies.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether::SessionConfig;
//!
//! let config = SessionConfig::new()
//!     .with_read_deadline(Duration::from_secs(30))
//!     .with_queue_capacity(64);
//!
//! assert_eq!(config.ping_period(), Duration::from_secs(27));
//! ```
//!
//! The struct deserializes with every field optional, durations given in
//! milliseconds:
//!
//! ```json
//! { "max_message_size": 4096, "read_deadline": 30000, "data_kind": "binary" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::MessageKind;

// ============================================================================
// Constants
// ============================================================================

/// Tag used when none is supplied.
pub const DEFAULT_TAG: &str = "tag";

/// Default maximum inbound message size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Default time allowed to write a message to the peer.
pub const DEFAULT_WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Default time allowed between pongs from the peer.
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(60);

// ============================================================================
// SessionConfig
// ============================================================================

/// Session tuning knobs.
///
/// Zero values mean "use the default"; see [`SessionConfig::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum inbound data message size in bytes.
    pub max_message_size: usize,

    /// Capacity of the outbound message queue.
    pub queue_capacity: usize,

    /// Time allowed between pongs before the peer is considered dead.
    #[serde(with = "duration_ms")]
    pub read_deadline: Duration,

    /// Time allowed for a single write.
    #[serde(with = "duration_ms")]
    pub write_deadline: Duration,

    /// Frame kind used for outbound data (`text` or `binary`).
    pub data_kind: MessageKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionConfig {
    /// Creates a configuration with all defaults.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_deadline: DEFAULT_READ_DEADLINE,
            write_deadline: DEFAULT_WRITE_DEADLINE,
            data_kind: MessageKind::Text,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionConfig {
    /// Sets the maximum inbound message size.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the read deadline interval.
    #[inline]
    #[must_use]
    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    /// Sets the write deadline interval.
    #[inline]
    #[must_use]
    pub fn with_write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = deadline;
        self
    }

    /// Sets the frame kind used for outbound data.
    #[inline]
    #[must_use]
    pub fn with_data_kind(mut self, kind: MessageKind) -> Self {
        self.data_kind = kind;
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl SessionConfig {
    /// Replaces zero values and control frame kinds with the defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.max_message_size == 0 {
            self.max_message_size = DEFAULT_MAX_MESSAGE_SIZE;
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.read_deadline.is_zero() {
            self.read_deadline = DEFAULT_READ_DEADLINE;
        }
        if self.write_deadline.is_zero() {
            self.write_deadline = DEFAULT_WRITE_DEADLINE;
        }
        if self.data_kind.is_control() {
            self.data_kind = MessageKind::Text;
        }
        self
    }

    /// Interval between keep-alive pings: nine tenths of the read deadline.
    ///
    /// Always shorter than the peer's read deadline, so a probe arrives
    /// before the peer gives up on this side.
    #[inline]
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.read_deadline * 9 / 10
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// Serializes a [`Duration`] as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.read_deadline, Duration::from_secs(60));
        assert_eq!(config.write_deadline, Duration::from_secs(10));
        assert_eq!(config.data_kind, MessageKind::Text);
    }

    #[test]
    fn test_ping_period_is_nine_tenths() {
        let config = SessionConfig::new();
        assert_eq!(config.ping_period(), Duration::from_secs(54));

        let config = config.with_read_deadline(Duration::from_millis(1000));
        assert_eq!(config.ping_period(), Duration::from_millis(900));
    }

    #[test]
    fn test_normalized_restores_defaults() {
        let config = SessionConfig::new()
            .with_max_message_size(0)
            .with_queue_capacity(0)
            .with_read_deadline(Duration::ZERO)
            .with_write_deadline(Duration::ZERO)
            .with_data_kind(MessageKind::Ping)
            .normalized();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_normalized_keeps_explicit_values() {
        let config = SessionConfig::new()
            .with_queue_capacity(1)
            .with_data_kind(MessageKind::Binary)
            .normalized();
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.data_kind, MessageKind::Binary);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"read_deadline": 30000, "data_kind": "binary"}"#).unwrap();
        assert_eq!(config.read_deadline, Duration::from_secs(30));
        assert_eq!(config.data_kind, MessageKind::Binary);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_serialize_durations_as_millis() {
        let json = serde_json::to_value(SessionConfig::new()).unwrap();
        assert_eq!(json["write_deadline"], 10_000);
        assert_eq!(json["data_kind"], "text");
    }
}
