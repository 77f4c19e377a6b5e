//! Session registries.
//!
//! # Components
//!
//! | Type | Key | Evicted sessions |
//! |------|-----|------------------|
//! | [`Hub`] | identifier, tag | left open |
//! | [`UniqueHub`] | identifier | closed |
//! | [`HubHandler`] | | keeps either registry in sync with session lifecycle |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether::Hub;
//!
//! let hub = Arc::new(Hub::new());
//! hub.add(&session);
//!
//! for peer in hub.get_group("alice") {
//!     let _ = peer.write_message("hello, every device");
//! }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Lifecycle-driven registration.
pub mod handler;

/// Identifier and tag keyed registry.
pub mod registry;

/// Identifier keyed registry.
pub mod unique;

// ============================================================================
// Re-exports
// ============================================================================

pub use handler::{HubHandler, Registry};
pub use registry::Hub;
pub use unique::UniqueHub;
