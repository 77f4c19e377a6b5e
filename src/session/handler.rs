//! Handler capability.
//!
//! The four lifecycle callbacks a [`Session`] reports through. Callbacks
//! run synchronously on the session's pump tasks (or on the task that
//! opened or closed the session), so they should return quickly and must
//! not assume a particular thread.
//!
//! Callbacks for one session are ordered: `did_open_session` first,
//! `did_received_data` in arrival order, `did_written_data` in enqueue
//! order, `did_closed_session` exactly once. Callbacks are invoked without
//! any session lock held, so a handler may call back into the session.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Error;

use super::core::Session;

// ============================================================================
// Handler
// ============================================================================

/// Application callbacks for session lifecycle and data events.
///
/// Every method has an empty default body.
pub trait Handler: Send + Sync + 'static {
    /// The session is ready to send and receive.
    fn did_open_session(&self, session: &Session) {
        let _ = session;
    }

    /// The session closed.
    ///
    /// `cause` is `None` for an explicit [`Session::close`], otherwise the
    /// error that ended the session.
    fn did_closed_session(&self, session: &Session, cause: Option<&Error>) {
        let _ = (session, cause);
    }

    /// A data message was written to the peer.
    fn did_written_data(&self, session: &Session, data: &Bytes) {
        let _ = (session, data);
    }

    /// A data message arrived from the peer.
    fn did_received_data(&self, session: &Session, data: &Bytes) {
        let _ = (session, data);
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn did_open_session(&self, session: &Session) {
        (**self).did_open_session(session);
    }

    fn did_closed_session(&self, session: &Session, cause: Option<&Error>) {
        (**self).did_closed_session(session, cause);
    }

    fn did_written_data(&self, session: &Session, data: &Bytes) {
        (**self).did_written_data(session, data);
    }

    fn did_received_data(&self, session: &Session, data: &Bytes) {
        (**self).did_received_data(session, data);
    }
}
