//! Session start/end listener with an accept/reject verdict.

use std::net::SocketAddr;
use std::sync::Arc;

use super::{Acquire, AdmissionTable, Rejection, SrcKey};
use crate::error::Result;

/// Verdict returned by [`SessionLifecycleListener::on_session_start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStartResult {
    /// Proceed with the greeting.
    Accepted,
    /// Send the rejection and close without further negotiation.
    Rejected(Rejection),
}

impl SessionStartResult {
    /// Returns true for [`Accepted`](Self::Accepted).
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Observer of session lifecycle events.
pub trait SessionLifecycleListener: Send + Sync {
    /// Called when a session is created, before the greeting.
    ///
    /// A rejected session is closed and never reaches
    /// [`on_session_end`](Self::on_session_end).
    fn on_session_start(&self, peer: &SocketAddr) -> SessionStartResult;

    /// Called when an accepted session closes.
    fn on_session_end(&self, peer: &SocketAddr);
}

/// Listener that accepts everything and ignores session ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycleListener;

impl SessionLifecycleListener for NoopLifecycleListener {
    fn on_session_start(&self, _peer: &SocketAddr) -> SessionStartResult {
        SessionStartResult::Accepted
    }

    fn on_session_end(&self, _peer: &SocketAddr) {}
}

/// Limits concurrent sessions per source IP address, answering with a
/// configurable rejection.
#[derive(Debug)]
pub struct SourceTrackingListener {
    table: AdmissionTable,
    rejection: Rejection,
}

impl SourceTrackingListener {
    /// Creates a listener that rejects with
    /// `421 Too many connections, try again later`.
    #[must_use]
    pub fn new(max_per_source: u32) -> Self {
        Self {
            table: AdmissionTable::new(max_per_source),
            rejection: Rejection::too_many_connections(),
        }
    }

    /// Creates a listener with a custom rejection reply.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidReplyCode`] unless `code` is in
    /// 200..=599.
    pub fn with_rejection(
        max_per_source: u32,
        code: u16,
        message: impl Into<Arc<str>>,
    ) -> Result<Self> {
        Ok(Self {
            table: AdmissionTable::new(max_per_source),
            rejection: Rejection::new(code, message)?,
        })
    }

    /// Live session counts.
    #[must_use]
    pub const fn table(&self) -> &AdmissionTable {
        &self.table
    }
}

impl SessionLifecycleListener for SourceTrackingListener {
    fn on_session_start(&self, peer: &SocketAddr) -> SessionStartResult {
        match self.table.try_acquire(SrcKey::from(peer.ip())) {
            Acquire::Incremented => SessionStartResult::Accepted,
            Acquire::LimitReached => SessionStartResult::Rejected(self.rejection.clone()),
        }
    }

    fn on_session_end(&self, peer: &SocketAddr) {
        self.table.release(SrcKey::from(peer.ip()));
    }
}
