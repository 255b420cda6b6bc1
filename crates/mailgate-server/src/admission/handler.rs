//! Acquire/release gate consulted before a session begins.

use std::net::SocketAddr;

use super::{Acquire, AdmissionTable, Rejection, SrcKey};

/// Gate run for every accepted socket before any protocol work.
///
/// A successful [`acquire`](Self::acquire) must be paired with exactly one
/// [`release`](Self::release) when the session ends.
pub trait SessionHandler: Send + Sync {
    /// Admits or refuses a session from `peer`.
    ///
    /// # Errors
    ///
    /// Returns the reply to send before dropping the connection.
    fn acquire(&self, peer: &SocketAddr) -> Result<(), Rejection>;

    /// Records the end of a session admitted by [`acquire`](Self::acquire).
    fn release(&self, peer: &SocketAddr);
}

/// Handler that admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSessionHandler;

impl SessionHandler for NoopSessionHandler {
    fn acquire(&self, _peer: &SocketAddr) -> Result<(), Rejection> {
        Ok(())
    }

    fn release(&self, _peer: &SocketAddr) {}
}

/// Limits concurrent sessions per source IP address.
///
/// Over-limit sessions get `421 Too many connections, try again later`.
#[derive(Debug)]
pub struct SourceTrackingSessionHandler {
    table: AdmissionTable,
    rejection: Rejection,
}

impl SourceTrackingSessionHandler {
    /// Creates a handler admitting at most `max_per_source` sessions per
    /// source address.
    #[must_use]
    pub fn new(max_per_source: u32) -> Self {
        Self {
            table: AdmissionTable::new(max_per_source),
            rejection: Rejection::too_many_connections(),
        }
    }

    /// Live session counts.
    #[must_use]
    pub const fn table(&self) -> &AdmissionTable {
        &self.table
    }
}

impl SessionHandler for SourceTrackingSessionHandler {
    fn acquire(&self, peer: &SocketAddr) -> Result<(), Rejection> {
        match self.table.try_acquire(SrcKey::from(peer.ip())) {
            Acquire::Incremented => Ok(()),
            Acquire::LimitReached => Err(self.rejection.clone()),
        }
    }

    fn release(&self, peer: &SocketAddr) {
        self.table.release(SrcKey::from(peer.ip()));
    }
}
