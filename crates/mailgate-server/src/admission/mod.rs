//! Per-source connection admission.
//!
//! Every connecting peer is counted against its raw IP address bytes. Once a
//! source holds the configured number of live sessions, further sessions from
//! it are refused until one ends. Two call-site shapes share one table:
//! [`SourceTrackingSessionHandler`] (acquire/release gate) and
//! [`SourceTrackingListener`] (session start/end listener).

mod handler;
mod listener;

pub use handler::{NoopSessionHandler, SessionHandler, SourceTrackingSessionHandler};
pub use listener::{
    NoopLifecycleListener, SessionLifecycleListener, SessionStartResult, SourceTrackingListener,
};

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mailgate_smtp::ReplyCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::{Error, Result};

/// Default reply code sent to a source over its limit.
pub const DEFAULT_REJECT_CODE: u16 = 421;

/// Default reply text sent to a source over its limit.
pub const DEFAULT_REJECT_MESSAGE: &str = "Too many connections, try again later";

/// Raw address bytes of a connecting peer.
///
/// Equality and hashing are over the bytes, so IPv4 and IPv6 addresses never
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SrcKey(Box<[u8]>);

impl SrcKey {
    /// Wraps raw address bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// The raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<IpAddr> for SrcKey {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self::new(v4.octets()),
            IpAddr::V6(v6) => Self::new(v6.octets()),
        }
    }
}

/// Reply sent to a client that is turned away.
///
/// Cheap to clone: the text is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    code: ReplyCode,
    message: Arc<str>,
}

impl Rejection {
    /// Creates a rejection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReplyCode`] unless `code` is in 200..=599.
    pub fn new(code: u16, message: impl Into<Arc<str>>) -> Result<Self> {
        if !(200..=599).contains(&code) {
            return Err(Error::InvalidReplyCode(code));
        }
        Ok(Self {
            code: ReplyCode::new(code),
            message: message.into(),
        })
    }

    /// The over-capacity default, `421 Too many connections, try again later`.
    #[must_use]
    pub fn too_many_connections() -> Self {
        Self {
            code: ReplyCode::new(DEFAULT_REJECT_CODE),
            message: Arc::from(DEFAULT_REJECT_MESSAGE),
        }
    }

    /// Reply code.
    #[must_use]
    pub const fn code(&self) -> ReplyCode {
        self.code
    }

    /// Reply text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Writes the reply line to `writer`, then shuts the writer down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails.
    pub async fn send_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(format!("{self}\r\n").as_bytes()).await?;
        writer.flush().await?;
        writer.shutdown().await?;
        Ok(())
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

/// Outcome of [`AdmissionTable::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The source was below its limit and now holds one more session.
    Incremented,
    /// The source is at its limit; the table is unchanged.
    LimitReached,
}

/// Live session counts per source.
///
/// Each update holds only the lock of the shard the key lives in, so
/// unrelated sources never wait on each other. A key is present iff its count
/// is positive.
#[derive(Debug)]
pub struct AdmissionTable {
    counts: DashMap<SrcKey, u32>,
    max_per_source: u32,
}

impl AdmissionTable {
    /// Creates a table admitting at most `max_per_source` sessions per source.
    /// A maximum of 0 refuses every session.
    #[must_use]
    pub fn new(max_per_source: u32) -> Self {
        Self {
            counts: DashMap::new(),
            max_per_source,
        }
    }

    /// Configured per-source maximum.
    #[must_use]
    pub const fn max_per_source(&self) -> u32 {
        self.max_per_source
    }

    /// Counts one more session for `key` unless it is at the limit.
    pub fn try_acquire(&self, key: SrcKey) -> Acquire {
        match self.counts.entry(key) {
            Entry::Vacant(entry) => {
                if self.max_per_source == 0 {
                    return Acquire::LimitReached;
                }
                entry.insert(1);
                Acquire::Incremented
            }
            Entry::Occupied(mut entry) => {
                let count = entry.get_mut();
                if *count >= self.max_per_source {
                    Acquire::LimitReached
                } else {
                    *count += 1;
                    Acquire::Incremented
                }
            }
        }
    }

    /// Counts one session for `key` as ended. The entry goes away at zero.
    pub fn release(&self, key: SrcKey) {
        match self.counts.entry(key) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= 1 {
                    entry.remove();
                } else {
                    *entry.get_mut() -= 1;
                }
            }
            Entry::Vacant(entry) => {
                warn!(source = ?entry.key(), "Release for a source with no tracked sessions");
            }
        }
    }

    /// Live sessions for `key`.
    #[must_use]
    pub fn count(&self, key: &SrcKey) -> u32 {
        self.counts.get(key).map_or(0, |count| *count)
    }

    /// Number of sources with at least one live session.
    #[must_use]
    pub fn tracked_sources(&self) -> usize {
        self.counts.len()
    }
}
