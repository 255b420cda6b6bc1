//! # mailgate-server
//!
//! Server-side SMTP building blocks.
//!
//! ## Features
//!
//! - **Per-source admission control**: caps concurrent sessions per remote IP
//!   address with a sharded concurrent table, offered as an acquire/release
//!   gate ([`SessionHandler`]) and as a start/end listener
//!   ([`SessionLifecycleListener`])
//! - **Session state** for command handlers: open transaction, recipients,
//!   reply writer
//! - **`RCPT TO` handling** with recipient limits and handler-driven refusal
//! - **Message handlers**: a collecting handler that passes each complete
//!   message to a callback
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailgate_server::{SessionLifecycleListener, SessionStartResult, SourceTrackingListener};
//! use tokio::net::TcpListener;
//!
//! let admission = SourceTrackingListener::new(10);
//! let listener = TcpListener::bind("0.0.0.0:25").await?;
//! loop {
//!     let (mut socket, peer) = listener.accept().await?;
//!     match admission.on_session_start(&peer) {
//!         SessionStartResult::Accepted => {
//!             // ... run the session, then:
//!             admission.on_session_end(&peer);
//!         }
//!         SessionStartResult::Rejected(rejection) => {
//!             rejection.send_to(&mut socket).await?;
//!         }
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`admission`]: per-source connection counting and its two front ends
//! - [`command`]: command handlers
//! - [`handler`]: message handler contract
//! - [`session`]: per-connection state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod admission;
pub mod command;
mod error;
pub mod handler;
pub mod session;

pub use admission::{
    Acquire, AdmissionTable, NoopLifecycleListener, NoopSessionHandler, Rejection, SessionHandler,
    SessionLifecycleListener, SessionStartResult, SourceTrackingListener,
    SourceTrackingSessionHandler, SrcKey,
};
pub use command::RcptCommand;
pub use error::{Error, Result};
pub use handler::{
    BasicMessageHandler, BasicMessageHandlerFactory, HandlerError, MessageHandler, MessageListener,
};
pub use session::{Session, SessionConfig};
