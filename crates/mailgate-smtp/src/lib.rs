//! # mailgate-smtp
//!
//! Client side of the SMTP wire protocol (RFC 5321).
//!
//! ## Features
//!
//! - **Reply channel**: command lines out, single- and multi-line replies in,
//!   with truncated connections kept apart from malformed replies
//! - **DATA transparency**: dot-stuffing that survives arbitrary write
//!   boundaries, plus the terminating sequence
//! - **BDAT chunking** (RFC 3030) as an alternative to DATA
//! - **Zero look-ahead UTF-8 decoding** so reading a reply never consumes
//!   bytes that belong to the next protocol phase
//! - **Session driver**: greeting, EHLO with HELO fallback, authentication
//!   hook, envelope tracking and 421-aware QUIT
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailgate_smtp::{Address, ClientConfig, PlainAuthenticator, SessionDriver};
//!
//! #[tokio::main]
//! async fn main() -> mailgate_smtp::Result<()> {
//!     let config = ClientConfig::builder("smtp.example.com")
//!         .port(587)
//!         .helo_host("client.example.com")
//!         .build();
//!
//!     let auth = PlainAuthenticator::new("user@example.com", "password");
//!     let mut session = SessionDriver::connect_with_authenticator(&config, auth).await?;
//!
//!     session.from(&Address::new("sender@example.com")?).await?;
//!     session.to(&Address::new("recipient@example.com")?).await?;
//!
//!     if session.extensions().supports_chunking() {
//!         session.bdat_last(b"Subject: Test\r\n\r\nHello, World!\r\n").await?;
//!     } else {
//!         session.data_start().await?;
//!         session.data_write(b"Subject: Test\r\n\r\nHello, World!\r\n").await?;
//!         session.data_end().await?;
//!     }
//!
//!     session.quit().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Connected ── EHLO/HELO ──→ Negotiated ── auth ──→ Authenticated
//!                                 │
//!                                 └── MAIL ──→ InTransaction ──→ DataPhase | ChunkPhase
//!                                                                      │
//!                      Negotiated ←── message accepted ────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: dot-stuffing and the streaming UTF-8 decoder
//! - [`command`]: SMTP command builders
//! - [`connection`]: configuration, reply channel and session driver
//! - [`parser`]: reply parser
//! - [`types`]: core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use codec::DecodeError;
pub use command::Command;
pub use connection::{
    Authenticator, ClientConfig, ClientConfigBuilder, EnvelopeState, Exchange, NoAuthenticator,
    PlainAuthenticator, ReplyChannel, SessionDriver, SessionState,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extensions, Reply, ReplyClass, ReplyCode};
