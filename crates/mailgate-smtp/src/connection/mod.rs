//! Connection management: configuration, the reply channel, BDAT framing,
//! authentication and the session driver.

mod auth;
mod chunked;
mod client;
mod config;
mod stream;

pub use auth::{Authenticator, NoAuthenticator, PlainAuthenticator};
pub use client::{EnvelopeState, Exchange, SessionDriver, SessionState};
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_REPLY_TIMEOUT,
};
pub use stream::ReplyChannel;
