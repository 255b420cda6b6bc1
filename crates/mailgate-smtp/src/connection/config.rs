//! Client connection configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;

/// Default time allowed for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default time allowed for the server to produce a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// SMTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Name announced in EHLO/HELO.
    pub helo_host: String,
    /// Local address to bind before connecting. `None` lets the OS choose.
    pub bind: Option<SocketAddr>,
    /// Peer name used in log output. Defaults to `host:port`.
    pub host_port_name: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle timeout for each reply.
    pub reply_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for `host` on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(host)
    }

    /// Returns the name used to describe the peer.
    #[must_use]
    pub fn host_port(&self) -> String {
        self.host_port_name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    host: String,
    port: u16,
    helo_host: String,
    bind: Option<SocketAddr>,
    host_port_name: Option<String>,
    connect_timeout: Duration,
    reply_timeout: Duration,
}

impl ClientConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            helo_host: "localhost".to_string(),
            bind: None,
            host_port_name: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn helo_host(mut self, helo_host: impl Into<String>) -> Self {
        self.helo_host = helo_host.into();
        self
    }

    /// Binds the local end of the connection to `addr`.
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind = Some(addr);
        self
    }

    /// Sets the peer name used in log output.
    #[must_use]
    pub fn host_port_name(mut self, name: impl Into<String>) -> Self {
        self.host_port_name = Some(name.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            host: self.host,
            port: self.port,
            helo_host: self.helo_host,
            bind: self.bind,
            host_port_name: self.host_port_name,
            connect_timeout: self.connect_timeout,
            reply_timeout: self.reply_timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = ClientConfig::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.helo_host, "localhost");
        assert_eq!(config.connect_timeout, Duration::from_secs(300));
        assert_eq!(config.reply_timeout, Duration::from_secs(600));
        assert!(config.connect_timeout < config.reply_timeout);
    }

    #[test]
    fn test_config_builder() {
        let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ClientConfig::builder("smtp.example.com")
            .port(2525)
            .helo_host("client.example.com")
            .bind(bind)
            .connect_timeout(Duration::from_secs(10))
            .reply_timeout(Duration::from_secs(20))
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.helo_host, "client.example.com");
        assert_eq!(config.bind, Some(bind));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reply_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_host_port() {
        assert_eq!(
            ClientConfig::builder("mx.example.com").port(2525).build().host_port(),
            "mx.example.com:2525"
        );
        assert_eq!(
            ClientConfig::builder("10.0.0.1")
                .host_port_name("mx.example.com")
                .build()
                .host_port(),
            "mx.example.com"
        );
    }
}
