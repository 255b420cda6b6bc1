//! Low-level SMTP stream handling.
//!
//! [`ReplyChannel`] sends command lines and assembles replies. Replies are
//! read through a [`Utf8Reader`], one character at a time, so the channel
//! never holds bytes that belong to whatever follows the reply.

use std::borrow::Cow;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tracing::{debug, warn};

use super::config::{ClientConfig, DEFAULT_REPLY_TIMEOUT};
use crate::codec::{DecodeError, TransparencyCodec, Utf8Reader};
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply, reply_line_body};
use crate::types::Reply;

/// Maximum reply line length in UTF-16 units, to bound memory use.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Command/reply channel over a connected byte stream.
///
/// Commands are written and flushed immediately; nothing is pipelined.
#[derive(Debug)]
pub struct ReplyChannel<S> {
    stream: Option<Utf8Reader<S>>,
    codec: TransparencyCodec,
    scratch: BytesMut,
    reply_timeout: Duration,
    host_port: String,
    local_addr: Option<SocketAddr>,
}

impl ReplyChannel<TcpStream> {
    /// Opens a TCP connection as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the connection cannot be established within
    /// the connect timeout.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let host_port = config.host_port();
        debug!(peer = %host_port, "Connecting");

        let stream = tokio::time::timeout(config.connect_timeout, open_tcp(config))
            .await
            .map_err(|_| timed_out(format!("connect to {host_port} timed out")))??;
        let local_addr = stream.local_addr().ok();

        let mut channel = Self::from_stream(stream, host_port);
        channel.local_addr = local_addr;
        channel.reply_timeout = config.reply_timeout;
        Ok(channel)
    }
}

impl<S> ReplyChannel<S> {
    /// Wraps an already connected stream.
    pub fn from_stream(stream: S, host_port: impl Into<String>) -> Self {
        Self {
            stream: Some(Utf8Reader::new(stream)),
            codec: TransparencyCodec::new(),
            scratch: BytesMut::new(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            host_port: host_port.into(),
            local_addr: None,
        }
    }

    /// Sets the time allowed for each reply.
    #[must_use]
    pub const fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the peer name used in log output.
    #[must_use]
    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// Returns the local socket address, if known.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Gets a reference to the underlying stream while connected.
    #[must_use]
    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref().map(Utf8Reader::get_ref)
    }

    fn stream_mut(&mut self) -> Result<&mut Utf8Reader<S>> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Not connected".into()))
    }
}

impl<S> ReplyChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends one command line, appending CRLF.
    ///
    /// The line is logged at debug level with any `AUTH` payload masked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `line` contains CR or LF or the
    /// channel is closed, and [`Error::Io`] if the write fails.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        check_line(line)?;
        debug!("C: {}", loggable(line));
        self.write_line(line).await
    }

    /// Like [`send`](Self::send), but the line never reaches the log.
    /// Used for SASL responses.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_sensitive(&mut self, line: &str) -> Result<()> {
        check_line(line)?;
        debug!("C: <redacted>");
        self.write_line(line).await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let stream = self.stream_mut()?.get_mut();
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        stream.write_all(&buf).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads one complete reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Disconnected`] if the stream ends before any reply line
    /// - [`Error::MalformedReply`] for short lines, non-numeric codes or a
    ///   stream that ends inside a multi-line reply
    /// - [`Error::Io`] on read failure or when the reply timeout expires
    pub async fn receive(&mut self) -> Result<Reply> {
        let reply_timeout = self.reply_timeout;
        let stream = self.stream_mut()?;
        tokio::time::timeout(reply_timeout, read_reply(stream))
            .await
            .map_err(|_| timed_out(format!("no reply within {reply_timeout:?}")))?
    }

    /// Sends a command and reads its reply.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send) and [`receive`](Self::receive).
    pub async fn send_receive(&mut self, line: &str) -> Result<Reply> {
        self.send(line).await?;
        self.receive().await
    }

    /// Reads a reply and fails unless it is positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for a non-success reply, plus the errors of
    /// [`receive`](Self::receive).
    pub async fn receive_and_check(&mut self) -> Result<Reply> {
        check(self.receive().await?)
    }

    /// Sends a command and fails unless its reply is positive.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send) and [`receive_and_check`](Self::receive_and_check).
    pub async fn send_and_check(&mut self, line: &str) -> Result<Reply> {
        self.send(line).await?;
        self.receive_and_check().await
    }

    /// Writes message content through the dot-stuffing codec.
    ///
    /// Content is not flushed until [`finish_data`](Self::finish_data) or
    /// [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the write fails.
    pub async fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let Self {
            stream,
            codec,
            scratch,
            ..
        } = self;
        let stream = stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Not connected".into()))?;

        scratch.clear();
        codec.encode(data, scratch);
        stream.get_mut().write_all(&scratch[..]).await?;
        Ok(())
    }

    /// Ends the DATA content: flushes it, writes the terminating sequence and
    /// flushes again.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the write fails.
    pub async fn finish_data(&mut self) -> Result<()> {
        self.flush().await?;

        let Self {
            stream,
            codec,
            scratch,
            ..
        } = self;
        let stream = stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Not connected".into()))?
            .get_mut();

        scratch.clear();
        codec.finish(scratch);
        stream.write_all(&scratch[..]).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Writes bytes verbatim, bypassing the dot-stuffing codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the write fails.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.stream_mut()?.get_mut().write_all(data).await?;
        Ok(())
    }

    /// Flushes pending output.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.stream_mut()?.get_mut().flush().await?;
        Ok(())
    }

    /// Closes the connection. Errors are logged, never returned, and calling
    /// this more than once is harmless.
    pub async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        match stream.shutdown().await {
            Ok(()) => debug!(peer = %self.host_port, "Closed connection"),
            Err(e) => warn!(peer = %self.host_port, error = %e, "Problem closing connection"),
        }
    }
}

fn check_line(line: &str) -> Result<()> {
    if line.contains(['\r', '\n']) {
        return Err(Error::InvalidState(
            "command line must not contain line terminators".into(),
        ));
    }
    Ok(())
}

/// `line` as it may appear in the log: an `AUTH` command keeps its
/// mechanism, everything after it is masked.
fn loggable(line: &str) -> Cow<'_, str> {
    let mut words = line.splitn(3, ' ');
    let verb = words.next().unwrap_or_default();
    if !verb.eq_ignore_ascii_case("AUTH") {
        return Cow::Borrowed(line);
    }
    match (words.next(), words.next()) {
        (Some(mechanism), Some(_)) => Cow::Owned(format!("{verb} {mechanism} <redacted>")),
        _ => Cow::Borrowed(line),
    }
}

/// Fails with [`Error::Rejected`] unless the reply is positive.
pub(crate) fn check(reply: Reply) -> Result<Reply> {
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(Error::Rejected(reply))
    }
}

async fn read_reply<S>(stream: &mut Utf8Reader<S>) -> Result<Reply>
where
    S: AsyncRead + Unpin,
{
    let mut lines: Vec<String> = Vec::new();
    loop {
        let Some(line) = read_line(stream).await? else {
            if lines.is_empty() {
                return Err(Error::Disconnected);
            }
            let partial = lines
                .iter()
                .filter_map(|l| reply_line_body(l).ok())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::MalformedReply(partial));
        };
        debug!("S: {line}");

        reply_line_body(&line)?;
        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Reads one line without its terminator, or `None` at a clean end of stream.
///
/// A final line without a terminator is returned as is.
async fn read_line<S>(stream: &mut Utf8Reader<S>) -> Result<Option<String>>
where
    S: AsyncRead + Unpin,
{
    let mut units: Vec<u16> = Vec::new();
    loop {
        match stream.read_unit().await? {
            None if units.is_empty() => return Ok(None),
            None | Some(0x0A) => break,
            Some(unit) => units.push(unit),
        }
        if units.len() > MAX_LINE_LENGTH {
            return Err(Error::MalformedReply("reply line too long".into()));
        }
    }
    if units.last() == Some(&0x0D) {
        units.pop();
    }
    String::from_utf16(&units)
        .map(Some)
        .map_err(|_| DecodeError::InvalidSequence.into())
}

async fn open_tcp(config: &ClientConfig) -> io::Result<TcpStream> {
    let Some(bind) = config.bind else {
        return TcpStream::connect((config.host.as_str(), config.port)).await;
    };

    let addr = lookup_host((config.host.as_str(), config.port))
        .await?
        .find(|addr| addr.is_ipv4() == bind.is_ipv4())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} has no address matching bind address {bind}", config.host),
            )
        })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(bind)?;
    socket.connect(addr).await
}

fn timed_out(message: String) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::TimedOut, message))
}
