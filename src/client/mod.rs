//! SOCKS client driver
//!
//! Owns the transport stream and drives the sans-I/O negotiator over
//! it: writes the frames the engine emits, feeds back whatever chunks
//! the proxy sends, and resolves to a typed outcome. The stream changes
//! hands exactly once, into [`Established`] on success; on any failure
//! it is shut down and dropped.

mod chain;

pub use chain::connect_chain;

use crate::error::SocksError;
use crate::proto::negotiator::{Negotiator, Step};
use crate::types::{ClientOptions, SocksCommand, TargetAddr};
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// A tunnel that completed its handshake
///
/// The stream is now transparent: bytes written reach the destination
/// and bytes read come from it. `initial_data` holds anything the proxy
/// sent past the final handshake reply; consume it before reading from
/// the stream or those bytes are reordered.
#[derive(Debug)]
pub struct Established<S> {
    /// The tunnel stream, owned by the caller from here on
    pub stream: S,
    /// Endpoint reported in the proxy's final reply (the bound peer for
    /// BIND, the relay endpoint for UDP ASSOCIATE)
    pub remote_host: TargetAddr,
    /// Bytes that arrived after the last handshake reply
    pub initial_data: Bytes,
}

/// A BIND request whose first reply has arrived
///
/// The proxy is listening at [`remote_host`](Self::remote_host) and
/// will report exactly one inbound connection. Await
/// [`established`](Self::established) to receive it.
#[derive(Debug)]
pub struct Bound<S> {
    remote_host: TargetAddr,
    client: SocksClient<S>,
}

/// Terminal outcome of a handshake
///
/// CONNECT and UDP ASSOCIATE resolve straight to
/// [`Negotiation::Established`]; BIND resolves to
/// [`Negotiation::Bound`] first.
#[derive(Debug)]
pub enum Negotiation<S> {
    /// The tunnel is open
    Established(Established<S>),
    /// BIND first stage: the proxy is listening
    Bound(Bound<S>),
}

impl<S> Negotiation<S> {
    /// Unwrap the established outcome
    ///
    /// Fails on a BIND first-stage notice, which callers expecting a
    /// plain tunnel should never see.
    pub fn into_established(self) -> Result<Established<S>, SocksError> {
        match self {
            Negotiation::Established(established) => Ok(established),
            Negotiation::Bound(_) => Err(SocksError::Internal(
                "expected an established tunnel, got a bound notice",
            )),
        }
    }
}

/// What the pump loop resolved to
enum HandshakeEvent {
    Established(TargetAddr),
    Bound(TargetAddr),
}

/// A SOCKS client for one handshake over one stream
#[derive(Debug)]
pub struct SocksClient<S> {
    stream: S,
    negotiator: Negotiator,
    timeout: Duration,
}

impl SocksClient<TcpStream> {
    /// Open a TCP connection to the proxy and negotiate
    ///
    /// The options timeout covers everything up to the first terminal
    /// outcome: the TCP connect, the handshake round-trips and, for
    /// BIND, the first reply. The wait for BIND's inbound peer is not
    /// timed.
    pub async fn connect(options: ClientOptions) -> Result<Negotiation<TcpStream>, SocksError> {
        options.validate()?;
        match timeout(options.timeout, Self::open_and_negotiate(options)).await {
            Ok(result) => result,
            Err(_) => Err(SocksError::HandshakeTimeout),
        }
    }

    async fn open_and_negotiate(
        options: ClientOptions,
    ) -> Result<Negotiation<TcpStream>, SocksError> {
        let stream =
            TcpStream::connect((options.proxy.host.as_str(), options.proxy.port)).await?;
        if options.tcp_nodelay {
            stream.set_nodelay(true)?;
        }
        debug!("connected to {}", options.proxy);

        SocksClient::with_stream(stream, options)
            .negotiate_untimed()
            .await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SocksClient<S> {
    /// Adopt an already-connected stream
    pub fn with_stream(stream: S, options: ClientOptions) -> Self {
        Self::with_buffered_stream(stream, &[], options)
    }

    /// Adopt an already-connected stream plus bytes already read from it
    ///
    /// The chain driver uses this: bytes that trailed one hop's final
    /// reply are the opening bytes of the next hop's handshake.
    pub fn with_buffered_stream(stream: S, already_read: &[u8], options: ClientOptions) -> Self {
        let mut negotiator =
            Negotiator::new(options.proxy, options.destination, options.command);
        if !already_read.is_empty() {
            negotiator.push(already_read);
        }
        SocksClient {
            stream,
            negotiator,
            timeout: options.timeout,
        }
    }

    /// Drive the handshake to its first terminal outcome
    ///
    /// Applies the options timeout; see [`SocksClient::connect`] for
    /// its scope.
    pub async fn negotiate(self) -> Result<Negotiation<S>, SocksError> {
        let deadline = self.timeout;
        match timeout(deadline, self.negotiate_untimed()).await {
            Ok(result) => result,
            Err(_) => Err(SocksError::HandshakeTimeout),
        }
    }

    async fn negotiate_untimed(mut self) -> Result<Negotiation<S>, SocksError> {
        match self.drive().await {
            Ok(HandshakeEvent::Established(remote_host)) => {
                Ok(Negotiation::Established(Established {
                    remote_host,
                    initial_data: self.negotiator.take_residual(),
                    stream: self.stream,
                }))
            }
            Ok(HandshakeEvent::Bound(remote_host)) => Ok(Negotiation::Bound(Bound {
                remote_host,
                client: self,
            })),
            Err(err) => {
                let _ = self.stream.shutdown().await;
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<HandshakeEvent, SocksError> {
        let request = self.negotiator.initial_request()?;
        self.stream.write_all(&request).await?;
        self.pump().await
    }

    /// Step the engine, write what it frames, read what it still needs
    async fn pump(&mut self) -> Result<HandshakeEvent, SocksError> {
        let mut chunk = [0u8; 512];
        loop {
            loop {
                match self.negotiator.step()? {
                    Step::NeedBytes => break,
                    Step::Send(frame) => self.stream.write_all(&frame).await?,
                    Step::Bound(endpoint) => return Ok(HandshakeEvent::Bound(endpoint)),
                    Step::Established(endpoint) => {
                        return Ok(HandshakeEvent::Established(endpoint))
                    }
                }
            }

            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(SocksError::SocketClosed);
            }
            self.negotiator.push(&chunk[..n]);
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Bound<S> {
    /// The endpoint the proxy is listening on for the inbound peer
    pub fn remote_host(&self) -> &TargetAddr {
        &self.remote_host
    }

    /// Wait for the inbound peer to connect
    ///
    /// Resolves when the proxy sends its second reply. This wait is
    /// untimed; wrap it in `tokio::time::timeout` for a deadline.
    pub async fn established(mut self) -> Result<Established<S>, SocksError> {
        match self.client.pump().await {
            Ok(HandshakeEvent::Established(remote_host)) => Ok(Established {
                remote_host,
                initial_data: self.client.negotiator.take_residual(),
                stream: self.client.stream,
            }),
            Ok(HandshakeEvent::Bound(_)) => {
                let _ = self.client.stream.shutdown().await;
                Err(SocksError::Internal("bound twice"))
            }
            Err(err) => {
                let _ = self.client.stream.shutdown().await;
                Err(err)
            }
        }
    }
}

/// Tunnel a TCP stream through one proxy
///
/// Convenience wrapper over [`SocksClient::connect`] that accepts only
/// the CONNECT command.
pub async fn connect(options: ClientOptions) -> Result<Established<TcpStream>, SocksError> {
    if options.command != SocksCommand::Connect {
        return Err(SocksError::ConnectOnly(options.command));
    }
    SocksClient::connect(options).await?.into_established()
}
