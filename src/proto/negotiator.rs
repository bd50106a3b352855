//! Sans-I/O handshake state machine
//!
//! The negotiator owns the receive buffer, the current protocol state
//! and the watermark: the minimum number of buffered bytes the next
//! parse attempt needs. The driver feeds it whatever chunks the
//! transport produces and executes the steps it emits; the negotiator
//! never touches the stream itself, which is what makes the engine
//! testable byte-by-byte and keeps the "protocol owner" to
//! "transparent pass-through" switch atomic: once it reports
//! established, every unconsumed byte is still sitting in the buffer.
//!
//! State progression:
//!
//! ```text
//! Created -> SentInitialHandshake -> [SentAuthentication] ->
//!     SentFinalHandshake -> Established
//!                        \-> BoundWaitingForConnection -> Established
//! ```
//!
//! Any error lands in `Failed`, which absorbs all further steps.

use crate::buffer::ReceiveBuffer;
use crate::consts::*;
use crate::error::SocksError;
use crate::proto::{socks4, socks5};
use crate::types::{SocksCommand, SocksProxy, SocksVersion, TargetAddr};
use bytes::Bytes;
use tracing::{debug, trace};

/// Protocol states, in order of typical progression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Created,
    SentInitialHandshake,
    SentAuthentication,
    SentFinalHandshake,
    BoundWaitingForConnection,
    Established,
    Failed,
}

/// What the driver must do next
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// Not enough buffered bytes; read more from the transport
    NeedBytes,
    /// Write this handshake message to the proxy
    Send(Vec<u8>),
    /// BIND first reply: the proxy is listening at this endpoint
    Bound(TargetAddr),
    /// Terminal success; the stream is now a transparent tunnel
    Established(TargetAddr),
}

/// The handshake engine for one client instance
#[derive(Debug)]
pub(crate) struct Negotiator {
    proxy: SocksProxy,
    destination: TargetAddr,
    command: SocksCommand,
    state: State,
    buffer: ReceiveBuffer,
    watermark: usize,
}

impl Negotiator {
    pub(crate) fn new(proxy: SocksProxy, destination: TargetAddr, command: SocksCommand) -> Self {
        Negotiator {
            proxy,
            destination,
            command,
            state: State::Created,
            buffer: ReceiveBuffer::new(),
            watermark: 0,
        }
    }

    /// Append a chunk read from the transport
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        trace!("buffered {} bytes ({} total)", chunk.len(), self.buffer.len() + chunk.len());
        self.buffer.append(chunk);
    }

    /// Frame the first outbound message and arm the watermark
    pub(crate) fn initial_request(&mut self) -> Result<Vec<u8>, SocksError> {
        match self.start() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    fn start(&mut self) -> Result<Vec<u8>, SocksError> {
        if self.state != State::Created {
            return Err(SocksError::Internal("handshake already started"));
        }

        let frame = match self.proxy.version {
            SocksVersion::V4 => {
                self.watermark = SOCKS4_REPLY_LEN;
                socks4::encode_request(
                    self.command,
                    &self.destination,
                    self.proxy.user_id.as_deref().unwrap_or(""),
                )?
            }
            SocksVersion::V5 => {
                self.watermark = SOCKS5_SHORT_REPLY_LEN;
                socks5::encode_method_selection(self.proxy.needs_auth())
            }
        };

        self.state = State::SentInitialHandshake;
        debug!(
            "SOCKS{} {} handshake started for {}",
            self.proxy.version, self.command, self.destination
        );
        Ok(frame)
    }

    /// Attempt to advance the handshake with what is buffered
    ///
    /// Returns [`Step::NeedBytes`] when the buffer has not reached the
    /// watermark. A single chunk can complete several steps; the driver
    /// keeps stepping until it sees `NeedBytes` or a terminal step.
    pub(crate) fn step(&mut self) -> Result<Step, SocksError> {
        match self.dispatch() {
            Ok(step) => Ok(step),
            Err(err) => {
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    fn dispatch(&mut self) -> Result<Step, SocksError> {
        match self.state {
            State::Created => Err(SocksError::Internal("no handshake in flight")),
            State::Established => Err(SocksError::Internal("handshake already finished")),
            State::Failed => Err(SocksError::Internal("handshake already failed")),
            _ if self.buffer.len() < self.watermark => Ok(Step::NeedBytes),
            State::SentInitialHandshake => match self.proxy.version {
                SocksVersion::V4 => self.on_socks4_reply(false),
                SocksVersion::V5 => self.on_method_selection(),
            },
            State::SentAuthentication => self.on_auth_reply(),
            State::SentFinalHandshake => self.on_command_reply(false),
            State::BoundWaitingForConnection => match self.proxy.version {
                SocksVersion::V4 => self.on_socks4_reply(true),
                SocksVersion::V5 => self.on_command_reply(true),
            },
        }
    }

    /// SOCKS4: both the command reply and BIND's inbound-peer reply use
    /// the same fixed 8-byte layout
    fn on_socks4_reply(&mut self, second: bool) -> Result<Step, SocksError> {
        let frame = self.buffer.get(SOCKS4_REPLY_LEN);
        let reply = socks4::parse_reply(&frame)?;

        if !reply.granted() {
            return Err(if second {
                SocksError::BoundRejected(reply.status)
            } else {
                SocksError::Rejected(reply.status)
            });
        }

        let endpoint = self.substitute_wildcard(reply.endpoint);
        self.finish(second, endpoint, SOCKS4_REPLY_LEN)
    }

    fn on_method_selection(&mut self) -> Result<Step, SocksError> {
        let frame = self.buffer.get(SOCKS5_SHORT_REPLY_LEN);

        match socks5::parse_method_selection(&frame)? {
            socks5::AuthMethod::None => self.send_command_request(),
            socks5::AuthMethod::UsernamePassword => {
                let frame = socks5::encode_userpass_auth(
                    self.proxy.user_id.as_deref().unwrap_or(""),
                    self.proxy.password.as_deref().unwrap_or(""),
                )?;
                self.state = State::SentAuthentication;
                self.watermark = SOCKS5_SHORT_REPLY_LEN;
                Ok(Step::Send(frame))
            }
        }
    }

    fn on_auth_reply(&mut self) -> Result<Step, SocksError> {
        let frame = self.buffer.get(SOCKS5_SHORT_REPLY_LEN);
        socks5::parse_userpass_reply(&frame)?;
        debug!("authenticated with {}", self.proxy);
        self.send_command_request()
    }

    fn send_command_request(&mut self) -> Result<Step, SocksError> {
        let frame = socks5::encode_command_request(self.command, &self.destination)?;
        self.state = State::SentFinalHandshake;
        self.watermark = SOCKS5_REPLY_PEEK_LEN;
        Ok(Step::Send(frame))
    }

    /// SOCKS5 command reply: variable length, sized by peeking
    fn on_command_reply(&mut self, second: bool) -> Result<Step, SocksError> {
        let peek = self.buffer.peek(SOCKS5_REPLY_PEEK_LEN);
        let status = socks5::reply_status(peek)?;
        let (atyp, first_addr_byte) = (peek[3], peek[4]);

        if status != SOCKS5_REPLY_SUCCEEDED {
            return Err(if second {
                SocksError::BoundRejected(status)
            } else {
                SocksError::Rejected(status)
            });
        }

        let required = socks5::required_reply_len(atyp, first_addr_byte)?;
        if self.buffer.len() < required {
            self.watermark = required;
            return Ok(Step::NeedBytes);
        }

        let frame = self.buffer.get(required);
        let endpoint = self.substitute_wildcard(socks5::parse_reply(&frame)?);
        self.finish(second, endpoint, SOCKS5_REPLY_PEEK_LEN)
    }

    /// Terminal bookkeeping shared by both protocol versions
    fn finish(
        &mut self,
        second: bool,
        endpoint: TargetAddr,
        rearm_watermark: usize,
    ) -> Result<Step, SocksError> {
        if self.command == SocksCommand::Bind && !second {
            self.state = State::BoundWaitingForConnection;
            self.watermark = rearm_watermark;
            debug!("proxy bound and listening at {}", endpoint);
            Ok(Step::Bound(endpoint))
        } else {
            self.state = State::Established;
            debug!("tunnel established via {} to {}", self.proxy, endpoint);
            Ok(Step::Established(endpoint))
        }
    }

    /// Replace a reported `0.0.0.0` with the proxy's routable literal
    fn substitute_wildcard(&self, endpoint: TargetAddr) -> TargetAddr {
        if endpoint.is_wildcard_v4() {
            TargetAddr::new(self.proxy.routable_host(), endpoint.port())
        } else {
            endpoint
        }
    }

    /// Bytes that arrived past the last handshake reply
    ///
    /// After establishment these belong to the tunnel, not the
    /// protocol; the caller must see them before any fresh reads.
    pub(crate) fn take_residual(&mut self) -> Bytes {
        self.buffer.take_all()
    }

    pub(crate) fn is_established(&self) -> bool {
        self.state == State::Established
    }
}
