//! Error types for sockslink
//!
//! One distinguishable variant per way a proxy handshake can fail. A
//! client instance surfaces at most one of these; once the engine has
//! failed it refuses further work.

use crate::types::{SocksCommand, SocksVersion};
use std::io;
use thiserror::Error;

/// Errors surfaced by the SOCKS client engine
#[derive(Error, Debug)]
pub enum SocksError {
    /// The handshake did not reach a terminal state within the configured timeout
    #[error("proxy handshake timed out")]
    HandshakeTimeout,

    /// The transport closed before the handshake completed
    #[error("socket closed before the handshake completed")]
    SocketClosed,

    /// Underlying transport error
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// A response opened with an unexpected protocol version byte
    #[error("unexpected protocol version: {0:#04x}")]
    InvalidVersion(u8),

    /// SOCKS5 method selection returned 0xFF
    #[error("proxy accepted none of the offered authentication methods")]
    NoAcceptableAuth,

    /// SOCKS5 method selection chose a method this client does not speak
    #[error("proxy selected an unsupported authentication method: {0:#04x}")]
    UnknownAuthMethod(u8),

    /// Username/password sub-negotiation failed
    #[error("proxy authentication failed (status {0:#04x})")]
    AuthenticationFailed(u8),

    /// The proxy refused the requested operation; carries the raw reply byte
    #[error("proxy rejected the connection: {0:#04x} ({name})", name = reply_name(*.0))]
    Rejected(u8),

    /// The proxy refused the inbound connection of a BIND request
    #[error("proxy rejected the incoming bound connection: {0:#04x} ({name})", name = reply_name(*.0))]
    BoundRejected(u8),

    /// The state machine reached a dispatch branch that should be unreachable
    #[error("internal protocol engine error: {0}")]
    Internal(&'static str),

    /// A destination address cannot be expressed in the negotiated protocol
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The requested command does not exist in the proxy's protocol version
    #[error("the {command} command is not supported by SOCKS{version}")]
    UnsupportedCommand {
        /// Protocol version of the proxy
        version: SocksVersion,
        /// The command that was requested
        command: SocksCommand,
    },

    /// A convenience entry point that only tunnels CONNECT was given another command
    #[error("only the CONNECT command can be tunneled here, got {0}")]
    ConnectOnly(SocksCommand),

    /// A proxy chain was configured with fewer than two hops
    #[error("a proxy chain needs at least two hops")]
    ChainTooShort,

    /// Username or password cannot be carried by RFC 1929
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    /// An inbound frame violates the wire format
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

/// Human-readable name for a SOCKS reply code
///
/// Knows the RFC 1928 reply set and the SOCKS4 0x5A..0x5D family.
/// Unknown bytes map to `"unrecognized reply"`; the raw byte is always
/// preserved by the error variants that call this.
pub fn reply_name(code: u8) -> &'static str {
    match code {
        0x00 => "succeeded",
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        0x5A => "request granted",
        0x5B => "request rejected or failed",
        0x5C => "identd unreachable",
        0x5D => "identd user-id mismatch",
        _ => "unrecognized reply",
    }
}
