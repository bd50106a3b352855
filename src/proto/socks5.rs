//! SOCKS5 message framing and parsing (RFC 1928, RFC 1929)
//!
//! Pure functions over byte slices. The command reply is the one
//! variable-length message: its total size depends on the address type
//! byte, so sizing it is split out from decoding it. The negotiator
//! peeks the head, learns the required length, and only consumes the
//! frame once that many bytes are buffered.

use crate::consts::*;
use crate::error::SocksError;
use crate::types::{SocksCommand, TargetAddr};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Authentication method selected by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// RFC 1929 username/password sub-negotiation
    UsernamePassword,
}

/// Frame the method selection greeting
///
/// Offers `NO AUTHENTICATION` always, and `USERNAME/PASSWORD` in
/// addition when credentials are configured.
pub fn encode_method_selection(offer_userpass: bool) -> Vec<u8> {
    if offer_userpass {
        vec![
            SOCKS5_VERSION,
            2,
            SOCKS5_AUTH_METHOD_NONE,
            SOCKS5_AUTH_METHOD_PASSWORD,
        ]
    } else {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }
}

/// Parse the 2-byte method selection reply
pub fn parse_method_selection(frame: &[u8]) -> Result<AuthMethod, SocksError> {
    if frame.len() != SOCKS5_SHORT_REPLY_LEN {
        return Err(SocksError::Internal("method selection reply must be 2 bytes"));
    }
    if frame[0] != SOCKS5_VERSION {
        return Err(SocksError::InvalidVersion(frame[0]));
    }

    match frame[1] {
        SOCKS5_AUTH_METHOD_NONE => Ok(AuthMethod::None),
        SOCKS5_AUTH_METHOD_PASSWORD => Ok(AuthMethod::UsernamePassword),
        SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => Err(SocksError::NoAcceptableAuth),
        other => Err(SocksError::UnknownAuthMethod(other)),
    }
}

/// Frame the RFC 1929 username/password sub-negotiation request
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
pub fn encode_userpass_auth(user_id: &str, password: &str) -> Result<Vec<u8>, SocksError> {
    if user_id.len() > 255 {
        return Err(SocksError::InvalidCredentials(
            "username longer than 255 bytes",
        ));
    }
    if password.len() > 255 {
        return Err(SocksError::InvalidCredentials(
            "password longer than 255 bytes",
        ));
    }

    let mut request = vec![SOCKS5_AUTH_VERSION, user_id.len() as u8];
    request.extend_from_slice(user_id.as_bytes());
    request.push(password.len() as u8);
    request.extend_from_slice(password.as_bytes());
    Ok(request)
}

/// Parse the 2-byte sub-negotiation reply
///
/// The version byte is ignored (traditionally 0x01); only the status
/// matters.
pub fn parse_userpass_reply(frame: &[u8]) -> Result<(), SocksError> {
    if frame.len() != SOCKS5_SHORT_REPLY_LEN {
        return Err(SocksError::Internal("auth reply must be 2 bytes"));
    }

    match frame[1] {
        SOCKS5_AUTH_SUCCESS => Ok(()),
        status => Err(SocksError::AuthenticationFailed(status)),
    }
}

/// Frame a SOCKS5 command request
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub fn encode_command_request(
    command: SocksCommand,
    destination: &TargetAddr,
) -> Result<Vec<u8>, SocksError> {
    let mut request = vec![SOCKS5_VERSION, command.to_byte(), SOCKS5_RESERVED];
    request.extend_from_slice(&destination.to_socks_bytes()?);
    Ok(request)
}

/// Validate the version byte of a peeked command reply and return its
/// raw REP byte
pub fn reply_status(peek: &[u8]) -> Result<u8, SocksError> {
    if peek[0] != SOCKS5_VERSION {
        return Err(SocksError::InvalidVersion(peek[0]));
    }
    Ok(peek[1])
}

/// Total reply length implied by the address type
///
/// `first_addr_byte` is the fifth peeked byte; for domain replies it is
/// the length prefix.
pub fn required_reply_len(atyp: u8, first_addr_byte: u8) -> Result<usize, SocksError> {
    match atyp {
        // 4 header + 4 addr + 2 port
        SOCKS5_ADDR_TYPE_IPV4 => Ok(10),
        // 4 header + 16 addr + 2 port
        SOCKS5_ADDR_TYPE_IPV6 => Ok(22),
        // 4 header + 1 length + len + 2 port
        SOCKS5_ADDR_TYPE_DOMAIN => Ok(7 + first_addr_byte as usize),
        _ => Err(SocksError::Malformed("unknown address type in reply")),
    }
}

/// Decode the endpoint out of a complete command reply frame
///
/// The frame must be exactly as long as [`required_reply_len`] computed;
/// version and status have already been checked on the peeked head.
pub fn parse_reply(frame: &[u8]) -> Result<TargetAddr, SocksError> {
    let atyp = frame[3];
    let body = &frame[4..];

    match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let ip = Ipv4Addr::new(body[0], body[1], body[2], body[3]);
            let port = u16::from_be_bytes([body[4], body[5]]);
            Ok(TargetAddr::ipv4(ip, port))
        }
        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&body[..16]);
            let port = u16::from_be_bytes([body[16], body[17]]);
            Ok(TargetAddr::ipv6(Ipv6Addr::from(octets), port))
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = body[0] as usize;
            let domain = std::str::from_utf8(&body[1..1 + len])
                .map_err(|_| SocksError::Malformed("domain name is not UTF-8"))?
                .to_string();
            let port = u16::from_be_bytes([body[1 + len], body[2 + len]]);
            Ok(TargetAddr::domain(domain, port))
        }
        _ => Err(SocksError::Malformed("unknown address type in reply")),
    }
}
