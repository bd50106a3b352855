//! SOCKS4 and SOCKS4a message framing and parsing
//!
//! SOCKS4 requests carry a 4-byte IPv4 destination; SOCKS4a smuggles a
//! hostname past the proxy by sending the invalid-but-nonzero address
//! `0.0.0.1` and appending the hostname after the user-id terminator.

use crate::consts::*;
use crate::error::SocksError;
use crate::types::{SocksCommand, TargetAddr};
use std::net::{Ipv4Addr, SocketAddr};

/// Frame a SOCKS4 (or SOCKS4a) request
///
/// # Request Format
///
/// ```text
/// +----+-----+----------+----------+---------+------+------------+------+
/// | VN | CD  | DST.PORT | DST.IP   | USERID  | NULL | [HOSTNAME] |[NULL]|
/// +----+-----+----------+----------+---------+------+------------+------+
/// | 1  |  1  |    2     |    4     | Variable|  1   |  Variable  |  1   |
/// +----+-----+----------+----------+---------+------+------------+------+
/// ```
///
/// The hostname trailer is present only for SOCKS4a requests.
pub fn encode_request(
    command: SocksCommand,
    destination: &TargetAddr,
    user_id: &str,
) -> Result<Vec<u8>, SocksError> {
    if command == SocksCommand::UdpAssociate {
        return Err(SocksError::UnsupportedCommand {
            version: crate::types::SocksVersion::V4,
            command,
        });
    }

    let mut request = vec![SOCKS4_VERSION, command.to_byte()];
    request.extend_from_slice(&destination.port().to_be_bytes());

    match destination {
        TargetAddr::Ip(SocketAddr::V4(addr)) => {
            request.extend_from_slice(&addr.ip().octets());
            request.extend_from_slice(user_id.as_bytes());
            request.push(0x00);
        }
        TargetAddr::Ip(SocketAddr::V6(addr)) => {
            return Err(SocksError::InvalidAddress(format!(
                "SOCKS4 cannot address an IPv6 destination: {}",
                addr
            )));
        }
        TargetAddr::Domain(domain, _) => {
            request.extend_from_slice(&SOCKS4A_MARKER_ADDR);
            request.extend_from_slice(user_id.as_bytes());
            request.push(0x00);
            request.extend_from_slice(domain.as_bytes());
            request.push(0x00);
        }
    }

    Ok(request)
}

/// A decoded SOCKS4 reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Reply {
    /// Raw status byte; 0x5A means granted
    pub status: u8,
    /// Endpoint reported by the proxy (meaningful for BIND)
    pub endpoint: TargetAddr,
}

impl Socks4Reply {
    /// True when the proxy granted the request
    pub fn granted(&self) -> bool {
        self.status == SOCKS4_REPLY_GRANTED
    }
}

/// Parse the fixed 8-byte SOCKS4 reply
///
/// Layout: VN (ignored) | status | port (BE u16) | IPv4 (BE u32).
/// Status interpretation is left to the caller, which knows whether
/// this is the command reply or BIND's second, inbound-peer reply.
pub fn parse_reply(frame: &[u8]) -> Result<Socks4Reply, SocksError> {
    if frame.len() != SOCKS4_REPLY_LEN {
        return Err(SocksError::Internal("SOCKS4 reply must be 8 bytes"));
    }

    let status = frame[1];
    let port = u16::from_be_bytes([frame[2], frame[3]]);
    let ip = Ipv4Addr::new(frame[4], frame[5], frame[6], frame[7]);

    Ok(Socks4Reply {
        status,
        endpoint: TargetAddr::ipv4(ip, port),
    })
}
