//! UDP frame encoding/decoding for SOCKS5
//!
//! Handles the encapsulation header that SOCKS5 UDP relays expect in
//! front of every datagram. Only framing and parsing live here; moving
//! datagrams is the caller's business.

use crate::consts::*;
use crate::error::SocksError;
use crate::types::TargetAddr;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// A SOCKS5 UDP datagram with its relay header fields
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpFrame {
    /// Fragment number (0 for standalone datagrams)
    pub frag: u8,
    /// Remote endpoint the payload travels to or from
    pub remote_host: TargetAddr,
    /// Datagram payload
    pub data: Bytes,
}

impl UdpFrame {
    /// Create an unfragmented frame
    pub fn new(remote_host: TargetAddr, data: Bytes) -> Self {
        UdpFrame {
            frag: 0,
            remote_host,
            data,
        }
    }

    /// Create a frame with an explicit fragment number
    pub fn with_frag(frag: u8, remote_host: TargetAddr, data: Bytes) -> Self {
        UdpFrame {
            frag,
            remote_host,
            data,
        }
    }

    /// Check if this frame is part of a fragmented datagram
    pub fn is_fragmented(&self) -> bool {
        self.frag != 0
    }
}

/// Encode a frame into relay-ready bytes
///
/// Fails only when the remote host is a domain name longer than 255
/// bytes, which the length-prefixed wire format cannot carry.
pub fn encode_udp_frame(frame: &UdpFrame) -> Result<Vec<u8>, SocksError> {
    let mut buf = BytesMut::new();

    // RSV (2 bytes), FRAG (1 byte)
    buf.put_u16(0);
    buf.put_u8(frame.frag);

    // ATYP, address, port
    buf.extend_from_slice(&frame.remote_host.to_socks_bytes()?);

    buf.extend_from_slice(&frame.data);
    Ok(buf.to_vec())
}

/// Parse relay bytes into a frame
///
/// The payload is whatever follows the port field; an empty payload is
/// legal.
pub fn parse_udp_frame(data: &[u8]) -> Result<UdpFrame, SocksError> {
    if data.len() < 4 {
        return Err(SocksError::Malformed("UDP frame shorter than its header"));
    }

    let mut buf = data;

    let rsv = buf.get_u16();
    if rsv != 0 {
        return Err(SocksError::Malformed("nonzero RSV in UDP frame"));
    }
    let frag = buf.get_u8();
    let atyp = buf.get_u8();

    let remote_host = match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            if buf.len() < 6 {
                return Err(SocksError::Malformed("UDP frame truncated in IPv4 address"));
            }
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            buf.advance(4);
            let port = buf.get_u16();
            TargetAddr::ipv4(ip, port)
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            if buf.is_empty() {
                return Err(SocksError::Malformed("UDP frame truncated at domain length"));
            }
            let len = buf[0] as usize;
            buf.advance(1);

            if buf.len() < len + 2 {
                return Err(SocksError::Malformed("UDP frame truncated in domain name"));
            }
            let domain = std::str::from_utf8(&buf[..len])
                .map_err(|_| SocksError::Malformed("domain name is not UTF-8"))?
                .to_string();
            buf.advance(len);
            let port = buf.get_u16();
            TargetAddr::domain(domain, port)
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            if buf.len() < 18 {
                return Err(SocksError::Malformed("UDP frame truncated in IPv6 address"));
            }
            let mut ip_bytes = [0u8; 16];
            ip_bytes.copy_from_slice(&buf[..16]);
            buf.advance(16);
            let port = buf.get_u16();
            TargetAddr::ipv6(Ipv6Addr::from(ip_bytes), port)
        }

        _ => return Err(SocksError::Malformed("unknown address type in UDP frame")),
    };

    Ok(UdpFrame {
        frag,
        remote_host,
        data: Bytes::copy_from_slice(buf),
    })
}
