//! Test utilities for sockslink integration tests
//!
//! Provides stream pairs and helpers for playing the proxy side of a
//! handshake byte-for-byte.

use std::net::SocketAddr;
use tokio::io::{duplex, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};

/// Create a pair of connected duplex streams for testing
pub fn create_mock_stream_pair() -> (DuplexStream, DuplexStream) {
    duplex(8192)
}

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Create a connected TCP stream pair for testing
pub async fn create_tcp_stream_pair() -> (TcpStream, TcpStream) {
    let (listener, addr) = create_test_listener().await;

    let connect_fut = TcpStream::connect(addr);
    let accept_fut = listener.accept();

    let (client_stream, accept_result) = tokio::join!(connect_fut, accept_fut);
    let (server_stream, _) = accept_result.unwrap();

    (client_stream.unwrap(), server_stream)
}

/// Write `bytes` split into chunks of at most `chunk_size`, yielding
/// between chunks so the reader sees them as separate deliveries
pub async fn write_fragmented<S>(stream: &mut S, bytes: &[u8], chunk_size: usize)
where
    S: AsyncWrite + Unpin,
{
    for chunk in bytes.chunks(chunk_size) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        tokio::task::yield_now().await;
    }
}

/// Canned proxy-side byte sequences
pub mod wire {
    /// SOCKS5 method selection reply: no authentication
    pub const METHOD_NONE: [u8; 2] = [0x05, 0x00];

    /// SOCKS5 method selection reply: username/password
    pub const METHOD_USERPASS: [u8; 2] = [0x05, 0x02];

    /// RFC 1929 sub-negotiation reply: success
    pub const AUTH_OK: [u8; 2] = [0x01, 0x00];

    /// SOCKS5 command reply granting with the given IPv4 endpoint
    pub fn reply_granted_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut reply = vec![0x05, 0x00, 0x00, 0x01];
        reply.extend_from_slice(&ip);
        reply.extend_from_slice(&port.to_be_bytes());
        reply
    }

    /// SOCKS5 command reply rejecting with the given code
    pub fn reply_rejected(code: u8) -> Vec<u8> {
        let mut reply = vec![0x05, code, 0x00, 0x01];
        reply.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        reply
    }

    /// SOCKS4 reply with the given status and IPv4 endpoint
    pub fn socks4_reply(status: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut reply = vec![0x00, status];
        reply.extend_from_slice(&port.to_be_bytes());
        reply.extend_from_slice(&ip);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_create_mock_stream_pair() {
        let (mut a, mut b) = create_mock_stream_pair();

        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_create_test_listener() {
        let (listener, addr) = create_test_listener().await;
        assert!(addr.port() > 0);
        drop(listener);
    }

    #[tokio::test]
    async fn test_write_fragmented_preserves_bytes() {
        let (mut a, mut b) = create_mock_stream_pair();

        tokio::spawn(async move {
            write_fragmented(&mut a, &[1, 2, 3, 4, 5, 6, 7], 2).await;
        });

        let mut buf = [0u8; 7];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_wire_builders() {
        assert_eq!(
            wire::reply_granted_ipv4([1, 2, 3, 4], 80),
            vec![0x05, 0x00, 0x00, 0x01, 1, 2, 3, 4, 0x00, 0x50]
        );
        assert_eq!(wire::reply_rejected(0x02)[1], 0x02);
        assert_eq!(wire::socks4_reply(0x5A, [0, 0, 0, 0], 0).len(), 8);
    }
}
