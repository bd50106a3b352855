//! # Sockslink - SOCKS Proxy Client
//!
//! Sockslink is a client-side implementation of the SOCKS4, SOCKS4a and
//! SOCKS5 proxy protocols. It negotiates the handshake over any async
//! byte stream and, on success, hands back a transparent tunnel to the
//! remote endpoint.
//!
//! ## Features
//!
//! - **All three commands**: CONNECT, BIND (two-stage) and UDP ASSOCIATE
//! - **Fragmentation-proof parsing**: responses are reassembled from
//!   whatever chunks the transport delivers
//! - **Proxy chaining**: tunnel through a sequence of proxies over a
//!   single TCP connection, optionally in randomized order
//! - **UDP framing**: encode and parse the SOCKS5 UDP relay header
//! - **Bring your own stream**: negotiate over `TcpStream` or anything
//!   `AsyncRead + AsyncWrite`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sockslink::{connect, ClientOptions, SocksCommand, SocksProxy, SocksVersion, TargetAddr};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sockslink::SocksError> {
//!     let options = ClientOptions::new(
//!         SocksProxy::new("127.0.0.1", 1080, SocksVersion::V5),
//!         TargetAddr::new("example.com", 80),
//!         SocksCommand::Connect,
//!     );
//!
//!     let tunnel = connect(options).await?;
//!     // tunnel.stream is now a transparent byte stream to example.com:80;
//!     // read tunnel.initial_data first if it is non-empty.
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The protocol engine is sans-I/O: pure framers and parsers plus a
//! state machine that consumes buffered bytes and emits typed steps.
//! The client driver moves bytes between that engine and the stream.
//!
//! ```text
//! caller -> SocksClient -> Negotiator -> framers/parsers
//!              |  owns stream   |  owns ReceiveBuffer + watermark
//!              '--- Established { stream, remote_host, initial_data }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod buffer;
pub mod client;
pub mod consts;
pub mod error;
pub mod proto;
pub mod types;
pub mod udp;

// Re-export commonly used items
pub use client::{connect, connect_chain, Bound, Established, Negotiation, SocksClient};
pub use error::{reply_name, SocksError};
pub use types::{
    ChainOptions, ClientOptions, SocksCommand, SocksProxy, SocksVersion, TargetAddr,
};
pub use udp::{encode_udp_frame, parse_udp_frame, UdpFrame};

/// Version of the sockslink library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the library
pub const NAME: &str = env!("CARGO_PKG_NAME");
