//! Proxy chain driver
//!
//! Tunnels through several proxies in sequence: hop 0 opens the one TCP
//! stream, and every later hop speaks its handshake through the tunnel
//! the previous hops built. The destination of hop `i` is proxy `i+1`;
//! only the last hop targets the caller's destination.

use super::{Established, SocksClient};
use crate::error::SocksError;
use crate::types::{ChainOptions, ClientOptions, SocksCommand, SocksProxy, TargetAddr};
use rand::seq::SliceRandom;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Tunnel a TCP stream through a chain of proxies
///
/// Every hop issues CONNECT. Hops share one timeout setting, applied
/// per hop. On any hop failure the stream is shut down and dropped,
/// which tears down all previously established hops at once; they are
/// framings on the same TCP connection.
pub async fn connect_chain(options: ChainOptions) -> Result<Established<TcpStream>, SocksError> {
    if options.proxies.len() < 2 {
        return Err(SocksError::ChainTooShort);
    }

    let mut proxies = options.proxies.clone();
    if options.randomize_order {
        proxies.shuffle(&mut rand::thread_rng());
    }

    let first = ClientOptions::new(
        proxies[0].clone(),
        hop_destination(&proxies, 0, &options.destination),
        SocksCommand::Connect,
    )
    .with_timeout(options.timeout)
    .with_tcp_nodelay(options.tcp_nodelay);

    let mut established = SocksClient::connect(first).await?.into_established()?;
    debug!("chain hop 1/{} established", proxies.len());

    for i in 1..proxies.len() {
        let hop = ClientOptions::new(
            proxies[i].clone(),
            hop_destination(&proxies, i, &options.destination),
            SocksCommand::Connect,
        )
        .with_timeout(options.timeout);

        let Established {
            stream,
            initial_data,
            ..
        } = established;

        let client = SocksClient::with_buffered_stream(stream, &initial_data, hop);
        established = client.negotiate().await?.into_established()?;
        debug!("chain hop {}/{} established", i + 1, proxies.len());
    }

    info!(
        "chain of {} proxies established to {}",
        proxies.len(),
        options.destination
    );
    Ok(established)
}

/// Where hop `i` should CONNECT to
fn hop_destination(proxies: &[SocksProxy], i: usize, destination: &TargetAddr) -> TargetAddr {
    if i + 1 < proxies.len() {
        let next = &proxies[i + 1];
        TargetAddr::new(next.routable_host(), next.port)
    } else {
        destination.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SocksVersion;

    fn proxy(host: &str) -> SocksProxy {
        SocksProxy::new(host, 1080, SocksVersion::V5)
    }

    #[test]
    fn test_hop_destination_intermediate_and_final() {
        let proxies = vec![
            proxy("10.0.0.1"),
            proxy("10.0.0.2").with_ipaddress("198.51.100.2"),
            proxy("10.0.0.3"),
        ];
        let destination = TargetAddr::new("example.com", 443);

        // Intermediate hops target the next proxy, preferring its
        // routable literal
        assert_eq!(
            hop_destination(&proxies, 0, &destination),
            TargetAddr::new("198.51.100.2", 1080)
        );
        assert_eq!(
            hop_destination(&proxies, 1, &destination),
            TargetAddr::new("10.0.0.3", 1080)
        );

        // The last hop targets the real destination
        assert_eq!(hop_destination(&proxies, 2, &destination), destination);
    }

    #[tokio::test]
    async fn test_chain_rejects_single_proxy() {
        let options = ChainOptions::new(
            vec![proxy("10.0.0.1")],
            TargetAddr::new("example.com", 443),
        );
        assert!(matches!(
            connect_chain(options).await,
            Err(SocksError::ChainTooShort)
        ));
    }
}
