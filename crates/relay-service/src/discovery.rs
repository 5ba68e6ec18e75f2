//! LAN discovery responder.
//!
//! Clients find a relay by sending the datagram `DISCOVER` to the multicast
//! group; every relay listening there answers `OFFER` by unicast to the
//! probe's source address and port. Anything else is ignored. The service
//! port itself is known out of band.

use crate::observability::metrics;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Probe payload.
pub const DISCOVER_PROBE: &[u8] = b"DISCOVER";

/// Reply payload.
pub const OFFER_REPLY: &[u8] = b"OFFER";

/// Large enough for any probe; longer datagrams are truncated and ignored.
const RECV_BUFFER: usize = 512;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to set up discovery socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// Reply for a received payload, if any.
#[must_use]
pub fn reply_for(payload: &[u8]) -> Option<&'static [u8]> {
    (payload == DISCOVER_PROBE).then_some(OFFER_REPLY)
}

/// Answers discovery probes until cancelled.
#[derive(Debug)]
pub struct DiscoveryResponder {
    socket: UdpSocket,
    group: Ipv4Addr,
}

impl DiscoveryResponder {
    /// Bind to `addr` with `SO_REUSEADDR` and join `group`.
    ///
    /// Failing to join the group is only a warning: the responder still
    /// answers probes sent straight to its unicast address.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::Socket` if the socket cannot be created or bound.
    pub fn bind(addr: SocketAddrV4, group: Ipv4Addr) -> Result<Self, DiscoveryError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(addr))?;

        if let Err(e) = socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED) {
            warn!(
                target: "relay.discovery",
                group = %group,
                error = %e,
                "Failed to join multicast group, answering unicast probes only"
            );
        }

        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self { socket, group })
    }

    /// Address the responder is bound to.
    ///
    /// # Errors
    ///
    /// Returns error if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr, DiscoveryError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve probes until `cancel_token` is cancelled.
    #[instrument(skip_all, name = "relay.discovery", fields(group = %self.group))]
    pub async fn run(self, cancel_token: CancellationToken) {
        info!(
            target: "relay.discovery",
            group = %self.group,
            local_addr = ?self.socket.local_addr().ok(),
            "Discovery responder started"
        );

        let mut buf = [0u8; RECV_BUFFER];
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,

                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            let payload = buf.get(..len).unwrap_or_default();
                            self.handle_datagram(payload, peer).await;
                        }
                        Err(e) => {
                            metrics::record_discovery_probe("error");
                            warn!(
                                target: "relay.discovery",
                                error = %e,
                                "Discovery receive failed"
                            );
                        }
                    }
                }
            }
        }

        info!(target: "relay.discovery", "Discovery responder stopped");
    }

    async fn handle_datagram(&self, payload: &[u8], peer: SocketAddr) {
        let Some(reply) = reply_for(payload) else {
            metrics::record_discovery_probe("ignored");
            debug!(
                target: "relay.discovery",
                peer = %peer,
                len = payload.len(),
                "Ignoring datagram"
            );
            return;
        };

        match self.socket.send_to(reply, peer).await {
            Ok(_) => {
                metrics::record_discovery_probe("offered");
                debug!(target: "relay.discovery", peer = %peer, "Sent offer");
            }
            Err(e) => {
                metrics::record_discovery_probe("error");
                warn!(
                    target: "relay.discovery",
                    peer = %peer,
                    error = %e,
                    "Failed to send offer"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reply_for_discover() {
        assert_eq!(reply_for(b"DISCOVER"), Some(OFFER_REPLY));
    }

    #[test]
    fn test_reply_for_anything_else() {
        assert_eq!(reply_for(b""), None);
        assert_eq!(reply_for(b"discover"), None);
        assert_eq!(reply_for(b"DISCOVER\n"), None);
        assert_eq!(reply_for(b" DISCOVER"), None);
        assert_eq!(reply_for(b"OFFER"), None);
    }

    #[tokio::test]
    async fn test_responder_answers_unicast_probe() {
        let responder = DiscoveryResponder::bind(
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            Ipv4Addr::new(224, 0, 2, 62),
        )
        .unwrap();
        let addr = responder.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(responder.run(cancel.clone()));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"HELLO", addr).await.unwrap();
        client.send_to(DISCOVER_PROBE, addr).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("no offer received")
            .unwrap();
        assert_eq!(&buf[..len], OFFER_REPLY);
        assert_eq!(from, addr);

        // Exactly one reply: the HELLO datagram produced nothing.
        let extra =
            tokio::time::timeout(Duration::from_millis(100), client.recv_from(&mut buf)).await;
        assert!(extra.is_err());

        cancel.cancel();
        task.await.unwrap();
    }
}
