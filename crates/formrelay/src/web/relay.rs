//! One-shot datagram relay from the HTTP front end to the message receiver.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

use crate::error::{Error, Result};

/// Sends raw form bodies to the message receiver.
///
/// Each send resolves the target, opens a fresh socket and sends a single
/// datagram. Nothing is retried and no reply is expected.
#[derive(Debug, Clone)]
pub struct RelayClient {
    target: String,
}

impl RelayClient {
    /// Create a client that sends to `target` (`host:port`).
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// The `host:port` datagrams are sent to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send `payload` unmodified as one datagram.
    ///
    /// Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not resolve or the send fails.
    pub async fn send(&self, payload: &[u8]) -> Result<usize> {
        let addr = lookup_host(self.target.as_str())
            .await
            .map_err(|e| Error::relay(&self.target, e))?
            .next()
            .ok_or_else(|| Error::AddressResolve {
                addr: self.target.clone(),
            })?;

        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| Error::relay(&self.target, e))?;

        let sent = socket
            .send_to(payload, addr)
            .await
            .map_err(|e| Error::relay(&self.target, e))?;
        debug!(%addr, bytes = sent, "Relayed form data");
        Ok(sent)
    }
}
