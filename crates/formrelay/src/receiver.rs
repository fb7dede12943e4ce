//! Datagram message receiver.
//!
//! Receives form bodies relayed by the HTTP front end, decodes them into
//! records and appends them to the record store, one datagram at a time.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::listener::{Listener, ListenerKind, ShutdownHandle};
use crate::record::{timestamp_now, Record};
use crate::storage::RecordStore;

/// UDP listener that persists every datagram it receives as a record.
///
/// Datagrams longer than the buffer are truncated by the socket; only the
/// first `buffer_size` bytes are decoded.
#[derive(Debug)]
pub struct MessageReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
    store: RecordStore,
    buffer_size: usize,
}

impl MessageReceiver {
    /// Bind the receiver to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind(addr: &str, store: RecordStore, buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::bind(addr, e))?;
        let local_addr = socket.local_addr().map_err(|e| Error::bind(addr, e))?;

        Ok(Self {
            socket,
            local_addr,
            store,
            buffer_size,
        })
    }

    /// The store this receiver writes to.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Decode one payload and append it to the store.
    ///
    /// A failed store write is logged and the record dropped; it does not
    /// stop the receiver.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid UTF-8.
    pub async fn handle_datagram(&self, payload: &[u8]) -> Result<()> {
        let record = Record::from_payload(payload)?;
        let timestamp = timestamp_now();
        info!(%timestamp, fields = record.len(), "Writing record to store");
        debug!(?record, "Decoded record");

        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || store.append(timestamp, record))
            .await
            .map_err(|e| Error::internal(format!("store task failed: {e}")))?;

        match written {
            Ok(entries) => debug!(entries, "Record stored"),
            Err(e) => error!("Cannot write to record store: {e}"),
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Listener for MessageReceiver {
    fn kind(&self) -> ListenerKind {
        ListenerKind::Receiver
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn run(self: Box<Self>, shutdown: ShutdownHandle) -> Result<()> {
        info!("Message receiver started on {}", self.local_addr);
        let mut buf = vec![0_u8; self.buffer_size];

        let result = loop {
            if shutdown.should_stop() {
                break Ok(());
            }

            let received = tokio::select! {
                () = shutdown.stopped() => break Ok(()),
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, peer) = match received {
                Ok(received) => received,
                Err(e) => break Err(Error::Receive(e)),
            };
            debug!(%peer, len, "Datagram received");

            if let Err(e) = self.handle_datagram(&buf[..len]).await {
                break Err(e);
            }
        };

        if let Err(e) = &result {
            error!("Message receiver error: {e}");
        }
        info!("Message receiver stopped");
        result
    }
}
