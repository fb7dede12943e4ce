//! Listener abstraction shared by the HTTP front end and the message receiver.
//!
//! Each listener runs one accept/receive loop until its [`ShutdownHandle`]
//! is stopped. The supervisor owns the handles and drives the loops as
//! independent tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;

/// The kind of listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// HTTP front end.
    Http,

    /// Datagram message receiver.
    Receiver,
}

impl std::fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Receiver => write!(f, "receiver"),
        }
    }
}

/// A bound listener ready to run its loop.
///
/// Implementors bind their socket on construction so that address errors
/// surface before any task is spawned, and report the bound address so an
/// ephemeral port can be discovered.
#[async_trait::async_trait]
pub trait Listener: Send + std::fmt::Debug {
    /// Get the kind of this listener.
    fn kind(&self) -> ListenerKind;

    /// The address the listener is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Run the loop until `shutdown` is stopped.
    ///
    /// The stop signal is checked between iterations. A loop waiting for
    /// the next request or datagram also wakes when the signal fires.
    ///
    /// # Errors
    ///
    /// Returns the error that terminated the loop early.
    async fn run(self: Box<Self>, shutdown: ShutdownHandle) -> Result<()>;
}

/// A cancellation handle observed by listener loops.
///
/// This is a lightweight, cloneable handle; stopping any clone stops them
/// all. Once stopped it stays stopped.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Create a new handle in the running state.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Signal every listener holding this handle to stop.
    pub fn stop(&self) {
        self.signal.send_replace(true);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        *self.signal.borrow()
    }

    /// Wait until the stop signal has been sent.
    ///
    /// Returns immediately if it already has.
    pub async fn stopped(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
