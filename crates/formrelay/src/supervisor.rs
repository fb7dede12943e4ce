//! Process supervisor.
//!
//! Runs the HTTP front end and the message receiver as independent tasks
//! and stops both when the process receives an interrupt.
//!
//! Lifecycle: `Idle → Running → ShuttingDown → Stopped`.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::listener::{Listener, ListenerKind, ShutdownHandle};
use crate::receiver::MessageReceiver;
use crate::storage::RecordStore;
use crate::web::{RelayClient, Site, WebFrontEnd};

/// Supervisor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Listeners are bound but not running.
    Idle,
    /// Both listener loops are running.
    Running,
    /// The stop signal has been sent; waiting for the loops to exit.
    ShuttingDown,
    /// All loops have exited.
    Stopped,
}

impl SupervisorState {
    /// Get the state name for messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::ShuttingDown => "ShuttingDown",
            Self::Stopped => "Stopped",
        }
    }

    /// Check if transition to the target state is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: SupervisorState) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::ShuttingDown)
                | (Self::ShuttingDown, Self::Stopped)
        )
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Owns the listeners and their shared stop signal.
#[derive(Debug)]
pub struct Supervisor {
    state: SupervisorState,
    shutdown: ShutdownHandle,
    pending: Vec<Box<dyn Listener>>,
    addrs: Vec<(ListenerKind, SocketAddr)>,
    tasks: Vec<(ListenerKind, JoinHandle<Result<()>>)>,
}

impl Supervisor {
    /// Create a supervisor with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            shutdown: ShutdownHandle::new(),
            pending: Vec::new(),
            addrs: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Bind the message receiver and the HTTP front end described by
    /// `config`.
    ///
    /// The receiver is bound first and the front end relays to the address
    /// it actually bound. A host name that resolves to several addresses
    /// therefore cannot split the two, and an ephemeral relay port works.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created or either address
    /// cannot be bound.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = RecordStore::open(config.store_path())?;
        let receiver =
            MessageReceiver::bind(&config.relay_addr(), store, config.relay.buffer_size).await?;

        let target = relay_target(receiver.local_addr());
        let front = WebFrontEnd::bind(
            &config.http_addr(),
            Site::from_config(&config.http),
            RelayClient::new(target.to_string()),
        )
        .await?;

        let mut supervisor = Self::new();
        supervisor.add(Box::new(front));
        supervisor.add(Box::new(receiver));
        Ok(supervisor)
    }

    /// Add a bound listener. It starts with the next call to [`start`].
    ///
    /// [`start`]: Self::start
    pub fn add(&mut self, listener: Box<dyn Listener>) {
        self.addrs.push((listener.kind(), listener.local_addr()));
        self.pending.push(listener);
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// A handle that stops every listener when triggered.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// The bound address of the first listener of `kind`.
    #[must_use]
    pub fn local_addr(&self, kind: ListenerKind) -> Option<SocketAddr> {
        self.addrs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, addr)| *addr)
    }

    /// Get the number of managed listeners.
    #[must_use]
    pub fn count(&self) -> usize {
        self.addrs.len()
    }

    fn transition(&mut self, target: SupervisorState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: self.state.name(),
                to: target.name(),
            });
        }
        self.state = target;
        Ok(())
    }

    /// Spawn every listener loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor is not idle.
    pub fn start(&mut self) -> Result<()> {
        self.transition(SupervisorState::Running)?;

        for listener in self.pending.drain(..) {
            let kind = listener.kind();
            let shutdown = self.shutdown.clone();
            info!(listener = %kind, addr = %listener.local_addr(), "Starting listener");
            self.tasks.push((kind, tokio::spawn(listener.run(shutdown))));
        }
        Ok(())
    }

    /// Stop every listener and wait for all of them to exit.
    ///
    /// Listener errors and panics are logged; they do not fail the
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor is not running.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.transition(SupervisorState::ShuttingDown)?;
        info!("Shutting down...");
        self.shutdown.stop();

        for (kind, task) in self.tasks.drain(..) {
            match task.await {
                Ok(Ok(())) => info!(listener = %kind, "Listener exited"),
                Ok(Err(e)) => warn!(listener = %kind, "Listener exited with error: {e}"),
                Err(e) => error!(listener = %kind, "Listener task failed: {e}"),
            }
        }

        self.transition(SupervisorState::Stopped)
    }

    /// Start the listeners, wait for `signal`, then shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor is not idle.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.start()?;
        signal.await;
        self.shutdown().await
    }

    /// Start the listeners and run until Ctrl-C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handlers cannot be installed or the
    /// supervisor is not idle.
    pub async fn run_until_signal(&mut self) -> Result<()> {
        self.start()?;
        wait_for_signal().await?;
        self.shutdown().await
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// The address to relay to for a receiver bound at `bound`. A wildcard
/// bind is reached through loopback.
fn relay_target(bound: SocketAddr) -> SocketAddr {
    let mut target = bound;
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => target.set_ip(Ipv4Addr::LOCALHOST.into()),
        IpAddr::V6(ip) if ip.is_unspecified() => target.set_ip(Ipv6Addr::LOCALHOST.into()),
        _ => {}
    }
    target
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Interrupt received");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.http.host = "127.0.0.1".to_string();
        config.http.port = 0;
        config.http.site_root = dir.to_path_buf();
        config.relay.host = "127.0.0.1".to_string();
        config.relay.port = 0;
        config.storage.path = dir.join("storage").join("data.json");
        config
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SupervisorState::Idle.to_string(), "Idle");
        assert_eq!(SupervisorState::ShuttingDown.to_string(), "ShuttingDown");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(SupervisorState::Idle.can_transition_to(SupervisorState::Running));
        assert!(SupervisorState::Running.can_transition_to(SupervisorState::ShuttingDown));
        assert!(SupervisorState::ShuttingDown.can_transition_to(SupervisorState::Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!SupervisorState::Idle.can_transition_to(SupervisorState::Stopped));
        assert!(!SupervisorState::Running.can_transition_to(SupervisorState::Idle));
        assert!(!SupervisorState::Stopped.can_transition_to(SupervisorState::Running));
        assert!(!SupervisorState::Idle.can_transition_to(SupervisorState::ShuttingDown));
    }

    #[tokio::test]
    async fn test_shutdown_before_start_fails() {
        let mut supervisor = Supervisor::new();
        let err = supervisor.shutdown().await.unwrap_err();

        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(supervisor.state(), SupervisorState::Idle);
    }

    #[tokio::test]
    async fn test_from_config_binds_both_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let supervisor = Supervisor::from_config(&config).await.unwrap();

        assert_eq!(supervisor.count(), 2);
        assert!(supervisor.local_addr(ListenerKind::Http).is_some());
        assert!(supervisor.local_addr(ListenerKind::Receiver).is_some());
        assert!(config.storage.path.exists());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = Supervisor::from_config(&test_config(dir.path()))
            .await
            .unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Idle);

        supervisor.start().unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Running);
        assert!(supervisor.start().is_err());

        tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
            .await
            .expect("listeners should stop while idle")
            .unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn test_run_until_signal_future() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = Supervisor::from_config(&test_config(dir.path()))
            .await
            .unwrap();

        let handle = supervisor.shutdown_handle();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            supervisor.run_until(tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        assert!(handle.should_stop());
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[test]
    fn test_relay_target_for_wildcard_bind() {
        let v4: SocketAddr = "0.0.0.0:5000".parse().unwrap();
        assert_eq!(relay_target(v4), "127.0.0.1:5000".parse().unwrap());

        let v6: SocketAddr = "[::]:5000".parse().unwrap();
        assert_eq!(relay_target(v6), "[::1]:5000".parse().unwrap());

        let bound: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        assert_eq!(relay_target(bound), bound);
    }

    #[tokio::test]
    async fn test_relays_to_bound_receiver_address() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.relay.host = "localhost".to_string();

        let mut supervisor = Supervisor::from_config(&config).await.unwrap();
        let http = supervisor.local_addr(ListenerKind::Http).unwrap();
        supervisor.start().unwrap();

        let body = "name=Alice";
        let mut stream = tokio::net::TcpStream::connect(http).await.unwrap();
        stream
            .write_all(
                format!(
                    "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 302"));

        let store = RecordStore::open(config.store_path()).unwrap();
        let mut stored = store.load();
        for _ in 0..100 {
            if !stored.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            stored = store.load();
        }
        let (_, record) = stored.iter().next().expect("record should be stored");
        assert_eq!(record.get("name"), Some("Alice"));

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config(dir.path());
        config.http.port = occupied.local_addr().unwrap().port();

        let err = Supervisor::from_config(&config).await.unwrap_err();
        assert!(matches!(err, Error::Bind { .. }));
    }
}
