//! Scriptable in-process transport for lifecycle tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use hy2ctl_core::TunnelConfig;
use hy2ctl_tunnel::{ClientOptions, Connection, Connector, HandshakeInfo, TransportError};

pub const VALID_CONFIG: &str = r#"{
    "server": "127.0.0.1:8443",
    "auth": "hunter2",
    "bandwidth": {"up": "20 mbps", "down": "100 mbps"}
}"#;

pub const LAZY_CONFIG: &str = r#"{"server": "127.0.0.1:8443", "auth": "hunter2", "lazy": true}"#;

#[derive(Debug, Default)]
pub struct MockState {
    /// Connect calls so far.
    pub attempts: AtomicU64,
    /// Fail this many leading connect calls.
    pub fail_first: AtomicU64,
    /// Drop this many established connections right after the handshake.
    pub drop_next: AtomicU64,
    /// Connections closed through `Connection::close`.
    pub closes: AtomicU64,
    /// Make `Connection::close` report an error.
    pub fail_close: AtomicBool,
    /// Make `connect` never finish.
    pub hang: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.state.attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.state.closes.load(Ordering::SeqCst)
    }
}

pub struct MockConnection {
    drop_now: bool,
    state: Arc<MockState>,
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(
        &self,
        config: &TunnelConfig,
    ) -> Result<(MockConnection, HandshakeInfo), TransportError> {
        let n = self.state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.hang.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if n <= self.state.fail_first.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!(
                "{}: refused attempt {n}",
                config.server.host
            )));
        }
        let drop_now = self
            .state
            .drop_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        Ok((
            MockConnection {
                drop_now,
                state: Arc::clone(&self.state),
            },
            HandshakeInfo {
                udp_enabled: true,
                tx_bytes: 1024 * n,
            },
        ))
    }
}

impl Connection for MockConnection {
    async fn closed(&mut self) -> TransportError {
        if self.drop_now {
            TransportError::Lost("dropped by test".into())
        } else {
            std::future::pending().await
        }
    }

    async fn close(self) -> Result<(), TransportError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            Err(TransportError::Close("socket already gone".into()))
        } else {
            Ok(())
        }
    }
}

/// Wait until the connector has been dialled `n` times.
pub async fn wait_for_attempts(connector: &MockConnector, n: u64) {
    while connector.attempts() < n {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Options with millisecond backoff so reconnect tests stay fast.
pub fn fast_options() -> ClientOptions {
    let mut options = ClientOptions::default();
    options.reconnect.initial_delay = Duration::from_millis(5);
    options.reconnect.max_delay = Duration::from_millis(50);
    options
}
