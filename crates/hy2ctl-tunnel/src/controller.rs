//! Tunnel lifecycle controller.
//!
//! [`TunnelController`] owns at most one [`ReconnectableClient`] and a
//! published `running` flag. `start` and `stop` serialize on one mutex, but
//! `start` drops it while the first connection is dialled so that `stop`
//! can cancel a slow or hung attempt. `running` is only set once that
//! attempt succeeded; `state` and `validate` never take the mutex.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use hy2ctl_core::{ConfigError, LogSink, config, memory};

use crate::client::{ClientHandle, ReconnectableClient};
use crate::config::ClientOptions;
use crate::error::{TransportError, TunnelError};
use crate::transport::{Connector, HandshakeEvent};

/// The installed client, tagged so a `start` can tell whether a `stop`
/// (and possibly another `start`) replaced it while it was dialling.
struct Active {
    id: u64,
    client: ReconnectableClient,
}

pub struct TunnelController<C: Connector> {
    connector: Arc<C>,
    options: ClientOptions,
    log: LogSink,
    client: Mutex<Option<Active>>,
    next_id: AtomicU64,
    running: watch::Sender<bool>,
}

impl<C: Connector> TunnelController<C> {
    /// Controller with default options and the default log sink.
    pub fn new(connector: C) -> Self {
        Self::with_options(connector, ClientOptions::default(), LogSink::default())
    }

    pub fn with_options(connector: C, options: ClientOptions, log: LogSink) -> Self {
        Self {
            connector: Arc::new(connector),
            options,
            log,
            client: Mutex::new(None),
            next_id: AtomicU64::new(0),
            running: watch::Sender::new(false),
        }
    }

    /// Parse `raw`, build a client and mark the tunnel running.
    ///
    /// Fails without changing state on a bad config, a client that cannot
    /// be constructed, or when a tunnel is already running or starting. A
    /// `stop` issued while the first connection is in flight cancels it and
    /// this returns `Construction(Shutdown)`.
    pub async fn start(&self, raw: &[u8]) -> Result<(), TunnelError> {
        memory::release_unused_memory();
        self.log.emit(|| info!("Starting tunnel"));

        let parsed = config::parse(raw).inspect_err(|e| {
            self.log
                .emit(|| error!(error = %e, "Error while parsing config"));
        })?;
        let lazy = parsed.lazy;

        let (id, ready) = {
            let mut slot = self.client.lock().await;
            if slot.is_some() {
                self.log
                    .emit(|| warn!("Start requested while tunnel is running"));
                return Err(TunnelError::AlreadyRunning);
            }

            let events = self.spawn_handshake_logger();
            let (client, ready) = ReconnectableClient::spawn(
                Arc::clone(&self.connector),
                parsed.config,
                &self.options,
                events,
                lazy,
                self.log.clone(),
            );
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            *slot = Some(Active { id, client });
            (id, ready)
        };

        let outcome = ready.wait().await;

        let mut slot = self.client.lock().await;
        let ours = slot.as_ref().is_some_and(|active| active.id == id);
        let err = match outcome {
            Ok(()) if ours => {
                self.running.send_replace(true);
                self.log.emit(|| info!(lazy, "Tunnel started successfully"));
                return Ok(());
            }
            Ok(()) => TransportError::Shutdown,
            Err(e) => {
                let failed = if ours { slot.take() } else { None };
                if let Some(Active { client, .. }) = failed
                    && let Err(close) = client.close().await
                {
                    self.log
                        .emit(|| debug!(error = %close, "Ignoring error while closing client"));
                }
                e
            }
        };
        self.log
            .emit(|| error!(error = %err, "Error while starting client"));
        Err(TunnelError::Construction(err))
    }

    /// Close the client, if any, and mark the tunnel stopped.
    ///
    /// Always succeeds; close errors are logged and dropped.
    pub async fn stop(&self) {
        self.log.emit(|| info!("Stopping tunnel"));

        let mut slot = self.client.lock().await;
        if let Some(Active { client, .. }) = slot.take() {
            match client.close().await {
                Ok(()) => self.log.emit(|| info!("Tunnel shutdown successful")),
                Err(e) => self
                    .log
                    .emit(|| debug!(error = %e, "Ignoring error while closing client")),
            }
        }
        self.running.send_replace(false);
    }

    /// Whether a started client is currently installed.
    pub fn state(&self) -> bool {
        *self.running.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    /// Check a payload without starting anything.
    pub fn validate(&self, raw: &[u8]) -> Result<(), ConfigError> {
        config::validate(raw)
    }

    /// Handle to the running client.
    pub async fn client(&self) -> Option<ClientHandle> {
        self.client
            .lock()
            .await
            .as_ref()
            .map(|active| active.client.handle())
    }

    pub const fn log_sink(&self) -> &LogSink {
        &self.log
    }

    /// Channel whose receiving end logs every handshake. The logging task
    /// ends once the client drops its sender.
    fn spawn_handshake_logger(&self) -> mpsc::Sender<HandshakeEvent> {
        let (tx, mut rx) = mpsc::channel(self.options.event_capacity.max(1));
        let log = self.log.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log_handshake(&log, &event);
            }
        });
        tx
    }
}

/// Record one successful (re)connection.
pub fn log_handshake(log: &LogSink, event: &HandshakeEvent) {
    log.emit(|| {
        info!(
            udp_enabled = event.info.udp_enabled,
            tx = event.info.tx_bytes,
            count = event.count,
            "Connected to server"
        );
    });
}
