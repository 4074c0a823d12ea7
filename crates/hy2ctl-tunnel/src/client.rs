//! Reconnecting wrapper around a transport [`Connector`].
//!
//! A [`ReconnectableClient`] keeps one connection to the tunnel server alive
//! from a background task. Every successful handshake bumps a connection
//! counter and pushes a [`HandshakeEvent`]; a lost connection is retried with
//! exponential backoff until the policy gives up or the client is closed.
//!
//! The first dial also runs on the background task, so closing the client
//! cancels it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use hy2ctl_core::{LogSink, TunnelConfig};

use crate::config::{Backoff, ClientOptions};
use crate::error::TransportError;
use crate::transport::{Connection, Connector, HandshakeEvent};

/// Owner of the background connection task.
///
/// Dropping the client without [`close`](Self::close) also stops the task,
/// but without waiting for the live connection to shut down.
#[derive(Debug)]
pub struct ReconnectableClient {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), TransportError>>,
    handle: ClientHandle,
}

/// Cheap, clonable view of a running client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    first_use: Arc<Notify>,
    connections: watch::Receiver<u64>,
}

impl ClientHandle {
    /// Trigger the first connection of a lazy client. No-op otherwise.
    pub fn connect_now(&self) {
        self.first_use.notify_one();
    }

    /// Successful handshakes so far.
    pub fn connections(&self) -> u64 {
        *self.connections.borrow()
    }

    /// Wait until at least `n` handshakes have completed.
    ///
    /// Returns `false` if the client stopped first.
    pub async fn wait_for_connections(&self, n: u64) -> bool {
        let mut rx = self.connections.clone();
        rx.wait_for(|count| *count >= n).await.is_ok()
    }
}

/// Outcome of a client's first connection.
///
/// Resolves once the first handshake completed, right away for a lazy
/// client, or with [`TransportError::Shutdown`] if the client was closed
/// before it got there.
#[derive(Debug)]
pub struct Ready(oneshot::Receiver<Result<(), TransportError>>);

impl Ready {
    pub async fn wait(self) -> Result<(), TransportError> {
        self.0.await.unwrap_or(Err(TransportError::Shutdown))
    }
}

impl ReconnectableClient {
    /// Start the background task for a new client.
    ///
    /// With `lazy == false` the task dials immediately and the returned
    /// [`Ready`] reports whether that first attempt succeeded; a failed
    /// first attempt is not retried. With `lazy == true` nothing is dialled
    /// until [`ClientHandle::connect_now`].
    pub fn spawn<C: Connector>(
        connector: Arc<C>,
        config: TunnelConfig,
        options: &ClientOptions,
        events: mpsc::Sender<HandshakeEvent>,
        lazy: bool,
        log: LogSink,
    ) -> (Self, Ready) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (count_tx, count_rx) = watch::channel(0_u64);
        let (ready_tx, ready_rx) = oneshot::channel();
        let first_use = Arc::new(Notify::new());

        let worker = Worker {
            connector,
            config,
            backoff: options.reconnect.backoff(),
            stable_after: options.stable_after,
            events,
            count: 0,
            connections: count_tx,
            log,
        };
        let task = tokio::spawn(worker.run(lazy, ready_tx, Arc::clone(&first_use), shutdown_rx));

        let client = Self {
            shutdown: shutdown_tx,
            task,
            handle: ClientHandle {
                first_use,
                connections: count_rx,
            },
        };
        (client, Ready(ready_rx))
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Stop reconnecting and close the live connection, if any.
    ///
    /// Also cancels a first dial that is still in flight.
    pub async fn close(self) -> Result<(), TransportError> {
        self.shutdown.send_replace(true);
        match self.task.await {
            Ok(Ok(()) | Err(TransportError::Shutdown)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(TransportError::Close(e.to_string())),
        }
    }
}

struct Worker<C: Connector> {
    connector: Arc<C>,
    config: TunnelConfig,
    backoff: Backoff,
    stable_after: Duration,
    events: mpsc::Sender<HandshakeEvent>,
    count: u64,
    connections: watch::Sender<u64>,
    log: LogSink,
}

impl<C: Connector> Worker<C> {
    /// Dial once and publish the handshake.
    async fn connect_once(&mut self) -> Result<C::Connection, TransportError> {
        let (conn, info) = self.connector.connect(&self.config).await?;
        self.count += 1;
        self.connections.send_replace(self.count);

        // Never wait on the consumer; a full queue only costs a log line.
        let count = self.count;
        if let Err(e) = self.events.try_send(HandshakeEvent { info, count }) {
            self.log
                .emit(|| debug!(error = %e, count, "Dropped handshake event"));
        }
        Ok(conn)
    }

    /// First connection of an eager client. `None` means the outcome was
    /// reported through `ready` and the task should end.
    async fn first_connection(
        &mut self,
        ready: oneshot::Sender<Result<(), TransportError>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<C::Connection> {
        let dialed = tokio::select! {
            result = self.connect_once() => result,
            _ = shutdown.changed() => Err(TransportError::Shutdown),
        };
        match dialed {
            Ok(conn) => {
                let _ = ready.send(Ok(()));
                Some(conn)
            }
            Err(e) => {
                self.log.emit(|| debug!(error = %e, "First connection failed"));
                let _ = ready.send(Err(e));
                None
            }
        }
    }

    async fn run(
        mut self,
        lazy: bool,
        ready: oneshot::Sender<Result<(), TransportError>>,
        first_use: Arc<Notify>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let mut current = if lazy {
            self.log
                .emit(|| debug!("Lazy client, deferring first connection"));
            let _ = ready.send(Ok(()));
            tokio::select! {
                () = first_use.notified() => {}
                _ = shutdown.changed() => return Ok(()),
            }
            None
        } else {
            match self.first_connection(ready, &mut shutdown).await {
                Some(conn) => Some(conn),
                None => return Ok(()),
            }
        };

        loop {
            let mut conn = match current.take() {
                Some(conn) => conn,
                None => {
                    let dialed = tokio::select! {
                        result = self.connect_once() => result,
                        _ = shutdown.changed() => return Ok(()),
                    };
                    match dialed {
                        Ok(conn) => conn,
                        Err(e) => {
                            self.wait_before_retry(e, &mut shutdown).await?;
                            continue;
                        }
                    }
                }
            };

            let started = Instant::now();
            let lost = tokio::select! {
                reason = conn.closed() => Some(reason),
                _ = shutdown.changed() => None,
            };
            let Some(reason) = lost else {
                return conn.close().await;
            };
            if let Err(e) = conn.close().await {
                self.log
                    .emit(|| debug!(error = %e, "Error closing lost connection"));
            }

            if started.elapsed() >= self.stable_after {
                self.backoff.reset();
            }
            self.wait_before_retry(reason, &mut shutdown).await?;
        }
    }

    /// Sleep before the next attempt. Errors out when the policy is
    /// exhausted; returns `Shutdown` if the client is closed meanwhile.
    async fn wait_before_retry(
        &mut self,
        reason: TransportError,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let attempt = self.backoff.attempt();
        let Some(delay) = self.backoff.next_delay() else {
            self.log
                .emit(|| error!(error = %reason, attempt, "Max reconnect attempts reached"));
            return Err(reason);
        };

        self.log.emit(|| {
            warn!(
                error = %reason,
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting"
            );
        });

        tokio::select! {
            () = sleep(delay) => Ok(()),
            _ = shutdown.changed() => {
                self.log.emit(|| info!("Client shutting down during reconnect wait"));
                Err(TransportError::Shutdown)
            }
        }
    }
}
