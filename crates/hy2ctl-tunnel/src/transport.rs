//! Capability traits for the external tunnel transport engine.
//!
//! The engine owns the wire protocol. This crate only needs to open a
//! connection from a validated [`TunnelConfig`], learn when it drops, and
//! close it.

use std::future::Future;

use hy2ctl_core::TunnelConfig;

use crate::error::TransportError;

/// Details reported by the engine after a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeInfo {
    /// Whether the server allows UDP relay.
    pub udp_enabled: bool,
    /// Bytes transmitted so far, as reported by the engine.
    pub tx_bytes: u64,
}

/// A handshake paired with the number of successful connections so far
/// (the first connection is 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeEvent {
    pub info: HandshakeInfo,
    pub count: u64,
}

/// Opens connections to the tunnel server.
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(
        &self,
        config: &TunnelConfig,
    ) -> impl Future<Output = Result<(Self::Connection, HandshakeInfo), TransportError>> + Send;
}

/// One established connection.
pub trait Connection: Send + 'static {
    /// Resolves when the connection is lost, with the reason.
    fn closed(&mut self) -> impl Future<Output = TransportError> + Send;

    /// Close the connection and release its resources.
    fn close(self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
