//! Tunnel error types.

use hy2ctl_core::ConfigError;

/// Errors reported by a transport engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Connection lost: {0}")]
    Lost(String),

    #[error("Close error: {0}")]
    Close(String),

    #[error("Client is shutting down")]
    Shutdown,
}

/// Errors returned by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to start client: {0}")]
    Construction(#[source] TransportError),

    #[error("Tunnel is already running")]
    AlreadyRunning,
}
