//! hy2ctl Tunnel Library
//!
//! Lifecycle control for a single outbound tunnel:
//! - Capability traits for the external transport engine
//! - Reconnecting client with exponential backoff
//! - `TunnelController` for start / stop / state / validate
//! - Blocking facade for embedding hosts

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod transport;

pub use client::{ClientHandle, ReconnectableClient, Ready};
pub use config::{Backoff, ClientOptions, ReconnectPolicy};
pub use controller::TunnelController;
pub use error::{TransportError, TunnelError};
pub use host::Tunnel;
pub use transport::{Connection, Connector, HandshakeEvent, HandshakeInfo};
