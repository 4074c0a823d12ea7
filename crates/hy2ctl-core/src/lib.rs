//! hy2ctl Core Library
//!
//! Shared functionality for hy2ctl components:
//! - Tunnel config decoding and validation
//! - Bandwidth string conversion
//! - Free local port discovery
//! - Replaceable logging sinks
//! - Common error types

pub mod bandwidth;
pub mod config;
pub mod error;
pub mod log_sink;
pub mod memory;
pub mod ports;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tracing_init;

pub use config::{ParsedConfig, TunnelConfig};
pub use error::{BandwidthError, ConfigError, Error, Result};
pub use log_sink::LogSink;
