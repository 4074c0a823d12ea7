//! Blocking facade for embedding hosts.
//!
//! Mobile shells and other foreign callers get plain synchronous calls.
//! [`Tunnel`] owns a multi-thread tokio runtime and drives the async
//! [`TunnelController`] on it. Its methods block the calling thread and
//! must not be called from inside another tokio runtime.

use tokio::runtime::Runtime;
use tracing::Dispatch;

use hy2ctl_core::{ConfigError, LogSink};

pub use hy2ctl_core::bandwidth::{conv_bandwidth, string_to_bps};
pub use hy2ctl_core::ports::get_free_ports;

use crate::config::ClientOptions;
use crate::controller::TunnelController;
use crate::error::TunnelError;
use crate::transport::Connector;

pub struct Tunnel<C: Connector> {
    runtime: Runtime,
    controller: TunnelController<C>,
}

impl<C: Connector> Tunnel<C> {
    /// Facade with environment-derived options and the default log sink.
    pub fn new(connector: C) -> std::io::Result<Self> {
        Self::with_options(connector, ClientOptions::from_env(), LogSink::default())
    }

    pub fn with_options(
        connector: C,
        options: ClientOptions,
        log: LogSink,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("hy2ctl-tunnel")
            .build()?;
        Ok(Self {
            runtime,
            controller: TunnelController::with_options(connector, options, log),
        })
    }

    pub fn start_tunnel(&self, config_json: &str) -> Result<(), TunnelError> {
        self.runtime
            .block_on(self.controller.start(config_json.as_bytes()))
    }

    pub fn stop_tunnel(&self) {
        self.runtime.block_on(self.controller.stop());
    }

    pub fn core_state(&self) -> bool {
        self.controller.state()
    }

    pub fn test_config(&self, config_json: &str) -> Result<(), ConfigError> {
        self.controller.validate(config_json.as_bytes())
    }

    pub fn set_logger(&self, dispatch: Dispatch) {
        self.controller.log_sink().set_sink(dispatch);
    }

    pub fn disable_logging(&self) {
        self.controller.log_sink().disable();
    }

    pub fn enable_default_logging(&self) {
        self.controller.log_sink().enable_default();
    }

    pub const fn controller(&self) -> &TunnelController<C> {
        &self.controller
    }
}
