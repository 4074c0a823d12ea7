#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the blocking host facade.

mod common;

use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use hy2ctl_core::testing::CapturedLogs;
use hy2ctl_core::{BandwidthError, ConfigError, LogSink};
use hy2ctl_tunnel::host::{self, Tunnel};
use hy2ctl_tunnel::{ClientOptions, TransportError, TunnelError};
use serde_json::json;

use common::{MockConnector, VALID_CONFIG};

fn tunnel(connector: MockConnector) -> Tunnel<MockConnector> {
    Tunnel::with_options(connector, ClientOptions::default(), LogSink::disabled()).unwrap()
}

#[test]
fn blocking_start_stop_cycle() {
    let connector = MockConnector::new();
    let tunnel = tunnel(connector.clone());

    assert!(!tunnel.core_state());
    tunnel.start_tunnel(VALID_CONFIG).unwrap();
    assert!(tunnel.core_state());
    tunnel.stop_tunnel();
    assert!(!tunnel.core_state());
    tunnel.stop_tunnel();
    assert!(!tunnel.core_state());

    // Restart after a full stop is allowed.
    tunnel.start_tunnel(VALID_CONFIG).unwrap();
    assert!(tunnel.core_state());
    tunnel.stop_tunnel();
    assert_eq!(connector.attempts(), 2);
}

#[test]
fn start_errors_are_returned_not_fatal() {
    let tunnel = tunnel(MockConnector::new());

    assert!(matches!(
        tunnel.start_tunnel("nope"),
        Err(TunnelError::Config(ConfigError::Malformed(_)))
    ));
    assert!(matches!(
        tunnel.start_tunnel(r#"{"server":"h"}"#),
        Err(TunnelError::Config(ConfigError::Invalid { .. }))
    ));
    assert!(!tunnel.core_state());
}

#[test]
fn test_config_reports_both_error_kinds() {
    let tunnel = tunnel(MockConnector::new());

    assert!(tunnel.test_config(VALID_CONFIG).is_ok());
    assert!(matches!(
        tunnel.test_config("{"),
        Err(ConfigError::Malformed(_))
    ));
    let err = tunnel
        .test_config(r#"{"server":"h","auth":"a","bandwidth":{"down":"abc"}}"#)
        .unwrap_err();
    assert_eq!(err.field(), Some("bandwidth.down"));
}

#[test]
fn state_is_readable_from_other_threads() {
    let tunnel = Arc::new(tunnel(MockConnector::new()));
    tunnel.start_tunnel(VALID_CONFIG).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let tunnel = Arc::clone(&tunnel);
            thread::spawn(move || tunnel.core_state())
        })
        .collect();
    for reader in readers {
        assert!(reader.join().unwrap());
    }

    tunnel.stop_tunnel();
    assert!(!tunnel.core_state());
}

#[test]
fn logger_controls() {
    let logs = CapturedLogs::new();
    let tunnel = tunnel(MockConnector::new());

    tunnel.set_logger(logs.dispatch());
    assert!(logs.contents().contains("Custom logger installed"));

    tunnel.disable_logging();
    logs.clear();
    tunnel.start_tunnel(VALID_CONFIG).unwrap();
    tunnel.stop_tunnel();
    assert!(logs.contents().is_empty());

    tunnel.enable_default_logging();
    assert!(tunnel.controller().log_sink().is_enabled());
}

#[test]
fn default_logging_resumes_after_disable() {
    let logs = CapturedLogs::new();
    let tunnel = Tunnel::with_options(
        MockConnector::new(),
        ClientOptions::default(),
        LogSink::with_default_writer(logs.clone()),
    )
    .unwrap();
    assert!(logs.contents().contains("Logger initialized"));

    tunnel.disable_logging();
    logs.clear();
    tunnel.start_tunnel(VALID_CONFIG).unwrap();
    tunnel.stop_tunnel();
    assert!(logs.contents().is_empty());

    tunnel.enable_default_logging();
    tunnel.start_tunnel(VALID_CONFIG).unwrap();
    tunnel.stop_tunnel();
    let out = logs.contents();
    assert!(out.contains("Default logging re-enabled"), "{out}");
    assert!(out.contains("Starting tunnel"), "{out}");
    assert!(out.contains("Tunnel shutdown successful"), "{out}");
}

#[test]
fn stop_unblocks_a_pending_start() {
    let connector = MockConnector::new();
    connector.state.hang.store(true, Ordering::SeqCst);
    let tunnel = Arc::new(tunnel(connector.clone()));

    let starter = {
        let tunnel = Arc::clone(&tunnel);
        thread::spawn(move || tunnel.start_tunnel(VALID_CONFIG))
    };
    while connector.attempts() == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    tunnel.stop_tunnel();
    let result = starter.join().unwrap();
    assert!(matches!(
        result,
        Err(TunnelError::Construction(TransportError::Shutdown))
    ));
    assert!(!tunnel.core_state());
}

#[test]
fn utility_bridge() {
    assert_eq!(host::string_to_bps("1 mbps"), Ok(125_000));
    assert_eq!(host::string_to_bps("1 gbps"), Ok(125_000_000));
    assert_eq!(host::conv_bandwidth(&json!("100 mbps")), Ok(12_500_000));
    assert_eq!(host::conv_bandwidth(&json!(4096)), Ok(4096));
    assert_eq!(
        host::conv_bandwidth(&json!(null)),
        Err(BandwidthError::InvalidType("null"))
    );

    let ports = host::get_free_ports(5).unwrap();
    assert_eq!(ports.len(), 5);
    for port in ports {
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
    }
}
