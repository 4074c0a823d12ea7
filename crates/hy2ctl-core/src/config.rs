//! Tunnel configuration decoding and validation.
//!
//! A config payload is decoded in two stages:
//! 1. JSON is deserialized into [`ClientConfigFile`], a loose mirror of the
//!    document where every field is optional.
//! 2. [`ClientConfigFile::build`] checks semantics and derives the final
//!    [`TunnelConfig`] (addresses parsed, bandwidth resolved to bytes/sec).
//!
//! Neither stage touches the network or global state; [`load`] is the only
//! entry point that reads from disk.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::bandwidth::conv_bandwidth;
use crate::error::ConfigError;

/// Port used when the server address carries none.
pub const DEFAULT_SERVER_PORT: u16 = 443;

const MIN_RECEIVE_WINDOW: u64 = 16_384;
const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(4);
const MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(2);
const MAX_KEEP_ALIVE: Duration = Duration::from_secs(60);
const MIN_HOP_INTERVAL: Duration = Duration::from_secs(5);
const MIN_SALAMANDER_PASSWORD_LEN: usize = 4;

/// Raw config document as supplied by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigFile {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(default)]
    pub quic: QuicSection,
    #[serde(default)]
    pub bandwidth: BandwidthSection,
    #[serde(default)]
    pub obfs: ObfsSection,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub fast_open: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsSection {
    #[serde(default)]
    pub sni: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default, rename = "pinSHA256")]
    pub pin_sha256: String,
    #[serde(default)]
    pub ca: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuicSection {
    #[serde(default)]
    pub init_stream_receive_window: u64,
    #[serde(default)]
    pub max_stream_receive_window: u64,
    #[serde(default)]
    pub init_conn_receive_window: u64,
    #[serde(default)]
    pub max_conn_receive_window: u64,
    #[serde(default)]
    pub max_idle_timeout: Option<String>,
    #[serde(default)]
    pub keep_alive_period: Option<String>,
    #[serde(default, rename = "disablePathMTUDiscovery")]
    pub disable_path_mtu_discovery: bool,
}

/// Bandwidth values stay untyped until the build step so that a bad unit
/// is reported as a semantic error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BandwidthSection {
    #[serde(default)]
    pub up: Option<Value>,
    #[serde(default)]
    pub down: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObfsSection {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub salamander: SalamanderSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalamanderSection {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportSection {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub udp: UdpTransportSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UdpTransportSection {
    #[serde(default)]
    pub hop_interval: Option<String>,
}

/// Top-level payload: the transport document plus the `lazy` switch.
#[derive(Debug, Clone, Default, Deserialize)]
struct Payload {
    #[serde(flatten)]
    transport: ClientConfigFile,
    #[serde(default)]
    lazy: bool,
}

/// Validated tunnel configuration handed to the transport engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    pub server: ServerAddr,
    pub auth: String,
    pub tls: TlsOptions,
    pub quic: QuicOptions,
    pub bandwidth: BandwidthHints,
    pub obfs: Obfuscation,
    pub transport: TransportOptions,
    pub fast_open: bool,
}

/// Server host plus the set of ports the client may dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub ports: Vec<PortRange>,
}

/// Inclusive port range. A single port has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl ServerAddr {
    /// Whether more than one port is available for port hopping.
    pub fn is_port_hopping(&self) -> bool {
        self.ports.len() > 1 || self.ports.iter().any(|r| r.start != r.end)
    }

    /// First port in the set, used for the initial dial.
    pub fn first_port(&self) -> u16 {
        self.ports.first().map_or(DEFAULT_SERVER_PORT, |r| r.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    pub sni: String,
    pub insecure: bool,
    pub pin_sha256: Option<[u8; 32]>,
    pub ca: Option<PathBuf>,
}

/// QUIC tuning. Zero windows and `None` durations leave the engine default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuicOptions {
    pub init_stream_receive_window: u64,
    pub max_stream_receive_window: u64,
    pub init_conn_receive_window: u64,
    pub max_conn_receive_window: u64,
    pub max_idle_timeout: Option<Duration>,
    pub keep_alive_period: Option<Duration>,
    pub disable_path_mtu_discovery: bool,
}

/// Bandwidth hints in bytes per second. Zero means unspecified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandwidthHints {
    pub up_bps: u64,
    pub down_bps: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Obfuscation {
    #[default]
    None,
    Salamander {
        password: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub hop_interval: Option<Duration>,
}

/// Output of [`parse`]: the tunnel config and whether connecting is deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfig {
    pub config: TunnelConfig,
    pub lazy: bool,
}

/// Decode and validate a raw config payload.
pub fn parse(raw: &[u8]) -> Result<ParsedConfig, ConfigError> {
    let payload: Payload = serde_json::from_slice(raw).map_err(ConfigError::Malformed)?;
    let config = payload.transport.build()?;
    Ok(ParsedConfig {
        config,
        lazy: payload.lazy,
    })
}

/// Validate a payload without keeping the result.
pub fn validate(raw: &[u8]) -> Result<(), ConfigError> {
    parse(raw).map(drop)
}

/// Read a payload from `path` and [`parse`] it.
pub fn load(path: &Path) -> crate::Result<ParsedConfig> {
    let raw = std::fs::read(path)?;
    Ok(parse(&raw)?)
}

impl ClientConfigFile {
    /// Derive the final [`TunnelConfig`], checking every field.
    pub fn build(&self) -> Result<TunnelConfig, ConfigError> {
        let server = parse_server_addr(&self.server)?;
        if self.auth.is_empty() {
            return Err(ConfigError::invalid("auth", "empty auth"));
        }
        let tls = self.build_tls(&server)?;
        let quic = self.quic.build()?;
        let bandwidth = self.bandwidth.build()?;
        let obfs = self.obfs.build()?;
        let transport = self.transport.build()?;

        Ok(TunnelConfig {
            server,
            auth: self.auth.clone(),
            tls,
            quic,
            bandwidth,
            obfs,
            transport,
            fast_open: self.fast_open,
        })
    }

    fn build_tls(&self, server: &ServerAddr) -> Result<TlsOptions, ConfigError> {
        let sni = if self.tls.sni.is_empty() {
            server.host.clone()
        } else {
            self.tls.sni.clone()
        };
        let pin_sha256 = if self.tls.pin_sha256.is_empty() {
            None
        } else {
            Some(parse_pin_sha256(&self.tls.pin_sha256)?)
        };
        let ca = (!self.tls.ca.is_empty()).then(|| PathBuf::from(&self.tls.ca));
        Ok(TlsOptions {
            sni,
            insecure: self.tls.insecure,
            pin_sha256,
            ca,
        })
    }
}

impl QuicSection {
    fn build(&self) -> Result<QuicOptions, ConfigError> {
        check_window(
            "quic.initStreamReceiveWindow",
            self.init_stream_receive_window,
        )?;
        check_window("quic.maxStreamReceiveWindow", self.max_stream_receive_window)?;
        check_window("quic.initConnReceiveWindow", self.init_conn_receive_window)?;
        check_window("quic.maxConnReceiveWindow", self.max_conn_receive_window)?;
        check_window_order(
            "quic.maxStreamReceiveWindow",
            self.init_stream_receive_window,
            self.max_stream_receive_window,
        )?;
        check_window_order(
            "quic.maxConnReceiveWindow",
            self.init_conn_receive_window,
            self.max_conn_receive_window,
        )?;

        let max_idle_timeout = parse_bounded_duration(
            "quic.maxIdleTimeout",
            self.max_idle_timeout.as_deref(),
            MIN_IDLE_TIMEOUT,
            Some(MAX_IDLE_TIMEOUT),
        )?;
        let keep_alive_period = parse_bounded_duration(
            "quic.keepAlivePeriod",
            self.keep_alive_period.as_deref(),
            MIN_KEEP_ALIVE,
            Some(MAX_KEEP_ALIVE),
        )?;

        Ok(QuicOptions {
            init_stream_receive_window: self.init_stream_receive_window,
            max_stream_receive_window: self.max_stream_receive_window,
            init_conn_receive_window: self.init_conn_receive_window,
            max_conn_receive_window: self.max_conn_receive_window,
            max_idle_timeout,
            keep_alive_period,
            disable_path_mtu_discovery: self.disable_path_mtu_discovery,
        })
    }
}

impl BandwidthSection {
    fn build(&self) -> Result<BandwidthHints, ConfigError> {
        let convert = |field: &str, value: Option<&Value>| {
            value.map_or(Ok(0), |v| {
                conv_bandwidth(v).map_err(|e| ConfigError::invalid(field, e.to_string()))
            })
        };
        Ok(BandwidthHints {
            up_bps: convert("bandwidth.up", self.up.as_ref())?,
            down_bps: convert("bandwidth.down", self.down.as_ref())?,
        })
    }
}

impl ObfsSection {
    fn build(&self) -> Result<Obfuscation, ConfigError> {
        match self.kind.to_ascii_lowercase().as_str() {
            "" | "plain" => Ok(Obfuscation::None),
            "salamander" => {
                let password = &self.salamander.password;
                if password.len() < MIN_SALAMANDER_PASSWORD_LEN {
                    return Err(ConfigError::invalid(
                        "obfs.salamander.password",
                        format!("must be at least {MIN_SALAMANDER_PASSWORD_LEN} bytes"),
                    ));
                }
                Ok(Obfuscation::Salamander {
                    password: password.clone(),
                })
            }
            other => Err(ConfigError::invalid(
                "obfs.type",
                format!("unsupported obfuscation type {other:?}"),
            )),
        }
    }
}

impl TransportSection {
    fn build(&self) -> Result<TransportOptions, ConfigError> {
        match self.kind.to_ascii_lowercase().as_str() {
            "" | "udp" => {}
            other => {
                return Err(ConfigError::invalid(
                    "transport.type",
                    format!("unsupported transport type {other:?}"),
                ));
            }
        }
        let hop_interval = parse_bounded_duration(
            "transport.udp.hopInterval",
            self.udp.hop_interval.as_deref(),
            MIN_HOP_INTERVAL,
            None,
        )?;
        Ok(TransportOptions { hop_interval })
    }
}

/// Parse `host[:ports]`, where ports is `N`, `A-B`, or a comma-separated
/// union of both. IPv6 hosts must be bracketed when a port is given.
fn parse_server_addr(addr: &str) -> Result<ServerAddr, ConfigError> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(ConfigError::invalid("server", "empty server address"));
    }

    let (host, ports) = split_host_ports(addr)?;
    if host.is_empty() {
        return Err(ConfigError::invalid("server", "empty host"));
    }

    let ports = match ports {
        None => vec![PortRange {
            start: DEFAULT_SERVER_PORT,
            end: DEFAULT_SERVER_PORT,
        }],
        Some(list) => parse_port_union(list)?,
    };

    Ok(ServerAddr {
        host: host.to_string(),
        ports,
    })
}

fn split_host_ports(addr: &str) -> Result<(&str, Option<&str>), ConfigError> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ConfigError::invalid("server", "missing ']' in address"))?;
        return match tail {
            "" => Ok((host, None)),
            _ => tail
                .strip_prefix(':')
                .map(|ports| (host, Some(ports)))
                .ok_or_else(|| ConfigError::invalid("server", "unexpected text after ']'")),
        };
    }

    // A bare IPv6 literal has several colons and no port.
    if addr.parse::<IpAddr>().is_ok_and(|ip| ip.is_ipv6()) {
        return Ok((addr, None));
    }

    Ok(match addr.rsplit_once(':') {
        Some((host, ports)) => (host, Some(ports)),
        None => (addr, None),
    })
}

fn parse_port_union(list: &str) -> Result<Vec<PortRange>, ConfigError> {
    list.split(',')
        .map(|part| {
            let part = part.trim();
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (parse_port(a)?, parse_port(b)?),
                None => {
                    let p = parse_port(part)?;
                    (p, p)
                }
            };
            if start > end {
                return Err(ConfigError::invalid(
                    "server",
                    format!("invalid port range {part:?}"),
                ));
            }
            Ok(PortRange { start, end })
        })
        .collect()
}

fn parse_port(s: &str) -> Result<u16, ConfigError> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::invalid(
            "server",
            format!("invalid port {:?}", s.trim()),
        )),
        Ok(p) => Ok(p),
    }
}

fn parse_pin_sha256(pin: &str) -> Result<[u8; 32], ConfigError> {
    let normalized: String = pin
        .chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_ascii_lowercase();
    let bytes = hex::decode(&normalized)
        .map_err(|e| ConfigError::invalid("tls.pinSHA256", e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::invalid("tls.pinSHA256", "must be a 32-byte SHA-256 hash"))
}

fn check_window(field: &str, value: u64) -> Result<(), ConfigError> {
    if value != 0 && value < MIN_RECEIVE_WINDOW {
        return Err(ConfigError::invalid(
            field,
            format!("must be at least {MIN_RECEIVE_WINDOW}"),
        ));
    }
    Ok(())
}

fn check_window_order(field: &str, init: u64, max: u64) -> Result<(), ConfigError> {
    if init != 0 && max != 0 && max < init {
        return Err(ConfigError::invalid(
            field,
            "must not be smaller than the initial window",
        ));
    }
    Ok(())
}

fn parse_bounded_duration(
    field: &str,
    raw: Option<&str>,
    min: Duration,
    max: Option<Duration>,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value =
        humantime::parse_duration(raw).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    let too_long = max.is_some_and(|max| value > max);
    if value < min || too_long {
        let upper = max.map_or_else(String::new, |m| {
            format!(" and {}", humantime::format_duration(m))
        });
        return Err(ConfigError::invalid(
            field,
            format!("must be between {}{upper}", humantime::format_duration(min)),
        ));
    }
    Ok(Some(value))
}
