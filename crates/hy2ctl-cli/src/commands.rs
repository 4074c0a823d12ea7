//! Subcommand implementations. Output goes to the given writer so the
//! commands can be tested without a terminal.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use hy2ctl_core::config::{self, Obfuscation};
use hy2ctl_core::{bandwidth, ports};

pub fn check(path: &Path, out: &mut impl Write) -> Result<()> {
    let parsed = if path.as_os_str() == "-" {
        let mut raw = Vec::new();
        std::io::stdin()
            .read_to_end(&mut raw)
            .context("Failed to read config from stdin")?;
        config::parse(&raw).context("Config from stdin is not usable")?
    } else {
        config::load(path).with_context(|| format!("Failed to load config file {}", path.display()))?
    };
    let cfg = &parsed.config;
    info!(server = %cfg.server.host, lazy = parsed.lazy, "Config is valid");

    let ports = cfg
        .server
        .ports
        .iter()
        .map(|r| {
            if r.start == r.end {
                r.start.to_string()
            } else {
                format!("{}-{}", r.start, r.end)
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    let obfs = match cfg.obfs {
        Obfuscation::None => "none",
        Obfuscation::Salamander { .. } => "salamander",
    };

    writeln!(out, "OK")?;
    writeln!(out, "  server:    {}:{ports}", cfg.server.host)?;
    writeln!(out, "  sni:       {}", cfg.tls.sni)?;
    writeln!(out, "  up:        {} B/s", cfg.bandwidth.up_bps)?;
    writeln!(out, "  down:      {} B/s", cfg.bandwidth.down_bps)?;
    writeln!(out, "  obfs:      {obfs}")?;
    writeln!(out, "  lazy:      {}", parsed.lazy)?;
    Ok(())
}

pub fn free_ports(count: usize, out: &mut impl Write) -> Result<()> {
    let ports = ports::get_free_ports(count).context("Failed to reserve local ports")?;
    for port in ports {
        writeln!(out, "{port}")?;
    }
    Ok(())
}

/// Digits alone are bytes/sec; anything else is parsed as a bit rate.
pub fn bandwidth(value: &str, out: &mut impl Write) -> Result<()> {
    let value = value
        .trim()
        .parse::<u64>()
        .map_or_else(|_| Value::String(value.to_string()), Value::from);
    let bps = bandwidth::conv_bandwidth(&value)
        .with_context(|| format!("Cannot convert bandwidth {value}"))?;
    writeln!(out, "{bps}")?;
    Ok(())
}
