//! hy2ctl CLI
//!
//! Operator tooling around the tunnel library: check a config payload
//! before handing it to a host, look up free local ports, convert
//! bandwidth strings.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "hy2ctl")]
#[command(version, about = "Tunnel config and helper tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, global = true, default_value = "warn", env = "HY2CTL_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, global = true, env = "HY2CTL_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a tunnel config file ("-" reads stdin).
    Check {
        path: PathBuf,
    },

    /// Print currently unused local TCP ports.
    FreePorts {
        #[arg(default_value_t = 1)]
        count: usize,
    },

    /// Convert a bandwidth value ("100 mbps", or bytes/sec) to bytes/sec.
    Bandwidth {
        value: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    hy2ctl_core::tracing_init::init_tracing(
        &format!("hy2ctl={}", cli.log_level),
        cli.log_json,
    )?;
    debug!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "Starting hy2ctl");

    let mut out = std::io::stdout().lock();
    match cli.command {
        Command::Check { path } => commands::check(&path, &mut out),
        Command::FreePorts { count } => commands::free_ports(count, &mut out),
        Command::Bandwidth { value } => commands::bandwidth(&value, &mut out),
    }
}
