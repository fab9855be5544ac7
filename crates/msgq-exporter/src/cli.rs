//! Command-line configuration.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;
use tracing::Level;

/// Prometheus exporter for kernel message queues (`ipcs -q`).
#[derive(Parser, Debug)]
#[command(name = "msgq-exporter", about = "Prometheus exporter for kernel message queues", version = msgq_core::VERSION)]
pub(crate) struct Args {
    /// Address on which to expose metrics (`host:port`, or `:port` for all interfaces).
    #[arg(long, default_value = "0.0.0.0:8080", env = "MSGQ_EXPORTER_LISTEN_ADDRESS")]
    pub(crate) listen_address: String,

    /// Path under which to expose metrics.
    #[arg(long, default_value = "/metrics", env = "MSGQ_EXPORTER_TELEMETRY_PATH")]
    pub(crate) telemetry_path: String,

    /// Metric name prefix.
    #[arg(long, default_value = "nagios", env = "MSGQ_EXPORTER_NAMESPACE")]
    pub(crate) namespace: String,

    /// Queue listing command, run with `-q`.
    #[arg(long, default_value = "ipcs", env = "MSGQ_EXPORTER_IPCS_COMMAND")]
    pub(crate) ipcs_command: String,

    /// Kill the listing command after this many seconds (0 disables).
    #[arg(long, default_value = "10", env = "MSGQ_EXPORTER_SCRAPE_TIMEOUT")]
    pub(crate) scrape_timeout: u64,

    /// Reuse a snapshot for this many milliseconds across scrapes (0 disables).
    #[arg(long, default_value = "0", env = "MSGQ_EXPORTER_CACHE_TTL")]
    pub(crate) cache_ttl: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    pub(crate) quiet: bool,
}

impl Args {
    pub(crate) fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout)
    }

    pub(crate) fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl)
    }

    pub(crate) fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            }
        }
    }
}

/// Resolves a listen address. A bare `:port` binds all interfaces.
pub(crate) fn parse_listen_address(s: &str) -> Result<SocketAddr, String> {
    let s = s.trim();
    let full = if s.starts_with(':') {
        format!("0.0.0.0{}", s)
    } else {
        s.to_string()
    };

    full.to_socket_addrs()
        .map_err(|e| format!("invalid listen address '{}': {}", s, e))?
        .next()
        .ok_or_else(|| format!("listen address '{}' resolved to nothing", s))
}

/// Checks that the telemetry path is usable as a route.
pub(crate) fn validate_telemetry_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("telemetry path '{}' must start with '/'", path));
    }
    Ok(())
}
