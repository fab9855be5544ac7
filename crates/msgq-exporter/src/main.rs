//! msgq-exporter - Prometheus exporter for kernel message queues.
//!
//! Runs `ipcs -q` on every scrape and serves queue lengths plus an `up`
//! gauge at the telemetry path.

mod access_log;
mod cli;
mod server;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use msgq_core::collector::{QueueCollector, new_registry};
use msgq_core::parser::IpcsParser;
use msgq_core::source::{CachedSource, CommandSource, SnapshotSource};

use cli::{Args, parse_listen_address, validate_telemetry_path};

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = match format!("msgq_exporter={level}").parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    let filter = match format!("msgq_core={level}").parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_source(args: &Args) -> Box<dyn SnapshotSource> {
    let command = CommandSource::ipcs(&args.ipcs_command).with_timeout(args.scrape_timeout());
    let ttl = args.cache_ttl();
    if ttl.is_zero() {
        Box::new(command)
    } else {
        let cached = CachedSource::new(command, ttl);
        debug!(ttl_ms = cached.ttl().as_millis() as u64, "caching queue listings");
        Box::new(cached)
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    info!(version = msgq_core::VERSION, "starting message queue exporter");

    let addr: SocketAddr = match parse_listen_address(&args.listen_address) {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "cannot start exporter");
            process::exit(1);
        }
    };
    if let Err(e) = validate_telemetry_path(&args.telemetry_path) {
        error!(error = %e, "cannot start exporter");
        process::exit(1);
    }

    info!(
        command = %args.ipcs_command,
        namespace = %args.namespace,
        timeout_s = args.scrape_timeout,
        cache_ttl_ms = args.cache_ttl,
        "exporter configured"
    );

    let collector = QueueCollector::new(build_source(&args), IpcsParser::new());
    let registry = Arc::new(new_registry(&args.namespace, collector));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(addr, &args.telemetry_path, registry)) {
        error!(%addr, error = %e, "server failed");
        process::exit(1);
    }
}

async fn serve(
    addr: SocketAddr,
    telemetry_path: &str,
    registry: server::SharedRegistry,
) -> std::io::Result<()> {
    let app = server::router(registry, telemetry_path)
        .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, path = telemetry_path, "listening");

    axum::serve(listener, app).await
}
