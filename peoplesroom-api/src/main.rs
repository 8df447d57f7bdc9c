mod auth;
mod error;
mod routes;
mod state;

use anyhow::Result;
use clap::Parser;
use peoplesroom_core::config::Config;
use peoplesroom_core::core_access::{StaticTierProvider, TierPolicy};
use peoplesroom_core::core_room::{RoomService, TierLabel};
use peoplesroom_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use peoplesroom_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "peoplesroom-api")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file (environment variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = LogLevel::from_str(&args.log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        LogLevel::Info
    });
    init_logging_with_config(LogConfig::new(log_level).json_format(args.json_logs))?;

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    let shutdown = Arc::new(ShutdownCoordinator::new(config.server.shutdown_timeout));
    install_signal_handlers(shutdown.clone());

    // The trust collaborator: everyone defaults to the knock-first tier
    // until a real trust service is wired in behind TierProvider.
    let tiers = Arc::new(StaticTierProvider::new(TierLabel::new("OTHERS")));
    let service = Arc::new(RoomService::new(
        config.rooms.clone(),
        TierPolicy::standard(),
        tiers,
    ));
    let _sweep = service.spawn_expiry_sweep(shutdown.clone());

    let addr = config.server.bind_address;
    let state = AppState {
        service,
        config: Arc::new(config),
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "peoplesroom-api listening");

    let graceful = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.wait_for_shutdown().await })
        .await?;

    info!("server stopped");
    Ok(())
}
