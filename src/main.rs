use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trialdesk::config::{Config, LogFormat, LoggingConfig};
use trialdesk::web::{AppState, start_server};

/// Clinical-trial record service.
#[derive(Parser, Debug)]
#[command(name = "trialdesk", version, about)]
struct Cli {
    /// Address to listen on (overrides HOST)
    #[arg(long)]
    host: Option<std::net::IpAddr>,

    /// Port to listen on (overrides PORT)
    #[arg(long, short)]
    port: Option<u16>,

    /// libSQL database file (overrides LIBSQL_PATH)
    #[arg(long)]
    libsql_path: Option<PathBuf>,

    /// Create the libSQL tables when missing
    #[arg(long)]
    init_schema: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("trialdesk=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.libsql_path {
        config.database.libsql_path = path;
    }
    if cli.init_schema {
        config.database.init_schema = true;
    }

    init_tracing(&config.logging);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = config.database.backend.as_str(),
        "Starting trialdesk"
    );

    let store = trialdesk::db::connect_from_config(&config.database)
        .await
        .context("failed to connect to the store")?;

    let state = Arc::new(AppState::new(Arc::clone(&store)));
    let (addr, server) = start_server(&config.server, Arc::clone(&state))
        .await
        .context("failed to start HTTP server")?;
    tracing::info!(%addr, origin = %config.server.frontend_origin, "Serving API");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
    }
    tracing::info!("Shutdown requested");

    state.shutdown().await;
    if let Err(e) = server.await {
        tracing::warn!("Server task ended abnormally: {}", e);
    }
    store.close().await;
    tracing::info!("Stopped");
    Ok(())
}
