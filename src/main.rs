use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use nntp_server::config::{create_default_config, load_config};
use nntp_server::NntpServer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "nntpd.toml")]
    config: String,

    /// Override the listen address from the config file
    #[arg(short, long)]
    listen: Option<String>,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = if std::path::Path::new(&args.config).exists() {
        load_config(&args.config)?
    } else {
        warn!("config file '{}' not found, creating default config", args.config);
        let config = create_default_config();
        std::fs::write(&args.config, toml::to_string_pretty(&config)?)?;
        info!("created default config file: {}", args.config);
        config
    };

    let backend = Arc::new(config.build_backend());
    info!(
        "serving {} group(s), posting {}",
        config.groups.len(),
        if config.allow_post { "allowed" } else { "prohibited" }
    );

    let listen_addr = args.listen.as_deref().unwrap_or(&config.listen_addr);
    let listener = TcpListener::bind(listen_addr).await?;
    info!("nntpd listening on {listen_addr}");

    let server = NntpServer::new(backend);
    tokio::select! {
        result = server.serve(listener) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, exiting");
        }
    }
    Ok(())
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
