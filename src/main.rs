//! mediafs -- S3-backed media filesystem server.
//!
//! Loads the YAML configuration, builds the filesystem registry and the
//! mounts, and serves the delivery middleware over HTTP until SIGTERM or
//! SIGINT triggers a graceful shutdown.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use mediafs::delivery::Mount;
use mediafs::registry::FilesystemRegistry;

/// Command-line arguments for the mediafs server.
#[derive(Parser, Debug)]
#[command(
    name = "mediafs",
    version,
    about = "S3-backed media filesystem server"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "mediafs.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mediafs::config::load_config(&cli.config)?;

    // RUST_LOG wins over the configured level when set.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    let registry = Arc::new(FilesystemRegistry::new(&config.filesystems));

    // Mount each configured filesystem at its virtual path.
    let mounts: Vec<Mount> = config
        .filesystems
        .iter()
        .map(|(name, fs_config)| Mount::new(name, &fs_config.virtual_path))
        .collect();
    for mount in &mounts {
        info!("Mounted filesystem {:?} at {}", mount.name, mount.root);
    }

    let state = Arc::new(mediafs::AppState {
        config,
        registry,
        mounts,
    });

    let app = mediafs::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("mediafs listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests to complete.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("mediafs shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
