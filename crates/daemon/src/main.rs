mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qbsync_core::{
    build_notifier, load_config, resolve_config_path, validate_config, Config, LibraryRefresher,
    Monitor, NoopRefresher, PlexRefresher, QBittorrentClient, SanitizedConfig, TorrentClient,
};

use api::create_router;
use state::AppState;

/// Hardlink or copy completed qBittorrent downloads into a media library.
#[derive(Debug, Parser)]
#[command(name = "qb-sync", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log what would happen without touching files or torrents
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Logging may not be initialised yet.
        eprintln!("qb-sync: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config);
    let mut config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load config from environment".to_string(),
    })?;
    if cli.dry_run {
        config.monitor.dry_run = true;
    }
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config.monitor.log_level);

    match &config_path {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No configuration file found, using environment only"),
    }
    let sanitized = SanitizedConfig::from(&config);
    info!(config = ?sanitized, "Configuration loaded");
    if config.monitor.dry_run {
        warn!("[DRY RUN] No files will be placed and no torrents deleted");
    }

    let client: Arc<dyn TorrentClient> = Arc::new(
        QBittorrentClient::new(&config.qbittorrent, &config.transport)
            .context("Failed to create qBittorrent client")?,
    );
    info!("Using qBittorrent at {}", config.qbittorrent.url);

    let refresher = create_refresher(&config)?;
    let notifier = build_notifier(&config).context("Failed to create notifiers")?;

    let monitor = Monitor::new(config.monitor.clone(), client)
        .with_refresher(refresher)
        .with_notifier(notifier);
    let status = monitor.subscribe();

    let cancel = CancellationToken::new();
    let monitor_handle = monitor.spawn(cancel.clone());

    let server_handle = if config.http.enabled {
        let state = Arc::new(AppState::new(status, sanitized));
        let addr = SocketAddr::new(config.http.host, config.http.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Status endpoint listening on {}", addr);

        let app = create_router(state);
        let shutdown = cancel.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }))
    } else {
        None
    };

    shutdown_signal().await;
    info!("Shutdown signal received");
    cancel.cancel();

    match monitor_handle.await {
        Ok(Ok(())) => info!("Monitor stopped"),
        Ok(Err(e)) => error!(error = %e, "Monitor exited with error"),
        Err(e) => error!(error = %e, "Monitor task panicked"),
    }

    if let Some(handle) = server_handle {
        handle
            .await
            .context("Status server task failed")?
            .context("Status server error")?;
        info!("Status endpoint stopped");
    }

    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn create_refresher(config: &Config) -> Result<Arc<dyn LibraryRefresher>> {
    if !config.plex.enabled {
        info!("Plex refresh disabled");
        return Ok(Arc::new(NoopRefresher));
    }

    let plex = PlexRefresher::new(&config.plex, &config.transport)
        .context("Failed to create Plex refresher")?;
    info!("Plex refresh enabled at {}", plex.base_url());
    Ok(Arc::new(plex))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
