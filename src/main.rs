//! bucketdav -- WebDAV file server over a key-prefix object store.
//!
//! Startup order: configuration, logging, metrics, object store, listener.
//! SIGTERM/SIGINT stop accepting connections; in-flight requests get
//! `server.shutdown_timeout` seconds to finish before the process exits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bucketdav::config::{Config, LoggingConfig};
use bucketdav::storage::backend::ObjectStore;

/// Command-line arguments for the bucketdav server.
#[derive(Parser, Debug)]
#[command(name = "bucketdav", version, about = "WebDAV server over an object store")]
struct Cli {
    /// Path to the YAML configuration file.  Built-in defaults apply when
    /// omitted; the credential pair must then come from the environment.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => bucketdav::config::load_config(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => Config::default(),
    };
    config.auth.apply_overrides(|name| std::env::var(name).ok());
    config.auth.validate()?;

    init_tracing(&config.logging);
    match cli.config.as_deref() {
        Some(path) => info!("Loaded configuration from {}", path),
        None => info!("No configuration file given, using defaults and environment"),
    }

    if config.observability.metrics {
        bucketdav::metrics::init_metrics()?;
        bucketdav::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let store = open_store(&config)?;

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);

    let state = Arc::new(bucketdav::AppState { config, store });
    let app = bucketdav::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("bucketdav listening on {}", bind_addr);

    let stopping = Arc::new(Notify::new());
    let signal_stopping = stopping.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        signal_stopping.notify_one();
    });

    tokio::select! {
        result = async { server.await } => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!(
                "Requests still in flight after {}s, exiting anyway",
                shutdown_timeout.as_secs()
            );
        }
    }

    info!("bucketdav shut down");
    Ok(())
}

/// Install the global tracing subscriber.  `RUST_LOG` overrides the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Open the object store named by `storage.backend`.
fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        "memory" => {
            let max = config.storage.memory.max_size_bytes;
            info!("Memory object store initialized (limit: {} bytes, 0 = none)", max);
            Ok(Arc::new(bucketdav::storage::memory::MemoryBackend::new(max)))
        }
        "sqlite" => {
            let path = &config.storage.sqlite.path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let backend = bucketdav::storage::sqlite::SqliteBackend::new(path)?;
            info!("SQLite object store initialized at {}", path);
            Ok(Arc::new(backend))
        }
        other => anyhow::bail!("unknown storage.backend '{other}' (expected memory or sqlite)"),
    }
}

/// Resolve once SIGINT (Ctrl+C) or, on Unix, SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
