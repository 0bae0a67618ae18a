//! # Nestboard binary
//!
//! Loads configuration, picks the message store and serves the board's API.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::HmacIdentityProvider;
use configs::{AppConfig, LogFormat, StorageBackend};
use domains::MessageRepository;
use secrecy::ExposeSecret;
use storage_adapters::MemoryMessageRepository;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    let repo = open_store(&config).await?;
    let identity = HmacIdentityProvider::new(config.auth_secret.expose_secret().as_bytes())
        .context("auth secret rejected")?;
    let state = AppState::new(repo, Arc::new(identity))
        .with_default_page_size(config.default_page_size);
    let app = router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, env = %config.app_env, storage = ?config.storage, "nestboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "server exited");
            err
        })?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .init(),
        LogFormat::Compact => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn MessageRepository>> {
    match config.storage {
        StorageBackend::Memory => Ok(Arc::new(MemoryMessageRepository::new())),
        #[cfg(feature = "db-sqlite")]
        StorageBackend::Sqlite => {
            let repo = storage_adapters::SqliteMessageRepository::connect(
                &config.database_url,
                config.database_max_connections,
            )
            .await
            .with_context(|| format!("failed to open {}", config.database_url))?;
            info!(url = %config.database_url, "sqlite store ready");
            Ok(Arc::new(repo))
        }
        #[cfg(not(feature = "db-sqlite"))]
        StorageBackend::Sqlite => {
            anyhow::bail!("storage = sqlite, but this binary was built without the db-sqlite feature")
        }
    }
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. If the handler could not be installed the
/// server keeps running instead of shutting down straight away.
async fn wait_for_shutdown(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "failed to listen for shutdown signal; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn signal_fires_shutdown() {
        let done = tokio::time::timeout(
            Duration::from_millis(100),
            wait_for_shutdown(async { Ok(()) }),
        )
        .await;
        assert!(done.is_ok());
    }

    #[tokio::test]
    async fn failed_handler_does_not_shut_down() {
        let failed = async { Err(std::io::Error::other("no signal driver")) };
        let done = tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(failed)).await;
        assert!(done.is_err());
    }
}
