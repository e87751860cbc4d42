//! `InfraVault` server entry point.
//!
//! Applies process hardening, opens the storage backend, registers the
//! bootstrap token if configured, then serves the Axum router with graceful
//! shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use infravault_core::redact::RedactionPolicy;
use infravault_core::token::CreateTokenParams;
use infravault_storage::{MemoryBackend, StorageBackend};

use infravault_server::app::build_router;
use infravault_server::config::{ServerConfig, StorageBackendType};
use infravault_server::hardening;
use infravault_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    apply_hardening(&config);

    info!(
        storage = ?config.storage_backend,
        redact = config.redact.enabled,
        "InfraVault starting"
    );

    let storage = open_storage(&config)?;
    let state = Arc::new(AppState::new(
        storage,
        RedactionPolicy::new(config.redact),
    ));

    if let Some(bootstrap) = &config.bootstrap {
        state
            .token_store
            .register(
                &bootstrap.token,
                CreateTokenParams {
                    user_id: bootstrap.user_id.clone(),
                    display_name: "bootstrap".to_owned(),
                    ttl: None,
                },
            )
            .await
            .context("failed to register bootstrap token")?;
    }

    let app = build_router(Arc::clone(&state), config.reveal_concurrency);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "InfraVault server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("InfraVault server stopped");
    Ok(())
}

fn open_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match &config.storage_backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackendType::RocksDb { path } => {
            info!(path = %path, "using RocksDB storage");
            Ok(Arc::new(
                infravault_storage::RocksDbBackend::open(path)
                    .context("failed to open RocksDB storage")?,
            ))
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageBackendType::RocksDb { .. } => {
            anyhow::bail!("RocksDB backend requested but feature 'rocksdb-backend' is not enabled")
        }
    }
}

/// Disable core dumps always; lock memory unless disabled.
fn apply_hardening(config: &ServerConfig) {
    if let Err(e) = hardening::disable_core_dumps() {
        warn!(error = %e, "could not disable core dumps");
    }
    if config.disable_mlock {
        warn!("mlock disabled; memory may be swapped to disk");
    } else if let Err(e) = hardening::lock_memory() {
        warn!(
            error = %e,
            "could not lock memory; set INFRAVAULT_DISABLE_MLOCK=true to silence"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
