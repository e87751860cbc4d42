//! Server configuration for `InfraVault`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `INFRAVAULT_*` environment variables,
//! plus `REDACT_MODE` for the redaction switch.

use std::net::SocketAddr;

use infravault_core::redact::RedactConfig;

/// Default number of reveal requests served at once.
pub const DEFAULT_REVEAL_CONCURRENCY: usize = 32;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Whether secrets are withheld from normal reads.
    pub redact: RedactConfig,
    /// Maximum in-flight reveal requests.
    pub reveal_concurrency: usize,
    /// Token registered at startup, if any.
    pub bootstrap: Option<BootstrapToken>,
    /// Whether to skip `mlock` (for development without root/`CAP_IPC_LOCK`).
    pub disable_mlock: bool,
}

/// A fixed bearer token created at startup, for single-user deployments
/// and local development.
#[derive(Clone)]
pub struct BootstrapToken {
    pub token: String,
    pub user_id: String,
}

impl std::fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapToken")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `RocksDB` persistent storage.
    RocksDb { path: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8300)),
            storage_backend: StorageBackendType::Memory,
            log_level: "info".to_owned(),
            redact: RedactConfig::default(),
            reveal_concurrency: DEFAULT_REVEAL_CONCURRENCY,
            bootstrap: None,
            disable_mlock: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `INFRAVAULT_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `INFRAVAULT_STORAGE` — `memory` or `rocksdb` (default: `memory`)
    /// - `INFRAVAULT_STORAGE_PATH` — path for `rocksdb` (default: `./data`)
    /// - `INFRAVAULT_LOG_LEVEL` — log filter (default: `info`)
    /// - `INFRAVAULT_BOOTSTRAP_TOKEN` / `INFRAVAULT_BOOTSTRAP_USER` — token registered at startup
    ///   (user defaults to `admin`)
    /// - `INFRAVAULT_REVEAL_CONCURRENCY` — in-flight reveal limit (default: `32`)
    /// - `INFRAVAULT_DISABLE_MLOCK` — skip `mlockall` for dev environments (default: `false`)
    /// - `REDACT_MODE` — `false`/`0` returns secrets on normal reads (default: `true`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // Priority: INFRAVAULT_BIND_ADDR > PORT > default.
        let bind_addr = if let Some(addr) = var("INFRAVAULT_BIND_ADDR") {
            addr.parse().unwrap_or(defaults.bind_addr)
        } else if let Some(port) = var("PORT") {
            let port: u16 = port.parse().unwrap_or(defaults.bind_addr.port());
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            defaults.bind_addr
        };

        let storage_path = var("INFRAVAULT_STORAGE_PATH").unwrap_or_else(|| "./data".to_owned());
        let storage_backend = match var("INFRAVAULT_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "rocksdb" => StorageBackendType::RocksDb { path: storage_path },
            _ => StorageBackendType::Memory,
        };

        let log_level = var("INFRAVAULT_LOG_LEVEL").unwrap_or(defaults.log_level);

        let redact = RedactConfig {
            enabled: var("REDACT_MODE").is_none_or(|v| !is_falsy(&v)),
        };

        let reveal_concurrency = var("INFRAVAULT_REVEAL_CONCURRENCY")
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_REVEAL_CONCURRENCY);

        let bootstrap = var("INFRAVAULT_BOOTSTRAP_TOKEN")
            .filter(|t| !t.is_empty())
            .map(|token| BootstrapToken {
                token,
                user_id: var("INFRAVAULT_BOOTSTRAP_USER").unwrap_or_else(|| "admin".to_owned()),
            });

        let disable_mlock = var("INFRAVAULT_DISABLE_MLOCK").is_some_and(|v| v == "true" || v == "1");

        Self {
            bind_addr,
            storage_backend,
            log_level,
            redact,
            reveal_concurrency,
            bootstrap,
            disable_mlock,
        }
    }
}

fn is_falsy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "false" | "0")
}
