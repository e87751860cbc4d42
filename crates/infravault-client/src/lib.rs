//! `InfraVault` client for Rust.
//!
//! Talks to an `InfraVault` server over HTTP: lists records (with secrets
//! redacted), saves them through the keep/clear/replace merge rule, and
//! reveals secrets on demand. Reveals are encrypted by the server under a
//! per-session key that this client generates, holds in volatile storage,
//! and destroys on logout; decryption happens here.
//!
//! # Example
//!
//! ```rust,no_run
//! use infravault_client::{Client, ClientConfig};
//!
//! # async fn example() -> Result<(), infravault_client::ClientError> {
//! let client = Client::new(ClientConfig::from_env())?;
//! for server in client.list_servers().await? {
//!     let secrets = client.reveal_server(server.id).await?;
//!     let shown = secrets.get("password").map_or("-", |f| f.display());
//!     tracing::info!(server = %server.name, password_len = shown.len());
//! }
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod cache;
pub mod draft;
mod error;
pub mod session;
mod types;

pub use client::Client;
pub use error::{ClientError, SessionStorageError};
pub use types::{
    ABSENT_MARKER, ProviderForm, ProviderView, RecordRef, RevealedField, RevealedFields,
    ServerForm, ServerView, SettingsSecret, SettingsView,
};

use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8300";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Configuration for the `InfraVault` client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token.
    pub token: String,
    /// Server base URL. Default: `http://127.0.0.1:8300`.
    pub base_url: String,
    /// Request timeout. Default: 10 seconds.
    pub timeout: Duration,
    /// Retry attempts for idempotent reads. Default: 2.
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientConfig {
    /// Read `INFRAVAULT_ADDR` and `INFRAVAULT_TOKEN`, falling back to the
    /// defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token: std::env::var("INFRAVAULT_TOKEN").unwrap_or_default(),
            base_url: std::env::var("INFRAVAULT_ADDR")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.base_url),
            ..defaults
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
