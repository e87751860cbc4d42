//! `InfraVault` client implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use infravault_core::crypto::{self, Envelope, SessionKey};
use infravault_core::model::fields;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::ClientError;
use crate::session::SessionKeyStore;
use crate::types::{
    ApiErrorBody, ProviderForm, ProviderView, RevealedField, RevealedFields, ServerForm,
    ServerView, SettingsSecret, SettingsView,
};
use crate::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, RETRY_BASE_DELAY};

/// Header carrying the base64 session key on reveal requests.
const REVEAL_KEY_HEADER: &str = "x-reveal-key";

const SERVER_SECRETS: [&str; 3] = [
    fields::PASSWORD,
    fields::SSH_PASSWORD,
    fields::PROVIDER_PASSWORD,
];
const PROVIDER_SECRETS: [&str; 1] = [fields::PASSWORD];

/// Async `InfraVault` client.
///
/// Holds one session key for its lifetime, created on the first reveal and
/// destroyed by [`Client::logout`].
pub struct Client {
    token: String,
    base_url: String,
    max_retries: u32,
    http: reqwest::Client,
    sessions: Arc<SessionKeyStore>,
}

impl Client {
    /// Create a client with an in-memory session key store.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if no token is configured.
    pub fn new(cfg: ClientConfig) -> Result<Self, ClientError> {
        Self::with_session_store(cfg, Arc::new(SessionKeyStore::in_memory()))
    }

    /// Create a client sharing `sessions` with other components, e.g. a UI
    /// that renders revealed values.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if no token is configured.
    #[allow(clippy::needless_pass_by_value)]
    pub fn with_session_store(
        cfg: ClientConfig,
        sessions: Arc<SessionKeyStore>,
    ) -> Result<Self, ClientError> {
        let token = first_non_empty(&[
            &cfg.token,
            &std::env::var("INFRAVAULT_TOKEN").unwrap_or_default(),
        ]);
        if token.is_empty() {
            return Err(ClientError::Config(
                "missing token: set INFRAVAULT_TOKEN or pass token in config".to_owned(),
            ));
        }

        let base_url = first_non_empty(&[
            &cfg.base_url,
            &std::env::var("INFRAVAULT_ADDR").unwrap_or_default(),
            DEFAULT_BASE_URL,
        ])
        .trim_end_matches('/')
        .to_owned();

        let timeout = if cfg.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            cfg.timeout
        };

        let max_retries = if cfg.max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            cfg.max_retries
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("infravault-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            token,
            base_url,
            max_retries,
            http,
            sessions,
        })
    }

    /// The session key store backing reveals.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionKeyStore> {
        &self.sessions
    }

    // --- Servers ---

    /// List servers, secrets redacted per the server's policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_servers(&self) -> Result<Vec<ServerView>, ClientError> {
        self.get_json("/servers").await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the server does not exist.
    pub async fn get_server(&self, id: Uuid) -> Result<ServerView, ClientError> {
        self.get_json(&format!("/servers/{id}")).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the server rejects the form.
    pub async fn create_server(&self, form: &ServerForm) -> Result<ServerView, ClientError> {
        self.send_json(Method::POST, "/servers", form).await
    }

    /// Merge-update a server. Unset form fields are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the server rejects the form.
    pub async fn update_server(
        &self,
        id: Uuid,
        form: &ServerForm,
    ) -> Result<ServerView, ClientError> {
        self.send_json(Method::PATCH, &format!("/servers/{id}"), form)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the server does not exist.
    pub async fn delete_server(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, &format!("/servers/{id}"))
            .await
    }

    // --- Providers ---

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_providers(&self) -> Result<Vec<ProviderView>, ClientError> {
        self.get_json("/providers").await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the provider does not exist.
    pub async fn get_provider(&self, id: Uuid) -> Result<ProviderView, ClientError> {
        self.get_json(&format!("/providers/{id}")).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the server rejects the form.
    pub async fn create_provider(&self, form: &ProviderForm) -> Result<ProviderView, ClientError> {
        self.send_json(Method::POST, "/providers", form).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the server rejects the form.
    pub async fn update_provider(
        &self,
        id: Uuid,
        form: &ProviderForm,
    ) -> Result<ProviderView, ClientError> {
        self.send_json(Method::PATCH, &format!("/providers/{id}"), form)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the provider does not exist.
    pub async fn delete_provider(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, &format!("/providers/{id}"))
            .await
    }

    // --- Settings ---

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_settings(&self) -> Result<SettingsView, ClientError> {
        self.get_json("/settings").await
    }

    /// Merge-update settings. `patch` follows the settings form shape, e.g.
    /// `{"notifications": {"smtp": {"password": "__KEEP__"}}}`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the server rejects the patch.
    pub async fn update_settings(
        &self,
        patch: &serde_json::Value,
    ) -> Result<SettingsView, ClientError> {
        self.send_json(Method::PATCH, "/settings", patch).await
    }

    // --- Reveal ---

    /// Reveal every secret of a server. Fields without a stored secret come
    /// back as [`RevealedField::Absent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be generated or the request fails.
    /// A single envelope that fails to open is reported per field.
    pub async fn reveal_server(&self, id: Uuid) -> Result<RevealedFields, ClientError> {
        self.reveal(&format!("/reveal/servers/{id}"), &SERVER_SECRETS)
            .await
    }

    /// # Errors
    ///
    /// Same as [`Client::reveal_server`].
    pub async fn reveal_provider(&self, id: Uuid) -> Result<RevealedFields, ClientError> {
        self.reveal(&format!("/reveal/providers/{id}"), &PROVIDER_SECRETS)
            .await
    }

    /// Reveal one settings secret.
    ///
    /// # Errors
    ///
    /// Same as [`Client::reveal_server`].
    pub async fn reveal_settings(
        &self,
        secret: SettingsSecret,
    ) -> Result<RevealedField, ClientError> {
        let mut fields = self.reveal(secret.path(), &[secret.field()]).await?;
        Ok(fields
            .remove(secret.field())
            .unwrap_or(RevealedField::Absent))
    }

    /// Revoke the bearer token and destroy the session key.
    ///
    /// The key is destroyed even if the server call fails, so envelopes
    /// fetched in this session can no longer be opened.
    ///
    /// # Errors
    ///
    /// Returns the server error, after the key is gone.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.send_empty(Method::POST, "/auth/logout").await;
        self.sessions.destroy().await;
        result
    }

    // --- Private ---

    async fn reveal(
        &self,
        path: &str,
        expected: &[&str],
    ) -> Result<RevealedFields, ClientError> {
        let key = self.sessions.get_or_create().await?;
        let encoded = Zeroizing::new(key.to_base64());

        let resp = self
            .authed(Method::GET, path)
            .header(REVEAL_KEY_HEADER, encoded.as_str())
            .send()
            .await?;
        let envelopes: BTreeMap<String, Envelope> = read_json(resp).await?;
        debug!(path, fields = envelopes.len(), "reveal received");

        Ok(open_envelopes(&key, envelopes, expected))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            match self.authed(Method::GET, path).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    match read_json(resp).await {
                        Ok(value) => return Ok(value),
                        Err(err) if attempt < self.max_retries && is_retryable(status) => {
                            last_err = Some(err);
                        }
                        Err(err) => return Err(err),
                    }
                }
                Err(e) => {
                    let retry = attempt < self.max_retries && (e.is_timeout() || e.is_connect());
                    if !retry {
                        return Err(ClientError::Network(e));
                    }
                    last_err = Some(ClientError::Network(e));
                }
            }
            warn!(path, attempt, "request failed, retrying");
            sleep_with_jitter(attempt).await;
        }

        Err(last_err.unwrap_or_else(|| ClientError::Api {
            status: 0,
            code: "unknown".to_owned(),
            message: "unknown error".to_owned(),
        }))
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.authed(method, path).json(body).send().await?;
        read_json(resp).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ClientError> {
        let resp = self.authed(method, path).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(api_error(status, &resp.text().await.unwrap_or_default()))
    }

    fn authed(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Decrypt each envelope; expected fields the server left out are absent.
fn open_envelopes(
    key: &SessionKey,
    envelopes: BTreeMap<String, Envelope>,
    expected: &[&str],
) -> RevealedFields {
    let mut out: RevealedFields = expected
        .iter()
        .map(|field| ((*field).to_owned(), RevealedField::Absent))
        .collect();

    for (field, envelope) in envelopes {
        let opened = match crypto::decrypt(key, &envelope) {
            Ok(plaintext) => RevealedField::Revealed(Zeroizing::new(plaintext)),
            Err(e) => {
                warn!(field = %field, error = %e, "envelope did not open");
                RevealedField::Failed(ClientError::Decryption(e).to_string())
            }
        };
        out.insert(field, opened);
    }
    out
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;
    if status.is_success() {
        return serde_json::from_str(&text).map_err(ClientError::Json);
    }
    Err(api_error(status, &text))
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.error.clone())
        .unwrap_or_else(|| "unknown".to_owned());
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn sleep_with_jitter(attempt: u32) {
    // RETRY_BASE_DELAY is 250ms and retries are few, so values stay small.
    #[allow(clippy::cast_possible_truncation)]
    let base = (RETRY_BASE_DELAY.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    #[allow(clippy::cast_precision_loss)]
    let base_f = base as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let jitter = (base_f * 0.3 * rand_f64()) as u64;
    tokio::time::sleep(Duration::from_millis(base.saturating_add(jitter))).await;
}

/// Pseudo-random f64 in [0, 1) from the clock; only used for retry jitter.
fn rand_f64() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

fn first_non_empty(vals: &[&str]) -> String {
    vals.iter()
        .find(|v| !v.is_empty())
        .map(|v| (*v).to_owned())
        .unwrap_or_default()
}
