//! On-demand disclosure of stored secrets.
//!
//! A reveal re-reads the record, encrypts each present secret field under
//! the caller's [`SessionKey`] with a fresh nonce, and returns only the
//! envelopes. Absent fields are left out of the response. Nothing is cached:
//! two reveals of the same field never produce the same envelope.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{self, Envelope, SessionKey};
use crate::error::RevealError;
use crate::model::{Provider, RecordKind, Server, fields};
use crate::redact::is_present;
use crate::store::RecordStore;

/// Which secrets a reveal call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealTarget {
    /// `password`, `sshPassword` and `providerPassword` of one server.
    Server(Uuid),
    /// `password` of one provider.
    Provider(Uuid),
    /// The WHOIS API key from settings, returned as `key`.
    WhoisKey,
    /// The Bark device key from settings, returned as `key`.
    BarkKey,
    /// The SMTP password from settings, returned as `password`.
    SmtpPassword,
}

impl RevealTarget {
    /// The kind of record the target reads.
    #[must_use]
    pub const fn kind(self) -> RecordKind {
        match self {
            Self::Server(_) => RecordKind::Server,
            Self::Provider(_) => RecordKind::Provider,
            Self::WhoisKey | Self::BarkKey | Self::SmtpPassword => RecordKind::Settings,
        }
    }
}

impl fmt::Display for RevealTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "server/{id}"),
            Self::Provider(id) => write!(f, "provider/{id}"),
            Self::WhoisKey => f.write_str("settings/key"),
            Self::BarkKey => f.write_str("settings/bark-key"),
            Self::SmtpPassword => f.write_str("settings/smtp-password"),
        }
    }
}

/// Envelopes keyed by field name, serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevealResponse {
    fields: BTreeMap<String, Envelope>,
}

impl RevealResponse {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Envelope> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Field names in the response, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_fields(self) -> BTreeMap<String, Envelope> {
        self.fields
    }
}

/// Looks up secrets and wraps them for one session.
pub struct RevealService {
    store: Arc<RecordStore>,
}

impl RevealService {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Encrypt the secrets named by `target` for `owner` under `key`.
    ///
    /// # Errors
    ///
    /// - [`RevealError::Store`] with `NotFound` if the record does not exist
    ///   or belongs to another user.
    /// - [`RevealError::Crypto`] if encryption fails.
    pub async fn reveal(
        &self,
        owner: &str,
        target: RevealTarget,
        key: &SessionKey,
    ) -> Result<RevealResponse, RevealError> {
        let secrets = self.load(owner, target).await?;

        let mut fields = BTreeMap::new();
        for (name, value) in secrets {
            if let Some(value) = value.filter(|v| is_present(Some(v.as_str()))) {
                fields.insert(name.to_owned(), crypto::encrypt(key, &value)?);
            }
        }
        let response = RevealResponse { fields };

        info!(
            user = %owner,
            kind = %target.kind(),
            target = %target,
            fields = ?response.field_names().collect::<Vec<_>>(),
            "secrets revealed"
        );
        Ok(response)
    }

    async fn load(
        &self,
        owner: &str,
        target: RevealTarget,
    ) -> Result<Vec<(&'static str, Option<Zeroizing<String>>)>, RevealError> {
        let secrets = match target {
            RevealTarget::Server(id) => {
                let server: Server = self.store.get(owner, id).await?;
                vec![
                    (fields::PASSWORD, server.password.map(Zeroizing::new)),
                    (fields::SSH_PASSWORD, server.ssh_password.map(Zeroizing::new)),
                    (
                        fields::PROVIDER_PASSWORD,
                        server.provider_password.map(Zeroizing::new),
                    ),
                ]
            }
            RevealTarget::Provider(id) => {
                let provider: Provider = self.store.get(owner, id).await?;
                vec![(fields::PASSWORD, provider.password.map(Zeroizing::new))]
            }
            RevealTarget::WhoisKey => {
                let settings = self.store.get_settings(owner).await?;
                vec![(fields::KEY, settings.whois.api_key.map(Zeroizing::new))]
            }
            RevealTarget::BarkKey => {
                let settings = self.store.get_settings(owner).await?;
                vec![(
                    fields::KEY,
                    settings.notifications.bark.key.map(Zeroizing::new),
                )]
            }
            RevealTarget::SmtpPassword => {
                let settings = self.store.get_settings(owner).await?;
                vec![(
                    fields::PASSWORD,
                    settings.notifications.smtp.password.map(Zeroizing::new),
                )]
            }
        };
        Ok(secrets)
    }
}

impl fmt::Debug for RevealService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealService").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use infravault_storage::MemoryBackend;

    use super::*;
    use crate::error::StoreError;
    use crate::merge::NewServer;
    use crate::model::Settings;

    fn service() -> (RevealService, Arc<RecordStore>) {
        let store = Arc::new(RecordStore::new(Arc::new(MemoryBackend::new())));
        (RevealService::new(Arc::clone(&store)), store)
    }

    async fn seed_server(store: &RecordStore, owner: &str) -> Server {
        let server = serde_json::from_value::<NewServer>(serde_json::json!({
            "name": "web-1",
            "host": "192.0.2.1",
            "password": "OldPass1",
            "sshPassword": "root-pass",
        }))
        .unwrap()
        .into_server(owner, Utc::now())
        .unwrap();
        store.put(&server).await.unwrap();
        server
    }

    #[tokio::test]
    async fn reveal_encrypts_present_fields_only() {
        let (svc, store) = service();
        let server = seed_server(&store, "alice").await;
        let key = SessionKey::generate().unwrap();

        let resp = svc
            .reveal("alice", RevealTarget::Server(server.id), &key)
            .await
            .unwrap();

        assert_eq!(resp.len(), 2);
        assert!(resp.get("providerPassword").is_none());
        let password = crypto::decrypt(&key, resp.get("password").unwrap()).unwrap();
        assert_eq!(password, "OldPass1");
        let ssh = crypto::decrypt(&key, resp.get("sshPassword").unwrap()).unwrap();
        assert_eq!(ssh, "root-pass");
    }

    #[tokio::test]
    async fn repeated_reveals_use_fresh_nonces() {
        let (svc, store) = service();
        let server = seed_server(&store, "alice").await;
        let key = SessionKey::generate().unwrap();
        let target = RevealTarget::Server(server.id);

        let a = svc.reveal("alice", target, &key).await.unwrap();
        let b = svc.reveal("alice", target, &key).await.unwrap();
        assert_ne!(a.get("password"), b.get("password"));
    }

    #[tokio::test]
    async fn foreign_record_looks_missing() {
        let (svc, store) = service();
        let server = seed_server(&store, "alice").await;
        let key = SessionKey::generate().unwrap();

        let foreign = svc
            .reveal("bob", RevealTarget::Server(server.id), &key)
            .await
            .unwrap_err();
        let missing = svc
            .reveal("bob", RevealTarget::Server(Uuid::new_v4()), &key)
            .await
            .unwrap_err();
        assert!(matches!(
            foreign,
            RevealError::Store(StoreError::NotFound { .. })
        ));
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn settings_targets_map_to_their_fields() {
        let (svc, store) = service();
        let mut settings = Settings::default();
        settings.whois.api_key = Some("whois-key".to_owned());
        settings.notifications.smtp.password = Some("smtp-pass".to_owned());
        store.put_settings("alice", &settings).await.unwrap();
        let key = SessionKey::generate().unwrap();

        let whois = svc.reveal("alice", RevealTarget::WhoisKey, &key).await.unwrap();
        assert_eq!(crypto::decrypt(&key, whois.get("key").unwrap()).unwrap(), "whois-key");

        let bark = svc.reveal("alice", RevealTarget::BarkKey, &key).await.unwrap();
        assert!(bark.is_empty());

        let smtp = svc
            .reveal("alice", RevealTarget::SmtpPassword, &key)
            .await
            .unwrap();
        assert_eq!(
            crypto::decrypt(&key, smtp.get("password").unwrap()).unwrap(),
            "smtp-pass"
        );
    }

    #[tokio::test]
    async fn response_serializes_as_flat_object() {
        let (svc, store) = service();
        let server = seed_server(&store, "alice").await;
        let key = SessionKey::generate().unwrap();
        let resp = svc
            .reveal("alice", RevealTarget::Server(server.id), &key)
            .await
            .unwrap();

        let json = serde_json::to_value(&resp).unwrap();
        for part in ["iv", "tag", "data"] {
            assert!(json["password"][part].is_string());
        }
        assert!(json.get("providerPassword").is_none());
    }
}
