//! Public types for the `InfraVault` client.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;
use zeroize::Zeroizing;

use infravault_core::model::fields;
pub use infravault_core::model::{ProviderView, ServerView, SettingsView};

/// How an absent secret is rendered.
pub const ABSENT_MARKER: &str = "-";

/// The outcome of revealing one secret field.
#[derive(Clone, PartialEq, Eq)]
pub enum RevealedField {
    /// Decrypted plaintext. Kept in memory only; never persist it.
    Revealed(Zeroizing<String>),
    /// No secret stored; rendered as [`ABSENT_MARKER`].
    Absent,
    /// The envelope did not open; the reason is safe to show.
    Failed(String),
}

impl RevealedField {
    /// The plaintext, if the field was revealed.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Revealed(value) => Some(value.as_str()),
            Self::Absent | Self::Failed(_) => None,
        }
    }

    /// Text to show in place of the secret.
    #[must_use]
    pub fn display(&self) -> &str {
        match self {
            Self::Revealed(value) => value.as_str(),
            Self::Absent => ABSENT_MARKER,
            Self::Failed(_) => "<decryption failed>",
        }
    }
}

impl fmt::Debug for RevealedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revealed(_) => f.write_str("Revealed([REDACTED])"),
            Self::Absent => f.write_str("Absent"),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Every field a reveal endpoint can return, keyed by wire name.
pub type RevealedFields = BTreeMap<String, RevealedField>;

/// Identifies the record a reveal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordRef {
    Server(Uuid),
    Provider(Uuid),
    Settings,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "server {id}"),
            Self::Provider(id) => write!(f, "provider {id}"),
            Self::Settings => f.write_str("settings"),
        }
    }
}

/// Which settings secret to reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSecret {
    WhoisKey,
    BarkKey,
    SmtpPassword,
}

impl SettingsSecret {
    pub(crate) const fn path(self) -> &'static str {
        match self {
            Self::WhoisKey => "/reveal/settings/key",
            Self::BarkKey => "/reveal/settings/bark-key",
            Self::SmtpPassword => "/reveal/settings/smtp-password",
        }
    }

    /// Wire name of the returned field. Not unique across settings secrets.
    pub const fn field(self) -> &'static str {
        match self {
            Self::WhoisKey | Self::BarkKey => fields::KEY,
            Self::SmtpPassword => fields::PASSWORD,
        }
    }

    /// Path of the secret within the settings document, e.g.
    /// `notifications.bark.key`. Unique per secret.
    pub const fn name(self) -> &'static str {
        match self {
            Self::WhoisKey => fields::WHOIS_API_KEY,
            Self::BarkKey => fields::BARK_KEY,
            Self::SmtpPassword => fields::SMTP_PASSWORD,
        }
    }
}

/// Create or update payload for a server.
///
/// `None` fields are left out of the JSON, which the server treats as
/// "keep". Secret fields should come from
/// [`SecretDraft::payload`](crate::draft::SecretDraft::payload).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Create or update payload for a provider.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}
