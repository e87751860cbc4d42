//! Secret-bearing inventory records and their API views.
//!
//! Stored records ([`Server`], [`Provider`], [`Settings`]) keep secret
//! fields as plain `Option<String>`. They never leave the server as-is:
//! handlers serialize them through [`Redact`] into the matching `*View`,
//! which carries `has<Field>` presence flags instead of (or, with redaction
//! off, next to) the secret values.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redact::{Redact, RedactionPolicy, is_false};

/// Identifier of the user owning a record.
pub type UserId = String;

/// Current version of the [`Settings`] schema.
pub const SETTINGS_VERSION: u32 = 1;

/// Wire names of secret fields, shared by views, reveal responses and
/// merge errors.
pub mod fields {
    pub const PASSWORD: &str = "password";
    pub const SSH_PASSWORD: &str = "sshPassword";
    pub const PROVIDER_PASSWORD: &str = "providerPassword";
    pub const KEY: &str = "key";

    /// Settings secrets by path within the settings document. Several of
    /// them share a wire name (`key`), so these are what identify them.
    pub const WHOIS_API_KEY: &str = "whois.apiKey";
    pub const BARK_KEY: &str = "notifications.bark.key";
    pub const SMTP_PASSWORD: &str = "notifications.smtp.password";
}

/// The kinds of record that hold secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Server,
    Provider,
    Settings,
}

impl RecordKind {
    /// Lowercase name, used in storage keys and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Provider => "provider",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-user collection record that the [`RecordStore`](crate::store::RecordStore)
/// can persist generically.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Record kind, for errors and logs.
    const KIND: RecordKind;
    /// Storage collection segment (`users/<owner>/<collection>/<id>`).
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
    fn owner(&self) -> &str;
    /// Listing order.
    fn sort_key(&self) -> &str;
}

// ── Servers ──────────────────────────────────────────────────────────

/// A managed server with up to three stored credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: Uuid,
    pub owner: UserId,
    pub name: String,
    pub host: String,
    pub panel_url: Option<String>,
    pub panel_username: Option<String>,
    /// Control panel password.
    pub password: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_username: Option<String>,
    pub ssh_password: Option<String>,
    pub provider_id: Option<Uuid>,
    pub provider_username: Option<String>,
    /// Hosting provider console password for this server.
    pub provider_password: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Server {
    const KIND: RecordKind = RecordKind::Server;
    const COLLECTION: &'static str = "servers";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn sort_key(&self) -> &str {
        &self.name
    }
}

/// API view of a [`Server`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerView {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_password: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_ssh_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_password: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_provider_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redact for Server {
    type View = ServerView;

    fn redact(&self, policy: &RedactionPolicy) -> ServerView {
        let (password, has_password) = policy.disclose(self.password.as_deref()).into_parts();
        let (ssh_password, has_ssh_password) =
            policy.disclose(self.ssh_password.as_deref()).into_parts();
        let (provider_password, has_provider_password) = policy
            .disclose(self.provider_password.as_deref())
            .into_parts();

        ServerView {
            id: self.id,
            name: self.name.clone(),
            host: self.host.clone(),
            panel_url: self.panel_url.clone(),
            panel_username: self.panel_username.clone(),
            password,
            has_password,
            ssh_port: self.ssh_port,
            ssh_username: self.ssh_username.clone(),
            ssh_password,
            has_ssh_password,
            provider_id: self.provider_id,
            provider_username: self.provider_username.clone(),
            provider_password,
            has_provider_password,
            notes: self.notes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ── Providers ────────────────────────────────────────────────────────

/// A hosting or domain provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub owner: UserId,
    pub name: String,
    pub url: Option<String>,
    pub username: Option<String>,
    /// Provider console password.
    pub password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Provider {
    const KIND: RecordKind = RecordKind::Provider;
    const COLLECTION: &'static str = "providers";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn sort_key(&self) -> &str {
        &self.name
    }
}

/// API view of a [`Provider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderView {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redact for Provider {
    type View = ProviderView;

    fn redact(&self, policy: &RedactionPolicy) -> ProviderView {
        let (password, has_password) = policy.disclose(self.password.as_deref()).into_parts();
        ProviderView {
            id: self.id,
            name: self.name.clone(),
            url: self.url.clone(),
            username: self.username.clone(),
            password,
            has_password,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ── Settings ─────────────────────────────────────────────────────────

/// Per-user settings document.
///
/// The schema is explicit and versioned: every block and field is spelled
/// out here, and documents written by a newer schema are refused on load
/// rather than guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Schema version; documents that predate the field are version 1.
    #[serde(default = "initial_settings_version")]
    pub version: u32,
    #[serde(default)]
    pub whois: WhoisSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

const fn initial_settings_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            whois: WhoisSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

/// WHOIS lookup service credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

/// Notification channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default)]
    pub bark: BarkSettings,
    #[serde(default)]
    pub smtp: SmtpSettings,
}

/// Bark push notification channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarkSettings {
    #[serde(default)]
    pub enabled: bool,
    pub server_url: Option<String>,
    /// Device key.
    pub key: Option<String>,
}

/// SMTP email channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettings {
    #[serde(default)]
    pub enabled: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// API view of [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub version: u32,
    pub whois: WhoisView,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_whois_api_key: bool,
    pub notifications: NotificationsView,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsView {
    pub bark: BarkView,
    pub smtp: SmtpView,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarkView {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpView {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl Redact for Settings {
    type View = SettingsView;

    fn redact(&self, policy: &RedactionPolicy) -> SettingsView {
        let (api_key, has_whois_api_key) =
            policy.disclose(self.whois.api_key.as_deref()).into_parts();
        let bark = &self.notifications.bark;
        let (bark_key, has_key) = policy.disclose(bark.key.as_deref()).into_parts();
        let smtp = &self.notifications.smtp;
        let (smtp_password, has_password) = policy.disclose(smtp.password.as_deref()).into_parts();

        SettingsView {
            version: self.version,
            whois: WhoisView {
                api_url: self.whois.api_url.clone(),
                api_key,
            },
            has_whois_api_key,
            notifications: NotificationsView {
                bark: BarkView {
                    enabled: bark.enabled,
                    server_url: bark.server_url.clone(),
                    key: bark_key,
                    has_key,
                },
                smtp: SmtpView {
                    enabled: smtp.enabled,
                    host: smtp.host.clone(),
                    port: smtp.port,
                    secure: smtp.secure,
                    username: smtp.username.clone(),
                    password: smtp_password,
                    has_password,
                    from: smtp.from.clone(),
                    to: smtp.to.clone(),
                },
            },
        }
    }
}
