//! Write-path merge rule for secret fields.
//!
//! A form that loaded a record in redacted mode never saw the stored
//! secrets, so on save it cannot echo them back. Instead each secret field
//! in a create or update payload carries one of:
//!
//! | payload value      | effect on the stored secret |
//! |--------------------|-----------------------------|
//! | key absent         | keep                        |
//! | `"__KEEP__"`       | keep                        |
//! | `""`               | clear                       |
//! | any other string   | replace                     |
//! | `null`             | rejected (ambiguous)        |
//! | non-string value   | rejected (invalid)          |
//!
//! Strings longer than [`MAX_SECRET_LEN`] bytes are rejected. Every secret
//! in a payload is resolved before the record is touched, so a rejected
//! payload leaves the stored record unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::MergeError;
use crate::model::{Provider, Server, Settings, fields};

/// Payload value meaning "leave the stored secret as it is".
pub const KEEP_SENTINEL: &str = "__KEEP__";

/// Upper bound on a secret value, in bytes.
pub const MAX_SECRET_LEN: usize = 4096;

/// The resolved intent for one secret field.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum SecretUpdate {
    /// Leave the stored value untouched.
    #[default]
    Keep,
    /// Remove the stored value.
    Clear,
    /// Store a new value.
    Replace(String),
}

impl SecretUpdate {
    /// Interpret a string payload value. Length is not checked here.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            KEEP_SENTINEL => Self::Keep,
            "" => Self::Clear,
            other => Self::Replace(other.to_owned()),
        }
    }

    /// Apply the update to a stored secret.
    pub fn apply(self, stored: &mut Option<String>) {
        match self {
            Self::Keep => {}
            Self::Clear => *stored = None,
            Self::Replace(value) => *stored = Some(value),
        }
    }

    /// The initial stored value on create, where keep and clear both mean
    /// "no secret".
    #[must_use]
    pub fn into_initial(self) -> Option<String> {
        match self {
            Self::Keep | Self::Clear => None,
            Self::Replace(value) => Some(value),
        }
    }

    /// Short name of the action, safe to log.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Clear => "clear",
            Self::Replace(_) => "replace",
        }
    }
}

impl fmt::Debug for SecretUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("Keep"),
            Self::Clear => f.write_str("Clear"),
            Self::Replace(_) => f.write_str("Replace([REDACTED])"),
        }
    }
}

/// A raw secret field as it arrived in a JSON payload.
///
/// Use with `#[serde(default)]`: a missing key deserializes to the default
/// (`None`), while an explicit `null` arrives as `Some(Value::Null)`, so the
/// two stay distinguishable.
#[derive(Clone, Default)]
pub struct SecretInput(Option<Value>);

impl SecretInput {
    /// Input carrying a string value, as a client would send it.
    #[must_use]
    pub fn from_str_value(value: impl Into<String>) -> Self {
        Self(Some(Value::String(value.into())))
    }

    /// Whether the key was present in the payload at all.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.0.is_some()
    }

    /// Resolve the raw input for `field` into a [`SecretUpdate`].
    ///
    /// # Errors
    ///
    /// - [`MergeError::Ambiguous`] for an explicit `null`.
    /// - [`MergeError::InvalidValue`] for a non-string value.
    /// - [`MergeError::TooLong`] for a string over [`MAX_SECRET_LEN`] bytes.
    pub fn resolve(self, field: &'static str) -> Result<SecretUpdate, MergeError> {
        let update = match self.0 {
            None => SecretUpdate::Keep,
            Some(Value::Null) => return Err(MergeError::Ambiguous { field }),
            Some(Value::String(value)) => {
                if value.len() > MAX_SECRET_LEN {
                    return Err(MergeError::TooLong {
                        field,
                        max: MAX_SECRET_LEN,
                    });
                }
                SecretUpdate::parse(&value)
            }
            Some(_) => return Err(MergeError::InvalidValue { field }),
        };
        debug!(field, action = update.action(), "secret field resolved");
        Ok(update)
    }
}

impl<'de> Deserialize<'de> for SecretInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Self(Some(value)))
    }
}

impl fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("SecretInput(absent)"),
            Some(Value::Null) => f.write_str("SecretInput(null)"),
            Some(_) => f.write_str("SecretInput([REDACTED])"),
        }
    }
}

fn required(field: &'static str, value: String) -> Result<String, MergeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MergeError::Required { field });
    }
    Ok(trimmed.to_owned())
}

/// `""` means "no value" for optional plain fields.
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Absent leaves the field, `""` clears it, anything else replaces it.
fn patch_optional(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *target = optional(Some(value));
    }
}

// ── Servers ──────────────────────────────────────────────────────────

/// Create payload for a server.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NewServer {
    pub name: String,
    pub host: String,
    pub panel_url: Option<String>,
    pub panel_username: Option<String>,
    pub password: SecretInput,
    pub ssh_port: Option<u16>,
    pub ssh_username: Option<String>,
    pub ssh_password: SecretInput,
    pub provider_id: Option<Uuid>,
    pub provider_username: Option<String>,
    pub provider_password: SecretInput,
    pub notes: Option<String>,
}

impl NewServer {
    /// Build the stored record for `owner`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] if a secret field is rejected or `name` /
    /// `host` is empty.
    pub fn into_server(self, owner: &str, now: DateTime<Utc>) -> Result<Server, MergeError> {
        let password = self.password.resolve(fields::PASSWORD)?;
        let ssh_password = self.ssh_password.resolve(fields::SSH_PASSWORD)?;
        let provider_password = self.provider_password.resolve(fields::PROVIDER_PASSWORD)?;

        Ok(Server {
            id: Uuid::new_v4(),
            owner: owner.to_owned(),
            name: required("name", self.name)?,
            host: required("host", self.host)?,
            panel_url: optional(self.panel_url),
            panel_username: optional(self.panel_username),
            password: password.into_initial(),
            ssh_port: self.ssh_port,
            ssh_username: optional(self.ssh_username),
            ssh_password: ssh_password.into_initial(),
            provider_id: self.provider_id,
            provider_username: optional(self.provider_username),
            provider_password: provider_password.into_initial(),
            notes: optional(self.notes),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Update payload for a server. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ServerPatch {
    pub name: Option<String>,
    pub host: Option<String>,
    pub panel_url: Option<String>,
    pub panel_username: Option<String>,
    pub password: SecretInput,
    pub ssh_port: Option<u16>,
    pub ssh_username: Option<String>,
    pub ssh_password: SecretInput,
    pub provider_id: Option<Uuid>,
    pub provider_username: Option<String>,
    pub provider_password: SecretInput,
    pub notes: Option<String>,
}

impl ServerPatch {
    /// Merge the patch into `server`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] without modifying `server` if any field is
    /// rejected.
    pub fn apply(self, server: &mut Server, now: DateTime<Utc>) -> Result<(), MergeError> {
        let password = self.password.resolve(fields::PASSWORD)?;
        let ssh_password = self.ssh_password.resolve(fields::SSH_PASSWORD)?;
        let provider_password = self.provider_password.resolve(fields::PROVIDER_PASSWORD)?;
        let name = self.name.map(|v| required("name", v)).transpose()?;
        let host = self.host.map(|v| required("host", v)).transpose()?;

        if let Some(name) = name {
            server.name = name;
        }
        if let Some(host) = host {
            server.host = host;
        }
        patch_optional(&mut server.panel_url, self.panel_url);
        patch_optional(&mut server.panel_username, self.panel_username);
        password.apply(&mut server.password);
        if self.ssh_port.is_some() {
            server.ssh_port = self.ssh_port;
        }
        patch_optional(&mut server.ssh_username, self.ssh_username);
        ssh_password.apply(&mut server.ssh_password);
        if self.provider_id.is_some() {
            server.provider_id = self.provider_id;
        }
        patch_optional(&mut server.provider_username, self.provider_username);
        provider_password.apply(&mut server.provider_password);
        patch_optional(&mut server.notes, self.notes);
        server.updated_at = now;
        Ok(())
    }
}

// ── Providers ────────────────────────────────────────────────────────

/// Create payload for a provider.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NewProvider {
    pub name: String,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: SecretInput,
}

impl NewProvider {
    /// Build the stored record for `owner`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] if the password is rejected or `name` is
    /// empty.
    pub fn into_provider(self, owner: &str, now: DateTime<Utc>) -> Result<Provider, MergeError> {
        let password = self.password.resolve(fields::PASSWORD)?;
        Ok(Provider {
            id: Uuid::new_v4(),
            owner: owner.to_owned(),
            name: required("name", self.name)?,
            url: optional(self.url),
            username: optional(self.username),
            password: password.into_initial(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Update payload for a provider.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProviderPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: SecretInput,
}

impl ProviderPatch {
    /// Merge the patch into `provider`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] without modifying `provider` if any field
    /// is rejected.
    pub fn apply(self, provider: &mut Provider, now: DateTime<Utc>) -> Result<(), MergeError> {
        let password = self.password.resolve(fields::PASSWORD)?;
        let name = self.name.map(|v| required("name", v)).transpose()?;

        if let Some(name) = name {
            provider.name = name;
        }
        patch_optional(&mut provider.url, self.url);
        patch_optional(&mut provider.username, self.username);
        password.apply(&mut provider.password);
        provider.updated_at = now;
        Ok(())
    }
}

// ── Settings ─────────────────────────────────────────────────────────

/// Update payload for the settings document. Blocks left out are untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub whois: Option<WhoisPatch>,
    pub notifications: Option<NotificationsPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct WhoisPatch {
    pub api_url: Option<String>,
    pub api_key: SecretInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NotificationsPatch {
    pub bark: Option<BarkPatch>,
    pub smtp: Option<SmtpPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct BarkPatch {
    pub enabled: Option<bool>,
    pub server_url: Option<String>,
    pub key: SecretInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SmtpPatch {
    pub enabled: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub username: Option<String>,
    pub password: SecretInput,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl SettingsPatch {
    /// Merge the patch into `settings`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] without modifying `settings` if any secret
    /// is rejected.
    pub fn apply(self, settings: &mut Settings) -> Result<(), MergeError> {
        let (whois, whois_key) = match self.whois {
            Some(mut patch) => {
                let key = std::mem::take(&mut patch.api_key).resolve(fields::WHOIS_API_KEY)?;
                (Some(patch), key)
            }
            None => (None, SecretUpdate::Keep),
        };
        let (bark, smtp) = self
            .notifications
            .map_or((None, None), |n| (n.bark, n.smtp));
        let (bark, bark_key) = match bark {
            Some(mut patch) => {
                let key = std::mem::take(&mut patch.key).resolve(fields::BARK_KEY)?;
                (Some(patch), key)
            }
            None => (None, SecretUpdate::Keep),
        };
        let (smtp, smtp_password) = match smtp {
            Some(mut patch) => {
                let password = std::mem::take(&mut patch.password).resolve(fields::SMTP_PASSWORD)?;
                (Some(patch), password)
            }
            None => (None, SecretUpdate::Keep),
        };

        if let Some(patch) = whois {
            patch_optional(&mut settings.whois.api_url, patch.api_url);
        }
        whois_key.apply(&mut settings.whois.api_key);

        let target = &mut settings.notifications.bark;
        if let Some(patch) = bark {
            if let Some(enabled) = patch.enabled {
                target.enabled = enabled;
            }
            patch_optional(&mut target.server_url, patch.server_url);
        }
        bark_key.apply(&mut target.key);

        let target = &mut settings.notifications.smtp;
        if let Some(patch) = smtp {
            if let Some(enabled) = patch.enabled {
                target.enabled = enabled;
            }
            patch_optional(&mut target.host, patch.host);
            if patch.port.is_some() {
                target.port = patch.port;
            }
            if let Some(secure) = patch.secure {
                target.secure = secure;
            }
            patch_optional(&mut target.username, patch.username);
            patch_optional(&mut target.from, patch.from);
            patch_optional(&mut target.to, patch.to);
        }
        smtp_password.apply(&mut target.password);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::redact::{Redact, RedactConfig, RedactionPolicy};

    fn server_with_password(password: &str) -> Server {
        let payload = serde_json::json!({
            "name": "web-1",
            "host": "203.0.113.10",
            "password": password,
        });
        serde_json::from_value::<NewServer>(payload)
            .unwrap()
            .into_server("alice", Utc::now())
            .unwrap()
    }

    fn patch(value: serde_json::Value) -> Result<ServerPatch, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn parse_covers_sentinel_empty_and_value() {
        assert_eq!(SecretUpdate::parse(KEEP_SENTINEL), SecretUpdate::Keep);
        assert_eq!(SecretUpdate::parse(""), SecretUpdate::Clear);
        assert_eq!(
            SecretUpdate::parse("NewPass2"),
            SecretUpdate::Replace("NewPass2".to_owned())
        );
    }

    #[test]
    fn keep_sentinel_leaves_secret() {
        let mut server = server_with_password("OldPass1");
        patch(serde_json::json!({ "password": "__KEEP__" }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap();
        assert_eq!(server.password.as_deref(), Some("OldPass1"));
    }

    #[test]
    fn empty_string_clears_secret() {
        let mut server = server_with_password("OldPass1");
        patch(serde_json::json!({ "password": "" }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap();
        assert_eq!(server.password, None);

        let view = server.redact(&RedactionPolicy::new(RedactConfig { enabled: true }));
        assert!(!view.has_password);
    }

    #[test]
    fn new_value_replaces_secret() {
        let mut server = server_with_password("OldPass1");
        patch(serde_json::json!({ "password": "NewPass2" }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap();
        assert_eq!(server.password.as_deref(), Some("NewPass2"));
    }

    #[test]
    fn absent_key_keeps_secret() {
        let mut server = server_with_password("OldPass1");
        patch(serde_json::json!({ "notes": "rack 4" }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap();
        assert_eq!(server.password.as_deref(), Some("OldPass1"));
        assert_eq!(server.notes.as_deref(), Some("rack 4"));
    }

    #[test]
    fn null_is_ambiguous_and_leaves_record_untouched() {
        let mut server = server_with_password("OldPass1");
        let before = server.clone();
        let err = patch(serde_json::json!({ "name": "renamed", "sshPassword": null }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::Ambiguous {
                field: fields::SSH_PASSWORD
            }
        );
        assert_eq!(err.code(), "ambiguous_secret_update");
        assert_eq!(server, before);
    }

    #[test]
    fn non_string_is_invalid() {
        let mut server = server_with_password("OldPass1");
        let err = patch(serde_json::json!({ "password": 12345 }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "invalid_secret_value");
        assert_eq!(err.field(), "password");
    }

    #[test]
    fn oversized_secret_is_rejected() {
        let mut server = server_with_password("OldPass1");
        let err = patch(serde_json::json!({ "password": "x".repeat(MAX_SECRET_LEN + 1) }))
            .unwrap()
            .apply(&mut server, Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "secret_too_long");

        let at_limit = patch(serde_json::json!({ "password": "x".repeat(MAX_SECRET_LEN) }));
        assert!(at_limit.unwrap().apply(&mut server, Utc::now()).is_ok());
    }

    #[test]
    fn create_treats_keep_and_clear_as_no_secret() {
        for value in [KEEP_SENTINEL, ""] {
            let server = server_with_password(value);
            assert_eq!(server.password, None);
        }
    }

    #[test]
    fn create_requires_name_and_host() {
        let payload: NewServer = serde_json::from_value(serde_json::json!({ "name": "  " })).unwrap();
        let err = payload.into_server("alice", Utc::now()).unwrap_err();
        assert_eq!(err, MergeError::Required { field: "name" });
    }

    #[test]
    fn unknown_fields_are_refused() {
        assert!(patch(serde_json::json!({ "passwrd": "typo" })).is_err());
    }

    #[test]
    fn provider_patch_merges_password() {
        let mut provider = serde_json::from_value::<NewProvider>(serde_json::json!({
            "name": "Hetzner",
            "password": "console-pass",
        }))
        .unwrap()
        .into_provider("alice", Utc::now())
        .unwrap();

        let keep: ProviderPatch =
            serde_json::from_value(serde_json::json!({ "url": "https://console" })).unwrap();
        keep.apply(&mut provider, Utc::now()).unwrap();
        assert_eq!(provider.password.as_deref(), Some("console-pass"));

        let clear: ProviderPatch =
            serde_json::from_value(serde_json::json!({ "password": "" })).unwrap();
        clear.apply(&mut provider, Utc::now()).unwrap();
        assert_eq!(provider.password, None);
    }

    #[test]
    fn settings_patch_merges_nested_secrets() {
        let mut settings = Settings::default();
        settings.whois.api_key = Some("whois-old".to_owned());
        settings.notifications.smtp.password = Some("smtp-old".to_owned());

        let patch: SettingsPatch = serde_json::from_value(serde_json::json!({
            "whois": { "apiUrl": "https://whois.example" },
            "notifications": {
                "bark": { "enabled": true, "key": "device-1" },
                "smtp": { "password": "" }
            }
        }))
        .unwrap();
        patch.apply(&mut settings).unwrap();

        assert_eq!(settings.whois.api_key.as_deref(), Some("whois-old"));
        assert_eq!(settings.whois.api_url.as_deref(), Some("https://whois.example"));
        assert!(settings.notifications.bark.enabled);
        assert_eq!(settings.notifications.bark.key.as_deref(), Some("device-1"));
        assert_eq!(settings.notifications.smtp.password, None);
    }

    #[test]
    fn settings_patch_reports_nested_field_name() {
        let mut settings = Settings::default();
        let patch: SettingsPatch = serde_json::from_value(serde_json::json!({
            "notifications": { "bark": { "key": null } }
        }))
        .unwrap();
        let err = patch.apply(&mut settings).unwrap_err();
        assert_eq!(err.field(), "notifications.bark.key");
    }

    #[test]
    fn debug_output_hides_secret_values() {
        let input = SecretInput::from_str_value("hunter2");
        assert!(!format!("{input:?}").contains("hunter2"));
        let update = SecretUpdate::Replace("hunter2".to_owned());
        assert!(!format!("{update:?}").contains("hunter2"));
    }
}
