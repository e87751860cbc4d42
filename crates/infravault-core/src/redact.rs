//! Redaction policy for secret fields on normal (non-reveal) reads.
//!
//! Every secret field is in one of three states when a record is serialized:
//!
//! | stored secret | redact mode | wire result                          |
//! |---------------|-------------|--------------------------------------|
//! | none / `""`   | any         | value omitted, flag omitted          |
//! | set           | off         | plaintext value + `has<Field>: true` |
//! | set           | on          | value omitted, `has<Field>: true`    |
//!
//! The mode comes from an explicit [`RedactConfig`] handed to
//! [`RedactionPolicy::new`], so the decision is a pure function of
//! `(config, record)`. Switching the mode never touches stored values; it
//! only changes what the next read returns.

use serde::Serialize;

/// Deployment-level redaction switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactConfig {
    /// When `true`, secret values never appear on normal reads.
    pub enabled: bool,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// What a single secret field turns into on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disclosure {
    /// No secret stored: emit neither value nor flag.
    Absent,
    /// Secret stored, redacted: emit only the presence flag.
    Flagged,
    /// Secret stored, redaction off: emit the value and the flag.
    Plaintext(String),
}

impl Disclosure {
    /// Split into the `(value, has_flag)` pair a view struct stores.
    #[must_use]
    pub fn into_parts(self) -> (Option<String>, bool) {
        match self {
            Self::Absent => (None, false),
            Self::Flagged => (None, true),
            Self::Plaintext(value) => (Some(value), true),
        }
    }

    /// Whether a secret is stored at all.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Decides per field whether a secret is disclosed, flagged, or omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedactionPolicy {
    config: RedactConfig,
}

impl RedactionPolicy {
    /// Build a policy from an explicit configuration.
    #[must_use]
    pub const fn new(config: RedactConfig) -> Self {
        Self { config }
    }

    /// Whether secret values are withheld from normal reads.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Decide how one stored secret is serialized.
    #[must_use]
    pub fn disclose(&self, secret: Option<&str>) -> Disclosure {
        match secret {
            Some(value) if is_present(Some(value)) => {
                if self.config.enabled {
                    Disclosure::Flagged
                } else {
                    Disclosure::Plaintext(value.to_owned())
                }
            }
            _ => Disclosure::Absent,
        }
    }
}

/// A stored secret counts as present iff it is a non-empty string.
#[must_use]
pub fn is_present(secret: Option<&str>) -> bool {
    secret.is_some_and(|s| !s.is_empty())
}

/// Records that can be serialized for the API under a [`RedactionPolicy`].
pub trait Redact {
    /// The API-facing shape of the record.
    type View: Serialize;

    /// Produce the view, applying `policy` to every secret field.
    fn redact(&self, policy: &RedactionPolicy) -> Self::View;
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
