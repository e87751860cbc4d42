//! Edit state for one secret field in a form.
//!
//! A form opened in redacted mode never holds the stored secret, so the
//! field starts empty with a "saved" placeholder. Until the user types into
//! it, saving sends the keep sentinel; once edited, saving sends exactly what
//! was typed, where an empty string clears the secret.

use infravault_core::merge::KEEP_SENTINEL;
use zeroize::Zeroizing;

use crate::error::ClientError;

/// Placeholder shown in place of a stored, unedited secret.
pub const SAVED_PLACEHOLDER: &str = "••••••••";

/// One secret input field.
pub struct SecretDraft {
    field: &'static str,
    present: bool,
    edited: bool,
    value: Zeroizing<String>,
}

impl SecretDraft {
    /// A draft for `field`, where `present` is the record's `has<Field>` flag.
    #[must_use]
    pub fn new(field: &'static str, present: bool) -> Self {
        Self {
            field,
            present,
            edited: false,
            value: Zeroizing::new(String::new()),
        }
    }

    /// Record user input. Typing anything, even clearing the box, counts as
    /// an edit.
    pub fn edit(&mut self, value: impl Into<String>) {
        self.value = Zeroizing::new(value.into());
        self.edited = true;
    }

    /// Discard the edit and return to the saved state.
    pub fn revert(&mut self) {
        self.value = Zeroizing::new(String::new());
        self.edited = false;
    }

    #[must_use]
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The value to send for this field on save.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SentinelCollision`] if the typed value is the
    /// keep sentinel itself, which the server would silently ignore.
    pub fn payload(&self) -> Result<String, ClientError> {
        if !self.edited {
            return Ok(KEEP_SENTINEL.to_owned());
        }
        if self.value.as_str() == KEEP_SENTINEL {
            return Err(ClientError::SentinelCollision {
                field: self.field.to_owned(),
            });
        }
        Ok(self.value.to_string())
    }

    /// Call after a successful save.
    pub fn mark_saved(&mut self) {
        if self.edited {
            self.present = !self.value.is_empty();
        }
        self.revert();
    }

    /// Text for the input's placeholder.
    #[must_use]
    pub fn placeholder(&self) -> &'static str {
        if !self.edited && self.present {
            SAVED_PLACEHOLDER
        } else {
            ""
        }
    }

    /// Text for the input's value: blank until edited.
    #[must_use]
    pub fn input_value(&self) -> &str {
        if self.edited { self.value.as_str() } else { "" }
    }
}

impl std::fmt::Debug for SecretDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretDraft")
            .field("field", &self.field)
            .field("present", &self.present)
            .field("edited", &self.edited)
            .finish_non_exhaustive()
    }
}
