//! Revealed-value cache for the record currently on screen.
//!
//! Reveals are asynchronous; by the time one returns, the user may have
//! moved to another record. Every request takes a [`RevealTicket`] from
//! [`RevealCache::begin`], and [`RevealCache::apply`] accepts the result only
//! if the ticket still matches the active record and generation. Navigating
//! away, or calling [`RevealCache::invalidate`], drops every cached value.
//!
//! Settings secrets share wire names (the WHOIS and Bark keys both come back
//! as `key`), so they are cached under their settings path through
//! [`RevealCache::apply_setting`] instead.

use std::collections::HashMap;

use crate::types::{RecordRef, RevealedField, RevealedFields, SettingsSecret};

/// One secret field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub record: RecordRef,
    pub field: String,
}

impl FieldKey {
    #[must_use]
    pub fn new(record: RecordRef, field: impl Into<String>) -> Self {
        Self {
            record,
            field: field.into(),
        }
    }

    /// The slot for one settings secret.
    #[must_use]
    pub fn setting(secret: SettingsSecret) -> Self {
        Self::new(RecordRef::Settings, secret.name())
    }
}

/// Proof that a reveal was started for a given record and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RevealTicket {
    record: RecordRef,
    generation: u64,
}

/// Holds revealed plaintext for the active record only.
#[derive(Debug, Default)]
pub struct RevealCache {
    active: Option<RecordRef>,
    generation: u64,
    values: HashMap<FieldKey, RevealedField>,
}

impl RevealCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The record whose values may be cached.
    #[must_use]
    pub fn active(&self) -> Option<RecordRef> {
        self.active
    }

    /// Switch to `record`. Switching to a different record drops everything
    /// and cancels reveals in flight.
    pub fn navigate(&mut self, record: RecordRef) {
        if self.active != Some(record) {
            self.invalidate();
            self.active = Some(record);
        }
    }

    /// Start a reveal for `record`, navigating to it if needed.
    pub fn begin(&mut self, record: RecordRef) -> RevealTicket {
        self.navigate(record);
        RevealTicket {
            record,
            generation: self.generation,
        }
    }

    /// Store the result of a server or provider reveal. Returns `false`,
    /// discarding `fields`, if the ticket is stale or belongs to settings.
    pub fn apply(&mut self, ticket: RevealTicket, fields: RevealedFields) -> bool {
        if ticket.record == RecordRef::Settings {
            tracing::warn!("settings reveals must be applied per secret");
            return false;
        }
        if !self.is_current(ticket) {
            return false;
        }
        for (field, value) in fields {
            self.values.insert(FieldKey::new(ticket.record, field), value);
        }
        true
    }

    /// Store the result of one settings reveal. Returns `false` if the
    /// ticket is stale or not for settings.
    pub fn apply_setting(
        &mut self,
        ticket: RevealTicket,
        secret: SettingsSecret,
        value: RevealedField,
    ) -> bool {
        if ticket.record != RecordRef::Settings || !self.is_current(ticket) {
            return false;
        }
        self.values.insert(FieldKey::setting(secret), value);
        true
    }

    fn is_current(&self, ticket: RevealTicket) -> bool {
        let current = self.active == Some(ticket.record) && self.generation == ticket.generation;
        if !current {
            tracing::debug!(record = %ticket.record, "discarding stale reveal");
        }
        current
    }

    #[must_use]
    pub fn get(&self, key: &FieldKey) -> Option<&RevealedField> {
        self.values.get(key)
    }

    /// Drop one value, e.g. after the user edits that field.
    pub fn forget(&mut self, key: &FieldKey) {
        self.values.remove(key);
    }

    /// Drop everything and cancel reveals in flight. Called on navigation
    /// and logout.
    pub fn invalidate(&mut self) {
        self.values.clear();
        self.active = None;
        self.generation = self.generation.wrapping_add(1);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
