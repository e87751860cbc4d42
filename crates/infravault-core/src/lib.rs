//! Core library for `InfraVault`.
//!
//! Contains the reveal envelope codec, the redaction policy for normal
//! reads, the write-path merge rule for secret fields, the record model and
//! per-user record store, bearer tokens, and the reveal service. This crate
//! depends on `infravault-storage` for the storage backend trait and knows
//! nothing about HTTP.

pub mod crypto;
pub mod error;
pub mod merge;
pub mod model;
pub mod redact;
pub mod reveal;
pub mod store;
pub mod token;
