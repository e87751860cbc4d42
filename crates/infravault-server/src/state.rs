//! Shared application state for `InfraVault` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Apart from the storage behind the stores it is
//! read-only.

use std::sync::Arc;

use infravault_core::redact::RedactionPolicy;
use infravault_core::reveal::RevealService;
use infravault_core::store::RecordStore;
use infravault_core::token::TokenStore;
use infravault_storage::StorageBackend;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Per-user servers, providers and settings.
    pub record_store: Arc<RecordStore>,
    /// Bearer token lookup and revocation.
    pub token_store: Arc<TokenStore>,
    /// Envelope encryption of stored secrets.
    pub reveal: RevealService,
    /// Redaction applied on normal reads.
    pub policy: RedactionPolicy,
}

impl AppState {
    /// Wire every service onto one storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, policy: RedactionPolicy) -> Self {
        let record_store = Arc::new(RecordStore::new(Arc::clone(&storage)));
        Self {
            reveal: RevealService::new(Arc::clone(&record_store)),
            token_store: Arc::new(TokenStore::new(storage)),
            record_store,
            policy,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("redact", &self.policy.is_enabled())
            .finish_non_exhaustive()
    }
}
