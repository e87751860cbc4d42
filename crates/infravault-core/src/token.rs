//! Bearer token store.
//!
//! Every API request carries `Authorization: Bearer <token>`; the token maps
//! to exactly one user id, which scopes every record lookup.
//!
//! # Security model
//!
//! - Tokens are `ivt_` followed by a UUID v4 (122 bits of OS randomness).
//! - Only `SHA-256(token)` is persisted. The plaintext is returned once at
//!   creation and never stored.
//! - Lookup hashes the presented token and fetches by hash; the stored hash
//!   is compared again in constant time.
//! - Tokens may carry a TTL. Logout revokes the presented token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use infravault_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::error::TokenError;
use crate::model::UserId;

/// Storage prefix for token entries.
const TOKEN_PREFIX: &str = "sys/tokens/";

/// Prefix of every minted token.
pub const TOKEN_PREFIX_PUBLIC: &str = "ivt_";

/// A stored token entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    /// SHA-256 hash of the token (hex-encoded). Also the storage key.
    pub token_hash: String,
    /// The user this token authenticates as.
    pub user_id: UserId,
    /// Display name for logs.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    /// When the token expires (None = never).
    pub expires_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a new token.
#[derive(Debug, Clone)]
pub struct CreateTokenParams {
    pub user_id: UserId,
    pub display_name: String,
    /// Time-to-live from now.
    pub ttl: Option<Duration>,
}

/// Manages token creation, lookup and revocation.
pub struct TokenStore {
    storage: Arc<dyn StorageBackend>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Mint a new token and persist its hash.
    ///
    /// Returns the plaintext token (shown once, never stored).
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidUser`] if the user id is malformed.
    /// - [`TokenError::Storage`] / [`TokenError::Serialization`] on failure.
    pub async fn create(&self, params: CreateTokenParams) -> Result<String, TokenError> {
        let plaintext = format!("{TOKEN_PREFIX_PUBLIC}{}", uuid::Uuid::new_v4().simple());
        self.register(&plaintext, params).await?;
        Ok(plaintext)
    }

    /// Persist a caller-chosen token, e.g. the bootstrap token from
    /// configuration. Registering the same token again overwrites it.
    ///
    /// # Errors
    ///
    /// Same as [`TokenStore::create`].
    pub async fn register(
        &self,
        plaintext: &str,
        params: CreateTokenParams,
    ) -> Result<TokenEntry, TokenError> {
        validate_user_id(&params.user_id)?;

        let now = Utc::now();
        let entry = TokenEntry {
            token_hash: hash_token(plaintext),
            user_id: params.user_id,
            display_name: params.display_name,
            created_at: now,
            expires_at: params.ttl.map(|ttl| now + ttl),
        };

        let bytes = serde_json::to_vec(&entry).map_err(|e| TokenError::Serialization {
            reason: e.to_string(),
        })?;
        self.storage
            .put(&format!("{TOKEN_PREFIX}{}", entry.token_hash), &bytes)
            .await?;

        info!(user = %entry.user_id, display_name = %entry.display_name, "token created");
        Ok(entry)
    }

    /// Look up a token by its plaintext value and check its expiry.
    ///
    /// # Errors
    ///
    /// - [`TokenError::NotFound`] if the token does not exist or was revoked.
    /// - [`TokenError::Expired`] if its TTL has passed.
    /// - [`TokenError::Storage`] / [`TokenError::Serialization`] on failure.
    pub async fn lookup(&self, plaintext: &str) -> Result<TokenEntry, TokenError> {
        let token_hash = hash_token(plaintext);
        let data = self
            .storage
            .get(&format!("{TOKEN_PREFIX}{token_hash}"))
            .await?
            .ok_or(TokenError::NotFound)?;

        let entry: TokenEntry =
            serde_json::from_slice(&data).map_err(|e| TokenError::Serialization {
                reason: e.to_string(),
            })?;

        if !bool::from(entry.token_hash.as_bytes().ct_eq(token_hash.as_bytes())) {
            return Err(TokenError::NotFound);
        }

        if let Some(expires_at) = entry.expires_at {
            if Utc::now() > expires_at {
                return Err(TokenError::Expired {
                    expired_at: expires_at.to_rfc3339(),
                });
            }
        }

        Ok(entry)
    }

    /// Revoke a token by its stored hash. Revoking twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Storage`] if the backend fails.
    pub async fn revoke_hash(&self, token_hash: &str) -> Result<(), TokenError> {
        self.storage
            .delete(&format!("{TOKEN_PREFIX}{token_hash}"))
            .await?;
        info!(
            token_hash_prefix = &token_hash[..8.min(token_hash.len())],
            "token revoked"
        );
        Ok(())
    }

    /// Revoke a token by its plaintext value.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Storage`] if the backend fails.
    pub async fn revoke(&self, plaintext: &str) -> Result<(), TokenError> {
        self.revoke_hash(&hash_token(plaintext)).await
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

/// Hash a plaintext token with SHA-256, returning the hex digest.
#[must_use]
pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// User ids become storage key segments, so they are restricted to
/// `[A-Za-z0-9_-]` and 1..=64 characters.
fn validate_user_id(user_id: &str) -> Result<(), TokenError> {
    if user_id.is_empty() || user_id.len() > 64 {
        return Err(TokenError::InvalidUser {
            reason: "must be 1 to 64 characters".to_owned(),
        });
    }
    if let Some(c) = user_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(TokenError::InvalidUser {
            reason: format!("character {c:?} is not allowed"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use infravault_storage::MemoryBackend;

    use super::*;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryBackend::new()))
    }

    fn params(user: &str) -> CreateTokenParams {
        CreateTokenParams {
            user_id: user.to_owned(),
            display_name: format!("{user}-test"),
            ttl: None,
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let tokens = store();
        let token = tokens.create(params("alice")).await.unwrap();
        assert!(token.starts_with(TOKEN_PREFIX_PUBLIC));

        let entry = tokens.lookup(&token).await.unwrap();
        assert_eq!(entry.user_id, "alice");
        assert_eq!(entry.token_hash, hash_token(&token));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let tokens = store();
        assert!(matches!(
            tokens.lookup("ivt_nope").await,
            Err(TokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn revoked_token_is_not_found() {
        let tokens = store();
        let token = tokens.create(params("alice")).await.unwrap();
        tokens.revoke(&token).await.unwrap();
        assert!(matches!(tokens.lookup(&token).await, Err(TokenError::NotFound)));
        tokens.revoke(&token).await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let tokens = store();
        let mut p = params("alice");
        p.ttl = Some(Duration::seconds(-1));
        let token = tokens.create(p).await.unwrap();
        assert!(matches!(
            tokens.lookup(&token).await,
            Err(TokenError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn registered_bootstrap_token_resolves() {
        let tokens = store();
        tokens.register("dev-token", params("admin")).await.unwrap();
        assert_eq!(tokens.lookup("dev-token").await.unwrap().user_id, "admin");
    }

    #[tokio::test]
    async fn user_ids_that_would_escape_key_space_are_refused() {
        let tokens = store();
        for bad in ["", "alice/servers", "../bob", "a b"] {
            assert!(matches!(
                tokens.create(params(bad)).await,
                Err(TokenError::InvalidUser { .. })
            ));
        }
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = hash_token("ivt_example");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
