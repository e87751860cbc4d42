//! Reveal envelope codec.
//!
//! A secret travels from server to client only inside an [`Envelope`]: the
//! AES-256-GCM encryption of the value under the caller's [`SessionKey`],
//! split into base64 `iv`, `tag` and `data` components.
//!
//! # Security model
//!
//! - Every [`encrypt`] call draws a fresh 96-bit nonce from `OsRng`, so two
//!   envelopes of the same secret are never identical.
//! - [`decrypt`] either returns the exact plaintext or fails; a flipped bit
//!   in `tag` or `data`, or the wrong key, is always a
//!   [`CryptoError::Decryption`].
//! - The session key is chosen by the client and sent with each reveal
//!   request. The server holds it only for the duration of that request.
//!   This keeps secrets off the wire in plaintext but is not end-to-end
//!   encryption: the server sees both the key and the secret.
//! - [`SessionKey`] zeroizes on drop and never prints its bytes.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// Session key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A 256-bit symmetric key scoped to one client session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh key from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomUnavailable`] if the OS cannot supply
    /// random bytes. There is no weaker fallback.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomUnavailable {
                reason: e.to_string(),
            })?;
        Ok(Self(bytes))
    }

    /// Parse a key from its standard base64 form (the `x-reveal-key` header).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the input is not base64 or does
    /// not decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = Zeroizing::new(B64.decode(encoded.trim()).map_err(|e| {
            CryptoError::InvalidKey {
                reason: e.to_string(),
            }
        })?);
        let bytes: [u8; KEY_LEN] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKey {
                    reason: format!("expected {KEY_LEN} bytes, got {}", decoded.len()),
                })?;
        Ok(Self(bytes))
    }

    /// Encode the key as standard base64 for transport.
    #[must_use]
    pub fn to_base64(&self) -> String {
        B64.encode(self.0)
    }

    /// Borrow the raw key bytes. Never log or persist them.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionKey {}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One authenticated ciphertext, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64 of the 12-byte nonce.
    pub iv: String,
    /// Base64 of the 16-byte GCM tag.
    pub tag: String,
    /// Base64 of the ciphertext (same length as the plaintext).
    pub data: String,
}

/// Encrypt `plaintext` under `key` with a fresh nonce.
///
/// # Errors
///
/// - [`CryptoError::RandomUnavailable`] if no nonce can be drawn.
/// - [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn encrypt(key: &SessionKey, plaintext: &str) -> Result<Envelope, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::RandomUnavailable {
            reason: e.to_string(),
        })?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    Ok(Envelope {
        iv: B64.encode(iv),
        tag: B64.encode(tag),
        data: B64.encode(&buffer),
    })
}

/// Decrypt an [`Envelope`] produced by [`encrypt`] under the same key.
///
/// # Errors
///
/// - [`CryptoError::MalformedEnvelope`] if a component is not base64 or the
///   iv/tag have the wrong length.
/// - [`CryptoError::Decryption`] if the tag does not verify or the plaintext
///   is not UTF-8.
pub fn decrypt(key: &SessionKey, envelope: &Envelope) -> Result<String, CryptoError> {
    let iv = decode_component("iv", &envelope.iv, Some(IV_LEN))?;
    let tag = decode_component("tag", &envelope.tag, Some(TAG_LEN))?;
    let mut buffer = decode_component("data", &envelope.data, None)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&iv),
            b"",
            &mut buffer,
            Tag::from_slice(&tag),
        )
        .map_err(|_| CryptoError::Decryption {
            reason: "authentication tag mismatch (wrong key or tampered envelope)".to_owned(),
        })?;

    String::from_utf8(buffer).map_err(|e| CryptoError::Decryption {
        reason: format!("plaintext is not valid UTF-8: {e}"),
    })
}

fn decode_component(
    field: &'static str,
    encoded: &str,
    expected_len: Option<usize>,
) -> Result<Vec<u8>, CryptoError> {
    let bytes = B64
        .decode(encoded)
        .map_err(|e| CryptoError::MalformedEnvelope {
            field,
            reason: e.to_string(),
        })?;
    if let Some(expected) = expected_len {
        if bytes.len() != expected {
            return Err(CryptoError::MalformedEnvelope {
                field,
                reason: format!("expected {expected} bytes, got {}", bytes.len()),
            });
        }
    }
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn flip_bit(encoded: &str, bit: usize) -> String {
        let mut bytes = B64.decode(encoded).unwrap();
        let idx = bit / 8;
        if let Some(byte) = bytes.get_mut(idx) {
            *byte ^= 1 << (bit % 8);
        }
        B64.encode(bytes)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = SessionKey::generate().unwrap();
        for secret in ["OldPass1", "", "pässwörd 🔑", &"x".repeat(4096)] {
            let envelope = encrypt(&key, secret).unwrap();
            assert_eq!(decrypt(&key, &envelope).unwrap(), secret);
        }
    }

    #[test]
    fn envelope_components_have_expected_lengths() {
        let key = SessionKey::generate().unwrap();
        let envelope = encrypt(&key, "hunter2").unwrap();
        assert_eq!(B64.decode(&envelope.iv).unwrap().len(), IV_LEN);
        assert_eq!(B64.decode(&envelope.tag).unwrap().len(), TAG_LEN);
        assert_eq!(B64.decode(&envelope.data).unwrap().len(), "hunter2".len());
    }

    #[test]
    fn same_secret_twice_yields_distinct_envelopes() {
        let key = SessionKey::generate().unwrap();
        let a = encrypt(&key, "same secret").unwrap();
        let b = encrypt(&key, "same secret").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a, b);
    }

    #[test]
    fn any_flipped_tag_bit_is_rejected() {
        let key = SessionKey::generate().unwrap();
        let envelope = encrypt(&key, "panel-password").unwrap();
        for bit in 0..TAG_LEN * 8 {
            let tampered = Envelope {
                tag: flip_bit(&envelope.tag, bit),
                ..envelope.clone()
            };
            assert!(matches!(
                decrypt(&key, &tampered),
                Err(CryptoError::Decryption { .. })
            ));
        }
    }

    #[test]
    fn any_flipped_data_bit_is_rejected() {
        let key = SessionKey::generate().unwrap();
        let envelope = encrypt(&key, "ssh-password").unwrap();
        for bit in 0.."ssh-password".len() * 8 {
            let tampered = Envelope {
                data: flip_bit(&envelope.data, bit),
                ..envelope.clone()
            };
            assert!(matches!(
                decrypt(&key, &tampered),
                Err(CryptoError::Decryption { .. })
            ));
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let k1 = SessionKey::generate().unwrap();
        let k2 = SessionKey::generate().unwrap();
        let envelope = encrypt(&k1, "secret").unwrap();
        assert!(matches!(
            decrypt(&k2, &envelope),
            Err(CryptoError::Decryption { .. })
        ));
    }

    #[test]
    fn malformed_components_are_reported_by_field() {
        let key = SessionKey::generate().unwrap();
        let envelope = encrypt(&key, "secret").unwrap();

        let bad_b64 = Envelope {
            data: "not base64!!".to_owned(),
            ..envelope.clone()
        };
        assert!(matches!(
            decrypt(&key, &bad_b64),
            Err(CryptoError::MalformedEnvelope { field: "data", .. })
        ));

        let short_iv = Envelope {
            iv: B64.encode([0u8; 8]),
            ..envelope
        };
        assert!(matches!(
            decrypt(&key, &short_iv),
            Err(CryptoError::MalformedEnvelope { field: "iv", .. })
        ));
    }

    #[test]
    fn session_key_base64_roundtrip() {
        let key = SessionKey::generate().unwrap();
        let encoded = key.to_base64();
        assert_eq!(SessionKey::from_base64(&encoded).unwrap(), key);
    }

    #[test]
    fn session_key_rejects_wrong_length_and_garbage() {
        let short = B64.encode([7u8; 16]);
        assert!(matches!(
            SessionKey::from_base64(&short),
            Err(CryptoError::InvalidKey { .. })
        ));
        assert!(matches!(
            SessionKey::from_base64("%%%"),
            Err(CryptoError::InvalidKey { .. })
        ));
    }

    #[test]
    fn session_key_debug_redacts_bytes() {
        let key = SessionKey::from_bytes([0xAB; KEY_LEN]);
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("171"));
    }
}
