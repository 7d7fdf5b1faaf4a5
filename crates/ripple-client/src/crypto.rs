//! Decryption of end-to-end encrypted channel payloads.
//!
//! Events on `private-encrypted-` channels carry a base64 nonce +
//! ciphertext pair. Decryption uses AES-256-GCM with a 32-byte master key
//! shared out of band: authenticated decryption, so truncated or tampered
//! ciphertext is rejected rather than decrypted into garbage.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use ripple_protocol::EncryptedPayload;

/// Required master key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// Required nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LENGTH: usize = 12;

/// Failures while decrypting a channel payload.
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// The event carried no payload at all.
    #[error("encrypted event carried no payload")]
    MissingPayload,

    /// The payload was not a valid nonce + ciphertext envelope.
    #[error("malformed encrypted payload: {0}")]
    InvalidPayload(String),

    /// A field was not valid base64.
    #[error("invalid base64 in encrypted payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The decoded nonce had the wrong length.
    #[error("nonce must be {NONCE_LENGTH} bytes, got {0}")]
    BadNonceLength(usize),

    /// The master key had the wrong length.
    #[error("master key must be {KEY_LENGTH} bytes, got {0}")]
    BadKeyLength(usize),

    /// Authenticated decryption failed: wrong key, truncation, or tamper.
    #[error("authenticated decryption failed")]
    Failed,

    /// The plaintext was not valid UTF-8.
    #[error("decrypted payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Decrypt a nonce + ciphertext pair with the given master key.
///
/// # Errors
///
/// Returns a `DecryptionError` identifying which precondition failed or
/// that the authenticated decryption itself was rejected.
pub fn decrypt_channel_data(
    key: &[u8],
    payload: &EncryptedPayload,
) -> Result<String, DecryptionError> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| DecryptionError::BadKeyLength(key.len()))?;

    let nonce = BASE64.decode(&payload.nonce)?;
    if nonce.len() != NONCE_LENGTH {
        return Err(DecryptionError::BadNonceLength(nonce.len()));
    }
    let ciphertext = BASE64.decode(&payload.ciphertext)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| DecryptionError::Failed)?;

    Ok(String::from_utf8(plaintext)?)
}

/// Decrypt the `data` field of an inbound event on an encrypted channel.
///
/// # Errors
///
/// Returns `MissingPayload` if the event had no data, `InvalidPayload` if
/// the data was not a nonce + ciphertext envelope, or any of the
/// `decrypt_channel_data` failures.
pub fn decrypt_event_data(key: &[u8], data: Option<&str>) -> Result<String, DecryptionError> {
    let data = data.ok_or(DecryptionError::MissingPayload)?;
    let payload: EncryptedPayload =
        serde_json::from_str(data).map_err(|e| DecryptionError::InvalidPayload(e.to_string()))?;
    decrypt_channel_data(key, &payload)
}
