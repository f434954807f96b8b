//! Payload hashing and batch signing.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use p256::ecdsa::signature::SignatureEncoding;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::key_handle::KeyHandle;

/// SHA-256 over the canonical serialized payload.
#[must_use]
pub fn hash_payload(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// 128-bit cryptographically random nonce, base64-encoded for the wire.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Signs `device_id || timestamp_ms || nonce || payload_hash` with the
/// device's ECDSA-P256 key, returning a base64-encoded fixed-width (r || s)
/// signature.
#[must_use]
pub fn sign_batch(key: &KeyHandle, device_id: &str, timestamp_ms: u64, nonce_b64: &str, payload_hash: &[u8; 32]) -> String {
    let mut message = Vec::with_capacity(device_id.len() + 8 + nonce_b64.len() + 32);
    message.extend_from_slice(device_id.as_bytes());
    message.extend_from_slice(&timestamp_ms.to_be_bytes());
    message.extend_from_slice(nonce_b64.as_bytes());
    message.extend_from_slice(payload_hash);
    let signature = key.sign(&message);
    BASE64.encode(signature.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash_payload(b"same payload");
        let b = hash_payload(b"same payload");
        assert_eq!(a, b);
    }

    #[test]
    fn nonces_are_not_repeated() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
    }
}
