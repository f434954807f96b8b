//! Opaque signing-key handle: the raw private key never
//! leaves this module.

use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;

use crate::error::CryptoError;

/// Wraps the device's ECDSA-P256 private key. `Debug` is intentionally not
/// derived to keep the key material out of logs.
pub struct KeyHandle {
    signing_key: SigningKey,
}

impl KeyHandle {
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Signs a pre-hashed or short message directly; callers pass the
    /// already-assembled `device_id || timestamp || nonce || payload_hash`
    /// buffer.
    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}
