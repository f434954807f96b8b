//! At-rest database encryption key derivation.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const PBKDF2_ITERATIONS: u32 = 600_000;
const KEY_LENGTH_BYTES: usize = 32;

/// Derives a 256-bit store encryption key from a passphrase/secret and a
/// per-file salt. The key is never logged; callers must not `Debug`-print
/// the returned bytes.
#[must_use]
pub fn derive_store_key(secret: &[u8], salt: &[u8]) -> [u8; KEY_LENGTH_BYTES] {
    let mut key = [0u8; KEY_LENGTH_BYTES];
    pbkdf2_hmac::<Sha256>(secret, salt, PBKDF2_ITERATIONS, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_and_salt_derive_the_same_key() {
        let a = derive_store_key(b"operator secret", b"per-file-salt");
        let b = derive_store_key(b"operator secret", b"per-file-salt");
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = derive_store_key(b"operator secret", b"salt-a");
        let b = derive_store_key(b"operator secret", b"salt-b");
        assert_ne!(a, b);
    }
}
