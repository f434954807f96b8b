//! Key handle abstraction, batch signing, certificate validation, and
//! at-rest encryption.

pub mod at_rest;
pub mod certificate;
pub mod error;
pub mod key_handle;
pub mod signing;

pub use at_rest::derive_store_key;
pub use certificate::{validate as validate_certificate, RevocationList};
pub use error::CryptoError;
pub use key_handle::KeyHandle;
pub use signing::{generate_nonce, hash_payload, sign_batch};
