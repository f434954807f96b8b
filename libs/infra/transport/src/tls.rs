//! mTLS client configuration: TLS 1.2+, client
//! authenticates with the device certificate, server authenticated
//! against the installed trust anchor, hostname verified, no plaintext
//! fallback.
//!
//! rustls's default cipher-suite set only ever negotiates ECDHE key
//! exchange (no static RSA, no anonymous DH), so restricting to
//! ECDHE/DHE-only ciphersuites falls out of using the default provider
//! rather than needing an explicit suite allowlist.

use std::io::BufReader;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ClientConfig;
use rustls_pki_types::ServerName;

use crate::error::TransportError;

pub fn build_client_config(
    device_cert_pem: &[u8],
    device_key_pem: &[u8],
    trust_anchor_pem: &[u8],
) -> Result<Arc<ClientConfig>, TransportError> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in load_certs(trust_anchor_pem)? {
        roots
            .add(cert)
            .map_err(|e| TransportError::TlsConfig(format!("trust anchor: {e}")))?;
    }

    let cert_chain = load_certs(device_cert_pem)?;
    let key = load_private_key(device_key_pem)?;

    let versions = [&rustls::version::TLS13, &rustls::version::TLS12];
    let config = ClientConfig::builder_with_protocol_versions(&versions)
        .with_root_certificates(roots)
        .with_client_auth_cert(cert_chain, key)
        .map_err(|e| TransportError::TlsConfig(e.to_string()))?;

    Ok(Arc::new(config))
}

pub fn server_name(device_hostname: &str) -> Result<ServerName<'static>, TransportError> {
    ServerName::try_from(device_hostname.to_string())
        .map_err(|e| TransportError::TlsConfig(format!("invalid server hostname: {e}")))
}

fn load_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::TlsConfig(format!("cert PEM parse: {e}")))
}

fn load_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TransportError> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TransportError::TlsConfig(format!("key PEM parse: {e}")))?
        .ok_or_else(|| TransportError::TlsConfig("no private key found in PEM".into()))
}
