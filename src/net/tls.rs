//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, SupportedProtocolVersion};

use crate::config::{SecurityConfig, TlsVersion};
use crate::net::listener::ListenerError;

/// Protocol versions rustls implements, lowest first.
static IMPLEMENTED: [(TlsVersion, &SupportedProtocolVersion); 2] = [
    (TlsVersion::Tls12, &rustls::version::TLS12),
    (TlsVersion::Tls13, &rustls::version::TLS13),
];

/// Implemented versions within the optional `[min, max]` bounds.
pub fn supported_versions(
    min: Option<TlsVersion>,
    max: Option<TlsVersion>,
) -> Vec<&'static SupportedProtocolVersion> {
    IMPLEMENTED
        .iter()
        .filter(|(version, _)| version.within(min, max))
        .map(|(_, supported)| *supported)
        .collect()
}

/// Build the listener's TLS configuration.
///
/// Client certificates are not requested.
pub fn load_tls_config(security: &SecurityConfig) -> Result<RustlsConfig, ListenerError> {
    let versions = supported_versions(security.min_version(), security.max_version());
    if versions.is_empty() {
        return Err(ListenerError::Tls(format!(
            "no supported TLS version between {:?} and {:?}",
            security.min_tls_version, security.max_tls_version
        )));
    }

    let certs = load_certs(Path::new(&security.cert_path))?;
    let key = load_key(Path::new(&security.key_path))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&versions)
        .map_err(|e| ListenerError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ListenerError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>, ListenerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ListenerError::TlsFile {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ListenerError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ListenerError::TlsFile {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(ListenerError::Tls(format!("no certificates in {:?}", path)));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ListenerError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| ListenerError::TlsFile {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ListenerError::Tls(format!("no private key in {:?}", path)))
}
