use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ServerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read certificate '{}': {source}", path.display())]
    CertRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read private key '{}': {source}", path.display())]
    KeyRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no PEM certificates found in '{}'", .0.display())]
    NoCerts(PathBuf),
    #[error("no PEM private key found in '{}'", .0.display())]
    NoKey(PathBuf),
    #[error("failed to build TLS config: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Builds the webhook's server-side TLS config from the PEM files named by
/// `TLS_CERT` and `TLS_KEY`.
pub fn load_server_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<ServerConfig>, TlsError> {
    let cert_err = |source| TlsError::CertRead {
        path: cert_path.to_path_buf(),
        source,
    };
    let key_err = |source| TlsError::KeyRead {
        path: key_path.to_path_buf(),
        source,
    };

    let cert_pem = fs::read(cert_path).map_err(cert_err)?;
    let key_pem = fs::read(key_path).map_err(key_err)?;

    let chain = rustls_pemfile::certs(&mut BufReader::new(cert_pem.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(cert_err)?;
    if chain.is_empty() {
        return Err(TlsError::NoCerts(cert_path.to_path_buf()));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem.as_slice()))
        .map_err(key_err)?
        .ok_or_else(|| TlsError::NoKey(key_path.to_path_buf()))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
