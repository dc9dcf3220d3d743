//! Custom trust roots for `wss` connections.
//!
//! By default the dialer trusts the bundled webpki roots. A PEM bundle can
//! replace them, which is how a feed is pointed at a private gateway or a
//! test server with a self-signed certificate.

use std::path::Path;

use rustls::ClientConfig;

use crate::Result;
use crate::error::AgentError;

/// Builds a [`ClientConfig`] whose root store contains only the
/// certificates found in the PEM file at `path`.
///
/// # Errors
///
/// Returns [`AgentError::Tls`] if the file cannot be read, cannot be
/// parsed, or contains no certificates.
pub fn load_tls_config(path: &Path) -> Result<ClientConfig> {
    let pem = std::fs::read(path)
        .map_err(|e| AgentError::Tls(format!("failed to read {}: {e}", path.display())))?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AgentError::Tls(format!("failed to parse CA PEM: {e}")))?;

    if certs.is_empty() {
        return Err(AgentError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(AgentError::Tls(format!(
            "none of the {ignored} certificates in {} could be used",
            path.display()
        )));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(config)
}
