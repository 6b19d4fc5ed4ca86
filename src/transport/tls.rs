//! TLS connector construction.
//!
//! Secure connections get a rustls client configuration built from the
//! configured trust anchors. Building it is best effort: the caller logs a
//! failure under the `ws_transport::tls` target and connects with the
//! library's default connector instead.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_tungstenite::Connector;
use tracing::debug;

use crate::config::TlsRoots;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Tracing target for TLS degrade events.
pub const TLS_LOG_TARGET: &str = "ws_transport::tls";

// ============================================================================
// Connector
// ============================================================================

/// Builds a rustls connector trusting `roots`.
///
/// # Errors
///
/// Returns [`Error::TlsUpgrade`] if no trust anchor could be loaded or the
/// crypto provider rejects the default protocol versions.
pub fn build_connector(roots: &TlsRoots) -> Result<Connector> {
    let store = root_store(roots)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::tls_upgrade(e.to_string()))?
        .with_root_certificates(store)
        .with_no_client_auth();

    Ok(Connector::Rustls(Arc::new(config)))
}

/// Loads trust anchors into a root store.
fn root_store(roots: &TlsRoots) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();

    let (added, ignored) = match roots {
        TlsRoots::Native => {
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                debug!(target: TLS_LOG_TARGET, error = %err, "Native certificate load error");
            }
            store.add_parsable_certificates(loaded.certs)
        }
        TlsRoots::Custom(certs) => store.add_parsable_certificates(certs.iter().cloned()),
    };

    debug!(target: TLS_LOG_TARGET, added, ignored, "Root store built");

    if store.is_empty() {
        return Err(Error::tls_upgrade("no usable trust anchors"));
    }

    Ok(store)
}

// ============================================================================
// Tests
// ============================================================================
