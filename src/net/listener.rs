//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the configured `host:port`
//! - Report bind failures as fatal startup errors
//!
//! The same bound socket serves plaintext or TLS; see `http::server`.

use std::path::PathBuf;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RouterConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Certificate or key file unreadable.
    #[error("failed to read {path:?}: {source}")]
    TlsFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TLS material present but unusable.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bind the listener for `config`. Hostnames are resolved.
pub async fn bind(config: &RouterConfig) -> Result<TcpListener, ListenerError> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        tls = config.security.enabled,
        "Listener bound"
    );

    Ok(listener)
}
