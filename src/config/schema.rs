//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from the JSON config
//! document. Field names follow the document's camelCase spelling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Interface to bind. Empty binds all interfaces.
    pub host: String,

    /// Port to bind, kept as text like the document carries it.
    pub port: String,

    /// Listener TLS settings.
    pub security: SecurityConfig,

    /// External response cache for directory routes.
    #[serde(rename = "caching")]
    pub cache: CacheConfig,

    /// Route definitions, in dispatch order.
    pub routes: Vec<RouteConfig>,
}

impl RouterConfig {
    /// The `host:port` address the listener binds.
    pub fn bind_address(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, self.port)
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Serve TLS instead of plaintext.
    pub enabled: bool,

    /// Path to certificate chain (PEM).
    pub cert_path: String,

    /// Path to private key (PEM).
    pub key_path: String,

    /// Lowest protocol version label, e.g. "TLS 1.2".
    #[serde(rename = "minTLSVersion")]
    pub min_tls_version: String,

    /// Highest protocol version label.
    #[serde(rename = "maxTLSVersion")]
    pub max_tls_version: String,
}

impl SecurityConfig {
    /// Lower version bound, `None` when the label is unknown.
    pub fn min_version(&self) -> Option<TlsVersion> {
        TlsVersion::from_label(&self.min_tls_version)
    }

    /// Upper version bound, `None` when the label is unknown.
    pub fn max_version(&self) -> Option<TlsVersion> {
        TlsVersion::from_label(&self.max_tls_version)
    }
}

/// Protocol versions the configuration can name.
///
/// Ordered, so `[min, max]` ranges compare directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    /// Map a configuration label to a version. Unknown labels mean "no bound".
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "TLS 1.0" => Some(Self::Tls10),
            "TLS 1.1" => Some(Self::Tls11),
            "TLS 1.2" => Some(Self::Tls12),
            _ => None,
        }
    }

    /// Whether this version lies within the optional bounds.
    pub fn within(self, min: Option<Self>, max: Option<Self>) -> bool {
        min.map_or(true, |m| self >= m) && max.map_or(true, |m| self <= m)
    }
}

/// External cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache static responses in the external cache.
    pub enabled: bool,

    /// Cache address in `host:port` form.
    #[serde(rename = "endPoint")]
    pub endpoint: String,
}

/// How a route's target is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TargetType {
    /// Reverse proxy to an absolute URL.
    #[serde(rename = "URL")]
    Url,
    /// Serve files from a directory.
    #[serde(rename = "DIR")]
    Dir,
}

/// Route configuration binding a path prefix to a destination.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Path prefix to match. Must begin with "/".
    pub path: String,

    /// Headers added to proxied requests.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Absolute URL or directory, depending on `target_type`.
    pub target: String,

    pub target_type: TargetType,

    /// Cache TTL in seconds for directory routes; `<= 0` never expires.
    #[serde(default)]
    pub cache_expiry: i32,
}
