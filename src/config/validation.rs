//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Route prefixes are rooted, URL targets are absolute
//! - Injected headers are representable on the wire
//! - TLS settings leave at least one usable protocol version
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure except for the directory probe, which only warns
//! - Runs before config is accepted into the system

use std::path::Path;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::{RouteConfig, RouterConfig, TargetType};
use crate::net::tls::supported_versions;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("port is empty")]
    EmptyPort,

    #[error("route #{index}: path is empty")]
    EmptyPath { index: usize },

    #[error("route {path:?}: path must begin with '/'")]
    PathMissingSlash { path: String },

    #[error("route {path:?}: target is empty")]
    EmptyTarget { path: String },

    #[error("route {path:?}: target {target:?} is not an absolute URL with scheme and host")]
    InvalidTargetUrl { path: String, target: String },

    #[error("route {path:?}: header {name:?} cannot be sent")]
    InvalidHeader { path: String, name: String },

    #[error("security: {which} path is empty")]
    MissingTlsFile { which: &'static str },

    #[error("security: no supported TLS version between {min:?} and {max:?}")]
    NoTlsVersionInRange { min: String, max: String },

    #[error("caching: endPoint is empty")]
    EmptyCacheEndpoint,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port.is_empty() {
        errors.push(ValidationError::EmptyPort);
    }

    if config.security.enabled {
        if config.security.cert_path.is_empty() {
            errors.push(ValidationError::MissingTlsFile { which: "certPath" });
        }
        if config.security.key_path.is_empty() {
            errors.push(ValidationError::MissingTlsFile { which: "keyPath" });
        }
        let versions = supported_versions(
            config.security.min_version(),
            config.security.max_version(),
        );
        if versions.is_empty() {
            errors.push(ValidationError::NoTlsVersionInRange {
                min: config.security.min_tls_version.clone(),
                max: config.security.max_tls_version.clone(),
            });
        }
    }

    if config.cache.enabled && config.cache.endpoint.is_empty() {
        errors.push(ValidationError::EmptyCacheEndpoint);
    }

    for (index, route) in config.routes.iter().enumerate() {
        validate_route(index, route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(index: usize, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if route.path.is_empty() {
        errors.push(ValidationError::EmptyPath { index });
    } else if !route.path.starts_with('/') {
        errors.push(ValidationError::PathMissingSlash {
            path: route.path.clone(),
        });
    }

    if route.target.is_empty() {
        errors.push(ValidationError::EmptyTarget {
            path: route.path.clone(),
        });
        return;
    }

    match route.target_type {
        TargetType::Url => {
            let absolute = url::Url::parse(&route.target)
                .map(|u| u.has_host() && !u.cannot_be_a_base())
                .unwrap_or(false);
            if !absolute {
                errors.push(ValidationError::InvalidTargetUrl {
                    path: route.path.clone(),
                    target: route.target.clone(),
                });
            }

            for (name, value) in &route.headers {
                let ok = HeaderName::from_bytes(name.as_bytes()).is_ok()
                    && HeaderValue::from_str(value).is_ok();
                if !ok {
                    errors.push(ValidationError::InvalidHeader {
                        path: route.path.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
        TargetType::Dir => {
            if !Path::new(&route.target).is_dir() {
                tracing::warn!(
                    route = %route.path,
                    target = %route.target,
                    "Directory target does not exist; requests will fail until it does"
                );
            }
        }
    }
}
