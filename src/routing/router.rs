//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile configured routes into handlers, once, at startup
//! - Look up the matching route for a request path
//! - Return the matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan in configuration order
//! - First registered match wins; no longest-prefix reordering
//! - The handler kind is chosen by target type here, not per request

use std::net::IpAddr;
use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response};
use thiserror::Error;

use crate::cache::CacheClient;
use crate::config::{RouteConfig, RouterConfig, TargetType};
use crate::http::proxy::{ProxyHandler, UpstreamClient};
use crate::http::static_files::{CacheFront, StaticHandler};
use crate::routing::matcher::PathPrefixMatcher;

/// Error compiling a route into a handler.
#[derive(Debug, Error)]
pub enum RouteBuildError {
    #[error("route {path:?}: target {target:?} is not an absolute URL")]
    InvalidTarget { path: String, target: String },

    #[error("route {path:?}: header {name:?} cannot be sent")]
    InvalidHeader { path: String, name: String },

    #[error("upstream TLS setup failed: {0}")]
    UpstreamTls(#[from] rustls::Error),
}

/// The destination of a route.
#[derive(Clone)]
pub enum RouteHandler {
    Proxy(ProxyHandler),
    Static(StaticHandler),
}

/// A compiled route: prefix plus its own handler.
#[derive(Clone)]
pub struct Route {
    matcher: PathPrefixMatcher,
    handler: RouteHandler,
}

impl Route {
    pub fn new(prefix: impl Into<String>, handler: RouteHandler) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(prefix),
            handler,
        }
    }

    /// Compile one configured route.
    pub fn from_config(
        route: &RouteConfig,
        client: &UpstreamClient,
        cache: Option<&Arc<dyn CacheClient>>,
    ) -> Result<Self, RouteBuildError> {
        let handler = match route.target_type {
            TargetType::Url => RouteHandler::Proxy(ProxyHandler::new(route, client.clone())?),
            TargetType::Dir => {
                let front = cache.map(|c| CacheFront::new(Arc::clone(c), route.cache_expiry));
                RouteHandler::Static(StaticHandler::new(&route.path, &route.target, front))
            }
        };

        tracing::debug!(
            prefix = %route.path,
            target = %route.target,
            kind = ?route.target_type,
            cached = matches!(&handler, RouteHandler::Static(h) if h.is_cached()),
            "Route compiled"
        );

        Ok(Self::new(route.path.clone(), handler))
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    /// Run this route's handler.
    pub async fn handle(&self, request: Request<Body>, client_ip: Option<IpAddr>) -> Response {
        match &self.handler {
            RouteHandler::Proxy(proxy) => proxy.handle(request, client_ip).await,
            RouteHandler::Static(files) => files.handle(request).await,
        }
    }
}

/// Ordered route table.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Compile every configured route, preserving order.
    ///
    /// `cache` is attached to directory routes; pass `None` when caching is off.
    pub fn from_config(
        config: &RouterConfig,
        client: &UpstreamClient,
        cache: Option<Arc<dyn CacheClient>>,
    ) -> Result<Self, RouteBuildError> {
        let routes = config
            .routes
            .iter()
            .map(|route| Route::from_config(route, client, cache.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    /// First route, in registration order, whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::http::proxy::upstream_client;

    fn url_route(path: &str, target: &str) -> RouteConfig {
        RouteConfig {
            path: path.to_string(),
            headers: HashMap::new(),
            target: target.to_string(),
            target_type: TargetType::Url,
            cache_expiry: 0,
        }
    }

    fn table(routes: Vec<RouteConfig>) -> RouteTable {
        let config = RouterConfig {
            routes,
            ..RouterConfig::default()
        };
        RouteTable::from_config(&config, &upstream_client().unwrap(), None).unwrap()
    }

    #[tokio::test]
    async fn earlier_route_wins() {
        let t = table(vec![url_route("/a/b", "http://u1"), url_route("/a", "http://u2")]);
        assert_eq!(t.match_path("/a/b/x").unwrap().prefix(), "/a/b");
        assert_eq!(t.match_path("/a/c").unwrap().prefix(), "/a");

        let t = table(vec![url_route("/a", "http://u2"), url_route("/a/b", "http://u1")]);
        assert_eq!(t.match_path("/a/b/x").unwrap().prefix(), "/a");
    }

    #[tokio::test]
    async fn unmatched_and_strict_slash() {
        let t = table(vec![url_route("/a/", "http://u")]);
        assert!(t.match_path("/a").is_none());
        assert!(t.match_path("/b/").is_none());
        assert!(t.match_path("/a/").is_some());
        assert_eq!(t.len(), 1);
    }

    #[tokio::test]
    async fn handler_kind_follows_target_type() {
        let mut dir = url_route("/s", "/tmp");
        dir.target_type = TargetType::Dir;
        let t = table(vec![url_route("/api", "http://u"), dir]);

        assert!(matches!(t.match_path("/api/x").unwrap().handler(), RouteHandler::Proxy(_)));
        match t.match_path("/s/x").unwrap().handler() {
            RouteHandler::Static(h) => assert!(!h.is_cached()),
            RouteHandler::Proxy(_) => panic!("directory route compiled as proxy"),
        }
    }

    #[tokio::test]
    async fn bad_target_fails_compilation() {
        let config = RouterConfig {
            routes: vec![url_route("/a", "relative/path")],
            ..RouterConfig::default()
        };
        assert!(RouteTable::from_config(&config, &upstream_client().unwrap(), None).is_err());
    }
}
