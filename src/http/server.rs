//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a single dispatching handler
//! - Wire up middleware (tracing, request ID)
//! - Compile the route table and attach the shared cache
//! - Serve plaintext or TLS on the bound listener until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::{CacheClient, MemcacheClient};
use crate::config::RouterConfig;
use crate::http::proxy::upstream_client;
use crate::http::response::{moved_permanently, not_found};
use crate::net::{tls::load_tls_config, ListenerError};
use crate::routing::matcher::clean_path;
use crate::routing::{RouteBuildError, RouteTable};

/// How long in-flight TLS connections may drain after shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
}

/// HTTP server for the router.
pub struct HttpServer {
    router: Router,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a server, connecting directory routes to memcached when
    /// caching is enabled.
    pub fn new(config: RouterConfig) -> Result<Self, RouteBuildError> {
        let cache: Option<Arc<dyn CacheClient>> = if config.cache.enabled {
            tracing::info!(endpoint = %config.cache.endpoint, "Static response cache enabled");
            Some(Arc::new(MemcacheClient::new(config.cache.endpoint.clone())))
        } else {
            None
        };
        Self::with_cache(config, cache)
    }

    /// Create a server with an explicit cache for directory routes.
    pub fn with_cache(
        config: RouterConfig,
        cache: Option<Arc<dyn CacheClient>>,
    ) -> Result<Self, RouteBuildError> {
        let client = upstream_client()?;
        let routes = RouteTable::from_config(&config, &client, cache)?;

        tracing::info!(routes = routes.len(), "Route table compiled");

        let state = AppState {
            routes: Arc::new(routes),
        };
        Ok(Self {
            router: Self::build_router(state),
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires or the server fails.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr()?;
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        if self.config.security.enabled {
            let tls = load_tls_config(&self.config.security)?;
            tracing::info!(address = %addr, "HTTPS server starting");

            let handle = axum_server::Handle::new();
            let signal = handle.clone();
            tokio::spawn(async move {
                let _ = shutdown.recv().await;
                signal.graceful_shutdown(Some(TLS_DRAIN));
            });

            axum_server::from_tcp_rustls(listener.into_std()?, tls)
                .handle(handle)
                .serve(app)
                .await?;
        } else {
            tracing::info!(address = %addr, "HTTP server starting");

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Clean the path, pick the first matching route, run its handler.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path();

    if request.method() != Method::CONNECT {
        let cleaned = clean_path(path);
        if cleaned != path {
            let location = match request.uri().query() {
                Some(query) => format!("{}?{}", cleaned, query),
                None => cleaned,
            };
            return moved_permanently(location);
        }
    }

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match state.routes.match_path(path) {
        Some(route) => route.handle(request, client_ip).await,
        None => {
            tracing::debug!(path = %request.uri().path(), "No route matched");
            not_found()
        }
    }
}
