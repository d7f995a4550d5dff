//! URL routes: single-host reverse proxy.
//!
//! # Responsibilities
//! - Reject requests whose first path segment differs from the route's
//! - Add configured headers, set forwarding headers, rewrite the URI
//! - Stream the upstream response back, 502 on transport failure
//!
//! # Design Decisions
//! - Configured headers are appended, never replacing client values
//! - Upstream path is the target path joined with the stripped request path
//! - Hop-by-hop headers are dropped in both directions
//! - Upstream requests are always HTTP/1.1

use std::net::IpAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, Scheme},
        Request, Uri, Version,
    },
    response::Response,
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::RouteConfig;
use crate::http::response::{bad_gateway, bad_request, not_found};
use crate::routing::matcher::{first_segment, strip_prefix};
use crate::routing::RouteBuildError;

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Shared upstream client for all URL routes.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the upstream client: HTTP/1.1, plain or TLS with webpki roots.
pub fn upstream_client() -> Result<UpstreamClient, RouteBuildError> {
    let https = HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(rustls::crypto::aws_lc_rs::default_provider())
        .map_err(RouteBuildError::UpstreamTls)?
        .https_or_http()
        .enable_http1()
        .build();
    Ok(Client::builder(TokioExecutor::new()).build(https))
}

/// Forwards requests for one URL route.
#[derive(Clone)]
pub struct ProxyHandler {
    prefix: String,
    scheme: Scheme,
    authority: Authority,
    host: HeaderValue,
    base_path: String,
    base_query: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
    client: UpstreamClient,
}

impl ProxyHandler {
    /// Compile a URL route. The target must be an absolute URL.
    pub fn new(route: &RouteConfig, client: UpstreamClient) -> Result<Self, RouteBuildError> {
        let invalid = || RouteBuildError::InvalidTarget {
            path: route.path.clone(),
            target: route.target.clone(),
        };

        let target = Url::parse(&route.target).map_err(|_| invalid())?;
        let host = target.host_str().ok_or_else(invalid)?;
        let authority = match target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let scheme = Scheme::from_str(target.scheme()).map_err(|_| invalid())?;
        let authority = Authority::from_str(&authority).map_err(|_| invalid())?;
        let host = HeaderValue::from_str(authority.as_str()).map_err(|_| invalid())?;

        let mut headers = Vec::with_capacity(route.headers.len());
        for (name, value) in &route.headers {
            let bad = || RouteBuildError::InvalidHeader {
                path: route.path.clone(),
                name: name.clone(),
            };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| bad())?;
            let value = HeaderValue::from_str(value).map_err(|_| bad())?;
            headers.push((name, value));
        }

        Ok(Self {
            prefix: route.path.clone(),
            scheme,
            authority,
            host,
            base_path: target.path().to_string(),
            base_query: target.query().map(str::to_string),
            headers,
            client,
        })
    }

    /// Proxy a request already matched to this route.
    pub async fn handle(&self, request: Request<Body>, client_ip: Option<IpAddr>) -> Response {
        if first_segment(request.uri().path()) != first_segment(&self.prefix) {
            return not_found();
        }

        let outbound = match self.rewrite(request, client_ip) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::warn!(route = %self.prefix, error = %e, "Cannot build upstream request");
                return bad_request();
            }
        };

        let uri = outbound.uri().clone();
        tracing::debug!(route = %self.prefix, upstream = %uri, "Forwarding request");

        match self.client.request(outbound).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(route = %self.prefix, upstream = %uri, error = %e, "Upstream error");
                bad_gateway()
            }
        }
    }

    /// Turn an inbound request into the upstream request.
    pub fn rewrite(
        &self,
        request: Request<Body>,
        client_ip: Option<IpAddr>,
    ) -> Result<Request<Body>, axum::http::Error> {
        let (mut parts, body) = request.into_parts();

        let inbound_host = parts.headers.get(header::HOST).cloned().or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });

        strip_hop_by_hop(&mut parts.headers);

        for (name, value) in &self.headers {
            parts.headers.append(name.clone(), value.clone());
        }

        let path = join_paths(&self.base_path, strip_prefix(parts.uri.path(), &self.prefix));
        let query = join_queries(self.base_query.as_deref(), parts.uri.query());
        let path_and_query = match query {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };
        parts.uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?;

        match inbound_host {
            Some(host) => {
                parts.headers.insert(X_FORWARDED_HOST, host);
            }
            None => {
                parts.headers.remove(X_FORWARDED_HOST);
            }
        }
        parts.headers.insert(header::HOST, self.host.clone());

        if let Some(ip) = client_ip {
            append_forwarded_for(&mut parts.headers, ip);
        }

        parts.version = Version::HTTP_11;
        Ok(Request::from_parts(parts, body))
    }
}

/// Join with exactly one slash between the halves.
fn join_paths(base: &str, rest: &str) -> String {
    match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) => format!("{}/{}", base, rest),
        _ => format!("{}{}", base, rest),
    }
}

fn join_queries(base: Option<&str>, request: Option<&str>) -> Option<String> {
    match (base.filter(|q| !q.is_empty()), request.filter(|q| !q.is_empty())) {
        (Some(b), Some(r)) => Some(format!("{}&{}", b, r)),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];
