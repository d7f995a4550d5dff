//! Directory routes: static files with an optional cache front.
//!
//! # Responsibilities
//! - Strip the route prefix and serve the remainder under the root directory
//! - Index files, directory redirects and listings, MIME, ranges
//! - Short-circuit GETs from the external cache, fill it after a 200
//!
//! # Design Decisions
//! - Cache key is the full request path, so routes never collide
//! - Only complete 200 bodies within the item limit are captured
//! - Cache failures degrade to a plain serve and never change the response

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, HeaderValue, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::cache::memcache::MAX_ITEM_BYTES;
use crate::cache::CacheClient;
use crate::http::response::{bad_request, not_found};
use crate::routing::matcher::strip_prefix;

/// Characters escaped in listing hrefs.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Shared cache plus the route's TTL.
#[derive(Clone)]
pub struct CacheFront {
    client: Arc<dyn CacheClient>,
    ttl_secs: i32,
}

impl CacheFront {
    pub fn new(client: Arc<dyn CacheClient>, ttl_secs: i32) -> Self {
        Self { client, ttl_secs }
    }

    async fn lookup(&self, key: &str) -> Option<Bytes> {
        match self.client.get(key).await {
            Ok(Some(bytes)) => {
                tracing::debug!(key = %key, size = bytes.len(), "Cache hit");
                Some(bytes)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache lookup failed; serving from disk");
                None
            }
        }
    }

    /// Buffer a cacheable response, store it, and hand back the same response.
    async fn fill(&self, key: &str, response: Response) -> Response {
        if response.status() != StatusCode::OK {
            return response;
        }
        match body_length(&response) {
            Some(len) if len > 0 && len <= MAX_ITEM_BYTES as u64 => {}
            _ => return response,
        }

        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Reading file body failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if !bytes.is_empty() {
            match self.client.set(key, bytes.clone(), self.ttl_secs).await {
                Ok(()) => tracing::debug!(key = %key, size = bytes.len(), ttl = self.ttl_secs, "Cached response"),
                Err(e) => tracing::warn!(key = %key, error = %e, "Cache store failed"),
            }
        }

        Response::from_parts(parts, Body::from(bytes))
    }
}

/// Declared body length from `Content-Length`, or the body's exact size.
fn body_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}

/// Serves one directory route.
#[derive(Clone)]
pub struct StaticHandler {
    prefix: String,
    root: PathBuf,
    files: ServeDir,
    cache: Option<CacheFront>,
}

impl StaticHandler {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>, cache: Option<CacheFront>) -> Self {
        let root = root.into();
        Self {
            prefix: prefix.into(),
            files: ServeDir::new(&root),
            root,
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Handle a request already matched to this route.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let front = self
            .cache
            .as_ref()
            .filter(|_| request.method() == Method::GET);

        let Some(front) = front else {
            return self.serve(request).await;
        };

        let key = request.uri().path().to_string();
        if let Some(bytes) = front.lookup(&key).await {
            return cached_response(&key, bytes);
        }

        let response = self.serve(request).await;
        front.fill(&key, response).await
    }

    /// The plain file server: prefix strip, `ServeDir`, listing fallback.
    async fn serve(&self, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();
        let original = parts.uri.path().to_string();
        let suffix = local_path(&original, &self.prefix);
        if parts.method != Method::HEAD {
            parts.method = Method::GET;
        }

        parts.uri = match rewrite_path(&parts.uri, &suffix) {
            Some(uri) => uri,
            None => return bad_request(),
        };
        let request = Request::from_parts(parts, body);

        let response = match self.files.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };

        if response.status() == StatusCode::NOT_FOUND {
            if suffix.ends_with('/') {
                if let Some(listing) = self.listing(&suffix).await {
                    return listing;
                }
            }
            return not_found();
        }

        relocate(response, &suffix, &original)
    }

    /// Render a directory index when the directory has no index file.
    async fn listing(&self, suffix: &str) -> Option<Response> {
        let dir = resolve(&self.root, suffix)?;
        let mut read_dir = tokio::fs::read_dir(&dir).await.ok()?;

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        let mut html = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
        for name in &entries {
            html.push_str(&format!(
                "<a href=\"{}\">{}</a>\n",
                utf8_percent_encode(name, HREF),
                escape_html(name)
            ));
        }
        html.push_str("</pre>\n");

        Some(
            (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response(),
        )
    }
}

/// Path handed to the file server: the stripped suffix, always rooted.
fn local_path(path: &str, prefix: &str) -> String {
    let suffix = strip_prefix(path, prefix);
    if suffix.starts_with('/') {
        suffix.to_string()
    } else {
        format!("/{}", suffix)
    }
}

fn rewrite_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    Uri::builder().path_and_query(path_and_query).build().ok()
}

/// Point file-server redirects back at the client-visible path.
fn relocate(mut response: Response, suffix: &str, original: &str) -> Response {
    if !response.status().is_redirection() {
        return response;
    }
    let rewritten = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|location| location.strip_prefix(suffix))
        .map(|rest| format!("{}{}", original, rest))
        .and_then(|location| HeaderValue::from_str(&location).ok());
    if let Some(location) = rewritten {
        response.headers_mut().insert(header::LOCATION, location);
    }
    response
}

/// Resolve a URL path under `root`, refusing anything that escapes it.
fn resolve(root: &Path, suffix: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(suffix).decode_utf8().ok()?;
    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

fn cached_response(key: &str, bytes: Bytes) -> Response {
    let content_type = if key.ends_with('/') {
        Some("text/html; charset=utf-8".to_string())
    } else {
        mime_guess::from_path(key).first_raw().map(str::to_string)
    };

    let mut response = (StatusCode::OK, bytes).into_response();
    match content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        Some(value) => {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        None => {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
    }
    response
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::cache::CacheError;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, Bytes>>,
        sets: Mutex<Vec<(String, Bytes, i32)>>,
        fail: bool,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl CacheClient for MapCache {
        async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CacheError::Timeout);
            }
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Bytes, ttl_secs: i32) -> Result<(), CacheError> {
            self.sets
                .lock()
                .unwrap()
                .push((key.to_string(), value.clone(), ttl_secs));
            if self.fail {
                return Err(CacheError::Timeout);
            }
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "HI").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("index.html"), "<h1>docs</h1>").unwrap();
        std::fs::create_dir(dir.path().join("raw")).unwrap();
        std::fs::write(dir.path().join("raw").join("b <1>.txt"), "b").unwrap();
        std::fs::create_dir(dir.path().join("raw").join("nested")).unwrap();
        dir
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn serves_stripped_path() {
        let dir = site();
        let handler = StaticHandler::new("/s", dir.path(), None);

        let response = handler.handle(get("/s/a.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(response).await, "HI");

        let response = handler.handle(get("/s/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "404 page not found\n");
    }

    #[tokio::test]
    async fn any_method_serves_the_file() {
        let dir = site();
        let cache = Arc::new(MapCache::default());
        let handler = StaticHandler::new("/s", dir.path(), Some(CacheFront::new(cache.clone(), 60)));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/s/a.txt")
            .body(Body::from("ignored"))
            .unwrap();
        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "HI");
        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn serves_index_and_redirects_directories() {
        let dir = site();
        let handler = StaticHandler::new("/s", dir.path(), None);

        let response = handler.handle(get("/s/docs/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>docs</h1>");

        let response = handler.handle(get("/s/docs?x=1")).await;
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/s/docs/?x=1");
    }

    #[tokio::test]
    async fn lists_directories_without_index() {
        let dir = site();
        let handler = StaticHandler::new("/s", dir.path(), None);

        let response = handler.handle(get("/s/raw/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("<a href=\"b%20%3C1%3E.txt\">b &lt;1&gt;.txt</a>"));
        assert!(html.contains("<a href=\"nested/\">nested/</a>"));
    }

    #[tokio::test]
    async fn route_equal_to_path_serves_root() {
        let dir = site();
        let handler = StaticHandler::new("/s/docs/", dir.path().join("docs"), None);
        let response = handler.handle(get("/s/docs/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>docs</h1>");
    }

    #[tokio::test]
    async fn miss_fills_cache_then_hit_skips_disk() {
        let dir = site();
        let cache = Arc::new(MapCache::default());
        let handler = StaticHandler::new(
            "/s",
            dir.path(),
            Some(CacheFront::new(cache.clone(), 60)),
        );

        let response = handler.handle(get("/s/a.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "HI");
        assert_eq!(
            cache.sets.lock().unwrap().clone(),
            vec![("/s/a.txt".to_string(), Bytes::from_static(b"HI"), 60)]
        );

        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        let response = handler.handle(get("/s/a.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(response).await, "HI");
        assert_eq!(cache.sets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn errors_and_empty_bodies_are_not_cached() {
        let dir = site();
        let cache = Arc::new(MapCache::default());
        let handler = StaticHandler::new("/s", dir.path(), Some(CacheFront::new(cache.clone(), 60)));

        assert_eq!(handler.handle(get("/s/missing")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(handler.handle(get("/s/empty.txt")).await.status(), StatusCode::OK);
        assert!(handler.handle(get("/s/docs")).await.status().is_redirection());
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_content_is_not_cached() {
        let dir = site();
        let cache = Arc::new(MapCache::default());
        let handler = StaticHandler::new("/s", dir.path(), Some(CacheFront::new(cache.clone(), 60)));

        let request = Request::builder()
            .uri("/s/a.txt")
            .header(header::RANGE, "bytes=0-0")
            .body(Body::empty())
            .unwrap();
        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_failures_never_mask_serving() {
        let dir = site();
        let cache = Arc::new(MapCache {
            fail: true,
            ..MapCache::default()
        });
        let handler = StaticHandler::new("/s", dir.path(), Some(CacheFront::new(cache.clone(), 60)));

        let response = handler.handle(get("/s/a.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "HI");
        assert_eq!(cache.sets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_get_bypasses_cache() {
        let dir = site();
        let cache = Arc::new(MapCache::default());
        let handler = StaticHandler::new("/s", dir.path(), Some(CacheFront::new(cache.clone(), 60)));

        let request = Request::builder()
            .method(Method::HEAD)
            .uri("/s/a.txt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler.handle(request).await.status(), StatusCode::OK);
        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[test]
    fn local_path_is_rooted() {
        assert_eq!(local_path("/s/a.txt", "/s"), "/a.txt");
        assert_eq!(local_path("/s", "/s"), "/");
        assert_eq!(local_path("/sa.txt", "/s"), "/a.txt");
        assert_eq!(local_path("/s/a.txt", "/s/"), "/a.txt");
    }

    #[test]
    fn resolve_refuses_traversal() {
        let root = Path::new("/srv/www");
        assert_eq!(resolve(root, "/docs/"), Some(PathBuf::from("/srv/www/docs")));
        assert_eq!(resolve(root, "/a%20b/"), Some(PathBuf::from("/srv/www/a b")));
        assert_eq!(resolve(root, "/../etc/"), None);
        assert_eq!(resolve(root, "/%2e%2e/etc/"), None);
    }

    #[test]
    fn cached_response_guesses_type() {
        let response = cached_response("/s/style.css", Bytes::from_static(b"x"));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

        let response = cached_response("/s/", Bytes::from_static(b"x"));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");

        let response = cached_response("/s/LICENSE", Bytes::from_static(b"x"));
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}
