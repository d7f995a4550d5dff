//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use goroute::cache::{CacheClient, CacheError};
use goroute::config::{RouteConfig, RouterConfig, TargetType};
use goroute::{HttpServer, Shutdown};

/// Mock upstream that answers every request with its own request head.
pub struct EchoUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl EchoUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Start an upstream that echoes the request line and headers as the body.
pub async fn start_echo_upstream() -> EchoUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let end = head.windows(4).position(|w| w == b"\r\n\r\n").unwrap_or(head.len());
                let body = &head[..end];
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    EchoUpstream { addr, hits }
}

/// In-memory cache that records every store.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, (Bytes, i32)>>,
    sets: AtomicUsize,
}

impl RecordingCache {
    pub fn entry(&self, key: &str) -> Option<(Bytes, i32)> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheClient for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: Bytes, ttl_secs: i32) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl_secs));
        Ok(())
    }
}

pub fn url_route(path: &str, target: &str, headers: &[(&str, &str)]) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        target: target.to_string(),
        target_type: TargetType::Url,
        cache_expiry: 0,
    }
}

pub fn dir_route(path: &str, target: &str, cache_expiry: i32) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        headers: HashMap::new(),
        target: target.to_string(),
        target_type: TargetType::Dir,
        cache_expiry,
    }
}

/// Plaintext config on an ephemeral loopback port.
pub fn local_config(routes: Vec<RouteConfig>) -> RouterConfig {
    RouterConfig {
        host: "127.0.0.1".to_string(),
        port: "0".to_string(),
        routes,
        ..RouterConfig::default()
    }
}

/// Running router under test. Dropping it leaves the server running
/// until the runtime ends; call `stop` to shut down explicitly.
pub struct TestRouter {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    task: tokio::task::JoinHandle<()>,
}

impl TestRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.task.await;
    }
}

/// Bind and serve `config`, using `cache` for directory routes.
pub async fn start_router(
    config: RouterConfig,
    cache: Option<Arc<dyn CacheClient>>,
) -> TestRouter {
    let listener = goroute::net::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::with_cache(config, cache).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestRouter {
        addr,
        shutdown,
        task,
    }
}
