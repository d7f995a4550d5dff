//! Memcached-backed `CacheClient`.
//!
//! `async_memcached::Client` needs `&mut self` for every operation, so each
//! call checks a connection out of a small idle pool (or dials a new one),
//! uses it exclusively, and returns it afterwards. Concurrent requests
//! never wait on each other. A connection whose state is unknown after an
//! I/O error or timeout is dropped instead of returned.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_memcached::{AsciiProtocol, Client};
use async_trait::async_trait;
use axum::body::Bytes;
use tokio::time::timeout;

use crate::cache::{CacheClient, CacheError};

/// Upper bound for a single cache round trip, connecting included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default memcached item size limit.
pub const MAX_ITEM_BYTES: usize = 1024 * 1024;

/// Idle connections kept for reuse.
pub const MAX_IDLE: usize = 16;

const MAX_KEY_BYTES: usize = 250;

/// Memcached cache adapter shared by all static routes.
pub struct MemcacheClient {
    endpoint: String,
    dsn: String,
    timeout: Duration,
    idle: Mutex<Vec<Client>>,
}

impl MemcacheClient {
    /// Create an adapter for `host:port` (or a `tcp://`/`unix://` DSN).
    /// No connection is made yet.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            dsn: dsn(&endpoint),
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Override the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Connections currently parked in the pool.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn checkout(&self) -> Result<Client, CacheError> {
        let parked = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        if let Some(client) = parked {
            return Ok(client);
        }

        let client = Client::new(self.dsn.as_str())
            .await
            .map_err(|e| CacheError::Protocol(format!("connect: {}", e)))?;
        tracing::debug!(endpoint = %self.endpoint, "Connected to memcached");
        Ok(client)
    }

    fn checkin(&self, client: Client) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE {
            idle.push(client);
        }
    }

    /// Map an operation outcome, returning the connection only when it is
    /// known to be in a clean state.
    fn settle<T>(
        &self,
        client: Client,
        outcome: Result<T, async_memcached::Error>,
    ) -> Result<T, CacheError> {
        match outcome {
            Ok(value) => {
                self.checkin(client);
                Ok(value)
            }
            Err(async_memcached::Error::Protocol(status)) => {
                self.checkin(client);
                Err(CacheError::Protocol(format!("{:?}", status)))
            }
            Err(async_memcached::Error::Io(e)) => Err(CacheError::Io(e)),
            #[allow(unreachable_patterns)]
            Err(e) => Err(CacheError::Protocol(e.to_string())),
        }
    }
}

/// `async_memcached` only accepts URLs; bare `host:port` gets `tcp://`.
fn dsn(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("tcp://{}", endpoint)
    }
}

/// Memcached keys are 1..=250 bytes with no whitespace or control bytes.
pub fn check_key(key: &str) -> Result<(), CacheError> {
    let legal = !key.is_empty()
        && key.len() <= MAX_KEY_BYTES
        && key.bytes().all(|b| b > b' ' && b != 0x7f);
    if legal {
        Ok(())
    } else {
        Err(CacheError::MalformedKey)
    }
}

fn ttl(ttl_secs: i32) -> Option<i64> {
    (ttl_secs > 0).then_some(i64::from(ttl_secs))
}

#[async_trait]
impl CacheClient for MemcacheClient {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        check_key(key)?;
        let round_trip = async {
            let mut client = self.checkout().await?;
            let outcome = client.get(key).await;
            Ok::<_, CacheError>((client, outcome))
        };
        let (client, outcome) = timeout(self.timeout, round_trip)
            .await
            .map_err(|_| CacheError::Timeout)??;
        let value = self.settle(client, outcome)?;
        Ok(value.and_then(|v| v.data).map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl_secs: i32) -> Result<(), CacheError> {
        check_key(key)?;
        if value.len() > MAX_ITEM_BYTES {
            return Err(CacheError::TooLarge {
                size: value.len(),
                limit: MAX_ITEM_BYTES,
            });
        }
        let round_trip = async {
            let mut client = self.checkout().await?;
            let outcome = client.set(key, value.as_ref(), ttl(ttl_secs), None).await;
            Ok::<_, CacheError>((client, outcome))
        };
        let (client, outcome) = timeout(self.timeout, round_trip)
            .await
            .map_err(|_| CacheError::Timeout)??;
        self.settle(client, outcome)
    }
}
