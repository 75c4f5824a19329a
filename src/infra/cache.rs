//! Redis-backed cache backend.
//!
//! The connection is established lazily and never awaited under a lock. A
//! failed connect starts a cooldown during which every operation fails fast
//! with [`CacheError::Unavailable`], so a dead Redis costs callers one
//! bounded connect attempt per cooldown window rather than one per request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, RedisError};
use tracing::{info, warn};

use crate::cache::{CacheBackend, CacheError};
use crate::infra::error::InfraError;

const LOG_TARGET: &str = "qubit::cache::redis";
const SCAN_COUNT: usize = 500;
// backon sleeps at least a second before any retry; the cooldown below
// paces reconnects instead.
const CONNECT_RETRIES: usize = 0;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Slot {
    conn: Option<ConnectionManager>,
    retry_after: Option<Instant>,
}

/// Connects lazily so the application starts even while Redis is down.
pub struct RedisCacheBackend {
    client: redis::Client,
    slot: Mutex<Slot>,
    connecting: AtomicBool,
    cooldown: Duration,
}

impl RedisCacheBackend {
    pub fn new(url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(url)
            .map_err(|err| InfraError::cache(format!("invalid cache.url: {err}")))?;
        Ok(Self {
            client,
            slot: Mutex::new(Slot::default()),
            connecting: AtomicBool::new(false),
            cooldown: DEFAULT_COOLDOWN,
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| {
            warn!(
                target: LOG_TARGET,
                result = "poisoned_recovered",
                "Recovered from poisoned connection lock"
            );
            poisoned.into_inner()
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        {
            let slot = self.slot();
            if let Some(conn) = slot.conn.as_ref() {
                return Ok(conn.clone());
            }
            if slot.retry_after.is_some_and(|at| Instant::now() < at) {
                return Err(CacheError::Unavailable("reconnect cooling down".into()));
            }
        }

        // Only one caller dials at a time; the rest treat the cache as a miss.
        if self.connecting.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Unavailable(
                "connection attempt in progress".into(),
            ));
        }
        let result = {
            let _dialing = Dialing(&self.connecting);
            self.connect().await
        };

        let mut slot = self.slot();
        match result {
            Ok(conn) => {
                slot.conn = Some(conn.clone());
                slot.retry_after = None;
                Ok(conn)
            }
            Err(err) => {
                slot.retry_after = Some(Instant::now() + self.cooldown);
                Err(err)
            }
        }
    }

    async fn connect(&self) -> Result<ConnectionManager, CacheError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT);
        let conn = ConnectionManager::new_with_config(self.client.clone(), config)
            .await
            .map_err(classify)?;
        info!(target: LOG_TARGET, "Connected to Redis");
        Ok(conn)
    }
}

/// Clears the in-progress flag even if the connecting future is dropped.
struct Dialing<'a>(&'a AtomicBool);

impl Drop for Dialing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn classify(err: RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        CacheError::Unavailable(err.to_string())
    } else {
        CacheError::Command(err.to_string())
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key).await.map_err(classify)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(classify)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(classify)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(classify)?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(classify)?;
                removed += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(removed)
    }

    async fn reconnect(&self) -> Result<(), CacheError> {
        self.slot().conn = None;
        self.connection().await.map(|_| ())
    }
}
