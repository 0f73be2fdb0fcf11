use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::config::RedisConfig;

pub mod movies;
pub mod seats;

/// Read-through cache in front of the database.
///
/// Every method degrades to a no-op (reads miss) when Redis is not
/// configured or a call fails; the database stays the source of truth.
#[derive(Clone)]
pub struct CacheService {
    conn: Option<MultiplexedConnection>,
    seats_ttl: u64,
    movies_ttl: u64,
}

impl CacheService {
    pub async fn connect(config: &RedisConfig) -> Result<Self, redis::RedisError> {
        let Some(url) = config.url.as_deref() else {
            info!("REDIS_URL not set, caching disabled");
            return Ok(Self::disabled());
        };

        let client = Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        info!("Redis connected");
        Ok(Self {
            conn: Some(conn),
            seats_ttl: config.seats_ttl_seconds,
            movies_ttl: config.movies_ttl_seconds,
        })
    }

    pub fn disabled() -> Self {
        Self {
            conn: None,
            seats_ttl: 0,
            movies_ttl: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cache read {} failed: {}", key, e);
                return None;
            }
        };
        raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("dropping undecodable cache entry {}: {}", key, e);
                None
            }
        })
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!("cache encode {} failed: {}", key, e);
                return;
            }
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, data, ttl_seconds).await {
            warn!("cache write {} failed: {}", key, e);
        }
    }

    async fn delete(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!("cache delete {} failed: {}", key, e);
        }
    }

    async fn delete_matching(&self, pattern: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let keys: Vec<String> = match redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("cache scan {} failed: {}", pattern, e);
                return;
            }
        };
        if !keys.is_empty() {
            if let Err(e) = conn.del::<_, ()>(keys).await {
                warn!("cache delete {} failed: {}", pattern, e);
            }
        }
    }
}
