// Redis fast-tier adapter.
//
// First cache tier in front of the durable store. Connection is established
// lazily and reused; a missing REDIS_URL or a failed connect degrades the
// tier to permanently-absent behavior for the process lifetime instead of
// erroring the caller.

use crate::value_cache::{cache_key, ValueTier};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;

/// Poison sentinel for a key whose computed value was not a number.
/// Read back as a miss so the durable tier (or a recompute) can answer.
pub const NOT_A_NUMBER: &str = "NaN";

pub struct FastStore {
    url: Option<String>,
    conn: OnceCell<Option<ConnectionManager>>,
}

impl FastStore {
    pub fn new(url: Option<String>) -> Self {
        if url.is_none() {
            warn!("REDIS_URL not set, fast tier will be disabled");
        }
        Self {
            url,
            conn: OnceCell::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.url.is_none()
    }

    /// Lazy connection, safe under races: concurrent first calls resolve to
    /// the same ConnectionManager (or the same permanent None on failure).
    async fn connection(&self) -> Option<ConnectionManager> {
        let url = self.url.as_ref()?;
        self.conn
            .get_or_init(|| async {
                match Client::open(url.as_str()) {
                    Ok(client) => match ConnectionManager::new(client).await {
                        Ok(conn) => {
                            info!("✅ Fast tier connected to Redis");
                            Some(conn)
                        }
                        Err(e) => {
                            warn!("⚠️ Redis connection failed, fast tier disabled: {}", e);
                            None
                        }
                    },
                    Err(e) => {
                        warn!("⚠️ Invalid Redis URL, fast tier disabled: {}", e);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Redis get error: {}", e);
                None
            }
        }
    }

    async fn set_raw(&self, key: &str, value: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(e) = conn.set::<_, _, ()>(key, value).await {
            warn!("Redis set error: {}", e);
        }
    }

    /// Test Redis connectivity.
    pub async fn ping(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        matches!(
            redis::cmd("PING").query_async::<_, String>(&mut conn).await,
            Ok(pong) if pong == "PONG"
        )
    }
}

#[async_trait]
impl ValueTier for FastStore {
    fn name(&self) -> &'static str {
        "fast"
    }

    async fn get(&self, protocol: &str, attribute: &str, date: &str) -> Option<f64> {
        let key = cache_key(protocol, attribute, date);
        let raw = self.get_raw(&key).await?;
        if raw == NOT_A_NUMBER {
            debug!("Fast tier holds sentinel for {}, treating as miss", key);
            return None;
        }
        raw.parse::<f64>().ok()
    }

    async fn set(&self, protocol: &str, attribute: &str, date: &str, value: f64) -> Result<()> {
        let key = cache_key(protocol, attribute, date);
        self.set_raw(&key, &value.to_string()).await;
        // Fast-tier failures are absorbed above; they never fail the write
        Ok(())
    }
}
