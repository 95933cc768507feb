use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::db::cache::{CacheLookup, CacheTicket, RecommendationCache, ResultKey};
use crate::error::AppError;
use crate::error::AppResult;
use crate::models::RecommendationResult;

/// Lifetime of an actor's generation counter, refreshed on every write.
/// Must exceed the longest result TTL.
const GENERATION_TTL: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A ranked page, stored under the actor's current generation
    Recommendation { key: ResultKey, generation: u64 },
    /// Per-actor generation counter; bumping it orphans every cached page
    Generation(String),
    /// The actor's recency window of events
    RecentEvents(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Recommendation { key, generation } => write!(f, "{}:g{}", key, generation),
            CacheKey::Generation(actor) => write!(f, "rec:gen:{}", actor),
            CacheKey::RecentEvents(actor) => write!(f, "recent_events:{}", actor),
        }
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed recommendation cache
///
/// Invalidation uses versioned keys: each actor has a generation counter
/// folded into its result keys, so dropping every context and page for the
/// actor is a single `INCR` instead of a key scan. Orphaned entries age out
/// through their own TTL.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Asks the writer task to flush pending writes and waits until it has
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task ended abnormally");
        }
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// Writes are handed to a background task so a slow Redis never holds up
    /// a recommendation response.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx, task })
    }

    /// Background task that processes cache write messages
    ///
    /// On shutdown, drains whatever is still queued before exiting.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        } else {
                            flushed += 1;
                        }
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Current generation for the key's actor; product pages are unversioned
    async fn generation_for(
        conn: &mut redis::aio::MultiplexedConnection,
        key: &ResultKey,
    ) -> AppResult<u64> {
        match key.actor() {
            Some(actor) => {
                let generation: Option<u64> =
                    conn.get(CacheKey::Generation(actor.to_string()).to_string()).await?;
                Ok(generation.unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    /// Queues a write without waiting for Redis
    fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}

#[async_trait::async_trait]
impl RecommendationCache for Cache {
    async fn get_from_cache(&self, key: &ResultKey) -> AppResult<CacheLookup> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let generation = Self::generation_for(&mut conn, key).await?;

        let versioned = CacheKey::Recommendation {
            key: key.clone(),
            generation,
        };
        let cached: Option<String> = conn.get(versioned.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(CacheLookup::Hit(data))
            }
            None => Ok(CacheLookup::Miss(CacheTicket {
                key: key.clone(),
                generation,
            })),
        }
    }

    /// Writes under the generation seen at lookup. If the actor was
    /// invalidated since, the entry lands under a retired generation and is
    /// never read.
    async fn store(
        &self,
        ticket: &CacheTicket,
        result: &RecommendationResult,
        ttl: u64,
    ) -> AppResult<()> {
        if let Some(actor) = ticket.key.actor() {
            let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
            let _: () = conn
                .expire(CacheKey::Generation(actor.to_string()).to_string(), GENERATION_TTL)
                .await?;
        }

        let versioned = CacheKey::Recommendation {
            key: ticket.key.clone(),
            generation: ticket.generation,
        };
        self.set_in_background(&versioned, result, ttl);
        Ok(())
    }

    async fn invalidate(&self, actor_key: &str) -> AppResult<()> {
        let generation_key = CacheKey::Generation(actor_key.to_string()).to_string();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let (generation,): (u64,) = redis::pipe()
            .atomic()
            .incr(&generation_key, 1)
            .expire(&generation_key, GENERATION_TTL)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(actor = %actor_key, generation, "Recommendation cache invalidated");
        Ok(())
    }
}
