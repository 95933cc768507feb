use redis::{AsyncCommands, Client};
use serde_json::Value;
use sqlx::{error::ErrorKind, PgPool};

use crate::{
    db::{CacheKey, EventStore},
    error::{AppError, AppResult},
    models::{Event, ProductSummary},
};

/// Number of events kept in an actor's recency window
pub const RECENT_EVENTS_CAP: isize = 100;
/// Recency window expires after an hour of inactivity
const RECENT_EVENTS_TTL: i64 = 3600;

/// Event store: durable rows in Postgres plus a Redis list of recent events
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    redis_client: Client,
}

impl PgEventStore {
    pub fn new(pool: PgPool, redis_client: Client) -> Self {
        Self { pool, redis_client }
    }

    async fn read_window(&self, actor_key: &str, stop: isize) -> AppResult<Vec<Event>> {
        let key = CacheKey::RecentEvents(actor_key.to_string()).to_string();
        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::store_unavailable("event", e))?;

        let raw: Vec<String> = conn
            .lrange(&key, 0, stop)
            .await
            .map_err(|e| AppError::store_unavailable("event", e))?;

        Ok(parse_window(actor_key, raw))
    }
}

/// Constraint violations on insert are client errors; anything else is an outage
fn append_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.kind() != ErrorKind::Other {
            return AppError::InvalidRequest(format!("Event rejected: {}", db.message()));
        }
    }
    AppError::store_unavailable("event", e)
}

/// Decodes the stored window, dropping entries that no longer parse
fn parse_window(actor_key: &str, raw: Vec<String>) -> Vec<Event> {
    raw.into_iter()
        .filter_map(|json| match serde_json::from_str::<Event>(&json) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(actor = %actor_key, error = %e, "Skipping malformed recent event");
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: &Event) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_events (actor_key, user_id, event_type, product_id, metadata, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.actor.key())
        .bind(event.actor.user_id())
        .bind(event.event_type.as_str())
        .bind(event.product_id.as_deref())
        .bind(Value::Object(event.metadata.clone()))
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(append_error)?;

        let key = CacheKey::RecentEvents(event.actor.key().to_string()).to_string();
        let json = serde_json::to_string(event)
            .map_err(|e| AppError::Internal(format!("Event serialization error: {}", e)))?;

        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::store_unavailable("event", e))?;

        let _: () = redis::pipe()
            .atomic()
            .lpush(&key, json)
            .ignore()
            .ltrim(&key, 0, RECENT_EVENTS_CAP - 1)
            .ignore()
            .expire(&key, RECENT_EVENTS_TTL)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable("event", e))?;

        tracing::debug!(
            actor = %event.actor,
            event_type = %event.event_type,
            "Event appended"
        );

        Ok(())
    }

    async fn recent_events(&self, actor_key: &str, limit: usize) -> AppResult<Vec<Event>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.read_window(actor_key, limit as isize - 1).await
    }

    async fn all_events(&self, actor_key: &str) -> AppResult<Vec<Event>> {
        self.read_window(actor_key, -1).await
    }

    async fn purchase_history(&self, user_id: &str) -> AppResult<Vec<ProductSummary>> {
        sqlx::query_as::<_, ProductSummary>(
            r#"
            SELECT p.id, p.name, p.category, p.price, p.popularity, p.stock
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            JOIN products p ON p.id = oi.product_id
            WHERE o.user_id = $1 AND o.status = 'completed'
            ORDER BY o.created_at DESC, p.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::store_unavailable("event", e))
    }
}
