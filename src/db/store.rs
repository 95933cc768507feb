//! Collaborator boundaries for the event log and the product catalog.
//!
//! Both are external services from the engine's point of view. Every
//! implementation reports outages as `AppError::StoreUnavailable` so callers
//! can tell a failure apart from a genuinely empty answer.

use crate::{
    error::AppResult,
    models::{CatalogFilter, Event, ProductSummary, SortBy},
};

/// Append-only log of behavioural events, with a short-lived recency window
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &Event) -> AppResult<()>;

    /// Most recent events for the actor, newest first
    async fn recent_events(&self, actor_key: &str, limit: usize) -> AppResult<Vec<Event>>;

    /// The whole recency window for the actor, newest first
    async fn all_events(&self, actor_key: &str) -> AppResult<Vec<Event>>;

    /// Every product the user has bought, across all completed orders
    async fn purchase_history(&self, user_id: &str) -> AppResult<Vec<ProductSummary>>;
}

/// Read-only product catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Resolves ids to products; unknown ids are silently absent
    async fn by_ids(&self, ids: &[String]) -> AppResult<Vec<ProductSummary>>;

    async fn by_filter(
        &self,
        filter: &CatalogFilter,
        limit: usize,
        sort: SortBy,
    ) -> AppResult<Vec<ProductSummary>>;
}
