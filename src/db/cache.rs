use std::fmt::Display;

use crate::{
    error::AppResult,
    models::{RecommendationContext, RecommendationResult},
};

/// Identity of one cached page of recommendations
///
/// `subject` is the actor key for home and cart, and the seed product id for
/// product detail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub context: RecommendationContext,
    pub subject: String,
    pub page: u32,
    pub page_size: u32,
}

impl ResultKey {
    pub fn new(
        context: RecommendationContext,
        subject: impl Into<String>,
        page: u32,
        page_size: u32,
    ) -> Self {
        Self {
            context,
            subject: subject.into(),
            page,
            page_size,
        }
    }

    /// Actor key this entry belongs to, if it is invalidated per actor
    pub fn actor(&self) -> Option<&str> {
        match self.context {
            RecommendationContext::Home | RecommendationContext::Cart => Some(&self.subject),
            RecommendationContext::Product => None,
        }
    }
}

impl Display for ResultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rec:{}:{}:{}:{}",
            self.context, self.subject, self.page, self.page_size
        )
    }
}

/// Outcome of a cache read
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(RecommendationResult),
    /// Nothing usable is cached; the ticket is what a later write must present
    Miss(CacheTicket),
}

/// Write permit handed out on a miss
///
/// Records the actor's generation as seen by the lookup. A write presented
/// after the actor was invalidated is dropped or can no longer be read, so a
/// page computed from pre-invalidation state never outlives the invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTicket {
    pub key: ResultKey,
    pub generation: u64,
}

/// Memoizes ranked pages with a TTL and per-actor invalidation
///
/// Implementations must never return an entry after its TTL, nor after
/// `invalidate` was called for its actor. Invalidation covers every context
/// and page of the actor in one call.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationCache: Send + Sync {
    async fn get_from_cache(&self, key: &ResultKey) -> AppResult<CacheLookup>;

    async fn store(
        &self,
        ticket: &CacheTicket,
        result: &RecommendationResult,
        ttl: u64,
    ) -> AppResult<()>;

    async fn invalidate(&self, actor_key: &str) -> AppResult<()>;
}
