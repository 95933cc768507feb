pub mod cache;
pub mod catalog;
pub mod events;
pub mod memory;
pub mod postgres;
pub mod redis;
mod store;

pub use self::cache::{CacheLookup, CacheTicket, RecommendationCache, ResultKey};
pub use self::catalog::PgCatalogStore;
pub use self::events::PgEventStore;
pub use self::memory::{Clock, ManualClock, MemoryCache, SystemClock};
pub use self::postgres::{create_pool, run_migrations};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use self::store::{CatalogStore, EventStore};

#[cfg(test)]
pub use self::cache::MockRecommendationCache;
#[cfg(test)]
pub use self::store::{MockCatalogStore, MockEventStore};
