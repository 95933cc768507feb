use dashmap::DashMap;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{
    db::cache::{CacheLookup, CacheTicket, RecommendationCache, ResultKey},
    error::{AppError, AppResult},
    models::RecommendationResult,
};

/// Entry count at which writes first sweep expired entries, then give up
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.origin + offset
    }
}

struct Entry {
    payload: String,
    expires_at: Instant,
}

#[derive(Default)]
struct ActorState {
    /// Bumped by every invalidation
    generation: u64,
    /// Live entry keys, so invalidation never scans the keyspace
    keys: HashSet<String>,
}

/// In-process recommendation cache
///
/// Entries expire lazily when read, and in bulk when a write finds the map
/// full. Per-actor state is a generation counter plus the actor's live keys.
/// Writes check the generation under the actor's shard lock, so a write
/// racing an invalidation is dropped.
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    entries: DashMap<String, Entry>,
    actors: DashMap<String, ActorState>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: DashMap::new(),
            actors: DashMap::new(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn generation_of(&self, key: &ResultKey) -> u64 {
        key.actor()
            .and_then(|actor| self.actors.get(actor).map(|state| state.generation))
            .unwrap_or(0)
    }

    /// Drops an expired entry unless a fresh write replaced it meanwhile
    fn forget_expired(&self, key: &ResultKey, rendered: &str, now: Instant) {
        self.entries.remove_if(rendered, |_, entry| entry.expires_at <= now);
        if let Some(actor) = key.actor() {
            if let Some(mut state) = self.actors.get_mut(actor) {
                if !self.entries.contains_key(rendered) {
                    state.keys.remove(rendered);
                }
            }
        }
    }

    fn purge_expired(&self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        for mut state in self.actors.iter_mut() {
            state.keys.retain(|key| self.entries.contains_key(key));
        }
        self.actors
            .retain(|_, state| state.generation > 0 || !state.keys.is_empty());
        tracing::debug!(
            removed = before.saturating_sub(self.entries.len()),
            "Expired recommendation entries purged"
        );
    }

    fn has_room(&self, rendered: &str, now: Instant) -> bool {
        if self.entries.len() < self.max_entries || self.entries.contains_key(rendered) {
            return true;
        }
        self.purge_expired(now);
        self.entries.len() < self.max_entries
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecommendationCache for MemoryCache {
    async fn get_from_cache(&self, key: &ResultKey) -> AppResult<CacheLookup> {
        let now = self.clock.now();
        let ticket = CacheTicket {
            key: key.clone(),
            generation: self.generation_of(key),
        };
        let rendered = key.to_string();

        let lookup = self
            .entries
            .get(&rendered)
            .map(|entry| (entry.expires_at > now, entry.payload.clone()));

        match lookup {
            Some((true, payload)) => {
                let data = serde_json::from_str(&payload).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(CacheLookup::Hit(data))
            }
            Some((false, _)) => {
                self.forget_expired(key, &rendered, now);
                Ok(CacheLookup::Miss(ticket))
            }
            None => Ok(CacheLookup::Miss(ticket)),
        }
    }

    async fn store(
        &self,
        ticket: &CacheTicket,
        result: &RecommendationResult,
        ttl: u64,
    ) -> AppResult<()> {
        let payload = serde_json::to_string(result)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;
        let now = self.clock.now();
        let rendered = ticket.key.to_string();

        if !self.has_room(&rendered, now) {
            tracing::warn!(key = %rendered, max_entries = self.max_entries, "Memory cache full, skipping write");
            return Ok(());
        }

        let entry = Entry {
            payload,
            expires_at: now + Duration::from_secs(ttl),
        };

        match ticket.key.actor() {
            Some(actor) => {
                let mut state = self.actors.entry(actor.to_string()).or_default();
                if state.generation != ticket.generation {
                    tracing::debug!(key = %rendered, "Actor invalidated during computation, dropping write");
                    return Ok(());
                }
                state.keys.insert(rendered.clone());
                self.entries.insert(rendered, entry);
            }
            None => {
                self.entries.insert(rendered, entry);
            }
        }
        Ok(())
    }

    async fn invalidate(&self, actor_key: &str) -> AppResult<()> {
        let mut state = self.actors.entry(actor_key.to_string()).or_default();
        state.generation += 1;
        let keys = std::mem::take(&mut state.keys);
        for key in &keys {
            self.entries.remove(key);
        }
        let generation = state.generation;
        drop(state);

        tracing::debug!(
            actor = %actor_key,
            generation,
            removed = keys.len(),
            "Recommendation cache invalidated"
        );
        Ok(())
    }
}
