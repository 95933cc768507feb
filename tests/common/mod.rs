#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use storefront_recs::{
    db::{CatalogStore, EventStore, ManualClock, MemoryCache, RecommendationCache},
    error::{AppError, AppResult},
    models::{
        AiRanking, Actor, CatalogFilter, Event, EventType, ProductSummary, RelevanceRequest,
        SortBy,
    },
    services::{
        providers::{DisabledRelevance, RelevanceService},
        AiReranker, EngineSettings, RecommendationEngine,
    },
};

pub fn product(id: &str, category: &str, popularity: i32) -> ProductSummary {
    ProductSummary {
        id: id.to_string(),
        name: format!("Product {}", id),
        category: category.to_string(),
        price: 25.0,
        popularity,
        stock: 10,
    }
}

pub fn event(actor: &Actor, event_type: EventType, product_id: &str) -> Event {
    Event::new(actor.clone(), event_type, Some(product_id.to_string()))
}

/// Catalog held in memory; counts filter queries and can simulate an outage
#[derive(Default)]
pub struct FakeCatalog {
    products: Vec<ProductSummary>,
    pub filter_calls: AtomicUsize,
    pub down: AtomicBool,
    /// Actor to invalidate while the next filter query is in flight
    invalidate_during_filter: Mutex<Option<(Arc<MemoryCache>, String)>>,
}

impl FakeCatalog {
    pub fn new(products: Vec<ProductSummary>) -> Self {
        Self {
            products,
            ..Default::default()
        }
    }

    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }

    pub fn invalidate_during_next_filter(&self, cache: Arc<MemoryCache>, actor_key: &str) {
        *self.invalidate_during_filter.lock().unwrap() = Some((cache, actor_key.to_string()));
    }

    fn check_up(&self) -> AppResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::store_unavailable("catalog", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for FakeCatalog {
    async fn by_ids(&self, ids: &[String]) -> AppResult<Vec<ProductSummary>> {
        self.check_up()?;
        let mut found: Vec<ProductSummary> = self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn by_filter(
        &self,
        filter: &CatalogFilter,
        limit: usize,
        sort: SortBy,
    ) -> AppResult<Vec<ProductSummary>> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;

        let pending = self.invalidate_during_filter.lock().unwrap().take();
        if let Some((cache, actor_key)) = pending {
            cache.invalidate(&actor_key).await?;
        }

        let mut matching: Vec<ProductSummary> = self
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        match sort {
            SortBy::PopularityDesc => matching.sort_by(|a, b| {
                b.popularity.cmp(&a.popularity).then_with(|| a.id.cmp(&b.id))
            }),
        }
        matching.truncate(limit);
        Ok(matching)
    }
}

/// Event log held in memory, newest first per actor
#[derive(Default)]
pub struct FakeEvents {
    windows: Mutex<HashMap<String, Vec<Event>>>,
    purchases: Mutex<HashMap<String, Vec<ProductSummary>>>,
}

impl FakeEvents {
    pub fn record(&self, event: Event) {
        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(event.actor.key().to_string()).or_default();
        window.insert(0, event);
        window.truncate(100);
    }

    pub fn add_purchase(&self, user_id: &str, product: ProductSummary) {
        self.purchases
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(product);
    }
}

#[async_trait::async_trait]
impl EventStore for FakeEvents {
    async fn append(&self, event: &Event) -> AppResult<()> {
        self.record(event.clone());
        Ok(())
    }

    async fn recent_events(&self, actor_key: &str, limit: usize) -> AppResult<Vec<Event>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows
            .get(actor_key)
            .map(|w| w.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn all_events(&self, actor_key: &str) -> AppResult<Vec<Event>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows.get(actor_key).cloned().unwrap_or_default())
    }

    async fn purchase_history(&self, user_id: &str) -> AppResult<Vec<ProductSummary>> {
        let purchases = self.purchases.lock().unwrap();
        Ok(purchases.get(user_id).cloned().unwrap_or_default())
    }
}

/// Relevance service with a fixed answer and a call counter
pub struct FixedRelevance {
    rankings: Vec<AiRanking>,
    pub calls: AtomicUsize,
}

impl FixedRelevance {
    pub fn new(rankings: Vec<AiRanking>) -> Self {
        Self {
            rankings,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RelevanceService for FixedRelevance {
    async fn score(&self, _request: RelevanceRequest) -> AppResult<Vec<AiRanking>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rankings.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Relevance service that never answers
pub struct HangingRelevance;

#[async_trait::async_trait]
impl RelevanceService for HangingRelevance {
    async fn score(&self, _request: RelevanceRequest) -> AppResult<Vec<AiRanking>> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

/// Engine wired to in-memory collaborators and a manual clock
pub struct Harness {
    pub engine: RecommendationEngine,
    pub catalog: Arc<FakeCatalog>,
    pub events: Arc<FakeEvents>,
    pub cache: Arc<MemoryCache>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(products: Vec<ProductSummary>) -> Self {
        Self::with_relevance(products, Arc::new(DisabledRelevance), Duration::from_millis(400))
    }

    pub fn with_relevance(
        products: Vec<ProductSummary>,
        relevance: Arc<dyn RelevanceService>,
        deadline: Duration,
    ) -> Self {
        let catalog = Arc::new(FakeCatalog::new(products));
        let events = Arc::new(FakeEvents::default());
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(MemoryCache::with_clock(clock.clone()));

        let engine = RecommendationEngine::new(
            events.clone(),
            catalog.clone(),
            cache.clone(),
            AiReranker::new(relevance, deadline),
            EngineSettings::default(),
        );

        Self {
            engine,
            catalog,
            events,
            cache,
            clock,
        }
    }
}

pub fn ids(result: &[storefront_recs::models::ScoredCandidate]) -> Vec<String> {
    result.iter().map(|c| c.product.id.clone()).collect()
}
