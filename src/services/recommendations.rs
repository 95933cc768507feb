use std::sync::Arc;

use crate::{
    cached,
    db::{CatalogStore, EventStore, RecommendationCache, ResultKey},
    error::{AppError, AppResult},
    models::{Actor, RecommendationContext, RecommendationResult},
    services::{
        candidates::{CandidateGenerator, CandidateSet},
        reranker::AiReranker,
        scoring,
    },
};

/// Tuning knobs for the recommendation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Maximum home/cart candidate pool
    pub candidate_cap: usize,
    pub popularity_threshold: u32,
    /// Cache TTLs in seconds
    pub home_ttl: u64,
    pub cart_ttl: u64,
    pub product_ttl: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            candidate_cap: 60,
            popularity_threshold: 50,
            home_ttl: 300,
            cart_ttl: 300,
            product_ttl: 600,
        }
    }
}

/// Produces ranked, paginated recommendations for home, product and cart
///
/// Each operation is read-through cached. On a miss the candidate pool is
/// generated, scored, optionally re-ranked (home, first page only), sorted by
/// score with ties kept in catalog order, sliced to the requested page and
/// written back.
#[derive(Clone)]
pub struct RecommendationEngine {
    generator: CandidateGenerator,
    reranker: AiReranker,
    cache: Arc<dyn RecommendationCache>,
    settings: EngineSettings,
}

impl RecommendationEngine {
    pub fn new(
        events: Arc<dyn EventStore>,
        catalog: Arc<dyn CatalogStore>,
        cache: Arc<dyn RecommendationCache>,
        reranker: AiReranker,
        settings: EngineSettings,
    ) -> Self {
        let generator = CandidateGenerator::new(
            events,
            catalog,
            settings.candidate_cap,
            settings.popularity_threshold,
        );
        Self {
            generator,
            reranker,
            cache,
            settings,
        }
    }

    pub async fn home_recommendations(
        &self,
        actor: &Actor,
        page: u32,
        page_size: u32,
    ) -> AppResult<RecommendationResult> {
        validate_page(page, page_size)?;
        validate_actor(actor)?;

        let key = ResultKey::new(RecommendationContext::Home, actor.key(), page, page_size);
        cached!(self.cache, key, self.settings.home_ttl, async {
            let candidates = self.generator.home(actor).await?;
            Ok::<_, AppError>(self.rank_home(candidates, page, page_size).await)
        })
    }

    pub async fn product_recommendations(
        &self,
        product_id: &str,
        page: u32,
        page_size: u32,
    ) -> AppResult<RecommendationResult> {
        validate_page(page, page_size)?;
        if product_id.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Product ID required".to_string(),
            ));
        }

        let key = ResultKey::new(RecommendationContext::Product, product_id, page, page_size);
        cached!(self.cache, key, self.settings.product_ttl, async {
            // The pool only needs to reach the end of the requested page.
            let pool_size = (page as usize).saturating_mul(page_size as usize);
            let result = match self.generator.similar(product_id, pool_size).await? {
                Some(candidates) => rank_page(candidates, page, page_size),
                None => Vec::new(),
            };
            Ok::<_, AppError>(result)
        })
    }

    pub async fn cart_recommendations(
        &self,
        actor: &Actor,
        page: u32,
        page_size: u32,
    ) -> AppResult<RecommendationResult> {
        validate_page(page, page_size)?;
        validate_actor(actor)?;

        let key = ResultKey::new(RecommendationContext::Cart, actor.key(), page, page_size);
        cached!(self.cache, key, self.settings.cart_ttl, async {
            match self.generator.cart(actor).await? {
                Some(candidates) => Ok::<_, AppError>(rank_page(candidates, page, page_size)),
                None => {
                    tracing::debug!(actor = %actor, "Empty cart, falling back to home recommendations");
                    self.home_recommendations(actor, page, page_size).await
                }
            }
        })
    }

    /// Drops every cached page, in every context, for the actor
    pub async fn invalidate(&self, actor_key: &str) -> AppResult<()> {
        if actor_key.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "User ID or Session ID required".to_string(),
            ));
        }
        self.cache.invalidate(actor_key).await
    }

    async fn rank_home(
        &self,
        candidates: CandidateSet,
        page: u32,
        page_size: u32,
    ) -> RecommendationResult {
        let rankings = if page == 1 {
            self.reranker
                .rerank(&candidates.history, &candidates.products)
                .await
        } else {
            Vec::new()
        };

        let mut scored =
            scoring::score_candidates(candidates.products, &candidates.interest_categories);
        scoring::apply_rankings(&mut scored, &rankings);
        scoring::rank(&mut scored);
        scoring::paginate(&scored, page, page_size)
    }
}

fn rank_page(candidates: CandidateSet, page: u32, page_size: u32) -> RecommendationResult {
    let mut scored =
        scoring::score_candidates(candidates.products, &candidates.interest_categories);
    scoring::rank(&mut scored);
    scoring::paginate(&scored, page, page_size)
}

fn validate_page(page: u32, page_size: u32) -> AppResult<()> {
    if page < 1 {
        return Err(AppError::InvalidRequest("page must be >= 1".to_string()));
    }
    if page_size < 1 {
        return Err(AppError::InvalidRequest("page size must be >= 1".to_string()));
    }
    Ok(())
}

fn validate_actor(actor: &Actor) -> AppResult<()> {
    if actor.key().trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "User ID or Session ID required".to_string(),
        ));
    }
    Ok(())
}
