//! Candidate generation for the three recommendation surfaces.
//!
//! Every method here reads collaborators only; store failures propagate as
//! `StoreUnavailable` rather than collapsing into an empty pool.

use std::{collections::HashMap, sync::Arc};

use crate::{
    db::{CatalogStore, EventStore},
    error::AppResult,
    models::{
        categories_of, distinct_products, Actor, CatalogFilter, EventType, HistoryItem,
        ProductSummary, SortBy,
    },
};

/// Events inspected for home personalization
pub const HOME_EVENT_WINDOW: usize = 20;

/// Deduplicated pool of products plus the signals that produced it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    /// Catalog order: popularity descending, then id
    pub products: Vec<ProductSummary>,
    pub interest_categories: Vec<String>,
    /// Behavioural context for the re-ranker
    pub history: Vec<HistoryItem>,
}

#[derive(Clone)]
pub struct CandidateGenerator {
    events: Arc<dyn EventStore>,
    catalog: Arc<dyn CatalogStore>,
    candidate_cap: usize,
    popularity_threshold: i32,
}

impl CandidateGenerator {
    pub fn new(
        events: Arc<dyn EventStore>,
        catalog: Arc<dyn CatalogStore>,
        candidate_cap: usize,
        popularity_threshold: u32,
    ) -> Self {
        Self {
            events,
            catalog,
            candidate_cap,
            popularity_threshold: i32::try_from(popularity_threshold).unwrap_or(i32::MAX),
        }
    }

    /// Home feed pool: recent views and purchases shape the interest set,
    /// popular products keep it non-empty.
    pub async fn home(&self, actor: &Actor) -> AppResult<CandidateSet> {
        let recent = self
            .events
            .recent_events(actor.key(), HOME_EVENT_WINDOW)
            .await?;
        let viewed_ids = distinct_products(&recent, EventType::View);

        let mut history = Vec::new();
        let mut seen_products = Vec::new();

        if !viewed_ids.is_empty() {
            let viewed = self.catalog.by_ids(&viewed_ids).await?;
            let by_id: HashMap<&str, &ProductSummary> =
                viewed.iter().map(|p| (p.id.as_str(), p)).collect();
            for id in &viewed_ids {
                if let Some(product) = by_id.get(id.as_str()) {
                    history.push(history_item(EventType::View, product));
                    seen_products.push((*product).clone());
                }
            }
        }

        if let Some(user_id) = actor.user_id() {
            let purchased = self.events.purchase_history(user_id).await?;
            for product in purchased {
                history.push(history_item(EventType::Purchase, &product));
                seen_products.push(product);
            }
        }

        let interest_categories = categories_of(&seen_products);
        let filter = if interest_categories.is_empty() {
            CatalogFilter {
                exclude_ids: viewed_ids,
                ..Default::default()
            }
        } else {
            CatalogFilter {
                exclude_ids: viewed_ids,
                categories: interest_categories.clone(),
                or_popularity_above: Some(self.popularity_threshold),
            }
        };

        let products = self
            .catalog
            .by_filter(&filter, self.candidate_cap, SortBy::PopularityDesc)
            .await?;

        tracing::debug!(
            actor = %actor,
            candidates = products.len(),
            interests = interest_categories.len(),
            "Home candidates generated"
        );

        Ok(CandidateSet {
            products,
            interest_categories,
            history,
        })
    }

    /// Same-category products for a detail page, or `None` if the seed is unknown
    pub async fn similar(&self, product_id: &str, pool_size: usize) -> AppResult<Option<CandidateSet>> {
        let seed = self
            .catalog
            .by_ids(&[product_id.to_string()])
            .await?
            .into_iter()
            .find(|p| p.id == product_id);

        let Some(seed) = seed else {
            tracing::debug!(product_id = %product_id, "Seed product not found");
            return Ok(None);
        };

        let filter = CatalogFilter {
            exclude_ids: vec![seed.id.clone()],
            categories: vec![seed.category.clone()],
            or_popularity_above: None,
        };
        let products = self
            .catalog
            .by_filter(&filter, pool_size, SortBy::PopularityDesc)
            .await?;

        Ok(Some(CandidateSet {
            products,
            interest_categories: vec![seed.category],
            history: Vec::new(),
        }))
    }

    /// Complements for the cart, or `None` when the cart seed is empty
    pub async fn cart(&self, actor: &Actor) -> AppResult<Option<CandidateSet>> {
        let window = self.events.all_events(actor.key()).await?;
        let cart_ids = distinct_products(&window, EventType::AddToCart);
        if cart_ids.is_empty() {
            return Ok(None);
        }

        let in_cart = self.catalog.by_ids(&cart_ids).await?;
        let categories = categories_of(&in_cart);
        if categories.is_empty() {
            return Ok(None);
        }

        let history = in_cart
            .iter()
            .map(|p| history_item(EventType::AddToCart, p))
            .collect();

        let filter = CatalogFilter {
            exclude_ids: cart_ids,
            categories: categories.clone(),
            or_popularity_above: None,
        };
        let products = self
            .catalog
            .by_filter(&filter, self.candidate_cap, SortBy::PopularityDesc)
            .await?;

        tracing::debug!(
            actor = %actor,
            candidates = products.len(),
            cart_categories = categories.len(),
            "Cart candidates generated"
        );

        Ok(Some(CandidateSet {
            products,
            interest_categories: categories,
            history,
        }))
    }
}

fn history_item(event_type: EventType, product: &ProductSummary) -> HistoryItem {
    HistoryItem {
        event_type,
        product_name: product.name.clone(),
        category: product.category.clone(),
    }
}
