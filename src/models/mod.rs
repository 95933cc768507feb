use serde::{Deserialize, Serialize};
use std::fmt::Display;

mod actor;
mod event;
mod product;

pub use actor::Actor;
pub use event::{distinct_products, Event, EventType};
pub use product::{categories_of, CatalogFilter, ProductSummary, SortBy};

/// Surface a recommendation list is produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationContext {
    Home,
    Product,
    Cart,
}

impl Display for RecommendationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecommendationContext::Home => "home",
            RecommendationContext::Product => "product",
            RecommendationContext::Cart => "cart",
        };
        f.write_str(name)
    }
}

/// A candidate with its within-request ranking score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub product: ProductSummary,
    pub score: f64,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// One page of ranked candidates, cached as an immutable blob
pub type RecommendationResult = Vec<ScoredCandidate>;

// ============================================================================
// Relevance Service Types
// ============================================================================

/// A past interaction handed to the relevance service as context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub event_type: EventType,
    pub product_name: String,
    pub category: String,
}

/// A shortlisted product the relevance service may pick from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateBrief {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl From<&ProductSummary> for CandidateBrief {
    fn from(product: &ProductSummary) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceRequest {
    pub history: Vec<HistoryItem>,
    pub candidates: Vec<CandidateBrief>,
}

/// One relevance judgement returned by the external service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRanking {
    pub product_id: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub score: f64,
}
