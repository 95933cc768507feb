//! Deterministic scoring, ranking and pagination.

use std::collections::HashMap;

use crate::models::{AiRanking, ProductSummary, ScoredCandidate};

/// Bonus for a product in one of the actor's interest categories
pub const CATEGORY_AFFINITY_BONUS: f64 = 50.0;
/// Weight applied to a relevance score (0–100) from the re-ranker
pub const RELEVANCE_WEIGHT: f64 = 2.0;

/// Popularity plus the category-affinity bonus
pub fn base_score(product: &ProductSummary, interest_categories: &[String]) -> f64 {
    let affinity = if interest_categories.contains(&product.category) {
        CATEGORY_AFFINITY_BONUS
    } else {
        0.0
    };
    f64::from(product.popularity) + affinity
}

pub fn score_candidates(
    products: Vec<ProductSummary>,
    interest_categories: &[String],
) -> Vec<ScoredCandidate> {
    products
        .into_iter()
        .map(|product| ScoredCandidate {
            score: base_score(&product, interest_categories),
            product,
            explanation: None,
        })
        .collect()
}

/// Adds re-ranking on top of the base score; unmatched candidates are untouched
pub fn apply_rankings(candidates: &mut [ScoredCandidate], rankings: &[AiRanking]) {
    if rankings.is_empty() {
        return;
    }

    let by_id: HashMap<&str, &AiRanking> = rankings
        .iter()
        .map(|r| (r.product_id.as_str(), r))
        .collect();

    for candidate in candidates.iter_mut() {
        if let Some(ranking) = by_id.get(candidate.product.id.as_str()) {
            candidate.score += ranking.score * RELEVANCE_WEIGHT;
            candidate.explanation = Some(ranking.explanation.clone());
        }
    }
}

/// Sorts by score descending. Equal scores keep their input order.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Returns the `page`-th slice of `page_size` items (1-based pages)
pub fn paginate<T: Clone>(items: &[T], page: u32, page_size: u32) -> Vec<T> {
    let page_size = page_size as usize;
    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size);
    if start >= items.len() {
        return Vec::new();
    }
    let end = start.saturating_add(page_size).min(items.len());
    items[start..end].to_vec()
}
