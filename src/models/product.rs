use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Catalog view of a product, read-only to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub popularity: i32,
    pub stock: i32,
}

/// Catalog query used by candidate generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Products that must not be returned
    pub exclude_ids: Vec<String>,
    /// Restrict to these categories (empty = any category)
    pub categories: Vec<String>,
    /// With `categories`, also admit products above this popularity
    pub or_popularity_above: Option<i32>,
}

impl CatalogFilter {
    pub fn matches(&self, product: &ProductSummary) -> bool {
        if self.exclude_ids.contains(&product.id) {
            return false;
        }
        if self.categories.is_empty() {
            return true;
        }
        self.categories.contains(&product.category)
            || self
                .or_popularity_above
                .is_some_and(|threshold| product.popularity > threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Popularity descending, then id ascending
    #[default]
    PopularityDesc,
}

/// Distinct categories of the given products, in first-seen order
pub fn categories_of<'a>(products: impl IntoIterator<Item = &'a ProductSummary>) -> Vec<String> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.category.as_str()))
        .map(|p| p.category.clone())
        .collect()
}
