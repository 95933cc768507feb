use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{CatalogFilter, ProductSummary, SortBy},
};

const PRODUCT_COLUMNS: &str = "SELECT id, name, category, price, popularity, stock FROM products";

/// Catalog store backed by the `products` table
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the filter's WHERE clause, ordering and limit
fn push_filter(
    query: &mut QueryBuilder<'_, Postgres>,
    filter: &CatalogFilter,
    limit: usize,
    sort: SortBy,
) {
    query.push(" WHERE TRUE");

    if !filter.exclude_ids.is_empty() {
        query
            .push(" AND NOT (id = ANY(")
            .push_bind(filter.exclude_ids.clone())
            .push("))");
    }

    if !filter.categories.is_empty() {
        query
            .push(" AND (category = ANY(")
            .push_bind(filter.categories.clone())
            .push(")");
        if let Some(threshold) = filter.or_popularity_above {
            query.push(" OR popularity > ").push_bind(threshold);
        }
        query.push(")");
    }

    query.push(match sort {
        SortBy::PopularityDesc => " ORDER BY popularity DESC, id ASC",
    });

    query.push(" LIMIT ").push_bind(limit as i64);
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn by_ids(&self, ids: &[String]) -> AppResult<Vec<ProductSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, ProductSummary>(&format!(
            "{} WHERE id = ANY($1) ORDER BY id ASC",
            PRODUCT_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::store_unavailable("catalog", e))
    }

    async fn by_filter(
        &self,
        filter: &CatalogFilter,
        limit: usize,
        sort: SortBy,
    ) -> AppResult<Vec<ProductSummary>> {
        let mut query = QueryBuilder::new(PRODUCT_COLUMNS);
        push_filter(&mut query, filter, limit, sort);

        let products = query
            .build_query_as::<ProductSummary>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::store_unavailable("catalog", e))?;

        tracing::debug!(
            returned = products.len(),
            limit,
            categories = filter.categories.len(),
            excluded = filter.exclude_ids.len(),
            "Catalog filter query"
        );

        Ok(products)
    }
}
