use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::RecommendationResult,
    routes::{actor_from, AppState},
};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub session_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl RecommendationQuery {
    /// Page and page size with defaults; range checks beyond the cap are the engine's
    fn pagination(&self) -> AppResult<(u32, u32)> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit > MAX_LIMIT {
            return Err(AppError::InvalidRequest(format!(
                "limit must be <= {}",
                MAX_LIMIT
            )));
        }
        Ok((self.page.unwrap_or(1), limit))
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

/// Handler for home feed recommendations
pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResult>> {
    let (page, limit) = query.pagination()?;
    let actor = actor_from(&headers, query.session_id)?;

    let result = state
        .engine
        .home_recommendations(&actor, page, limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        actor = %actor,
        page,
        limit,
        returned = result.len(),
        "Home recommendations served"
    );

    Ok(Json(result))
}

/// Handler for "similar items" on a product page
pub async fn product(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(product_id): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResult>> {
    let (page, limit) = query.pagination()?;

    let result = state
        .engine
        .product_recommendations(&product_id, page, limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        product_id = %product_id,
        page,
        limit,
        returned = result.len(),
        "Product recommendations served"
    );

    Ok(Json(result))
}

/// Handler for complementary items in the cart
pub async fn cart(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResult>> {
    let (page, limit) = query.pagination()?;
    let actor = actor_from(&headers, query.session_id)?;

    let result = state
        .engine
        .cart_recommendations(&actor, page, limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        actor = %actor,
        page,
        limit,
        returned = result.len(),
        "Cart recommendations served"
    );

    Ok(Json(result))
}

/// Drops the actor's cached recommendations (called on order completion)
pub async fn invalidate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> AppResult<StatusCode> {
    let actor = actor_from(&headers, query.session_id)?;
    state.engine.invalidate(actor.key()).await?;
    Ok(StatusCode::NO_CONTENT)
}
