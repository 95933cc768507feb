use axum::{
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::EventStore,
    error::AppResult,
    middleware::{make_span_with_request_id, request_id_middleware},
    models::Actor,
    services::RecommendationEngine,
};

pub mod events;
pub mod recommendations;

/// Header carrying the authenticated user id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state handed to every handler
pub struct AppState {
    pub engine: RecommendationEngine,
    pub events: Arc<dyn EventStore>,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", get(recommendations::home))
        .route("/recommendations/home", get(recommendations::home))
        .route(
            "/recommendations/product/:product_id",
            get(recommendations::product),
        )
        .route("/recommendations/cart", get(recommendations::cart))
        .route("/recommendations/cache", delete(recommendations::invalidate))
        .route("/events", post(events::track))
        .route("/events/recent", get(events::recent))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Resolves the actor from the auth header or the given session id
pub(crate) fn actor_from(headers: &HeaderMap, session_id: Option<String>) -> AppResult<Actor> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    Actor::resolve(user_id, session_id)
}
