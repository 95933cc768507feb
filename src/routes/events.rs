use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Event, EventType},
    routes::{actor_from, recommendations::SessionQuery, AppState},
    services::tracking,
};

#[derive(Debug, Deserialize)]
pub struct TrackEventRequest {
    pub event_type: EventType,
    pub product_id: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Handler for event ingestion
pub async fn track(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TrackEventRequest>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let actor = actor_from(&headers, request.session_id)?;
    let product_id = request.product_id.filter(|id| !id.trim().is_empty());

    let event = Event::new(actor, request.event_type, product_id).with_metadata(request.metadata);
    let event = tracking::track_event(state.events.clone(), &state.engine, event).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// Handler for the actor's recent events
pub async fn recent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<Vec<Event>>> {
    let actor = actor_from(&headers, query.session_id)?;
    let events = tracking::recent_events(state.events.clone(), &actor).await?;
    Ok(Json(events))
}
