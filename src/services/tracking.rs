use std::sync::Arc;

use crate::{
    db::EventStore,
    error::AppResult,
    models::{Actor, Event},
    services::recommendations::RecommendationEngine,
};

/// Records a behavioural event and drops the actor's cached recommendations
///
/// The append is the source of truth; a failed invalidation afterwards only
/// delays freshness until the TTL, so it is logged instead of failing the call.
pub async fn track_event(
    events: Arc<dyn EventStore>,
    engine: &RecommendationEngine,
    event: Event,
) -> AppResult<Event> {
    events.append(&event).await?;

    if let Err(e) = engine.invalidate(event.actor.key()).await {
        tracing::warn!(
            actor = %event.actor,
            error = %e,
            "Recommendation cache invalidation failed after tracking event"
        );
    }

    tracing::info!(
        actor = %event.actor,
        event_type = %event.event_type,
        product_id = ?event.product_id,
        "Event tracked"
    );

    Ok(event)
}

/// The actor's recency window, newest first
pub async fn recent_events(events: Arc<dyn EventStore>, actor: &Actor) -> AppResult<Vec<Event>> {
    events.all_events(actor.key()).await
}
