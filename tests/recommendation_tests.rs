mod common;

use std::{
    sync::{atomic::Ordering, Arc},
    time::{Duration, Instant},
};

use common::{event, ids, product, FixedRelevance, HangingRelevance, Harness};
use storefront_recs::{
    error::AppError,
    models::{Actor, AiRanking, EventType},
    services::tracking,
};
use tokio_test::{assert_err, assert_ok};

fn session(id: &str) -> Actor {
    Actor::Session(id.to_string())
}

fn electronics_pool() -> Vec<storefront_recs::models::ProductSummary> {
    [10, 90, 5, 50, 20]
        .iter()
        .enumerate()
        .map(|(i, pop)| product(&format!("e{}", i), "Electronics", *pop))
        .collect()
}

#[tokio::test]
async fn test_cold_start_returns_most_popular() {
    let harness = Harness::new(electronics_pool());

    let page = harness
        .engine
        .home_recommendations(&session("new-visitor"), 1, 3)
        .await
        .unwrap();

    let popularity: Vec<i32> = page.iter().map(|c| c.product.popularity).collect();
    assert_eq!(popularity, vec![90, 50, 20]);
    let scores: Vec<f64> = page.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![90.0, 50.0, 20.0]);
}

#[tokio::test]
async fn test_category_affinity_tie_keeps_catalog_order() {
    let harness = Harness::new(vec![
        product("viewed", "Fashion", 5),
        product("scarf", "Fashion", 10),
        product("camera", "Electronics", 60),
    ]);
    let actor = session("s1");
    harness.events.record(event(&actor, EventType::View, "viewed"));

    let page = harness.engine.home_recommendations(&actor, 1, 10).await.unwrap();

    // Both score 60; the catalog returns the more popular camera first.
    assert_eq!(ids(&page), vec!["camera", "scarf"]);
    assert_eq!(page[0].score, 60.0);
    assert_eq!(page[1].score, 60.0);
}

#[tokio::test]
async fn test_home_excludes_viewed_and_includes_purchase_categories() {
    let harness = Harness::new(vec![
        product("viewed", "Books", 1),
        product("novel", "Books", 2),
        product("rake", "Garden", 3),
        product("blender", "Kitchen", 40),
        product("tv", "Electronics", 75),
    ]);
    let actor = Actor::User("u1".to_string());
    harness.events.record(event(&actor, EventType::View, "viewed"));
    harness.events.add_purchase("u1", product("shovel", "Garden", 9));

    let page = harness.engine.home_recommendations(&actor, 1, 10).await.unwrap();

    // Kitchen is neither an interest nor popular enough; viewed is excluded.
    assert_eq!(ids(&page), vec!["tv", "rake", "novel"]);
    assert_eq!(page[1].score, 53.0);
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let harness = Harness::new(electronics_pool());
    let actor = session("s1");

    let first = harness.engine.home_recommendations(&actor, 1, 3).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), 1);

    let second = harness.engine.home_recommendations(&actor, 1, 3).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_invalidate_forces_recompute_within_ttl() {
    let harness = Harness::new(electronics_pool());
    let actor = session("s1");

    harness.engine.home_recommendations(&actor, 1, 3).await.unwrap();
    harness.engine.cart_recommendations(&actor, 2, 3).await.unwrap();
    let calls_before = harness.catalog.filter_calls();

    harness.engine.invalidate(actor.key()).await.unwrap();

    harness.engine.home_recommendations(&actor, 1, 3).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), calls_before + 1);
    harness.engine.cart_recommendations(&actor, 2, 3).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), calls_before + 2);
}

#[tokio::test]
async fn test_invalidation_during_computation_is_not_lost() {
    let harness = Harness::new(electronics_pool());
    let actor = session("s1");
    harness
        .catalog
        .invalidate_during_next_filter(harness.cache.clone(), actor.key());

    harness.engine.home_recommendations(&actor, 1, 5).await.unwrap();
    let calls = harness.catalog.filter_calls();

    // The page computed across the invalidation must not be served.
    harness.engine.home_recommendations(&actor, 1, 5).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), calls + 1);

    harness.engine.home_recommendations(&actor, 1, 5).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), calls + 1);
}

#[tokio::test]
async fn test_entries_expire_per_context_ttl() {
    let harness = Harness::new(vec![
        product("seed", "Toys", 1),
        product("kite", "Toys", 5),
        product("yoyo", "Toys", 8),
    ]);
    let actor = session("s1");

    harness.engine.home_recommendations(&actor, 1, 5).await.unwrap();
    harness.engine.product_recommendations("seed", 1, 5).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), 2);

    harness.clock.advance(Duration::from_secs(400));

    harness.engine.product_recommendations("seed", 1, 5).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), 2, "product entries live 600s");

    harness.engine.home_recommendations(&actor, 1, 5).await.unwrap();
    assert_eq!(harness.catalog.filter_calls(), 3, "home entries live 300s");
}

// No relevance service here: re-ranking only touches page 1, so with one
// active the first two pages may overlap.
#[tokio::test]
async fn test_pages_are_disjoint_and_concatenate() {
    let pool: Vec<_> = (0..25)
        .map(|i| product(&format!("p{:02}", i), "Books", (i * 37) % 101))
        .collect();
    let harness = Harness::new(pool);
    let actor = session("reader");

    let page_1 = harness.engine.home_recommendations(&actor, 1, 5).await.unwrap();
    let page_2 = harness.engine.home_recommendations(&actor, 2, 5).await.unwrap();
    let full = harness.engine.home_recommendations(&actor, 1, 10).await.unwrap();

    assert!(ids(&page_1).iter().all(|id| !ids(&page_2).contains(id)));

    let joined: Vec<String> = ids(&page_1).into_iter().chain(ids(&page_2)).collect();
    assert_eq!(joined, ids(&full));
}

#[tokio::test]
async fn test_page_beyond_pool_is_empty() {
    let harness = Harness::new(electronics_pool());
    let page = harness
        .engine
        .home_recommendations(&session("s1"), 3, 5)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_scoring_is_deterministic_across_engines() {
    let rankings = vec![AiRanking {
        product_id: "e4".to_string(),
        explanation: "Popular with similar shoppers".to_string(),
        score: 35.0,
    }];

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let harness = Harness::with_relevance(
            electronics_pool(),
            Arc::new(FixedRelevance::new(rankings.clone())),
            Duration::from_millis(400),
        );
        let page = harness
            .engine
            .home_recommendations(&session("s1"), 1, 5)
            .await
            .unwrap();
        outputs.push(serde_json::to_string(&page).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_reranking_adds_to_first_home_page_only() {
    let relevance = Arc::new(FixedRelevance::new(vec![AiRanking {
        product_id: "e4".to_string(),
        explanation: "Matches your recent views".to_string(),
        score: 40.0,
    }]));
    let harness = Harness::with_relevance(
        electronics_pool(),
        relevance.clone(),
        Duration::from_millis(400),
    );
    let actor = session("s1");

    let page_1 = harness.engine.home_recommendations(&actor, 1, 2).await.unwrap();
    assert_eq!(ids(&page_1), vec!["e4", "e1"]);
    assert_eq!(page_1[0].score, 100.0);
    assert_eq!(
        page_1[0].explanation.as_deref(),
        Some("Matches your recent views")
    );
    assert_eq!(page_1[1].explanation, None);

    harness.engine.home_recommendations(&actor, 2, 2).await.unwrap();
    harness.engine.cart_recommendations(&session("other"), 2, 2).await.unwrap();
    harness.engine.product_recommendations("e0", 1, 2).await.unwrap();
    assert_eq!(relevance.calls(), 1);

    // Cache hit: re-ranking already happened when the entry was written.
    harness.engine.home_recommendations(&actor, 1, 2).await.unwrap();
    assert_eq!(relevance.calls(), 1);
}

#[tokio::test]
async fn test_hanging_relevance_service_respects_deadline() {
    let deadline = Duration::from_millis(80);
    let harness =
        Harness::with_relevance(electronics_pool(), Arc::new(HangingRelevance), deadline);

    let started = Instant::now();
    let page = harness
        .engine
        .home_recommendations(&session("s1"), 1, 5)
        .await
        .unwrap();

    assert!(started.elapsed() < deadline + Duration::from_millis(500));
    let scores: Vec<f64> = page.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![90.0, 50.0, 20.0, 10.0, 5.0]);
    assert!(page.iter().all(|c| c.explanation.is_none()));
}

#[tokio::test]
async fn test_empty_cart_matches_home() {
    let harness = Harness::new(vec![
        product("viewed", "Fashion", 5),
        product("scarf", "Fashion", 10),
        product("camera", "Electronics", 60),
        product("lamp", "Home", 20),
    ]);
    let actor = session("s1");
    harness.events.record(event(&actor, EventType::View, "viewed"));

    let cart = harness.engine.cart_recommendations(&actor, 1, 3).await.unwrap();
    let home = harness.engine.home_recommendations(&actor, 1, 3).await.unwrap();

    assert_eq!(cart, home);
}

#[tokio::test]
async fn test_cart_recommends_complements_outside_cart() {
    let harness = Harness::new(vec![
        product("tent", "Outdoor", 40),
        product("stove", "Outdoor", 22),
        product("lantern", "Outdoor", 31),
        product("tv", "Electronics", 95),
    ]);
    let actor = session("camper");
    harness.events.record(event(&actor, EventType::AddToCart, "tent"));

    let page = harness.engine.cart_recommendations(&actor, 1, 10).await.unwrap();

    assert_eq!(ids(&page), vec!["lantern", "stove"]);
}

#[tokio::test]
async fn test_product_recommendations() {
    let harness = Harness::new(vec![
        product("seed", "Toys", 1),
        product("kite", "Toys", 5),
        product("yoyo", "Toys", 8),
        product("tv", "Electronics", 95),
    ]);

    let similar = harness.engine.product_recommendations("seed", 1, 5).await.unwrap();
    assert_eq!(ids(&similar), vec!["yoyo", "kite"]);

    let second_page = harness.engine.product_recommendations("seed", 2, 1).await.unwrap();
    assert_eq!(ids(&second_page), vec!["kite"]);

    let missing = harness
        .engine
        .product_recommendations("no-such-product", 1, 5)
        .await
        .unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn test_store_outage_surfaces_and_is_not_cached() {
    let harness = Harness::new(electronics_pool());
    let actor = session("s1");

    harness.catalog.down.store(true, Ordering::SeqCst);
    let error = assert_err!(harness.engine.home_recommendations(&actor, 1, 3).await);
    assert!(matches!(error, AppError::StoreUnavailable { .. }));
    assert!(harness.cache.is_empty());

    harness.catalog.down.store(false, Ordering::SeqCst);
    let page = assert_ok!(harness.engine.home_recommendations(&actor, 1, 3).await);
    assert_eq!(page.len(), 3);
}

#[tokio::test]
async fn test_tracking_an_event_refreshes_recommendations() {
    let harness = Harness::new(vec![
        product("scarf", "Fashion", 10),
        product("camera", "Electronics", 60),
        product("tv", "Electronics", 95),
    ]);
    let actor = session("s1");

    let before = harness.engine.home_recommendations(&actor, 1, 10).await.unwrap();
    assert_eq!(ids(&before), vec!["tv", "camera", "scarf"]);

    tracking::track_event(
        harness.events.clone(),
        &harness.engine,
        event(&actor, EventType::View, "tv"),
    )
    .await
    .unwrap();

    let after = harness.engine.home_recommendations(&actor, 1, 10).await.unwrap();
    assert_eq!(ids(&after), vec!["camera"]);
    assert_eq!(after[0].score, 110.0);
}

#[tokio::test]
async fn test_invalid_pagination_is_rejected() {
    let harness = Harness::new(electronics_pool());
    let actor = session("s1");

    assert!(matches!(
        harness.engine.home_recommendations(&actor, 0, 5).await,
        Err(AppError::InvalidRequest(_))
    ));
    assert!(matches!(
        harness.engine.cart_recommendations(&actor, 1, 0).await,
        Err(AppError::InvalidRequest(_))
    ));
    assert_eq!(harness.catalog.filter_calls(), 0);
}
