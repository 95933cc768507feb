use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storefront_recs::{
    config::{CacheBackend, Config},
    db::{self, MemoryCache, PgCatalogStore, PgEventStore, RecommendationCache},
    routes::{create_router, AppState},
    services::{
        providers::{DisabledRelevance, GeminiRelevanceClient, RelevanceService},
        AiReranker, RecommendationEngine,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_recs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    let redis_client = db::create_redis_client(&config.redis_url)?;

    let (cache, cache_writer) = match config.cache_backend {
        CacheBackend::Redis => {
            let (cache, handle) = db::Cache::new(redis_client.clone()).await;
            let cache: Arc<dyn RecommendationCache> = Arc::new(cache);
            (cache, Some(handle))
        }
        CacheBackend::Memory => {
            let cache: Arc<dyn RecommendationCache> =
                Arc::new(MemoryCache::new().with_max_entries(config.memory_cache_max_entries));
            (cache, None)
        }
    };

    let relevance: Arc<dyn RelevanceService> = match &config.relevance_api_key {
        Some(key) => Arc::new(GeminiRelevanceClient::new(
            key.clone(),
            config.relevance_api_url.clone(),
            config.relevance_model.clone(),
        )),
        None => {
            tracing::warn!("RELEVANCE_API_KEY not set, AI re-ranking disabled");
            Arc::new(DisabledRelevance)
        }
    };

    let events = Arc::new(PgEventStore::new(pool.clone(), redis_client));
    let catalog = Arc::new(PgCatalogStore::new(pool));

    let engine = RecommendationEngine::new(
        events.clone(),
        catalog,
        cache,
        AiReranker::new(relevance, config.relevance_deadline()),
        config.engine_settings(),
    );

    let state = Arc::new(AppState { engine, events });
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        address = %addr,
        cache_backend = ?config.cache_backend,
        "Recommendation service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
