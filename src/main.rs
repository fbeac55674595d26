use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::FutureExt;
use tokio::net::TcpListener;
use tracing::{info, warn};

use gallery_search::{
    config::Config,
    create_router,
    db::{self, PgImageCatalog},
    embeddings::{EmbeddingCache, EmbeddingClient, ReplicateClient},
    utils::{init_logger, with_retry},
    vector_index::QdrantClient,
    AppState, HybridSearch, SearchPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database
    let pool = db::create_pool(&config.database).await?;
    info!("Database connection established");

    if config.embedding.replicate_api_key.is_empty() {
        warn!("REPLICATE_API_KEY is not set, semantic search will fall back to text matches");
    }

    let cache = Arc::new(EmbeddingCache::new(&config.embedding.cache_path));
    info!(path = %cache.path().display(), "Embedding cache configured");
    let embedder = Arc::new(EmbeddingClient::new(
        Arc::new(ReplicateClient::from_config(&config.embedding)),
        cache,
    ));
    let search = Arc::new(HybridSearch::new(
        Arc::new(PgImageCatalog::new(pool)),
        embedder,
        Arc::new(QdrantClient::from_config(&config.vector_index)),
        SearchPolicy::from_config(&config),
    ));

    // Startup aborts if the collection cannot be prepared
    let ensure = Arc::clone(&search);
    with_retry(
        move || {
            let search = Arc::clone(&ensure);
            async move { search.ensure_collection().await }.boxed()
        },
        config.vector_index.startup_retries,
        Duration::from_secs(1),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to prepare vector collection: {}", e))?;
    info!(collection = %config.vector_index.collection, "Vector collection ready");

    // Create shared state
    let state = AppState { config: config.clone(), search };

    // Create router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
