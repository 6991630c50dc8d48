use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use izakaya_search::config::SearchConfig;
use izakaya_search::dataset::DatasetCache;
use izakaya_search::embedding::{Embedder, OpenAiEmbedder};
use izakaya_search::geocoding::{Geocoder, OpenMeteoGeocoder};
use izakaya_search::search::{ChromaClient, SearchPipeline, SimilaritySearch};
use izakaya_search::web;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(SearchConfig::load().context("Failed to load configuration")?);
    info!(
        version = izakaya_search::VERSION,
        dataset = %config.dataset.path,
        engine = %config.engine.base_url,
        "starting izakaya search service"
    );

    let geocoder: Arc<dyn Geocoder> = Arc::new(
        OpenMeteoGeocoder::new(&config.geocoding).context("Failed to build geocoding client")?,
    );
    let embedder: Arc<dyn Embedder> = Arc::new(
        OpenAiEmbedder::new(&config.embedding).context("Failed to build embedding client")?,
    );
    let engine: Arc<dyn SimilaritySearch> = Arc::new(
        ChromaClient::new(&config.engine, embedder)
            .context("Failed to build similarity engine client")?,
    );
    let dataset = DatasetCache::new(config.dataset.clone());

    let pipeline = Arc::new(SearchPipeline::new(
        Arc::clone(&config),
        dataset,
        geocoder,
        engine,
    ));

    web::run(pipeline, config.server.port).await
}
