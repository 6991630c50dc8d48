//! HTTP surface of the search service
//!
//! Three routes: a hello root, a health check and the search endpoint.
//! Search always answers HTTP 200; the body is either the venue array or
//! `{"error": <reason>}` with one of the six stable reason strings, so
//! clients branch on the body alone.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::models::{Coordinate, LocationInput, SearchQuery, Venue};
use crate::search::SearchPipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<SearchPipeline>,
}

/// A search request as it arrives on the wire
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-form place name
    pub location: Option<String>,
    /// Explicit `[lat, lng]` pair; wins over `location` when both are sent
    pub coordinate: Option<[f64; 2]>,
    /// What the caller is looking for
    pub prompt: String,
}

/// Build the service router
pub fn router(pipeline: Arc<SearchPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api", post(search))
        .layer(cors)
        .with_state(AppState { pipeline })
}

/// Bind the listener and serve until the process is stopped
pub async fn run(pipeline: Arc<SearchPipeline>, port: u16) -> Result<()> {
    let app = router(pipeline);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Search API running at http://localhost:{port}");
    axum::serve(listener, app)
        .await
        .with_context(|| "Server terminated")?;
    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Hello World"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn search(State(state): State<AppState>, Json(request): Json<SearchRequest>) -> Json<Value> {
    match run_search(&state, request).await {
        Ok(venues) => Json(json!(venues)),
        Err(error) => {
            match &error {
                SearchError::Unexpected { .. } => {
                    warn!(error = %error, "search request failed");
                }
                _ => info!(error = %error, "search request rejected"),
            }
            Json(json!({"error": error.reason()}))
        }
    }
}

async fn run_search(state: &AppState, request: SearchRequest) -> Result<Vec<Venue>, SearchError> {
    let location = location_input(&request)?;
    let query = SearchQuery {
        location,
        prompt: request.prompt,
    };
    let ranked = state.pipeline.search(&query).await?;
    Ok(ranked.into_iter().map(|entry| entry.venue).collect())
}

fn location_input(request: &SearchRequest) -> Result<Option<LocationInput>, SearchError> {
    match (request.coordinate, request.location.as_deref()) {
        (Some([latitude, longitude]), other) => {
            if other.is_some() {
                debug!("both coordinate and location supplied; using coordinate");
            }
            let coordinate = Coordinate::new(latitude, longitude).map_err(|_| {
                SearchError::invalid_location(format!("{latitude}, {longitude}"))
            })?;
            Ok(Some(LocationInput::Coordinates(coordinate)))
        }
        (None, Some(name)) => Ok(Some(LocationInput::Name(name.to_string()))),
        (None, None) => Ok(None),
    }
}
