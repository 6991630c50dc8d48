//! Similarity engine client
//!
//! Talks to a Chroma-compatible vector store over REST. Every ranking
//! request works on its own throwaway collection: create, add the candidate
//! documents, query once, delete. The collection never outlives the request;
//! [`EphemeralCollection`] owns the delete and schedules it from `Drop` if a
//! request is cancelled mid-flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::embedding::Embedder;

/// A candidate document handed to the engine
#[derive(Debug, Clone)]
pub struct Document {
    /// Engine-side identifier, unique within one request
    pub id: String,
    /// Rendered text the engine embeds and returns verbatim
    pub text: String,
}

/// A document the engine returned, with its relevance
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub text: String,
    /// Relevance in [0, 1], higher is more relevant
    pub score: f64,
}

/// Ranks candidate documents against a prompt
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return up to `k` documents, most relevant first
    async fn rank(
        &self,
        documents: Vec<Document>,
        prompt: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>>;
}

/// Chroma REST API client
pub struct ChromaClient {
    client: Client,
    base_url: String,
    embedder: Arc<dyn Embedder>,
}

impl ChromaClient {
    /// Create a new engine client around an injected embedder
    pub fn new(config: &EngineConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("izakaya-search/0.1.0")
            .build()
            .with_context(|| "Failed to create similarity engine HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embedder,
        })
    }

    async fn create_collection(&self) -> Result<EphemeralCollection> {
        let name = next_collection_name();
        let url = format!("{}/api/v1/collections", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "name": name,
                "metadata": {"hnsw:space": "cosine"},
                "get_or_create": false,
            }))
            .send()
            .await
            .with_context(|| "Collection create request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Similarity engine refused collection create with status {status}");
        }

        let created: chroma::CollectionResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse collection create response")?;
        debug!(collection = %name, id = %created.id, "created ephemeral collection");

        Ok(EphemeralCollection {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            name,
            id: created.id,
            released: false,
        })
    }

    async fn populate_and_query(
        &self,
        collection: &EphemeralCollection,
        ids: Vec<String>,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        query_embedding: Vec<f32>,
        n_results: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let add_url = format!(
            "{}/api/v1/collections/{}/add",
            self.base_url,
            collection.id()
        );
        let response = self
            .client
            .post(&add_url)
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": texts,
            }))
            .send()
            .await
            .with_context(|| "Collection add request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Similarity engine refused document add with status {status}");
        }

        let query_url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url,
            collection.id()
        );
        let response = self
            .client
            .post(&query_url)
            .json(&json!({
                "query_embeddings": [query_embedding],
                "n_results": n_results,
                "include": ["documents", "distances"],
            }))
            .send()
            .await
            .with_context(|| "Collection query request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Similarity engine query returned status {status}");
        }

        let body: chroma::QueryResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse collection query response")?;
        hits_from_response(body)
    }
}

#[async_trait]
impl SimilaritySearch for ChromaClient {
    async fn rank(
        &self,
        documents: Vec<Document>,
        prompt: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        if documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let n_results = k.min(documents.len());
        let (ids, texts): (Vec<String>, Vec<String>) =
            documents.into_iter().map(|d| (d.id, d.text)).unzip();

        // Embed before creating the collection so an embedding failure never
        // leaves anything behind on the engine.
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .context("Embedding candidate documents failed")?;
        if embeddings.len() != texts.len() {
            bail!(
                "embedder produced {} vectors for {} documents",
                embeddings.len(),
                texts.len()
            );
        }

        let prompt_text = prompt.to_string();
        let mut prompt_vectors = self
            .embedder
            .embed(std::slice::from_ref(&prompt_text))
            .await
            .context("Embedding prompt failed")?;
        let query_embedding = prompt_vectors
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the prompt"))?;

        let collection = self.create_collection().await?;
        let outcome = self
            .populate_and_query(
                &collection,
                ids,
                texts,
                embeddings,
                query_embedding,
                n_results,
            )
            .await;

        // Teardown runs on both paths. A failed delete after a successful
        // query downgrades to a warning; the hits are still good.
        match outcome {
            Ok(hits) => {
                if let Err(cause) = collection.release().await {
                    warn!(
                        error = format!("{cause:#}"),
                        "failed to delete ephemeral collection"
                    );
                }
                debug!(hits = hits.len(), "similarity query finished");
                Ok(hits)
            }
            Err(cause) => {
                if let Err(cleanup) = collection.release().await {
                    warn!(
                        error = format!("{cleanup:#}"),
                        "failed to delete ephemeral collection after query error"
                    );
                }
                Err(cause)
            }
        }
    }
}

/// A collection that must not outlive its request
///
/// [`EphemeralCollection::release`] is the normal teardown. If the guard is
/// dropped instead, because the request future was cancelled or an early
/// return slipped past teardown, `Drop` schedules the delete on the current
/// runtime so the engine still converges to empty.
pub struct EphemeralCollection {
    client: Client,
    base_url: String,
    name: String,
    id: String,
    released: bool,
}

impl EphemeralCollection {
    /// Engine-assigned collection id, used in add/query paths
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Delete the collection on the engine
    ///
    /// The guard stays armed until the delete attempt has completed, so a
    /// release cancelled mid-flight is rescued by `Drop`.
    pub async fn release(mut self) -> Result<()> {
        let outcome = delete_collection(&self.client, &self.base_url, &self.name).await;
        self.released = true;
        outcome
    }
}

impl Drop for EphemeralCollection {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            collection = %self.name,
            "ephemeral collection dropped without release; scheduling delete"
        );
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let name = self.name.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(cause) = delete_collection(&client, &base_url, &name).await {
                        warn!(
                            collection = %name,
                            error = format!("{cause:#}"),
                            "scheduled collection delete failed"
                        );
                    }
                });
            }
            Err(_) => {
                warn!(
                    collection = %self.name,
                    "no async runtime available; collection is left to the engine's housekeeping"
                );
            }
        }
    }
}

async fn delete_collection(client: &Client, base_url: &str, name: &str) -> Result<()> {
    let url = format!("{base_url}/api/v1/collections/{name}");
    let response = client
        .delete(&url)
        .send()
        .await
        .with_context(|| "Collection delete request failed")?;
    let status = response.status();
    if !status.is_success() {
        bail!("Similarity engine returned status {status} deleting collection");
    }
    Ok(())
}

fn next_collection_name() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("search-{millis}-{sequence}")
}

/// Convert a cosine distance into a relevance score in [0, 1]
///
/// Cosine distance is `1 - similarity`, so relevance recovers similarity and
/// clamps it, since floating point drift can push raw values a hair outside
/// the unit range.
fn relevance_from_distance(distance: f64) -> f64 {
    (1.0 - distance).clamp(0.0, 1.0)
}

fn hits_from_response(response: chroma::QueryResponse) -> Result<Vec<ScoredDocument>> {
    // Results arrive as one row per query embedding; we only ever send one.
    let documents = response
        .documents
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or_default();
    let distances = response
        .distances
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or_default();

    if documents.len() != distances.len() {
        bail!(
            "engine returned {} documents with {} distances",
            documents.len(),
            distances.len()
        );
    }

    Ok(documents
        .into_iter()
        .zip(distances)
        .map(|(text, distance)| ScoredDocument {
            text,
            score: relevance_from_distance(distance),
        })
        .collect())
}

/// Chroma REST API response structures
mod chroma {
    use serde::Deserialize;

    /// Collection create response
    #[derive(Debug, Deserialize)]
    pub struct CollectionResponse {
        pub id: String,
    }

    /// Collection query response
    #[derive(Debug, Deserialize)]
    pub struct QueryResponse {
        pub documents: Option<Vec<Vec<String>>>,
        pub distances: Option<Vec<Vec<f64>>>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(0.25, 0.75)]
    #[case(1.0, 0.0)]
    #[case(1.7, 0.0)]
    #[case(-0.02, 1.0)]
    fn test_relevance_from_distance(#[case] distance: f64, #[case] expected: f64) {
        assert_eq!(relevance_from_distance(distance), expected);
    }

    #[test]
    fn test_hits_from_query_response() {
        let json = r#"{
            "ids": [["3", "1"]],
            "documents": [["id: 3\nname: C", "id: 1\nname: A"]],
            "distances": [[0.12, 0.48]],
            "metadatas": null,
            "embeddings": null
        }"#;
        let response: chroma::QueryResponse = serde_json::from_str(json).unwrap();
        let hits = hits_from_response(response).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "id: 3\nname: C");
        assert!((hits[0].score - 0.88).abs() < 1e-9);
        assert!((hits[1].score - 0.52).abs() < 1e-9);
    }

    #[test]
    fn test_hits_from_empty_response() {
        let response: chroma::QueryResponse =
            serde_json::from_str(r#"{"documents": [[]], "distances": [[]]}"#).unwrap();
        assert!(hits_from_response(response).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_documents_and_distances_are_rejected() {
        let json = r#"{
            "documents": [["id: 3\nname: C", "id: 1\nname: A"]],
            "distances": [[0.12]]
        }"#;
        let response: chroma::QueryResponse = serde_json::from_str(json).unwrap();
        let error = hits_from_response(response).unwrap_err();
        assert!(error.to_string().contains("2 documents with 1 distances"));
    }

    #[test]
    fn test_collection_names_are_unique() {
        let first = next_collection_name();
        let second = next_collection_name();
        assert_ne!(first, second);
        assert!(first.starts_with("search-"));
    }

    mod without_network {
        use super::*;
        use crate::config::EngineConfig;

        struct UnreachableEmbedder;

        #[async_trait]
        impl Embedder for UnreachableEmbedder {
            async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                panic!("embedder must not be called");
            }
        }

        fn client() -> ChromaClient {
            ChromaClient::new(&EngineConfig::default(), Arc::new(UnreachableEmbedder)).unwrap()
        }

        #[tokio::test]
        async fn test_rank_with_no_documents_short_circuits() {
            let hits = client().rank(Vec::new(), "quiet bar", 10).await.unwrap();
            assert!(hits.is_empty());
        }

        #[tokio::test]
        async fn test_rank_with_zero_k_short_circuits() {
            let documents = vec![Document {
                id: "0".to_string(),
                text: "id: 1\nname: Bar A".to_string(),
            }];
            let hits = client().rank(documents, "quiet bar", 0).await.unwrap();
            assert!(hits.is_empty());
        }
    }

    mod with_fake_engine {
        use std::future::{Future, IntoFuture};
        use std::net::SocketAddr;
        use std::sync::atomic::AtomicUsize;
        use std::task::{Context, Waker};

        use axum::Router;
        use axum::extract::{Path, State};
        use axum::http::StatusCode;
        use axum::response::{IntoResponse, Json, Response};
        use axum::routing::{delete, post};
        use serde_json::Value;
        use tokio::sync::mpsc;
        use tokio::time::timeout;

        use super::*;
        use crate::config::EngineConfig;

        #[derive(Clone)]
        struct EngineState {
            deletes: Arc<AtomicUsize>,
            deleted_names: mpsc::UnboundedSender<String>,
            fail_query: bool,
        }

        async fn accept_create() -> Json<Value> {
            Json(json!({"id": "col-1"}))
        }

        async fn accept_add() -> Json<Value> {
            Json(json!({}))
        }

        async fn answer_query(State(state): State<EngineState>) -> Response {
            if state.fail_query {
                return (StatusCode::INTERNAL_SERVER_ERROR, "engine exploded").into_response();
            }
            Json(json!({
                "documents": [["id: 1\nname: Bar A"]],
                "distances": [[0.25]],
            }))
            .into_response()
        }

        async fn record_delete(
            State(state): State<EngineState>,
            Path(name): Path<String>,
        ) -> Json<Value> {
            state.deletes.fetch_add(1, Ordering::SeqCst);
            let _ = state.deleted_names.send(name);
            Json(json!({}))
        }

        struct FakeEngine {
            addr: SocketAddr,
            deletes: Arc<AtomicUsize>,
            deleted_names: mpsc::UnboundedReceiver<String>,
        }

        async fn start_engine(fail_query: bool) -> FakeEngine {
            let deletes = Arc::new(AtomicUsize::new(0));
            let (sender, receiver) = mpsc::unbounded_channel();
            let state = EngineState {
                deletes: Arc::clone(&deletes),
                deleted_names: sender,
                fail_query,
            };
            let app = Router::new()
                .route("/api/v1/collections", post(accept_create))
                .route("/api/v1/collections/{name}/add", post(accept_add))
                .route("/api/v1/collections/{name}/query", post(answer_query))
                .route("/api/v1/collections/{name}", delete(record_delete))
                .with_state(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(axum::serve(listener, app).into_future());
            FakeEngine {
                addr,
                deletes,
                deleted_names: receiver,
            }
        }

        struct FixedEmbedder;

        #[async_trait]
        impl Embedder for FixedEmbedder {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
            }
        }

        fn engine_client(addr: SocketAddr) -> ChromaClient {
            let config = EngineConfig {
                base_url: format!("http://{addr}"),
                ..EngineConfig::default()
            };
            ChromaClient::new(&config, Arc::new(FixedEmbedder)).unwrap()
        }

        fn candidate() -> Document {
            Document {
                id: "0".to_string(),
                text: "id: 1\nname: Bar A".to_string(),
            }
        }

        #[tokio::test]
        async fn test_rank_deletes_the_collection_after_success() {
            let mut server = start_engine(false).await;

            let hits = engine_client(server.addr)
                .rank(vec![candidate()], "quiet bar", 5)
                .await
                .unwrap();

            assert_eq!(hits.len(), 1);
            assert!((hits[0].score - 0.75).abs() < 1e-9);
            assert_eq!(server.deletes.load(Ordering::SeqCst), 1);
            assert!(server.deleted_names.try_recv().is_ok());
        }

        #[tokio::test]
        async fn test_rank_deletes_the_collection_after_query_failure() {
            let server = start_engine(true).await;

            let outcome = engine_client(server.addr)
                .rank(vec![candidate()], "quiet bar", 5)
                .await;

            assert!(outcome.is_err());
            assert_eq!(server.deletes.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_dropped_collection_schedules_the_delete() {
            let mut server = start_engine(false).await;
            let client = engine_client(server.addr);

            let collection = client.create_collection().await.unwrap();
            let expected = collection.name.clone();
            drop(collection);

            let deleted = timeout(Duration::from_secs(5), server.deleted_names.recv())
                .await
                .expect("delete request never arrived")
                .unwrap();
            assert_eq!(deleted, expected);
            assert_eq!(server.deletes.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_cancelled_release_is_rescued_by_drop() {
            let mut server = start_engine(false).await;
            let client = engine_client(server.addr);

            let collection = client.create_collection().await.unwrap();
            let expected = collection.name.clone();

            // Poll the release once so the delete is in flight, then drop the
            // future before it can complete.
            let mut release = Box::pin(collection.release());
            let mut context = Context::from_waker(Waker::noop());
            assert!(release.as_mut().poll(&mut context).is_pending());
            drop(release);

            let deleted = timeout(Duration::from_secs(5), server.deleted_names.recv())
                .await
                .expect("delete request never arrived")
                .unwrap();
            assert_eq!(deleted, expected);
        }
    }
}
