//! Embedding client for the similarity engine
//!
//! Wraps an OpenAI-compatible `/embeddings` endpoint. Batches are embedded
//! in a single request and handed back in input order, whatever order the
//! provider chose to answer in.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::config::EmbeddingConfig;

/// Turns texts into embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible embeddings API client
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    /// Create a new embeddings client
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Embedding API key is not configured")?;
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("izakaya-search/0.1.0")
            .build()
            .with_context(|| "Failed to create embedding HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!(batch = texts.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .with_context(|| "Embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Embedding provider returned status {status}");
        }

        let body: openai::EmbeddingResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse embedding response")?;

        openai::vectors_in_input_order(body, texts.len())
    }
}

/// OpenAI embeddings API response structures
mod openai {
    use anyhow::{Result, bail};
    use serde::Deserialize;

    /// Embeddings response body
    #[derive(Debug, Deserialize)]
    pub struct EmbeddingResponse {
        pub data: Vec<EmbeddingData>,
    }

    #[derive(Debug, Deserialize)]
    pub struct EmbeddingData {
        pub embedding: Vec<f32>,
        pub index: usize,
    }

    /// Reassemble response vectors into input order
    ///
    /// The API documents `index` as the position of each vector's input, so
    /// ordering by it is the contract; a gap or duplicate means the batch
    /// cannot be trusted.
    pub fn vectors_in_input_order(
        response: EmbeddingResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let mut data = response.data;
        if data.len() != expected {
            bail!(
                "embedding provider returned {} vectors for {} inputs",
                data.len(),
                expected
            );
        }
        data.sort_by_key(|item| item.index);
        for (position, item) in data.iter().enumerate() {
            if item.index != position {
                bail!("embedding provider response is missing index {position}");
            }
        }
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::openai::{EmbeddingResponse, vectors_in_input_order};
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let config = EmbeddingConfig::default();
        assert!(config.api_key.is_none());
        let error = OpenAiEmbedder::new(&config).unwrap_err();
        assert!(error.to_string().contains("API key"));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "embedding": [0.1, -0.2, 0.3], "index": 0}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].embedding, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_vectors_are_reordered_by_index() {
        let json = r#"{"data": [
            {"embedding": [2.0], "index": 1},
            {"embedding": [1.0], "index": 0},
            {"embedding": [3.0], "index": 2}
        ]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = vectors_in_input_order(response, 3).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_vector_count_mismatch_is_rejected() {
        let json = r#"{"data": [{"embedding": [1.0], "index": 0}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert!(vectors_in_input_order(response, 2).is_err());
    }

    #[test]
    fn test_duplicate_index_is_rejected() {
        let json = r#"{"data": [
            {"embedding": [1.0], "index": 0},
            {"embedding": [2.0], "index": 0}
        ]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert!(vectors_in_input_order(response, 2).is_err());
    }
}
