use crate::embeddings::{ensure_dimension, Embedder};
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpEmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    /// Environment variable holding the bearer token; unset means no auth header.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            timeout_secs: 60,
        }
    }
}

pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: &HttpEmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorStoreError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            log::warn!(
                "No API key found for embedding endpoint {}; sending unauthenticated requests",
                config.base_url
            );
        }
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // Hosted embedding APIs reject empty strings.
        let input: Vec<&str> = texts
            .iter()
            .map(|t| if t.is_empty() { " " } else { t.as_str() })
            .collect();
        let url = format!("{}/embeddings", self.base_url);
        log::debug!("Embedding {} texts via {}", input.len(), url);

        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": input }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VectorStoreError::HttpError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::HttpError(format!(
                "{url} returned {status}: {body}"
            )));
        }
        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::HttpError(format!("Invalid embedding response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|row| row.index);
        let mut out = Vec::with_capacity(parsed.data.len());
        for row in parsed.data {
            ensure_dimension(&row.embedding, self.dimension)?;
            out.push(row.embedding);
        }
        Ok(out)
    }
}
