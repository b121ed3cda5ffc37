use crate::error::{Result, VectorStoreError};
use crate::http::{HttpEmbedder, HttpEmbeddingConfig};
use crate::onnx::{OnnxConfig, OnnxEmbedder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_STUB_DIMENSION: usize = 384;

/// Text-to-vector adapter. Implementations return exactly one vector per input,
/// in input order, and must accept empty strings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier of the backend/model pair.
    fn id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

/// Which embedding backend to build, as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EmbeddingBackendConfig {
    Stub {
        #[serde(default = "default_stub_dimension")]
        dimension: usize,
    },
    Onnx(OnnxConfig),
    Http(HttpEmbeddingConfig),
}

impl Default for EmbeddingBackendConfig {
    fn default() -> Self {
        Self::Onnx(OnnxConfig::default())
    }
}

impl EmbeddingBackendConfig {
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Stub { .. } => "stub",
            Self::Onnx(_) => "onnx",
            Self::Http(_) => "http",
        }
    }

    #[must_use]
    pub const fn stub() -> Self {
        Self::Stub {
            dimension: DEFAULT_STUB_DIMENSION,
        }
    }
}

const fn default_stub_dimension() -> usize {
    DEFAULT_STUB_DIMENSION
}

/// Construct the configured backend. The caller owns the returned handle and
/// shares it across requests.
pub fn build_embedder(config: &EmbeddingBackendConfig) -> Result<Arc<dyn Embedder>> {
    log::info!("Initializing {} embedding backend", config.mode());
    match config {
        EmbeddingBackendConfig::Stub { dimension } => Ok(Arc::new(StubEmbedder::new(*dimension))),
        EmbeddingBackendConfig::Onnx(onnx) => Ok(Arc::new(OnnxEmbedder::new(onnx)?)),
        EmbeddingBackendConfig::Http(http) => Ok(Arc::new(HttpEmbedder::new(http)?)),
    }
}

/// Deterministic hash-seeded embeddings; identical text always maps to the same
/// unit vector. Used offline and in tests.
#[derive(Clone, Debug)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_STUB_DIMENSION)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn id(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect())
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub(crate) const fn ensure_dimension(vec: &[f32], expected: usize) -> Result<()> {
    if vec.len() != expected {
        return Err(VectorStoreError::InvalidDimension {
            expected,
            actual: vec.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn stub_is_deterministic_and_normalized() {
        let embedder = StubEmbedder::new(16);
        let texts = vec!["refund request".to_string(), "refund request".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn stub_accepts_empty_strings() {
        let embedder = StubEmbedder::new(8);
        let vector = embedder.embed("").await.unwrap();
        assert_eq!(vector.len(), 8);
    }

    #[tokio::test]
    async fn stub_distinguishes_texts() {
        let embedder = StubEmbedder::new(32);
        let a = embedder.embed("change shipping address").await.unwrap();
        let b = embedder.embed("cancel my subscription").await.unwrap();
        assert!(cosine_similarity(&a, &b) < 0.99);
    }

    #[test]
    fn distance_helpers() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn backend_config_is_tagged_by_mode() {
        let config: EmbeddingBackendConfig =
            serde_json::from_str(r#"{"mode":"stub","dimension":12}"#).unwrap();
        assert_eq!(config, EmbeddingBackendConfig::Stub { dimension: 12 });
        assert_eq!(config.mode(), "stub");

        let config: EmbeddingBackendConfig = serde_json::from_str(r#"{"mode":"stub"}"#).unwrap();
        assert_eq!(config, EmbeddingBackendConfig::stub());
    }

    #[test]
    fn build_stub_backend() {
        let embedder = build_embedder(&EmbeddingBackendConfig::Stub { dimension: 4 }).unwrap();
        assert_eq!(embedder.dimension(), 4);
        assert_eq!(embedder.id(), "stub");
    }
}
