//! # Action Plan Vector Store
//!
//! Text embeddings and exact nearest-neighbour search for the category models.
//!
//! ## Backends
//!
//! - **stub**: deterministic hash-seeded vectors, no model files needed
//! - **onnx**: local sentence-embedding model via ONNX Runtime
//! - **http**: OpenAI-compatible `/embeddings` endpoint
//!
//! ## Example
//!
//! ```no_run
//! use actionplan_vector_store::{build_embedder, DistanceMetric, EmbeddingBackendConfig, VectorIndex};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = build_embedder(&EmbeddingBackendConfig::stub())?;
//!     let mut index = VectorIndex::new(embedder.dimension(), DistanceMetric::Euclidean);
//!
//!     for text in ["refund request", "update shipping address"] {
//!         index.add(embedder.embed(text).await?)?;
//!     }
//!
//!     let query = embedder.embed("where is my refund").await?;
//!     for neighbor in index.nearest(&query, 1)? {
//!         println!("{}: {:.3}", neighbor.id, neighbor.distance);
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod http;
mod index;
mod onnx;
mod types;

pub use embeddings::{
    build_embedder, cosine_similarity, euclidean_distance, normalize, Embedder,
    EmbeddingBackendConfig, StubEmbedder, DEFAULT_STUB_DIMENSION,
};
pub use error::{Result, VectorStoreError};
pub use http::{HttpEmbedder, HttpEmbeddingConfig};
pub use index::VectorIndex;
pub use onnx::{OnnxConfig, OnnxEmbedder};
pub use types::{DistanceMetric, Neighbor};
