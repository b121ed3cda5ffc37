//! # Action Plan Few-Shot
//!
//! Request-time half of the system: picks historical examples for a predicted
//! category, renders the few-shot prompt, calls the generation service and
//! validates what comes back.
//!
//! ```no_run
//! use actionplan_categorize::ClassifierModel;
//! use actionplan_fewshot::{GenerationConfig, HttpGenerator, Pipeline, PipelineConfig};
//! use actionplan_vector_store::{build_embedder, EmbeddingBackendConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = build_embedder(&EmbeddingBackendConfig::stub())?;
//!     let generator = Arc::new(HttpGenerator::new(&GenerationConfig::default())?);
//!     let model = ClassifierModel::from_json(&std::fs::read_to_string("model.json")?)?;
//!
//!     let pipeline = Pipeline::new(embedder, generator, PipelineConfig::default());
//!     let result = pipeline.run("My card was charged twice", &[], &model).await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

mod error;
mod generation;
mod pipeline;
mod prompt;
mod retriever;
mod validator;

pub use error::{ErrorKind, GenerationError, MalformedResponse, PipelineError, Result, Stage};
pub use generation::{GenerationConfig, Generator, HttpGenerator, DEFAULT_GENERATION_MODEL};
pub use pipeline::{Pipeline, PipelineConfig, PipelineTrace};
pub use prompt::build_prompt;
pub use retriever::{retrieve_examples, RetrievalConfig, DEFAULT_EXAMPLES};
pub use validator::validate_response;
