use thiserror::Error;

pub type Result<T> = std::result::Result<T, CategorizeError>;

#[derive(Error, Debug)]
pub enum CategorizeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] actionplan_vector_store::VectorStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
