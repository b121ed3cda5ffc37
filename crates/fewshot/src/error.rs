use actionplan_categorize::CategorizeError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PredictCategory,
    RetrieveExamples,
    BuildPrompt,
    GenerateAndValidate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PredictCategory => "predict_category",
            Self::RetrieveExamples => "retrieve_examples",
            Self::BuildPrompt => "build_prompt",
            Self::GenerateAndValidate => "generate_and_validate",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Deadline exceeded")]
    Timeout,
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InsufficientData(_) => "insufficient_data",
            Self::Embedding(_) => "embedding",
            Self::MalformedResponse(_) => "malformed_response",
            Self::GenerationUnavailable(_) => "generation_unavailable",
            Self::Timeout => "timeout",
        }
    }
}

impl From<CategorizeError> for ErrorKind {
    fn from(err: CategorizeError) -> Self {
        match err {
            CategorizeError::Configuration(msg) => Self::Configuration(msg),
            CategorizeError::InsufficientData(msg) => Self::InsufficientData(msg),
            CategorizeError::VectorStore(err) => Self::Embedding(err.to_string()),
            CategorizeError::Serialization(err) => Self::Configuration(err.to_string()),
        }
    }
}

/// Transport-level failure of the generation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation service unavailable: {0}")]
    Unavailable(String),

    #[error("Generation request timed out")]
    Timeout,

    #[error("Invalid generation settings: {0}")]
    Configuration(String),
}

impl From<GenerationError> for ErrorKind {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable(msg) => Self::GenerationUnavailable(msg),
            GenerationError::Timeout => Self::Timeout,
            GenerationError::Configuration(msg) => Self::Configuration(msg),
        }
    }
}

/// The generation service returned something that does not fit the contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MalformedResponse(pub String);

impl From<MalformedResponse> for ErrorKind {
    fn from(err: MalformedResponse) -> Self {
        Self::MalformedResponse(err.0)
    }
}

/// A failure tagged with the stage that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {kind}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub kind: ErrorKind,
}

impl PipelineError {
    #[must_use]
    pub const fn new(stage: Stage, kind: ErrorKind) -> Self {
        Self { stage, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_stage() {
        let err = PipelineError::new(
            Stage::GenerateAndValidate,
            ErrorKind::MalformedResponse("not json".into()),
        );
        assert_eq!(
            err.to_string(),
            "generate_and_validate failed: Malformed response: not json"
        );
        assert_eq!(err.kind.code(), "malformed_response");
    }

    #[test]
    fn categorize_errors_keep_their_kind() {
        let kind: ErrorKind = CategorizeError::InsufficientData("none".into()).into();
        assert_eq!(kind, ErrorKind::InsufficientData("none".into()));
        let kind: ErrorKind = GenerationError::Timeout.into();
        assert_eq!(kind, ErrorKind::Timeout);
    }
}
