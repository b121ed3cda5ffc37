use crate::error::{ErrorKind, PipelineError, Result, Stage};
use crate::generation::Generator;
use crate::prompt::build_prompt;
use crate::retriever::{retrieve_examples, RetrievalConfig};
use crate::validator::validate_response;
use actionplan_categorize::ClassifierModel;
use actionplan_protocol::{FewShotExample, GenerationRequest, GenerationResult, LabeledRecord};
use actionplan_vector_store::Embedder;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    /// Upper bound on one whole invocation; `None` waits indefinitely.
    pub deadline_ms: Option<u64>,
}

/// Everything one invocation produced, for inspection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PipelineTrace {
    pub predicted_category: String,
    pub examples: Vec<FewShotExample>,
    pub prompt: String,
    /// Absent for dry runs that stop before generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
}

/// Request-time orchestration: predict, retrieve, prompt, generate, validate.
///
/// Holds no per-request state; one instance can serve concurrent invocations.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            generator,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(
        &self,
        user_text: &str,
        dataset: &[LabeledRecord],
        model: &ClassifierModel,
    ) -> Result<GenerationResult> {
        let trace = self.run_traced(user_text, dataset, model).await?;
        finished(trace)
    }

    /// Like [`Pipeline::run`], bounded by an explicit deadline instead of the configured one.
    pub async fn run_with_deadline(
        &self,
        user_text: &str,
        dataset: &[LabeledRecord],
        model: &ClassifierModel,
        deadline: Instant,
    ) -> Result<GenerationResult> {
        let trace = self
            .execute(user_text, dataset, model, Some(deadline), true)
            .await?;
        finished(trace)
    }

    pub async fn run_traced(
        &self,
        user_text: &str,
        dataset: &[LabeledRecord],
        model: &ClassifierModel,
    ) -> Result<PipelineTrace> {
        self.execute(user_text, dataset, model, self.configured_deadline(), true)
            .await
    }

    /// Runs the stages up to the prompt without contacting the generation service.
    pub async fn prepare(
        &self,
        user_text: &str,
        dataset: &[LabeledRecord],
        model: &ClassifierModel,
    ) -> Result<PipelineTrace> {
        self.execute(user_text, dataset, model, self.configured_deadline(), false)
            .await
    }

    fn configured_deadline(&self) -> Option<Instant> {
        self.config
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms))
    }

    async fn execute(
        &self,
        user_text: &str,
        dataset: &[LabeledRecord],
        model: &ClassifierModel,
        deadline: Option<Instant>,
        generate: bool,
    ) -> Result<PipelineTrace> {
        let predicted_category = within(Stage::PredictCategory, deadline, async {
            Ok::<_, ErrorKind>(model.predict(self.embedder.as_ref(), user_text).await?)
        })
        .await?;
        log::debug!("Predicted category '{predicted_category}'");

        let examples = within(Stage::RetrieveExamples, deadline, async {
            Ok::<_, ErrorKind>(retrieve_examples(
                dataset,
                &predicted_category,
                &self.config.retrieval,
            ))
        })
        .await?;

        let prompt = within(Stage::BuildPrompt, deadline, async {
            Ok::<_, ErrorKind>(build_prompt(user_text, &examples))
        })
        .await?;
        log::debug!(
            "Built prompt with {} examples ({} chars)",
            examples.len(),
            prompt.chars().count()
        );

        let result = if generate {
            let request = GenerationRequest::json(prompt.clone());
            Some(
                within(Stage::GenerateAndValidate, deadline, async {
                    let raw = self
                        .generator
                        .generate(&request)
                        .await
                        .map_err(ErrorKind::from)?;
                    Ok::<_, ErrorKind>(validate_response(&raw, &predicted_category)?)
                })
                .await?,
            )
        } else {
            None
        };

        Ok(PipelineTrace {
            predicted_category,
            examples,
            prompt,
            result,
        })
    }
}

fn finished(trace: PipelineTrace) -> Result<GenerationResult> {
    trace.result.ok_or_else(|| {
        PipelineError::new(
            Stage::GenerateAndValidate,
            ErrorKind::MalformedResponse("no response was generated".to_string()),
        )
    })
}

/// Await one stage, tagging its failure and bounding it by the deadline.
async fn within<T, F>(stage: Stage, deadline: Option<Instant>, stage_future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, ErrorKind>>,
{
    let outcome = match deadline {
        Some(at) => match tokio::time::timeout_at(at, stage_future).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!("Deadline exceeded during {stage}");
                Err(ErrorKind::Timeout)
            }
        },
        None => stage_future.await,
    };
    outcome.map_err(|kind| PipelineError::new(stage, kind))
}
