//! # Action Plan Protocol
//!
//! Data model shared by the training tools and the request pipeline: historical
//! records, the few-shot projection shown to the generation service, and the
//! structured result contract at the system boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub mod steps;

pub use steps::normalize_steps;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_USER_CHARS: usize = 400;

/// One historical simulation with its extracted reason, steps and category.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct LabeledRecord {
    #[serde(default, deserialize_with = "nullable_string")]
    pub sim_id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub customer_text: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub agent_text: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub merged_text: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub reason: String,
    #[serde(default, deserialize_with = "steps::deserialize")]
    pub steps: Vec<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub category: String,
}

impl LabeledRecord {
    #[must_use]
    pub fn is_labeled(&self) -> bool {
        !self.category.trim().is_empty()
    }

    #[must_use]
    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..self.clone()
        }
    }
}

/// Which record text feeds the category models.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    #[default]
    Reason,
    CustomerText,
    AgentText,
    MergedText,
}

impl LabeledRecord {
    #[must_use]
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Reason => &self.reason,
            TextField::CustomerText => &self.customer_text,
            TextField::AgentText => &self.agent_text,
            TextField::MergedText => &self.merged_text,
        }
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A historical (request, structured output) pair used as prompt context.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FewShotExample {
    pub user: String,
    pub reason: String,
    pub steps: Vec<String>,
    pub category: String,
}

impl FewShotExample {
    #[must_use]
    pub fn from_record(record: &LabeledRecord, max_user_chars: usize) -> Self {
        Self {
            user: truncate_chars(&record.customer_text, max_user_chars),
            reason: record.reason.clone(),
            steps: record.steps.clone(),
            category: record.category.clone(),
        }
    }

    /// Assistant side of the exchange, with keys in contract order.
    #[must_use]
    pub fn answer(&self) -> ExampleAnswer<'_> {
        ExampleAnswer {
            category: &self.category,
            reason: &self.reason,
            steps: &self.steps,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExampleAnswer<'a> {
    pub category: &'a str,
    pub reason: &'a str,
    pub steps: &'a [String],
}

/// Truncate to at most `max_chars` Unicode scalar values.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    JsonObject,
    Text,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl GenerationRequest {
    #[must_use]
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            response_format: ResponseFormat::JsonObject,
        }
    }
}

/// Structured plan returned to callers. `category` is never empty;
/// `reason` and `steps` stay absent when the generation service omitted them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct GenerationResult {
    /// Short label for the request's intent.
    pub category: String,
    /// One-sentence explanation of what the customer needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Ordered, short, imperative steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
}

/// Cluster id per record plus the human-readable label per cluster id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub cluster_ids: Vec<usize>,
    pub labels: BTreeMap<usize, String>,
}

impl ClusterAssignment {
    #[must_use]
    pub fn with_default_labels(cluster_ids: Vec<usize>, clusters: usize) -> Self {
        let labels = (0..clusters).map(|id| (id, default_label(id))).collect();
        Self {
            cluster_ids,
            labels,
        }
    }

    #[must_use]
    pub fn clusters(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn label_for(&self, record_index: usize) -> Option<&str> {
        let id = self.cluster_ids.get(record_index)?;
        self.labels.get(id).map(String::as_str)
    }

    /// Replace the label of one cluster; returns `false` for unknown ids.
    pub fn rename(&mut self, cluster_id: usize, label: impl Into<String>) -> bool {
        match self.labels.get_mut(&cluster_id) {
            Some(slot) => {
                *slot = label.into();
                true
            }
            None => false,
        }
    }

    /// Records with their cluster label written into `category`.
    #[must_use]
    pub fn apply(&self, records: &[LabeledRecord]) -> Vec<LabeledRecord> {
        records
            .iter()
            .enumerate()
            .map(|(idx, record)| match self.label_for(idx) {
                Some(label) => record.with_category(label),
                None => record.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = self
            .labels
            .values()
            .map(|label| (label.clone(), 0))
            .collect();
        for idx in 0..self.cluster_ids.len() {
            if let Some(label) = self.label_for(idx) {
                *counts.entry(label.to_string()).or_default() += 1;
            }
        }
        counts
    }
}

#[must_use]
pub fn default_label(cluster_id: usize) -> String {
    format!("Category_{cluster_id}")
}

/// JSON Schema of the result contract.
#[must_use]
pub fn generation_result_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(GenerationResult)).unwrap_or_default()
}
