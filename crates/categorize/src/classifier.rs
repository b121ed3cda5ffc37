use crate::error::{CategorizeError, Result};
use actionplan_protocol::{LabeledRecord, TextField};
use actionplan_vector_store::{DistanceMetric, Embedder, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_NEIGHBORS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub neighbors: usize,
    pub metric: DistanceMetric,
    pub text_field: TextField,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
            metric: DistanceMetric::Euclidean,
            text_field: TextField::Reason,
        }
    }
}

/// Fitted k-nearest-neighbour category model: one `(embedding, category)` pair
/// per labeled training record. Read-only after training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierModel {
    embedder_id: String,
    neighbors: usize,
    text_field: TextField,
    index: VectorIndex,
    labels: Vec<String>,
}

/// Fit the classifier on every record with a non-empty category.
pub async fn train_classifier(
    embedder: &dyn Embedder,
    records: &[LabeledRecord],
    config: &ClassifierConfig,
) -> Result<ClassifierModel> {
    if config.neighbors == 0 {
        return Err(CategorizeError::Configuration(
            "classifier neighbors must be at least 1".to_string(),
        ));
    }

    let labeled: Vec<&LabeledRecord> = records.iter().filter(|r| r.is_labeled()).collect();
    if labeled.is_empty() {
        return Err(CategorizeError::InsufficientData(format!(
            "need at least one labeled record, got none among {} rows",
            records.len()
        )));
    }

    log::info!(
        "Training category classifier on {} of {} records (k={}, metric {:?})",
        labeled.len(),
        records.len(),
        config.neighbors,
        config.metric
    );

    let texts: Vec<String> = labeled
        .iter()
        .map(|r| r.text(config.text_field).to_string())
        .collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    let mut index = VectorIndex::new(embedder.dimension(), config.metric);
    let mut labels = Vec::with_capacity(labeled.len());
    for (record, vector) in labeled.iter().zip(embeddings) {
        index.add(vector)?;
        labels.push(record.category.clone());
    }

    let model = ClassifierModel {
        embedder_id: embedder.id().to_string(),
        neighbors: config.neighbors,
        text_field: config.text_field,
        index,
        labels,
    };
    model.validate()?;
    Ok(model)
}

impl ClassifierModel {
    /// Predict the category of free text. Pure with respect to the model.
    pub async fn predict(&self, embedder: &dyn Embedder, text: &str) -> Result<String> {
        if embedder.id() != self.embedder_id {
            log::warn!(
                "Classifier was trained with '{}' but is queried with '{}'",
                self.embedder_id,
                embedder.id()
            );
        }
        let query = embedder.embed(text).await?;
        self.predict_vector(&query)
    }

    /// Majority vote among the `k` nearest training embeddings. Ties go to the
    /// tied label that owns the single nearest neighbour.
    pub fn predict_vector(&self, query: &[f32]) -> Result<String> {
        let neighbors = self.index.nearest(query, self.neighbors)?;

        // (label, votes) in order of first (i.e. nearest) appearance
        let mut tally: Vec<(&str, usize)> = Vec::new();
        for neighbor in &neighbors {
            let label = self.labels[neighbor.id].as_str();
            match tally.iter_mut().find(|(l, _)| *l == label) {
                Some((_, votes)) => *votes += 1,
                None => tally.push((label, 1)),
            }
        }

        let mut winner: Option<(&str, usize)> = None;
        for (label, votes) in tally {
            if winner.map_or(true, |(_, best)| votes > best) {
                winner = Some((label, votes));
            }
        }

        winner.map(|(label, _)| label.to_string()).ok_or_else(|| {
            CategorizeError::InsufficientData("classifier has no training pairs".to_string())
        })
    }

    /// Distinct category labels seen during training.
    #[must_use]
    pub fn labels(&self) -> BTreeSet<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    #[must_use]
    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    #[must_use]
    pub const fn neighbors(&self) -> usize {
        self.neighbors
    }

    #[must_use]
    pub const fn text_field(&self) -> TextField {
        self.text_field
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Consistency check for models loaded from disk.
    pub fn validate(&self) -> Result<()> {
        self.index.validate()?;
        if self.neighbors == 0 {
            return Err(CategorizeError::Configuration(
                "classifier neighbors must be at least 1".to_string(),
            ));
        }
        if self.labels.is_empty() {
            return Err(CategorizeError::InsufficientData(
                "classifier has no training pairs".to_string(),
            ));
        }
        if self.labels.len() != self.index.len() {
            return Err(CategorizeError::Configuration(format!(
                "classifier has {} labels for {} embeddings",
                self.labels.len(),
                self.index.len()
            )));
        }
        if self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(CategorizeError::Configuration(
                "classifier contains an empty label".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }
}
