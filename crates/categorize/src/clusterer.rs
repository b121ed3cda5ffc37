use crate::error::{CategorizeError, Result};
use crate::kmeans::KMeans;
use actionplan_protocol::{ClusterAssignment, LabeledRecord, TextField};
use actionplan_vector_store::Embedder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_CLUSTERS: usize = 5;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub n_init: usize,
    pub tolerance: f32,
    pub text_field: TextField,
    /// Human-readable label per cluster id; blank entries keep `Category_<id>`.
    pub labels: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTERS,
            seed: DEFAULT_SEED,
            max_iterations: 300,
            n_init: 10,
            tolerance: 1e-4,
            text_field: TextField::Reason,
            labels: Vec::new(),
        }
    }
}

impl ClusterConfig {
    fn kmeans(&self) -> KMeans {
        KMeans {
            clusters: self.clusters,
            seed: self.seed,
            max_iterations: self.max_iterations,
            n_init: self.n_init,
            tolerance: self.tolerance,
        }
    }
}

/// Discover `config.clusters` categories among the records' texts
/// (the `reason` field by default).
pub async fn train_clusterer(
    embedder: &dyn Embedder,
    records: &[LabeledRecord],
    config: &ClusterConfig,
) -> Result<ClusterAssignment> {
    let texts: Vec<String> = records
        .iter()
        .map(|r| r.text(config.text_field).to_string())
        .collect();
    cluster_texts(embedder, &texts, config).await
}

/// Partition texts into disjoint groups with default `Category_<id>` labels.
/// Identical texts and seed always give identical assignments.
pub async fn cluster_texts(
    embedder: &dyn Embedder,
    texts: &[String],
    config: &ClusterConfig,
) -> Result<ClusterAssignment> {
    let distinct = texts.iter().map(String::as_str).collect::<HashSet<_>>().len();
    if config.clusters == 0 || config.clusters > distinct {
        return Err(CategorizeError::Configuration(format!(
            "cluster count {} must be between 1 and the number of distinct texts ({distinct})",
            config.clusters
        )));
    }

    log::info!(
        "Clustering {} texts ({} distinct) into {} groups with {}",
        texts.len(),
        distinct,
        config.clusters,
        embedder.id()
    );
    let embeddings = embedder.embed_batch(texts).await?;
    let fit = config.kmeans().fit(&embeddings)?;
    log::info!(
        "Clustering converged: inertia {:.4}, {} iterations",
        fit.inertia,
        fit.iterations
    );

    let empty = empty_clusters(&fit.labels, config.clusters);
    if !empty.is_empty() {
        log::warn!(
            "Clusters {empty:?} received no texts; some distinct texts share an embedding"
        );
    }

    let mut assignment = ClusterAssignment::with_default_labels(fit.labels, config.clusters);
    apply_labels(&mut assignment, &config.labels)?;
    Ok(assignment)
}

fn apply_labels(assignment: &mut ClusterAssignment, labels: &[String]) -> Result<()> {
    for (id, label) in labels.iter().enumerate() {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        if !assignment.rename(id, label) {
            return Err(CategorizeError::Configuration(format!(
                "label '{label}' given for cluster {id}, but only {} clusters exist",
                assignment.clusters()
            )));
        }
    }
    Ok(())
}

/// Cluster ids in `0..clusters` that no point was assigned to.
fn empty_clusters(ids: &[usize], clusters: usize) -> Vec<usize> {
    (0..clusters).filter(|id| !ids.contains(id)).collect()
}
