use crate::embeddings::{cosine_similarity, euclidean_distance};
use crate::error::{Result, VectorStoreError};
use crate::types::{DistanceMetric, Neighbor};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Exact brute-force vector index. Training sets here are small (one vector per
/// historical record), so a linear scan keeps results exact and reproducible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    #[serde(default)]
    metric: DistanceMetric,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    #[must_use]
    pub const fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
        }
    }

    /// Add vector to index; returns its id.
    pub fn add(&mut self, vector: Vec<f32>) -> Result<usize> {
        self.check(&vector)?;
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// The `k` closest vectors, nearest first. Equal distances keep insertion order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check(query)?;

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| Neighbor {
                id,
                distance: self.distance(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Re-check every stored vector, e.g. after deserializing.
    pub fn validate(&self) -> Result<()> {
        self.vectors.iter().try_for_each(|v| self.check(v))
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
        }
    }

    const fn check(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
