use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// `1 - cosine_similarity`
    Cosine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Insertion position in the index.
    pub id: usize,
    pub distance: f32,
}
