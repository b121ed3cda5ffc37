//! # Action Plan Categorize
//!
//! Offline category discovery over historical reasons ([`train_clusterer`]) and
//! the fast nearest-neighbour classifier used at request time
//! ([`train_classifier`], [`ClassifierModel::predict`]).

mod classifier;
mod clusterer;
mod error;
mod kmeans;

pub use classifier::{train_classifier, ClassifierConfig, ClassifierModel, DEFAULT_NEIGHBORS};
pub use clusterer::{
    cluster_texts, train_clusterer, ClusterConfig, DEFAULT_CLUSTERS, DEFAULT_SEED,
};
pub use error::{CategorizeError, Result};
pub use kmeans::{KMeans, KMeansFit};
