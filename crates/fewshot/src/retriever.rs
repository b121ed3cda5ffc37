use actionplan_protocol::{FewShotExample, LabeledRecord, DEFAULT_MAX_USER_CHARS};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXAMPLES: usize = 3;
pub const DEFAULT_RETRIEVAL_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub examples: usize,
    pub max_user_chars: usize,
    pub seed: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            examples: DEFAULT_EXAMPLES,
            max_user_chars: DEFAULT_MAX_USER_CHARS,
            seed: DEFAULT_RETRIEVAL_SEED,
        }
    }
}

/// Pick up to `config.examples` records of `category` as prompt examples.
///
/// Records without a category are never used. When no record carries the
/// category, every labeled record is sampled instead.
/// The same dataset, category and seed always yield the same examples in the
/// same order.
#[must_use]
pub fn retrieve_examples(
    dataset: &[LabeledRecord],
    category: &str,
    config: &RetrievalConfig,
) -> Vec<FewShotExample> {
    let labeled: Vec<&LabeledRecord> = dataset.iter().filter(|r| r.is_labeled()).collect();
    let matching: Vec<&LabeledRecord> = labeled
        .iter()
        .copied()
        .filter(|r| r.category == category)
        .collect();
    let pool: Vec<&LabeledRecord> = if matching.is_empty() {
        log::debug!(
            "No examples for category '{category}', sampling from all {} labeled records",
            labeled.len()
        );
        labeled
    } else {
        matching
    };

    let amount = config.examples.min(pool.len());
    if amount == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let picked = rand::seq::index::sample(&mut rng, pool.len(), amount);
    log::debug!(
        "Retrieved {amount} of {} candidate examples for '{category}'",
        pool.len()
    );
    picked
        .into_iter()
        .map(|idx| FewShotExample::from_record(pool[idx], config.max_user_chars))
        .collect()
}
