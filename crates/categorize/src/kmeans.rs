use crate::error::{CategorizeError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded Lloyd's k-means with k-means++ initialisation and restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub n_init: usize,
    pub tolerance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster id per point, renumbered by first appearance.
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f32,
    pub iterations: usize,
}

impl KMeans {
    pub fn fit(&self, points: &[Vec<f32>]) -> Result<KMeansFit> {
        if self.clusters == 0 {
            return Err(CategorizeError::Configuration(
                "cluster count must be at least 1".to_string(),
            ));
        }
        if points.len() < self.clusters {
            return Err(CategorizeError::Configuration(format!(
                "cannot form {} clusters from {} points",
                self.clusters,
                points.len()
            )));
        }
        let dimension = points[0].len();
        if let Some(bad) = points.iter().find(|p| p.len() != dimension) {
            return Err(CategorizeError::VectorStore(
                actionplan_vector_store::VectorStoreError::InvalidDimension {
                    expected: dimension,
                    actual: bad.len(),
                },
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;
        for run in 0..self.n_init.max(1) {
            let fit = self.run_once(points, &mut rng);
            log::debug!(
                "k-means run {run}: inertia {:.6} after {} iterations",
                fit.inertia,
                fit.iterations
            );
            // Strict comparison keeps the earliest run on ties.
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        let best = best.ok_or_else(|| CategorizeError::Configuration("no k-means runs".into()))?;
        Ok(renumber_by_first_appearance(best))
    }

    fn run_once(&self, points: &[Vec<f32>], rng: &mut StdRng) -> KMeansFit {
        let mut centroids = init_plus_plus(points, self.clusters, rng);
        let mut labels = vec![0usize; points.len()];
        let mut iterations = 0;

        for _ in 0..self.max_iterations.max(1) {
            iterations += 1;
            assign(points, &centroids, &mut labels);
            let next = update_centroids(points, &labels, &centroids);
            let shift: f32 = centroids
                .iter()
                .zip(&next)
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = next;
            if shift <= self.tolerance {
                break;
            }
        }

        let inertia = assign(points, &centroids, &mut labels);
        KMeansFit {
            labels,
            centroids,
            inertia,
            iterations,
        }
    }
}

fn init_plus_plus(points: &[Vec<f32>], clusters: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(clusters);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    let mut closest: Vec<f32> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < clusters {
        let total: f64 = closest.iter().map(|d| f64::from(*d)).sum();
        let chosen = if total <= 0.0 {
            rng.gen_range(0..points.len())
        } else {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0f64;
            let mut pick = points.len() - 1;
            for (idx, d) in closest.iter().enumerate() {
                acc += f64::from(*d);
                if acc > target {
                    pick = idx;
                    break;
                }
            }
            pick
        };

        let centroid = points[chosen].clone();
        for (slot, point) in closest.iter_mut().zip(points) {
            *slot = slot.min(squared_distance(point, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Assign each point to its nearest centroid (lowest id on ties); returns inertia.
fn assign(points: &[Vec<f32>], centroids: &[Vec<f32>], labels: &mut [usize]) -> f32 {
    let mut inertia = 0.0f32;
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        let (best, dist) = nearest_centroid(point, centroids);
        *label = best;
        inertia += dist;
    }
    inertia
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best.1 {
            best = (idx, dist);
        }
    }
    best
}

fn update_centroids(points: &[Vec<f32>], labels: &[usize], previous: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let dimension = previous[0].len();
    let mut sums = vec![vec![0.0f64; dimension]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (acc, value) in sums[label].iter_mut().zip(point) {
            *acc += f64::from(*value);
        }
    }

    let mut centroids: Vec<Vec<f32>> = sums
        .into_iter()
        .zip(&counts)
        .zip(previous)
        .map(|((sum, &count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|v| (v / count as f64) as f32).collect()
            }
        })
        .collect();

    // Re-seed empty clusters with the point farthest from its current centroid.
    let mut taken: Vec<usize> = Vec::new();
    for cluster in 0..centroids.len() {
        if counts[cluster] > 0 {
            continue;
        }
        let farthest = points
            .iter()
            .enumerate()
            .filter(|(idx, _)| !taken.contains(idx))
            .map(|(idx, p)| (idx, squared_distance(p, &centroids[labels[idx]])))
            .fold(None::<(usize, f32)>, |acc, cand| match acc {
                Some(best) if best.1 >= cand.1 => Some(best),
                _ => Some(cand),
            });
        if let Some((idx, _)) = farthest {
            taken.push(idx);
            centroids[cluster] = points[idx].clone();
        }
    }

    centroids
}

fn renumber_by_first_appearance(fit: KMeansFit) -> KMeansFit {
    let mut mapping: Vec<Option<usize>> = vec![None; fit.centroids.len()];
    let mut next = 0;
    for &label in &fit.labels {
        if mapping[label].is_none() {
            mapping[label] = Some(next);
            next += 1;
        }
    }
    for slot in &mut mapping {
        if slot.is_none() {
            *slot = Some(next);
            next += 1;
        }
    }

    let mut centroids = vec![Vec::new(); fit.centroids.len()];
    for (old, centroid) in fit.centroids.into_iter().enumerate() {
        if let Some(new) = mapping[old] {
            centroids[new] = centroid;
        }
    }
    KMeansFit {
        labels: fit
            .labels
            .iter()
            .map(|&l| mapping[l].unwrap_or(l))
            .collect(),
        centroids,
        inertia: fit.inertia,
        iterations: fit.iterations,
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
