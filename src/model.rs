//! Clustering engine, WCSS evaluation and cluster assignment

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_clustering::{KMeans, KMeansError};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ShapeError};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use thiserror::Error;
use tracing::{debug, warn};

/// Member vectors per cluster; the outer index is the cluster ordinal
pub type ClusterGroups = Vec<Vec<Vec<f64>>>;

#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("cannot form {k} cluster(s) from {n_samples} sample(s)")]
    InvalidClusterCount { k: usize, n_samples: usize },
    #[error("sample {index} has {found} features, expected {expected}")]
    RaggedInput {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("invalid feature matrix shape: {0}")]
    Shape(#[from] ShapeError),
    #[error("k-means failed: {0}")]
    KMeans(#[from] KMeansError),
}

/// Partitions feature vectors into `k` groups.
///
/// The engine is treated as opaque: callers only rely on the returned
/// groups, never on the order of members inside them.
pub trait ClusteringEngine {
    fn cluster(&self, k: usize, vectors: &[Vec<f64>]) -> Result<ClusterGroups, ClusteringError>;
}

/// K-Means engine backed by linfa, seeded for reproducible runs
#[derive(Debug, Clone)]
pub struct KMeansEngine {
    /// Maximum iterations per k-means run
    pub max_iters: u64,
    /// Convergence tolerance
    pub tolerance: f64,
    /// Seed for centroid initialisation
    pub seed: u64,
}

impl Default for KMeansEngine {
    fn default() -> Self {
        KMeansEngine {
            max_iters: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

impl ClusteringEngine for KMeansEngine {
    fn cluster(&self, k: usize, vectors: &[Vec<f64>]) -> Result<ClusterGroups, ClusteringError> {
        let n_samples = vectors.len();
        if k == 0 || n_samples < k {
            return Err(ClusteringError::InvalidClusterCount { k, n_samples });
        }

        let n_features = vectors[0].len();
        if let Some((index, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != n_features)
        {
            return Err(ClusteringError::RaggedInput {
                index,
                expected: n_features,
                found: vector.len(),
            });
        }

        let flat: Vec<f64> = vectors.iter().flatten().copied().collect();
        let records = Array2::from_shape_vec((n_samples, n_features), flat)?;

        // Dummy targets for unsupervised learning
        let targets: Array1<usize> = Array1::zeros(n_samples);
        let dataset = Dataset::new(records.clone(), targets);

        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let model = KMeans::params_with(k, rng, L2Dist)
            .max_n_iterations(self.max_iters)
            .tolerance(self.tolerance)
            .fit(&dataset)?;

        let labels: Array1<usize> = model.predict(&records);

        let mut groups: ClusterGroups = vec![Vec::new(); k];
        for (vector, &label) in vectors.iter().zip(labels.iter()) {
            groups[label].push(vector.clone());
        }
        Ok(groups)
    }
}

/// Mean of the well-formed members of one group.
///
/// The dimension comes from the first non-empty member; members of any
/// other length are ignored. Returns `None` when no member is usable.
fn group_centroid(members: &[Vec<f64>]) -> Option<Vec<f64>> {
    let dimension = members.iter().find(|point| !point.is_empty())?.len();

    let mut centroid = vec![0.0; dimension];
    let mut count = 0usize;
    for point in members.iter().filter(|point| point.len() == dimension) {
        for (sum, value) in centroid.iter_mut().zip(point) {
            *sum += value;
        }
        count += 1;
    }

    centroid.iter_mut().for_each(|sum| *sum /= count as f64);
    Some(centroid)
}

/// Centroid for every group, `None` where a group has no usable member
pub fn group_centroids(groups: &[Vec<Vec<f64>>]) -> Vec<Option<Vec<f64>>> {
    groups.iter().map(|members| group_centroid(members)).collect()
}

/// Within-cluster sum of squares over all groups
pub fn wcss_of_groups(groups: &[Vec<Vec<f64>>]) -> f64 {
    groups
        .iter()
        .filter_map(|members| group_centroid(members).map(|centroid| (members, centroid)))
        .map(|(members, centroid)| {
            members
                .iter()
                .filter(|point| point.len() == centroid.len())
                .map(|point| squared_distance(point, &centroid))
                .sum::<f64>()
        })
        .sum()
}

/// Cluster once with `k` and compute the WCSS of the result
///
/// # Returns
/// * `Some(0.0)` without clustering when `k == 0` or there are no features
/// * `None` when the engine fails; the failure is logged, not propagated
pub fn evaluate_wcss<E: ClusteringEngine + ?Sized>(
    engine: &E,
    k: usize,
    features: &[Vec<f64>],
) -> Option<f64> {
    if k < 1 || features.is_empty() {
        return Some(0.0);
    }

    match engine.cluster(k, features) {
        Ok(groups) => {
            let wcss = wcss_of_groups(&groups);
            debug!("K = {}: WCSS = {}", k, wcss);
            Some(wcss)
        }
        Err(err) => {
            warn!("WCSS evaluation failed for K = {}: {}", k, err);
            None
        }
    }
}

/// Assign every feature vector to its nearest group centroid
///
/// Cluster ids are 1-based group ordinals. Ties go to the lowest id and
/// groups without a centroid are never chosen. If no group has a
/// centroid, everything lands in cluster 1.
pub fn resolve_assignments(groups: &[Vec<Vec<f64>>], features: &[Vec<f64>]) -> Vec<usize> {
    let centroids = group_centroids(groups);

    features
        .iter()
        .map(|point| {
            let mut min_distance = f64::INFINITY;
            let mut assigned = 1;

            for (index, centroid) in centroids.iter().enumerate() {
                if let Some(centroid) = centroid {
                    let distance = euclidean_distance(point, centroid);
                    if distance < min_distance {
                        min_distance = distance;
                        assigned = index + 1;
                    }
                }
            }
            assigned
        })
        .collect()
}

/// Mean feature vector of each cluster `1..=k`, computed from assignments
pub fn centroids_from_assignments(
    features: &[Vec<f64>],
    assignments: &[usize],
    k: usize,
) -> Vec<Option<Vec<f64>>> {
    let mut members: ClusterGroups = vec![Vec::new(); k];
    for (point, &cluster) in features.iter().zip(assignments) {
        if (1..=k).contains(&cluster) {
            members[cluster - 1].push(point.clone());
        }
    }
    group_centroids(&members)
}

/// Number of records in each cluster `1..=k`
pub fn cluster_sizes(assignments: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0; k];
    for &cluster in assignments {
        if (1..=k).contains(&cluster) {
            sizes[cluster - 1] += 1;
        }
    }
    sizes
}

/// Result of the final clustering run at the chosen K
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// Number of clusters requested
    pub k: usize,
    /// 1-based cluster id per record
    pub assignments: Vec<usize>,
    /// Members per cluster, index 0 is cluster 1
    pub sizes: Vec<usize>,
}

/// Cluster with `k` and resolve a total assignment for every record
pub fn cluster_final<E: ClusteringEngine + ?Sized>(
    engine: &E,
    k: usize,
    features: &[Vec<f64>],
) -> Result<ClusterOutcome, ClusteringError> {
    let groups = engine.cluster(k, features)?;
    let assignments = resolve_assignments(&groups, features);
    let sizes = cluster_sizes(&assignments, k);

    Ok(ClusterOutcome {
        k,
        assignments,
        sizes,
    })
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}
