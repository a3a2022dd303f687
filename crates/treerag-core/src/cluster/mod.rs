//! Cluster engine for the tree builder.
//!
//! Partitions a level of node vectors into `k = ceil(n / target_size)`
//! groups. Two interchangeable strategies are available:
//!
//! | Strategy | Type | Assignment |
//! |----------|------|------------|
//! | [`ClusterStrategy::KMeans`] | [`KMeans`] | hard, one cluster per vector |
//! | [`ClusterStrategy::CMeans`] | [`FuzzyCMeans`] | soft memberships, crisp label = argmax |
//!
//! Both are seeded, so the same input always yields the same partition.
//! Clusters left without members are kept in [`ClusterResult`] but dropped
//! by [`ClusterResult::groups`], so callers only ever see non-empty groups.

mod cmeans;
mod kmeans;

pub use cmeans::FuzzyCMeans;
pub use kmeans::KMeans;

use anyhow::Result;
use ndarray::Array2;

use crate::error::RagError;

/// Output of a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    /// One center per cluster, `k` in total (empty clusters included).
    pub centers: Vec<Vec<f32>>,
    /// Cluster index for each input vector.
    pub assignment: Vec<usize>,
}

impl ClusterResult {
    /// Number of clusters before pruning.
    pub fn k(&self) -> usize {
        self.centers.len()
    }

    /// Member indices per non-empty cluster, paired with the cluster index.
    ///
    /// Groups come out in cluster order, members in input order.
    pub fn groups(&self) -> Vec<(usize, Vec<usize>)> {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); self.k()];
        for (i, &label) in self.assignment.iter().enumerate() {
            members[label].push(i);
        }
        members
            .into_iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .collect()
    }
}

/// A clustering algorithm with a fixed cluster count.
pub trait Clustering {
    /// Fit to `data` and return centers and assignments.
    fn fit(&self, data: &[Vec<f32>]) -> Result<ClusterResult>;
}

/// Which algorithm the tree builder uses, with its tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterStrategy {
    /// Hard partitioning (k-means++ seeding, Lloyd iterations).
    KMeans { seed: u64 },
    /// Soft partitioning (fuzzy c-means).
    CMeans {
        seed: u64,
        /// Fuzziness exponent `m`, must be > 1.
        fuzziness: f32,
        /// Stop when the membership matrix moves less than this.
        error: f32,
        max_iter: usize,
    },
}

impl Default for ClusterStrategy {
    fn default() -> Self {
        ClusterStrategy::KMeans { seed: 0 }
    }
}

impl ClusterStrategy {
    /// Default fuzzy c-means parameters (`m = 2.0`, error 0.005, 100 iterations).
    pub fn cmeans(seed: u64) -> Self {
        ClusterStrategy::CMeans {
            seed,
            fuzziness: 2.0,
            error: 0.005,
            max_iter: 100,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClusterStrategy::KMeans { .. } => "kmeans",
            ClusterStrategy::CMeans { .. } => "cmeans",
        }
    }
}

/// Number of clusters for `n` items and a target cluster size.
///
/// `ceil(n / target_size)`, never less than 1.
pub fn cluster_count(n: usize, target_size: usize) -> usize {
    n.div_ceil(target_size.max(1)).max(1)
}

/// Cluster `vectors` into [`cluster_count`] groups using `strategy`.
pub fn cluster(
    vectors: &[Vec<f32>],
    target_size: usize,
    strategy: &ClusterStrategy,
) -> Result<ClusterResult> {
    if target_size == 0 {
        return Err(RagError::Configuration("cluster size must be >= 1".into()).into());
    }
    let k = cluster_count(vectors.len(), target_size);
    match *strategy {
        ClusterStrategy::KMeans { seed } => KMeans::new(k).with_seed(seed).fit(vectors),
        ClusterStrategy::CMeans {
            seed,
            fuzziness,
            error,
            max_iter,
        } => FuzzyCMeans::new(k)
            .with_seed(seed)
            .with_fuzziness(fuzziness)
            .with_error(error)
            .with_max_iter(max_iter)
            .fit(vectors),
    }
}

/// Validate input and pack it into an `n × d` matrix.
pub(crate) fn to_matrix(data: &[Vec<f32>], k: usize) -> Result<Array2<f32>> {
    if data.is_empty() {
        return Err(RagError::Clustering("empty input".into()).into());
    }
    let n = data.len();
    let d = data[0].len();
    if d == 0 {
        return Err(RagError::Clustering("zero-dimensional vectors".into()).into());
    }
    if k == 0 || k > n {
        return Err(
            RagError::Clustering(format!("cannot create {} clusters from {} items", k, n)).into(),
        );
    }

    let mut flat: Vec<f32> = Vec::with_capacity(n * d);
    for point in data {
        if point.len() != d {
            return Err(RagError::Clustering(format!(
                "dimension mismatch: expected {}, found {}",
                d,
                point.len()
            ))
            .into());
        }
        flat.extend_from_slice(point);
    }
    Array2::from_shape_vec((n, d), flat).map_err(|e| RagError::Clustering(e.to_string()).into())
}

pub(crate) fn squared_distance(
    a: &ndarray::ArrayView1<'_, f32>,
    b: &ndarray::ArrayView1<'_, f32>,
) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

pub(crate) fn rows_to_vecs(m: &Array2<f32>) -> Vec<Vec<f32>> {
    m.rows().into_iter().map(|r| r.to_vec()).collect()
}
