//! K-means clustering (hard partitioning).
//!
//! 1. Seed `k` centroids with k-means++ from a fixed-seed RNG.
//! 2. **Assign** each vector to its nearest centroid (squared Euclidean).
//! 3. **Update** each centroid to the mean of its members.
//! 4. Repeat until centroids move less than `tol` or `max_iter` is reached.
//!
//! A centroid that loses all its members keeps its position. The final
//! assignment is recomputed against the final centroids, so a cluster may
//! come out empty; [`ClusterResult::groups`] drops it.

use anyhow::Result;
use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::StdRng;

use super::{rows_to_vecs, squared_distance, to_matrix, ClusterResult, Clustering};

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iter: usize,
    tol: f32,
    seed: u64,
}

impl KMeans {
    /// Create a k-means clusterer for `k` clusters (seed 0).
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            tol: 1e-4,
            seed: 0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Set the seed used for centroid initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// k-means++: first centroid uniform, the rest proportional to D(x)².
    fn init_centroids(&self, data: &Array2<f32>, rng: &mut StdRng) -> Array2<f32> {
        let n = data.nrows();
        let mut centroids = Array2::zeros((self.k, data.ncols()));

        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        for i in 1..self.k {
            let distances: Vec<f32> = (0..n)
                .map(|j| {
                    let point = data.row(j);
                    (0..i)
                        .map(|c| squared_distance(&point, &centroids.row(c)))
                        .fold(f32::MAX, f32::min)
                })
                .collect();

            let total: f32 = distances.iter().sum();
            if total == 0.0 {
                let idx = rng.random_range(0..n);
                centroids.row_mut(i).assign(&data.row(idx));
                continue;
            }

            let threshold = rng.random::<f32>() * total;
            let mut cumsum = 0.0;
            let mut selected = n - 1;
            for (j, &d) in distances.iter().enumerate() {
                cumsum += d;
                if cumsum >= threshold && d > 0.0 {
                    selected = j;
                    break;
                }
            }
            centroids.row_mut(i).assign(&data.row(selected));
        }

        centroids
    }

    fn assign(&self, data: &Array2<f32>, centroids: &Array2<f32>, labels: &mut [usize]) {
        for (i, label) in labels.iter_mut().enumerate() {
            let point = data.row(i);
            let mut best_cluster = 0;
            let mut best_dist = f32::MAX;
            for k in 0..self.k {
                let dist = squared_distance(&point, &centroids.row(k));
                if dist < best_dist {
                    best_dist = dist;
                    best_cluster = k;
                }
            }
            *label = best_cluster;
        }
    }
}

impl Clustering for KMeans {
    fn fit(&self, data: &[Vec<f32>]) -> Result<ClusterResult> {
        let data = to_matrix(data, self.k)?;
        let (n, d) = data.dim();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut centroids = self.init_centroids(&data, &mut rng);
        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iter {
            self.assign(&data, &centroids, &mut labels);

            let mut sums = Array2::<f32>::zeros((self.k, d));
            let mut counts = vec![0usize; self.k];
            for (i, &k) in labels.iter().enumerate() {
                let mut row = sums.row_mut(k);
                row += &data.row(i);
                counts[k] += 1;
            }

            let mut new_centroids = centroids.clone();
            for k in 0..self.k {
                if counts[k] > 0 {
                    let mean = &sums.row(k) / counts[k] as f32;
                    new_centroids.row_mut(k).assign(&mean);
                }
            }

            let shift: f32 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            centroids = new_centroids;

            if shift < self.tol {
                break;
            }
        }

        self.assign(&data, &centroids, &mut labels);

        Ok(ClusterResult {
            centers: rows_to_vecs(&centroids),
            assignment: labels,
        })
    }
}
