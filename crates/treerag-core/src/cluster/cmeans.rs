//! Fuzzy c-means clustering (soft partitioning).
//!
//! Each vector holds a membership in every cluster; memberships of one
//! vector sum to 1. Iterates:
//!
//! ```text
//! c_j  = Σ_i u_ji^m · x_i / Σ_i u_ji^m
//! u_ji = 1 / Σ_k (d_ji / d_ki)^(2 / (m - 1))
//! ```
//!
//! until the Frobenius norm of the membership change drops below `error`
//! or `max_iter` iterations have run. The crisp label of a vector is the
//! cluster with the highest membership.

use anyhow::Result;
use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::StdRng;

use super::{rows_to_vecs, squared_distance, to_matrix, ClusterResult, Clustering};
use crate::error::RagError;

/// Distances are floored here to keep the membership update finite when a
/// vector sits exactly on a center.
const MIN_DISTANCE: f32 = 1e-10;

/// Fuzzy c-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct FuzzyCMeans {
    c: usize,
    m: f32,
    error: f32,
    max_iter: usize,
    seed: u64,
}

impl FuzzyCMeans {
    pub fn new(c: usize) -> Self {
        Self {
            c,
            m: 2.0,
            error: 0.005,
            max_iter: 100,
            seed: 0,
        }
    }

    /// Fuzziness exponent `m` (> 1). Larger values blur the partition.
    pub fn with_fuzziness(mut self, m: f32) -> Self {
        self.m = m;
        self
    }

    pub fn with_error(mut self, error: f32) -> Self {
        self.error = error;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Random `c × n` membership matrix with columns summing to 1.
    fn init_membership(&self, n: usize, rng: &mut StdRng) -> Array2<f32> {
        let mut u = Array2::<f32>::zeros((self.c, n));
        for i in 0..n {
            let mut col: Vec<f32> = (0..self.c).map(|_| rng.random::<f32>() + 1e-3).collect();
            let total: f32 = col.iter().sum();
            for (j, v) in col.iter_mut().enumerate() {
                *v /= total;
                u[[j, i]] = *v;
            }
        }
        u
    }

    fn centers(&self, data: &Array2<f32>, u: &Array2<f32>) -> Array2<f32> {
        let um = u.mapv(|v| v.powf(self.m));
        let mut centers = um.dot(data);
        for (j, mut row) in centers.rows_mut().into_iter().enumerate() {
            let weight: f32 = um.row(j).sum();
            if weight > 0.0 {
                row /= weight;
            }
        }
        centers
    }

    fn membership(&self, data: &Array2<f32>, centers: &Array2<f32>) -> Array2<f32> {
        let n = data.nrows();
        let exponent = 1.0 / (self.m - 1.0);
        let mut u = Array2::<f32>::zeros((self.c, n));
        for i in 0..n {
            let point = data.row(i);
            // Squared distances, so the exponent is 1/(m-1) rather than 2/(m-1).
            let dists: Vec<f32> = (0..self.c)
                .map(|j| squared_distance(&point, &centers.row(j)).max(MIN_DISTANCE))
                .collect();
            for j in 0..self.c {
                let denom: f32 = dists
                    .iter()
                    .map(|&dk| (dists[j] / dk).powf(exponent))
                    .sum();
                u[[j, i]] = 1.0 / denom;
            }
        }
        u
    }
}

impl Clustering for FuzzyCMeans {
    fn fit(&self, data: &[Vec<f32>]) -> Result<ClusterResult> {
        if self.m.is_nan() || self.m <= 1.0 {
            return Err(RagError::Configuration(format!(
                "fuzziness must be > 1, got {}",
                self.m
            ))
            .into());
        }
        let data = to_matrix(data, self.c)?;
        let n = data.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut u = self.init_membership(n, &mut rng);
        let mut centers = self.centers(&data, &u);

        for _ in 0..self.max_iter {
            let next = self.membership(&data, &centers);
            let change: f32 = (&next - &u).mapv(|v| v * v).sum().sqrt();
            u = next;
            centers = self.centers(&data, &u);
            if change < self.error {
                break;
            }
        }

        let assignment = (0..n)
            .map(|i| {
                let mut best = 0;
                for j in 1..self.c {
                    if u[[j, i]] > u[[best, i]] {
                        best = j;
                    }
                }
                best
            })
            .collect();

        Ok(ClusterResult {
            centers: rows_to_vecs(&centers),
            assignment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmeans_separates_blobs() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.1],
            vec![0.1, 0.2],
            vec![8.0, 8.0],
            vec![8.2, 8.1],
            vec![8.1, 8.2],
        ];
        let result = FuzzyCMeans::new(2).with_seed(1).fit(&data).unwrap();
        let l = &result.assignment;
        assert!(l[0] == l[1] && l[1] == l[2]);
        assert!(l[3] == l[4] && l[4] == l[5]);
        assert_ne!(l[0], l[3]);
    }

    #[test]
    fn test_cmeans_centers_near_blob_means() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 0.0],
            vec![10.0, 1.0],
        ];
        let result = FuzzyCMeans::new(2).with_seed(5).fit(&data).unwrap();
        let left = &result.centers[result.assignment[0]];
        assert!((left[0] - 0.0).abs() < 0.5, "{:?}", left);
        assert!((left[1] - 0.5).abs() < 0.5, "{:?}", left);
    }

    #[test]
    fn test_cmeans_single_cluster() {
        let data = vec![vec![1.0], vec![2.0], vec![3.0]];
        let result = FuzzyCMeans::new(1).fit(&data).unwrap();
        assert_eq!(result.assignment, vec![0, 0, 0]);
        assert!((result.centers[0][0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_cmeans_deterministic_with_seed() {
        let data: Vec<Vec<f32>> = (0..30)
            .map(|i| vec![(i % 6) as f32, (i / 6) as f32])
            .collect();
        let a = FuzzyCMeans::new(3).with_seed(11).fit(&data).unwrap();
        let b = FuzzyCMeans::new(3).with_seed(11).fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cmeans_point_on_center_stays_finite() {
        let data = vec![vec![1.0, 1.0]; 4];
        let result = FuzzyCMeans::new(2).fit(&data).unwrap();
        assert!(result.centers.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cmeans_rejects_bad_fuzziness() {
        let data = vec![vec![0.0], vec![1.0]];
        assert!(FuzzyCMeans::new(2).with_fuzziness(1.0).fit(&data).is_err());
    }
}
