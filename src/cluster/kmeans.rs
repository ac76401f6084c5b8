//! K-means clustering.
//!
//! Partitions document vectors into k clusters by minimizing **within-cluster
//! sum of squares** (WCSS, "inertia"):
//!
//! ```text
//! WCSS = Σₖ Σᵢ∈Cₖ ||xᵢ - μₖ||²
//! ```
//!
//! # Lloyd's Algorithm
//!
//! 1. Initialize k centroids via k-means++
//! 2. **Assign**: Each point → nearest centroid (Euclidean)
//! 3. **Update**: Each centroid → mean of assigned points
//! 4. Repeat until no assignment changes, the centroid shift drops below
//!    `tol`, or `max_iter` is reached
//!
//! Lloyd finds a local minimum only, so the whole procedure is restarted
//! `n_init` times and the restart with the lowest inertia wins.
//!
//! # Failure Modes
//!
//! - **Outliers**: every point pulls its centroid, however far away it is
//! - **Unequal clusters**: assumes roughly spherical, similarly sized clusters
//! - **Empty clusters**: a centroid that loses all its points is moved to a
//!   random data point; if it is still empty at the end it is reported in
//!   [`KmeansFit::empty_clusters`]

use super::traits::{Clustering, Reseed};
use super::{check_k, to_matrix};
use crate::error::Result;
use crate::seed::derive_seed;
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Random restarts; the lowest-inertia one is kept.
    n_init: usize,
    /// Maximum Lloyd iterations per restart.
    max_iter: usize,
    /// Convergence tolerance on squared centroid shift.
    tol: f64,
    /// Random seed.
    seed: Option<u64>,
}

/// Result of a K-means fit.
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// Cluster label per input point, in `0..k`.
    pub labels: Vec<usize>,
    /// Final centroids, `k × d`.
    pub centroids: Array2<f32>,
    /// Sum of squared distances to assigned centroids.
    pub inertia: f64,
    /// Lloyd iterations of the winning restart.
    pub n_iter: usize,
    /// Whether the winning restart stabilized before `max_iter`.
    pub converged: bool,
    /// Clusters with no points.
    pub empty_clusters: Vec<usize>,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_init: 25,
            max_iter: 30,
            tol: 1e-4,
            seed: None,
        }
    }

    /// Set number of random restarts.
    pub fn with_restarts(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit and return labels, centroids and diagnostics.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<KmeansFit> {
        check_k(data, self.k)?;
        let data_arr = to_matrix(data)?;

        let root = match self.seed {
            Some(s) => s,
            None => rand::rng().random(),
        };
        let seeds: Vec<u64> = (0..self.n_init as u64)
            .map(|r| derive_seed(root, r))
            .collect();

        #[cfg(feature = "parallel")]
        let fits: Vec<KmeansFit> = seeds
            .par_iter()
            .map(|&s| self.run_once(&data_arr, &mut StdRng::seed_from_u64(s)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let fits: Vec<KmeansFit> = seeds
            .iter()
            .map(|&s| self.run_once(&data_arr, &mut StdRng::seed_from_u64(s)))
            .collect();

        // Strict `<` keeps the earliest restart on ties, independent of scheduling.
        let mut best: Option<KmeansFit> = None;
        for fit in fits {
            match &best {
                Some(b) if b.inertia <= fit.inertia => {}
                _ => best = Some(fit),
            }
        }
        let best = best.ok_or(crate::error::Error::EmptyInput)?;

        tracing::debug!(
            k = self.k,
            restarts = self.n_init,
            inertia = best.inertia,
            n_iter = best.n_iter,
            converged = best.converged,
            "kmeans fit"
        );
        if !best.empty_clusters.is_empty() {
            tracing::warn!(k = self.k, empty = ?best.empty_clusters, "kmeans left empty clusters");
        }

        Ok(best)
    }

    /// One Lloyd run from a k-means++ start.
    fn run_once(&self, data: &Array2<f32>, rng: &mut impl Rng) -> KmeansFit {
        let n = data.nrows();
        let mut centroids = self.init_centroids(data, rng);
        let mut labels = vec![usize::MAX; n];
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            let changed = Self::assign(data, &centroids, &mut labels);
            n_iter = iter + 1;
            if changed == 0 {
                converged = true;
                break;
            }

            let new_centroids = self.update(data, &labels, rng);
            let shift: f32 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            centroids = new_centroids;

            if (shift as f64) < self.tol {
                Self::assign(data, &centroids, &mut labels);
                converged = true;
                break;
            }
        }
        if !converged {
            // Labels must describe the centroids we return.
            Self::assign(data, &centroids, &mut labels);
        }

        let inertia = labels
            .iter()
            .enumerate()
            .map(|(i, &c)| Self::squared_distance(&data.row(i), &centroids.row(c)) as f64)
            .sum();

        let mut counts = vec![0usize; self.k];
        for &c in &labels {
            counts[c] += 1;
        }
        let empty_clusters = counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == 0)
            .map(|(k, _)| k)
            .collect();

        KmeansFit {
            labels,
            centroids,
            inertia,
            n_iter,
            converged,
            empty_clusters,
        }
    }

    /// Initialize centroids using k-means++ algorithm.
    fn init_centroids(&self, data: &Array2<f32>, rng: &mut impl Rng) -> Array2<f32> {
        let n = data.nrows();
        let d = data.ncols();
        let mut centroids = Array2::zeros((self.k, d));

        // First centroid: random point
        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        // Squared distance from each point to its nearest chosen centroid.
        let mut nearest: Vec<f32> = (0..n)
            .map(|j| Self::squared_distance(&data.row(j), &centroids.row(0)))
            .collect();

        for i in 1..self.k {
            let total: f32 = nearest.iter().sum();
            let selected = if total == 0.0 {
                rng.random_range(0..n)
            } else {
                let threshold = rng.random::<f32>() * total;
                let mut cumsum = 0.0;
                let mut selected = n - 1;
                for (j, &dist) in nearest.iter().enumerate() {
                    cumsum += dist;
                    if cumsum >= threshold {
                        selected = j;
                        break;
                    }
                }
                selected
            };

            centroids.row_mut(i).assign(&data.row(selected));
            for (j, slot) in nearest.iter_mut().enumerate() {
                let dist = Self::squared_distance(&data.row(j), &centroids.row(i));
                if dist < *slot {
                    *slot = dist;
                }
            }
        }

        centroids
    }

    /// Assign each point to its nearest centroid; returns how many labels changed.
    fn assign(data: &Array2<f32>, centroids: &Array2<f32>, labels: &mut [usize]) -> usize {
        let mut changed = 0;
        for (i, label) in labels.iter_mut().enumerate() {
            let point = data.row(i);
            let mut best_cluster = 0;
            let mut best_dist = f32::MAX;

            for k in 0..centroids.nrows() {
                let dist = Self::squared_distance(&point, &centroids.row(k));
                if dist < best_dist {
                    best_dist = dist;
                    best_cluster = k;
                }
            }
            if *label != best_cluster {
                *label = best_cluster;
                changed += 1;
            }
        }
        changed
    }

    /// Recompute centroids as cluster means.
    fn update(&self, data: &Array2<f32>, labels: &[usize], rng: &mut impl Rng) -> Array2<f32> {
        let n = data.nrows();
        let d = data.ncols();
        let mut sums = Array2::<f64>::zeros((self.k, d));
        let mut counts = vec![0usize; self.k];

        for (i, &k) in labels.iter().enumerate() {
            for j in 0..d {
                sums[[k, j]] += data[[i, j]] as f64;
            }
            counts[k] += 1;
        }

        let mut centroids = Array2::zeros((self.k, d));
        for k in 0..self.k {
            if counts[k] > 0 {
                for j in 0..d {
                    centroids[[k, j]] = (sums[[k, j]] / counts[k] as f64) as f32;
                }
            } else {
                // Empty cluster: reinitialize randomly
                let idx = rng.random_range(0..n);
                centroids.row_mut(k).assign(&data.row(idx));
            }
        }
        centroids
    }

    /// Compute squared Euclidean distance.
    fn squared_distance(a: &ArrayView1<'_, f32>, b: &ArrayView1<'_, f32>) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

impl Reseed for Kmeans {
    fn reseed(&self, seed: u64) -> Self {
        self.clone().with_seed(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    #[test]
    fn test_kmeans_basic() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
        ];

        let kmeans = Kmeans::new(2).with_seed(42);
        let labels = kmeans.fit_predict(&data).unwrap();

        // Points 0,1 should be in same cluster, points 2,3 in another
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_kmeans_k_equals_n() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];

        let fit = Kmeans::new(3).with_seed(42).fit(&data).unwrap();

        let unique: std::collections::HashSet<_> = fit.labels.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(fit.inertia.abs() < 1e-12);
        assert!(fit.empty_clusters.is_empty());
    }

    #[test]
    fn test_kmeans_deterministic_with_seed() {
        let data: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![(i % 7) as f32, (i / 7) as f32 * 0.3])
            .collect();

        let a = Kmeans::new(4).with_seed(42).fit(&data).unwrap();
        let b = Kmeans::new(4).with_seed(42).fit(&data).unwrap();

        assert_eq!(a.labels, b.labels, "same seed should give same result");
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_kmeans_restarts_never_hurt() {
        let data: Vec<Vec<f32>> = (0..60)
            .map(|i| vec![((i * 37) % 11) as f32, ((i * 13) % 7) as f32])
            .collect();

        let one = Kmeans::new(5).with_restarts(1).with_seed(9).fit(&data).unwrap();
        let many = Kmeans::new(5).with_restarts(20).with_seed(9).fit(&data).unwrap();
        // Restart 0 shares its seed, so the best of 20 can only be as good or better.
        assert!(many.inertia <= one.inertia + 1e-9);
    }

    #[test]
    fn test_kmeans_converges_on_separated_data() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.0],
            vec![5.0, 5.0],
            vec![5.2, 5.0],
        ];
        let fit = Kmeans::new(2).with_seed(1).fit(&data).unwrap();
        assert!(fit.converged);
        assert!(fit.n_iter <= 30);
    }

    #[test]
    fn stopping_at_max_iter_is_not_convergence() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.0],
            vec![5.0, 5.0],
            vec![5.2, 5.0],
        ];
        // The first pass always moves a centroid off its seed point.
        let fit = Kmeans::new(2).with_max_iter(1).with_seed(1).fit(&data).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.n_iter, 1);
        assert_eq!(fit.labels.len(), 4);
    }

    #[test]
    fn test_kmeans_empty_input_error() {
        let data: Vec<Vec<f32>> = vec![];
        assert_eq!(Kmeans::new(2).fit(&data).unwrap_err(), Error::EmptyInput);
    }

    #[test]
    fn test_kmeans_k_exceeds_distinct_vectors() {
        // Four rows, two distinct vectors.
        let data = vec![
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![2.0, 2.0],
        ];
        assert_eq!(
            Kmeans::new(3).fit(&data).unwrap_err(),
            Error::InsufficientData {
                requested: 3,
                distinct: 2
            }
        );
    }

    proptest! {
        #[test]
        fn every_point_gets_exactly_one_label(
            points in proptest::collection::vec((-50i32..50, -50i32..50), 8..60),
            k in 1usize..6,
            seed in any::<u64>(),
        ) {
            let data: Vec<Vec<f32>> = points
                .iter()
                .map(|&(x, y)| vec![x as f32, y as f32])
                .collect();
            match Kmeans::new(k).with_restarts(3).with_seed(seed).fit(&data) {
                Ok(fit) => {
                    prop_assert_eq!(fit.labels.len(), data.len());
                    let mut seen = vec![false; k];
                    for &l in &fit.labels {
                        prop_assert!(l < k);
                        seen[l] = true;
                    }
                    for (c, present) in seen.iter().enumerate() {
                        prop_assert_eq!(!present, fit.empty_clusters.contains(&c));
                    }
                }
                Err(Error::InsufficientData { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }
    }
}
