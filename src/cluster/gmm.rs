//! Gaussian Mixture Model clustering.
//!
//! GMM provides **soft clustering** with probabilistic assignments; the hard
//! label of a document is its most responsible component.
//!
//! # The Probabilistic Model
//!
//! ```text
//! P(x) = Σₖ πₖ × N(x | μₖ, Σₖ)
//! ```
//!
//! # Covariance Structure
//!
//! | [`CovarianceType`] | Σₖ | Free parameters |
//! |---|---|---|
//! | `Diagonal` | per-component, diagonal | k·d |
//! | `Full` | per-component, full | k·d(d+1)/2 |
//! | `TiedDiagonal` | shared, diagonal | d |
//! | `TiedFull` | shared, full | d(d+1)/2 |
//!
//! With [`CovarianceSelection::Auto`] every structure is fitted and the one
//! with the lowest BIC (`-2·logL + p·ln n`) is kept.
//!
//! # The EM Algorithm
//!
//! **E-step**: responsibilities
//! ```text
//! γₙₖ = πₖ N(xₙ | μₖ, Σₖ) / Σⱼ πⱼ N(xₙ | μⱼ, Σⱼ)
//! ```
//!
//! **M-step**: weighted means, covariances and mixing weights.
//!
//! EM starts from a seeded K-means partition and stops once the mean
//! log-likelihood improves by less than `tol`.
//!
//! # Failure Modes
//!
//! - **Skewed partitions**: nothing forces equal sizes; a few components can
//!   absorb most points while others end up nearly empty
//! - **Singular covariance**: small clusters collapse; `reg_covar` is added to
//!   every diagonal, and a structure whose covariance still cannot be
//!   factorized is dropped from selection

use super::kmeans::Kmeans;
use super::traits::{Clustering, Reseed, SoftClustering};
use super::{check_k, to_matrix};
use crate::error::{Error, Result};
use crate::seed::derive_seed;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Covariance structure of the mixture components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceType {
    /// Per-component diagonal covariance.
    Diagonal,
    /// Per-component full covariance.
    Full,
    /// One diagonal covariance shared by all components.
    TiedDiagonal,
    /// One full covariance shared by all components.
    TiedFull,
}

impl CovarianceType {
    /// All structures, in selection order.
    pub const ALL: [CovarianceType; 4] = [
        CovarianceType::Diagonal,
        CovarianceType::Full,
        CovarianceType::TiedDiagonal,
        CovarianceType::TiedFull,
    ];

    /// Free covariance parameters for `k` components in `d` dimensions.
    fn n_parameters(self, k: usize, d: usize) -> usize {
        let full = d * (d + 1) / 2;
        match self {
            CovarianceType::Diagonal => k * d,
            CovarianceType::Full => k * full,
            CovarianceType::TiedDiagonal => d,
            CovarianceType::TiedFull => full,
        }
    }
}

/// Fixed covariance structure, or BIC selection across all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceSelection {
    /// Fit every [`CovarianceType`] and keep the lowest BIC.
    #[default]
    Auto,
    /// Use this structure only.
    Fixed(CovarianceType),
}

/// Gaussian Mixture Model clustering.
#[derive(Debug, Clone)]
pub struct Gmm {
    /// Number of components (clusters).
    n_components: usize,
    /// Maximum EM iterations.
    max_iter: usize,
    /// Convergence tolerance on mean log-likelihood gain.
    tol: f64,
    /// Random seed.
    seed: Option<u64>,
    /// Regularization for covariance.
    reg_covar: f64,
    /// Covariance structure.
    covariance: CovarianceSelection,
}

/// Result of a GMM fit.
#[derive(Debug, Clone)]
pub struct GmmFit {
    /// Most responsible component per point.
    pub labels: Vec<usize>,
    /// Responsibilities, `n × k`; rows sum to 1.
    pub responsibilities: Array2<f64>,
    /// Mixing weights.
    pub weights: Array1<f64>,
    /// Component means, `k × d`.
    pub means: Array2<f64>,
    /// Covariance structure of this fit.
    pub covariance_type: CovarianceType,
    /// Total log-likelihood of the data.
    pub log_likelihood: f64,
    /// Bayesian information criterion (lower is better).
    pub bic: f64,
    /// EM iterations performed.
    pub n_iter: usize,
    /// Whether EM met `tol` before `max_iter`.
    pub converged: bool,
}

impl GmmFit {
    /// Number of points per component.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.weights.len()];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }
}

/// Component covariances in whichever structure is being fitted.
#[derive(Debug, Clone)]
enum Covariances {
    /// `k × d` variances.
    Diagonal(Array2<f64>),
    /// `k` matrices of `d × d`.
    Full(Vec<Array2<f64>>),
    /// `d` shared variances.
    TiedDiagonal(Array1<f64>),
    /// One shared `d × d` matrix.
    TiedFull(Array2<f64>),
}

/// Everything needed to evaluate one component's log-density.
enum Density {
    Diagonal { var: Array1<f64>, log_det: f64 },
    Cholesky { lower: Array2<f64>, log_det: f64 },
}

struct Params {
    weights: Array1<f64>,
    means: Array2<f64>,
    covariances: Covariances,
}

impl Gmm {
    /// Create a new GMM with specified number of components.
    pub fn new() -> Self {
        Self {
            n_components: 8,
            max_iter: 100,
            tol: 1e-3,
            seed: None,
            reg_covar: 1e-6,
            covariance: CovarianceSelection::Auto,
        }
    }

    /// Set number of components.
    pub fn with_n_components(mut self, n: usize) -> Self {
        self.n_components = n;
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

    /// Set covariance regularization.
    pub fn with_reg_covar(mut self, reg: f64) -> Self {
        self.reg_covar = reg;
        self
    }

    /// Set covariance structure.
    pub fn with_covariance(mut self, covariance: CovarianceSelection) -> Self {
        self.covariance = covariance;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit, selecting the covariance structure if configured to.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<GmmFit> {
        check_k(data, self.n_components)?;
        let x = to_matrix(data)?.mapv(|v| v as f64);

        let root = match self.seed {
            Some(s) => s,
            None => rand::random(),
        };
        let init = Kmeans::new(self.n_components)
            .with_restarts(5)
            .with_seed(derive_seed(root, 0))
            .fit(data)?;

        let candidates: &[CovarianceType] = match &self.covariance {
            CovarianceSelection::Auto => &CovarianceType::ALL,
            CovarianceSelection::Fixed(c) => std::slice::from_ref(c),
        };

        let mut best: Option<GmmFit> = None;
        let mut last_err = Error::NotPositiveDefinite;
        for &ctype in candidates {
            match self.fit_structure(&x, &init.labels, ctype) {
                Ok(fit) => {
                    tracing::debug!(
                        k = self.n_components,
                        covariance = ?ctype,
                        bic = fit.bic,
                        log_likelihood = fit.log_likelihood,
                        n_iter = fit.n_iter,
                        converged = fit.converged,
                        "gmm candidate"
                    );
                    if best.as_ref().map_or(true, |b| fit.bic < b.bic) {
                        best = Some(fit);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        k = self.n_components,
                        covariance = ?ctype,
                        error = %e,
                        "gmm candidate dropped"
                    );
                    last_err = e;
                }
            }
        }

        let best = best.ok_or(last_err)?;
        tracing::debug!(
            k = self.n_components,
            covariance = ?best.covariance_type,
            bic = best.bic,
            sizes = ?best.sizes(),
            "gmm fit"
        );
        Ok(best)
    }

    /// EM for one covariance structure, starting from hard `init` labels.
    fn fit_structure(
        &self,
        x: &Array2<f64>,
        init: &[usize],
        ctype: CovarianceType,
    ) -> Result<GmmFit> {
        let (n, d) = x.dim();
        let k = self.n_components;

        // Near one-hot start; the small floor keeps every component non-empty.
        let floor = 1e-6;
        let mut resp = Array2::from_elem((n, k), floor / k as f64);
        for (i, &l) in init.iter().enumerate() {
            resp[[i, l]] += 1.0 - floor;
        }

        let mut params = self.m_step(x, &resp, ctype, None);
        let mut prev_ll = f64::NEG_INFINITY;
        let mut mean_ll = f64::NEG_INFINITY;
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            mean_ll = self.e_step(x, &params, &mut resp)?;
            n_iter = iter + 1;
            if (mean_ll - prev_ll).abs() < self.tol {
                converged = true;
                break;
            }
            prev_ll = mean_ll;
            params = self.m_step(x, &resp, ctype, Some(&params));
        }
        if !converged {
            // Responsibilities must describe the returned parameters.
            mean_ll = self.e_step(x, &params, &mut resp)?;
        }

        let log_likelihood = mean_ll * n as f64;
        let n_params = k * d + (k - 1) + ctype.n_parameters(k, d);
        let bic = -2.0 * log_likelihood + n_params as f64 * (n as f64).ln();

        let labels = resp
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
            .collect();

        Ok(GmmFit {
            labels,
            responsibilities: resp,
            weights: params.weights,
            means: params.means,
            covariance_type: ctype,
            log_likelihood,
            bic,
            n_iter,
            converged,
        })
    }

    /// Fill `resp`; returns the mean log-likelihood.
    fn e_step(&self, x: &Array2<f64>, params: &Params, resp: &mut Array2<f64>) -> Result<f64> {
        let (n, d) = x.dim();
        let k = params.weights.len();
        let densities = Self::densities(&params.covariances, k, d)?;
        let log_weights = params.weights.mapv(f64::ln);

        let mut total = 0.0;
        let mut log_probs = vec![0.0; k];
        for i in 0..n {
            let point = x.row(i);
            for c in 0..k {
                let mean = params.means.row(c);
                log_probs[c] = log_weights[c] + Self::log_gaussian(&point, &mean, &densities[c]);
            }
            let log_sum = Self::logsumexp(&log_probs);
            for c in 0..k {
                resp[[i, c]] = (log_probs[c] - log_sum).exp();
            }
            total += log_sum;
        }
        if !total.is_finite() {
            return Err(Error::Other("non-finite mixture log-likelihood".into()));
        }
        Ok(total / n as f64)
    }

    fn m_step(
        &self,
        x: &Array2<f64>,
        resp: &Array2<f64>,
        ctype: CovarianceType,
        prev: Option<&Params>,
    ) -> Params {
        let (n, d) = x.dim();
        let k = resp.ncols();
        let nk: Array1<f64> = resp.sum_axis(Axis(0)) + 10.0 * f64::EPSILON;
        let weights = &nk / n as f64;

        let mut means = resp.t().dot(x);
        for c in 0..k {
            if nk[c] > 1e-10 {
                means.row_mut(c).mapv_inplace(|v| v / nk[c]);
            } else if let Some(p) = prev {
                means.row_mut(c).assign(&p.means.row(c));
            }
        }

        // Weighted scatter of component c around its mean, unnormalized.
        let scatter = |c: usize| -> Array2<f64> {
            let diff = x - &means.row(c).insert_axis(Axis(0));
            let weighted = &diff * &resp.column(c).insert_axis(Axis(1));
            weighted.t().dot(&diff)
        };
        let diag_scatter = |c: usize| -> Array1<f64> {
            let diff = x - &means.row(c).insert_axis(Axis(0));
            (&diff * &diff * &resp.column(c).insert_axis(Axis(1))).sum_axis(Axis(0))
        };
        let reg = self.reg_covar;
        let regularize = |mut m: Array2<f64>| {
            for j in 0..d {
                m[[j, j]] += reg;
            }
            m
        };

        let covariances = match ctype {
            CovarianceType::Diagonal => {
                let mut var = Array2::zeros((k, d));
                for c in 0..k {
                    match prev {
                        Some(Params {
                            covariances: Covariances::Diagonal(p),
                            ..
                        }) if nk[c] <= 1e-10 => var.row_mut(c).assign(&p.row(c)),
                        _ => var
                            .row_mut(c)
                            .assign(&(diag_scatter(c) / nk[c] + reg)),
                    }
                }
                Covariances::Diagonal(var)
            }
            CovarianceType::Full => Covariances::Full(
                (0..k)
                    .map(|c| match prev {
                        Some(Params {
                            covariances: Covariances::Full(p),
                            ..
                        }) if nk[c] <= 1e-10 => p[c].clone(),
                        _ => regularize(scatter(c) / nk[c]),
                    })
                    .collect(),
            ),
            CovarianceType::TiedDiagonal => {
                let mut var = Array1::<f64>::zeros(d);
                for c in 0..k {
                    var += &diag_scatter(c);
                }
                Covariances::TiedDiagonal(var / n as f64 + reg)
            }
            CovarianceType::TiedFull => {
                let mut cov = Array2::<f64>::zeros((d, d));
                for c in 0..k {
                    cov += &scatter(c);
                }
                Covariances::TiedFull(regularize(cov / n as f64))
            }
        };

        Params {
            weights,
            means,
            covariances,
        }
    }

    fn densities(cov: &Covariances, k: usize, d: usize) -> Result<Vec<Density>> {
        let diag = |var: Array1<f64>| Density::Diagonal {
            log_det: var.iter().map(|v| v.ln()).sum(),
            var,
        };
        let chol = |m: &Array2<f64>| -> Result<Density> {
            let lower = cholesky(m).ok_or(Error::NotPositiveDefinite)?;
            let log_det = 2.0 * (0..d).map(|j| lower[[j, j]].ln()).sum::<f64>();
            Ok(Density::Cholesky { lower, log_det })
        };

        match cov {
            Covariances::Diagonal(var) => {
                Ok(var.rows().into_iter().map(|r| diag(r.to_owned())).collect())
            }
            Covariances::TiedDiagonal(var) => Ok((0..k).map(|_| diag(var.clone())).collect()),
            Covariances::Full(ms) => ms.iter().map(chol).collect(),
            Covariances::TiedFull(m) => {
                let shared = chol(m)?;
                let Density::Cholesky { lower, log_det } = shared else {
                    return Err(Error::NotPositiveDefinite);
                };
                Ok((0..k)
                    .map(|_| Density::Cholesky {
                        lower: lower.clone(),
                        log_det,
                    })
                    .collect())
            }
        }
    }

    /// Compute log-likelihood of a point under a Gaussian.
    fn log_gaussian(
        point: &ArrayView1<'_, f64>,
        mean: &ArrayView1<'_, f64>,
        density: &Density,
    ) -> f64 {
        let d = point.len();
        let base = -0.5 * d as f64 * (2.0 * std::f64::consts::PI).ln();

        match density {
            Density::Diagonal { var, log_det } => {
                let maha: f64 = (0..d)
                    .map(|i| {
                        let diff = point[i] - mean[i];
                        diff * diff / var[i]
                    })
                    .sum();
                base - 0.5 * (log_det + maha)
            }
            Density::Cholesky { lower, log_det } => {
                // Solve L z = (x - μ); the Mahalanobis distance is |z|².
                let mut z = vec![0.0; d];
                for i in 0..d {
                    let mut acc = point[i] - mean[i];
                    for j in 0..i {
                        acc -= lower[[i, j]] * z[j];
                    }
                    z[i] = acc / lower[[i, i]];
                }
                let maha: f64 = z.iter().map(|v| v * v).sum();
                base - 0.5 * (log_det + maha)
            }
        }
    }

    /// Log-sum-exp for numerical stability.
    fn logsumexp(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NEG_INFINITY;
        }
        let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max_val.is_infinite() {
            return max_val;
        }
        max_val
            + values
                .iter()
                .map(|&v| (v - max_val).exp())
                .sum::<f64>()
                .ln()
    }
}

/// Lower Cholesky factor of a symmetric matrix, `None` if not positive definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let d = a.nrows();
    let mut l = Array2::<f64>::zeros((d, d));
    for i in 0..d {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for p in 0..j {
                sum -= l[[i, p]] * l[[j, p]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

impl Default for Gmm {
    fn default() -> Self {
        Self::new()
    }
}

impl Clustering for Gmm {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.n_components
    }
}

impl SoftClustering for Gmm {
    fn fit_predict_proba(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f64>>> {
        let fit = self.fit(data)?;
        Ok(fit
            .responsibilities
            .rows()
            .into_iter()
            .map(|r| r.to_vec())
            .collect())
    }
}

impl Reseed for Gmm {
    fn reseed(&self, seed: u64) -> Self {
        self.clone().with_seed(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Vec<Vec<f32>> {
        let mut data = Vec::new();
        for i in 0..20 {
            let t = (i as f32) * 0.01;
            let jitter = ((i * 7) % 5) as f32 * 0.02;
            data.push(vec![t, jitter - t]);
            data.push(vec![10.0 + jitter, 10.0 - t * 2.0]);
        }
        data
    }

    #[test]
    fn test_gmm_basic() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
        ];

        let gmm = Gmm::new().with_n_components(2).with_seed(42);
        let labels = gmm.fit_predict(&data).unwrap();

        // Should find 2 clusters
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_gmm_soft_assignments() {
        let data = vec![
            vec![0.0, 0.0],
            vec![5.0, 5.0], // Point between clusters
            vec![10.0, 10.0],
        ];

        let gmm = Gmm::new().with_n_components(2).with_seed(42);
        let probs = gmm.fit_predict_proba(&data).unwrap();

        // Each row should sum to ~1
        for row in &probs {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn stopping_at_max_iter_is_not_convergence() {
        let data = two_blobs();
        let short = Gmm::new().with_n_components(2).with_max_iter(1).with_seed(3);
        let fit = short.fit(&data).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.n_iter, 1);
        assert_eq!(fit.labels.len(), data.len());

        let full = short.with_max_iter(200).fit(&data).unwrap();
        assert!(full.converged);
    }

    #[test]
    fn every_structure_separates_blobs() {
        let data = two_blobs();
        for ctype in CovarianceType::ALL {
            let fit = Gmm::new()
                .with_n_components(2)
                .with_covariance(CovarianceSelection::Fixed(ctype))
                .with_seed(3)
                .fit(&data)
                .unwrap();
            assert_eq!(fit.covariance_type, ctype);
            let first = fit.labels[0];
            for (i, &l) in fit.labels.iter().enumerate() {
                assert_eq!(l == first, i % 2 == 0, "{ctype:?} mislabels point {i}");
            }
            assert!((fit.weights.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn auto_selects_lowest_bic() {
        let data = two_blobs();
        let auto = Gmm::new().with_n_components(2).with_seed(5).fit(&data).unwrap();
        for ctype in CovarianceType::ALL {
            let fixed = Gmm::new()
                .with_n_components(2)
                .with_covariance(CovarianceSelection::Fixed(ctype))
                .with_seed(5)
                .fit(&data)
                .unwrap();
            assert!(auto.bic <= fixed.bic + 1e-9);
        }
    }

    #[test]
    fn same_seed_same_fit() {
        let data = two_blobs();
        let a = Gmm::new().with_n_components(3).with_seed(8).fit(&data).unwrap();
        let b = Gmm::new().with_n_components(3).with_seed(8).fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.bic, b.bic);
    }

    #[test]
    fn k_exceeding_distinct_vectors_is_insufficient_data() {
        let data = vec![vec![1.0, 2.0]; 5];
        assert!(matches!(
            Gmm::new().with_n_components(2).fit(&data),
            Err(Error::InsufficientData {
                requested: 2,
                distinct: 1
            })
        ));
    }

    #[test]
    fn cholesky_matches_known_factor() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        assert!((l[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((l[[1, 0]] - 1.0).abs() < 1e-12);
        assert!((l[[1, 1]] - 2.0f64.sqrt()).abs() < 1e-12);
        assert!(cholesky(&array![[1.0, 2.0], [2.0, 1.0]]).is_none());
    }

    #[test]
    fn full_and_diagonal_agree_on_axis_aligned_density() {
        let point = array![1.0, -1.0];
        let mean = array![0.0, 0.0];
        let var = array![2.0, 0.5];
        let diag = Density::Diagonal {
            log_det: var.iter().map(|v: &f64| v.ln()).sum(),
            var: var.clone(),
        };
        let lower = cholesky(&array![[2.0, 0.0], [0.0, 0.5]]).unwrap();
        let full = Density::Cholesky {
            log_det: 2.0 * (lower[[0, 0]].ln() + lower[[1, 1]].ln()),
            lower,
        };
        let a = Gmm::log_gaussian(&point.view(), &mean.view(), &diag);
        let b = Gmm::log_gaussian(&point.view(), &mean.view(), &full);
        assert!((a - b).abs() < 1e-12);
    }
}
