//! Engine traits shared by K-Means and the Gaussian mixture.

use crate::error::Result;

/// A cluster engine over document vectors.
pub trait Clustering {
    /// Fit on `data` and return one label in `0..n_clusters()` per row.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>>;

    /// Requested cluster count `k`.
    fn n_clusters(&self) -> usize;
}

/// An engine that also yields membership probabilities.
pub trait SoftClustering: Clustering {
    /// Fit on `data`; row `i` holds the posterior of each component for document `i`.
    fn fit_predict_proba(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f64>>>;
}

/// An engine that can be copied under another seed.
///
/// Bootstrap stability refits one configuration per resample, each with its
/// own seed.
pub trait Reseed: Clustering + Sized {
    /// Same configuration, new seed.
    fn reseed(&self, seed: u64) -> Self;
}
