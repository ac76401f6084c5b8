//! Internal validity indices: Davies–Bouldin and Silhouette.
//!
//! Both read document vectors and labels only; no ground truth. Every distinct
//! label is one cluster, so a [`PERIPHERY`](crate::cluster::PERIPHERY) label is
//! scored as a single catch-all cluster.
//!
//! | Index | Range | Best |
//! |-------|-------|------|
//! | [`davies_bouldin`] | [0, ∞) | lower |
//! | [`silhouette`] | [-1, 1] | higher |

use std::collections::BTreeMap;

use crate::cluster::{relabel_periphery, PeripheryRule};
use crate::error::{Error, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

fn check(data: &[Vec<f32>], labels: &[usize]) -> Result<BTreeMap<usize, Vec<usize>>> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    if data.len() != labels.len() {
        return Err(Error::DimensionMismatch {
            expected: data.len(),
            found: labels.len(),
        });
    }
    let d = data[0].len();
    if let Some(bad) = data.iter().find(|p| p.len() != d) {
        return Err(Error::DimensionMismatch {
            expected: d,
            found: bad.len(),
        });
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate() {
        groups.entry(l).or_default().push(i);
    }
    if groups.len() < 2 {
        return Err(Error::InvalidParameter {
            name: "labels",
            message: "need at least two clusters",
        });
    }
    Ok(groups)
}

fn distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

fn distance_f64(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Davies–Bouldin index.
///
/// For cluster `i` with centroid `cᵢ` and dispersion `sᵢ` (mean distance of
/// members to `cᵢ`):
///
/// ```text
/// Rᵢⱼ = (sᵢ + sⱼ) / ||cᵢ - cⱼ||
/// DB  = mean over i of maxⱼ≠ᵢ Rᵢⱼ
/// ```
///
/// Two clusters sharing a centroid have `Rᵢⱼ = ∞` unless both have zero spread.
pub fn davies_bouldin(data: &[Vec<f32>], labels: &[usize]) -> Result<f64> {
    let groups = check(data, labels)?;
    let d = data[0].len();

    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(groups.len());
    let mut dispersion: Vec<f64> = Vec::with_capacity(groups.len());

    for members in groups.values() {
        let mut c = vec![0.0f64; d];
        for &i in members {
            for (cj, &x) in c.iter_mut().zip(&data[i]) {
                *cj += x as f64;
            }
        }
        let m = members.len() as f64;
        c.iter_mut().for_each(|v| *v /= m);

        let s = members
            .iter()
            .map(|&i| {
                let p: Vec<f64> = data[i].iter().map(|&x| x as f64).collect();
                distance_f64(&p, &c)
            })
            .sum::<f64>()
            / m;
        centroids.push(c);
        dispersion.push(s);
    }

    let k = centroids.len();
    let mut total = 0.0;
    for i in 0..k {
        let mut worst = 0.0f64;
        for j in 0..k {
            if i == j {
                continue;
            }
            let spread = dispersion[i] + dispersion[j];
            let sep = distance_f64(&centroids[i], &centroids[j]);
            let r = if sep > 0.0 {
                spread / sep
            } else if spread > 0.0 {
                f64::INFINITY
            } else {
                0.0
            };
            worst = worst.max(r);
        }
        total += worst;
    }
    Ok(total / k as f64)
}

/// Davies–Bouldin after moving clusters below the periphery threshold into
/// one catch-all cluster.
///
/// `k` is the number of clusters the labels were drawn from.
pub fn davies_bouldin_with_periphery(
    data: &[Vec<f32>],
    labels: &[usize],
    k: usize,
    rule: &PeripheryRule,
) -> Result<f64> {
    davies_bouldin(data, &relabel_periphery(labels, k, rule))
}

/// Silhouette coefficient of every point.
///
/// `s = (b - a) / max(a, b)` with `a` the mean distance to the rest of the
/// point's own cluster and `b` the smallest mean distance to another cluster.
/// Points in singleton clusters score 0.
pub fn silhouette_samples(data: &[Vec<f32>], labels: &[usize]) -> Result<Vec<f64>> {
    let groups = check(data, labels)?;

    let score = |i: usize| -> f64 {
        let own = labels[i];
        let mut a = 0.0;
        let mut b = f64::INFINITY;
        for (&label, members) in &groups {
            if label == own {
                if members.len() < 2 {
                    return 0.0;
                }
                let sum: f64 = members.iter().map(|&j| distance(&data[i], &data[j])).sum();
                a = sum / (members.len() - 1) as f64;
            } else {
                let sum: f64 = members.iter().map(|&j| distance(&data[i], &data[j])).sum();
                b = b.min(sum / members.len() as f64);
            }
        }
        let denom = a.max(b);
        if denom > 0.0 {
            (b - a) / denom
        } else {
            0.0
        }
    };

    #[cfg(feature = "parallel")]
    let scores = (0..data.len()).into_par_iter().map(score).collect();

    #[cfg(not(feature = "parallel"))]
    let scores = (0..data.len()).map(score).collect();

    Ok(scores)
}

/// Mean silhouette coefficient.
pub fn silhouette(data: &[Vec<f32>], labels: &[usize]) -> Result<f64> {
    let samples = silhouette_samples(data, labels)?;
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

#[cfg(test)]
pub(crate) mod blobs {
    use rand::prelude::*;
    use rand_distr::Normal;

    /// `per_cluster` points around each of `centers`, with standard deviation `sd`.
    pub fn gaussian_blobs(
        centers: &[Vec<f32>],
        per_cluster: usize,
        sd: f32,
        seed: u64,
    ) -> (Vec<Vec<f32>>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0f32, sd).unwrap();
        let mut data = Vec::new();
        let mut truth = Vec::new();
        for (c, center) in centers.iter().enumerate() {
            for _ in 0..per_cluster {
                data.push(center.iter().map(|&m| m + noise.sample(&mut rng)).collect());
                truth.push(c);
            }
        }
        (data, truth)
    }

    pub fn three_centers() -> Vec<Vec<f32>> {
        vec![vec![0.0, 0.0, 0.0], vec![10.0, 0.0, 0.0], vec![0.0, 10.0, 0.0]]
    }
}

#[cfg(test)]
mod tests {
    use super::blobs::*;
    use super::*;
    use crate::cluster::PERIPHERY;
    use rand::prelude::*;

    fn shuffled(labels: &[usize], seed: u64) -> Vec<usize> {
        let mut out = labels.to_vec();
        out.shuffle(&mut StdRng::seed_from_u64(seed));
        out
    }

    #[test]
    fn davies_bouldin_prefers_true_partition() {
        let (data, truth) = gaussian_blobs(&three_centers(), 40, 0.3, 1);
        let good = davies_bouldin(&data, &truth).unwrap();
        let bad = davies_bouldin(&data, &shuffled(&truth, 2)).unwrap();
        assert!(good < bad, "true {good} vs shuffled {bad}");
        assert!(good < 0.2);
    }

    #[test]
    fn davies_bouldin_hand_computed() {
        // Two clusters of two points, each spread 1 around its centroid, centroids 10 apart.
        let data = vec![vec![-1.0, 0.0], vec![1.0, 0.0], vec![9.0, 0.0], vec![11.0, 0.0]];
        let db = davies_bouldin(&data, &[0, 0, 1, 1]).unwrap();
        assert!((db - 0.2).abs() < 1e-9);
    }

    #[test]
    fn silhouette_high_on_blobs_near_zero_when_shuffled() {
        let (data, truth) = gaussian_blobs(&three_centers(), 40, 0.3, 3);
        let good = silhouette(&data, &truth).unwrap();
        let bad = silhouette(&data, &shuffled(&truth, 4)).unwrap();
        assert!(good > 0.5, "true partition scored {good}");
        assert!(bad < 0.1, "shuffled partition scored {bad}");
    }

    #[test]
    fn silhouette_samples_in_range_and_singletons_zero() {
        let data = vec![vec![0.0], vec![0.5], vec![9.0], vec![20.0]];
        let s = silhouette_samples(&data, &[0, 0, 1, 2]).unwrap();
        assert!(s.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(s[2], 0.0);
        assert_eq!(s[3], 0.0);
    }

    #[test]
    fn single_cluster_is_rejected() {
        let data = vec![vec![0.0], vec![1.0]];
        assert!(davies_bouldin(&data, &[0, 0]).is_err());
        assert!(silhouette(&data, &[3, 3]).is_err());
    }

    #[test]
    fn periphery_prepass_merges_tiny_clusters() {
        let (mut data, mut labels) = gaussian_blobs(&three_centers(), 30, 0.3, 5);
        // Two lone points far apart, each its own cluster.
        data.push(vec![5.0, 5.0, 5.0]);
        labels.push(3);
        data.push(vec![-5.0, 5.0, -5.0]);
        labels.push(4);

        let relabeled = relabel_periphery(&labels, 5, &PeripheryRule::new(0.25));
        assert_eq!(relabeled[90], PERIPHERY);
        assert_eq!(relabeled[91], PERIPHERY);

        let raw = davies_bouldin(&data, &labels).unwrap();
        let merged =
            davies_bouldin_with_periphery(&data, &labels, 5, &PeripheryRule::new(0.25)).unwrap();
        assert!(raw.is_finite() && merged.is_finite());
        assert_ne!(raw, merged);
    }
}
