//! External agreement between two labelings.
//!
//! Used to compare a cluster assignment with a generating or reference
//! partition, or two assignments with each other.
//!
//! | Metric | Range | Best |
//! |--------|-------|------|
//! | [`ari`] | [-1, 1] | 1 |
//! | [`nmi`] | [0, 1] | 1 |
//! | [`purity`] | (0, 1] | 1 |
//! | [`jaccard`] | [0, 1] | 1 |
//!
//! ```rust
//! use textclust::metrics::{ari, nmi};
//!
//! let pred = [1, 1, 0, 0, 2, 2];
//! let truth = [0, 0, 1, 1, 2, 2];
//! assert!((ari(&pred, &truth) - 1.0).abs() < 1e-12);
//! assert!((nmi(&pred, &truth) - 1.0).abs() < 1e-12);
//! ```
//!
//! Labels are compared as opaque ids; only co-membership matters. Both slices
//! must have the same length.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Joint label counts of two labelings.
#[derive(Debug, Clone)]
pub struct Contingency {
    cells: BTreeMap<(usize, usize), usize>,
    rows: BTreeMap<usize, usize>,
    cols: BTreeMap<usize, usize>,
    n: usize,
}

impl Contingency {
    /// Count label pairs `(a[i], b[i])`.
    pub fn new(a: &[usize], b: &[usize]) -> Self {
        debug_assert_eq!(a.len(), b.len());
        let mut cells = BTreeMap::new();
        let mut rows = BTreeMap::new();
        let mut cols = BTreeMap::new();
        for (&x, &y) in a.iter().zip(b) {
            *cells.entry((x, y)).or_insert(0) += 1;
            *rows.entry(x).or_insert(0) += 1;
            *cols.entry(y).or_insert(0) += 1;
        }
        let n = a.len().min(b.len());
        Self {
            cells,
            rows,
            cols,
            n,
        }
    }

    /// Number of labeled points.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Points labeled `x` in the first labeling and `y` in the second.
    pub fn count(&self, x: usize, y: usize) -> usize {
        self.cells.get(&(x, y)).copied().unwrap_or(0)
    }

    fn entropy(margins: &BTreeMap<usize, usize>, n: f64) -> f64 {
        margins
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln()
            })
            .sum()
    }

    fn mutual_information(&self) -> f64 {
        let n = self.n as f64;
        self.cells
            .iter()
            .map(|(&(x, y), &c)| {
                let pxy = c as f64 / n;
                let px = self.rows[&x] as f64 / n;
                let py = self.cols[&y] as f64 / n;
                pxy * (pxy / (px * py)).ln()
            })
            .sum()
    }
}

fn pairs(c: usize) -> f64 {
    let c = c as f64;
    c * (c - 1.0) / 2.0
}

/// Adjusted Rand index (Hubert & Arabie).
///
/// 1 for identical partitions up to relabeling, about 0 for independent ones.
/// Two partitions that each put every point in one cluster score 1.
pub fn ari(pred: &[usize], truth: &[usize]) -> f64 {
    let table = Contingency::new(pred, truth);
    if table.n < 2 {
        return 1.0;
    }
    let index: f64 = table.cells.values().map(|&c| pairs(c)).sum();
    let sum_rows: f64 = table.rows.values().map(|&c| pairs(c)).sum();
    let sum_cols: f64 = table.cols.values().map(|&c| pairs(c)).sum();
    let expected = sum_rows * sum_cols / pairs(table.n);
    let max = (sum_rows + sum_cols) / 2.0;
    if (max - expected).abs() < f64::EPSILON {
        return 1.0;
    }
    (index - expected) / (max - expected)
}

/// Normalized mutual information, `2 I(U;V) / (H(U) + H(V))`.
pub fn nmi(pred: &[usize], truth: &[usize]) -> f64 {
    let table = Contingency::new(pred, truth);
    if table.n == 0 {
        return 1.0;
    }
    let n = table.n as f64;
    let h = Contingency::entropy(&table.rows, n) + Contingency::entropy(&table.cols, n);
    if h <= 0.0 {
        return 1.0;
    }
    (2.0 * table.mutual_information() / h).clamp(0.0, 1.0)
}

/// Fraction of points in the majority true class of their predicted cluster.
pub fn purity(pred: &[usize], truth: &[usize]) -> f64 {
    let table = Contingency::new(pred, truth);
    if table.n == 0 {
        return 0.0;
    }
    let mut best: BTreeMap<usize, usize> = BTreeMap::new();
    for (&(x, _), &c) in &table.cells {
        let slot = best.entry(x).or_insert(0);
        *slot = (*slot).max(c);
    }
    best.values().sum::<usize>() as f64 / table.n as f64
}

/// Jaccard similarity `|A ∩ B| / |A ∪ B|` of two strictly ascending id lists;
/// 0 when both are empty.
///
/// ```rust
/// use textclust::metrics::jaccard;
///
/// assert_eq!(jaccard(&[1, 2, 3], &[2, 3, 4]), 0.5);
/// ```
pub fn jaccard<T: Ord>(a: &[T], b: &[T]) -> f64 {
    debug_assert!(a.windows(2).all(|w| w[0] < w[1]));
    debug_assert!(b.windows(2).all(|w| w[0] < w[1]));
    let (mut i, mut j, mut inter) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                inter += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - inter;
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ari_hand_computed() {
        // Classic example: ARI = 0.24242...
        let pred = [0, 0, 0, 1, 1, 1];
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((ari(&pred, &truth) - 0.242_424_242).abs() < 1e-6);
    }

    #[test]
    fn ari_near_zero_for_unrelated() {
        let pred: Vec<usize> = (0..400).map(|i| i % 4).collect();
        let truth: Vec<usize> = (0..400).map(|i| (i / 100) % 4).collect();
        assert!(ari(&pred, &truth).abs() < 0.05);
    }

    #[test]
    fn nmi_zero_for_independent_split() {
        let pred = [0, 1, 0, 1];
        let truth = [0, 0, 1, 1];
        assert!(nmi(&pred, &truth).abs() < 1e-12);
    }

    #[test]
    fn purity_counts_majorities() {
        let pred = [0, 0, 0, 1, 1];
        let truth = [0, 0, 1, 1, 1];
        assert!((purity(&pred, &truth) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn contingency_counts_pairs() {
        let t = Contingency::new(&[0, 0, 1], &[5, 6, 6]);
        assert_eq!(t.n(), 3);
        assert_eq!(t.count(0, 5), 1);
        assert_eq!(t.count(1, 6), 1);
        assert_eq!(t.count(1, 5), 0);
    }

    #[test]
    fn jaccard_of_sorted_lists() {
        assert_eq!(jaccard(&[1, 2, 3], &[2, 3, 4]), 0.5);
        assert_eq!(jaccard(&[1], &[2]), 0.0);
        assert_eq!(jaccard::<usize>(&[], &[]), 0.0);
        assert_eq!(jaccard(&[0, 5, 9], &[0, 5, 9]), 1.0);
    }

    proptest! {
        #[test]
        fn relabeling_keeps_agreement(
            labels in prop::collection::vec(0usize..5, 2..60),
            shift in 1usize..7,
        ) {
            let renamed: Vec<usize> = labels.iter().map(|&l| (l + shift) * 3).collect();
            prop_assert!((ari(&labels, &renamed) - 1.0).abs() < 1e-9);
            prop_assert!((nmi(&labels, &renamed) - 1.0).abs() < 1e-9);
            prop_assert!((purity(&renamed, &labels) - 1.0).abs() < 1e-12);
        }

        #[test]
        fn scores_stay_in_range(
            a in prop::collection::vec(0usize..4, 30),
            b in prop::collection::vec(0usize..4, 30),
        ) {
            let s = ari(&a, &b);
            prop_assert!((-1.0..=1.0 + 1e-12).contains(&s));
            let m = nmi(&a, &b);
            prop_assert!((0.0..=1.0).contains(&m));
            prop_assert!(ari(&a, &b) == ari(&b, &a));
        }

        #[test]
        fn jaccard_matches_set_definition(
            a in prop::collection::btree_set(0usize..30, 0..20),
            b in prop::collection::btree_set(0usize..30, 0..20),
        ) {
            let union = a.union(&b).count();
            let expected = if union == 0 {
                0.0
            } else {
                a.intersection(&b).count() as f64 / union as f64
            };
            let a: Vec<usize> = a.into_iter().collect();
            let b: Vec<usize> = b.into_iter().collect();
            prop_assert_eq!(jaccard(&a, &b), expected);
            prop_assert_eq!(jaccard(&a, &b), jaccard(&b, &a));
        }
    }
}
