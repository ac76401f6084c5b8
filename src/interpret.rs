//! Descriptive views of an assignment: external labels per cluster and the
//! most frequent terms per cluster.
//!
//! Nothing here feeds back into clustering; it only aggregates.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterAssignment;
use crate::corpus::Corpus;

/// Label counts for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    /// Cluster label ([`PERIPHERY`](crate::cluster::PERIPHERY) included).
    pub cluster: usize,
    /// Documents per external label.
    pub counts: BTreeMap<u8, usize>,
    /// Documents with no external label.
    pub unlabeled: usize,
}

impl LabelRow {
    /// Labeled documents in the cluster.
    pub fn labeled(&self) -> usize {
        self.counts.values().sum()
    }

    /// Share of labeled documents carrying `label`; 0 for a cluster with no
    /// labeled documents.
    pub fn proportion(&self, label: u8) -> f64 {
        let total = self.labeled();
        if total == 0 {
            return 0.0;
        }
        self.counts.get(&label).copied().unwrap_or(0) as f64 / total as f64
    }
}

/// Cluster × external-label table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTab {
    /// One row per cluster that has members, ascending by cluster label.
    pub rows: Vec<LabelRow>,
}

impl CrossTab {
    /// Row for `cluster`.
    pub fn row(&self, cluster: usize) -> Option<&LabelRow> {
        self.rows.iter().find(|r| r.cluster == cluster)
    }

    /// Every external label that occurs, ascending.
    pub fn labels(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self
            .rows
            .iter()
            .flat_map(|r| r.counts.keys().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Cross-tabulate an assignment against the corpus's external labels.
///
/// Documents the corpus does not know are ignored.
pub fn crosstab(assignment: &ClusterAssignment, corpus: &Corpus) -> CrossTab {
    let mut rows: BTreeMap<usize, LabelRow> = BTreeMap::new();
    for (&doc_id, &cluster) in assignment.doc_ids().iter().zip(assignment.labels()) {
        let Some(doc) = corpus.get(doc_id) else {
            continue;
        };
        let row = rows.entry(cluster).or_insert_with(|| LabelRow {
            cluster,
            counts: BTreeMap::new(),
            unlabeled: 0,
        });
        match doc.label {
            Some(l) => *row.counts.entry(l).or_insert(0) += 1,
            None => row.unlabeled += 1,
        }
    }
    CrossTab {
        rows: rows.into_values().collect(),
    }
}

/// Frequent terms of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTerms {
    /// Cluster label.
    pub cluster: usize,
    /// `(term, occurrences)`, most frequent first.
    pub terms: Vec<(String, usize)>,
}

/// The `n` most frequent cleaned tokens of each cluster.
///
/// Counts are token occurrences across the cluster's documents. Ties break
/// lexicographically so the result is deterministic.
pub fn top_terms(assignment: &ClusterAssignment, corpus: &Corpus, n: usize) -> Vec<ClusterTerms> {
    assignment
        .members()
        .into_iter()
        .map(|(cluster, docs)| {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for doc in docs.iter().filter_map(|&id| corpus.get(id)) {
                for t in &doc.tokens {
                    *counts.entry(t.as_str()).or_insert(0) += 1;
                }
            }
            let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
            ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            ranked.truncate(n);
            ClusterTerms {
                cluster,
                terms: ranked.into_iter().map(|(t, c)| (t.to_string(), c)).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Method, PERIPHERY};
    use crate::text::BasicCleaner;

    fn reviews() -> Corpus {
        Corpus::from_labeled_texts(
            [
                ("great acting great plot", 1u8),
                ("great film", 1),
                ("boring plot", 0),
                ("boring boring slow", 0),
                ("slow but great", 1),
            ],
            &BasicCleaner::new(),
        )
    }

    #[test]
    fn crosstab_counts_labels_per_cluster() {
        let corpus = reviews();
        let a = ClusterAssignment::new(
            Method::Kmeans,
            2,
            vec![0, 1, 2, 3, 4],
            vec![0, 0, 1, 1, PERIPHERY],
        )
        .unwrap();
        let table = crosstab(&a, &corpus);
        assert_eq!(table.rows.len(), 3);
        let positive = table.row(0).unwrap();
        assert_eq!(positive.counts.get(&1), Some(&2));
        assert_eq!(positive.proportion(1), 1.0);
        assert_eq!(table.row(1).unwrap().proportion(0), 1.0);
        assert_eq!(table.row(PERIPHERY).unwrap().labeled(), 1);
        assert_eq!(table.labels(), vec![0, 1]);
    }

    #[test]
    fn unlabeled_documents_are_counted_separately() {
        let corpus = Corpus::from_texts(["alpha beta", "beta gamma"], &BasicCleaner::new());
        let a = ClusterAssignment::new(Method::Gmm, 1, vec![0, 1], vec![0, 0]).unwrap();
        let row = &crosstab(&a, &corpus).rows[0];
        assert_eq!(row.unlabeled, 2);
        assert_eq!(row.proportion(1), 0.0);
    }

    #[test]
    fn top_terms_rank_by_count_then_term() {
        let corpus = reviews();
        let a = ClusterAssignment::new(Method::Kmeans, 2, vec![0, 1, 2, 3, 4], vec![0, 0, 1, 1, 0])
            .unwrap();
        let terms = top_terms(&a, &corpus, 3);
        assert_eq!(terms.len(), 2);
        assert_eq!(
            terms[0].terms,
            vec![("great".to_string(), 4), ("acting".to_string(), 1), ("but".to_string(), 1)]
        );
        assert_eq!(terms[1].terms[0], ("boring".to_string(), 3));
    }
}
