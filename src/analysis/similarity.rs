//! Pairwise similarity analysis over a cell's embeddings.
//!
//! Epistemic foundation:
//! - K_i: similarity(i, j) = cosine ∈ [-1, 1], symmetric, 1 on the diagonal
//! - K_i: Zero-norm vectors are similar to nothing (cosine 0)
//! - K_i: Fewer than two vectors → no pairs → every pairwise metric is 0
//!
//! All operations are pure over a precomputed matrix.

use crate::analysis::DistributionStats;
use crate::embedding::EmbeddingVector;
use crate::models::{serialize_rounded, AnalysisError};
use serde::{Deserialize, Serialize};

/// Cosine similarity accumulated in f64, clamped to [-1, 1].
///
/// Identical nonzero vectors are exactly 1.0; rounding in the norm product
/// would otherwise leave them an ulp short.
///
/// Callers guarantee equal lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0)
}

/// Two sample positions and their similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub first: usize,
    pub second: usize,
    #[serde(serialize_with = "serialize_rounded")]
    pub similarity: f64,
}

/// A sample whose mean similarity to the others is below the outlier threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub index: usize,
    #[serde(serialize_with = "serialize_rounded")]
    pub mean_similarity: f64,
}

/// Symmetric n×n cosine similarity matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Compute every pairwise similarity.
    ///
    /// B_i(all vectors share one dimension) → Result
    pub fn build(embeddings: &[EmbeddingVector]) -> Result<Self, AnalysisError> {
        let n = embeddings.len();
        if let Some(first) = embeddings.first() {
            let expected = first.dim();
            if let Some((index, e)) = embeddings
                .iter()
                .enumerate()
                .find(|(_, e)| e.dim() != expected)
            {
                return Err(AnalysisError::DimensionMismatch {
                    index,
                    expected,
                    actual: e.dim(),
                });
            }
        }

        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = if embeddings[i].norm() > 0.0 { 1.0 } else { 0.0 };
            for j in (i + 1)..n {
                let s = cosine_similarity(&embeddings[i], &embeddings[j]);
                values[i * n + j] = s;
                values[j * n + i] = s;
            }
        }

        Ok(Self { n, values })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Similarity of positions `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "index out of range");
        self.values[i * self.n + j]
    }

    /// Unordered pairs `i < j` in row order.
    pub fn pairs(&self) -> impl Iterator<Item = SimilarPair> + '_ {
        (0..self.n).flat_map(move |i| {
            ((i + 1)..self.n).map(move |j| SimilarPair {
                first: i,
                second: j,
                similarity: self.values[i * self.n + j],
            })
        })
    }

    pub fn pair_count(&self) -> usize {
        self.n * self.n.saturating_sub(1) / 2
    }

    /// Mean of `1 − similarity` over unordered pairs; 0 when n < 2.
    pub fn uniqueness(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let total: f64 = self.pairs().map(|p| 1.0 - p.similarity).sum();
        total / self.pair_count() as f64
    }

    /// Fraction of unordered pairs with similarity above `threshold`; 0 when n < 2.
    pub fn duplicate_rate(&self, threshold: f64) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let duplicates = self.pairs().filter(|p| p.similarity > threshold).count();
        duplicates as f64 / self.pair_count() as f64
    }

    /// Pairs with similarity above `threshold`.
    pub fn find_duplicates(&self, threshold: f64) -> Vec<SimilarPair> {
        self.pairs().filter(|p| p.similarity > threshold).collect()
    }

    /// Greedy seed clustering.
    ///
    /// Each unassigned position, in order, seeds a cluster and takes every later
    /// unassigned position whose similarity *to the seed* exceeds `threshold`.
    /// Membership is not transitive and the result depends on input order.
    pub fn cluster(&self, threshold: f64) -> Vec<Vec<usize>> {
        let mut assigned = vec![false; self.n];
        let mut clusters = Vec::new();

        for seed in 0..self.n {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut cluster = vec![seed];

            for j in (seed + 1)..self.n {
                if !assigned[j] && self.get(seed, j) > threshold {
                    assigned[j] = true;
                    cluster.push(j);
                }
            }
            clusters.push(cluster);
        }

        clusters
    }

    /// Positions whose mean similarity to all others is below `threshold`.
    pub fn find_outliers(&self, threshold: f64) -> Vec<Outlier> {
        if self.n < 2 {
            return Vec::new();
        }
        (0..self.n)
            .filter_map(|i| {
                let sum: f64 = (0..self.n).filter(|&j| j != i).map(|j| self.get(i, j)).sum();
                let mean_similarity = sum / (self.n - 1) as f64;
                (mean_similarity < threshold).then_some(Outlier {
                    index: i,
                    mean_similarity,
                })
            })
            .collect()
    }

    /// Distribution of pairwise similarities; `None` without pairs.
    pub fn distribution_stats(&self) -> Option<DistributionStats> {
        let values: Vec<f64> = self.pairs().map(|p| p.similarity).collect();
        DistributionStats::from_values(&values)
    }

    /// First pair with the highest similarity.
    pub fn most_similar_pair(&self) -> Option<SimilarPair> {
        self.pairs()
            .fold(None, |best: Option<SimilarPair>, p| match best {
                Some(b) if b.similarity >= p.similarity => Some(b),
                _ => Some(p),
            })
    }

    /// First pair with the lowest similarity.
    pub fn least_similar_pair(&self) -> Option<SimilarPair> {
        self.pairs()
            .fold(None, |best: Option<SimilarPair>, p| match best {
                Some(b) if b.similarity <= p.similarity => Some(b),
                _ => Some(p),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn vectors(raw: &[&[f32]]) -> Vec<EmbeddingVector> {
        raw.iter().map(|v| EmbeddingVector::from(v.to_vec())).collect()
    }

    fn matrix(raw: &[&[f32]]) -> SimilarityMatrix {
        SimilarityMatrix::build(&vectors(raw)).unwrap()
    }

    #[test]
    fn test_fewer_than_two_is_zero() {
        for m in [matrix(&[]), matrix(&[&[1.0, 0.0]])] {
            assert_eq!(m.uniqueness(), 0.0);
            assert_eq!(m.duplicate_rate(0.5), 0.0);
            assert!(m.find_outliers(0.5).is_empty());
            assert!(m.distribution_stats().is_none());
            assert!(m.most_similar_pair().is_none());
        }
    }

    #[test]
    fn test_identical_vectors() {
        let m = matrix(&[&[0.3, 0.4], &[0.3, 0.4], &[0.3, 0.4], &[0.3, 0.4]]);
        for threshold in [0.0, 0.5, 0.75, 0.99, 1.0 - f64::EPSILON] {
            assert_eq!(m.duplicate_rate(threshold), 1.0);
        }
        assert_eq!(m.uniqueness(), 0.0);
        assert_eq!(m.cluster(0.75), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_identical_hashed_vectors_are_exact_duplicates() {
        let embedder = HashEmbedder::new(384);
        for i in 0..500 {
            let v = EmbeddingVector::from(
                embedder.hash_to_vec(&format!("sample {i} says {} apples", i * 7)),
            );
            let m = SimilarityMatrix::build(&[v.clone(), v]).unwrap();
            assert_eq!(m.get(0, 1), 1.0);
            assert_eq!(m.uniqueness(), 0.0);
            assert_eq!(m.duplicate_rate(1.0 - f64::EPSILON), 1.0);
        }
    }

    #[test]
    fn test_orthonormal_uniqueness_is_one() {
        let m = matrix(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[0.0, 0.0, 1.0]]);
        assert_eq!(m.uniqueness(), 1.0);
        assert_eq!(m.duplicate_rate(0.75), 0.0);
        assert_eq!(m.cluster(0.75).len(), 3);
        assert_eq!(m.find_outliers(0.5).len(), 3);
    }

    #[test]
    fn test_zero_norm_is_dissimilar() {
        let m = matrix(&[&[0.0, 0.0], &[1.0, 0.0]]);
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(0, 0), 0.0);
        assert_eq!(m.get(1, 1), 1.0);
        assert_eq!(m.uniqueness(), 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = SimilarityMatrix::build(&vectors(&[&[1.0, 0.0], &[1.0, 0.0], &[1.0]]))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DimensionMismatch {
                index: 2,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_clustering_is_seed_based() {
        // b is close to both a and c, but a and c are not close to each other
        let a: &[f32] = &[1.0, 0.0];
        let b: &[f32] = &[0.8, 0.6];
        let c: &[f32] = &[0.28, 0.96];
        let m = matrix(&[a, b, c]);
        assert!(m.get(0, 1) > 0.75 && m.get(1, 2) > 0.75 && m.get(0, 2) < 0.75);
        assert_eq!(m.cluster(0.75), vec![vec![0, 1], vec![2]]);

        // Order changes the result
        let m = matrix(&[b, a, c]);
        assert_eq!(m.cluster(0.75), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_reclustering_single_cluster_is_stable() {
        let raw: Vec<&[f32]> = vec![&[1.0, 0.1], &[0.9, 0.2], &[1.0, 0.0], &[0.95, 0.15]];
        let m = matrix(&raw);
        let clusters = m.cluster(0.9);
        assert_eq!(clusters.len(), 1);

        let members: Vec<&[f32]> = clusters[0].iter().map(|&i| raw[i]).collect();
        assert_eq!(matrix(&members).cluster(0.9), clusters);
    }

    #[test]
    fn test_outliers_and_extreme_pairs() {
        let m = matrix(&[&[1.0, 0.0], &[0.99, 0.1], &[0.0, 1.0]]);
        let outliers = m.find_outliers(0.4);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].index, 2);

        let most = m.most_similar_pair().unwrap();
        assert_eq!((most.first, most.second), (0, 1));
        let least = m.least_similar_pair().unwrap();
        assert_eq!((least.first, least.second), (0, 2));

        let dups = m.find_duplicates(0.9);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].first, 0);
    }

    #[test]
    fn test_distribution_over_pairs() {
        let m = matrix(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[0.0, 0.0, 1.0]]);
        let stats = m.distribution_stats().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std_dev, 0.0);
    }
}
