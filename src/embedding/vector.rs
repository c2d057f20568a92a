//! Shared embedding vectors.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Immutable embedding, shared by reference count between the cache and the
/// samples that use it.
#[derive(Clone, PartialEq)]
pub struct EmbeddingVector(Arc<[f32]>);

impl EmbeddingVector {
    /// All-zero vector of the given dimension.
    pub fn zeros(dimension: usize) -> Self {
        Self::from(vec![0.0; dimension])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Euclidean norm, accumulated in f64.
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt()
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for EmbeddingVector {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self(Arc::from(values))
    }
}

impl Deref for EmbeddingVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl fmt::Debug for EmbeddingVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingVector")
            .field("dim", &self.dim())
            .field("norm", &self.norm())
            .finish()
    }
}

/// Scale `values` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v = (f64::from(*v) / norm) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let mut values = vec![3.0, 4.0];
        l2_normalize(&mut values);
        assert!((values[0] - 0.6).abs() < 1e-6);
        assert!((values[1] - 0.8).abs() < 1e-6);
        assert!((EmbeddingVector::from(values).norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_stays_zero() {
        let mut values = vec![0.0; 4];
        l2_normalize(&mut values);
        assert!(values.iter().all(|v| *v == 0.0));
        assert_eq!(EmbeddingVector::zeros(4).norm(), 0.0);
        assert_eq!(EmbeddingVector::default().dim(), 0);
    }

    #[test]
    fn test_clones_share_storage() {
        let a = EmbeddingVector::from(vec![1.0, 2.0]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(&b[..], &[1.0, 2.0]);
    }
}
