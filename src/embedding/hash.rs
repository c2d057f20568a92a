//! Offline feature-hashing embedder.
//!
//! Epistemic foundation:
//! - K_i: Same text → same vector, no network, no model weights
//! - K_i: Shared words and character trigrams → overlapping buckets → higher cosine
//! - K_i: Only blank text maps to the zero vector

use crate::embedding::{l2_normalize, Embedder};
use crate::models::EmbeddingError;
use async_trait::async_trait;

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

/// Seed for the bucket hash.
const BUCKET_SEED: u64 = 0;
/// Seed for the sign hash.
const SIGN_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Weight of a whole-word feature relative to a trigram.
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = FNV_OFFSET ^ seed;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Signed feature-hashing embedder over lowercase word tokens and their
/// character trigrams, L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let bytes = feature.as_bytes();
        let bucket = (fnv1a(bytes, BUCKET_SEED) % self.dimension as u64) as usize;
        let sign = if fnv1a(bytes, SIGN_SEED) & 1 == 0 {
            1.0
        } else {
            -1.0
        };
        vec[bucket] += sign * weight;
    }

    /// Compute the vector synchronously.
    pub fn hash_to_vec(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vec;
        }

        let mut words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        // Symbol-only text ("--- !!!", emoji) hashes its raw tokens instead
        if words.is_empty() {
            words = text.split_whitespace().collect();
        }

        for word in words {
            let word = word.to_lowercase();
            self.add_feature(&mut vec, &word, WORD_WEIGHT);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vec, &trigram, TRIGRAM_WEIGHT);
            }
        }

        l2_normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.hash_to_vec(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}
