//! Similarity and uniqueness analysis.

mod similarity;
mod stats;

pub use similarity::*;
pub use stats::*;
