//! Core data models for spectra.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants recorded instead of propagated

mod config;
mod error;
mod sample;

pub use config::*;
pub use error::*;
pub use sample::*;
