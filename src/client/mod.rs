//! Generation gateway and provider backends.

mod gateway;
mod http;
mod provider;
mod shape;
mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use gateway::*;
pub use http::*;
pub use provider::*;
pub use shape::*;
pub use stats::*;
