//! Pipeline module - prompt loading and the sampling orchestrator.

mod orchestrator;
mod prompts;

pub use orchestrator::*;
pub use prompts::*;
