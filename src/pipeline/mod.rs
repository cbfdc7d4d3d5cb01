//! Resolution pipeline
//!
//! Wires the known-word override, analyzer ensemble, arbitration escalator
//! and plausibility validator into one per-word state machine.

mod cancel;
#[cfg(test)]
mod integration_tests;
mod resolver;
mod types;

pub use cancel::CancellationToken;
pub use resolver::{PipelineBuilder, ResolutionPipeline};
pub use types::{SentenceResolution, SentenceStatus};
