//! Arbitration escalation layer
//!
//! Low-agreement words go to an injected `Arbiter`. The escalator owns the
//! threshold check, per-call timeout, the single-flight verdict cache and
//! the ensemble fallback; arbiters only answer requests.

mod arbiter;
mod escalator;
pub mod llm;
mod llm_arbiter;

pub use arbiter::{Arbiter, ArbiterError, ArbitrationRequest, ArbitrationVerdict};
pub use escalator::{ArbitrationEscalator, WordState};
pub use llm::{CommandClient, CompletionResponse, LlmClient, LlmError, MockClient};
pub use llm_arbiter::{build_prompt, parse_verdict, LlmArbiter};
