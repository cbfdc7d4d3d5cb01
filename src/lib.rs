//! Lemmata: multi-layer morphological disambiguation for Latin
//!
//! Each surface form in a sentence is resolved to a lemma, part of speech
//! and grammatical features by a layered pipeline:
//!
//! - **Known forms**: curated paradigms that override every analyzer
//! - **Ensemble**: heterogeneous analyzers behind one adapter interface,
//!   combined by plurality vote
//! - **Arbitration**: low-agreement words escalate to an injected arbiter,
//!   cached and bounded by a timeout
//! - **Validation**: a gloss-based plausibility report per sentence
//! - **Correction learning**: repeated reviewer corrections are promoted
//!   into the known table
//!
//! Every resolved word carries an audit trail of how it was decided.
//!
//! # Example
//!
//! ```
//! use lemmata::KnownFormOverride;
//!
//! let known = KnownFormOverride::default();
//! assert!(known.contains("nautam"));
//! ```

pub mod analyzer;
pub mod arbitration;
pub mod config;
pub mod corrections;
pub mod ensemble;
pub mod error;
pub mod known;
pub mod morphology;
pub mod pipeline;
pub mod validation;

pub use analyzer::{AnalyzerAdapter, AnalyzerRegistry, NativeAnalyzer, RuleDecliner, SchemeAdapter};
pub use arbitration::{Arbiter, ArbitrationEscalator, ArbitrationVerdict, LlmArbiter};
pub use config::{ConfigError, ContextScope, PipelineConfig};
pub use corrections::{
    CorrectionLearningStore, CorrectionLog, MemoryCorrectionLog, PromotionCriteria, Provenance,
    SqliteCorrectionLog,
};
pub use ensemble::{EnsembleVoter, VoteOutcome};
pub use error::{DegradationKind, ResolutionError};
pub use known::{KnownEntry, KnownFormOverride};
pub use morphology::{
    AnalysisCandidate, AuditEvent, Case, Features, Gender, Number, Pos, ResolutionSource,
    ResolvedAnalysis, SentenceContext, SurfaceForm, Tense,
};
pub use pipeline::{CancellationToken, PipelineBuilder, ResolutionPipeline, SentenceResolution, SentenceStatus};
pub use validation::{PlausibilityReport, TranslationPlausibilityValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
