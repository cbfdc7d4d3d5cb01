//! Canonical morphology types shared by every layer

mod candidate;
pub mod endings;
mod resolved;
mod surface;
mod vocab;

pub use candidate::AnalysisCandidate;
pub use endings::DeclensionClass;
pub use resolved::{AuditEvent, ResolutionSource, ResolvedAnalysis, PUNCTUATION_SOURCE};
pub use surface::{is_punctuation, normalize, SentenceContext, SurfaceForm};
pub use vocab::{Case, Features, Gender, Number, Pos, Tense};
