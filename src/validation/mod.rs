//! Translation-based plausibility checks

mod gloss;
mod validator;

pub use gloss::{gloss_word, GlossDictionary, GlossToken};
pub use validator::{FlagKind, PlausibilityFlag, PlausibilityReport, TranslationPlausibilityValidator};
