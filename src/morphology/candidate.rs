//! Analysis candidates: the canonical shape every analyzer produces

use super::vocab::{Features, Pos};
use serde::{Deserialize, Serialize};

/// One analyzer's reading of one word occurrence.
///
/// Ephemeral: produced per analyzer call, kept only inside audit trails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisCandidate {
    /// Which analyzer (or known table) produced this
    pub source: String,
    pub lemma: String,
    pub pos: Pos,
    #[serde(flatten)]
    pub features: Features,
    /// Free-text justification, forwarded to arbiters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl AnalysisCandidate {
    pub fn new(source: impl Into<String>, lemma: impl Into<String>, pos: Pos) -> Self {
        Self {
            source: source.into(),
            lemma: lemma.into(),
            pos,
            features: Features::default(),
            rationale: None,
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Same reading regardless of who produced it.
    pub fn same_reading(&self, other: &AnalysisCandidate) -> bool {
        self.lemma == other.lemma && self.pos == other.pos && self.features == other.features
    }
}
