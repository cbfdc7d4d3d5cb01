//! Correction records and promotion events

use crate::config::PipelineConfig;
use crate::error::ResolutionError;
use crate::known::KnownEntryConflict;
use crate::morphology::{normalize, AnalysisCandidate, Features, Pos};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who asserted a correction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Provenance {
    /// A human reviewer, by name or handle
    Reviewer(String),
    /// An arbiter verdict accepted during review
    Arbiter(String),
}

impl Provenance {
    pub fn kind(&self) -> &'static str {
        match self {
            Provenance::Reviewer(_) => "reviewer",
            Provenance::Arbiter(_) => "arbiter",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Provenance::Reviewer(id) | Provenance::Arbiter(id) => id,
        }
    }

    pub(crate) fn from_parts(kind: &str, id: String) -> Option<Self> {
        match kind {
            "reviewer" => Some(Provenance::Reviewer(id)),
            "arbiter" => Some(Provenance::Arbiter(id)),
            _ => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// One asserted correct reading of a surface form in context. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub id: Uuid,
    /// Literal surface form as it appeared in the sentence
    pub surface_form: String,
    pub sentence: Vec<String>,
    pub corrected: AnalysisCandidate,
    pub provenance: Provenance,
    pub recorded_at: DateTime<Utc>,
}

impl Correction {
    pub fn new(
        surface_form: impl Into<String>,
        sentence: Vec<String>,
        corrected: AnalysisCandidate,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            surface_form: surface_form.into(),
            sentence,
            corrected,
            provenance,
            recorded_at: Utc::now(),
        }
    }

    pub fn surface_key(&self) -> String {
        normalize(&self.surface_form)
    }
}

/// Repetition threshold for promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionCriteria {
    pub min_occurrences: usize,
}

impl PromotionCriteria {
    pub fn new(min_occurrences: usize) -> Self {
        Self {
            min_occurrences: min_occurrences.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.promotion_min_occurrences)
    }
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self::new(3)
    }
}

/// A reading observed often enough to be considered for the known table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotedForm {
    pub surface_form: String,
    pub lemma: String,
    pub pos: Pos,
    #[serde(flatten)]
    pub features: Features,
    pub occurrences: usize,
}

impl PromotedForm {
    pub fn candidate(&self, source: &str) -> AnalysisCandidate {
        AnalysisCandidate::new(source, self.lemma.clone(), self.pos).with_features(self.features)
    }
}

/// A snapshot swap caused by promotion, kept in the log for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub id: Uuid,
    /// Known-table version published by this promotion
    pub version: u64,
    pub promoted: Vec<PromotedForm>,
    pub promoted_at: DateTime<Utc>,
}

impl PromotionEvent {
    pub fn new(version: u64, promoted: Vec<PromotedForm>) -> Self {
        Self {
            id: Uuid::new_v4(),
            version,
            promoted,
            promoted_at: Utc::now(),
        }
    }
}

/// Result of `record_correction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub correction: Correction,
    /// Set when the correction contradicts the known table. The correction
    /// is still logged; nothing is applied.
    pub conflict: Option<KnownEntryConflict>,
}

impl RecordOutcome {
    /// The logged correction, or the conflict as an error for callers that
    /// treat review items as failures.
    pub fn into_result(self) -> Result<Correction, ResolutionError> {
        match self.conflict {
            Some(conflict) => Err(ResolutionError::KnownEntryConflict(Box::new(conflict))),
            None => Ok(self.correction),
        }
    }
}

/// Result of `promote_to_known`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PromotionReport {
    pub promoted: Vec<PromotedForm>,
    /// Qualifying readings the known table already has
    pub skipped_known: Vec<PromotedForm>,
    /// Qualifying readings that contradict the known table
    pub conflicts: Vec<KnownEntryConflict>,
    /// Distinct readings still below the threshold
    pub pending: usize,
    /// Known-table version after the pass
    pub version: u64,
}

impl PromotionReport {
    pub fn changed(&self) -> bool {
        !self.promoted.is_empty()
    }
}
