//! Resolution error taxonomy
//!
//! Per-word failures are converted into degraded results rather than raised.
//! `ResolutionError` names each failure; `DegradationKind` is the tag it
//! leaves in an audit trail.

use crate::known::KnownEntryConflict;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures that can occur while resolving a word.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// One adapter failed; the others still vote
    #[error("analyzer {analyzer} unavailable: {reason}")]
    AnalyzerUnavailable { analyzer: String, reason: String },

    /// No adapter produced a reading for this word
    #[error("all analyzers failed for {surface_form}")]
    AllAnalyzersFailed { surface_form: String },

    #[error("arbiter timed out after {0:?}")]
    ArbiterTimeout(Duration),

    #[error("arbiter error: {0}")]
    ArbiterError(String),

    /// A correction contradicts the known table; needs manual review
    #[error("known entry conflict: {0}")]
    KnownEntryConflict(Box<KnownEntryConflict>),

    /// Rejected before reaching any adapter
    #[error("invalid surface form {token:?}: {reason}")]
    InvalidSurfaceForm { token: String, reason: String },

    /// The known table lists several lemmas for the form and the
    /// analyzers did not settle on one of them
    #[error("known form {surface_form} has {readings} readings; none chosen")]
    AmbiguousKnownForm { surface_form: String, readings: usize },
}

impl ResolutionError {
    pub fn kind(&self) -> DegradationKind {
        match self {
            Self::AnalyzerUnavailable { .. } => DegradationKind::AnalyzerUnavailable,
            Self::AllAnalyzersFailed { .. } => DegradationKind::AllAnalyzersFailed,
            Self::ArbiterTimeout(_) => DegradationKind::ArbiterTimeout,
            Self::ArbiterError(_) => DegradationKind::ArbiterError,
            Self::KnownEntryConflict(_) => DegradationKind::KnownEntryConflict,
            Self::InvalidSurfaceForm { .. } => DegradationKind::InvalidSurfaceForm,
            Self::AmbiguousKnownForm { .. } => DegradationKind::AmbiguousKnownForm,
        }
    }

    /// Soft failures degrade a result; hard ones end in `unknown`.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::AnalyzerUnavailable { .. }
                | Self::ArbiterTimeout(_)
                | Self::ArbiterError(_)
                | Self::AmbiguousKnownForm { .. }
        )
    }
}

/// Audit-trail tag for a failure that was absorbed into a degraded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    AnalyzerUnavailable,
    AllAnalyzersFailed,
    ArbiterTimeout,
    ArbiterError,
    KnownEntryConflict,
    InvalidSurfaceForm,
    AmbiguousKnownForm,
}
