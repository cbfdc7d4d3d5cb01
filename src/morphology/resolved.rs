//! Resolved analyses and their audit trails

use super::candidate::AnalysisCandidate;
use super::vocab::{Features, Pos};
use crate::error::DegradationKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidate source for punctuation tokens.
pub const PUNCTUATION_SOURCE: &str = "punctuation";

/// Which layer decided a word. Exactly one per resolved word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    KnownWord,
    EnsembleMajority,
    LlmArbitration,
    Unknown,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnownWord => "known_word",
            Self::EnsembleMajority => "ensemble_majority",
            Self::LlmArbitration => "llm_arbitration",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in the resolution of a word, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The known table matched; analyzer output cannot override it
    KnownEntryHit {
        candidates: Vec<AnalysisCandidate>,
        /// Analyzers whose vote was not consulted for lemma/POS
        analyzers_suppressed: usize,
    },
    /// An analyzer produced a reading
    Candidate(AnalysisCandidate),
    /// An analyzer abstained or failed
    NoCandidate {
        analyzer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Ensemble vote over the non-null candidates
    Vote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lemma: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pos: Option<Pos>,
        lemma_agreement: f64,
        pos_agreement: f64,
        non_null: usize,
    },
    /// An arbiter's verdict
    Arbitration {
        arbiter: String,
        lemma: String,
        pos: Pos,
        features: Features,
        confidence: f64,
        rationale: String,
    },
    /// A soft or hard failure converted into a degraded result
    Degraded {
        kind: DegradationKind,
        detail: String,
    },
}

/// The final analysis of one word occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnalysis {
    pub surface_form: String,
    /// Absent only for `Unknown`
    pub lemma: Option<String>,
    pub pos: Option<Pos>,
    pub features: Features,
    /// Fraction of non-null candidates agreeing with the plurality lemma
    pub agreement_score: f64,
    pub resolution_source: ResolutionSource,
    pub low_confidence: bool,
    pub audit_trail: Vec<AuditEvent>,
}

impl ResolvedAnalysis {
    /// An unresolvable word. Always low confidence with zero agreement.
    pub fn unknown(surface_form: impl Into<String>, audit_trail: Vec<AuditEvent>) -> Self {
        Self {
            surface_form: surface_form.into(),
            lemma: None,
            pos: None,
            features: Features::default(),
            agreement_score: 0.0,
            resolution_source: ResolutionSource::Unknown,
            low_confidence: true,
            audit_trail,
        }
    }

    /// A punctuation token. It never reaches the analyzers; `suppressed`
    /// is the number of analyzers that were skipped.
    pub fn punctuation(token: &str, suppressed: usize) -> Self {
        let mark = token.trim().to_string();
        Self {
            surface_form: mark.clone(),
            lemma: Some(mark.clone()),
            pos: Some(Pos::Punct),
            features: Features::default(),
            agreement_score: 1.0,
            resolution_source: ResolutionSource::KnownWord,
            low_confidence: false,
            audit_trail: vec![AuditEvent::KnownEntryHit {
                candidates: vec![AnalysisCandidate::new(PUNCTUATION_SOURCE, mark, Pos::Punct)],
                analyzers_suppressed: suppressed,
            }],
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.resolution_source == ResolutionSource::Unknown
    }

    pub fn is_verb(&self) -> bool {
        self.pos == Some(Pos::Verb)
    }

    /// The analysis candidates recorded in the trail, in order.
    pub fn candidates(&self) -> impl Iterator<Item = &AnalysisCandidate> {
        self.audit_trail.iter().flat_map(|event| match event {
            AuditEvent::KnownEntryHit { candidates, .. } => candidates.iter().collect::<Vec<_>>(),
            AuditEvent::Candidate(c) => vec![c],
            _ => Vec::new(),
        })
    }

    pub fn was_arbitrated(&self) -> bool {
        self.audit_trail
            .iter()
            .any(|e| matches!(e, AuditEvent::Arbitration { .. }))
    }
}
