//! Sentence-level results

use crate::morphology::ResolvedAnalysis;
use crate::validation::PlausibilityReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceStatus {
    /// Every word reached a terminal state
    Complete,
    /// Stopped by a cancellation token; `unresolved` lists the rest
    Cancelled,
    /// The sentence task died; nothing was resolved
    Failed,
}

/// A resolved sentence, ready for export to review tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceResolution {
    pub words: Vec<ResolvedAnalysis>,
    /// Absent when validation is disabled or the sentence did not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PlausibilityReport>,
    pub status: SentenceStatus,
    /// Surface forms never resolved, in sentence order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

impl SentenceResolution {
    pub(crate) fn failed(tokens: Vec<String>) -> Self {
        Self {
            words: Vec::new(),
            report: None,
            status: SentenceStatus::Failed,
            unresolved: tokens,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SentenceStatus::Complete
    }

    /// Whether validation ran and found nothing to flag.
    pub fn is_plausible(&self) -> Option<bool> {
        self.report.as_ref().map(|r| r.plausible)
    }

    /// Words a reviewer should look at: unknown, low confidence, or flagged.
    pub fn needs_review(&self) -> Vec<usize> {
        let flagged = self
            .report
            .as_ref()
            .map(|r| r.flagged_positions())
            .unwrap_or_default();
        self.words
            .iter()
            .enumerate()
            .filter(|(i, w)| w.low_confidence || w.is_unknown() || flagged.contains(i))
            .map(|(i, _)| i)
            .collect()
    }
}
