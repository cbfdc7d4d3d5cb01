//! CorrectionLearningStore: logs corrections and promotes repeated ones
//! into the known-word table

use super::log::{CorrectionLog, MemoryCorrectionLog, StorageError};
use super::types::{
    Correction, PromotedForm, PromotionCriteria, PromotionEvent, PromotionReport, Provenance, RecordOutcome,
};
use crate::error::ResolutionError;
use crate::known::{KnownEntry, KnownEntryConflict, KnownFormOverride, KnownStatus, KnownTableError};
use crate::morphology::{normalize, AnalysisCandidate, Features, Pos, SurfaceForm};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    KnownTable(#[from] KnownTableError),

    #[error(transparent)]
    Rejected(#[from] ResolutionError),
}

/// Source id stamped on promoted candidates in conflict reports.
const PROMOTION_SOURCE: &str = "corrections";

type GroupKey = (String, String, Pos, Features);

pub struct CorrectionLearningStore {
    log: Arc<dyn CorrectionLog>,
    known: Arc<KnownFormOverride>,
    /// Serializes promotion passes
    promoting: Mutex<()>,
}

impl CorrectionLearningStore {
    pub fn new(log: Arc<dyn CorrectionLog>, known: Arc<KnownFormOverride>) -> Self {
        Self {
            log,
            known,
            promoting: Mutex::new(()),
        }
    }

    pub fn in_memory(known: Arc<KnownFormOverride>) -> Self {
        Self::new(Arc::new(MemoryCorrectionLog::new()), known)
    }

    pub fn log(&self) -> &Arc<dyn CorrectionLog> {
        &self.log
    }

    pub fn known(&self) -> &Arc<KnownFormOverride> {
        &self.known
    }

    /// Append a correction. A correction that contradicts the known table
    /// is still logged, and the conflict is returned for manual review.
    pub fn record_correction(
        &self,
        surface: &str,
        sentence: &[String],
        corrected: AnalysisCandidate,
        provenance: Provenance,
    ) -> Result<RecordOutcome, CorrectionError> {
        let surface = SurfaceForm::parse(surface)?;
        let corrected = AnalysisCandidate {
            lemma: normalize(&corrected.lemma),
            ..corrected
        };
        let correction = Correction::new(surface.as_str(), sentence.to_vec(), corrected, provenance);
        self.log.append(&correction)?;

        let conflict = match self.known.snapshot().status_of(surface.key(), &correction.corrected) {
            KnownStatus::Conflict(conflict) => {
                warn!(
                    surface = %surface,
                    proposed = %correction.corrected.lemma,
                    provenance = %correction.provenance,
                    "correction contradicts known table"
                );
                Some(conflict)
            }
            KnownStatus::Absent | KnownStatus::Present => None,
        };

        Ok(RecordOutcome { correction, conflict })
    }

    /// Promote every reading seen at least `criteria.min_occurrences` times
    /// in one snapshot swap. Conflicting readings are reported, not applied.
    pub fn promote_to_known(&self, criteria: &PromotionCriteria) -> Result<PromotionReport, CorrectionError> {
        let _promoting = self.promoting.lock().unwrap_or_else(PoisonError::into_inner);
        let corrections = self.log.corrections()?;
        let snapshot = self.known.snapshot();

        // Distinct readings in first-seen order.
        let mut order: Vec<GroupKey> = Vec::new();
        let mut counts: HashMap<GroupKey, usize> = HashMap::new();
        for c in &corrections {
            let key = (c.surface_key(), c.corrected.lemma.clone(), c.corrected.pos, c.corrected.features);
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }
        // Stronger evidence first, so it wins a same-surface contest.
        order.sort_by_key(|key| std::cmp::Reverse(counts[key]));

        let mut report = PromotionReport {
            version: snapshot.version(),
            ..PromotionReport::default()
        };
        let mut accepted: HashMap<String, PromotedForm> = HashMap::new();

        for (surface, lemma, pos, features) in order {
            let occurrences = counts[&(surface.clone(), lemma.clone(), pos, features)];
            if occurrences < criteria.min_occurrences {
                report.pending += 1;
                continue;
            }
            let form = PromotedForm {
                surface_form: surface.clone(),
                lemma,
                pos,
                features,
                occurrences,
            };
            let proposed = form.candidate(PROMOTION_SOURCE);

            match snapshot.status_of(&surface, &proposed) {
                KnownStatus::Present => {
                    report.skipped_known.push(form);
                    continue;
                }
                KnownStatus::Conflict(conflict) => {
                    report.conflicts.push(conflict);
                    continue;
                }
                KnownStatus::Absent => {}
            }

            // The lemma is known under another part of speech.
            if let Some(entry) = snapshot.entry(&form.lemma).filter(|e| e.pos != form.pos) {
                report.conflicts.push(KnownEntryConflict {
                    surface_form: surface,
                    existing: entry_readings(entry),
                    proposed,
                });
                continue;
            }

            // Two qualifying readings for one surface form in the same pass.
            if let Some(winner) = accepted.get(&surface).filter(|w| w.lemma != form.lemma || w.pos != form.pos) {
                report.conflicts.push(KnownEntryConflict {
                    surface_form: surface,
                    existing: vec![winner.candidate(PROMOTION_SOURCE)],
                    proposed,
                });
                continue;
            }

            accepted.entry(surface).or_insert_with(|| form.clone());
            report.promoted.push(form);
        }

        if report.promoted.is_empty() {
            return Ok(report);
        }

        let promoted = report.promoted.clone();
        let next = self.known.update(move |entries| {
            let mut next = entries.clone();
            for form in &promoted {
                next.entry(form.lemma.clone())
                    .or_insert_with(|| KnownEntry::new(form.lemma.clone(), form.pos))
                    .add_form(&form.surface_form, form.features);
            }
            next
        })?;
        report.version = next.version();

        let event = PromotionEvent::new(report.version, report.promoted.clone());
        self.log.record_promotion(&event)?;
        info!(
            promoted = report.promoted.len(),
            skipped = report.skipped_known.len(),
            conflicts = report.conflicts.len(),
            version = report.version,
            "promoted corrections to known table"
        );
        Ok(report)
    }

    pub fn corrections(&self) -> Result<Vec<Correction>, CorrectionError> {
        Ok(self.log.corrections()?)
    }

    pub fn promotions(&self) -> Result<Vec<PromotionEvent>, CorrectionError> {
        Ok(self.log.promotions()?)
    }
}

impl std::fmt::Debug for CorrectionLearningStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectionLearningStore")
            .field("known", &self.known)
            .finish_non_exhaustive()
    }
}

fn entry_readings(entry: &KnownEntry) -> Vec<AnalysisCandidate> {
    entry
        .paradigm
        .keys()
        .flat_map(|surface| entry.candidates_for(surface))
        .collect()
}
