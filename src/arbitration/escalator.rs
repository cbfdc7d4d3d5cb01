//! ArbitrationEscalator: threshold-gated, cached, cost-bounded escalation
//!
//! Identical escalations (same surface form, same sentence) share one
//! arbiter call. Concurrent callers wait on the same in-flight request;
//! failed calls are not cached, so a later escalation retries. Once the
//! cache holds `arbitration_cache_limit` keys, settled verdicts are dropped
//! before a new key is added.

use super::arbiter::{Arbiter, ArbiterError, ArbitrationRequest, ArbitrationVerdict};
use crate::config::{ContextScope, PipelineConfig};
use crate::ensemble::VoteOutcome;
use crate::error::{DegradationKind, ResolutionError};
use crate::morphology::{
    AnalysisCandidate, AuditEvent, ResolutionSource, ResolvedAnalysis, SentenceContext, SurfaceForm,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// A word after voting, ready for the escalation decision.
#[derive(Debug, Clone)]
pub struct WordState {
    pub surface: SurfaceForm,
    pub context: SentenceContext,
    /// One slot per registered analyzer
    pub candidates: Vec<Option<AnalysisCandidate>>,
    pub vote: VoteOutcome,
    pub trail: Vec<AuditEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    surface: String,
    context_hash: u64,
}

pub struct ArbitrationEscalator {
    arbiter: Option<Arc<dyn Arbiter>>,
    threshold: f64,
    timeout: Duration,
    scope: ContextScope,
    min_confidence: f64,
    on_total_failure: bool,
    cache_limit: usize,
    cache: DashMap<CacheKey, Arc<OnceCell<ArbitrationVerdict>>>,
}

impl ArbitrationEscalator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            arbiter: None,
            threshold: config.agreement_threshold,
            timeout: config.arbiter_timeout(),
            scope: config.arbitration_context,
            min_confidence: config.arbiter_min_confidence,
            on_total_failure: config.arbitrate_on_total_failure,
            cache_limit: config.arbitration_cache_limit.max(1),
            cache: DashMap::new(),
        }
    }

    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn has_arbiter(&self) -> bool {
        self.arbiter.is_some()
    }

    /// Cached verdicts
    pub fn cache_len(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Whether this vote calls for an arbiter.
    pub fn should_escalate(&self, vote: &VoteOutcome) -> bool {
        if vote.non_null == 0 {
            return self.on_total_failure && self.arbiter.is_some();
        }
        vote.below(self.threshold)
    }

    /// Finish a word: keep the ensemble result, or escalate and apply the
    /// verdict, or fall back when arbitration fails. Never errors.
    pub async fn maybe_arbitrate(&self, state: WordState) -> ResolvedAnalysis {
        let WordState {
            surface,
            context,
            candidates,
            vote,
            mut trail,
        } = state;

        if !self.should_escalate(&vote) {
            return finish_with_majority(&surface, &vote, trail, false);
        }

        let request = self.request_for(&surface, &context, &candidates, &vote);
        match self.arbitrate(&surface, &context, &request).await {
            Ok((arbiter, verdict)) => {
                let low_confidence = verdict.confidence < self.min_confidence;
                debug!(
                    surface = %surface,
                    lemma = %verdict.lemma,
                    confidence = verdict.confidence,
                    low_confidence,
                    "arbitrated"
                );
                trail.push(AuditEvent::Arbitration {
                    arbiter,
                    lemma: verdict.lemma.clone(),
                    pos: verdict.pos,
                    features: verdict.features,
                    confidence: verdict.confidence,
                    rationale: verdict.rationale.clone(),
                });
                ResolvedAnalysis {
                    surface_form: surface.as_str().to_string(),
                    lemma: Some(verdict.lemma),
                    pos: Some(verdict.pos),
                    features: verdict.features,
                    agreement_score: vote.agreement_score,
                    resolution_source: ResolutionSource::LlmArbitration,
                    low_confidence,
                    audit_trail: trail,
                }
            }
            Err(e) => {
                warn!(surface = %surface, error = %e, "arbitration failed, falling back to ensemble");
                trail.push(AuditEvent::Degraded {
                    kind: e.kind(),
                    detail: e.to_string(),
                });
                finish_with_majority(&surface, &vote, trail, true)
            }
        }
    }

    fn request_for(
        &self,
        surface: &SurfaceForm,
        context: &SentenceContext,
        candidates: &[Option<AnalysisCandidate>],
        vote: &VoteOutcome,
    ) -> ArbitrationRequest {
        let sentence = match self.scope {
            ContextScope::Sentence => Some(context.text()),
            ContextScope::Word => None,
        };
        ArbitrationRequest {
            surface_form: surface.as_str().to_string(),
            sentence,
            position: context.position(),
            candidates: candidates.iter().flatten().cloned().collect(),
            majority: vote.majority_candidate("ensemble"),
            lemma_agreement: vote.lemma_agreement,
            pos_agreement: vote.pos_agreement,
        }
    }

    fn key_for(&self, surface: &SurfaceForm, context: &SentenceContext) -> CacheKey {
        let context_hash = match self.scope {
            ContextScope::Sentence => context.content_hash(),
            ContextScope::Word => 0,
        };
        CacheKey {
            surface: surface.key().to_string(),
            context_hash,
        }
    }

    async fn arbitrate(
        &self,
        surface: &SurfaceForm,
        context: &SentenceContext,
        request: &ArbitrationRequest,
    ) -> Result<(String, ArbitrationVerdict), ResolutionError> {
        let arbiter = self
            .arbiter
            .as_ref()
            .ok_or_else(|| ResolutionError::ArbiterError("no arbiter configured".to_string()))?;

        let key = self.key_for(surface, context);
        if self.cache.len() >= self.cache_limit && !self.cache.contains_key(&key) {
            self.evict_settled();
        }
        let cell = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if cell.initialized() {
            debug!(surface = %surface, "arbitration cache hit");
        }

        let outcome = cell
            .get_or_try_init(|| async {
                if !arbiter.is_available().await {
                    return Err(ArbiterError::Unavailable(format!(
                        "{} is not available",
                        arbiter.id()
                    )));
                }
                let verdict = tokio::time::timeout(self.timeout, arbiter.arbitrate(request))
                    .await
                    .map_err(|_| ArbiterError::Timeout(self.timeout))??;
                verdict.validated()
            })
            .await;

        match outcome {
            Ok(verdict) => Ok((arbiter.id().to_string(), verdict.clone())),
            Err(e) => {
                self.cache.remove_if(&key, |_, cell| !cell.initialized());
                Err(e.into())
            }
        }
    }

    /// Drop every settled verdict; in-flight calls keep their cells.
    fn evict_settled(&self) {
        let before = self.cache.len();
        self.cache.retain(|_, cell| !cell.initialized());
        debug!(evicted = before - self.cache.len(), "arbitration cache full");
    }
}

impl std::fmt::Debug for ArbitrationEscalator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationEscalator")
            .field("arbiter", &self.arbiter.as_ref().map(|a| a.id().to_string()))
            .field("threshold", &self.threshold)
            .field("scope", &self.scope)
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// The ensemble outcome as a resolved word, or `unknown` if there was
/// no reading at all.
fn finish_with_majority(
    surface: &SurfaceForm,
    vote: &VoteOutcome,
    mut trail: Vec<AuditEvent>,
    low_confidence: bool,
) -> ResolvedAnalysis {
    match (&vote.majority_lemma, vote.majority_pos) {
        (Some(lemma), Some(pos)) => ResolvedAnalysis {
            surface_form: surface.as_str().to_string(),
            lemma: Some(lemma.clone()),
            pos: Some(pos),
            features: vote.majority_features,
            agreement_score: vote.agreement_score,
            resolution_source: ResolutionSource::EnsembleMajority,
            low_confidence,
            audit_trail: trail,
        },
        _ => {
            trail.push(AuditEvent::Degraded {
                kind: DegradationKind::AllAnalyzersFailed,
                detail: ResolutionError::AllAnalyzersFailed {
                    surface_form: surface.as_str().to_string(),
                }
                .to_string(),
            });
            ResolvedAnalysis::unknown(surface.as_str(), trail)
        }
    }
}
