//! ResolutionPipeline: per-word state machine over the four layers
//!
//! ```text
//! token ─► punctuation? ──yes──► known_word (PUNCT)
//!              │
//!              ▼
//!         SurfaceForm::parse ─✗─► unknown (invalid_surface_form)
//!              │
//!              ▼
//!         known lookup ──hit──► known_word   (analyzers only pick among
//!              │ miss                          ambiguous readings and cells)
//!              ▼
//!         analyzers (concurrent, bounded) ─► vote ─► escalate? ─► ensemble_majority
//!                                                        │          | llm_arbitration
//!                                                        │          | unknown
//! ```

use super::cancel::CancellationToken;
use super::types::{SentenceResolution, SentenceStatus};
use crate::analyzer::{AnalyzerAdapter, AnalyzerRegistry};
use crate::arbitration::{Arbiter, ArbitrationEscalator, WordState};
use crate::config::{ConfigError, PipelineConfig};
use crate::ensemble::EnsembleVoter;
use crate::error::ResolutionError;
use crate::known::KnownFormOverride;
use crate::morphology::{
    is_punctuation, normalize, AnalysisCandidate, AuditEvent, Features, Pos, ResolutionSource,
    ResolvedAnalysis, SentenceContext, SurfaceForm,
};
use crate::validation::{GlossDictionary, PlausibilityReport, TranslationPlausibilityValidator};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

struct PipelineInner {
    config: PipelineConfig,
    known: Arc<KnownFormOverride>,
    analyzers: AnalyzerRegistry,
    voter: EnsembleVoter,
    escalator: ArbitrationEscalator,
    validator: TranslationPlausibilityValidator,
    /// Bounds concurrent analyzer calls across every word in flight
    semaphore: Arc<Semaphore>,
}

/// Cheap to clone; clones share caches and the known table.
#[derive(Clone)]
pub struct ResolutionPipeline {
    inner: Arc<PipelineInner>,
}

impl ResolutionPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn known(&self) -> &Arc<KnownFormOverride> {
        &self.inner.known
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.inner.analyzers
    }

    pub fn escalator(&self) -> &ArbitrationEscalator {
        &self.inner.escalator
    }

    pub fn validator(&self) -> &TranslationPlausibilityValidator {
        &self.inner.validator
    }

    /// Resolve a single word within its sentence. Never fails: every
    /// problem ends in a degraded or `unknown` result.
    pub async fn resolve_word(&self, token: &str, context: &SentenceContext) -> ResolvedAnalysis {
        if is_punctuation(token) {
            return ResolvedAnalysis::punctuation(token, self.inner.analyzers.len());
        }
        let surface = match SurfaceForm::parse(token) {
            Ok(surface) => surface,
            Err(e) => {
                warn!(token = %token, error = %e, "rejected surface form");
                return ResolvedAnalysis::unknown(
                    token,
                    vec![AuditEvent::Degraded {
                        kind: e.kind(),
                        detail: e.to_string(),
                    }],
                );
            }
        };

        let known = self.inner.known.lookup(surface.key());
        let resolved = if known.is_empty() {
            self.resolve_by_ensemble(surface, context).await
        } else {
            self.resolve_known(surface, context, known).await
        };

        debug!(
            surface = %resolved.surface_form,
            lemma = resolved.lemma.as_deref().unwrap_or("-"),
            source = %resolved.resolution_source,
            agreement = resolved.agreement_score,
            low_confidence = resolved.low_confidence,
            "word resolved"
        );
        resolved
    }

    pub async fn resolve_sentence<I, S>(&self, tokens: I) -> SentenceResolution
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolve_sentence_with_cancel(tokens, &CancellationToken::new())
            .await
    }

    /// Resolve words in order, stopping between words (or during an
    /// arbitration) once `cancel` fires. The resolved prefix is kept.
    pub async fn resolve_sentence_with_cancel<I, S>(
        &self,
        tokens: I,
        cancel: &CancellationToken,
    ) -> SentenceResolution
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let context = SentenceContext::new(tokens.clone());
        let mut words = Vec::with_capacity(tokens.len());

        for (position, token) in tokens.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let word_context = context.at(position);
            let resolved = tokio::select! {
                resolved = self.resolve_word(token, &word_context) => Some(resolved),
                _ = cancel.cancelled() => None,
            };
            match resolved {
                Some(resolved) => words.push(resolved),
                None => break,
            }
        }

        if words.len() < tokens.len() {
            let unresolved = tokens[words.len()..].to_vec();
            debug!(resolved = words.len(), unresolved = unresolved.len(), "sentence cancelled");
            return SentenceResolution {
                words,
                report: None,
                status: SentenceStatus::Cancelled,
                unresolved,
            };
        }

        let report = self
            .inner
            .config
            .validate_sentences
            .then(|| self.inner.validator.validate(&words));
        SentenceResolution {
            words,
            report,
            status: SentenceStatus::Complete,
            unresolved: Vec::new(),
        }
    }

    /// Resolve independent sentences in parallel. Output order matches
    /// input order.
    pub async fn resolve_batch(&self, sentences: Vec<Vec<String>>) -> Vec<SentenceResolution> {
        let mut results: Vec<SentenceResolution> = sentences
            .iter()
            .map(|tokens| SentenceResolution::failed(tokens.clone()))
            .collect();

        let mut tasks = JoinSet::new();
        for (index, tokens) in sentences.into_iter().enumerate() {
            let pipeline = self.clone();
            tasks.spawn(async move { (index, pipeline.resolve_sentence(tokens).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, resolution)) => results[index] = resolution,
                Err(e) => warn!(error = %e, "sentence task failed"),
            }
        }
        results
    }

    /// Check resolved words against a known-good translation.
    pub fn validate_against_reference(&self, words: &[ResolvedAnalysis], reference: &str) -> PlausibilityReport {
        self.inner.validator.validate_against_reference(words, reference)
    }

    async fn resolve_by_ensemble(&self, surface: SurfaceForm, context: &SentenceContext) -> ResolvedAnalysis {
        let (candidates, mut trail) = self.run_analyzers(&surface, context).await;
        let vote = self.inner.voter.vote(&candidates);
        trail.push(vote_event(&vote));

        self.inner
            .escalator
            .maybe_arbitrate(WordState {
                surface,
                context: context.clone(),
                candidates,
                vote,
                trail,
            })
            .await
    }

    /// Lemma and POS come from the known table. Analyzers are consulted
    /// only to choose among several readings of the form: first the
    /// lemma/POS group, then the paradigm cell within it.
    async fn resolve_known(
        &self,
        surface: SurfaceForm,
        context: &SentenceContext,
        known: Vec<AnalysisCandidate>,
    ) -> ResolvedAnalysis {
        let groups = group_readings(&known);
        let mut trail = vec![AuditEvent::KnownEntryHit {
            candidates: known.clone(),
            analyzers_suppressed: self.inner.analyzers.len(),
        }];

        let ambiguous = groups.len() > 1 || groups.iter().any(|g| g.cells.len() > 1);
        let consult = ambiguous
            && self.inner.config.disambiguate_known_with_ensemble
            && !self.inner.analyzers.is_empty();
        let vote = if consult {
            let (candidates, analyzer_trail) = self.run_analyzers(&surface, context).await;
            trail.extend(analyzer_trail);
            let vote = self.inner.voter.vote(&candidates);
            trail.push(vote_event(&vote));
            Some(vote)
        } else {
            None
        };

        let chosen = if groups.len() == 1 {
            Some(0)
        } else {
            vote.as_ref().and_then(|v| {
                groups.iter().position(|g| {
                    v.majority_lemma.as_deref().map(normalize).as_deref() == Some(g.lemma)
                        && v.majority_pos == Some(g.pos)
                })
            })
        };

        let (index, hint, low_confidence) = match chosen {
            Some(index) => {
                let hint = vote.as_ref().map(|v| v.majority_features).unwrap_or_default();
                (index, hint, false)
            }
            None => {
                let error = ResolutionError::AmbiguousKnownForm {
                    surface_form: surface.as_str().to_string(),
                    readings: groups.len(),
                };
                warn!(surface = %surface, readings = groups.len(), "known reading left unresolved");
                trail.push(AuditEvent::Degraded {
                    kind: error.kind(),
                    detail: error.to_string(),
                });
                (0, Features::default(), true)
            }
        };
        let group = &groups[index];

        ResolvedAnalysis {
            surface_form: surface.as_str().to_string(),
            lemma: Some(group.lemma.to_string()),
            pos: Some(group.pos),
            features: pick_cells(&group.cells, &hint),
            agreement_score: 1.0,
            resolution_source: ResolutionSource::KnownWord,
            low_confidence,
            audit_trail: trail,
        }
    }

    /// Fan out to every analyzer, bounded by the pipeline semaphore and the
    /// per-call timeout. Slots stay in registration order.
    async fn run_analyzers(
        &self,
        surface: &SurfaceForm,
        context: &SentenceContext,
    ) -> (Vec<Option<AnalysisCandidate>>, Vec<AuditEvent>) {
        let analyzers = self.inner.analyzers.analyzers();
        let timeout = self.inner.config.analyzer_timeout();

        let mut outcomes: Vec<Result<Option<AnalysisCandidate>, ResolutionError>> = analyzers
            .iter()
            .map(|a| {
                Err(ResolutionError::AnalyzerUnavailable {
                    analyzer: a.id().to_string(),
                    reason: "analyzer task failed".to_string(),
                })
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (index, registered) in analyzers.iter().enumerate() {
            let adapter: Arc<dyn AnalyzerAdapter> = Arc::clone(&registered.adapter);
            let semaphore = Arc::clone(&self.inner.semaphore);
            let surface = surface.clone();
            let context = context.clone();
            tasks.spawn(async move {
                let unavailable = |reason: String| ResolutionError::AnalyzerUnavailable {
                    analyzer: adapter.id().to_string(),
                    reason,
                };
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, Err(unavailable("pipeline shut down".to_string()))),
                };
                let outcome = tokio::time::timeout(timeout, adapter.analyze(&surface, &context))
                    .await
                    .map_err(|_| unavailable(format!("timed out after {:?}", timeout)));
                (index, outcome)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = outcome,
                Err(e) => warn!(surface = %surface, error = %e, "analyzer task failed"),
            }
        }

        let mut trail = Vec::with_capacity(analyzers.len());
        let candidates = analyzers
            .iter()
            .zip(outcomes)
            .map(|(registered, outcome)| match outcome {
                Ok(Some(candidate)) => {
                    trail.push(AuditEvent::Candidate(candidate.clone()));
                    Some(candidate)
                }
                Ok(None) => {
                    trail.push(AuditEvent::NoCandidate {
                        analyzer: registered.id().to_string(),
                        reason: None,
                    });
                    None
                }
                Err(e) => {
                    warn!(surface = %surface, error = %e, "analyzer degraded");
                    trail.push(AuditEvent::NoCandidate {
                        analyzer: registered.id().to_string(),
                        reason: Some(e.to_string()),
                    });
                    trail.push(AuditEvent::Degraded {
                        kind: e.kind(),
                        detail: e.to_string(),
                    });
                    None
                }
            })
            .collect();
        (candidates, trail)
    }
}

impl std::fmt::Debug for ResolutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionPipeline")
            .field("known", &self.inner.known)
            .field("analyzers", &self.inner.analyzers)
            .field("escalator", &self.inner.escalator)
            .finish()
    }
}

fn vote_event(vote: &crate::ensemble::VoteOutcome) -> AuditEvent {
    AuditEvent::Vote {
        lemma: vote.majority_lemma.clone(),
        pos: vote.majority_pos,
        lemma_agreement: vote.lemma_agreement,
        pos_agreement: vote.pos_agreement,
        non_null: vote.non_null,
    }
}

/// One lemma/POS reading of a known form with every cell it fills.
struct KnownReading<'a> {
    lemma: &'a str,
    pos: Pos,
    cells: Vec<Features>,
}

/// Group known candidates by lemma and POS, in table order.
fn group_readings(known: &[AnalysisCandidate]) -> Vec<KnownReading<'_>> {
    let mut groups: Vec<KnownReading<'_>> = Vec::new();
    for candidate in known {
        match groups
            .iter_mut()
            .find(|g| g.lemma == candidate.lemma && g.pos == candidate.pos)
        {
            Some(group) => group.cells.push(candidate.features),
            None => groups.push(KnownReading {
                lemma: &candidate.lemma,
                pos: candidate.pos,
                cells: vec![candidate.features],
            }),
        }
    }
    groups
}

/// Cells compatible with `hint`; when several remain (or none do), keep
/// only the features they all share.
fn pick_cells(cells: &[Features], hint: &Features) -> Features {
    let matching: Vec<&Features> = cells.iter().filter(|c| c.is_compatible_with(hint)).collect();
    let pool: Vec<&Features> = if matching.is_empty() {
        cells.iter().collect()
    } else {
        matching
    };
    pool.iter()
        .skip(1)
        .fold(pool.first().map(|f| **f).unwrap_or_default(), |acc, f| acc.intersect(f))
}

/// Assembles a pipeline from its layers.
pub struct PipelineBuilder {
    config: PipelineConfig,
    known: Option<Arc<KnownFormOverride>>,
    analyzers: AnalyzerRegistry,
    arbiter: Option<Arc<dyn Arbiter>>,
    glosses: Option<GlossDictionary>,
    concurrency: Option<usize>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            known: None,
            analyzers: AnalyzerRegistry::new(),
            arbiter: None,
            glosses: None,
            concurrency: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_known(mut self, known: Arc<KnownFormOverride>) -> Self {
        self.known = Some(known);
        self
    }

    pub fn with_analyzer<A: AnalyzerAdapter + 'static>(mut self, analyzer: A) -> Self {
        self.analyzers.register(analyzer);
        self
    }

    pub fn with_weighted_analyzer<A: AnalyzerAdapter + 'static>(mut self, analyzer: A, weight: f64) -> Self {
        self.analyzers.register_weighted(analyzer, weight);
        self
    }

    pub fn with_registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.analyzers = registry;
        self
    }

    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn with_glosses(mut self, glosses: GlossDictionary) -> Self {
        self.glosses = Some(glosses);
        self
    }

    /// Cap on concurrent analyzer calls (default: one per analyzer)
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    pub fn build(self) -> Result<ResolutionPipeline, ConfigError> {
        self.config.validate()?;

        let mut analyzers = self.analyzers;
        for (id, weight) in &self.config.analyzer_weights {
            if !analyzers.set_weight(id, *weight) {
                warn!(analyzer = %id, "weight configured for unregistered analyzer");
            }
        }

        let mut escalator = ArbitrationEscalator::new(&self.config);
        if let Some(arbiter) = self.arbiter {
            escalator = escalator.with_arbiter(arbiter);
        }

        let permits = self.concurrency.unwrap_or(analyzers.len()).max(1);
        Ok(ResolutionPipeline {
            inner: Arc::new(PipelineInner {
                voter: EnsembleVoter::with_weights(analyzers.weights()),
                known: self
                    .known
                    .unwrap_or_else(|| Arc::new(KnownFormOverride::default())),
                validator: TranslationPlausibilityValidator::new(self.glosses.unwrap_or_default()),
                semaphore: Arc::new(Semaphore::new(permits)),
                escalator,
                analyzers,
                config: self.config,
            }),
        })
    }
}
