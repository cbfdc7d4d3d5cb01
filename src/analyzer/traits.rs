//! Analyzer traits defining the morphological analysis interface

use crate::morphology::{AnalysisCandidate, SentenceContext, SurfaceForm};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),

    #[error("analysis failed: {0}")]
    Failed(String),

    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot decode tag {tag:?}: {reason}")]
    Decode { tag: String, reason: String },
}

/// Raw output of a native analyzer before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeAnalysis {
    pub lemma: String,
    /// POS tag in the analyzer's own scheme (UPOS, XPOS, ...)
    pub tag: String,
    /// Morphological feature string, if the scheme carries one separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feats: Option<String>,
}

impl NativeAnalysis {
    pub fn new(lemma: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            tag: tag.into(),
            feats: None,
        }
    }

    pub fn with_feats(mut self, feats: impl Into<String>) -> Self {
        self.feats = Some(feats.into());
        self
    }
}

/// An opaque external analyzer (a trained model, a service, a lookup).
///
/// `Ok(None)` means the analyzer has no reading for the word.
#[async_trait]
pub trait NativeAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        surface: &str,
        context: &SentenceContext,
    ) -> Result<Option<NativeAnalysis>, AnalyzerError>;
}

/// Uniform analyzer interface.
///
/// Implementations map their analyzer's output into the canonical
/// vocabulary and turn every failure into `None`; the ensemble never
/// sees an error.
///
/// # Example
///
/// ```ignore
/// struct Latinist;
///
/// #[async_trait]
/// impl AnalyzerAdapter for Latinist {
///     fn id(&self) -> &str { "latinist" }
///
///     async fn analyze(&self, surface: &SurfaceForm, _ctx: &SentenceContext)
///         -> Option<AnalysisCandidate>
///     {
///         (surface.key() == "amat")
///             .then(|| AnalysisCandidate::new("latinist", "amo", Pos::Verb))
///     }
/// }
/// ```
#[async_trait]
pub trait AnalyzerAdapter: Send + Sync {
    /// Unique identifier, recorded as the candidate source
    fn id(&self) -> &str;

    async fn analyze(
        &self,
        surface: &SurfaceForm,
        context: &SentenceContext,
    ) -> Option<AnalysisCandidate>;
}

/// An adapter together with its prior weight.
#[derive(Clone)]
pub struct RegisteredAnalyzer {
    pub adapter: Arc<dyn AnalyzerAdapter>,
    pub weight: f64,
}

impl RegisteredAnalyzer {
    pub fn id(&self) -> &str {
        self.adapter.id()
    }
}

/// Adapters in registration order. Order is the final tie-breaker in
/// voting, so it is never re-sorted.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<RegisteredAnalyzer>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with the default weight of 1.0.
    pub fn register<A: AnalyzerAdapter + 'static>(&mut self, analyzer: A) {
        self.register_weighted(analyzer, 1.0);
    }

    pub fn register_weighted<A: AnalyzerAdapter + 'static>(&mut self, analyzer: A, weight: f64) {
        self.register_shared(Arc::new(analyzer), weight);
    }

    pub fn register_shared(&mut self, adapter: Arc<dyn AnalyzerAdapter>, weight: f64) {
        self.analyzers.push(RegisteredAnalyzer { adapter, weight });
    }

    /// Override weights by analyzer id.
    pub fn set_weight(&mut self, id: &str, weight: f64) -> bool {
        let mut found = false;
        for analyzer in self.analyzers.iter_mut().filter(|a| a.id() == id) {
            analyzer.weight = weight;
            found = true;
        }
        found
    }

    pub fn analyzers(&self) -> &[RegisteredAnalyzer] {
        &self.analyzers
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredAnalyzer> {
        self.analyzers.iter().find(|a| a.id() == id)
    }

    /// Weights in registration order
    pub fn weights(&self) -> Vec<f64> {
        self.analyzers.iter().map(|a| a.weight).collect()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.analyzers.iter().map(|a| (a.id(), a.weight)))
            .finish()
    }
}
