//! The arbiter boundary: requests, verdicts, and the trait arbiters implement

use crate::error::ResolutionError;
use crate::morphology::{AnalysisCandidate, Features, Pos};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("arbiter unavailable: {0}")]
    Unavailable(String),

    #[error("arbiter timed out after {0:?}")]
    Timeout(Duration),

    #[error("arbitration failed: {0}")]
    Failed(String),

    #[error("malformed verdict: {0}")]
    Malformed(String),
}

impl From<ArbiterError> for ResolutionError {
    fn from(err: ArbiterError) -> Self {
        match err {
            ArbiterError::Timeout(d) => ResolutionError::ArbiterTimeout(d),
            other => ResolutionError::ArbiterError(other.to_string()),
        }
    }
}

/// Everything an arbiter sees about one disputed word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub surface_form: String,
    /// Full sentence text; `None` when arbitrating the bare word
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
    pub position: usize,
    /// Non-null candidates in registration order, rationale included
    pub candidates: Vec<AnalysisCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub majority: Option<AnalysisCandidate>,
    pub lemma_agreement: f64,
    pub pos_agreement: f64,
}

/// An arbiter's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationVerdict {
    pub lemma: String,
    pub pos: Pos,
    #[serde(default)]
    pub features: Features,
    /// In [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
}

impl ArbitrationVerdict {
    pub fn new(lemma: impl Into<String>, pos: Pos) -> Self {
        Self {
            lemma: lemma.into(),
            pos,
            features: Features::default(),
            confidence: 1.0,
            rationale: String::new(),
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Reject verdicts that cannot be applied; clamp confidence.
    pub(crate) fn validated(mut self) -> Result<Self, ArbiterError> {
        self.lemma = crate::morphology::normalize(&self.lemma);
        if self.lemma.is_empty() {
            return Err(ArbiterError::Malformed("empty lemma".to_string()));
        }
        if !self.confidence.is_finite() {
            return Err(ArbiterError::Malformed(format!(
                "confidence {} is not a number",
                self.confidence
            )));
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        Ok(self)
    }
}

/// A higher-cost resolver for low-agreement words: an LLM, a human review
/// queue, anything that can answer an `ArbitrationRequest`.
#[async_trait]
pub trait Arbiter: Send + Sync {
    fn id(&self) -> &str;

    /// Cheap readiness probe, checked before each call.
    async fn is_available(&self) -> bool {
        true
    }

    async fn arbitrate(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<ArbitrationVerdict, ArbiterError>;
}
