//! SchemeAdapter: a native analyzer plus its tag scheme

use super::scheme::TagScheme;
use super::traits::{AnalyzerAdapter, AnalyzerError, NativeAnalyzer};
use crate::morphology::{normalize, AnalysisCandidate, SentenceContext, SurfaceForm};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps a `NativeAnalyzer` so its output arrives in the canonical
/// vocabulary. Failures, timeouts and undecodable tags all become `None`.
pub struct SchemeAdapter<N, S> {
    id: String,
    native: N,
    scheme: S,
    timeout: Duration,
}

impl<N: NativeAnalyzer, S: TagScheme> SchemeAdapter<N, S> {
    pub fn new(id: impl Into<String>, native: N, scheme: S) -> Self {
        Self {
            id: id.into(),
            native,
            scheme,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn try_analyze(
        &self,
        surface: &SurfaceForm,
        context: &SentenceContext,
    ) -> Result<Option<AnalysisCandidate>, AnalyzerError> {
        let native = tokio::time::timeout(self.timeout, self.native.analyze(surface.as_str(), context))
            .await
            .map_err(|_| AnalyzerError::Timeout(self.timeout))??;

        let Some(native) = native else {
            return Ok(None);
        };
        let (pos, features) = self.scheme.decode(&native)?;
        let lemma = normalize(&native.lemma);
        if lemma.is_empty() {
            return Err(AnalyzerError::Failed("empty lemma".to_string()));
        }
        Ok(Some(
            AnalysisCandidate::new(&self.id, lemma, pos)
                .with_features(features)
                .with_rationale(format!("{} tag {}", self.scheme.name(), native.tag)),
        ))
    }
}

#[async_trait]
impl<N: NativeAnalyzer, S: TagScheme> AnalyzerAdapter for SchemeAdapter<N, S> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(
        &self,
        surface: &SurfaceForm,
        context: &SentenceContext,
    ) -> Option<AnalysisCandidate> {
        match self.try_analyze(surface, context).await {
            Ok(candidate) => {
                if candidate.is_none() {
                    debug!(analyzer = %self.id, surface = %surface, "no reading");
                }
                candidate
            }
            Err(e) => {
                warn!(analyzer = %self.id, surface = %surface, error = %e, "analyzer degraded");
                None
            }
        }
    }
}
