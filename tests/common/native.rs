//! Deterministic `NativeAnalyzer` for tests

use async_trait::async_trait;
use lemmata::analyzer::{AnalyzerError, NativeAnalysis, NativeAnalyzer};
use lemmata::SentenceContext;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers from a table keyed by lower-cased surface form. Words marked
/// with `failing_on` return an error instead.
#[derive(Default)]
pub struct ScriptedNative {
    answers: HashMap<String, NativeAnalysis>,
    failures: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedNative {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(mut self, surface: &str, analysis: NativeAnalysis) -> Self {
        self.answers.insert(surface.to_lowercase(), analysis);
        self
    }

    pub fn failing_on(mut self, surface: &str) -> Self {
        self.failures.push(surface.to_lowercase());
        self
    }

    /// Shared call counter, readable after the analyzer moves into a pipeline
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl NativeAnalyzer for ScriptedNative {
    async fn analyze(
        &self,
        surface: &str,
        _context: &SentenceContext,
    ) -> Result<Option<NativeAnalysis>, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = surface.to_lowercase();
        if self.failures.contains(&key) {
            return Err(AnalyzerError::Failed(format!("model crashed on '{}'", surface)));
        }
        Ok(self.answers.get(&key).cloned())
    }
}

pub fn sentence(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}
