//! LLM-backed arbiter
//!
//! Builds a Latin-expert prompt from the request and parses the verdict from
//! the completion. Models answer either with a JSON object or with
//! `KEY: value` lines:
//!
//! ```text
//! LEMMA: nauta
//! POS: NOUN
//! CASE: accusative
//! NUMBER: singular
//! REASONING: -am is the first declension accusative singular
//! ```

use super::arbiter::{Arbiter, ArbiterError, ArbitrationRequest, ArbitrationVerdict};
use super::llm::{LlmClient, LlmError};
use crate::morphology::{Case, Features, Gender, Number, Pos, Tense};
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

pub struct LlmArbiter {
    id: String,
    client: Arc<dyn LlmClient>,
    model: String,
    default_confidence: f64,
}

impl LlmArbiter {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            id: "llm".to_string(),
            client,
            model: model.into(),
            default_confidence: 0.8,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Confidence assigned when the model does not state one
    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence;
        self
    }
}

/// Render the arbitration prompt.
pub fn build_prompt(request: &ArbitrationRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a Latin language expert. Several parsing models disagree on a word. \
         Please determine the correct lemma and part of speech."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Word: \"{}\"", request.surface_form);
    if let Some(sentence) = &request.sentence {
        let _ = writeln!(prompt, "Sentence: \"{}\"", sentence);
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Model votes:");
    for c in &request.candidates {
        let _ = write!(prompt, "- {}: {} ({})", c.source, c.lemma, c.pos);
        let features = describe(&c.features);
        if !features.is_empty() {
            let _ = write!(prompt, " {}", features);
        }
        if let Some(rationale) = &c.rationale {
            let _ = write!(prompt, " - \"{}\"", rationale);
        }
        let _ = writeln!(prompt);
    }
    let _ = writeln!(
        prompt,
        "Agreement: lemma {:.2}, part of speech {:.2}",
        request.lemma_agreement, request.pos_agreement
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Provide your answer in this format:");
    let _ = writeln!(prompt, "LEMMA: <lemma>");
    let _ = writeln!(prompt, "POS: <NOUN/VERB/etc>");
    let _ = writeln!(prompt, "CASE: <case, if nominal>");
    let _ = writeln!(prompt, "NUMBER: <singular/plural, if nominal>");
    let _ = writeln!(prompt, "REASONING: <brief explanation>");
    prompt
}

fn describe(features: &Features) -> String {
    let mut parts = Vec::new();
    if let Some(case) = features.case {
        parts.push(case.to_string());
    }
    if let Some(number) = features.number {
        parts.push(format!("{:?}", number).to_lowercase());
    }
    if let Some(gender) = features.gender {
        parts.push(format!("{:?}", gender).to_lowercase());
    }
    if let Some(tense) = features.tense {
        parts.push(format!("{:?}", tense).to_lowercase());
    }
    parts.join(" ")
}

/// Extract a JSON object from LLM response text.
///
/// Handles: bare JSON, ```json fenced blocks, JSON embedded in prose.
fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    // Try 1: Direct parse
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    // Try 2: Extract from fenced code block
    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    // Try 3: Find first { to last }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

/// Raw fields pulled out of a completion, keys lower-cased.
fn fields(text: &str) -> Vec<(String, String)> {
    if let Some(serde_json::Value::Object(map)) = extract_json(text) {
        return map
            .into_iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((k.to_lowercase(), value))
            })
            .collect();
    }

    let mut out: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);
        match line.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() && !key.contains(' ') => {
                out.push((key.trim().trim_end_matches('*').to_lowercase(), value.trim().to_string()));
            }
            // Reasoning often runs over several lines.
            _ => {
                if let Some((key, value)) = out.last_mut() {
                    if key == "reasoning" && !line.is_empty() {
                        value.push(' ');
                        value.push_str(line);
                    }
                }
            }
        }
    }
    out
}

/// Parse a completion into a verdict.
pub fn parse_verdict(text: &str, default_confidence: f64) -> Result<ArbitrationVerdict, ArbiterError> {
    let fields = fields(text);
    let get = |key: &str| {
        fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim().trim_matches(['"', '\'', '*']).to_string())
            .filter(|v| !v.is_empty())
    };

    let lemma = get("lemma").ok_or_else(|| ArbiterError::Malformed("no LEMMA in response".to_string()))?;
    let pos: Pos = get("pos")
        .ok_or_else(|| ArbiterError::Malformed("no POS in response".to_string()))?
        .parse()
        .map_err(ArbiterError::Malformed)?;

    // Optional fields are dropped when they do not parse.
    let features = Features {
        case: get("case").and_then(|v| v.parse::<Case>().ok()),
        number: get("number").and_then(|v| v.parse::<Number>().ok()),
        gender: get("gender").and_then(|v| v.parse::<Gender>().ok()),
        tense: get("tense").and_then(|v| v.replace(' ', "_").parse::<Tense>().ok()),
    };
    let confidence = get("confidence")
        .and_then(|v| v.trim_end_matches('%').parse::<f64>().ok())
        .map(|c| if c > 1.0 { c / 100.0 } else { c })
        .unwrap_or(default_confidence);

    Ok(ArbitrationVerdict {
        lemma,
        pos,
        features,
        confidence,
        rationale: get("reasoning").unwrap_or_default(),
    })
}

impl From<LlmError> for ArbiterError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(msg) | LlmError::ModelNotFound(msg) => ArbiterError::Unavailable(msg),
            LlmError::CompletionFailed(msg) => ArbiterError::Failed(msg),
            LlmError::ParseError(msg) => ArbiterError::Malformed(msg),
        }
    }
}

#[async_trait]
impl Arbiter for LlmArbiter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    async fn arbitrate(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<ArbitrationVerdict, ArbiterError> {
        let prompt = build_prompt(request);
        debug!(arbiter = %self.id, model = %self.model, surface = %request.surface_form, "requesting arbitration");
        let response = self.client.complete(&self.model, &prompt).await?;
        parse_verdict(&response.text, self.default_confidence)
    }
}
