//! LLM client: the completion boundary the LLM arbiter talks through
//!
//! Two implementations:
//! - `CommandClient`: pipes the prompt to an external command and reads the
//!   completion from its stdout (production; any CLI wrapper around a model)
//! - `MockClient`: returns preconfigured responses (testing)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// A model's reply to one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    /// Provider metadata (usage, latency), passed through untouched
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Errors from LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM not available: {0}")]
    Unavailable(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("completion failed: {0}")]
    CompletionFailed(String),
    #[error("response parse error: {0}")]
    ParseError(String),
}

/// Client trait for calling a language model.
///
/// Abstracts over transport (subprocess, HTTP, mock) so the arbiter
/// doesn't depend on how the model is reached.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn complete(&self, model: &str, prompt: &str) -> Result<CompletionResponse, LlmError>;
}

/// Runs `program args..` once per prompt: prompt on stdin, completion on
/// stdout. The model name is exported as `LEMMATA_MODEL`.
pub struct CommandClient {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl LlmClient for CommandClient {
    async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok()
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<CompletionResponse, LlmError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("LEMMATA_MODEL", model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LlmError::Unavailable(format!("failed to start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LlmError::Unavailable("no stdin available".to_string()))?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| LlmError::CompletionFailed(format!("failed to write prompt: {}", e)))?;
        drop(stdin);

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| LlmError::CompletionFailed("request timed out".to_string()))?
            .map_err(|e| LlmError::CompletionFailed(format!("failed to read output: {}", e)))?;

        if !output.status.success() {
            return Err(LlmError::CompletionFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let text = String::from_utf8(output.stdout)
            .map_err(|e| LlmError::ParseError(format!("completion is not UTF-8: {}", e)))?;
        Ok(CompletionResponse {
            text,
            model: model.to_string(),
            metadata: serde_json::Value::Null,
        })
    }
}

/// Mock client for testing. Returns preconfigured responses.
pub struct MockClient {
    available: bool,
    responses: HashMap<String, Result<String, String>>,
}

impl MockClient {
    /// Create a mock client that reports as available.
    pub fn available() -> Self {
        Self {
            available: true,
            responses: HashMap::new(),
        }
    }

    /// Create a mock client that reports as unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            responses: HashMap::new(),
        }
    }

    /// Register a completion for a specific model.
    pub fn with_response(mut self, model: impl Into<String>, text: impl Into<String>) -> Self {
        self.responses.insert(model.into(), Ok(text.into()));
        self
    }

    /// Register a failure for a specific model.
    pub fn with_failure(mut self, model: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses.insert(model.into(), Err(message.into()));
        self
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn complete(&self, model: &str, _prompt: &str) -> Result<CompletionResponse, LlmError> {
        if !self.available {
            return Err(LlmError::Unavailable(
                "mock client configured as unavailable".to_string(),
            ));
        }

        match self.responses.get(model) {
            Some(Ok(text)) => Ok(completion(model, text)),
            Some(Err(message)) => Err(LlmError::CompletionFailed(format!(
                "mock failure for model '{}': {}",
                model, message
            ))),
            None => Err(LlmError::ModelNotFound(format!(
                "no mock response for model '{}'",
                model
            ))),
        }
    }
}

/// Helper to construct a CompletionResponse.
pub fn completion(model: &str, text: &str) -> CompletionResponse {
    CompletionResponse {
        text: text.to_string(),
        model: model.to_string(),
        metadata: serde_json::Value::Null,
    }
}
