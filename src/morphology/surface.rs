//! Surface forms and the sentence snapshot analyzers see

use crate::error::ResolutionError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A validated surface form as it appears in text.
///
/// Keeps the literal spelling; `key()` is the case-normalized lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceForm {
    literal: String,
    key: String,
}

impl SurfaceForm {
    /// Validate a token. Letters, optionally joined by internal hyphens or
    /// apostrophes; no whitespace.
    pub fn parse(token: &str) -> Result<Self, ResolutionError> {
        let literal = token.trim();
        if literal.is_empty() {
            return Err(ResolutionError::InvalidSurfaceForm {
                token: token.to_string(),
                reason: "empty token".to_string(),
            });
        }
        if literal.chars().any(char::is_whitespace) {
            return Err(ResolutionError::InvalidSurfaceForm {
                token: token.to_string(),
                reason: "contains whitespace".to_string(),
            });
        }

        let chars: Vec<char> = literal.chars().collect();
        for (i, ch) in chars.iter().enumerate() {
            let joiner = matches!(ch, '-' | '\'' | '’');
            let interior = i > 0 && i + 1 < chars.len();
            if !(ch.is_alphabetic() || (joiner && interior)) {
                return Err(ResolutionError::InvalidSurfaceForm {
                    token: token.to_string(),
                    reason: format!("unexpected character {:?}", ch),
                });
            }
        }

        Ok(Self {
            literal: literal.to_string(),
            key: normalize(literal),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.literal
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for SurfaceForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

/// Whether a token is made only of punctuation marks.
pub fn is_punctuation(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty()
        && token.chars().all(|c| {
            c.is_ascii_punctuation() || matches!(c, '«' | '»' | '–' | '—' | '…' | '“' | '”' | '‘' | '’' | '·')
        })
}

/// Case-normalize a surface string for lookups.
pub fn normalize(surface: &str) -> String {
    surface.trim().to_lowercase()
}

/// Immutable snapshot of the sentence a word occurs in.
///
/// Cheap to clone; every analyzer call for a sentence shares one token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceContext {
    tokens: Arc<[String]>,
    position: usize,
}

impl SentenceContext {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: tokens.into(),
            position: 0,
        }
    }

    /// The same sentence, focused on another word.
    pub fn at(&self, position: usize) -> Self {
        Self {
            tokens: Arc::clone(&self.tokens),
            position,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Stable hash of the normalized sentence text.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for token in self.tokens.iter() {
            normalize(token).hash(&mut hasher);
        }
        hasher.finish()
    }
}
