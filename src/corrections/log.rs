//! Append-only correction log
//!
//! The learning store writes every correction and every promotion through
//! `CorrectionLog`. `MemoryCorrectionLog` is for tests and one-shot runs;
//! `SqliteCorrectionLog` persists across sessions.

use super::types::{Correction, PromotionEvent};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors from correction log operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result type for correction log operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only storage for corrections and promotion events.
///
/// Reads return records in append order.
pub trait CorrectionLog: Send + Sync {
    fn append(&self, correction: &Correction) -> StorageResult<()>;

    fn corrections(&self) -> StorageResult<Vec<Correction>>;

    /// Corrections for one surface form (case-insensitive)
    fn corrections_for(&self, surface: &str) -> StorageResult<Vec<Correction>> {
        let key = crate::morphology::normalize(surface);
        Ok(self
            .corrections()?
            .into_iter()
            .filter(|c| c.surface_key() == key)
            .collect())
    }

    fn record_promotion(&self, event: &PromotionEvent) -> StorageResult<()>;

    fn promotions(&self) -> StorageResult<Vec<PromotionEvent>>;

    fn len(&self) -> StorageResult<usize> {
        Ok(self.corrections()?.len())
    }

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Log backends that can be opened from a path.
pub trait OpenLog: CorrectionLog + Sized {
    /// Open or create a log at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    fn open_in_memory() -> StorageResult<Self>;
}

/// Process-local log.
#[derive(Debug, Default)]
pub struct MemoryCorrectionLog {
    corrections: Mutex<Vec<Correction>>,
    promotions: Mutex<Vec<PromotionEvent>>,
}

impl MemoryCorrectionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorrectionLog for MemoryCorrectionLog {
    fn append(&self, correction: &Correction) -> StorageResult<()> {
        self.corrections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(correction.clone());
        Ok(())
    }

    fn corrections(&self) -> StorageResult<Vec<Correction>> {
        Ok(self
            .corrections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn record_promotion(&self, event: &PromotionEvent) -> StorageResult<()> {
        self.promotions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn promotions(&self) -> StorageResult<Vec<PromotionEvent>> {
        Ok(self
            .promotions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self
            .corrections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }
}
