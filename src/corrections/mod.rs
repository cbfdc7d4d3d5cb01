//! Correction learning
//!
//! Reviewer and arbiter corrections are appended to a log. Readings that
//! recur often enough are promoted into the known-word table as one
//! auditable snapshot swap.

mod log;
mod sqlite;
mod store;
mod types;

pub use log::{CorrectionLog, MemoryCorrectionLog, OpenLog, StorageError, StorageResult};
pub use sqlite::SqliteCorrectionLog;
pub use store::{CorrectionError, CorrectionLearningStore};
pub use types::{
    Correction, PromotedForm, PromotionCriteria, PromotionEvent, PromotionReport, Provenance, RecordOutcome,
};
