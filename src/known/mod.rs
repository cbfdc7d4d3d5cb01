//! Known-word override layer
//!
//! Curated and promoted paradigms that always win over analyzer output.

mod entry;
mod table;

pub use entry::{KnownEntry, KnownEntryConflict, ParadigmCells, KNOWN_SOURCE};
pub use table::{curated_entries, KnownFormOverride, KnownSnapshot, KnownStatus, KnownTableError};
