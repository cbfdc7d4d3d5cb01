//! KnownFormOverride: the curated surface-form table
//!
//! Readers clone an `Arc<KnownSnapshot>` and never block writers for longer
//! than a pointer copy. Writers are serialized, build the next snapshot in
//! full, then publish it with one swap.

use super::entry::{KnownEntry, KnownEntryConflict};
use crate::morphology::{normalize, AnalysisCandidate, Case, DeclensionClass, Features, Gender, Pos};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum KnownTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid known entry '{lemma}': {reason}")]
    InvalidEntry { lemma: String, reason: String },
}

/// How a proposed reading relates to the current table.
#[derive(Debug, Clone, PartialEq)]
pub enum KnownStatus {
    /// The surface form is not in the table
    Absent,
    /// The table already carries a compatible reading
    Present,
    /// The table reads the form differently
    Conflict(KnownEntryConflict),
}

/// An immutable, fully-indexed view of the table.
#[derive(Debug, Default)]
pub struct KnownSnapshot {
    entries: BTreeMap<String, KnownEntry>,
    index: HashMap<String, Vec<AnalysisCandidate>>,
    version: u64,
}

impl KnownSnapshot {
    fn build(entries: BTreeMap<String, KnownEntry>, version: u64) -> Self {
        let mut index: HashMap<String, Vec<AnalysisCandidate>> = HashMap::new();
        for entry in entries.values() {
            for surface in entry.paradigm.keys() {
                index
                    .entry(surface.clone())
                    .or_default()
                    .extend(entry.candidates_for(surface));
            }
        }
        Self {
            entries,
            index,
            version,
        }
    }

    pub fn lookup(&self, surface: &str) -> &[AnalysisCandidate] {
        self.index
            .get(&normalize(surface))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn entries(&self) -> &BTreeMap<String, KnownEntry> {
        &self.entries
    }

    pub fn entry(&self, lemma: &str) -> Option<&KnownEntry> {
        self.entries.get(&normalize(lemma))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of distinct surface forms.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Classify a proposed reading against the table.
    pub fn status_of(&self, surface: &str, proposed: &AnalysisCandidate) -> KnownStatus {
        let existing = self.lookup(surface);
        if existing.is_empty() {
            return KnownStatus::Absent;
        }
        let agrees = existing.iter().any(|known| {
            known.lemma == proposed.lemma
                && known.pos == proposed.pos
                && known.features.is_compatible_with(&proposed.features)
        });
        if agrees {
            KnownStatus::Present
        } else {
            KnownStatus::Conflict(KnownEntryConflict {
                surface_form: normalize(surface),
                existing: existing.to_vec(),
                proposed: proposed.clone(),
            })
        }
    }
}

pub struct KnownFormOverride {
    current: RwLock<Arc<KnownSnapshot>>,
    writer: Mutex<()>,
}

impl KnownFormOverride {
    pub fn empty() -> Self {
        Self::from_entries(Vec::new())
    }

    pub fn from_entries(entries: impl IntoIterator<Item = KnownEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|e| {
                let key = e.lemma.clone();
                let e = e.normalized(&key);
                (e.lemma.clone(), e)
            })
            .collect();
        Self {
            current: RwLock::new(Arc::new(KnownSnapshot::build(map, 1))),
            writer: Mutex::new(()),
        }
    }

    /// Load a table from YAML (`.yaml`/`.yml`) or JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnownTableError> {
        let entries = read_entries(path.as_ref())?;
        let table = Self::from_entries(entries.into_values());
        info!(path = %path.as_ref().display(), forms = table.len(), "known table loaded");
        Ok(table)
    }

    /// Replace the table from disk. On error the current snapshot stays.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<u64, KnownTableError> {
        let entries = read_entries(path.as_ref())?;
        let snapshot = self.update(|_| entries)?;
        info!(
            path = %path.as_ref().display(),
            version = snapshot.version(),
            forms = snapshot.len(),
            "known table reloaded"
        );
        Ok(snapshot.version())
    }

    /// Write the current table, via a temp file renamed into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), KnownTableError> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let text = if is_yaml(path) {
            serde_yaml::to_string(snapshot.entries())?
        } else {
            serde_json::to_string_pretty(snapshot.entries())?
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "known".to_string());
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Known readings of a surface form, in curated order. Empty on a miss.
    pub fn lookup(&self, surface: &str) -> Vec<AnalysisCandidate> {
        self.snapshot().lookup(surface).to_vec()
    }

    pub fn snapshot(&self) -> Arc<KnownSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn contains(&self, surface: &str) -> bool {
        !self.snapshot().lookup(surface).is_empty()
    }

    /// Copy-and-swap. `f` sees the current entries and returns the next
    /// full set; the new snapshot is published only after it is built and
    /// every entry validates.
    pub fn update<F>(&self, f: F) -> Result<Arc<KnownSnapshot>, KnownTableError>
    where
        F: FnOnce(&BTreeMap<String, KnownEntry>) -> BTreeMap<String, KnownEntry>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let next_entries = f(current.entries())
            .into_iter()
            .map(|(key, e)| {
                let e = e.normalized(&key);
                (e.lemma.clone(), e)
            })
            .collect::<BTreeMap<_, _>>();
        for entry in next_entries.values() {
            validate_entry(entry)?;
        }
        let next = Arc::new(KnownSnapshot::build(next_entries, current.version() + 1));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        Ok(next)
    }
}

impl Default for KnownFormOverride {
    /// The curated first-declension masculine nouns that analyzers
    /// routinely misread as feminine or verbal.
    fn default() -> Self {
        Self::from_entries(curated_entries())
    }
}

impl std::fmt::Debug for KnownFormOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("KnownFormOverride")
            .field("version", &snapshot.version())
            .field("forms", &snapshot.len())
            .finish()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, KnownEntry>, KnownTableError> {
    let text = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, KnownEntry> = if is_yaml(path) {
        serde_yaml::from_str(&text)?
    } else {
        serde_json::from_str(&text)?
    };
    let entries: BTreeMap<String, KnownEntry> = raw
        .into_iter()
        .map(|(key, e)| {
            let e = e.normalized(&key);
            (e.lemma.clone(), e)
        })
        .collect();
    for entry in entries.values() {
        validate_entry(entry)?;
    }
    Ok(entries)
}

fn validate_entry(entry: &KnownEntry) -> Result<(), KnownTableError> {
    if entry.lemma.is_empty() {
        return Err(KnownTableError::InvalidEntry {
            lemma: entry.lemma.clone(),
            reason: "empty lemma".to_string(),
        });
    }
    if let Some((surface, _)) = entry.paradigm.iter().find(|(_, cells)| cells.0.is_empty()) {
        return Err(KnownTableError::InvalidEntry {
            lemma: entry.lemma.clone(),
            reason: format!("surface form '{}' has no paradigm cells", surface),
        });
    }
    Ok(())
}

/// Full first-declension masculine paradigm for a lemma in -a, built from
/// the shared ending table. Vocatives are left out.
fn first_declension_masculine(lemma: &str) -> KnownEntry {
    let class = DeclensionClass::First;
    let stem = class.stem(lemma).unwrap_or(lemma);
    let mut entry = KnownEntry::new(lemma, Pos::Noun)
        .with_class("1st")
        .with_gender(Gender::Masculine);
    for &(ending, case, number) in class.cells() {
        if case == Case::Vocative {
            continue;
        }
        let cell = Features::new().with_case(case).with_number(number);
        entry.add_form(&format!("{}{}", stem, ending), cell);
    }
    entry
}

/// Seed entries: masculine nouns of the first declension.
pub fn curated_entries() -> Vec<KnownEntry> {
    ["nauta", "agricola", "pirata", "poeta", "scriba", "incola"]
        .into_iter()
        .map(first_declension_masculine)
        .collect()
}
