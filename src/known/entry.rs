//! Known-word entries and their on-disk shape
//!
//! File format (YAML or JSON), keyed by lemma:
//!
//! ```yaml
//! nauta:
//!   pos: NOUN
//!   inflection_class: 1st
//!   gender: masculine
//!   paradigm:
//!     nautam: { case: accusative, number: singular }
//!     nautae:
//!       - { case: genitive, number: singular }
//!       - { case: dative, number: singular }
//!       - { case: nominative, number: plural }
//! ```

use crate::morphology::{normalize, AnalysisCandidate, Features, Gender, Pos};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Source id carried by candidates that come from the known table.
pub const KNOWN_SOURCE: &str = "known-words";

/// The paradigm cells one surface form fills. Serialized as a single
/// feature map when there is exactly one cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParadigmCells(pub Vec<Features>);

impl Serialize for ParadigmCells {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ParadigmCells {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<Features>),
            One(Features),
        }
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::Many(cells) => Self(cells),
            OneOrMany::One(cell) => Self(vec![cell]),
        })
    }
}

/// A curated lemma with its full paradigm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownEntry {
    /// Filled from the map key when omitted in the file
    #[serde(default)]
    pub lemma: String,
    pub pos: Pos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflection_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub paradigm: BTreeMap<String, ParadigmCells>,
}

impl KnownEntry {
    pub fn new(lemma: impl Into<String>, pos: Pos) -> Self {
        Self {
            lemma: lemma.into(),
            pos,
            inflection_class: None,
            gender: None,
            paradigm: BTreeMap::new(),
        }
    }

    pub fn with_class(mut self, inflection_class: impl Into<String>) -> Self {
        self.inflection_class = Some(inflection_class.into());
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    /// Add a paradigm cell. A surface form may fill several cells.
    pub fn with_form(mut self, surface: &str, features: Features) -> Self {
        self.add_form(surface, features);
        self
    }

    pub fn add_form(&mut self, surface: &str, features: Features) {
        let cells = self.paradigm.entry(normalize(surface)).or_default();
        if !cells.0.contains(&features) {
            cells.0.push(features);
        }
    }

    /// Normalize keys after deserialization.
    pub(crate) fn normalized(mut self, key: &str) -> Self {
        if self.lemma.trim().is_empty() {
            self.lemma = key.to_string();
        }
        self.lemma = normalize(&self.lemma);
        self.paradigm = std::mem::take(&mut self.paradigm)
            .into_iter()
            .fold(BTreeMap::new(), |mut acc, (surface, cells)| {
                let merged: &mut ParadigmCells = acc.entry(normalize(&surface)).or_default();
                for cell in cells.0 {
                    if !merged.0.contains(&cell) {
                        merged.0.push(cell);
                    }
                }
                acc
            });
        self
    }

    /// Candidates for one surface form, entry gender filled into each cell.
    pub fn candidates_for(&self, surface_key: &str) -> Vec<AnalysisCandidate> {
        let Some(cells) = self.paradigm.get(surface_key) else {
            return Vec::new();
        };
        let inherited = Features {
            gender: self.gender,
            ..Features::default()
        };
        cells
            .0
            .iter()
            .map(|cell| {
                AnalysisCandidate::new(KNOWN_SOURCE, self.lemma.clone(), self.pos)
                    .with_features(cell.or(&inherited))
            })
            .collect()
    }
}

/// A correction that contradicts the known table. Surfaced for manual
/// review; never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownEntryConflict {
    pub surface_form: String,
    pub existing: Vec<AnalysisCandidate>,
    pub proposed: AnalysisCandidate,
}

impl fmt::Display for KnownEntryConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let existing: Vec<String> = self
            .existing
            .iter()
            .map(|c| format!("{}/{}", c.lemma, c.pos))
            .collect();
        write!(
            f,
            "'{}' is known as [{}], correction proposes {}/{}",
            self.surface_form,
            existing.join(", "),
            self.proposed.lemma,
            self.proposed.pos
        )
    }
}
