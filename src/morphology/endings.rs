//! Latin nominal ending tables
//!
//! Shared by the rule-based decliner (which generates paradigms) and the
//! plausibility validator (which checks a case assignment against the
//! surface ending).

use super::vocab::{Case, Gender, Number};
use serde::{Deserialize, Serialize};

/// Declension classes the rule tables cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclensionClass {
    /// -a, -ae (puella, nauta)
    First,
    /// -us, -i (dominus)
    Second,
    /// -um, -i (templum)
    SecondNeuter,
}

type Cell = (&'static str, Case, Number);

const FIRST: &[Cell] = &[
    ("a", Case::Nominative, Number::Singular),
    ("ae", Case::Genitive, Number::Singular),
    ("ae", Case::Dative, Number::Singular),
    ("am", Case::Accusative, Number::Singular),
    ("a", Case::Ablative, Number::Singular),
    ("a", Case::Vocative, Number::Singular),
    ("ae", Case::Nominative, Number::Plural),
    ("arum", Case::Genitive, Number::Plural),
    ("is", Case::Dative, Number::Plural),
    ("as", Case::Accusative, Number::Plural),
    ("is", Case::Ablative, Number::Plural),
    ("ae", Case::Vocative, Number::Plural),
];

const SECOND: &[Cell] = &[
    ("us", Case::Nominative, Number::Singular),
    ("i", Case::Genitive, Number::Singular),
    ("o", Case::Dative, Number::Singular),
    ("um", Case::Accusative, Number::Singular),
    ("o", Case::Ablative, Number::Singular),
    ("e", Case::Vocative, Number::Singular),
    ("i", Case::Nominative, Number::Plural),
    ("orum", Case::Genitive, Number::Plural),
    ("is", Case::Dative, Number::Plural),
    ("os", Case::Accusative, Number::Plural),
    ("is", Case::Ablative, Number::Plural),
    ("i", Case::Vocative, Number::Plural),
];

const SECOND_NEUTER: &[Cell] = &[
    ("um", Case::Nominative, Number::Singular),
    ("i", Case::Genitive, Number::Singular),
    ("o", Case::Dative, Number::Singular),
    ("um", Case::Accusative, Number::Singular),
    ("o", Case::Ablative, Number::Singular),
    ("um", Case::Vocative, Number::Singular),
    ("a", Case::Nominative, Number::Plural),
    ("orum", Case::Genitive, Number::Plural),
    ("is", Case::Dative, Number::Plural),
    ("a", Case::Accusative, Number::Plural),
    ("is", Case::Ablative, Number::Plural),
    ("a", Case::Vocative, Number::Plural),
];

impl DeclensionClass {
    /// Parse the free-form inflection class labels used in known tables
    /// ("1st", "first", "2nd", "2nd (neuter)", ...).
    pub fn from_label(label: &str, gender: Option<Gender>) -> Option<Self> {
        let l = label.trim().to_ascii_lowercase();
        if l.starts_with("1") || l.starts_with("first") {
            return Some(Self::First);
        }
        if l.starts_with("2") || l.starts_with("second") {
            if l.contains("neut") || gender == Some(Gender::Neuter) {
                return Some(Self::SecondNeuter);
            }
            return Some(Self::Second);
        }
        None
    }

    /// Ending of the dictionary form (nominative singular).
    pub fn lemma_ending(&self) -> &'static str {
        match self {
            Self::First => "a",
            Self::Second => "us",
            Self::SecondNeuter => "um",
        }
    }

    pub fn cells(&self) -> &'static [(&'static str, Case, Number)] {
        match self {
            Self::First => FIRST,
            Self::Second => SECOND,
            Self::SecondNeuter => SECOND_NEUTER,
        }
    }

    /// Stem of a lemma, if the lemma belongs to this class.
    pub fn stem<'a>(&self, lemma: &'a str) -> Option<&'a str> {
        lemma
            .strip_suffix(self.lemma_ending())
            .filter(|stem| !stem.is_empty())
    }
}

/// Endings attested for a case/number across the common declensions.
/// `None` means the tables place no constraint on that cell.
fn attested_endings(case: Case, number: Number, gender: Option<Gender>) -> Option<&'static [&'static str]> {
    let neuter = gender == Some(Gender::Neuter);
    match (case, number) {
        // Third-declension nominatives and neuter accusatives are open-ended.
        (Case::Nominative, Number::Singular) => None,
        (Case::Vocative, _) | (Case::Locative, _) => None,
        (Case::Accusative, Number::Singular) if neuter || gender.is_none() => None,
        (Case::Genitive, Number::Singular) => Some(&["ae", "i", "is", "us", "ei"]),
        (Case::Dative, Number::Singular) => Some(&["ae", "o", "i", "ui", "ei", "u"]),
        (Case::Accusative, Number::Singular) => Some(&["am", "um", "em", "im"]),
        (Case::Ablative, Number::Singular) => Some(&["a", "o", "e", "i", "u"]),
        (Case::Nominative, Number::Plural) => Some(&["ae", "i", "es", "us", "a", "ua"]),
        (Case::Genitive, Number::Plural) => Some(&["arum", "orum", "um", "erum"]),
        (Case::Dative, Number::Plural) | (Case::Ablative, Number::Plural) => {
            Some(&["is", "ibus", "ubus", "ebus"])
        }
        (Case::Accusative, Number::Plural) => Some(&["as", "os", "es", "is", "us", "a", "ua"]),
    }
}

/// Whether `surface` can carry `case`/`number` judging by its ending.
///
/// Returns `None` when the tables do not constrain the cell, so callers can
/// tell "compatible" from "no opinion".
pub fn ending_compatible(
    surface: &str,
    case: Case,
    number: Option<Number>,
    gender: Option<Gender>,
) -> Option<bool> {
    let surface = surface.to_lowercase();
    let numbers: &[Number] = match number {
        Some(Number::Singular) => &[Number::Singular],
        Some(Number::Plural) => &[Number::Plural],
        None => &[Number::Singular, Number::Plural],
    };

    let mut constrained = false;
    for n in numbers {
        match attested_endings(case, *n, gender) {
            None => return None,
            Some(endings) => {
                constrained = true;
                if endings.iter().any(|e| surface.ends_with(e)) {
                    return Some(true);
                }
            }
        }
    }
    constrained.then_some(false)
}
