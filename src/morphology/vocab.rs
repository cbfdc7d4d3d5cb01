//! Canonical morphological vocabulary
//!
//! Every adapter maps its native tagging scheme into these enums. The
//! vocabulary is fixed by the core and never varies per adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Part of speech, using Universal Dependencies UPOS names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pos {
    Noun,
    Propn,
    Verb,
    Aux,
    Adj,
    Adv,
    Pron,
    Det,
    Adp,
    Cconj,
    Sconj,
    Intj,
    Num,
    Part,
    Punct,
    X,
}

impl Pos {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noun => "NOUN",
            Self::Propn => "PROPN",
            Self::Verb => "VERB",
            Self::Aux => "AUX",
            Self::Adj => "ADJ",
            Self::Adv => "ADV",
            Self::Pron => "PRON",
            Self::Det => "DET",
            Self::Adp => "ADP",
            Self::Cconj => "CCONJ",
            Self::Sconj => "SCONJ",
            Self::Intj => "INTJ",
            Self::Num => "NUM",
            Self::Part => "PART",
            Self::Punct => "PUNCT",
            Self::X => "X",
        }
    }

    /// Nouns, proper nouns, adjectives and pronouns carry case.
    pub fn is_nominal(&self) -> bool {
        matches!(self, Self::Noun | Self::Propn | Self::Adj | Self::Pron)
    }

    pub fn is_verbal(&self) -> bool {
        matches!(self, Self::Verb | Self::Aux)
    }

    pub fn is_conjunction(&self) -> bool {
        matches!(self, Self::Cconj | Self::Sconj)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pos {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOUN" => Ok(Self::Noun),
            "PROPN" => Ok(Self::Propn),
            "VERB" => Ok(Self::Verb),
            "AUX" => Ok(Self::Aux),
            "ADJ" => Ok(Self::Adj),
            "ADV" => Ok(Self::Adv),
            "PRON" => Ok(Self::Pron),
            "DET" => Ok(Self::Det),
            "ADP" => Ok(Self::Adp),
            "CCONJ" => Ok(Self::Cconj),
            "SCONJ" => Ok(Self::Sconj),
            "INTJ" => Ok(Self::Intj),
            "NUM" => Ok(Self::Num),
            "PART" => Ok(Self::Part),
            "PUNCT" => Ok(Self::Punct),
            "X" => Ok(Self::X),
            other => Err(format!("unknown part of speech: {}", other)),
        }
    }
}

/// Grammatical case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    Nominative,
    Genitive,
    Dative,
    Accusative,
    Ablative,
    Vocative,
    Locative,
}

impl Case {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominative => "nominative",
            Self::Genitive => "genitive",
            Self::Dative => "dative",
            Self::Accusative => "accusative",
            Self::Ablative => "ablative",
            Self::Vocative => "vocative",
            Self::Locative => "locative",
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Case {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominative" | "nom" => Ok(Self::Nominative),
            "genitive" | "gen" => Ok(Self::Genitive),
            "dative" | "dat" => Ok(Self::Dative),
            "accusative" | "acc" => Ok(Self::Accusative),
            "ablative" | "abl" => Ok(Self::Ablative),
            "vocative" | "voc" => Ok(Self::Vocative),
            "locative" | "loc" => Ok(Self::Locative),
            other => Err(format!("unknown case: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Number {
    Singular,
    Plural,
}

impl std::str::FromStr for Number {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singular" | "sing" | "sg" => Ok(Self::Singular),
            "plural" | "plur" | "pl" => Ok(Self::Plural),
            other => Err(format!("unknown number: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Masculine,
    Feminine,
    Neuter,
}

impl std::str::FromStr for Gender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "masculine" | "masc" | "m" => Ok(Self::Masculine),
            "feminine" | "fem" | "f" => Ok(Self::Feminine),
            "neuter" | "neut" | "n" => Ok(Self::Neuter),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tense {
    Present,
    Imperfect,
    Future,
    Perfect,
    Pluperfect,
    FuturePerfect,
}

impl std::str::FromStr for Tense {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "pres" => Ok(Self::Present),
            "imperfect" | "imp" => Ok(Self::Imperfect),
            "future" | "fut" => Ok(Self::Future),
            "perfect" | "perf" => Ok(Self::Perfect),
            "pluperfect" | "pqp" => Ok(Self::Pluperfect),
            "future_perfect" | "futperf" => Ok(Self::FuturePerfect),
            other => Err(format!("unknown tense: {}", other)),
        }
    }
}

/// Morphological features of one analysis. Every field is optional:
/// analyzers leave unset whatever their scheme cannot decide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Features {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<Case>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tense: Option<Tense>,
}

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case(mut self, case: Case) -> Self {
        self.case = Some(case);
        self
    }

    pub fn with_number(mut self, number: Number) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_tense(mut self, tense: Tense) -> Self {
        self.tense = Some(tense);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.case.is_none() && self.number.is_none() && self.gender.is_none() && self.tense.is_none()
    }

    /// True when no field set on both sides differs.
    pub fn is_compatible_with(&self, other: &Features) -> bool {
        fn agree<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
            match (a, b) {
                (Some(x), Some(y)) => x == y,
                _ => true,
            }
        }
        agree(&self.case, &other.case)
            && agree(&self.number, &other.number)
            && agree(&self.gender, &other.gender)
            && agree(&self.tense, &other.tense)
    }

    /// Keep only the fields on which `self` and `other` agree.
    pub fn intersect(&self, other: &Features) -> Features {
        fn keep<T: PartialEq + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
            match (a, b) {
                (Some(x), Some(y)) if x == y => Some(x),
                _ => None,
            }
        }
        Features {
            case: keep(self.case, other.case),
            number: keep(self.number, other.number),
            gender: keep(self.gender, other.gender),
            tense: keep(self.tense, other.tense),
        }
    }

    /// Fill fields unset in `self` from `other`.
    pub fn or(&self, other: &Features) -> Features {
        Features {
            case: self.case.or(other.case),
            number: self.number.or(other.number),
            gender: self.gender.or(other.gender),
            tense: self.tense.or(other.tense),
        }
    }
}
