//! Lemma-to-English glosses and role rules

use crate::morphology::{normalize, Case, Pos, ResolvedAnalysis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// English glosses by lemma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlossDictionary {
    glosses: BTreeMap<String, String>,
}

impl GlossDictionary {
    pub fn new() -> Self {
        Self {
            glosses: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, lemma: &str, gloss: impl Into<String>) -> Self {
        self.insert(lemma, gloss);
        self
    }

    pub fn insert(&mut self, lemma: &str, gloss: impl Into<String>) {
        self.glosses.insert(normalize(lemma), gloss.into());
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let raw: BTreeMap<String, String> = serde_yaml::from_str(yaml)?;
        Ok(raw
            .into_iter()
            .fold(Self::new(), |dict, (lemma, gloss)| dict.with_entry(&lemma, gloss)))
    }

    pub fn get(&self, lemma: &str) -> Option<&str> {
        self.glosses.get(&normalize(lemma)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.glosses.iter().map(|(l, g)| (l.as_str(), g.as_str()))
    }

    pub fn len(&self) -> usize {
        self.glosses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glosses.is_empty()
    }
}

impl Default for GlossDictionary {
    /// A small classroom vocabulary.
    fn default() -> Self {
        [
            ("puella", "girl"),
            ("poeta", "poet"),
            ("nauta", "sailor"),
            ("agricola", "farmer"),
            ("scriba", "scribe"),
            ("pirata", "pirate"),
            ("incola", "inhabitant"),
            ("rosa", "rose"),
            ("ager", "field"),
            ("tempus", "time"),
            ("mos", "custom"),
            ("dominus", "master"),
            ("templum", "temple"),
            ("do", "give"),
            ("video", "see"),
            ("laboro", "work"),
            ("amo", "love"),
            ("sum", "be"),
            ("in", "in"),
            ("ad", "to"),
            ("cum", "with"),
            ("et", "and"),
            ("o", "O"),
        ]
        .into_iter()
        .fold(Self::new(), |dict, (lemma, gloss)| dict.with_entry(lemma, gloss))
    }
}

/// One word rendered into the gloss sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossToken {
    pub position: usize,
    pub surface_form: String,
    pub text: String,
}

/// Render one resolved word by its grammatical role.
pub fn gloss_word(dictionary: &GlossDictionary, position: usize, word: &ResolvedAnalysis) -> GlossToken {
    let text = match (&word.lemma, word.pos) {
        (Some(mark), Some(Pos::Punct)) => mark.clone(),
        (Some(lemma), Some(pos)) => {
            let base = dictionary
                .get(lemma)
                .map(str::to_string)
                .unwrap_or_else(|| format!("[{}]", lemma));
            match pos {
                Pos::Noun | Pos::Propn => match word.features.case {
                    Some(Case::Accusative) => format!("the {}", base),
                    Some(Case::Dative) => format!("to the {}", base),
                    Some(Case::Genitive) => format!("of the {}", base),
                    Some(Case::Ablative) => format!("with the {}", base),
                    _ => base,
                },
                Pos::Intj => format!("{}!", base),
                _ => base,
            }
        }
        _ => format!("[?{}]", word.surface_form),
    };
    GlossToken {
        position,
        surface_form: word.surface_form.clone(),
        text,
    }
}

/// Lower-cased word sequence, brackets and punctuation stripped.
pub(crate) fn words_of(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `phrase` occurs as whole words in `words`; a trailing plural
/// `-s` on the last word is accepted.
pub(crate) fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    let Some((last, init)) = phrase.split_last() else {
        return false;
    };
    words.windows(phrase.len()).any(|window| {
        match window.split_last() {
            Some((w_last, w_init)) => w_init == init && (w_last == last || *w_last == format!("{}s", last)),
            None => false,
        }
    })
}
