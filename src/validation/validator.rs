//! TranslationPlausibilityValidator
//!
//! Renders a resolved sentence into rough English and applies structural
//! heuristics. A bad parse reads as nonsense ("swim see"); the flags point a
//! reviewer at the words responsible. Advisory only: resolved words are never
//! modified.

use super::gloss::{contains_phrase, gloss_word, words_of, GlossDictionary, GlossToken};
use crate::morphology::endings::ending_compatible;
use crate::morphology::{Pos, ResolvedAnalysis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    ConsecutiveVerbs,
    NoVerb,
    CaseEndingMismatch,
    MissingReferenceGloss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlausibilityFlag {
    pub kind: FlagKind,
    /// Word positions involved; empty for sentence-level flags
    pub positions: Vec<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlausibilityReport {
    pub gloss: Vec<GlossToken>,
    pub translation: String,
    pub flags: Vec<PlausibilityFlag>,
    pub plausible: bool,
}

impl PlausibilityReport {
    fn new(gloss: Vec<GlossToken>, flags: Vec<PlausibilityFlag>) -> Self {
        let translation = gloss
            .iter()
            .map(|g| g.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let plausible = flags.is_empty();
        Self {
            gloss,
            translation,
            flags,
            plausible,
        }
    }

    pub fn has_flag(&self, kind: FlagKind) -> bool {
        self.flags.iter().any(|f| f.kind == kind)
    }

    /// Positions of every flagged word, deduplicated and sorted.
    pub fn flagged_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.flags.iter().flat_map(|f| f.positions.clone()).collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

#[derive(Debug, Clone, Default)]
pub struct TranslationPlausibilityValidator {
    dictionary: GlossDictionary,
}

impl TranslationPlausibilityValidator {
    pub fn new(dictionary: GlossDictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &GlossDictionary {
        &self.dictionary
    }

    pub fn validate(&self, sentence: &[ResolvedAnalysis]) -> PlausibilityReport {
        let gloss = sentence
            .iter()
            .enumerate()
            .map(|(i, w)| gloss_word(&self.dictionary, i, w))
            .collect();

        let mut flags = Vec::new();
        flags.extend(consecutive_verbs(sentence));
        flags.extend(no_verb(sentence));
        flags.extend(case_ending_mismatches(sentence));
        PlausibilityReport::new(gloss, flags)
    }

    /// `validate`, plus a flag for every dictionary gloss the reference
    /// translation uses but the synthesized gloss lacks.
    pub fn validate_against_reference(&self, sentence: &[ResolvedAnalysis], reference: &str) -> PlausibilityReport {
        let mut report = self.validate(sentence);
        let reference_words = words_of(reference);
        let gloss_words = words_of(&report.translation);

        for (lemma, gloss) in self.dictionary.iter() {
            let phrase = words_of(gloss);
            if contains_phrase(&reference_words, &phrase) && !contains_phrase(&gloss_words, &phrase) {
                report.flags.push(PlausibilityFlag {
                    kind: FlagKind::MissingReferenceGloss,
                    positions: Vec::new(),
                    message: format!(
                        "reference mentions '{}' ({}) but the parse does not",
                        gloss, lemma
                    ),
                });
            }
        }
        report.plausible = report.flags.is_empty();
        report
    }
}

/// Two VERB tokens adjacent once punctuation is skipped.
fn consecutive_verbs(sentence: &[ResolvedAnalysis]) -> Vec<PlausibilityFlag> {
    let mut flags = Vec::new();
    let mut previous_verb: Option<usize> = None;
    for (i, word) in sentence.iter().enumerate() {
        match word.pos {
            Some(Pos::Punct) => continue,
            Some(Pos::Verb) => {
                if let Some(prev) = previous_verb {
                    flags.push(PlausibilityFlag {
                        kind: FlagKind::ConsecutiveVerbs,
                        positions: vec![prev, i],
                        message: format!(
                            "'{}' and '{}' are consecutive verbs with no conjunction",
                            sentence[prev].surface_form, word.surface_form
                        ),
                    });
                }
                previous_verb = Some(i);
            }
            _ => previous_verb = None,
        }
    }
    flags
}

fn no_verb(sentence: &[ResolvedAnalysis]) -> Option<PlausibilityFlag> {
    let content = sentence.iter().any(|w| w.pos != Some(Pos::Punct));
    let has_verb = sentence.iter().any(|w| w.pos.is_some_and(|p| p.is_verbal()));
    (content && !has_verb).then(|| PlausibilityFlag {
        kind: FlagKind::NoVerb,
        positions: Vec::new(),
        message: "sentence has no verb".to_string(),
    })
}

fn case_ending_mismatches(sentence: &[ResolvedAnalysis]) -> Vec<PlausibilityFlag> {
    sentence
        .iter()
        .enumerate()
        .filter(|(_, w)| matches!(w.pos, Some(Pos::Noun | Pos::Propn | Pos::Adj)))
        .filter_map(|(i, w)| {
            let case = w.features.case?;
            let compatible =
                ending_compatible(&w.surface_form, case, w.features.number, w.features.gender)?;
            (!compatible).then(|| PlausibilityFlag {
                kind: FlagKind::CaseEndingMismatch,
                positions: vec![i],
                message: format!("'{}' does not have a {} ending", w.surface_form, case),
            })
        })
        .collect()
}
