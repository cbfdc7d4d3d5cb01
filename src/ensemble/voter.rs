//! Plurality voting over analyzer candidates

use crate::morphology::{AnalysisCandidate, Features, Pos};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Result of one vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub majority_lemma: Option<String>,
    pub majority_pos: Option<Pos>,
    /// Per-field plurality among candidates backing the majority lemma and POS
    pub majority_features: Features,
    pub lemma_agreement: f64,
    pub pos_agreement: f64,
    /// Equal to `lemma_agreement`
    pub agreement_score: f64,
    /// Lemma counts in first-seen order
    pub lemma_tally: Vec<(String, usize)>,
    pub pos_tally: Vec<(Pos, usize)>,
    pub non_null: usize,
}

impl VoteOutcome {
    fn empty() -> Self {
        Self {
            majority_lemma: None,
            majority_pos: None,
            majority_features: Features::default(),
            lemma_agreement: 0.0,
            pos_agreement: 0.0,
            agreement_score: 0.0,
            lemma_tally: Vec::new(),
            pos_tally: Vec::new(),
            non_null: 0,
        }
    }

    pub fn has_majority(&self) -> bool {
        self.majority_lemma.is_some() && self.majority_pos.is_some()
    }

    /// Whether either agreement falls below `threshold`.
    pub fn below(&self, threshold: f64) -> bool {
        self.lemma_agreement < threshold || self.pos_agreement < threshold
    }

    /// The majority reading as a candidate, if there is one.
    pub fn majority_candidate(&self, source: &str) -> Option<AnalysisCandidate> {
        Some(
            AnalysisCandidate::new(source, self.majority_lemma.clone()?, self.majority_pos?)
                .with_features(self.majority_features),
        )
    }
}

/// Running count for one value.
struct Tally<T> {
    value: T,
    count: usize,
    best_weight: f64,
    earliest: usize,
}

/// Plurality with tie-break on backer weight, then registration order.
fn plurality<T: PartialEq + Clone>(
    votes: impl IntoIterator<Item = (usize, T)>,
    weight: impl Fn(usize) -> f64,
) -> (Option<T>, Vec<(T, usize)>) {
    let mut tallies: Vec<Tally<T>> = Vec::new();
    for (index, value) in votes {
        let w = weight(index);
        match tallies.iter_mut().find(|t| t.value == value) {
            Some(t) => {
                t.count += 1;
                if w > t.best_weight || (w == t.best_weight && index < t.earliest) {
                    t.best_weight = w;
                    t.earliest = index;
                }
            }
            None => tallies.push(Tally {
                value,
                count: 1,
                best_weight: w,
                earliest: index,
            }),
        }
    }

    let winner = tallies
        .iter()
        .max_by(|a, b| {
            a.count
                .cmp(&b.count)
                .then_with(|| a.best_weight.total_cmp(&b.best_weight))
                .then_with(|| Reverse(a.earliest).cmp(&Reverse(b.earliest)))
        })
        .map(|t| t.value.clone());
    let counts = tallies.into_iter().map(|t| (t.value, t.count)).collect();
    (winner, counts)
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Tallies lemma and POS independently by plurality.
///
/// Slot `i` of the candidate list belongs to the `i`-th registered
/// analyzer; a `None` slot is an abstention and does not count.
#[derive(Debug, Clone, Default)]
pub struct EnsembleVoter {
    weights: Vec<f64>,
}

impl EnsembleVoter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prior weights in registration order. Missing slots weigh 1.0.
    pub fn with_weights(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    fn weight(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(1.0)
    }

    pub fn vote(&self, candidates: &[Option<AnalysisCandidate>]) -> VoteOutcome {
        let present: Vec<(usize, &AnalysisCandidate)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
            .collect();
        let non_null = present.len();
        if non_null == 0 {
            return VoteOutcome::empty();
        }

        let weight = |i| self.weight(i);
        let (majority_lemma, lemma_tally) =
            plurality(present.iter().map(|(i, c)| (*i, c.lemma.clone())), weight);
        let (majority_pos, pos_tally) = plurality(present.iter().map(|(i, c)| (*i, c.pos)), weight);

        let count_of = |tally: &[(String, usize)], v: &Option<String>| {
            tally
                .iter()
                .find(|(l, _)| Some(l) == v.as_ref())
                .map_or(0, |(_, n)| *n)
        };
        let lemma_agreement = ratio(count_of(&lemma_tally, &majority_lemma), non_null);
        let pos_agreement = ratio(
            pos_tally
                .iter()
                .find(|(p, _)| Some(*p) == majority_pos)
                .map_or(0, |(_, n)| *n),
            non_null,
        );

        let backers: Vec<(usize, &AnalysisCandidate)> = present
            .iter()
            .filter(|(_, c)| Some(&c.lemma) == majority_lemma.as_ref() && Some(c.pos) == majority_pos)
            .copied()
            .collect();
        let majority_features = Features {
            case: plurality(backers.iter().filter_map(|(i, c)| c.features.case.map(|v| (*i, v))), weight).0,
            number: plurality(backers.iter().filter_map(|(i, c)| c.features.number.map(|v| (*i, v))), weight).0,
            gender: plurality(backers.iter().filter_map(|(i, c)| c.features.gender.map(|v| (*i, v))), weight).0,
            tense: plurality(backers.iter().filter_map(|(i, c)| c.features.tense.map(|v| (*i, v))), weight).0,
        };

        VoteOutcome {
            majority_lemma,
            majority_pos,
            majority_features,
            lemma_agreement,
            pos_agreement,
            agreement_score: lemma_agreement,
            lemma_tally,
            pos_tally,
            non_null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::{Case, Number};

    fn noun(source: &str, lemma: &str, case: Option<Case>) -> Option<AnalysisCandidate> {
        let features = Features {
            case,
            ..Features::default()
        };
        Some(AnalysisCandidate::new(source, lemma, Pos::Noun).with_features(features))
    }

    fn verb(source: &str, lemma: &str) -> Option<AnalysisCandidate> {
        Some(AnalysisCandidate::new(source, lemma, Pos::Verb))
    }

    // === Scenario: two of three agree ===

    #[test]
    fn two_of_three_majority() {
        let outcome = EnsembleVoter::new().vote(&[
            noun("proiel", "pirata", Some(Case::Accusative)),
            noun("ittb", "pirata", Some(Case::Accusative)),
            verb("decliner", "piro"),
        ]);
        assert_eq!(outcome.majority_lemma.as_deref(), Some("pirata"));
        assert_eq!(outcome.majority_pos, Some(Pos::Noun));
        assert_eq!(outcome.majority_features.case, Some(Case::Accusative));
        assert!((outcome.agreement_score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(outcome.non_null, 3);
        assert!(outcome.below(0.67));
        assert!(!outcome.below(0.6));
    }

    #[test]
    fn abstentions_do_not_count() {
        let outcome = EnsembleVoter::new().vote(&[
            noun("proiel", "nauta", None),
            None,
            noun("decliner", "nauta", None),
        ]);
        assert_eq!(outcome.non_null, 2);
        assert_eq!(outcome.agreement_score, 1.0);
    }

    #[test]
    fn no_candidates_scores_zero() {
        let outcome = EnsembleVoter::new().vote(&[None, None]);
        assert_eq!(outcome.agreement_score, 0.0);
        assert!(!outcome.has_majority());
        assert!(outcome.majority_candidate("ensemble").is_none());
    }

    // === Scenario: ties ===

    #[test]
    fn tie_goes_to_heavier_analyzer() {
        let voter = EnsembleVoter::with_weights(vec![1.0, 2.0]);
        let outcome = voter.vote(&[noun("proiel", "nauta", None), verb("ittb", "navo")]);
        assert_eq!(outcome.majority_lemma.as_deref(), Some("navo"));
        assert_eq!(outcome.majority_pos, Some(Pos::Verb));
        assert_eq!(outcome.agreement_score, 0.5);
    }

    #[test]
    fn equal_weights_fall_back_to_registration_order() {
        let outcome = EnsembleVoter::new().vote(&[verb("ittb", "navo"), noun("proiel", "nauta", None)]);
        assert_eq!(outcome.majority_lemma.as_deref(), Some("navo"));

        let outcome = EnsembleVoter::new().vote(&[noun("proiel", "nauta", None), verb("ittb", "navo")]);
        assert_eq!(outcome.majority_lemma.as_deref(), Some("nauta"));
    }

    #[test]
    fn lemma_and_pos_tallied_independently() {
        let outcome = EnsembleVoter::new().vote(&[
            noun("a", "nauta", None),
            verb("b", "nauta"),
            verb("c", "navo"),
        ]);
        assert_eq!(outcome.majority_lemma.as_deref(), Some("nauta"));
        assert_eq!(outcome.majority_pos, Some(Pos::Verb));
        assert!((outcome.lemma_agreement - 2.0 / 3.0).abs() < 1e-9);
        assert!((outcome.pos_agreement - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn features_come_from_backers_only() {
        let mut dissent = noun("c", "navis", Some(Case::Genitive)).unwrap();
        dissent.features.number = Some(Number::Plural);
        let outcome = EnsembleVoter::new().vote(&[
            noun("a", "nauta", Some(Case::Dative)),
            noun("b", "nauta", None),
            Some(dissent),
        ]);
        assert_eq!(outcome.majority_features.case, Some(Case::Dative));
        assert_eq!(outcome.majority_features.number, None);
    }
}
