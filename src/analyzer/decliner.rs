//! Rule-based decliner for first and second declension nominals

use super::traits::AnalyzerAdapter;
use crate::known::KnownSnapshot;
use crate::morphology::{
    normalize, AnalysisCandidate, DeclensionClass, Features, Gender, Pos, SentenceContext,
    SurfaceForm,
};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LexiconEntry {
    lemma: String,
    class: DeclensionClass,
    gender: Option<Gender>,
}

/// Generates candidates by matching a surface form against the ending
/// tables of known lemmas. Only forms of lexicon lemmas are recognised.
#[derive(Debug, Clone)]
pub struct RuleDecliner {
    id: String,
    lexicon: Vec<LexiconEntry>,
}

impl RuleDecliner {
    pub fn new() -> Self {
        Self {
            id: "rule-decliner".to_string(),
            lexicon: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a lemma. Ignored if the lemma does not end in its class's
    /// dictionary ending.
    pub fn with_lemma(mut self, lemma: &str, class: DeclensionClass, gender: Option<Gender>) -> Self {
        let lemma = normalize(lemma);
        if class.stem(&lemma).is_some() {
            self.lexicon.push(LexiconEntry { lemma, class, gender });
        }
        self
    }

    /// Lexicon of every nominal known entry whose class the tables cover.
    pub fn from_known(snapshot: &KnownSnapshot) -> Self {
        snapshot
            .entries()
            .values()
            .filter(|e| e.pos.is_nominal())
            .fold(Self::new(), |decliner, e| {
                match e
                    .inflection_class
                    .as_deref()
                    .and_then(|label| DeclensionClass::from_label(label, e.gender))
                {
                    Some(class) => decliner.with_lemma(&e.lemma, class, e.gender),
                    None => decliner,
                }
            })
    }

    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }

    fn decline(&self, key: &str) -> Option<AnalysisCandidate> {
        self.lexicon.iter().find_map(|entry| {
            let stem = entry.class.stem(&entry.lemma)?;
            let ending = key.strip_prefix(stem)?;
            let cells: Vec<_> = entry
                .class
                .cells()
                .iter()
                .filter(|(e, _, _)| *e == ending)
                .collect();
            let (_, first_case, first_number) = cells.first()?;

            let mut features = Features {
                gender: entry.gender,
                ..Features::default()
            };
            if cells.iter().all(|(_, c, _)| c == first_case) {
                features.case = Some(*first_case);
            }
            if cells.iter().all(|(_, _, n)| n == first_number) {
                features.number = Some(*first_number);
            }
            Some(
                AnalysisCandidate::new(&self.id, entry.lemma.clone(), Pos::Noun)
                    .with_features(features)
                    .with_rationale(format!("-{} ending of {:?} declension", ending, entry.class)),
            )
        })
    }
}

impl Default for RuleDecliner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyzerAdapter for RuleDecliner {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(
        &self,
        surface: &SurfaceForm,
        _context: &SentenceContext,
    ) -> Option<AnalysisCandidate> {
        self.decline(surface.key())
    }
}
