//! Native tag schemes decoded into the canonical vocabulary

use super::traits::{AnalyzerError, NativeAnalysis};
use crate::morphology::{Case, Features, Gender, Number, Pos, Tense};

/// Decodes one analyzer family's native tags.
pub trait TagScheme: Send + Sync {
    fn name(&self) -> &str;

    fn decode(&self, analysis: &NativeAnalysis) -> Result<(Pos, Features), AnalyzerError>;
}

fn decode_error(tag: &str, reason: impl Into<String>) -> AnalyzerError {
    AnalyzerError::Decode {
        tag: tag.to_string(),
        reason: reason.into(),
    }
}

/// Universal Dependencies: UPOS tag plus a `FEATS` string such as
/// `Case=Acc|Gender=Masc|Number=Sing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdScheme;

impl UdScheme {
    fn parse_feats(feats: &str) -> Result<Features, AnalyzerError> {
        let mut features = Features::new();
        let mut aspect = None;
        let mut tense = None;

        let feats = feats.trim();
        if feats.is_empty() || feats == "_" {
            return Ok(features);
        }

        for pair in feats.split('|') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| decode_error(feats, format!("malformed feature {:?}", pair)))?;
            // Multi-valued features ("Fem,Masc") stay undecided.
            if value.contains(',') {
                continue;
            }
            match key {
                "Case" => {
                    features.case = match value {
                        "Nom" => Some(Case::Nominative),
                        "Gen" => Some(Case::Genitive),
                        "Dat" => Some(Case::Dative),
                        "Acc" => Some(Case::Accusative),
                        "Abl" => Some(Case::Ablative),
                        "Voc" => Some(Case::Vocative),
                        "Loc" => Some(Case::Locative),
                        _ => None,
                    }
                }
                "Number" => {
                    features.number = match value {
                        "Sing" => Some(Number::Singular),
                        "Plur" => Some(Number::Plural),
                        _ => None,
                    }
                }
                "Gender" => {
                    features.gender = match value {
                        "Masc" => Some(Gender::Masculine),
                        "Fem" => Some(Gender::Feminine),
                        "Neut" => Some(Gender::Neuter),
                        _ => None,
                    }
                }
                "Tense" => tense = Some(value),
                "Aspect" => aspect = Some(value),
                _ => {}
            }
        }

        features.tense = match (tense, aspect) {
            (Some("Pres"), _) => Some(Tense::Present),
            (Some("Fut"), Some("Perf")) => Some(Tense::FuturePerfect),
            (Some("Fut"), _) => Some(Tense::Future),
            (Some("Pqp"), _) => Some(Tense::Pluperfect),
            (Some("Past"), Some("Imp")) => Some(Tense::Imperfect),
            (Some("Past"), Some("Perf")) => Some(Tense::Perfect),
            _ => None,
        };
        Ok(features)
    }
}

impl TagScheme for UdScheme {
    fn name(&self) -> &str {
        "ud"
    }

    fn decode(&self, analysis: &NativeAnalysis) -> Result<(Pos, Features), AnalyzerError> {
        let pos: Pos = analysis
            .tag
            .parse()
            .map_err(|e: String| decode_error(&analysis.tag, e))?;
        let features = match &analysis.feats {
            Some(feats) => Self::parse_feats(feats)?,
            None => Features::new(),
        };
        Ok((pos, features))
    }
}

/// Index Thomisticus style XPOS codes: `A1|grn1|casA|gen2` for nominals,
/// `J3|modA|tem1|gen6` for verbs.
///
/// The leading letter selects the paradigm family (A-E nominal, J/N
/// verbal). `casA` covers both nominative and accusative and is left
/// undecided. For verbs `genN` encodes person, which the canonical
/// vocabulary does not carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct IttbXposScheme;

impl IttbXposScheme {
    fn code<'a>(parts: &[&'a str], prefix: &str) -> Option<&'a str> {
        parts.iter().find_map(|p| p.strip_prefix(prefix))
    }
}

impl TagScheme for IttbXposScheme {
    fn name(&self) -> &str {
        "ittb-xpos"
    }

    fn decode(&self, analysis: &NativeAnalysis) -> Result<(Pos, Features), AnalyzerError> {
        let tag = analysis.tag.trim();
        let parts: Vec<&str> = tag.split('|').collect();
        let head = parts.first().copied().unwrap_or_default();
        let Some(letter) = head.chars().next() else {
            return Err(decode_error(tag, "empty tag"));
        };

        // Some pipelines emit a plain UPOS where no XPOS exists.
        if let Ok(pos) = head.parse::<Pos>() {
            return Ok((pos, Features::new()));
        }

        let mut features = Features::new();
        let pos = match letter {
            'A'..='E' => {
                features.case = match Self::code(&parts, "cas") {
                    Some("G") => Some(Case::Genitive),
                    Some("D") => Some(Case::Dative),
                    Some("B") | Some("F") => Some(Case::Ablative),
                    _ => None,
                };
                features.gender = match Self::code(&parts, "gen") {
                    Some("1") => Some(Gender::Masculine),
                    Some("2") => Some(Gender::Feminine),
                    Some("3") => Some(Gender::Neuter),
                    _ => None,
                };
                Pos::Noun
            }
            'J' | 'N' => {
                features.tense = match Self::code(&parts, "tem") {
                    Some("1") => Some(Tense::Present),
                    Some("2") => Some(Tense::Imperfect),
                    Some("3") => Some(Tense::Future),
                    Some("4") => Some(Tense::Perfect),
                    Some("5") => Some(Tense::Pluperfect),
                    Some("6") => Some(Tense::FuturePerfect),
                    _ => None,
                };
                Pos::Verb
            }
            _ => return Err(decode_error(tag, format!("unknown paradigm letter {:?}", letter))),
        };
        Ok((pos, features))
    }
}
