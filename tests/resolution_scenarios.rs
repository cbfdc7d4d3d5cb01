//! End-to-end resolution through the public API: real tag schemes, the
//! rule decliner, the LLM arbiter over a mock client, and the correction
//! loop feeding the known table.

mod common;

use common::{sentence, ScriptedNative};
use lemmata::analyzer::{IttbXposScheme, NativeAnalysis, UdScheme};
use lemmata::arbitration::MockClient;
use lemmata::morphology::DeclensionClass;
use lemmata::{
    AnalysisCandidate, AnalyzerAdapter, AuditEvent, Case, CorrectionLearningStore, DegradationKind, Features, Gender,
    KnownFormOverride, LlmArbiter, Number, Pos, PromotionCriteria, Provenance, ResolutionPipeline,
    ResolutionSource, RuleDecliner, SchemeAdapter, SentenceContext, SurfaceForm,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const MODEL: &str = "latin-expert";

/// PROIEL-style model misreads `piratam` as a verb; the IT-TB model and
/// the decliner read it as the noun.
fn ensemble(builder: lemmata::PipelineBuilder) -> lemmata::PipelineBuilder {
    let proiel = ScriptedNative::new()
        .answering("piratam", NativeAnalysis::new("piro", "VERB").with_feats("Tense=Pres"))
        .answering("video", NativeAnalysis::new("video", "VERB").with_feats("Tense=Pres"))
        .answering("puella", NativeAnalysis::new("puella", "NOUN").with_feats("Case=Nom|Number=Sing"));
    let ittb = ScriptedNative::new()
        .answering("piratam", NativeAnalysis::new("pirata", "A1|grn1|casA|gen1"))
        .answering("video", NativeAnalysis::new("video", "J3|modA|tem1|gen4"))
        .answering("puella", NativeAnalysis::new("puella", "A1|grn1|casA|gen2"))
        .failing_on("nautis");
    let decliner = RuleDecliner::new()
        .with_lemma("pirata", DeclensionClass::First, Some(Gender::Masculine))
        .with_lemma("puella", DeclensionClass::First, Some(Gender::Feminine));

    builder
        .with_analyzer(SchemeAdapter::new("proiel", proiel, UdScheme))
        .with_analyzer(SchemeAdapter::new("ittb", ittb, IttbXposScheme))
        .with_analyzer(decliner)
}

fn arbiter(reply: &str) -> Arc<LlmArbiter> {
    let client = MockClient::available().with_response(MODEL, reply);
    Arc::new(LlmArbiter::new(Arc::new(client), MODEL))
}

const PIRATA_REPLY: &str = "LEMMA: pirata\nPOS: NOUN\nCASE: accusative\nNUMBER: singular\n\
                            CONFIDENCE: 0.9\nREASONING: -am marks the accusative; pirata is masculine.";

#[tokio::test]
async fn split_ensemble_is_arbitrated() {
    let pipeline = ensemble(ResolutionPipeline::builder().with_known(Arc::new(KnownFormOverride::empty())))
        .with_arbiter(arbiter(PIRATA_REPLY))
        .build()
        .unwrap();

    let resolution = pipeline.resolve_sentence(["piratam", "video"]).await;
    let piratam = &resolution.words[0];

    assert_eq!(piratam.resolution_source, ResolutionSource::LlmArbitration);
    assert_eq!(piratam.lemma.as_deref(), Some("pirata"));
    assert_eq!(piratam.pos, Some(Pos::Noun));
    assert_eq!(piratam.features.case, Some(Case::Accusative));
    assert!((piratam.agreement_score - 2.0 / 3.0).abs() < 1e-9);

    let sources: Vec<&str> = piratam.candidates().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["proiel", "ittb", "rule-decliner"]);
    assert!(piratam
        .audit_trail
        .iter()
        .any(|e| matches!(e, AuditEvent::Arbitration { arbiter, .. } if arbiter == "llm")));

    let video = &resolution.words[1];
    assert_eq!(video.resolution_source, ResolutionSource::EnsembleMajority);
    assert_eq!(video.lemma.as_deref(), Some("video"));
    assert_eq!(resolution.is_plausible(), Some(true));
}

#[tokio::test]
async fn failing_arbiter_keeps_majority_with_low_confidence() {
    let client = MockClient::available().with_failure(MODEL, "rate limited");
    let pipeline = ensemble(ResolutionPipeline::builder().with_known(Arc::new(KnownFormOverride::empty())))
        .with_arbiter(Arc::new(LlmArbiter::new(Arc::new(client), MODEL)))
        .build()
        .unwrap();

    let resolution = pipeline.resolve_sentence(["piratam", "video"]).await;
    let piratam = &resolution.words[0];

    assert_eq!(piratam.resolution_source, ResolutionSource::EnsembleMajority);
    assert_eq!(piratam.lemma.as_deref(), Some("pirata"));
    assert!(piratam.low_confidence);
    assert!(resolution.needs_review().contains(&0));
}

#[tokio::test]
async fn crashing_analyzer_abstains_during_known_disambiguation() {
    let pipeline = ensemble(ResolutionPipeline::builder()).build().unwrap();

    // "nautis" is curated as dative or ablative plural; the ensemble is
    // asked to pick a cell and the IT-TB model crashes on it.
    let resolution = pipeline.resolve_sentence(["nautis"]).await;
    let word = &resolution.words[0];

    assert_eq!(word.resolution_source, ResolutionSource::KnownWord);
    assert_eq!(word.lemma.as_deref(), Some("nauta"));
    assert_eq!(word.features.number, Some(Number::Plural));
    assert_eq!(word.features.case, None);
    assert!(word
        .audit_trail
        .iter()
        .any(|e| matches!(e, AuditEvent::NoCandidate { analyzer, .. } if analyzer == "ittb")));

    let context = SentenceContext::new(sentence(&["nautis"]));
    let surface = SurfaceForm::parse("nautis").unwrap();
    let direct = pipeline
        .analyzers()
        .get("ittb")
        .unwrap()
        .adapter
        .analyze(&surface, &context)
        .await;
    assert!(direct.is_none(), "analyzer failures surface as abstentions");
}

#[tokio::test]
async fn unknown_word_is_reported_not_guessed() {
    let pipeline = ensemble(ResolutionPipeline::builder())
        .with_arbiter(arbiter(PIRATA_REPLY))
        .build()
        .unwrap();

    let resolution = pipeline.resolve_sentence(["qwertyx", "video"]).await;
    let unknown = &resolution.words[0];

    assert!(unknown.is_unknown());
    assert_eq!(unknown.agreement_score, 0.0);
    assert!(unknown
        .audit_trail
        .iter()
        .any(|e| matches!(e, AuditEvent::Degraded { kind: DegradationKind::AllAnalyzersFailed, .. })));
    assert_eq!(resolution.words[1].lemma.as_deref(), Some("video"));
}

#[tokio::test]
async fn corrections_promote_into_the_live_pipeline() {
    let known = Arc::new(KnownFormOverride::empty());
    let analyzer_calls;
    let pipeline = {
        let proiel = ScriptedNative::new().answering("piratam", NativeAnalysis::new("piro", "VERB"));
        analyzer_calls = proiel.counter();
        ResolutionPipeline::builder()
            .with_known(Arc::clone(&known))
            .with_analyzer(SchemeAdapter::new("proiel", proiel, UdScheme))
            .build()
            .unwrap()
    };

    let before = pipeline.resolve_sentence(["piratam"]).await;
    assert_eq!(before.words[0].lemma.as_deref(), Some("piro"));

    let store = CorrectionLearningStore::in_memory(Arc::clone(&known));
    let corrected = AnalysisCandidate::new("review", "pirata", Pos::Noun).with_features(
        Features::new()
            .with_case(Case::Accusative)
            .with_number(Number::Singular)
            .with_gender(Gender::Masculine),
    );
    for reviewer in ["ana", "ben", "cato"] {
        let outcome = store
            .record_correction(
                "piratam",
                &sentence(&["piratam", "video"]),
                corrected.clone(),
                Provenance::Reviewer(reviewer.into()),
            )
            .unwrap();
        assert!(outcome.conflict.is_none());
    }
    let report = store.promote_to_known(&PromotionCriteria::default()).unwrap();
    assert_eq!(report.promoted.len(), 1);

    let calls_before = analyzer_calls.load(Ordering::SeqCst);
    let after = pipeline.resolve_sentence(["piratam"]).await;
    let word = &after.words[0];
    assert_eq!(word.resolution_source, ResolutionSource::KnownWord);
    assert_eq!(word.lemma.as_deref(), Some("pirata"));
    assert_eq!(word.features.case, Some(Case::Accusative));
    assert_eq!(analyzer_calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn resolution_exports_as_json() {
    let pipeline = ensemble(ResolutionPipeline::builder()).build().unwrap();
    let resolution = pipeline.resolve_sentence(["nautam", "video"]).await;

    let json = serde_json::to_value(&resolution).unwrap();
    assert_eq!(json["status"], "complete");
    assert_eq!(json["words"][0]["resolution_source"], "known_word");
    assert_eq!(json["words"][0]["features"]["case"], "accusative");
    assert_eq!(json["words"][0]["audit_trail"][0]["event"], "known_entry_hit");
    assert!(json["report"]["translation"].as_str().unwrap().contains("the sailor"));

    let back: lemmata::SentenceResolution = serde_json::from_value(json).unwrap();
    assert_eq!(back, resolution);
}
