//! End-to-end resolution scenarios: known override, voting, escalation,
//! validation, degradation and cancellation

#[cfg(test)]
mod tests {
    use crate::analyzer::AnalyzerAdapter;
    use crate::arbitration::{Arbiter, ArbiterError, ArbitrationRequest, ArbitrationVerdict};
    use crate::config::PipelineConfig;
    use crate::error::DegradationKind;
    use crate::known::{KnownEntry, KnownFormOverride};
    use crate::morphology::{
        AnalysisCandidate, AuditEvent, Case, Features, Gender, Number, Pos, ResolutionSource,
        SentenceContext, SurfaceForm, Tense,
    };
    use crate::pipeline::{CancellationToken, ResolutionPipeline, SentenceStatus};
    use crate::validation::FlagKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers from a fixed table keyed by lower-cased surface form.
    struct TableAnalyzer {
        id: String,
        readings: HashMap<String, (String, Pos, Features)>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl TableAnalyzer {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                readings: HashMap::new(),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn reads(mut self, surface: &str, lemma: &str, pos: Pos, features: Features) -> Self {
            self.readings
                .insert(surface.to_string(), (lemma.to_string(), pos, features));
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl AnalyzerAdapter for TableAnalyzer {
        fn id(&self) -> &str {
            &self.id
        }

        async fn analyze(&self, surface: &SurfaceForm, _context: &SentenceContext) -> Option<AnalysisCandidate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.readings.get(surface.key()).map(|(lemma, pos, features)| {
                AnalysisCandidate::new(self.id.clone(), lemma.clone(), *pos).with_features(*features)
            })
        }
    }

    struct ScriptedArbiter {
        calls: AtomicUsize,
        delay: Duration,
        verdict: Option<ArbitrationVerdict>,
    }

    impl ScriptedArbiter {
        fn answering(verdict: ArbitrationVerdict) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                verdict: Some(verdict),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                verdict: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Arbiter for ScriptedArbiter {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn arbitrate(&self, _request: &ArbitrationRequest) -> Result<ArbitrationVerdict, ArbiterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.verdict
                .clone()
                .ok_or_else(|| ArbiterError::Unavailable("model offline".into()))
        }
    }

    fn acc_sg() -> Features {
        Features::new()
            .with_case(Case::Accusative)
            .with_number(Number::Singular)
    }

    fn pirata_verdict() -> ArbitrationVerdict {
        ArbitrationVerdict::new("pirata", Pos::Noun)
            .with_features(acc_sg())
            .with_confidence(0.9)
            .with_rationale("-am is first declension accusative")
    }

    /// Two analyzers read `piratam` as a noun, the third as a verb. Every
    /// analyzer agrees on `video`, `amat` and `videt`.
    fn split_ensemble() -> Vec<TableAnalyzer> {
        ["proiel", "ittb", "decliner"]
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let analyzer = TableAnalyzer::new(id)
                    .reads("video", "video", Pos::Verb, Features::default())
                    .reads("amat", "amo", Pos::Verb, Features::default())
                    .reads("videt", "video", Pos::Verb, Features::default())
                    .reads("puella", "puella", Pos::Noun, Features::new().with_case(Case::Nominative))
                    .reads("nautae", "nauta", Pos::Noun, Features::new().with_case(Case::Dative));
                if i < 2 {
                    analyzer.reads("piratam", "pirata", Pos::Noun, acc_sg())
                } else {
                    analyzer.reads("piratam", "piro", Pos::Verb, Features::default())
                }
            })
            .collect()
    }

    fn pipeline_with(
        config: PipelineConfig,
        known: KnownFormOverride,
        analyzers: Vec<TableAnalyzer>,
        arbiter: Option<Arc<dyn Arbiter>>,
    ) -> ResolutionPipeline {
        let mut builder = ResolutionPipeline::builder()
            .with_config(config)
            .with_known(Arc::new(known));
        for analyzer in analyzers {
            builder = builder.with_analyzer(analyzer);
        }
        if let Some(arbiter) = arbiter {
            builder = builder.with_arbiter(arbiter);
        }
        builder.build().unwrap()
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    // ================================================================
    // Known-word override
    // ================================================================

    // === Scenario: Known form overrides a disagreeing analyzer ===
    #[tokio::test]
    async fn known_form_overrides_analyzer() {
        let analyzer = TableAnalyzer::new("proiel").reads("nautam", "navo", Pos::Verb, Features::default());
        let calls = analyzer.counter();
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::default(),
            vec![analyzer],
            None,
        );

        let context = SentenceContext::new(tokens(&["nautam", "video"]));
        let resolved = pipeline.resolve_word("nautam", &context).await;

        assert_eq!(resolved.lemma.as_deref(), Some("nauta"));
        assert_eq!(resolved.pos, Some(Pos::Noun));
        assert_eq!(resolved.features.case, Some(Case::Accusative));
        assert_eq!(resolved.resolution_source, ResolutionSource::KnownWord);
        assert_eq!(resolved.agreement_score, 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "unambiguous known forms skip analyzers");
        assert!(matches!(
            resolved.audit_trail[0],
            AuditEvent::KnownEntryHit { analyzers_suppressed: 1, .. }
        ));
    }

    // === Scenario: Analyzers pick the cell of an ambiguous known form ===
    #[tokio::test]
    async fn ambiguous_known_form_uses_majority_case() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::default(),
            split_ensemble(),
            None,
        );
        let context = SentenceContext::new(tokens(&["nautae", "rosam", "do"])).at(0);
        let resolved = pipeline.resolve_word("nautae", &context).await;

        assert_eq!(resolved.resolution_source, ResolutionSource::KnownWord);
        assert_eq!(resolved.lemma.as_deref(), Some("nauta"));
        assert_eq!(
            resolved.features,
            Features::new()
                .with_case(Case::Dative)
                .with_number(Number::Singular)
                .with_gender(Gender::Masculine)
        );
        assert!(resolved
            .audit_trail
            .iter()
            .any(|e| matches!(e, AuditEvent::Vote { .. })));
    }

    // === Scenario: Without the ensemble an ambiguous form keeps shared features ===
    #[tokio::test]
    async fn ambiguous_known_form_without_ensemble_intersects_cells() {
        let config = PipelineConfig {
            disambiguate_known_with_ensemble: false,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(config, KnownFormOverride::default(), split_ensemble(), None);
        let resolved = pipeline
            .resolve_word("nautae", &SentenceContext::new(tokens(&["nautae"])))
            .await;

        assert_eq!(resolved.features, Features::new().with_gender(Gender::Masculine));
        assert_eq!(resolved.audit_trail.len(), 1);
    }

    /// `amor` is both the noun "love" and the passive of `amo`.
    fn amor_table() -> KnownFormOverride {
        KnownFormOverride::from_entries([
            KnownEntry::new("amor", Pos::Noun).with_gender(Gender::Masculine).with_form(
                "amor",
                Features::new()
                    .with_case(Case::Nominative)
                    .with_number(Number::Singular),
            ),
            KnownEntry::new("amo", Pos::Verb).with_form(
                "amor",
                Features::new()
                    .with_number(Number::Singular)
                    .with_tense(Tense::Present),
            ),
        ])
    }

    // === Scenario: Analyzers choose between two known lemmas ===
    #[tokio::test]
    async fn known_form_shared_by_two_lemmas_follows_the_analyzers() {
        let analyzers = ["proiel", "ittb", "decliner"]
            .into_iter()
            .map(|id| {
                TableAnalyzer::new(id).reads(
                    "amor",
                    "amor",
                    Pos::Noun,
                    Features::new().with_case(Case::Nominative),
                )
            })
            .collect();
        let pipeline = pipeline_with(PipelineConfig::default(), amor_table(), analyzers, None);

        let known = pipeline.known().lookup("amor");
        assert_eq!(known.len(), 2);
        assert_eq!(known[0].lemma, "amo", "table order puts the verb first");

        let resolved = pipeline
            .resolve_word("amor", &SentenceContext::new(tokens(&["amor", "vincit"])))
            .await;

        assert_eq!(resolved.resolution_source, ResolutionSource::KnownWord);
        assert_eq!(resolved.lemma.as_deref(), Some("amor"));
        assert_eq!(resolved.pos, Some(Pos::Noun));
        assert_eq!(resolved.features.case, Some(Case::Nominative));
        assert!(!resolved.low_confidence);
    }

    // === Scenario: Silent analyzers leave a two-lemma known form unresolved ===
    #[tokio::test]
    async fn undecided_shared_known_form_is_low_confidence() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            amor_table(),
            vec![TableAnalyzer::new("proiel")],
            None,
        );
        let resolved = pipeline
            .resolve_word("amor", &SentenceContext::new(tokens(&["amor"])))
            .await;

        assert_eq!(resolved.resolution_source, ResolutionSource::KnownWord);
        assert!(resolved.low_confidence);
        assert!(resolved.audit_trail.iter().any(|e| matches!(
            e,
            AuditEvent::Degraded { kind: DegradationKind::AmbiguousKnownForm, .. }
        )));
        match &resolved.audit_trail[0] {
            AuditEvent::KnownEntryHit { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected known_entry_hit first, got {:?}", other),
        }
    }

    // ================================================================
    // Voting and escalation
    // ================================================================

    // === Scenario: Two of three analyzers agree, threshold 0.67 escalates ===
    #[tokio::test]
    async fn two_thirds_agreement_escalates_at_default_threshold() {
        let arbiter = Arc::new(ScriptedArbiter::answering(pirata_verdict()));
        let pipeline = pipeline_with(
            PipelineConfig::default().with_threshold(0.67),
            KnownFormOverride::empty(),
            split_ensemble(),
            Some(arbiter.clone()),
        );
        let resolved = pipeline
            .resolve_word("piratam", &SentenceContext::new(tokens(&["piratam", "video"])))
            .await;

        assert_eq!(arbiter.calls(), 1);
        assert_eq!(resolved.resolution_source, ResolutionSource::LlmArbitration);
        assert_eq!(resolved.lemma.as_deref(), Some("pirata"));
        assert!((resolved.agreement_score - 2.0 / 3.0).abs() < 1e-9);
        assert!(resolved.was_arbitrated());
    }

    // === Scenario: Same split, threshold 0.6 keeps the majority ===
    #[tokio::test]
    async fn two_thirds_agreement_passes_lower_threshold() {
        let arbiter = Arc::new(ScriptedArbiter::answering(pirata_verdict()));
        let pipeline = pipeline_with(
            PipelineConfig::default().with_threshold(0.6),
            KnownFormOverride::empty(),
            split_ensemble(),
            Some(arbiter.clone()),
        );
        let resolved = pipeline
            .resolve_word("piratam", &SentenceContext::new(tokens(&["piratam", "video"])))
            .await;

        assert_eq!(arbiter.calls(), 0);
        assert_eq!(resolved.resolution_source, ResolutionSource::EnsembleMajority);
        assert_eq!(resolved.lemma.as_deref(), Some("pirata"));
        assert_eq!(resolved.features.case, Some(Case::Accusative));
        assert!(!resolved.low_confidence);
        let candidates = resolved.candidates().count();
        assert_eq!(candidates, 3, "every analyzer reading is kept in the trail");
    }

    // === Scenario: Unavailable arbiter falls back to a low-confidence majority ===
    #[tokio::test]
    async fn failed_arbitration_degrades_to_majority() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            split_ensemble(),
            Some(Arc::new(ScriptedArbiter::failing())),
        );
        let resolved = pipeline
            .resolve_word("piratam", &SentenceContext::new(tokens(&["piratam"])))
            .await;

        assert_eq!(resolved.resolution_source, ResolutionSource::EnsembleMajority);
        assert_eq!(resolved.lemma.as_deref(), Some("pirata"));
        assert!(resolved.low_confidence);
        assert!(resolved
            .audit_trail
            .iter()
            .any(|e| matches!(e, AuditEvent::Degraded { kind: DegradationKind::ArbiterError, .. })));
    }

    // === Scenario: Identical requests reach the arbiter once ===
    #[tokio::test]
    async fn resolution_is_idempotent_and_cached() {
        let arbiter = Arc::new(ScriptedArbiter::answering(pirata_verdict()));
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            split_ensemble(),
            Some(arbiter.clone()),
        );

        let first = pipeline.resolve_sentence(["piratam", "video"]).await;
        let second = pipeline.resolve_sentence(["piratam", "video"]).await;

        assert_eq!(first, second);
        assert_eq!(arbiter.calls(), 1);
        assert_eq!(pipeline.escalator().cache_len(), 1);
    }

    // ================================================================
    // Degradation
    // ================================================================

    // === Scenario: Malformed tokens never reach an analyzer ===
    #[tokio::test]
    async fn invalid_surface_form_is_unknown() {
        let analyzer = TableAnalyzer::new("proiel");
        let calls = analyzer.counter();
        let pipeline = pipeline_with(PipelineConfig::default(), KnownFormOverride::empty(), vec![analyzer], None);

        let resolved = pipeline
            .resolve_word("nau7am", &SentenceContext::new(tokens(&["nau7am"])))
            .await;

        assert!(resolved.is_unknown());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            resolved.audit_trail.as_slice(),
            [AuditEvent::Degraded { kind: DegradationKind::InvalidSurfaceForm, .. }]
        ));
    }

    // === Scenario: Every analyzer abstains ===
    #[tokio::test]
    async fn all_analyzers_silent_yields_unknown() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            split_ensemble(),
            Some(Arc::new(ScriptedArbiter::answering(pirata_verdict()))),
        );
        let resolved = pipeline
            .resolve_word("xyzabc", &SentenceContext::new(tokens(&["xyzabc"])))
            .await;

        assert!(resolved.is_unknown());
        assert_eq!(resolved.agreement_score, 0.0);
        assert!(resolved
            .audit_trail
            .iter()
            .any(|e| matches!(e, AuditEvent::Degraded { kind: DegradationKind::AllAnalyzersFailed, .. })));
        assert!(!resolved.was_arbitrated());
    }

    // === Scenario: A stalled analyzer is dropped from the vote ===
    #[tokio::test]
    async fn slow_analyzer_times_out_and_the_rest_vote() {
        let config = PipelineConfig {
            analyzer_timeout_ms: 50,
            ..PipelineConfig::default()
        };
        let mut analyzers = split_ensemble();
        analyzers.truncate(2);
        analyzers.push(
            TableAnalyzer::new("stalled")
                .reads("piratam", "piro", Pos::Verb, Features::default())
                .with_delay(Duration::from_secs(5)),
        );
        let pipeline = pipeline_with(config, KnownFormOverride::empty(), analyzers, None);

        let resolved = pipeline
            .resolve_word("piratam", &SentenceContext::new(tokens(&["piratam"])))
            .await;

        assert_eq!(resolved.resolution_source, ResolutionSource::EnsembleMajority);
        assert_eq!(resolved.lemma.as_deref(), Some("pirata"));
        assert_eq!(resolved.agreement_score, 1.0);
        assert!(resolved.audit_trail.iter().any(|e| matches!(
            e,
            AuditEvent::Degraded { kind: DegradationKind::AnalyzerUnavailable, .. }
        )));
    }

    // ================================================================
    // Sentences, validation and cancellation
    // ================================================================

    // === Scenario: Adjacent verbs are implausible ===
    #[tokio::test]
    async fn consecutive_verbs_flag_the_sentence() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            split_ensemble(),
            None,
        );
        let resolution = pipeline.resolve_sentence(["puella", "amat", "videt"]).await;

        assert!(resolution.is_complete());
        assert!(resolution.words.iter().all(|w| !w.low_confidence));
        let report = resolution.report.as_ref().unwrap();
        assert!(report.has_flag(FlagKind::ConsecutiveVerbs));
        assert_eq!(resolution.is_plausible(), Some(false));
        assert_eq!(resolution.needs_review(), vec![1, 2]);
    }

    // === Scenario: A comma between verbs does not separate them ===
    #[tokio::test]
    async fn comma_between_verbs_still_flags_them() {
        let analyzers: Vec<TableAnalyzer> = split_ensemble();
        let calls: Vec<_> = analyzers.iter().map(TableAnalyzer::counter).collect();
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            analyzers,
            None,
        );
        let resolution = pipeline.resolve_sentence(["amat", ",", "videt"]).await;

        let comma = &resolution.words[1];
        assert_eq!(comma.pos, Some(Pos::Punct));
        assert_eq!(comma.resolution_source, ResolutionSource::KnownWord);
        assert!(!comma.low_confidence);

        let report = resolution.report.as_ref().unwrap();
        assert!(report.has_flag(FlagKind::ConsecutiveVerbs));
        assert_eq!(resolution.needs_review(), vec![0, 2]);
        // Only the two verbs reached the analyzers.
        assert!(calls.iter().all(|c| c.load(Ordering::SeqCst) == 2));
    }

    // === Scenario: Every word carries an audit trail ===
    #[tokio::test]
    async fn every_resolved_word_has_a_trail() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::default(),
            split_ensemble(),
            None,
        );
        let resolution = pipeline
            .resolve_sentence(["nautam", "video", "xyzabc", "!!", "nau7am"])
            .await;

        assert_eq!(resolution.words.len(), 5);
        assert!(resolution.words.iter().all(|w| !w.audit_trail.is_empty()));
        assert_eq!(resolution.words[3].pos, Some(Pos::Punct));
        assert!(resolution.words[4].is_unknown());
    }

    // === Scenario: Validation can be switched off ===
    #[tokio::test]
    async fn disabled_validation_omits_report() {
        let config = PipelineConfig {
            validate_sentences: false,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(config, KnownFormOverride::empty(), split_ensemble(), None);
        let resolution = pipeline.resolve_sentence(["amat", "videt"]).await;

        assert!(resolution.is_complete());
        assert!(resolution.report.is_none());
    }

    // === Scenario: Cancellation during arbitration keeps the resolved prefix ===
    #[tokio::test]
    async fn cancellation_mid_arbitration_keeps_prefix() {
        let arbiter = Arc::new(ScriptedArbiter::answering(pirata_verdict()).with_delay(Duration::from_secs(10)));
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            split_ensemble(),
            Some(arbiter.clone()),
        );
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                token.cancel();
            })
        };

        let resolution = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.resolve_sentence_with_cancel(["video", "piratam", "puella"], &token),
        )
        .await
        .expect("cancellation should interrupt the arbiter");
        canceller.await.unwrap();

        assert_eq!(resolution.status, SentenceStatus::Cancelled);
        assert_eq!(resolution.words.len(), 1);
        assert_eq!(resolution.words[0].lemma.as_deref(), Some("video"));
        assert_eq!(resolution.unresolved, tokens(&["piratam", "puella"]));
        assert!(resolution.report.is_none());
        assert_eq!(arbiter.calls(), 1);
        assert_eq!(pipeline.escalator().cache_len(), 0);
    }

    // === Scenario: A pre-cancelled token resolves nothing ===
    #[tokio::test]
    async fn cancelled_before_start_resolves_nothing() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::empty(),
            split_ensemble(),
            None,
        );
        let token = CancellationToken::new();
        token.cancel();

        let resolution = pipeline.resolve_sentence_with_cancel(["video"], &token).await;
        assert_eq!(resolution.status, SentenceStatus::Cancelled);
        assert!(resolution.words.is_empty());
        assert_eq!(resolution.unresolved, tokens(&["video"]));
    }

    // === Scenario: Batch output follows input order ===
    #[tokio::test]
    async fn batch_preserves_input_order() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::default(),
            split_ensemble(),
            None,
        );
        let sentences = vec![
            tokens(&["puella", "amat"]),
            tokens(&["nautam", "video"]),
            tokens(&["videt"]),
        ];

        let results = pipeline.resolve_batch(sentences).await;

        let firsts: Vec<&str> = results
            .iter()
            .map(|r| r.words[0].surface_form.as_str())
            .collect();
        assert_eq!(firsts, vec!["puella", "nautam", "videt"]);
        assert!(results.iter().all(|r| r.is_complete()));
    }

    // === Scenario: Reference translation check through the pipeline ===
    #[tokio::test]
    async fn reference_translation_flags_missing_glosses() {
        let pipeline = pipeline_with(
            PipelineConfig::default(),
            KnownFormOverride::default(),
            split_ensemble(),
            None,
        );
        let resolution = pipeline.resolve_sentence(["nautam", "video"]).await;

        let good = pipeline.validate_against_reference(&resolution.words, "I see the sailor");
        assert!(!good.has_flag(FlagKind::MissingReferenceGloss));

        let bad = pipeline.validate_against_reference(&resolution.words, "I see the farmer");
        assert!(bad.has_flag(FlagKind::MissingReferenceGloss));
    }
}
