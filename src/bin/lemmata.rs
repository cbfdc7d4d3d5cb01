//! Lemmata CLI: resolve sentences, record corrections, promote them.
//!
//! Usage:
//!   lemmata resolve [SENTENCE...] [--file path] [--arbiter-cmd program]
//!   lemmata correct <SURFACE> <LEMMA> <POS> [--case c] [--reviewer name] --db path
//!   lemmata promote [--min-occurrences n] --db path

use clap::{Parser, Subcommand};
use lemmata::arbitration::CommandClient;
use lemmata::corrections::{OpenLog, PromotionReport, RecordOutcome};
use lemmata::{
    AnalysisCandidate, Case, CorrectionLearningStore, Features, Gender, KnownFormOverride, LlmArbiter, Number,
    PipelineConfig, Pos, PromotionCriteria, Provenance, ResolutionPipeline, RuleDecliner, SqliteCorrectionLog,
    Tense,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "lemmata",
    version,
    about = "Multi-layer Latin morphological disambiguation"
)]
struct Cli {
    /// Pipeline configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Known-word table (YAML or JSON); the curated table when omitted
    #[arg(long, global = true)]
    known: Option<PathBuf>,
    /// Log per-word decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve sentences and print one JSON resolution per line
    Resolve {
        /// Sentences, whitespace-tokenized; read from stdin when empty
        sentences: Vec<String>,
        /// Read sentences from a file, one per line
        #[arg(long)]
        file: Option<PathBuf>,
        /// Program that answers arbitration prompts on stdin/stdout
        #[arg(long)]
        arbiter_cmd: Option<String>,
        /// Extra argument for the arbiter program (repeatable)
        #[arg(long = "arbiter-arg")]
        arbiter_args: Vec<String>,
        /// Model name passed to the arbiter program
        #[arg(long, default_value = "default")]
        model: String,
        /// Reference translation to check the first sentence against
        #[arg(long)]
        reference: Option<String>,
        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Record a reviewer correction
    Correct {
        /// Surface form as it appeared
        surface: String,
        lemma: String,
        /// Universal POS tag (NOUN, VERB, ...)
        pos: Pos,
        #[arg(long)]
        case: Option<Case>,
        #[arg(long)]
        number: Option<Number>,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        tense: Option<Tense>,
        /// Sentence the form appeared in
        #[arg(long)]
        sentence: Option<String>,
        /// Reviewer name
        #[arg(long, default_value = "cli")]
        reviewer: String,
        /// Path to the correction log database
        #[arg(long)]
        db: PathBuf,
    },
    /// Promote repeated corrections into the known table
    Promote {
        /// Override the configured repetition threshold
        #[arg(long)]
        min_occurrences: Option<usize>,
        /// Path to the correction log database
        #[arg(long)]
        db: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, String> {
    match path {
        Some(path) => PipelineConfig::load(path).map_err(|e| format!("Failed to load config: {}", e)),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_known(path: Option<&Path>) -> Result<KnownFormOverride, String> {
    match path {
        Some(path) if path.exists() => {
            KnownFormOverride::load(path).map_err(|e| format!("Failed to load known table: {}", e))
        }
        _ => Ok(KnownFormOverride::default()),
    }
}

fn read_sentences(sentences: Vec<String>, file: Option<&Path>) -> Result<Vec<Vec<String>>, String> {
    let lines: Vec<String> = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?
            .lines()
            .map(str::to_string)
            .collect(),
        None if !sentences.is_empty() => sentences,
        None => std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Failed to read stdin: {}", e))?,
    };
    Ok(lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|tokens| !tokens.is_empty())
        .collect())
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> i32 {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match text {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_resolve(
    config: PipelineConfig,
    known: KnownFormOverride,
    sentences: Vec<Vec<String>>,
    arbiter_cmd: Option<String>,
    arbiter_args: Vec<String>,
    model: String,
    reference: Option<String>,
    pretty: bool,
) -> i32 {
    let known = Arc::new(known);
    let decliner = RuleDecliner::from_known(&known.snapshot());
    let mut builder = ResolutionPipeline::builder()
        .with_config(config)
        .with_known(known)
        .with_analyzer(decliner);
    if let Some(program) = arbiter_cmd {
        let client = CommandClient::new(program).with_args(arbiter_args);
        builder = builder.with_arbiter(Arc::new(LlmArbiter::new(Arc::new(client), model)));
    }
    let pipeline = match builder.build() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let results = pipeline.resolve_batch(sentences).await;
    for resolution in &results {
        let code = print_json(resolution, pretty);
        if code != 0 {
            return code;
        }
    }
    if let (Some(reference), Some(first)) = (reference, results.first()) {
        let report = pipeline.validate_against_reference(&first.words, &reference);
        return print_json(&report, pretty);
    }
    0
}

fn open_store(db: &Path, known: KnownFormOverride) -> Result<CorrectionLearningStore, String> {
    let log = SqliteCorrectionLog::open(db).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(CorrectionLearningStore::new(Arc::new(log), Arc::new(known)))
}

fn cmd_correct(store: &CorrectionLearningStore, surface: &str, sentence: Vec<String>, corrected: AnalysisCandidate, reviewer: String) -> i32 {
    match store.record_correction(surface, &sentence, corrected, Provenance::Reviewer(reviewer)) {
        Ok(RecordOutcome { correction, conflict }) => {
            println!(
                "Recorded correction {} for '{}' -> {} ({})",
                correction.id, correction.surface_form, correction.corrected.lemma, correction.corrected.pos
            );
            if let Some(conflict) = conflict {
                eprintln!("Warning: needs review: {}", conflict);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_promote(store: &CorrectionLearningStore, criteria: PromotionCriteria, known_path: Option<&Path>) -> i32 {
    let report: PromotionReport = match store.promote_to_known(&criteria) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    for form in &report.promoted {
        println!(
            "Promoted '{}' -> {} ({}) after {} corrections",
            form.surface_form, form.lemma, form.pos, form.occurrences
        );
    }
    for conflict in &report.conflicts {
        eprintln!("Warning: not promoted: {}", conflict);
    }
    println!(
        "{} promoted, {} already known, {} conflicts, {} pending; table version {}",
        report.promoted.len(),
        report.skipped_known.len(),
        report.conflicts.len(),
        report.pending,
        report.version
    );

    if report.changed() {
        if let Some(path) = known_path {
            if let Err(e) = store.known().save(path) {
                eprintln!("Error: failed to save known table: {}", e);
                return 1;
            }
            println!("Saved known table to {}", path.display());
        }
    }
    0
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();

    let setup = load_config(cli.config.as_deref())
        .and_then(|config| load_known(cli.known.as_deref()).map(|known| (config, known)));
    let (config, known) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Resolve {
            sentences,
            file,
            arbiter_cmd,
            arbiter_args,
            model,
            reference,
            pretty,
        } => match read_sentences(sentences, file.as_deref()) {
            Ok(sentences) => {
                cmd_resolve(config, known, sentences, arbiter_cmd, arbiter_args, model, reference, pretty).await
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Correct {
            surface,
            lemma,
            pos,
            case,
            number,
            gender,
            tense,
            sentence,
            reviewer,
            db,
        } => {
            let features = Features {
                case,
                number,
                gender,
                tense,
            };
            let corrected = AnalysisCandidate::new("review", lemma, pos).with_features(features);
            let sentence = sentence
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| vec![surface.clone()]);
            match open_store(&db, known) {
                Ok(store) => cmd_correct(&store, &surface, sentence, corrected, reviewer),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
        Commands::Promote { min_occurrences, db } => {
            let criteria = min_occurrences
                .map(PromotionCriteria::new)
                .unwrap_or_else(|| PromotionCriteria::from_config(&config));
            match open_store(&db, known) {
                Ok(store) => cmd_promote(&store, criteria, cli.known.as_deref()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
    };
    std::process::exit(code);
}
