use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use taxon::classifier::{ClassifierConfig, ConfigError, Elicitation};
use taxon::completion::{OllamaClientBuilder, OpenAiCompatClientBuilder};
use taxon::concepts::{self, ConceptIndex};
use taxon::{
    ClassificationResult, Classifier, ClassifierBuilder, CompletionError, CompletionService,
    ContentStore, Database, GapAnalyzer, ItemId, Mode, StoreError, Vocabulary, VocabularyStore,
};

/// taxon - classify content against controlled vocabularies with an LLM
#[derive(Parser)]
#[command(name = "taxon")]
#[command(about = "LLM-assisted controlled-vocabulary classification")]
#[command(version)]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Completion backend (falls back to TAXON_BACKEND, then ollama)
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Model name (falls back to OLLAMA_MODEL or OPENROUTER_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Ollama,
    Openrouter,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Add or update a vocabulary label
    AddLabel(AddLabelCommand),
    /// Store a content item
    AddItem(AddItemCommand),
    /// Classify content items
    Classify(ClassifyCommand),
    /// Classify content items and report vocabulary gaps
    Gaps(GapsCommand),
    /// Parse a concept file and report what it contains
    Concepts(ConceptsCommand),
    /// Check that the completion backend is reachable
    Check,
}

#[derive(Parser)]
struct AddLabelCommand {
    /// Vocabulary name, e.g. "category"
    vocabulary: String,

    /// Label slug
    slug: String,

    /// Display name (defaults to the slug)
    #[arg(long, default_value = "")]
    name: String,

    #[arg(long, default_value = "")]
    description: String,
}

#[derive(Parser)]
struct AddItemCommand {
    title: String,

    #[arg(long, default_value = "")]
    excerpt: String,

    /// Body text
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the body from a file
    #[arg(long, value_name = "FILE")]
    body_file: Option<PathBuf>,
}

/// Options shared by `classify` and `gaps`.
#[derive(Parser)]
struct ClassifyOptions {
    /// Item IDs to classify
    #[arg(value_name = "IDS")]
    ids: Vec<i64>,

    /// Classify every stored item
    #[arg(long, conflicts_with = "ids")]
    all: bool,

    /// Vocabularies to classify against (repeatable; defaults to all)
    #[arg(short, long = "vocabulary", value_name = "NAME")]
    vocabularies: Vec<String>,

    /// benchmark or audit (falls back to TAXON_MODE)
    #[arg(long)]
    mode: Option<Mode>,

    /// Ask for summary and classification in one turn
    #[arg(long)]
    single_step: bool,

    /// Minimum confidence to keep a suggestion (falls back to TAXON_THRESHOLD)
    #[arg(long)]
    threshold: Option<f64>,

    /// Concept file used to render vocabularies as hierarchies
    #[arg(long, value_name = "FILE")]
    concepts: Option<PathBuf>,
}

#[derive(Parser)]
struct ClassifyCommand {
    #[command(flatten)]
    options: ClassifyOptions,

    /// Assign surviving in-vocabulary suggestions in the database
    #[arg(long)]
    apply: bool,
}

#[derive(Parser)]
struct GapsCommand {
    #[command(flatten)]
    options: ClassifyOptions,
}

#[derive(Parser)]
struct ConceptsCommand {
    /// Concept file to parse
    file: PathBuf,
}

/// An error caused by invalid input rather than a failure of the tool.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::AddLabel(cmd) => handle_add_label(&cli, cmd),
        Commands::AddItem(cmd) => handle_add_item(&cli, cmd),
        Commands::Classify(cmd) => handle_classify(&cli, cmd),
        Commands::Gaps(cmd) => handle_gaps(&cli, cmd),
        Commands::Concepts(cmd) => handle_concepts(cmd),
        Commands::Check => handle_check(&cli),
    };

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TAXON_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad arguments, bad configuration and references to
/// labels or items that do not exist.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.is::<UsageError>()
            || cause.is::<ConfigError>()
            || matches!(
                cause.downcast_ref::<StoreError>(),
                Some(StoreError::UnknownLabel { .. } | StoreError::UnknownItem(_))
            )
            || matches!(
                cause.downcast_ref::<CompletionError>(),
                Some(CompletionError::MissingApiKey(_) | CompletionError::InvalidUrl(_))
            )
    })
}

fn handle_add_label(cli: &Cli, cmd: &AddLabelCommand) -> Result<()> {
    if cmd.vocabulary.trim().is_empty() || cmd.slug.trim().is_empty() {
        return Err(UsageError("Vocabulary and slug cannot be empty".to_string()).into());
    }

    let db = open_database(cli)?;
    let label = db
        .add_label(cmd.vocabulary.trim(), cmd.slug.trim(), &cmd.name, &cmd.description)
        .context("Failed to add label")?;

    print_json(&json!({
        "vocabulary": cmd.vocabulary.trim(),
        "label": label,
    }))
}

fn handle_add_item(cli: &Cli, cmd: &AddItemCommand) -> Result<()> {
    if cmd.title.trim().is_empty() {
        return Err(UsageError("Item title cannot be empty".to_string()).into());
    }

    let body = match (&cmd.body, &cmd.body_file) {
        (Some(body), _) => body.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read body file: {}", path.display()))?,
        (None, None) => String::new(),
    };

    let db = open_database(cli)?;
    let id = db
        .add_content_item(cmd.title.trim(), &cmd.excerpt, &body)
        .context("Failed to add content item")?;

    print_json(&json!({ "id": id }))
}

fn handle_classify(cli: &Cli, cmd: &ClassifyCommand) -> Result<()> {
    let db = open_database(cli)?;
    let run = classify_run(cli, &db, &cmd.options)?;

    let mut applied = Vec::new();
    if cmd.apply {
        for result in &run.results {
            for (vocabulary, suggestions) in result.classifications() {
                for suggestion in suggestions.iter().filter(|s| s.in_vocabulary == Some(true)) {
                    if db
                        .assign_label(result.item_id(), vocabulary, &suggestion.term)
                        .context("Failed to apply label")?
                    {
                        applied.push(json!({
                            "item_id": result.item_id(),
                            "vocabulary": vocabulary,
                            "term": suggestion.term,
                        }));
                    }
                }
            }
        }
        tracing::info!(count = applied.len(), "applied new label assignments");
    }

    let mut output = json!({
        "results": run.results,
        "usage": run.classifier.usage().totals(),
    });
    if cmd.apply {
        output["applied"] = json!(applied);
    }
    print_json(&output)
}

fn handle_gaps(cli: &Cli, cmd: &GapsCommand) -> Result<()> {
    let db = open_database(cli)?;
    let run = classify_run(cli, &db, &cmd.options)?;

    let analyzer = GapAnalyzer::new(&run.results, &run.vocabularies);
    print_json(&json!({
        "report": analyzer.report(),
        "mismatched_terms": analyzer.mismatched_terms(),
        "usage": run.classifier.usage().totals(),
    }))
}

fn handle_concepts(cmd: &ConceptsCommand) -> Result<()> {
    let parsed = concepts::parse_file(&cmd.file);
    if parsed.concepts.is_empty() && !parsed.errors.is_empty() {
        return Err(UsageError(parsed.errors.join("; ")).into());
    }

    print_json(&json!({
        "concepts": parsed.concepts.len(),
        "with_broader": parsed.concepts.iter().filter(|c| c.broader.is_some()).count(),
        "errors": parsed.errors,
        "index": parsed.concepts,
    }))
}

fn handle_check(cli: &Cli) -> Result<()> {
    let client = build_client(cli)?;
    client
        .check_available()
        .context("Completion backend is not available")?;

    print_json(&json!({ "available": true, "model": client.model() }))
}

struct ClassifyRun {
    classifier: Classifier,
    vocabularies: Vec<Vocabulary>,
    results: Vec<ClassificationResult>,
}

fn classify_run(cli: &Cli, db: &Database, options: &ClassifyOptions) -> Result<ClassifyRun> {
    let ids: Vec<ItemId> = if options.all {
        db.item_ids().context("Failed to list content items")?
    } else {
        options.ids.iter().copied().map(ItemId::new).collect()
    };
    if ids.is_empty() {
        return Err(UsageError("No items to classify: pass IDs or --all".to_string()).into());
    }

    let names: Vec<&str> = options.vocabularies.iter().map(String::as_str).collect();
    let vocabularies = db
        .vocabularies(&names)
        .context("Failed to load vocabularies")?;
    if vocabularies.is_empty() {
        return Err(UsageError("No vocabularies with labels found; add labels first".to_string()).into());
    }

    let concepts = load_concepts(options.concepts.as_deref())?;
    let classifier = ClassifierBuilder::new()
        .client(build_client(cli)?)
        .config(classifier_config(options)?)
        .build();

    let results = classifier
        .classify_batch(db, &ids, &vocabularies, concepts.as_ref())
        .context("Completion backend is not available")?;

    Ok(ClassifyRun {
        classifier,
        vocabularies,
        results,
    })
}

fn classifier_config(options: &ClassifyOptions) -> Result<ClassifierConfig> {
    let mut config = ClassifierConfig::from_env()?;
    if let Some(mode) = options.mode {
        config = config.with_mode(mode);
    }
    if options.single_step {
        config = config.with_elicitation(Elicitation::SingleStep);
    }
    if let Some(threshold) = options.threshold {
        config = config.with_confidence_threshold(threshold)?;
    }
    Ok(config)
}

fn load_concepts(path: Option<&Path>) -> Result<Option<ConceptIndex>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let parsed = concepts::parse_file(path);
    for error in &parsed.errors {
        tracing::warn!(path = %path.display(), %error, "concept file problem");
    }
    if parsed.concepts.is_empty() {
        return Err(UsageError(format!(
            "No concepts could be read from {}",
            path.display()
        ))
        .into());
    }
    Ok(Some(parsed.concepts))
}

fn build_client(cli: &Cli) -> Result<Arc<dyn CompletionService>> {
    let backend = match cli.backend {
        Some(backend) => backend,
        None => match std::env::var("TAXON_BACKEND") {
            Ok(value) if !value.trim().is_empty() => Backend::from_str(value.trim(), true)
                .map_err(|e| UsageError(format!("Invalid TAXON_BACKEND: {e}")))?,
            _ => Backend::Ollama,
        },
    };

    let client: Arc<dyn CompletionService> = match backend {
        Backend::Ollama => {
            let mut builder = OllamaClientBuilder::new();
            if let Some(model) = &cli.model {
                builder = builder.model(model);
            }
            let client = builder.build()?;
            if client.model().is_empty() {
                return Err(UsageError("No Ollama model configured: pass --model or set OLLAMA_MODEL".to_string()).into());
            }
            Arc::new(client)
        }
        Backend::Openrouter => {
            let mut builder = OpenAiCompatClientBuilder::new();
            if let Some(model) = &cli.model {
                builder = builder.model(model);
            }
            Arc::new(builder.build()?)
        }
    };

    tracing::debug!(?backend, model = client.model(), "completion backend ready");
    Ok(client)
}

fn open_database(cli: &Cli) -> Result<Database> {
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => get_database_path()?,
    };
    ensure_database_directory(&db_path)?;
    Database::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

/// Gets the cross-platform database path.
///
/// Returns the path as `{data_dir}/taxon/taxon.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
fn get_database_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("taxon").join("taxon.db"))
}

/// Ensures the parent directory of the database file exists.
fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("taxon").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn classify_flags_parse() {
        let cli = parse(&[
            "classify", "3", "5", "-v", "category", "--mode", "audit", "--single-step",
            "--threshold", "0.5", "--apply",
        ]);

        let Commands::Classify(cmd) = &cli.command else {
            panic!("expected classify");
        };
        assert_eq!(cmd.options.ids, vec![3, 5]);
        assert_eq!(cmd.options.vocabularies, vec!["category"]);
        assert_eq!(cmd.options.mode, Some(Mode::Audit));
        assert!(cmd.options.single_step);
        assert!(cmd.apply);
    }

    #[test]
    fn invalid_mode_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["taxon", "classify", "--all", "--mode", "strict"]);
        assert!(result.is_err());
    }

    #[test]
    fn all_conflicts_with_ids() {
        let result = Cli::try_parse_from(["taxon", "classify", "1", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_flags_override_defaults() {
        let cli = parse(&["gaps", "--all", "--threshold", "0.4", "--single-step"]);
        let Commands::Gaps(cmd) = &cli.command else {
            panic!("expected gaps");
        };

        let config = classifier_config(&cmd.options).unwrap();

        assert_eq!(config.confidence_threshold, 0.4);
        assert_eq!(config.elicitation, Elicitation::SingleStep);
    }

    #[test]
    fn out_of_range_threshold_is_a_user_error() {
        let cli = parse(&["classify", "--all", "--threshold", "1.5"]);
        let Commands::Classify(cmd) = &cli.command else {
            panic!("expected classify");
        };

        let error = classifier_config(&cmd.options).unwrap_err();

        assert!(is_user_error(&error));
    }

    #[test]
    fn empty_label_is_a_user_error() {
        let cli = parse(&["add-label", "category", " "]);
        let Commands::AddLabel(cmd) = &cli.command else {
            panic!("expected add-label");
        };

        let error = handle_add_label(&cli, cmd).unwrap_err();

        assert!(is_user_error(&error));
        assert!(error.to_string().contains("cannot be empty"));
    }

    #[test]
    fn store_failures_are_internal_errors() {
        let error = anyhow::Error::from(StoreError::Sqlite(rusqlite_error()))
            .context("Failed to open database");
        assert!(!is_user_error(&error));

        let error = anyhow::Error::from(StoreError::UnknownItem(ItemId::new(3)))
            .context("Failed to apply label");
        assert!(is_user_error(&error));
    }

    fn rusqlite_error() -> rusqlite::Error {
        rusqlite::Error::QueryReturnedNoRows
    }

    #[test]
    fn classify_without_items_is_a_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("taxon.db");
        let cli = parse(&["--db", db_path.to_str().unwrap(), "classify", "--all"]);
        let Commands::Classify(cmd) = &cli.command else {
            panic!("expected classify");
        };

        let db = open_database(&cli).unwrap();
        let error = classify_run(&cli, &db, &cmd.options).err().unwrap();

        assert!(is_user_error(&error));
    }
}
