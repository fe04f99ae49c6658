//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use wikisearch_core::{IndexProgress, IndexReport, WikiIndexer, link};
use wikisearch_shared::{
    AppConfig, IndexerConfig, RESOURCE_TYPE, TopicStore, WikiSearchError, default_database_path,
    init_config, load_config,
};
use wikisearch_storage::{MemorySink, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// wikisearch — index wiki topics for search.
#[derive(Parser)]
#[command(
    name = "wikisearch",
    version,
    about = "Turn wiki topics into search documents and submit them to the index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load `*.wiki` files as topic revisions (one topic per file name).
    Import {
        /// Directory holding the wiki files.
        dir: PathBuf,

        /// Database path (defaults to the configured one).
        #[arg(long, env = "WIKISEARCH_DB")]
        db: Option<PathBuf>,
    },

    /// Index every wiki topic.
    Index {
        /// Database path (defaults to the configured one).
        #[arg(long, env = "WIKISEARCH_DB")]
        db: Option<PathBuf>,

        /// Submit all documents in a single call.
        #[arg(long)]
        batch: bool,

        /// Build documents and print them as JSON lines without storing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the documents built for one topic id.
    Document {
        /// Topic id.
        id: String,

        /// Database path (defaults to the configured one).
        #[arg(long, env = "WIKISEARCH_DB")]
        db: Option<PathBuf>,
    },

    /// Print a stored document by uid.
    Show {
        /// Document uid (e.g. `Home_wis`).
        uid: String,

        /// Database path (defaults to the configured one).
        #[arg(long, env = "WIKISEARCH_DB")]
        db: Option<PathBuf>,
    },

    /// Show indexer metadata.
    Info,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "wikisearch=info",
        1 => "wikisearch=debug",
        _ => "wikisearch=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import { dir, db } => cmd_import(&dir, db).await,
        Command::Index { db, batch, dry_run } => cmd_index(db, batch, dry_run, cli.verbose).await,
        Command::Document { id, db } => cmd_document(&id, db).await,
        Command::Show { uid, db } => cmd_show(&uid, db).await,
        Command::Info => cmd_info().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn resolve_db(db: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path),
        None => Ok(default_database_path(config)?),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_import(dir: &Path, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;

    let storage = Storage::open(&db_path).await?;
    let imported = import_wiki_dir(&storage, dir).await?;

    println!(
        "Imported {} topic revision(s) from {}",
        imported.len(),
        dir.display()
    );
    for page_name in &imported {
        println!("  {page_name}");
    }
    Ok(())
}

/// Load every `*.wiki` file in `dir` as a new revision of the topic named
/// after the file stem, creating the topic on first sight.
///
/// Returns the imported page names in file name order.
async fn import_wiki_dir(storage: &Storage, dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| WikiSearchError::io(dir, e))? {
        let path = entry.map_err(|e| WikiSearchError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "wiki") {
            files.push(path);
        }
    }
    files.sort();

    let mut imported = Vec::with_capacity(files.len());
    for path in files {
        let Some(page_name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
        else {
            warn!(path = %path.display(), "skipping file with a non UTF-8 name");
            continue;
        };

        let content =
            std::fs::read_to_string(&path).map_err(|e| WikiSearchError::io(&path, e))?;
        let edited_at = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let topic_id = match storage.find_topic_id(&page_name).await? {
            Some(id) => id,
            None => storage.insert_topic(&page_name).await?,
        };
        storage
            .add_topic_version(topic_id, Some(&content), edited_at)
            .await?;

        debug!(page_name, topic_id, "imported topic revision");
        imported.push(page_name);
    }
    Ok(imported)
}

async fn cmd_index(db: Option<PathBuf>, batch: bool, dry_run: bool, verbose: u8) -> Result<()> {
    let config = load_config()?;
    let mut indexer_config = IndexerConfig::from(&config);
    indexer_config.batch |= batch;

    if !indexer_config.enabled {
        return Err(eyre!(
            "indexer '{}' is disabled; set `enabled = true` under [indexer] to run it",
            indexer_config.name
        ));
    }

    let db_path = resolve_db(db, &config)?;
    info!(db = %db_path.display(), batch = indexer_config.batch, dry_run, "indexing wiki");

    if dry_run {
        let storage = Storage::open_readonly(&db_path).await?;
        let indexer = WikiIndexer::new(&storage, MemorySink::new(), indexer_config)?;
        let reporter = CliProgress::new();
        let report = indexer
            .index(&reporter)
            .await
            .inspect_err(|_| reporter.abandon())?;

        for document in indexer.sink().documents() {
            println!("{}", serde_json::to_string(&document)?);
        }
        print_summary(&report, verbose);
        return Ok(());
    }

    let storage = Storage::open(&db_path).await?;
    let run_id = storage.insert_index_run().await?;
    let reporter = CliProgress::new();

    let report = index_recorded(&storage, &run_id, &storage, indexer_config, &reporter)
        .await
        .inspect_err(|_| reporter.abandon())?;

    print_summary(&report, verbose);
    Ok(())
}

/// Index `store` into `storage` and finish the `run_id` row with the run's
/// statistics, or with the error that stopped it.
async fn index_recorded<S: TopicStore>(
    storage: &Storage,
    run_id: &str,
    store: S,
    config: IndexerConfig,
    progress: &dyn IndexProgress,
) -> Result<IndexReport> {
    let outcome = match WikiIndexer::new(store, storage, config) {
        Ok(indexer) => indexer.index(progress).await,
        Err(e) => Err(e),
    };

    let stats = match &outcome {
        Ok(report) => run_stats(report),
        Err(e) => failed_run_stats(e),
    };
    storage.finish_index_run(run_id, &stats.to_string()).await?;

    Ok(outcome?)
}

fn run_stats(report: &IndexReport) -> serde_json::Value {
    serde_json::json!({
        "status": "finished",
        "total": report.total,
        "indexed": report.indexed,
        "failed": report.errors.len(),
        "elapsed_ms": report.elapsed.as_millis() as u64,
        "errors": report.errors,
        "logs": report.logs,
    })
}

fn failed_run_stats(error: &WikiSearchError) -> serde_json::Value {
    serde_json::json!({
        "status": "failed",
        "error": error.to_string(),
    })
}

fn print_summary(report: &IndexReport, verbose: u8) {
    println!();
    if verbose > 0 && !report.logs.is_empty() {
        println!("{}", report.log_text());
        println!();
    }
    println!("  Indexing finished");
    println!("  Topics:  {}", report.total);
    println!("  Indexed: {}", report.indexed);
    println!("  Failed:  {}", report.errors.len());
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    for error in &report.errors {
        println!("  ! {error}");
    }
    println!();
}

async fn cmd_document(id: &str, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;

    let storage = Storage::open_readonly(&db_path).await?;
    let indexer = WikiIndexer::new(&storage, MemorySink::new(), IndexerConfig::from(&config))?;

    let documents = indexer.documents_for_id(id).await?;
    if documents.is_empty() {
        warn!(id, "no topic with this id");
        return Err(eyre!("no topic with id {id}"));
    }

    for document in &documents {
        println!("{}", serde_json::to_string_pretty(document)?);
    }
    Ok(())
}

async fn cmd_show(uid: &str, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;

    let storage = Storage::open_readonly(&db_path).await?;
    let document = storage
        .get_document(uid)
        .await?
        .ok_or_else(|| eyre!("no document with uid '{uid}'"))?;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

async fn cmd_info() -> Result<()> {
    let config = load_config()?;
    let indexer = IndexerConfig::from(&config);
    let portal = link::parse_portal_url(&indexer.portal_url)?;

    println!();
    println!("  Name:        {}", indexer.name);
    println!("  Description: {}", indexer.description);
    println!("  Version:     {}", indexer.version);
    println!("  Enabled:     {}", indexer.enabled);
    println!("  Batch:       {}", indexer.batch);
    println!("  Resources:   {RESOURCE_TYPE}");
    println!("  Site:        {}", indexer.site_name);
    println!("  Portal:      {portal}");
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    /// Clear the spinner when a run stops before `done`.
    fn abandon(&self) {
        self.spinner.finish_and_clear();
    }
}

impl IndexProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn topic_indexed(&self, page_name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Indexed [{current}/{total}] {page_name}"));
    }

    fn topic_failed(&self, page_name: &str, _error: &str) {
        self.spinner.set_message(format!("Failed {page_name}"));
    }

    fn done(&self, _report: &IndexReport) {
        self.spinner.finish_and_clear();
    }
}
