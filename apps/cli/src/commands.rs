//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use versefetch_core::{
    BatchReport, KeyspaceIndex, PipelineController, PipelineState, ProgressReporter, ResumeInfo,
    RunSummary, audit,
};
use versefetch_normalize::RuleSet;
use versefetch_shared::{AppConfig, Key, PipelineConfig, init_config, load_config, load_config_from};
use versefetch_storage::{LoadStatus, RecordStore, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// versefetch: resumable verse retrieval.
#[derive(Parser)]
#[command(
    name = "versefetch",
    version,
    about = "Fetch, normalize and checkpoint a fixed keyspace of verse records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.versefetch/versefetch.toml).
    #[arg(long, global = true, env = "VERSEFETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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
    /// Run (or resume) the pipeline until the keyspace is exhausted.
    Run {
        #[command(flatten)]
        overrides: RunOverrides,

        /// Hide the progress bar.
        #[arg(long)]
        quiet: bool,
    },

    /// List keys that have no record in the records file.
    Check {
        /// Records file (defaults to the configured one).
        #[arg(long)]
        records: Option<PathBuf>,

        /// Print the missing keys as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show checkpoint, stored record count and resume point.
    Status,

    /// Normalize text from a file (or stdin) with a named rule set.
    Normalize {
        /// Rule set: standard, indopak or plain.
        #[arg(long, default_value = "standard")]
        rules: String,

        /// Input file; reads stdin when omitted.
        file: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags that override `[pipeline]` values for one run.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunOverrides {
    /// Maximum concurrent fetches.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keys per batch (defaults to the concurrency).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Total attempts per key.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Records file path.
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Progress file path.
    #[arg(long)]
    pub progress: Option<PathBuf>,

    /// Write a JSON report of missing keys to this path.
    #[arg(long)]
    pub missing: Option<PathBuf>,
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
        0 => "versefetch=info",
        1 => "versefetch=debug",
        _ => "versefetch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { overrides, quiet } => cmd_run(config_path, &overrides, quiet).await,
        Command::Check { records, json } => cmd_check(config_path, records.as_deref(), json),
        Command::Status => cmd_status(config_path),
        Command::Normalize { rules, file } => cmd_normalize(&rules, file.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Resolve the pipeline config: file values, then CLI overrides.
fn resolve_pipeline(path: Option<&Path>, overrides: &RunOverrides) -> Result<PipelineConfig> {
    let app = load_app_config(path)?;
    let mut config = PipelineConfig::try_from(&app)?;

    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
        if app.pipeline.batch_size.is_none() {
            config.batch_size = concurrency;
        }
    }
    if let Some(batch_size) = overrides.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(max_attempts) = overrides.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(records) = &overrides.records {
        config.records_path = records.clone();
    }
    if let Some(progress) = &overrides.progress {
        config.progress_path = progress.clone();
    }
    if let Some(missing) = &overrides.missing {
        config.missing_path = Some(missing.clone());
    }

    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, overrides: &RunOverrides, quiet: bool) -> Result<()> {
    let config = resolve_pipeline(config_path, overrides)?;

    info!(
        kind = ?config.source.kind,
        rules = config.source.rules(),
        concurrency = config.concurrency,
        batch_size = config.batch_size,
        records = %config.records_path.display(),
        progress = %config.progress_path.display(),
        "starting run"
    );

    let mut pipeline = PipelineController::from_config(&config)?;
    let reporter = CliProgress::new(quiet);
    let summary = pipeline.run(&reporter).await?;

    println!();
    println!("  Run complete!");
    println!("  Fetched:    {}", summary.fetched);
    println!("  Skipped:    {}", summary.skipped);
    println!("  Missing:    {}", summary.missing.len());
    println!("  Stored:     {}", summary.stored);
    println!("  Checkpoint: {}", summary.checkpoint);
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    if let Some(path) = &config.missing_path {
        println!("  Report:     {}", path.display());
    }
    println!();

    Ok(())
}

fn cmd_check(config_path: Option<&Path>, records: Option<&Path>, json: bool) -> Result<()> {
    let config = resolve_pipeline(config_path, &RunOverrides::default())?;
    let records_path = records.unwrap_or(config.records_path.as_path());

    let index = KeyspaceIndex::new(config.counts.clone())?;
    let (store, status) = RecordStore::load(records_path)?;
    warn_on_recovery("records", records_path, &status);

    let report = audit(&index, &store);

    if json {
        println!("{}", serde_json::to_string_pretty(&report.missing)?);
        return Ok(());
    }

    if report.is_complete() {
        println!("All {} keys are present.", report.total);
    } else {
        println!(
            "Missing {} of {} keys:",
            report.missing.len(),
            report.total
        );
        for (partition, items) in report.missing_by_partition() {
            let items: Vec<String> = items.iter().map(u32::to_string).collect();
            println!("  {partition}: {}", items.join(", "));
        }
    }
    if !report.out_of_range.is_empty() {
        println!(
            "{} stored records fall outside the keyspace.",
            report.out_of_range.len()
        );
    }

    Ok(())
}

fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_pipeline(config_path, &RunOverrides::default())?;
    let index = KeyspaceIndex::new(config.counts.clone())?;

    let loaded = Storage::new(config.records_path.clone(), config.progress_path.clone()).load()?;
    warn_on_recovery("records", &config.records_path, &loaded.records_status);
    warn_on_recovery("progress", &config.progress_path, &loaded.progress_status);

    let checkpoint = loaded.checkpoint;
    let store = &loaded.store;
    let resume = index.keys_after(loaded.certified_checkpoint().last_key()).next();

    println!("  Source:       {:?}", config.source.kind);
    println!("  Records:      {}", config.records_path.display());
    println!("  Progress:     {}", config.progress_path.display());
    println!("  Checkpoint:   {checkpoint}");
    println!("  Stored:       {} / {}", store.len(), index.total_keys());
    match resume {
        Some(key) => println!("  Resume point: {key}"),
        None => println!("  Resume point: none (keyspace exhausted)"),
    }

    Ok(())
}

fn cmd_normalize(rules: &str, file: Option<&Path>) -> Result<()> {
    let rules = RuleSet::by_name(rules)?;

    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    for line in input.lines() {
        println!("{}", rules.normalize(line));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn warn_on_recovery(what: &str, path: &Path, status: &LoadStatus) {
    if let LoadStatus::Recovered { reason } = status {
        eprintln!(
            "warning: {what} file {} is corrupt and was ignored: {reason}",
            path.display()
        );
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar over the whole keyspace.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn state(&self, state: PipelineState) {
        self.bar.set_message(state.to_string());
    }

    fn resumed(&self, info: &ResumeInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.total - info.remaining);
    }

    fn key_missing(&self, key: Key, reason: &str) {
        self.bar.println(format!("  missing {key}: {reason}"));
    }

    fn batch_committed(&self, report: &BatchReport) {
        self.bar.inc(report.keys as u64);
        self.bar
            .set_message(format!("{}..{} committed", report.first, report.last));
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
