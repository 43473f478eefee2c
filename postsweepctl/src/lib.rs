use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use postsweep_core::config::RangeSection;
use postsweep_core::{load_config, ContentKind, SpeedPreset, SweepConfig};

pub mod commands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] postsweep_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("journal error: {0}")]
    Journal(#[from] postsweep_core::sweep::JournalError),
    #[error("browser error: {0}")]
    Browser(#[from] postsweep_core::BrowserError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("run {run_id} failed: {reason}")]
    RunFailed { run_id: String, reason: String },
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sweeps old posts off an account timeline", long_about = None)]
pub struct Cli {
    /// Path to postsweep.toml
    #[arg(long, default_value = "configs/postsweep.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Debug-level logs (RUST_LOG still wins)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs a sweep against the configured account
    Run(RunArgs),
    /// Lists past runs from the journal
    History(HistoryArgs),
    /// Validates the config and the browser profile
    Check,
    /// Prints shell completions
    Completions(CompletionArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Account handle, with or without the leading @
    #[arg(long)]
    pub handle: Option<String>,
    /// Stop after this many removals
    #[arg(long)]
    pub target: Option<u64>,
    /// Content kinds to sweep (posts, replies, reposts)
    #[arg(long, value_delimiter = ',')]
    pub content: Vec<ContentKind>,
    /// Pacing preset (fast, normal, slow)
    #[arg(long)]
    pub speed: Option<SpeedPreset>,
    /// Delete everything dated before this day
    #[arg(long, value_name = "DATE", conflicts_with_all = ["delete_from", "delete_to"])]
    pub delete_before: Option<NaiveDate>,
    /// Start of a deletion band (inclusive)
    #[arg(long, value_name = "DATE", requires = "delete_to")]
    pub delete_from: Option<NaiveDate>,
    /// End of a deletion band (exclusive)
    #[arg(long, value_name = "DATE", requires = "delete_from")]
    pub delete_to: Option<NaiveDate>,
    /// Never touch anything dated on or after this day
    #[arg(long, value_name = "DATE")]
    pub protect_after: Option<NaiveDate>,
    /// Launch Chromium headless regardless of the config
    #[arg(long, default_value_t = false)]
    pub headless: bool,
    /// Classify and count without deleting
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Skip writing the run journal
    #[arg(long, default_value_t = false)]
    pub no_journal: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Number of runs returned
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
    /// Show the actions of a single run
    #[arg(long, value_name = "RUN_ID")]
    pub run: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Completions(args) => {
            let mut command = Cli::command();
            clap_complete::generate(args.shell, &mut command, "postsweepctl", &mut io::stdout());
        }
        Commands::Run(args) => {
            let mut config = load_config(&cli.config)?;
            apply_overrides(&mut config, args)?;
            config.validate()?;
            let report = commands::run::execute(config, args)?;
            render(&report, cli.format)?;
            if report.outcome == postsweep_core::RunOutcome::Failed {
                return Err(AppError::RunFailed {
                    run_id: report.run_id.to_string(),
                    reason: report.error.clone().unwrap_or_default(),
                });
            }
        }
        Commands::History(args) => {
            let config = load_config(&cli.config)?;
            let journal = commands::history::open_journal(&config)?;
            match &args.run {
                Some(run_id) => {
                    let detail = commands::history::run_detail(&journal, run_id)?;
                    render(&detail, cli.format)?;
                }
                None => {
                    let list = commands::history::recent(&journal, args.limit)?;
                    render(&list, cli.format)?;
                }
            }
        }
        Commands::Check => {
            let report = health_check(&cli.config);
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Folds the command-line flags over the `run` and `policy` sections.
pub fn apply_overrides(config: &mut SweepConfig, args: &RunArgs) -> Result<()> {
    if let Some(handle) = &args.handle {
        let handle = handle.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(AppError::InvalidArguments("--handle must not be empty".into()));
        }
        config.run.handle = Some(handle.to_string());
    }
    if let Some(target) = args.target {
        if target == 0 {
            return Err(AppError::InvalidArguments("--target must be at least 1".into()));
        }
        config.run.target = Some(target);
    }
    if !args.content.is_empty() {
        let mut content = Vec::with_capacity(args.content.len());
        for kind in &args.content {
            if !content.contains(kind) {
                content.push(*kind);
            }
        }
        config.run.content = content;
    }
    if let Some(speed) = args.speed {
        config.run.speed = speed;
    }
    match (args.delete_before, args.delete_from, args.delete_to) {
        (Some(cutoff), None, None) => {
            config.policy.range = RangeSection::Before { cutoff };
        }
        (None, Some(from), Some(to)) => {
            config.policy.range = RangeSection::Between { from, to };
        }
        (None, None, None) => {}
        _ => {
            return Err(AppError::InvalidArguments(
                "use either --delete-before or both --delete-from and --delete-to".into(),
            ))
        }
    }
    if let Some(protect_after) = args.protect_after {
        config.policy.protect_after = protect_after;
    }
    if args.dry_run {
        config.run.dry_run = true;
    }
    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for postsweep_core::RunReport {
    fn display(&self) -> String {
        self.render_text().trim_end().to_string()
    }
}

fn health_check(config_path: &Path) -> Vec<HealthEntry> {
    let mut entries = Vec::new();
    let config = match load_config(config_path) {
        Ok(config) => {
            entries.push(HealthEntry::ok("config", config_path.display().to_string()));
            config
        }
        Err(err) => {
            entries.push(HealthEntry::error("config", err.to_string()));
            return entries;
        }
    };

    match config.validate() {
        Ok(()) => entries.push(HealthEntry::ok("policy", describe_policy(&config))),
        Err(err) => entries.push(HealthEntry::error("policy", err.to_string())),
    }
    match &config.run.handle {
        Some(handle) if !handle.trim().is_empty() => {
            entries.push(HealthEntry::ok("handle", format!("@{}", handle.trim_start_matches('@'))))
        }
        _ => entries.push(HealthEntry::warn("handle", "not set; pass --handle to run")),
    }
    entries.push(check_directory(
        "profile",
        Path::new(&config.chromium.user_data_dir),
    ));
    if !config.chromium.executable_path.is_empty() {
        entries.push(check_path(
            "chromium",
            Path::new(&config.chromium.executable_path),
        ));
    }
    if config.journal.enabled {
        entries.push(check_database("journal", Path::new(&config.journal.path)));
    } else {
        entries.push(HealthEntry::warn("journal", "disabled"));
    }
    entries
}

fn describe_policy(config: &SweepConfig) -> String {
    let range = match config.policy.range {
        RangeSection::Before { cutoff } => format!("delete before {cutoff}"),
        RangeSection::Between { from, to } => format!("delete from {from} to {to}"),
    };
    format!("{range}, protect from {}", config.policy.protect_after)
}

fn check_path(name: &str, path: &Path) -> HealthEntry {
    if path.exists() {
        HealthEntry::ok(name, path.display().to_string())
    } else {
        HealthEntry::error(name, format!("{} missing", path.display()))
    }
}

fn check_directory(name: &str, path: &Path) -> HealthEntry {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => HealthEntry::ok(name, path.display().to_string()),
        Ok(_) => HealthEntry::error(name, format!("{} is not a directory", path.display())),
        Err(_) => HealthEntry::error(
            name,
            format!("{} missing; sign in with this profile first", path.display()),
        ),
    }
}

fn check_database(name: &str, path: &Path) -> HealthEntry {
    if !path.exists() {
        return HealthEntry::warn(
            name,
            format!("{} not created yet; the first run creates it", path.display()),
        );
    }
    match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(conn) => {
            match conn.query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0)) {
                Ok(result) if result.eq_ignore_ascii_case("ok") => {
                    HealthEntry::ok(name, "integrity ok")
                }
                Ok(result) => HealthEntry::warn(name, format!("integrity_check: {result}")),
                Err(err) => HealthEntry::warn(name, format!("error: {err}")),
            }
        }
        Err(err) => HealthEntry::error(name, format!("failed to open: {err}")),
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(HealthEntry::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for HealthEntry {
    fn display(&self) -> String {
        format!(
            "[{status}] {name}: {detail}",
            status = self.status,
            name = self.name,
            detail = self.detail
        )
    }
}
