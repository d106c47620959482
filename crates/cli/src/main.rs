//! revmigrate command-line tool.
//!
//! Lists the workflow modes, generates and validates configuration files,
//! and runs a configured workflow against a replay fixture.

mod signals;
mod style;
mod terminal;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use revmigrate_core::config::MigrationConfig;
use revmigrate_core::errors::{ErrorKind, MigrationError};
use revmigrate_core::helper::RunHelper;
use revmigrate_core::replay::{DestinationCommit, ReplayFixture, ReplayRepository};
use revmigrate_core::workflow::{ThreadSleeper, WorkflowMode};

use terminal::TerminalConsole;

const DEFAULT_CONFIG_PATH: &str = "./revmigrate.toml";

/// Exit code when there was nothing to migrate.
const EXIT_EMPTY_CHANGE: u8 = 2;
/// Exit code when the operator aborted the run.
const EXIT_REJECTED: u8 = 3;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// revmigrate command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "revmigrate",
    version,
    about = "Migrate change history from an origin to a destination"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (overrides RUST_LOG and the config file).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available workflow modes.
    Modes,

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Run the configured workflow against a replay fixture.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Replay fixture describing the origin and destination.
    #[arg(long)]
    replay: PathBuf,

    /// Workflow mode, overriding the config file.
    #[arg(long)]
    mode: Option<WorkflowMode>,

    /// Origin change to migrate, overriding the fixture.
    #[arg(long = "ref")]
    reference: Option<String>,

    /// Proceed when the last migrated revision is unknown or nothing changed.
    #[arg(long)]
    force: bool,

    /// Destination baseline for CHANGE_REQUEST, or origin baseline for
    /// CHANGE_REQUEST_FROM_SOT.
    #[arg(long)]
    change_request_parent: Option<String>,

    /// Maximum number of changes ITERATIVE imports.
    #[arg(long)]
    iterative_limit_changes: Option<usize>,

    /// Maximum number of origin ancestors CHANGE_REQUEST_FROM_SOT tries.
    #[arg(long)]
    change_request_from_sot_limit: Option<usize>,

    /// Seconds to wait between CHANGE_REQUEST_FROM_SOT destination lookups,
    /// comma separated (e.g. `10,30,60`).
    #[arg(long, value_delimiter = ',')]
    change_request_from_sot_retry: Option<Vec<u64>>,

    /// Answer yes to every prompt.
    #[arg(short, long)]
    yes: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_status_for(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Modes => {
            init_logging(cli.log_level.as_deref(), None);
            cmd_modes();
            Ok(())
        }
        Commands::Init { output } => {
            init_logging(cli.log_level.as_deref(), None);
            cmd_init(&output)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref(), None);
            let path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            cmd_validate(&path)
        }
        Commands::Run(args) => {
            let config = match &cli.config {
                Some(path) => load_config(path)?,
                None => MigrationConfig::default(),
            };
            init_logging(cli.log_level.as_deref(), Some(&config.logging.level));
            let interrupt = signals::install_interrupt_flag()
                .context("failed to install signal handlers")?;
            cmd_run(config, args, interrupt)
        }
    }
}

/// `--log-level`, then `RUST_LOG`, then the config file, then `warn`.
fn init_logging(cli_level: Option<&str>, config_level: Option<&str>) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.unwrap_or("warn"))),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn exit_status_for(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<MigrationError>())
        .map(MigrationError::kind);
    match kind {
        Some(ErrorKind::EmptyChange) => EXIT_EMPTY_CHANGE,
        Some(ErrorKind::Rejected) => EXIT_REJECTED,
        _ => 1,
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<MigrationConfig> {
    MigrationConfig::load_and_validate(path).context("failed to load configuration file")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_modes() {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Mode", "Description"]);
    for mode in WorkflowMode::ALL {
        table.add_row(vec![Cell::new(mode.as_str()), Cell::new(mode.description())]);
    }
    println!("{}", table);
}

const DEFAULT_CONFIG: &str = r#"# revmigrate configuration

[workflow]
name = "default"
# SQUASH | ITERATIVE | CHANGE_REQUEST | CHANGE_REQUEST_FROM_SOT
mode = "SQUASH"
# Drop the list of squashed changes from the destination commit.
squash_without_history = false

[options]
force = false
# change_request_parent = "abc123"
# iterative_limit_changes = 10
# change_request_from_sot_limit = 5
# Seconds to wait between destination baseline lookups.
change_request_from_sot_retry = []

[logging]
level = "warn"
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Pick a workflow mode and options in the config file");
    println!(
        "  2. Validate with: revmigrate validate --config {}",
        output.display()
    );
    println!(
        "  3. Rehearse with: revmigrate run --config {} --replay fixture.toml",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        MigrationConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let options = &config.options;
    println!();
    println!("Configuration summary:");
    println!("  Workflow          : {}", config.workflow.name);
    println!("  Mode              : {}", style::mode(config.workflow.mode));
    println!("  Force             : {}", options.force);
    println!(
        "  Parent            : {}",
        options.change_baseline().unwrap_or("not set")
    );
    println!(
        "  Iterative limit   : {}",
        describe_limit(options.iterative_limit_changes)
    );
    println!(
        "  FROM_SOT limit    : {}",
        describe_limit(options.change_request_from_sot_limit)
    );
    println!(
        "  FROM_SOT retries  : {:?}",
        options.change_request_from_sot_retry
    );
    println!("  Log level         : {}", config.logging.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn describe_limit(limit: Option<usize>) -> String {
    limit
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unlimited".to_string())
}

/// What `run --json` prints.
#[derive(Serialize)]
struct RunReport<'a> {
    workflow: &'a str,
    mode: WorkflowMode,
    resolved_ref: String,
    migration_units: usize,
    changes_discovered: usize,
    created: Vec<DestinationCommit>,
}

fn cmd_run(mut config: MigrationConfig, args: RunArgs, interrupt: Arc<AtomicBool>) -> Result<()> {
    if let Some(mode) = args.mode {
        config.workflow.mode = mode;
    }
    let options = &mut config.options;
    options.force |= args.force;
    if args.change_request_parent.is_some() {
        options.change_request_parent = args.change_request_parent;
    }
    if args.iterative_limit_changes.is_some() {
        options.iterative_limit_changes = args.iterative_limit_changes;
    }
    if args.change_request_from_sot_limit.is_some() {
        options.change_request_from_sot_limit = args.change_request_from_sot_limit;
    }
    if let Some(retry) = args.change_request_from_sot_retry {
        options.change_request_from_sot_retry = retry;
    }
    config
        .validate()
        .context("invalid command-line options")?;

    let fixture =
        ReplayFixture::load_from_file(&args.replay).context("failed to load replay fixture")?;
    let mut repo = ReplayRepository::new(
        fixture,
        config.options.clone(),
        Box::new(TerminalConsole::new(args.yes)),
    )
    .context("failed to prepare replay repository")?
    .with_squash_without_history(config.workflow.squash_without_history);
    if let Some(reference) = &args.reference {
        repo = repo
            .with_requested_ref(reference)
            .context("failed to resolve --ref")?;
    }

    let mode = config.workflow.mode;
    info!(workflow = %config.workflow.name, %mode, "starting run");
    let before = repo.destination_commits().len();
    let sleeper = ThreadSleeper::with_interrupt(interrupt);
    let summary = mode
        .run_with_sleeper(&repo, &sleeper)
        .with_context(|| format!("workflow '{}' ({}) failed", config.workflow.name, mode))?;
    let mut created = repo.destination_commits();
    let created = created.split_off(before.min(created.len()));

    if args.json {
        let report = RunReport {
            workflow: &config.workflow.name,
            mode,
            resolved_ref: repo.resolved_ref().to_string(),
            migration_units: summary.migration_units,
            changes_discovered: summary.changes_discovered,
            created,
        };
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{}", json);
        return Ok(());
    }

    println!();
    println!(
        "{}",
        style::header(&format!(
            "{} run of '{}'",
            style::mode(mode),
            config.workflow.name
        ))
    );
    println!();
    println!("{}", render_commits(&created));
    println!();
    println!(
        "{}",
        style::success(&format!(
            "{} migration unit(s) from {} origin change(s)",
            summary.migration_units, summary.changes_discovered
        ))
    );

    Ok(())
}

fn render_commits(commits: &[DestinationCommit]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Commit", "Baseline", "Origin changes", "Author", "Summary"]);

    for commit in commits {
        table.add_row(vec![
            Cell::new(&commit.id),
            Cell::new(commit.baseline.as_deref().unwrap_or("—")),
            Cell::new(commit.origin_changes.join(", ")),
            Cell::new(commit.author.to_string()),
            Cell::new(truncate(commit.message.lines().next().unwrap_or(""), 60)),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
