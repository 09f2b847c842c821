//! Binary entry point for the modernize CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Extract the facts of a legacy project
//! modernize facts ./legacy
//!
//! # Derive a phased migration plan
//! modernize plan ./legacy
//!
//! # Audit a rewrite against the legacy source
//! modernize compare ./legacy ./rewrite --coverage-threshold 80
//!
//! # Drop cached facts
//! modernize cache clean
//! ```
//!
//! Output is JSON on stdout; logs go to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use modernize::cli::{run_cache_clean, run_compare, run_facts, run_plan, CacheMode};
use modernize::{CliOverrides, ErrorResponse, ModernizeError, OutputErrorCode, ResolvedConfig};
use modernize_core::output::emit_response;

// ============================================================================
// CLI Structure
// ============================================================================

/// Migration planning and rewrite coverage auditing for legacy codebases.
#[derive(Parser, Debug)]
#[command(
    name = "modernize",
    version,
    about = "Migration planning and rewrite coverage auditing for legacy codebases"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// JSON configuration file (keyword tables, thresholds).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Facts cache directory (default: .modernize-cache).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Disable the facts cache.
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    no_cache: bool,

    /// Minimum coverage percentage for a passing category.
    #[arg(long, global = true)]
    coverage_threshold: Option<f64>,

    /// Minimum confidence for a correspondence edge.
    #[arg(long, global = true)]
    min_confidence: Option<f64>,

    /// Minimum name similarity for a correspondence candidate.
    #[arg(long, global = true)]
    similarity_floor: Option<f64>,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the structural facts of a project directory.
    Facts {
        /// Project directory.
        dir: PathBuf,
    },
    /// Derive a phased migration plan from a legacy project.
    Plan {
        /// Legacy project directory.
        dir: PathBuf,
    },
    /// Audit how much of a legacy project a rewrite covers.
    Compare {
        /// Legacy project directory.
        source: PathBuf,
        /// Rewritten project directory.
        target: PathBuf,
    },
    /// Manage the facts cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove every cached entry.
    Clean,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Errors go to stdout as JSON, like every other response.
            let response = ErrorResponse::from_error(&err);
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(OutputErrorCode::from(&err).code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), ModernizeError> {
    let global = &cli.global;
    let overrides = CliOverrides {
        coverage_threshold: global.coverage_threshold,
        min_confidence: global.min_confidence,
        similarity_floor: global.similarity_floor,
    };
    let resolved = ResolvedConfig::resolve(global.config.as_deref(), &overrides)?;
    let config = resolved.to_analysis_config();
    let cache = CacheMode::from_flags(global.cache_dir.clone(), global.no_cache);

    let mut stdout = io::stdout();
    let written = match cli.command {
        Command::Facts { dir } => emit_response(&run_facts(&dir, &config, &cache)?, &mut stdout),
        Command::Plan { dir } => emit_response(&run_plan(&dir, &config, &cache)?, &mut stdout),
        Command::Compare { source, target } => emit_response(
            &run_compare(&source, &target, &config, &cache)?,
            &mut stdout,
        ),
        Command::Cache {
            action: CacheAction::Clean,
        } => emit_response(&run_cache_clean(&cache, &config.extractor)?, &mut stdout),
    };
    written.map_err(|e| ModernizeError::internal(e.to_string()))
}
