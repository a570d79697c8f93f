//! Command-line interface module for tidyup.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing and validation
//! - Snapshotting a directory as tree text
//! - Reorganization orchestration
//! - Undo operation handling

use crate::config::{ConfigError, TidyConfig};
use crate::executor::{self, ExecuteError};
use crate::output::OutputFormatter;
use crate::parser::{self, ParseError};
use crate::planner::{self, MatchStrategy, PlanError};
use crate::recommendation::Recommendation;
use crate::serializer::{self, SerializeError};
use crate::undo::{HistoryError, OperationLog, UndoManager};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reorganize a directory to match a recommended layout.
#[derive(Parser, Debug, Clone)]
#[command(name = "tidyup", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: TidyCommand,

    /// Configuration file to use instead of the default lookup.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, short, global = true, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, ValueEnum, Default)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> Option<tracing::Level> {
        match self {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

/// Represents a CLI command to execute.
#[derive(Subcommand, Debug, Clone)]
pub enum TidyCommand {
    /// Print the directory as tree text, ready to send to a recommender.
    Tree {
        dir: PathBuf,
        /// Descend into subfolders instead of listing them unexpanded.
        #[arg(long)]
        recursive: bool,
    },
    /// Apply a recommended layout to a directory.
    Reorganize {
        dir: PathBuf,
        /// File holding the recommendation response.
        #[arg(long)]
        recommendations: PathBuf,
        #[command(flatten)]
        overrides: OrganizeOverrides,
        /// Print the plan without touching the filesystem.
        #[arg(long)]
        dry_run: bool,
    },
    /// Revert the last reorganization of a directory.
    Undo { dir: PathBuf },
}

/// Command-line values that take precedence over the configuration file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct OrganizeOverrides {
    /// Descend into subfolders instead of listing them unexpanded.
    #[arg(long)]
    pub recursive: bool,
    /// How entries of the old tree are paired with the revised tree.
    #[arg(long, value_enum)]
    pub match_strategy: Option<MatchStrategy>,
    /// Remove folders the revised tree no longer contains, once empty.
    #[arg(long)]
    pub remove_empty_folders: bool,
}

impl OrganizeOverrides {
    fn apply_to(&self, config: &mut TidyConfig) {
        if self.recursive {
            config.organize.recursive = true;
        }
        if let Some(strategy) = self.match_strategy {
            config.organize.match_strategy = strategy;
        }
        if self.remove_empty_folders {
            config.organize.remove_empty_folders = true;
        }
    }
}

/// Everything that can stop a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error loading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("Cannot read recommendations from {}: {source}", path.display())]
    Recommendations { path: PathBuf, source: io::Error },

    #[error("Recommended tree is invalid: {0}")]
    Parse(#[from] ParseError),

    #[error("Cannot plan reorganization: {0}")]
    Plan(#[from] PlanError),

    #[error("Reorganization stopped at step {step}: {source}")]
    Incomplete { step: usize, source: ExecuteError },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("{failed} entries could not be restored; history was kept")]
    UndoIncomplete { failed: usize },
}

/// Runs the CLI application with the given command.
///
/// `config_path` overrides the configuration lookup described on
/// [`TidyConfig::load`].
///
/// # Examples
///
/// ```no_run
/// use tidyup::cli::{run_cli, TidyCommand};
///
/// let command = TidyCommand::Tree { dir: "/path/to/directory".into(), recursive: false };
/// if let Err(e) = run_cli(command, None) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: TidyCommand, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        TidyCommand::Tree { dir, recursive } => {
            let mut config = TidyConfig::load(config_path)?;
            config.organize.recursive |= recursive;
            print_tree(&dir, &config)
        }
        TidyCommand::Reorganize {
            dir,
            recommendations,
            overrides,
            dry_run,
        } => {
            let mut config = TidyConfig::load(config_path)?;
            overrides.apply_to(&mut config);
            reorganize(&dir, &recommendations, &config, dry_run)
        }
        TidyCommand::Undo { dir } => undo_reorganization(&dir),
    }
}

fn print_tree(dir: &Path, config: &TidyConfig) -> Result<(), CliError> {
    let filters = config.filters.compile()?;
    let (text, tree) = serializer::serialize_with(dir, config.organize.recursive, &filters)?;
    debug!("Serialized {} entries", tree.entry_count());
    print!("{text}");
    Ok(())
}

/// Reorganizes `dir` to match the tree in the recommendation file.
///
/// This function:
/// 1. Snapshots the directory as a tree
/// 2. Extracts and parses the revised tree from the recommendations
/// 3. Plans the operations that turn one into the other
/// 4. Applies them, unless this is a dry run
/// 5. Records the completed moves for a later undo
pub fn reorganize(
    dir: &Path,
    recommendations_path: &Path,
    config: &TidyConfig,
    dry_run: bool,
) -> Result<(), CliError> {
    let filters = config.filters.compile()?;
    let (_, old_tree) = serializer::serialize_with(dir, config.organize.recursive, &filters)?;
    let base_path = old_tree
        .base_path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.to_path_buf());
    info!("Reorganizing contents of {}", base_path.display());

    let response = fs::read_to_string(recommendations_path).map_err(|source| {
        CliError::Recommendations {
            path: recommendations_path.to_path_buf(),
            source,
        }
    })?;
    let recommendation = Recommendation::split(&response);
    if !recommendation.explanation.is_empty() {
        debug!("Recommendation explanation: {}", recommendation.explanation);
    }

    let parsed = parser::parse(&recommendation.tree)?;
    for diagnostic in &parsed.diagnostics {
        warn!("Recommended tree: {}", diagnostic);
    }

    let plan = planner::plan_with(
        &base_path,
        &old_tree,
        &parsed.tree,
        &config.organize.plan_options(),
    )?;

    if plan.is_empty() {
        OutputFormatter::success("Directory already matches the recommended layout.");
        return Ok(());
    }

    OutputFormatter::print_plan(&plan, &base_path);
    if !recommendation.notes.is_empty() {
        OutputFormatter::header("NOTES");
        OutputFormatter::plain(&recommendation.notes);
    }

    if dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
        OutputFormatter::info(&format!(
            "Run 'tidyup reorganize {} --recommendations {}' to apply.",
            dir.display(),
            recommendations_path.display()
        ));
        return Ok(());
    }

    let progress = OutputFormatter::create_progress_bar(plan.len() as u64);
    let summary = executor::apply_with(plan, |step| {
        progress.set_message(step.operation.to_string());
        progress.inc(1);
    });
    progress.finish_and_clear();

    let log = OperationLog::from_summary(base_path.clone(), &summary);
    if !log.moves.is_empty() {
        match log.save(&base_path) {
            Ok(()) => OutputFormatter::info(&format!(
                "History saved. Use 'tidyup undo {}' to revert changes.",
                dir.display()
            )),
            Err(e) => {
                warn!("Could not save history: {}", e);
                OutputFormatter::warning(&format!("Could not save history: {}", e));
            }
        }
    }

    OutputFormatter::print_summary(&summary, &base_path);

    match summary.failure {
        Some(failed) => Err(CliError::Incomplete {
            step: failed.index + 1,
            source: failed.error,
        }),
        None => Ok(()),
    }
}

/// Undoes the previous reorganization of `base_path`.
fn undo_reorganization(base_path: &Path) -> Result<(), CliError> {
    OutputFormatter::info("Undoing previous reorganization...");

    let report = UndoManager::undo(base_path)?;
    OutputFormatter::print_undo_report(&report);

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::UndoIncomplete {
            failed: report.failed.len(),
        })
    }
}
