//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and plan and summary listings. The tree functions never
//! print; everything the user sees goes through here.

use crate::executor::{AppliedSummary, StepOutcome};
use crate::planner::{MovePlan, Operation};
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for plan execution
/// - Plan listings and execution summaries
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::success("Directory reorganized!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, to stderr.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::error("Recommended tree is invalid");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::warning("Could not save history");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::info("Undoing previous reorganization...");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a bold section header preceded by a blank line.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::header("PLANNED CHANGES");
    /// ```
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::dry_run_notice("No files were modified.");
    /// ```
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates and returns a progress bar for plan execution.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(10);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints every operation of a plan, with paths shown relative to `base_path`.
    pub fn print_plan(plan: &MovePlan, base_path: &Path) {
        Self::header("PLANNED CHANGES");
        for operation in plan.operations() {
            Self::plain(&format!("  {}", Self::describe(operation, base_path)));
        }

        let creates = plan
            .operations()
            .iter()
            .filter(|op| matches!(op, Operation::CreateFolder { .. }))
            .count();
        let removals = plan
            .operations()
            .iter()
            .filter(|op| matches!(op, Operation::RemoveEmptyFolder { .. }))
            .count();

        Self::header("SUMMARY");
        println!(
            "{:<16} | {}",
            "Folders created".bold(),
            creates.to_string().green()
        );
        println!(
            "{:<16} | {}",
            "Entries moved".bold(),
            plan.move_count().to_string().green()
        );
        if removals > 0 {
            println!(
                "{:<16} | {}",
                "Folders removed".bold(),
                removals.to_string().green()
            );
        }
    }

    /// Prints what an execution did and, if it stopped, why.
    pub fn print_summary(summary: &AppliedSummary, base_path: &Path) {
        let unchanged = summary
            .completed
            .iter()
            .filter(|step| step.outcome == StepOutcome::AlreadySatisfied)
            .count();

        if summary.is_complete_success() {
            Self::success(&format!(
                "Applied {} operations ({} already in place)",
                summary.applied_count(),
                unchanged
            ));
            return;
        }

        Self::warning(&format!(
            "Applied {} operations before stopping ({} already in place)",
            summary.applied_count(),
            unchanged
        ));
        if let Some(failure) = &summary.failure {
            Self::error(&format!(
                "Step {} failed: {}: {}",
                failure.index + 1,
                Self::describe(&failure.operation, base_path),
                failure.error
            ));
        }
        if summary.not_attempted > 0 {
            Self::warning(&format!(
                "{} operations were not attempted. Re-run to plan them again.",
                summary.not_attempted
            ));
        }
    }

    /// Prints the outcome of an undo.
    pub fn print_undo_report(report: &UndoReport) {
        Self::success(&format!("Restored: {}", report.restored));

        if !report.skipped.is_empty() {
            Self::warning(&format!("Skipped: {}", report.skipped.len()));
            for (path, reason) in &report.skipped {
                Self::plain(&format!("    - {}: {}", path.display(), reason));
            }
        }

        if !report.failed.is_empty() {
            Self::error(&format!("Failed: {}", report.failed.len()));
            for (path, reason) in &report.failed {
                eprintln!("    - {}: {}", path.display(), reason);
            }
        }
    }

    fn describe(operation: &Operation, base_path: &Path) -> String {
        let relative = |path: &Path| {
            path.strip_prefix(base_path)
                .unwrap_or(path)
                .display()
                .to_string()
        };

        match operation {
            Operation::CreateFolder { path } => {
                format!("{} {}/", "+".green(), relative(path))
            }
            Operation::MoveFile { from, to } => {
                format!("{} {} → {}", "→".cyan(), relative(from), relative(to))
            }
            Operation::RemoveEmptyFolder { path } => {
                format!("{} {}/", "-".red(), relative(path))
            }
        }
    }
}
