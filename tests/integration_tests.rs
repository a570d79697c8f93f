/// Integration tests for tidyup
///
/// These tests simulate real-world usage scenarios, testing the complete
/// end-to-end flow from snapshot to applied reorganization.
///
/// Test categories:
/// 1. Serialization and parsing
/// 2. Planning against real directories
/// 3. Execution and partial failure
/// 4. CLI reorganize, dry run and undo
/// 5. Configuration and filtering
use chrono::{DateTime, TimeZone, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;
use tidyup::cli::{CliError, OrganizeOverrides, TidyCommand, run_cli};
use tidyup::executor::{ExecuteError, StepOutcome, apply};
use tidyup::parser::{ParseError, parse};
use tidyup::planner::{MatchStrategy, Operation, PlanError, PlanOptions, plan, plan_with};
use tidyup::serializer::serialize;
use tidyup::undo::{HISTORY_FILE_NAME, HistoryError, UndoManager};

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture with a directory named `root` inside a temporary directory.
/// Recommendation and config files are written next to `root`, so they never
/// show up in its snapshot.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("root")).expect("Failed to create root");
        TestFixture { temp_dir }
    }

    /// Get the path to the directory under test.
    fn path(&self) -> PathBuf {
        self.temp_dir.path().join("root")
    }

    /// Create a file with content, creating parent folders as needed.
    fn create_text_file(&self, rel_path: &str, content: &str) {
        let file_path = self.path().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content.as_bytes())
            .expect("Failed to write file content");
        file.set_modified(SystemTime::from(new_year()))
            .expect("Failed to set modification time");
    }

    fn create_subdir(&self, rel_path: &str) {
        fs::create_dir_all(self.path().join(rel_path)).expect("Failed to create subdirectory");
    }

    /// Write a recommendation response next to the directory under test.
    fn write_recommendation(&self, text: &str) -> PathBuf {
        let path = self.temp_dir.path().join("recommendation.txt");
        fs::write(&path, text).expect("Failed to write recommendation");
        path
    }

    fn write_config(&self, toml: &str) -> PathBuf {
        let path = self.temp_dir.path().join("tidyup.toml");
        fs::write(&path, toml).expect("Failed to write config");
        path
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(
            path.is_dir(),
            "Directory {} does not exist",
            path.display()
        );
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File {} does not exist", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File {} should not exist", path.display());
    }

    fn reorganize(&self, recommendation: &Path, dry_run: bool) -> TidyCommand {
        TidyCommand::Reorganize {
            dir: self.path(),
            recommendations: recommendation.to_path_buf(),
            overrides: OrganizeOverrides::default(),
            dry_run,
        }
    }
}

fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

const STAMP: &str = "(Modified: 2024-01-01T00:00:00.000Z)";

// ============================================================================
// Serialization and parsing
// ============================================================================

#[test]
fn test_serialize_file_and_unexpanded_subfolder() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("sub/inner.txt", "inner");

    let (text, _) = serialize(&fixture.path(), false).expect("Serialization failed");

    assert_eq!(
        text,
        "- root\n  - a.txt (Modified: 2024-01-01T00:00:00.000Z)\n  - sub/\n"
    );
}

#[test]
fn test_serialized_text_parses_back_to_the_same_tree() {
    let fixture = TestFixture::new();
    fixture.create_text_file("notes.md", "notes");
    fixture.create_text_file("docs/2023/report.pdf", "report");
    fixture.create_text_file("docs/todo.txt", "todo");
    fixture.create_subdir("empty");

    let (text, tree) = serialize(&fixture.path(), true).expect("Serialization failed");
    let parsed = parse(&text).expect("Serialized text should parse");

    assert!(parsed.diagnostics.is_empty());
    assert_eq!(parsed.tree.root(), tree.root());
}

#[test]
fn test_unexpanded_folder_survives_parse() {
    let fixture = TestFixture::new();
    fixture.create_text_file("project/src/main.rs", "fn main() {}");

    let (text, tree) = serialize(&fixture.path(), false).expect("Serialization failed");
    let parsed = parse(&text).expect("Serialized text should parse");

    assert_eq!(parsed.tree.root(), tree.root());
    assert!(parsed.tree.root().child("project").unwrap().is_unexpanded());
}

#[test]
fn test_skipped_indentation_level_is_rejected() {
    let text = format!("- root\n    - a.txt {STAMP}\n");

    let err = parse(&text).unwrap_err();

    assert!(matches!(
        err,
        ParseError::InvalidIndentation { line: 2, depth: 2, .. }
    ));
}

// ============================================================================
// Planning and execution
// ============================================================================

#[test]
fn test_plan_groups_one_file_and_skips_the_other() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.txt", "beta");

    let (_, old) = serialize(&fixture.path(), false).unwrap();
    let base = old.base_path().unwrap().to_path_buf();
    let new = parse(&format!(
        "- root\n  - docs\n    - a.txt {STAMP}\n  - b.txt {STAMP}\n"
    ))
    .unwrap()
    .tree;

    let plan = plan(&base, &old, &new).expect("Planning failed");

    assert_eq!(
        plan.operations(),
        &[
            Operation::CreateFolder {
                path: base.join("docs")
            },
            Operation::MoveFile {
                from: base.join("a.txt"),
                to: base.join("docs").join("a.txt"),
            },
        ]
    );
}

#[test]
fn test_entry_count_mismatch_is_reported() {
    let old = parse(&format!(
        "- root\n  - a.txt {STAMP}\n  - b.txt {STAMP}\n  - c.txt {STAMP}\n"
    ))
    .unwrap()
    .tree;
    let new = parse(&format!("- root\n  - docs\n    - a.txt {STAMP}\n    - b.txt {STAMP}\n"))
        .unwrap()
        .tree;

    let err = plan(Path::new("/base"), &old, &new).unwrap_err();

    assert!(matches!(
        err,
        PlanError::StructuralMismatch {
            old_entries: 3,
            new_entries: 2,
            ..
        }
    ));
}

#[test]
fn test_applied_plan_leaves_nothing_to_plan() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.jpg", "beta");
    fixture.create_text_file("c.txt", "gamma");

    let revised = format!(
        "- root\n  - text\n    - a.txt {STAMP}\n    - c.txt {STAMP}\n  - images\n    - b.jpg {STAMP}\n"
    );
    let new = parse(&revised).unwrap().tree;

    let (_, old) = serialize(&fixture.path(), true).unwrap();
    let base = old.base_path().unwrap().to_path_buf();
    let summary = apply(plan(&base, &old, &new).unwrap());
    assert!(summary.is_complete_success());

    let (_, reorganized) = serialize(&fixture.path(), true).unwrap();
    let replan = plan(&base, &reorganized, &new).unwrap();
    assert!(replan.is_empty(), "unexpected operations: {replan:?}");

    assert_eq!(fixture.read("text/a.txt"), "alpha");
    assert_eq!(fixture.read("images/b.jpg"), "beta");
}

#[test]
fn test_source_removed_after_planning_halts_execution() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.txt", "beta");
    fixture.create_text_file("c.txt", "gamma");

    let (_, old) = serialize(&fixture.path(), false).unwrap();
    let base = old.base_path().unwrap().to_path_buf();
    let new = parse(&format!(
        "- root\n  - docs\n    - a.txt {STAMP}\n    - b.txt {STAMP}\n    - c.txt {STAMP}\n"
    ))
    .unwrap()
    .tree;
    let plan = plan(&base, &old, &new).unwrap();

    let moves: Vec<(usize, &Operation)> = plan
        .operations()
        .iter()
        .enumerate()
        .filter(|(_, op)| matches!(op, Operation::MoveFile { .. }))
        .collect();
    assert_eq!(moves.len(), 3);
    let (second_index, second_move) = moves[1];
    let Operation::MoveFile { from, .. } = second_move else {
        unreachable!()
    };
    fs::remove_file(from).unwrap();

    let total = plan.len();
    let summary = apply(plan.clone());

    assert_eq!(summary.completed.len(), second_index);
    assert_eq!(summary.completed[moves[0].0].outcome, StepOutcome::Applied);
    let failure = summary.failure.as_ref().expect("Execution should fail");
    assert_eq!(failure.index, second_index);
    assert!(matches!(failure.error, ExecuteError::SourceMissing { .. }));
    assert_eq!(summary.not_attempted, total - second_index - 1);
    assert!(summary.not_attempted >= 1);
}

#[test]
fn test_position_swap_exchanges_contents() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.txt", "beta");

    let (_, old) = serialize(&fixture.path(), false).unwrap();
    let base = old.base_path().unwrap().to_path_buf();
    let new = parse(&format!("- root\n  - b.txt {STAMP}\n  - a.txt {STAMP}\n"))
        .unwrap()
        .tree;
    let options = PlanOptions {
        strategy: MatchStrategy::ByPosition,
        ..PlanOptions::default()
    };

    let summary = apply(plan_with(&base, &old, &new, &options).unwrap());

    assert!(summary.is_complete_success());
    assert_eq!(fixture.read("a.txt"), "beta");
    assert_eq!(fixture.read("b.txt"), "alpha");
    assert_eq!(fs::read_dir(fixture.path()).unwrap().count(), 2);
}

// ============================================================================
// CLI workflows
// ============================================================================

#[test]
fn test_reorganize_from_recommendation_response() {
    let fixture = TestFixture::new();
    fixture.create_text_file("invoice.pdf", "invoice");
    fixture.create_text_file("photo.jpg", "photo");
    fixture.create_text_file("readme.md", "readme");

    let recommendation = fixture.write_recommendation(&format!(
        "Explanation of Recommendations:\nGroup documents and images.\n\n\
         Revised Directory Tree:\n```\n- root\n  - Images\n    - photo.jpg {STAMP}\n  \
         - Documents\n    - invoice.pdf {STAMP}\n  - readme.md {STAMP}\n```\n\n\
         Additional Notes:\nNothing else.\n"
    ));

    run_cli(fixture.reorganize(&recommendation, false), None).expect("Reorganize failed");

    fixture.assert_dir_exists("Images");
    fixture.assert_dir_exists("Documents");
    fixture.assert_file_exists("Images/photo.jpg");
    fixture.assert_file_exists("Documents/invoice.pdf");
    fixture.assert_file_exists("readme.md");
    fixture.assert_file_not_exists("photo.jpg");
    fixture.assert_file_exists(HISTORY_FILE_NAME);
    assert_eq!(fixture.read("Documents/invoice.pdf"), "invoice");
}

#[test]
fn test_dry_run_doesnt_move_files() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");

    let recommendation =
        fixture.write_recommendation(&format!("- root\n  - docs\n    - a.txt {STAMP}\n"));

    run_cli(fixture.reorganize(&recommendation, true), None).expect("Dry run failed");

    fixture.assert_file_exists("a.txt");
    fixture.assert_file_not_exists("docs");
    fixture.assert_file_not_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_reorganize_then_undo_restores_layout() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.txt", "beta");

    let recommendation = fixture.write_recommendation(&format!(
        "- root\n  - letters\n    - a.txt {STAMP}\n    - b.txt {STAMP}\n"
    ));
    run_cli(fixture.reorganize(&recommendation, false), None).expect("Reorganize failed");
    fixture.assert_file_exists("letters/a.txt");

    run_cli(TidyCommand::Undo { dir: fixture.path() }, None).expect("Undo failed");

    assert_eq!(fixture.read("a.txt"), "alpha");
    assert_eq!(fixture.read("b.txt"), "beta");
    fixture.assert_file_not_exists("letters/a.txt");
    fixture.assert_file_not_exists(HISTORY_FILE_NAME);
    // Created folders stay behind.
    fixture.assert_dir_exists("letters");
}

#[test]
fn test_reorganize_keeps_existing_folder_listed_without_marker() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("sub/inner.txt", "inner");

    let recommendation = fixture.write_recommendation(&format!(
        "- root\n  - docs\n    - a.txt {STAMP}\n  - sub\n"
    ));

    run_cli(fixture.reorganize(&recommendation, false), None).expect("Reorganize failed");

    assert_eq!(fixture.read("docs/a.txt"), "alpha");
    assert_eq!(fixture.read("sub/inner.txt"), "inner");
    fixture.assert_file_not_exists("a.txt");
}

#[test]
fn test_reorganize_into_existing_unexpanded_folder_then_undo() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("sub/inner.txt", "inner");

    let recommendation =
        fixture.write_recommendation(&format!("- root\n  - sub/\n    - a.txt {STAMP}\n"));

    run_cli(fixture.reorganize(&recommendation, false), None).expect("Reorganize failed");

    assert_eq!(fixture.read("sub/a.txt"), "alpha");
    assert_eq!(fixture.read("sub/inner.txt"), "inner");
    fixture.assert_file_not_exists("a.txt");

    run_cli(TidyCommand::Undo { dir: fixture.path() }, None).expect("Undo failed");

    assert_eq!(fixture.read("a.txt"), "alpha");
    fixture.assert_file_not_exists("sub/a.txt");
    assert_eq!(fixture.read("sub/inner.txt"), "inner");
}

#[test]
fn test_parse_error_reports_line_of_recommendation_file() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");

    let recommendation = fixture.write_recommendation(&format!(
        "Explanation of Recommendations:\nKeep it simple.\n\n\
         Revised Directory Tree:\n```\n- root\n\n      - a.txt {STAMP}\n```\n"
    ));

    let result = run_cli(fixture.reorganize(&recommendation, false), None);

    assert!(matches!(
        result,
        Err(CliError::Parse(ParseError::InvalidIndentation { line: 8, .. }))
    ));
    fixture.assert_file_exists("a.txt");
}

#[test]
fn test_undo_without_history() {
    let fixture = TestFixture::new();

    let result = run_cli(TidyCommand::Undo { dir: fixture.path() }, None);

    assert!(matches!(
        result,
        Err(CliError::History(HistoryError::NothingToUndo { .. }))
    ));
}

#[test]
fn test_mismatched_recommendation_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.txt", "beta");

    let recommendation =
        fixture.write_recommendation(&format!("- root\n  - docs\n    - a.txt {STAMP}\n"));

    let result = run_cli(fixture.reorganize(&recommendation, false), None);

    assert!(matches!(
        result,
        Err(CliError::Plan(PlanError::StructuralMismatch { .. }))
    ));
    fixture.assert_file_exists("a.txt");
    fixture.assert_file_not_exists("docs");
}

#[test]
fn test_missing_recommendation_file() {
    let fixture = TestFixture::new();
    let missing = fixture.temp_dir.path().join("nope.txt");

    let result = run_cli(fixture.reorganize(&missing, false), None);

    assert!(matches!(result, Err(CliError::Recommendations { .. })));
}

#[test]
fn test_tree_command_on_missing_directory() {
    let fixture = TestFixture::new();
    let command = TidyCommand::Tree {
        dir: fixture.path().join("missing"),
        recursive: false,
    };

    assert!(matches!(run_cli(command, None), Err(CliError::Serialize(_))));
}

// ============================================================================
// Configuration and filtering
// ============================================================================

#[test]
fn test_excluded_entries_are_left_alone() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("debug.log", "log");
    fixture.create_text_file(".hidden", "secret");

    let config = fixture.write_config(
        r#"
[filters.exclude]
extensions = ["log"]
"#,
    );
    let recommendation =
        fixture.write_recommendation(&format!("- root\n  - docs\n    - a.txt {STAMP}\n"));

    run_cli(fixture.reorganize(&recommendation, false), Some(&config))
        .expect("Reorganize failed");

    fixture.assert_file_exists("docs/a.txt");
    fixture.assert_file_exists("debug.log");
    fixture.assert_file_exists(".hidden");
}

#[test]
fn test_position_strategy_from_config() {
    let fixture = TestFixture::new();
    fixture.create_text_file("IMG_0001.jpg", "photo");

    let config = fixture.write_config(
        r#"
[organize]
match_strategy = "position"
"#,
    );
    let recommendation = fixture.write_recommendation(&format!(
        "- root\n  - Photos\n    - beach.jpg {STAMP}\n"
    ));

    run_cli(fixture.reorganize(&recommendation, false), Some(&config))
        .expect("Reorganize failed");

    assert_eq!(fixture.read("Photos/beach.jpg"), "photo");
    fixture.assert_file_not_exists("IMG_0001.jpg");
}

#[test]
fn test_hidden_destination_stops_reorganization() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "new");
    fixture.create_text_file("docs/a.txt", "old");

    let config = fixture.write_config(
        r#"
[organize]
recursive = true

[filters.exclude]
patterns = ["docs/a.txt"]
"#,
    );
    let recommendation =
        fixture.write_recommendation(&format!("- root\n  - docs\n    - a.txt {STAMP}\n"));

    let result = run_cli(fixture.reorganize(&recommendation, false), Some(&config));

    assert!(matches!(
        result,
        Err(CliError::Incomplete {
            source: ExecuteError::DestinationExists { .. },
            ..
        })
    ));
    assert_eq!(fixture.read("a.txt"), "new");
    assert_eq!(fixture.read("docs/a.txt"), "old");
    fixture.assert_file_not_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_invalid_config_is_reported() {
    let fixture = TestFixture::new();
    let config = fixture.write_config("[organize]\nmatch_strategy = \"alphabetical\"\n");
    let recommendation = fixture.write_recommendation("- root\n");

    let result = run_cli(fixture.reorganize(&recommendation, false), Some(&config));

    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn test_undo_manager_after_partial_cli_run_keeps_completed_moves() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "alpha");
    fixture.create_text_file("b.txt", "beta");
    fixture.create_text_file("archive/b.txt", "archived");

    let config = fixture.write_config(
        r#"
[organize]
recursive = true

[filters.exclude]
patterns = ["archive/b.txt"]
"#,
    );
    let recommendation = fixture.write_recommendation(&format!(
        "- root\n  - archive\n    - a.txt {STAMP}\n    - b.txt {STAMP}\n"
    ));

    let result = run_cli(fixture.reorganize(&recommendation, false), Some(&config));
    assert!(matches!(result, Err(CliError::Incomplete { .. })));
    fixture.assert_file_exists("archive/a.txt");
    fixture.assert_file_exists(HISTORY_FILE_NAME);

    let report = UndoManager::undo(&fixture.path()).expect("Undo failed");

    assert_eq!(report.restored, 1);
    assert_eq!(fixture.read("a.txt"), "alpha");
    assert_eq!(fixture.read("b.txt"), "beta");
    assert_eq!(fixture.read("archive/b.txt"), "archived");
}
