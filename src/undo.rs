/// Move history and undo for reorganizations.
///
/// After a plan is applied, every move that changed the filesystem is written
/// to a history file in the reorganized directory. Undo replays that history
/// backwards, moving each entry back to where it came from.
use crate::executor::{AppliedSummary, ExecuteError, move_entry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the history file kept in the reorganized directory.
pub const HISTORY_FILE_NAME: &str = ".tidyup_history.json";

/// Errors that can occur while saving, loading or replaying history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The directory to undo does not exist.
    #[error("Invalid base path {}: {source}", path.display())]
    InvalidBasePath { path: PathBuf, source: io::Error },
    /// There is no history to undo.
    #[error("No previous reorganization found in {}", path.display())]
    NothingToUndo { path: PathBuf },
    /// Failed to write the history file.
    #[error("Failed to write history file: {source}")]
    WriteFailed { source: io::Error },
    /// Failed to read the history file.
    #[error("Failed to read history file: {source}")]
    ReadFailed { source: io::Error },
    /// The history file is not valid JSON of the expected shape.
    #[error("Invalid history file format: {source}")]
    InvalidFormat { source: serde_json::Error },
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// A move that was applied to the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMove {
    /// Where the entry was before the move.
    pub original_path: PathBuf,
    /// Where the entry was moved to.
    pub new_path: PathBuf,
}

/// All moves of one reorganization run, persisted for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of when the reorganization ran.
    pub timestamp: String,
    /// The directory that was reorganized.
    pub base_path: PathBuf,
    /// Applied moves, in execution order.
    pub moves: Vec<RecordedMove>,
}

impl OperationLog {
    /// Creates an empty log for a given base path.
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            base_path,
            moves: Vec::new(),
        }
    }

    /// Builds a log from the moves an execution actually applied.
    pub fn from_summary(base_path: PathBuf, summary: &AppliedSummary) -> Self {
        let mut log = Self::new(base_path);
        for (from, to) in summary.applied_moves() {
            log.record(from, to);
        }
        log
    }

    /// Adds a move to this log.
    pub fn record(&mut self, original_path: &Path, new_path: &Path) {
        self.moves.push(RecordedMove {
            original_path: original_path.to_path_buf(),
            new_path: new_path.to_path_buf(),
        });
    }

    /// Returns the path to the history file for this base path.
    pub fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE_NAME)
    }

    /// Saves this log to disk as pretty-printed JSON.
    pub fn save(&self, base_path: &Path) -> HistoryResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| HistoryError::WriteFailed {
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        fs::write(Self::history_file_path(base_path), json)
            .map_err(|source| HistoryError::WriteFailed { source })
    }

    /// Loads the most recent log from disk, if there is one.
    pub fn load(base_path: &Path) -> HistoryResult<Option<Self>> {
        let history_path = Self::history_file_path(base_path);

        let json = match fs::read_to_string(&history_path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(HistoryError::ReadFailed { source }),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| HistoryError::InvalidFormat { source })
    }

    /// Deletes the history file for a given base path.
    pub fn delete(base_path: &Path) -> HistoryResult<()> {
        match fs::remove_file(Self::history_file_path(base_path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HistoryError::WriteFailed { source }),
        }
    }
}

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of entries successfully restored.
    pub restored: usize,
    /// Entries that could not be restored, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Entries that were no longer where the history said they were.
    pub skipped: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of moves processed.
    pub fn total_processed(&self) -> usize {
        self.restored + self.failed.len() + self.skipped.len()
    }

    /// Returns true if the undo was completely successful.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Manages undo operations for reorganizations.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent reorganization of `base_path`.
    ///
    /// Moves are reversed last to first. An entry missing from its recorded
    /// location is skipped; an entry occupying the original location is backed
    /// up with a timestamp suffix first. The history file is deleted only when
    /// every move was reversed.
    ///
    /// Folders created by the reorganization are left in place.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyup::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/path/to/directory")) {
    ///     Ok(report) => println!("Restored {} entries", report.restored),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(base_path: &Path) -> HistoryResult<UndoReport> {
        if let Err(source) = fs::metadata(base_path) {
            return Err(HistoryError::InvalidBasePath {
                path: base_path.to_path_buf(),
                source,
            });
        }

        let log = OperationLog::load(base_path)?.ok_or_else(|| HistoryError::NothingToUndo {
            path: base_path.to_path_buf(),
        })?;

        let mut report = UndoReport::default();
        for recorded in log.moves.iter().rev() {
            match Self::restore(recorded) {
                Ok(()) => report.restored += 1,
                Err(ExecuteError::SourceMissing { path }) => {
                    report
                        .skipped
                        .push((path, "Entry not found at recorded location".to_string()));
                }
                Err(e) => report.failed.push((recorded.new_path.clone(), e.to_string())),
            }
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            warn!("Could not delete history file: {}", e);
        }

        Ok(report)
    }

    /// Moves one entry back, backing up whatever took its original place.
    fn restore(recorded: &RecordedMove) -> Result<(), ExecuteError> {
        if !recorded.new_path.exists() {
            return Err(ExecuteError::SourceMissing {
                path: recorded.new_path.clone(),
            });
        }

        if recorded.original_path.exists() {
            let backup_path = Self::generate_backup_path(&recorded.original_path);
            debug!(
                "Backing up {} to {}",
                recorded.original_path.display(),
                backup_path.display()
            );
            move_entry(&recorded.original_path, &backup_path)?;
        }

        if let Some(parent) = recorded.original_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ExecuteError::Io {
                action: "create",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        move_entry(&recorded.new_path, &recorded.original_path).map(|_| ())
    }

    /// Generates a backup path by appending a timestamp.
    ///
    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");

        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}
