/// Execution of a [`MovePlan`] against the real filesystem.
///
/// Operations run strictly in plan order and stop at the first failure.
/// Nothing is rolled back: the returned [`AppliedSummary`] says exactly which
/// steps completed, so the caller can re-serialize, re-plan and retry.
use crate::planner::{MovePlan, Operation};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while applying a single operation.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// A filesystem call failed.
    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    /// The entry to move is gone; the plan is stale.
    #[error("Source {} no longer exists", path.display())]
    SourceMissing { path: PathBuf },
    /// Something else already sits at the move destination.
    #[error("Destination {} already exists", path.display())]
    DestinationExists { path: PathBuf },
    /// A folder queued for removal still has contents.
    #[error("Folder {} is not empty", path.display())]
    FolderNotEmpty { path: PathBuf },
}

/// How a completed step affected the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The operation changed the filesystem.
    Applied,
    /// The filesystem already matched; nothing was done.
    AlreadySatisfied,
}

/// A step that completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStep {
    /// Position of the operation in the plan.
    pub index: usize,
    pub operation: Operation,
    pub outcome: StepOutcome,
}

/// The step that stopped execution.
#[derive(Debug)]
pub struct FailedStep {
    pub index: usize,
    pub operation: Operation,
    pub error: ExecuteError,
}

/// Result of applying a plan.
#[derive(Debug, Default)]
pub struct AppliedSummary {
    /// Completed steps in execution order.
    pub completed: Vec<AppliedStep>,
    /// The failing step, if execution stopped early.
    pub failure: Option<FailedStep>,
    /// Steps after the failure that were never attempted.
    pub not_attempted: usize,
}

impl AppliedSummary {
    /// Returns true if every operation of the plan completed.
    pub fn is_complete_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Moves that actually changed the filesystem, in execution order.
    pub fn applied_moves(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.completed.iter().filter_map(|step| match &step.operation {
            Operation::MoveFile { from, to } if step.outcome == StepOutcome::Applied => {
                Some((from.as_path(), to.as_path()))
            }
            _ => None,
        })
    }

    /// Number of completed steps that changed the filesystem.
    pub fn applied_count(&self) -> usize {
        self.completed
            .iter()
            .filter(|step| step.outcome == StepOutcome::Applied)
            .count()
    }
}

/// Applies `plan` in order, stopping at the first failure.
///
/// # Examples
///
/// ```no_run
/// use tidyup::executor::apply;
/// use tidyup::planner::{MovePlan, Operation};
///
/// let plan = MovePlan::from(vec![
///     Operation::CreateFolder { path: "/data/docs".into() },
///     Operation::MoveFile { from: "/data/a.txt".into(), to: "/data/docs/a.txt".into() },
/// ]);
/// let summary = apply(plan);
/// if let Some(failed) = &summary.failure {
///     eprintln!("step {} failed: {}", failed.index + 1, failed.error);
/// }
/// ```
pub fn apply(plan: MovePlan) -> AppliedSummary {
    apply_with(plan, |_| {})
}

/// Applies `plan` like [`apply`], calling `on_step` after every completed step.
pub fn apply_with<F>(plan: MovePlan, mut on_step: F) -> AppliedSummary
where
    F: FnMut(&AppliedStep),
{
    let total = plan.len();
    let mut summary = AppliedSummary::default();

    for (index, operation) in plan.into_iter().enumerate() {
        match run_operation(&operation) {
            Ok(outcome) => {
                debug!("Step {}/{}: {} ({:?})", index + 1, total, operation, outcome);
                let step = AppliedStep {
                    index,
                    operation,
                    outcome,
                };
                on_step(&step);
                summary.completed.push(step);
            }
            Err(error) => {
                warn!("Step {}/{} failed: {}: {}", index + 1, total, operation, error);
                summary.not_attempted = total - index - 1;
                summary.failure = Some(FailedStep {
                    index,
                    operation,
                    error,
                });
                break;
            }
        }
    }

    info!(
        "Applied {} of {} operations",
        summary.completed.len(),
        total
    );
    summary
}

fn run_operation(operation: &Operation) -> Result<StepOutcome, ExecuteError> {
    match operation {
        Operation::CreateFolder { path } => create_folder(path),
        Operation::MoveFile { from, to } => move_entry(from, to),
        Operation::RemoveEmptyFolder { path } => remove_empty_folder(path),
    }
}

fn create_folder(path: &Path) -> Result<StepOutcome, ExecuteError> {
    if path.is_dir() {
        return Ok(StepOutcome::AlreadySatisfied);
    }

    fs::create_dir_all(path).map_err(|source| ExecuteError::Io {
        action: "create",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(StepOutcome::Applied)
}

/// Moves a file or folder without overwriting anything.
///
/// Uses a rename when possible and falls back to copy-then-delete when the
/// destination is on another device.
pub(crate) fn move_entry(from: &Path, to: &Path) -> Result<StepOutcome, ExecuteError> {
    let metadata = match fs::symlink_metadata(from) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ExecuteError::SourceMissing {
                path: from.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ExecuteError::Io {
                action: "inspect",
                path: from.to_path_buf(),
                source,
            });
        }
    };

    if from == to {
        return Ok(StepOutcome::AlreadySatisfied);
    }

    match fs::symlink_metadata(to) {
        Ok(_) if !is_same_file(from, to) => {
            return Err(ExecuteError::DestinationExists {
                path: to.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ExecuteError::Io {
                action: "inspect",
                path: to.to_path_buf(),
                source,
            });
        }
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(StepOutcome::Applied),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "{} and {} are on different devices, copying instead",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to, metadata.is_dir())?;
            Ok(StepOutcome::Applied)
        }
        Err(source) => Err(ExecuteError::Io {
            action: "move",
            path: from.to_path_buf(),
            source,
        }),
    }
}

/// Two paths name the same file when they resolve to the same location, as
/// on case-insensitive filesystems where only the case of a name changes.
fn is_same_file(a: &Path, b: &Path) -> bool {
    matches!(
        (fs::canonicalize(a), fs::canonicalize(b)),
        (Ok(a), Ok(b)) if a == b
    )
}

/// Copies `from` to `to` and only then deletes `from`. A failed copy leaves
/// the source untouched and removes whatever part of the copy was written.
fn copy_then_remove(from: &Path, to: &Path, is_dir: bool) -> Result<(), ExecuteError> {
    let copied = if is_dir {
        copy_dir(from, to)
    } else {
        fs::copy(from, to).map(|_| ())
    };

    if let Err(source) = copied {
        let cleanup = if is_dir {
            fs::remove_dir_all(to)
        } else {
            fs::remove_file(to)
        };
        if let Err(e) = cleanup
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Could not clean up partial copy {}: {}", to.display(), e);
        }
        return Err(ExecuteError::Io {
            action: "copy",
            path: from.to_path_buf(),
            source,
        });
    }

    let removed = if is_dir {
        fs::remove_dir_all(from)
    } else {
        fs::remove_file(from)
    };
    removed.map_err(|source| ExecuteError::Io {
        action: "remove",
        path: from.to_path_buf(),
        source,
    })
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    let mut stack = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((source_dir, dest_dir)) = stack.pop() {
        fs::create_dir(&dest_dir)?;
        for entry in fs::read_dir(&source_dir)? {
            let entry = entry?;
            let dest = dest_dir.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                stack.push((entry.path(), dest));
            } else {
                fs::copy(entry.path(), dest)?;
            }
        }
    }

    Ok(())
}

fn remove_empty_folder(path: &Path) -> Result<StepOutcome, ExecuteError> {
    let mut contents = match fs::read_dir(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(StepOutcome::AlreadySatisfied);
        }
        Err(source) => {
            return Err(ExecuteError::Io {
                action: "read",
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if contents.next().is_some() {
        return Err(ExecuteError::FolderNotEmpty {
            path: path.to_path_buf(),
        });
    }

    fs::remove_dir(path).map_err(|source| ExecuteError::Io {
        action: "remove",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(StepOutcome::Applied)
}
