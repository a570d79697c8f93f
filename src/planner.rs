//! Reconciliation planning between the current tree and a revised tree.
//!
//! The planner pairs every movable entry of the current tree (files and
//! unexpanded folders) with an entry of the revised tree, then emits the
//! folder creations and moves that turn one layout into the other. It never
//! touches the filesystem; the resulting [`MovePlan`] is handed to the
//! executor.

use crate::tree::{DirectoryTree, Entry, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Suffix given to the temporary name used to break move cycles.
pub const STAGING_SUFFIX: &str = ".tidyup-swap";

/// A single filesystem step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a directory and any missing ancestors.
    CreateFolder { path: PathBuf },
    /// Move a file, or an unexpanded folder as a whole.
    MoveFile { from: PathBuf, to: PathBuf },
    /// Remove a folder that the revised tree no longer contains.
    RemoveEmptyFolder { path: PathBuf },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFolder { path } => write!(f, "create {}", path.display()),
            Self::MoveFile { from, to } => {
                write!(f, "move {} -> {}", from.display(), to.display())
            }
            Self::RemoveEmptyFolder { path } => write!(f, "remove {}", path.display()),
        }
    }
}

/// Ordered list of operations produced by [`plan`].
///
/// Folder creations come first, parents before children, then moves, then
/// optional folder removals, deepest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovePlan {
    operations: Vec<Operation>,
}

impl MovePlan {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of `MoveFile` operations in the plan.
    pub fn move_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::MoveFile { .. }))
            .count()
    }
}

impl From<Vec<Operation>> for MovePlan {
    fn from(operations: Vec<Operation>) -> Self {
        Self { operations }
    }
}

impl IntoIterator for MovePlan {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

/// How entries of the current tree are paired with entries of the revised tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum MatchStrategy {
    /// Pair entries with the same name and kind, wherever they sit.
    #[default]
    #[serde(rename = "name")]
    #[value(name = "name")]
    ByName,
    /// Pair the i-th entry of one tree with the i-th entry of the other, in
    /// the order their lines appear.
    #[serde(rename = "position")]
    #[value(name = "position")]
    ByPosition,
}

/// Knobs for [`plan_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub strategy: MatchStrategy,
    /// Queue removal of current folders that the revised tree drops.
    pub remove_empty_folders: bool,
}

/// Errors that stop a plan from being produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The trees cannot be paired one to one.
    #[error(
        "structural mismatch ({old_entries} current entries, {new_entries} revised entries): {detail}"
    )]
    StructuralMismatch {
        old_entries: usize,
        new_entries: usize,
        detail: String,
    },
    /// The revised tree wants a folder where an entry currently sits, or
    /// moves an entry onto a folder that is being dissolved.
    #[error("{} is both an existing entry and a revised folder", path.display())]
    PathConflict { path: PathBuf },
}

/// Plans the reconciliation of `old_tree` into `new_tree` with default options.
///
/// Both root nodes stand for `base_path`; their names are not compared.
///
/// # Examples
///
/// ```
/// use tidyup::parser::parse;
/// use tidyup::planner::{plan, Operation};
/// use std::path::Path;
///
/// let old = parse("- root\n  - a.txt (Modified: 2024-01-01T00:00:00Z)\n").unwrap().tree;
/// let new = parse("- root\n  - docs\n    - a.txt (Modified: 2024-01-01T00:00:00Z)\n").unwrap().tree;
///
/// let plan = plan(Path::new("/base"), &old, &new).unwrap();
/// assert_eq!(plan.operations()[0], Operation::CreateFolder { path: "/base/docs".into() });
/// ```
pub fn plan(
    base_path: &Path,
    old_tree: &DirectoryTree,
    new_tree: &DirectoryTree,
) -> Result<MovePlan, PlanError> {
    plan_with(base_path, old_tree, new_tree, &PlanOptions::default())
}

/// Plans the reconciliation of `old_tree` into `new_tree`.
///
/// # Errors
///
/// [`PlanError::StructuralMismatch`] when the entries of the two trees cannot
/// be paired, [`PlanError::PathConflict`] when the revised layout would need a
/// path to be a folder and an entry at the same time.
pub fn plan_with(
    base_path: &Path,
    old_tree: &DirectoryTree,
    new_tree: &DirectoryTree,
    options: &PlanOptions,
) -> Result<MovePlan, PlanError> {
    let old_folders: HashSet<PathBuf> = old_tree.folders().into_iter().collect();
    let new_folders = new_tree.folders();
    let new_folder_set: HashSet<&PathBuf> = new_folders.iter().collect();

    // An unexpanded folder that the revised tree lists as a folder stays put
    // and only receives entries, so it takes no part in pairing.
    let (kept_folders, old_entries): (Vec<Entry<'_>>, Vec<Entry<'_>>) =
        old_tree.entries().into_iter().partition(|entry| {
            entry.node.is_unexpanded() && new_folder_set.contains(&entry.relative_path)
        });
    let new_entries = new_tree.entries();
    for kept in &kept_folders {
        debug!(
            "Keeping unexpanded folder {} in place",
            kept.relative_path.display()
        );
    }

    if old_entries.len() != new_entries.len() {
        return Err(PlanError::StructuralMismatch {
            old_entries: old_entries.len(),
            new_entries: new_entries.len(),
            detail: "entry counts differ".to_string(),
        });
    }

    let pairs = match options.strategy {
        MatchStrategy::ByName => pair_by_name(&old_entries, &new_entries)?,
        MatchStrategy::ByPosition => pair_by_position(&old_entries, &new_entries)?,
    };

    let old_entry_paths: HashSet<&Path> = old_entries
        .iter()
        .map(|entry| entry.relative_path.as_path())
        .collect();

    if let Some(conflict) = new_folders
        .iter()
        .find(|folder| old_entry_paths.contains(folder.as_path()))
    {
        return Err(PlanError::PathConflict {
            path: base_path.join(conflict),
        });
    }
    if let Some(conflict) = new_entries.iter().find(|entry| {
        old_folders.contains(&entry.relative_path) && !new_folder_set.contains(&entry.relative_path)
    }) {
        return Err(PlanError::PathConflict {
            path: base_path.join(&conflict.relative_path),
        });
    }

    let existing_folders: HashSet<&PathBuf> = old_folders
        .iter()
        .chain(kept_folders.iter().map(|kept| &kept.relative_path))
        .collect();
    let mut creates: Vec<&PathBuf> = new_folders
        .iter()
        .filter(|folder| !existing_folders.contains(folder))
        .collect();
    creates.sort_by(|a, b| {
        a.components()
            .count()
            .cmp(&b.components().count())
            .then_with(|| a.cmp(b))
    });

    let mut operations: Vec<Operation> = creates
        .into_iter()
        .map(|folder| Operation::CreateFolder {
            path: base_path.join(folder),
        })
        .collect();

    let occupied: HashSet<PathBuf> = old_tree
        .entries()
        .into_iter()
        .map(|entry| entry.relative_path)
        .chain(old_folders.iter().cloned())
        .chain(new_entries.iter().map(|entry| entry.relative_path.clone()))
        .chain(new_folders.iter().cloned())
        .map(|path| base_path.join(path))
        .collect();
    let moves: Vec<(PathBuf, PathBuf)> = pairs
        .into_iter()
        .filter(|(from, to)| from != to)
        .map(|(from, to)| (base_path.join(from), base_path.join(to)))
        .collect();
    operations.extend(order_moves(moves, &occupied));

    if options.remove_empty_folders {
        let mut removals: Vec<&PathBuf> = old_folders
            .iter()
            .filter(|folder| !new_folder_set.contains(folder))
            .collect();
        removals.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        operations.extend(removals.into_iter().map(|folder| Operation::RemoveEmptyFolder {
            path: base_path.join(folder),
        }));
    }

    debug!(
        "Planned {} operations for {} entries",
        operations.len(),
        old_entries.len()
    );
    Ok(MovePlan::from(operations))
}

/// Entries can only be paired with entries of the same kind and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntryKey<'a> {
    is_file: bool,
    name: &'a str,
}

impl<'a> EntryKey<'a> {
    fn of(node: &'a TreeNode) -> Self {
        Self {
            is_file: node.is_file(),
            name: &node.name,
        }
    }
}

/// Pairs entries by name. An entry that is already at its target path keeps
/// its place; other same-named entries are taken in traversal order.
fn pair_by_name(
    old: &[Entry<'_>],
    new: &[Entry<'_>],
) -> Result<Vec<(PathBuf, PathBuf)>, PlanError> {
    let mut candidates: HashMap<EntryKey<'_>, Vec<&Path>> = HashMap::new();
    for entry in old {
        candidates
            .entry(EntryKey::of(entry.node))
            .or_default()
            .push(&entry.relative_path);
    }

    let mut pairs: Vec<Option<(PathBuf, PathBuf)>> = vec![None; new.len()];

    for (slot, entry) in pairs.iter_mut().zip(new) {
        if let Some(group) = candidates.get_mut(&EntryKey::of(entry.node))
            && let Some(position) = group.iter().position(|path| *path == entry.relative_path)
        {
            group.remove(position);
            *slot = Some((entry.relative_path.clone(), entry.relative_path.clone()));
        }
    }

    for (slot, entry) in pairs.iter_mut().zip(new) {
        if slot.is_some() {
            continue;
        }
        let source = candidates
            .get_mut(&EntryKey::of(entry.node))
            .filter(|group| !group.is_empty())
            .map(|group| group.remove(0))
            .ok_or_else(|| PlanError::StructuralMismatch {
                old_entries: old.len(),
                new_entries: new.len(),
                detail: format!(
                    "{} {} is not in the current tree",
                    kind_label(entry.node),
                    entry.relative_path.display()
                ),
            })?;
        *slot = Some((source.to_path_buf(), entry.relative_path.clone()));
    }

    Ok(pairs.into_iter().flatten().collect())
}

/// Pairs entries by their position in pre-order.
fn pair_by_position(
    old: &[Entry<'_>],
    new: &[Entry<'_>],
) -> Result<Vec<(PathBuf, PathBuf)>, PlanError> {
    old.iter()
        .zip(new)
        .map(|(old_entry, new_entry)| {
            if old_entry.node.is_file() != new_entry.node.is_file() {
                return Err(PlanError::StructuralMismatch {
                    old_entries: old.len(),
                    new_entries: new.len(),
                    detail: format!(
                        "{} {} lines up with {} {}",
                        kind_label(old_entry.node),
                        old_entry.relative_path.display(),
                        kind_label(new_entry.node),
                        new_entry.relative_path.display()
                    ),
                });
            }
            Ok((
                old_entry.relative_path.clone(),
                new_entry.relative_path.clone(),
            ))
        })
        .collect()
}

fn kind_label(node: &TreeNode) -> &'static str {
    if node.is_file() { "file" } else { "folder" }
}

/// Orders moves so no move lands on a path another pending move still has to
/// vacate. Cycles are broken by parking one entry under a temporary name that
/// is neither a pending source nor any path in `occupied`.
fn order_moves(
    mut pending: Vec<(PathBuf, PathBuf)>,
    occupied: &HashSet<PathBuf>,
) -> Vec<Operation> {
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let sources: HashSet<PathBuf> = pending.iter().map(|(from, _)| from.clone()).collect();
        let (ready, mut blocked): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(_, to)| !sources.contains(to));

        if ready.is_empty() {
            let (from, to) = blocked.remove(0);
            let staging = staging_path(&from, &sources, occupied);
            debug!(
                "Breaking move cycle by staging {} at {}",
                from.display(),
                staging.display()
            );
            ordered.push(Operation::MoveFile {
                from,
                to: staging.clone(),
            });
            blocked.push((staging, to));
        } else {
            ordered.extend(
                ready
                    .into_iter()
                    .map(|(from, to)| Operation::MoveFile { from, to }),
            );
        }

        pending = blocked;
    }

    ordered
}

fn staging_path(
    from: &Path,
    pending: &HashSet<PathBuf>,
    occupied: &HashSet<PathBuf>,
) -> PathBuf {
    let name = from
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut candidate = from.with_file_name(format!("{name}{STAGING_SUFFIX}"));
    let mut attempt = 1;
    while pending.contains(&candidate) || occupied.contains(&candidate) {
        attempt += 1;
        candidate = from.with_file_name(format!("{name}{STAGING_SUFFIX}-{attempt}"));
    }
    candidate
}
