//! Serialization of a directory into the indented text tree.
//!
//! Every entry is one line: `"<indent>- <name>"` for folders,
//! `"<indent>- <name>/"` for folders whose contents were not listed, and
//! `"<indent>- <name> (Modified: <timestamp>)"` for files. The indent is two
//! spaces per depth level, with the root at depth zero.

use crate::tree::{DirectoryTree, NodeKind, TreeNode, UNKNOWN_MODIFIED};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while reading a directory for serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The root path does not exist.
    #[error("Folder {} does not exist", path.display())]
    NotFound { path: PathBuf },
    /// The root path exists but is not a directory.
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    /// The root path could not be inspected or listed.
    #[error("Failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Decides which directory entries make it into the serialized tree.
pub trait EntryFilter {
    /// `relative_path` is relative to the serialized root.
    fn include(&self, relative_path: &Path, is_dir: bool) -> bool;
}

/// Filter that keeps every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

impl EntryFilter for IncludeAll {
    fn include(&self, _relative_path: &Path, _is_dir: bool) -> bool {
        true
    }
}

/// How a line is annotated after the entry name.
enum LineMarker {
    Folder,
    Unexpanded,
    Modified(DateTime<Utc>),
}

/// One directory entry as read from the filesystem, before it becomes a node.
struct Listing {
    name: String,
    path: PathBuf,
    kind: ListingKind,
}

enum ListingKind {
    File(DateTime<Utc>),
    Dir { descend: bool },
}

/// A folder whose listing is still being emitted.
struct Frame {
    name: String,
    relative: PathBuf,
    depth: usize,
    children: Vec<TreeNode>,
    pending: std::vec::IntoIter<Listing>,
}

/// Formats a timestamp the way file lines carry it: RFC 3339, UTC,
/// millisecond precision, `Z` suffix.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializes the directory at `root_path`.
///
/// Returns the text tree together with the structured tree it was produced
/// from. Both describe the same snapshot: the directory is read exactly once.
///
/// # Errors
///
/// Returns [`SerializeError::NotFound`] or [`SerializeError::NotADirectory`]
/// for an invalid root, and [`SerializeError::Io`] if the root cannot be
/// listed. Subfolders that cannot be listed are kept as unexpanded folders.
///
/// # Examples
///
/// ```no_run
/// use tidyup::serializer::serialize;
/// use std::path::Path;
///
/// let (text, tree) = serialize(Path::new("/home/user/Downloads"), false)?;
/// println!("{text}");
/// println!("{} entries", tree.entry_count());
/// # Ok::<(), tidyup::serializer::SerializeError>(())
/// ```
pub fn serialize(
    root_path: &Path,
    recurse_into_subfolders: bool,
) -> Result<(String, DirectoryTree), SerializeError> {
    serialize_with(root_path, recurse_into_subfolders, &IncludeAll)
}

/// Serializes the directory at `root_path`, leaving out entries rejected by
/// `filter`. Excluded folders are not descended into.
pub fn serialize_with<F: EntryFilter + ?Sized>(
    root_path: &Path,
    recurse_into_subfolders: bool,
    filter: &F,
) -> Result<(String, DirectoryTree), SerializeError> {
    let metadata = fs::metadata(root_path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SerializeError::NotFound {
                path: root_path.to_path_buf(),
            }
        } else {
            SerializeError::Io {
                path: root_path.to_path_buf(),
                source,
            }
        }
    })?;
    if !metadata.is_dir() {
        return Err(SerializeError::NotADirectory {
            path: root_path.to_path_buf(),
        });
    }

    let base_path = fs::canonicalize(root_path).map_err(|source| SerializeError::Io {
        path: root_path.to_path_buf(),
        source,
    })?;
    let root_name = base_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| base_path.display().to_string());

    debug!(
        "Serializing {} (recursive: {})",
        base_path.display(),
        recurse_into_subfolders
    );

    let root_listing = read_listing(&base_path, Path::new(""), recurse_into_subfolders, filter)
        .map_err(|source| SerializeError::Io {
            path: base_path.clone(),
            source,
        })?;

    let mut text = String::new();
    write_line(&mut text, 0, &root_name, &LineMarker::Folder);

    let mut stack = vec![Frame {
        name: root_name.clone(),
        relative: PathBuf::new(),
        depth: 0,
        children: Vec::new(),
        pending: root_listing.into_iter(),
    }];
    let mut root = None;

    while let Some(frame) = stack.last_mut() {
        let Some(listing) = frame.pending.next() else {
            if let Some(done) = stack.pop() {
                let node = TreeNode::folder(done.name, done.children);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            continue;
        };

        let depth = frame.depth + 1;
        match listing.kind {
            ListingKind::File(modified_at) => {
                write_line(
                    &mut text,
                    depth,
                    &listing.name,
                    &LineMarker::Modified(modified_at),
                );
                frame
                    .children
                    .push(TreeNode::file(listing.name, modified_at));
            }
            ListingKind::Dir { descend: true } => {
                let relative = frame.relative.join(&listing.name);
                match read_listing(&listing.path, &relative, true, filter) {
                    Ok(pending) => {
                        write_line(&mut text, depth, &listing.name, &LineMarker::Folder);
                        stack.push(Frame {
                            name: listing.name,
                            relative,
                            depth,
                            children: Vec::new(),
                            pending: pending.into_iter(),
                        });
                    }
                    Err(e) => {
                        warn!(
                            "Could not list {}, keeping it as an unexpanded folder: {}",
                            listing.path.display(),
                            e
                        );
                        write_line(&mut text, depth, &listing.name, &LineMarker::Unexpanded);
                        frame
                            .children
                            .push(TreeNode::unexpanded_folder(listing.name));
                    }
                }
            }
            ListingKind::Dir { descend: false } => {
                write_line(&mut text, depth, &listing.name, &LineMarker::Unexpanded);
                frame
                    .children
                    .push(TreeNode::unexpanded_folder(listing.name));
            }
        }
    }

    let root = root.unwrap_or_else(|| TreeNode::folder(root_name, Vec::new()));
    Ok((text, DirectoryTree::new(root, Some(base_path))))
}

/// Renders a structured tree back into the text grammar.
///
/// Used for trees that did not come from [`serialize`], such as a parsed
/// recommendation, so they can be shown in the same form.
pub fn render(tree: &DirectoryTree) -> String {
    let mut text = String::new();
    let mut stack = vec![(0usize, tree.root())];

    while let Some((depth, node)) = stack.pop() {
        let marker = match &node.kind {
            NodeKind::File { modified_at } => LineMarker::Modified(*modified_at),
            NodeKind::Folder { expanded: false, .. } => LineMarker::Unexpanded,
            NodeKind::Folder { .. } => LineMarker::Folder,
        };
        write_line(&mut text, depth, &node.name, &marker);
        for child in node.children().iter().rev() {
            stack.push((depth + 1, child));
        }
    }

    text
}

fn write_line(text: &mut String, depth: usize, name: &str, marker: &LineMarker) {
    text.push_str(&"  ".repeat(depth));
    text.push_str("- ");
    text.push_str(name);
    match marker {
        LineMarker::Folder => {}
        LineMarker::Unexpanded => text.push('/'),
        LineMarker::Modified(timestamp) => {
            text.push_str(" (Modified: ");
            text.push_str(&format_timestamp(timestamp));
            text.push(')');
        }
    }
    text.push('\n');
}

/// Reads one directory, sorted by name.
///
/// Entries that cannot be represented in the text grammar or whose metadata
/// cannot be read are skipped with a warning.
fn read_listing<F: EntryFilter + ?Sized>(
    dir: &Path,
    relative: &Path,
    recurse: bool,
    filter: &F,
) -> io::Result<Vec<Listing>> {
    let mut listings = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(
                "Skipping {}: name is not valid UTF-8",
                entry.path().display()
            );
            continue;
        };
        if name.contains(['\n', '\r']) {
            warn!("Skipping {:?}: name contains a line break", name);
            continue;
        }

        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if !filter.include(&relative.join(&name), metadata.is_dir()) {
            debug!("Filtered out {}", path.display());
            continue;
        }

        let kind = if metadata.is_dir() {
            let is_link = entry
                .file_type()
                .map(|file_type| file_type.is_symlink())
                .unwrap_or(false);
            ListingKind::Dir {
                descend: recurse && !is_link,
            }
        } else if metadata.is_file() {
            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or(UNKNOWN_MODIFIED);
            ListingKind::File(modified_at)
        } else {
            debug!("Skipping special file {}", path.display());
            continue;
        };

        listings.push(Listing { name, path, kind });
    }

    listings.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listings)
}
