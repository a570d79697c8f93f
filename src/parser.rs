//! Parser for indented text trees coming from an untrusted recommender.
//!
//! The grammar is the one the serializer produces, read leniently: folders
//! may or may not carry the trailing `/` marker, a tab counts as one indent
//! unit, and blank lines are ignored. Everything else that does not fit is
//! rejected with the offending line number and text.

use crate::tree::{DirectoryTree, TreeNode, UNKNOWN_MODIFIED};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors and diagnostics produced while parsing a text tree.
///
/// All variants except [`ParseError::InvalidTimestamp`] abort the parse.
/// An invalid timestamp is recovered from and reported through
/// [`ParsedTree::diagnostics`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no tree lines found")]
    EmptyTree,
    #[error("line {line}: expected \"- <name>\", found {text:?}")]
    MalformedLine { line: usize, text: String },
    #[error("line {line}: unexpected indentation depth {depth}: {text:?}")]
    InvalidIndentation {
        line: usize,
        depth: usize,
        text: String,
    },
    #[error("line {line}: {name:?} is not a valid entry name")]
    InvalidName { line: usize, name: String },
    #[error("line {line}: {name:?} appears twice in the same folder")]
    DuplicateEntry { line: usize, name: String },
    #[error("line {line}: could not read modification time {value:?} of {name:?}")]
    InvalidTimestamp {
        line: usize,
        name: String,
        value: String,
    },
}

/// A successfully parsed tree plus the problems that were recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTree {
    pub tree: DirectoryTree,
    pub diagnostics: Vec<ParseError>,
}

/// What a line declares once the indentation and bullet are stripped.
#[derive(Debug, PartialEq, Eq)]
enum LineContent<'a> {
    Folder { name: &'a str, marked: bool },
    File { name: &'a str, timestamp: &'a str },
}

/// A folder whose child lines are still being read.
struct OpenFolder {
    depth: usize,
    name: String,
    marked: bool,
    children: Vec<TreeNode>,
    names: HashSet<String>,
}

impl OpenFolder {
    fn new(depth: usize, name: &str, marked: bool) -> Self {
        Self {
            depth,
            name: name.to_string(),
            marked,
            children: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// A folder written with the `/` marker and no children stays unexpanded.
    fn into_node(self) -> TreeNode {
        if self.marked && self.children.is_empty() {
            TreeNode::unexpanded_folder(self.name)
        } else {
            TreeNode::folder(self.name, self.children)
        }
    }
}

/// Parses a text tree into a [`DirectoryTree`] without a base path.
///
/// The first line must be at depth zero and names the root. Each following
/// line may go at most one level deeper than the line that opened its parent
/// folder, and may come back up any number of levels.
///
/// # Errors
///
/// Returns the first structural problem found. No partial tree is returned.
///
/// # Examples
///
/// ```
/// use tidyup::parser::parse;
///
/// let parsed = parse("- root\n  - docs\n    - a.txt (Modified: 2024-01-01T00:00:00.000Z)\n").unwrap();
/// let docs = parsed.tree.root().child("docs").unwrap();
/// assert!(docs.child("a.txt").unwrap().is_file());
/// ```
pub fn parse(text: &str) -> Result<ParsedTree, ParseError> {
    let mut root: Option<OpenFolder> = None;
    let mut open: Vec<OpenFolder> = Vec::new();
    let mut diagnostics = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let (depth, rest) = split_indent(raw);
        let content = classify(rest).ok_or_else(|| ParseError::MalformedLine {
            line,
            text: raw.to_string(),
        })?;

        let Some(root_folder) = root.as_mut() else {
            if depth != 0 {
                return Err(ParseError::InvalidIndentation {
                    line,
                    depth,
                    text: raw.to_string(),
                });
            }
            let LineContent::Folder { name, marked } = content else {
                return Err(ParseError::MalformedLine {
                    line,
                    text: raw.to_string(),
                });
            };
            validate_name(line, name)?;
            root = Some(OpenFolder::new(0, name, marked));
            continue;
        };

        if depth == 0 {
            return Err(ParseError::InvalidIndentation {
                line,
                depth,
                text: raw.to_string(),
            });
        }

        while open.last().is_some_and(|folder| folder.depth >= depth) {
            close_innermost(root_folder, &mut open);
        }

        let parent = match open.last_mut() {
            Some(folder) => folder,
            None => root_folder,
        };
        if depth > parent.depth + 1 {
            return Err(ParseError::InvalidIndentation {
                line,
                depth,
                text: raw.to_string(),
            });
        }

        let name = match content {
            LineContent::Folder { name, .. } | LineContent::File { name, .. } => name,
        };
        validate_name(line, name)?;
        if !parent.names.insert(name.to_string()) {
            return Err(ParseError::DuplicateEntry {
                line,
                name: name.to_string(),
            });
        }

        match content {
            LineContent::File { name, timestamp } => {
                let modified_at = match parse_timestamp(timestamp) {
                    Some(modified_at) => modified_at,
                    None => {
                        warn!(
                            "Line {}: unreadable modification time {:?} for {:?}",
                            line, timestamp, name
                        );
                        diagnostics.push(ParseError::InvalidTimestamp {
                            line,
                            name: name.to_string(),
                            value: timestamp.to_string(),
                        });
                        UNKNOWN_MODIFIED
                    }
                };
                parent.children.push(TreeNode::file(name, modified_at));
            }
            LineContent::Folder { name, marked } => {
                open.push(OpenFolder::new(depth, name, marked));
            }
        }
    }

    let Some(mut root_folder) = root else {
        return Err(ParseError::EmptyTree);
    };
    while !open.is_empty() {
        close_innermost(&mut root_folder, &mut open);
    }

    let tree = DirectoryTree::new(
        TreeNode::folder(root_folder.name, root_folder.children),
        None,
    );
    debug!(
        "Parsed tree with {} entries and {} diagnostics",
        tree.entry_count(),
        diagnostics.len()
    );

    Ok(ParsedTree { tree, diagnostics })
}

/// Pops the innermost open folder and attaches it to its parent.
fn close_innermost(root: &mut OpenFolder, open: &mut Vec<OpenFolder>) {
    if let Some(folder) = open.pop() {
        let parent = match open.last_mut() {
            Some(parent) => parent,
            None => root,
        };
        parent.children.push(folder.into_node());
    }
}

/// Splits leading whitespace off a line and returns the depth it encodes.
///
/// Two spaces make one level and a tab counts as a full level.
fn split_indent(line: &str) -> (usize, &str) {
    let mut half_units = 0;
    let mut consumed = 0;

    for ch in line.chars() {
        match ch {
            ' ' => half_units += 1,
            '\t' => half_units += 2,
            _ => break,
        }
        consumed += ch.len_utf8();
    }

    (half_units / 2, &line[consumed..])
}

fn classify(rest: &str) -> Option<LineContent<'_>> {
    let content = rest.strip_prefix("- ")?.trim();
    if content.is_empty() {
        return None;
    }

    if let Some(name) = content.strip_suffix('/') {
        return Some(LineContent::Folder {
            name: name.trim_end(),
            marked: true,
        });
    }

    if let Some(inner) = content.strip_suffix(')')
        && let Some((name, timestamp)) = inner.rsplit_once(" (Modified:")
    {
        return Some(LineContent::File {
            name: name.trim_end(),
            timestamp: timestamp.trim(),
        });
    }

    Some(LineContent::Folder {
        name: content,
        marked: false,
    })
}

fn validate_name(line: usize, name: &str) -> Result<(), ParseError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        Err(ParseError::InvalidName {
            line,
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
