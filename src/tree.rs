//! In-memory model of a directory tree.
//!
//! A [`DirectoryTree`] is an immutable snapshot: the serializer builds one from
//! the filesystem, the parser builds one from recommendation text, and the
//! planner compares two of them. Nothing mutates a tree after construction.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Timestamp used when a modification time is unknown or could not be parsed.
pub const UNKNOWN_MODIFIED: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// What kind of filesystem entry a [`TreeNode`] stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A regular file with its last modification time.
    File { modified_at: DateTime<Utc> },
    /// A folder. `expanded` is false when its contents were never listed,
    /// in which case `children` is always empty.
    Folder {
        children: Vec<TreeNode>,
        expanded: bool,
    },
}

/// One entry of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Base name of the entry, never containing a path separator.
    pub name: String,
    pub kind: NodeKind,
}

impl TreeNode {
    /// Creates a file node.
    pub fn file(name: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File { modified_at },
        }
    }

    /// Creates an expanded folder node holding `children`.
    pub fn folder(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder {
                children,
                expanded: true,
            },
        }
    }

    /// Creates a folder node whose contents were not listed.
    pub fn unexpanded_folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder {
                children: Vec::new(),
                expanded: false,
            },
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    /// Returns true for folders serialized without their contents.
    pub fn is_unexpanded(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { expanded: false, .. })
    }

    /// Returns true if the entry can be moved as a single unit during
    /// reconciliation: files, and folders whose contents are opaque.
    pub fn is_movable(&self) -> bool {
        self.is_file() || self.is_unexpanded()
    }

    /// Modification time of a file node, `None` for folders.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            NodeKind::File { modified_at } => Some(modified_at),
            NodeKind::Folder { .. } => None,
        }
    }

    /// Children of a folder node. Files have none.
    pub fn children(&self) -> &[TreeNode] {
        match &self.kind {
            NodeKind::Folder { children, .. } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Looks up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children().iter().find(|child| child.name == name)
    }
}

/// A movable entry together with its location relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub relative_path: PathBuf,
    pub node: &'a TreeNode,
}

/// A root folder node plus the absolute path it was read from, if any.
///
/// Trees parsed from recommendation text have no base path; the caller binds
/// them to a real directory when planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    root: TreeNode,
    base_path: Option<PathBuf>,
}

impl DirectoryTree {
    pub fn new(root: TreeNode, base_path: Option<PathBuf>) -> Self {
        Self { root, base_path }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Lists every movable entry in pre-order, which is the order their lines
    /// appear in the serialized text.
    pub fn entries(&self) -> Vec<Entry<'_>> {
        let mut entries = Vec::new();
        self.walk(|relative_path, node| {
            if node.is_movable() {
                entries.push(Entry {
                    relative_path,
                    node,
                });
            }
        });
        entries
    }

    /// Lists the relative paths of all expanded folders below the root, in
    /// pre-order.
    pub fn folders(&self) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        self.walk(|relative_path, node| {
            if node.is_folder() && !node.is_unexpanded() {
                folders.push(relative_path);
            }
        });
        folders
    }

    /// Number of movable entries in the tree.
    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    /// Visits every node below the root in pre-order with an explicit stack.
    fn walk<'a>(&'a self, mut visit: impl FnMut(PathBuf, &'a TreeNode)) {
        let mut stack: Vec<(PathBuf, &'a TreeNode)> = self
            .root
            .children()
            .iter()
            .rev()
            .map(|child| (PathBuf::from(&child.name), child))
            .collect();

        while let Some((relative_path, node)) = stack.pop() {
            for child in node.children().iter().rev() {
                stack.push((relative_path.join(&child.name), child));
            }
            visit(relative_path, node);
        }
    }
}
