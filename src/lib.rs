//! tidyup - reorganize a directory to match a recommended layout
//!
//! A directory is snapshotted as indented tree text, a revised tree is parsed
//! back from a recommendation, and the difference is planned and applied as
//! folder creations and moves. Applied moves are recorded so they can be
//! undone, and TOML configuration controls filtering and matching.

pub mod cli;
pub mod config;
pub mod executor;
pub mod output;
pub mod parser;
pub mod planner;
pub mod recommendation;
pub mod serializer;
pub mod tree;
pub mod undo;

pub use config::{CompiledFilters, ConfigError, TidyConfig};
pub use executor::{AppliedSummary, ExecuteError, apply};
pub use parser::{ParseError, ParsedTree, parse};
pub use planner::{MatchStrategy, MovePlan, Operation, PlanError, PlanOptions, plan};
pub use recommendation::Recommendation;
pub use serializer::{SerializeError, serialize};
pub use tree::{DirectoryTree, TreeNode};
pub use undo::{OperationLog, UndoManager, UndoReport};

pub use cli::{TidyCommand, run_cli};
