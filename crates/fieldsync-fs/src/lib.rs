//! Filesystem backend for fieldsync.
//!
//! A workspace is a `.fieldsync/` directory with:
//! - `config.yml`: Field resolution and server settings
//! - `catalog.json`: Custom field definitions and issue types
//! - `issues/<KEY>.json`: One issue document per issue

pub mod catalog;
pub mod config;
pub mod error;
pub mod workspace;

pub use catalog::FileCatalog;
pub use config::WorkspaceConfig;
pub use error::{FsError, Result};
pub use workspace::{IssueDocument, Workspace};
