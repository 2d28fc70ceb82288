//! Core data model for a differential run.
//!
//! - `BinaryMetadata`: load-command summary derived from one file.
//! - `Operation` / `OperationKind`: the mutation applied through both tools.
//! - `Outcome`, `TestCase`, `FileReport`, `Tally`: results (see `report`).

mod report;

pub use report::{FileReport, Outcome, Tally, TestCase};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot of the dyld-relevant load commands of one file.
///
/// Produced fresh per inspection and never mutated afterwards. An empty value
/// (`Default`) is what a failed or unavailable inspection yields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMetadata {
    /// Install name recorded in `LC_ID_DYLIB`, if any.
    pub identity_path: Option<String>,
    /// `LC_RPATH` entries in load-command order.
    pub search_paths: Vec<String>,
    /// Dependencies from `LC_LOAD_DYLIB` and its weak/lazy/re-export variants.
    pub referenced_libraries: Vec<String>,
    /// True when the file is a fat container with more than one slice.
    pub is_universal: bool,
}

impl BinaryMetadata {
    pub fn is_empty(&self) -> bool {
        self.identity_path.is_none()
            && self.search_paths.is_empty()
            && self.referenced_libraries.is_empty()
    }
}

/// Mutation to apply to a copy of the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    ChangeIdentity { new_path: String },
    AddSearchPath { path: String },
    DeleteSearchPath { path: String },
    RenameSearchPath { old_path: String, new_path: String },
    ChangeDependency { old_path: String, new_path: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::ChangeIdentity { .. } => OperationKind::ChangeIdentity,
            Operation::AddSearchPath { .. } => OperationKind::AddSearchPath,
            Operation::DeleteSearchPath { .. } => OperationKind::DeleteSearchPath,
            Operation::RenameSearchPath { .. } => OperationKind::RenameSearchPath,
            Operation::ChangeDependency { .. } => OperationKind::ChangeDependency,
        }
    }

    /// Command-line form understood by `install_name_tool` and its clones,
    /// without the trailing target path.
    pub fn tool_args(&self) -> Vec<String> {
        match self {
            Operation::ChangeIdentity { new_path } => vec!["-id".into(), new_path.clone()],
            Operation::AddSearchPath { path } => vec!["-add_rpath".into(), path.clone()],
            Operation::DeleteSearchPath { path } => vec!["-delete_rpath".into(), path.clone()],
            Operation::RenameSearchPath { old_path, new_path } => {
                vec!["-rpath".into(), old_path.clone(), new_path.clone()]
            }
            Operation::ChangeDependency { old_path, new_path } => {
                vec!["-change".into(), old_path.clone(), new_path.clone()]
            }
        }
    }
}

/// Operation selector used in allow-lists and test-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "change_id")]
    ChangeIdentity,
    #[serde(rename = "add_rpath")]
    AddSearchPath,
    #[serde(rename = "delete_rpath")]
    DeleteSearchPath,
    #[serde(rename = "change_rpath")]
    RenameSearchPath,
    #[serde(rename = "change_dylib")]
    ChangeDependency,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::ChangeIdentity,
        OperationKind::AddSearchPath,
        OperationKind::DeleteSearchPath,
        OperationKind::RenameSearchPath,
        OperationKind::ChangeDependency,
    ];

    /// Selection used when no allow-list is given.
    pub const DEFAULT: [OperationKind; 4] = [
        OperationKind::ChangeIdentity,
        OperationKind::AddSearchPath,
        OperationKind::DeleteSearchPath,
        OperationKind::RenameSearchPath,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::ChangeIdentity => "change_id",
            OperationKind::AddSearchPath => "add_rpath",
            OperationKind::DeleteSearchPath => "delete_rpath",
            OperationKind::RenameSearchPath => "change_rpath",
            OperationKind::ChangeDependency => "change_dylib",
        }
    }

    /// Parse a comma-separated allow-list such as `change_id,add_rpath`.
    ///
    /// Blank entries are ignored and duplicates collapse to the first
    /// occurrence, so the result preserves the order the user wrote.
    pub fn parse_list(list: &str) -> Result<Vec<OperationKind>, OperationParseError> {
        let mut kinds = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind: OperationKind = item.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "Invalid operation '{0}'. Allowed: change_id, add_rpath, delete_rpath, change_rpath, change_dylib"
)]
pub struct OperationParseError(pub String);

impl FromStr for OperationKind {
    type Err = OperationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| OperationParseError(s.to_string()))
    }
}
