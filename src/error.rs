//! Error types for the migration engine.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("Tree-sitter query error: {0}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Parse error in {path}:{line}:{column}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("'{callee}' is called {count} times in {path}; expected exactly one call")]
    AmbiguousMatch {
        path: PathBuf,
        callee: String,
        count: usize,
    },

    #[error("Cannot archive to {0}: file already exists")]
    ArchiveExists(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Invalid migration profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid project configuration in {path}: {message}")]
    InvalidProject { path: PathBuf, message: String },

    #[error("Process '{command}' failed: {message}")]
    Process { command: String, message: String },

    #[error("Could not find any projects to migrate")]
    NothingMigrated,
}

impl MigrateError {
    /// Builds a parse error for a source file.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        MigrateError::Parse {
            path: path.into(),
            line: 0,
            column: 0,
            message: message.into(),
        }
    }

    /// Returns a copy of this error bound to the given source path.
    ///
    /// Parsing happens on in-memory text, so errors start out with a
    /// placeholder path and are re-homed once the caller knows the file.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            MigrateError::Parse {
                line,
                column,
                message,
                ..
            } => MigrateError::Parse {
                path: path.into(),
                line,
                column,
                message,
            },
            MigrateError::AmbiguousMatch { callee, count, .. } => MigrateError::AmbiguousMatch {
                path: path.into(),
                callee,
                count,
            },
            other => other,
        }
    }
}

/// A specialized Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
