//! Staged file-system view of a workspace.
//!
//! All reads and writes during a migration go through a [`Tree`]. Writes
//! and renames are staged in an in-memory overlay and only reach disk on
//! [`Tree::flush`], which lets the driver discard one project's work after
//! a failure and lets dry runs preview every change as a diff.

use crate::diff::{DiffSummary, colorized_diff, unified_diff};
use crate::error::{MigrateError, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A staged operation.
#[derive(Debug, Clone)]
enum TreeOp {
    Write { path: PathBuf, contents: String },
    Rename { from: PathBuf, to: PathBuf, contents: String },
}

/// A position in the operation log, used to roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMark(usize);

/// A workspace file tree with staged modifications.
#[derive(Debug, Default)]
pub struct Tree {
    root: Option<PathBuf>,
    overlay: IndexMap<PathBuf, Option<String>>,
    originals: IndexMap<PathBuf, Option<String>>,
    ops: Vec<TreeOp>,
    flushed: usize,
}

impl Tree {
    /// Opens a tree backed by the workspace directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Default::default()
        }
    }

    /// Creates a tree with no backing directory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Returns the backing directory, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Returns true if a file exists at the workspace-relative path.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize_key(path.as_ref());
        match self.overlay.get(&path) {
            Some(state) => state.is_some(),
            None => self.disk_path(&path).is_some_and(|p| p.is_file()),
        }
    }

    /// Reads a file as UTF-8 text.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = normalize_key(path.as_ref());
        match self.overlay.get(&path) {
            Some(Some(contents)) => Ok(contents.clone()),
            Some(None) => Err(MigrateError::FileNotFound(path)),
            None => self.read_disk(&path)?.ok_or(MigrateError::FileNotFound(path)),
        }
    }

    /// Stages a write, creating or replacing the file.
    pub fn write(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Result<()> {
        let path = normalize_key(path.as_ref());
        let contents = contents.into();
        self.remember_original(&path)?;
        self.overlay.insert(path.clone(), Some(contents.clone()));
        self.ops.push(TreeOp::Write { path, contents });
        Ok(())
    }

    /// Stages a rename.
    ///
    /// Fails with `ArchiveExists` if `to` already exists, and with
    /// `FileNotFound` if `from` does not.
    pub fn rename(&mut self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let from = normalize_key(from.as_ref());
        let to = normalize_key(to.as_ref());

        if self.exists(&to) {
            return Err(MigrateError::ArchiveExists(to));
        }
        let contents = self.read(&from)?;

        self.remember_original(&from)?;
        self.remember_original(&to)?;
        self.overlay.insert(from.clone(), None);
        self.overlay.insert(to.clone(), Some(contents.clone()));
        self.ops.push(TreeOp::Rename { from, to, contents });
        Ok(())
    }

    /// Marks the current position in the operation log.
    pub fn mark(&self) -> TreeMark {
        TreeMark(self.ops.len())
    }

    /// Discards every operation staged after `mark`.
    ///
    /// Operations that were already flushed stay on disk.
    pub fn rollback(&mut self, mark: TreeMark) {
        let keep = mark.0.max(self.flushed);
        if keep >= self.ops.len() {
            return;
        }
        debug!(discarded = self.ops.len() - keep, "rolling back staged operations");
        self.ops.truncate(keep);

        self.overlay.clear();
        for op in &self.ops {
            match op {
                TreeOp::Write { path, contents } => {
                    self.overlay.insert(path.clone(), Some(contents.clone()));
                }
                TreeOp::Rename { from, to, contents } => {
                    self.overlay.insert(from.clone(), None);
                    self.overlay.insert(to.clone(), Some(contents.clone()));
                }
            }
        }
    }

    /// Returns true if operations are waiting to be flushed.
    pub fn has_pending(&self) -> bool {
        self.flushed < self.ops.len()
    }

    /// Writes all pending operations to disk, in order.
    ///
    /// Returns the paths whose contents were written. A tree without a
    /// backing directory just marks its operations as flushed.
    pub fn flush(&mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        while self.flushed < self.ops.len() {
            let op = self.ops[self.flushed].clone();
            if let Some(root) = &self.root {
                match &op {
                    TreeOp::Write { path, contents } => {
                        let target = root.join(path);
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(&target, contents)?;
                        debug!(path = %path.display(), "wrote file");
                        written.push(path.clone());
                    }
                    TreeOp::Rename { from, to, contents } => {
                        let source = root.join(from);
                        let target = root.join(to);
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        if source.is_file() {
                            fs::rename(&source, &target)?;
                        } else {
                            fs::write(&target, contents)?;
                        }
                        debug!(from = %from.display(), to = %to.display(), "renamed file");
                    }
                }
            } else if let TreeOp::Write { path, .. } = &op {
                written.push(path.clone());
            }
            self.flushed += 1;
        }

        Ok(written)
    }

    /// Returns every file whose staged contents differ from the original.
    pub fn changes(&self) -> Vec<FileChange> {
        self.overlay
            .iter()
            .filter_map(|(path, state)| {
                let original = self.originals.get(path).cloned().flatten();
                if original.as_ref() == state.as_ref() {
                    return None;
                }
                Some(FileChange {
                    path: path.clone(),
                    original,
                    transformed: state.clone(),
                })
            })
            .collect()
    }

    fn remember_original(&mut self, path: &Path) -> Result<()> {
        if self.originals.contains_key(path) {
            return Ok(());
        }
        let original = match self.overlay.get(path) {
            Some(state) => state.clone(),
            None => self.read_disk(path)?,
        };
        self.originals.insert(path.to_path_buf(), original);
        Ok(())
    }

    fn disk_path(&self, path: &Path) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(path))
    }

    fn read_disk(&self, path: &Path) -> Result<Option<String>> {
        match self.disk_path(path) {
            Some(full) if full.is_file() => Ok(Some(fs::read_to_string(full)?)),
            _ => Ok(None),
        }
    }
}

/// Strips `.` components so `./apps/web` and `apps/web` share a key.
pub fn normalize_key(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// A staged change to one file.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub original: Option<String>,
    pub transformed: Option<String>,
}

impl FileChange {
    /// Returns true if the file did not exist before.
    pub fn is_created(&self) -> bool {
        self.original.is_none()
    }

    /// Returns true if the file no longer exists.
    pub fn is_deleted(&self) -> bool {
        self.transformed.is_none()
    }

    /// Unified diff of this change.
    pub fn diff(&self) -> String {
        unified_diff(
            self.original.as_deref().unwrap_or(""),
            self.transformed.as_deref().unwrap_or(""),
            &self.path,
        )
    }

    /// Colorized diff of this change for terminal display.
    pub fn colorized_diff(&self) -> String {
        colorized_diff(
            self.original.as_deref().unwrap_or(""),
            self.transformed.as_deref().unwrap_or(""),
            &self.path,
        )
    }

    /// Line counts for this change.
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diff(
            self.original.as_deref().unwrap_or(""),
            self.transformed.as_deref().unwrap_or(""),
        )
    }
}
