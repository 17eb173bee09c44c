//! Git working-tree predicates.

use crate::error::Result;
use git2::{Repository, StatusOptions};
use std::path::{Path, PathBuf};

/// Reads the git state of a workspace.
///
/// A directory outside any repository has no git state to violate, so it
/// never reports changes.
#[derive(Debug, Default, Clone)]
pub struct GitMatcher;

impl GitMatcher {
    /// Creates a new git matcher.
    pub fn new() -> Self {
        Self
    }

    /// Lists uncommitted paths in the repository containing `workspace`.
    pub fn uncommitted(&self, workspace: &Path) -> Result<Vec<PathBuf>> {
        match Repository::discover(workspace) {
            Ok(repo) => dirty_paths(&repo),
            Err(_) => Ok(Vec::new()),
        }
    }
}

fn dirty_paths(repo: &Repository) -> Result<Vec<PathBuf>> {
    let mut options = StatusOptions::new();
    options.include_untracked(true).include_ignored(false);

    let statuses = repo.statuses(Some(&mut options))?;
    Ok(statuses
        .iter()
        .filter_map(|entry| entry.path().map(PathBuf::from))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_outside_repository_is_clean() {
        let dir = TempDir::new().unwrap();
        assert!(GitMatcher::new().uncommitted(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_untracked_file_makes_repo_dirty() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        assert!(GitMatcher::new().uncommitted(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join("project.json"), "{}").unwrap();

        assert_eq!(
            GitMatcher::new().uncommitted(dir.path()).unwrap(),
            vec![PathBuf::from("project.json")]
        );
    }
}
