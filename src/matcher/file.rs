//! File matching predicates.

use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Predicates for matching files in a workspace.
#[derive(Default, Clone)]
pub struct FileMatcher {
    file_names: Vec<String>,
    extensions: Vec<String>,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
}

impl FileMatcher {
    /// Creates a new file matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches files with exactly this file name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_names.push(name.into());
        self
    }

    /// Matches files with the given extension (without dot).
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into());
        self
    }

    /// Matches files with any of the given extensions.
    pub fn extensions(mut self, exts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions.extend(exts.into_iter().map(Into::into));
        self
    }

    /// Includes files matching the glob pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_globs.push(pattern.into());
        self
    }

    /// Excludes files and directories matching the glob pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_globs.push(pattern.into());
        self
    }

    /// Collects all matching files under `root`, in sorted path order.
    ///
    /// Excluded directories are pruned rather than walked and filtered.
    pub fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let include_set = build_glob_set(&self.include_globs)?;
        let exclude_set = build_glob_set(&self.exclude_globs)?;

        let mut matched = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let rel_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
                rel_path.as_os_str().is_empty() || !exclude_set.is_match(rel_path)
            });

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            if !self.file_names.is_empty() {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if !self.file_names.iter().any(|n| n == name) {
                    continue;
                }
            }

            if !self.extensions.is_empty() {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                    continue;
                }
            }

            let rel_path = path.strip_prefix(root).unwrap_or(path);
            if !self.include_globs.is_empty() && !include_set.is_match(rel_path) {
                continue;
            }

            matched.push(path.to_path_buf());
        }

        Ok(matched)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path) {
        for rel in [
            "apps/web/project.json",
            "apps/web/webpack.config.js",
            "libs/ui/project.json",
            "node_modules/pkg/project.json",
            "dist/apps/web/project.json",
            "README.md",
        ] {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "{}").unwrap();
        }
    }

    #[test]
    fn test_filter_by_file_name() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .file_name("project.json")
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_exclude_prunes_directories() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .file_name("project.json")
            .exclude("node_modules")
            .exclude("dist")
            .collect(dir.path())
            .unwrap();

        let rel: Vec<PathBuf> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("apps/web/project.json"),
                PathBuf::from("libs/ui/project.json")
            ]
        );
    }

    #[test]
    fn test_filter_by_extension() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new().extension("js").collect(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("webpack.config.js"));
    }

    #[test]
    fn test_include_glob() {
        let dir = TempDir::new().unwrap();
        create_test_files(dir.path());

        let files = FileMatcher::new()
            .include("libs/**")
            .collect(dir.path())
            .unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("libs/ui/project.json"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(FileMatcher::new().collect(dir.path()).unwrap().is_empty());
    }
}
