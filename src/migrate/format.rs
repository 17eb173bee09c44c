//! Post-migration formatting of written files.

use crate::error::{MigrateError, Result};
use crate::process::ScopedCommand;
use std::path::{Path, PathBuf};
use tracing::info;

/// Formatter used when none is configured.
pub const DEFAULT_FORMATTER: &str = "npx prettier --write";

/// Extensions the formatter is run on.
const FORMATTED_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts", "cts", "mts", "jsx", "tsx", "json"];

/// The default formatter command.
pub fn default_formatter() -> ScopedCommand {
    ScopedCommand::new("npx").args(["prettier", "--write"])
}

/// Files worth formatting, in order, without duplicates.
pub fn formattable(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut selected: Vec<PathBuf> = Vec::new();
    for file in files {
        let wanted = file
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FORMATTED_EXTENSIONS.contains(&e));
        if wanted && !selected.contains(file) {
            selected.push(file.clone());
        }
    }
    selected
}

/// Runs `formatter` once over `files`, from the workspace root.
///
/// A formatter that exits non-zero is reported as a `Process` error
/// carrying its stderr.
pub fn format_files(formatter: &ScopedCommand, root: &Path, files: &[PathBuf]) -> Result<usize> {
    let files = formattable(files);
    if files.is_empty() {
        return Ok(0);
    }

    let command = formatter
        .clone()
        .args(files.iter().map(|f| f.to_string_lossy().into_owned()))
        .current_dir(root);
    info!(command = %formatter.display(), files = files.len(), "formatting");

    let output = command.run()?;
    if !output.success {
        return Err(MigrateError::Process {
            command: formatter.display(),
            message: match output.stderr.trim() {
                "" => format!("exited with {:?}", output.exit_code),
                stderr => stderr.to_string(),
            },
        });
    }
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formattable_filters_and_dedups() {
        let files = vec![
            PathBuf::from("apps/web/webpack.config.js"),
            PathBuf::from("apps/web/project.json"),
            PathBuf::from("apps/web/README.md"),
            PathBuf::from("apps/web/webpack.config.js"),
        ];
        assert_eq!(
            formattable(&files),
            vec![
                PathBuf::from("apps/web/webpack.config.js"),
                PathBuf::from("apps/web/project.json")
            ]
        );
    }

    #[test]
    fn test_default_formatter() {
        assert_eq!(default_formatter().display(), DEFAULT_FORMATTER);
    }

    #[cfg(unix)]
    #[test]
    fn test_format_files_runs_in_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "x").unwrap();

        let formatted = format_files(
            &ScopedCommand::new("test").arg("-f"),
            dir.path(),
            &[PathBuf::from("a.js")],
        )
        .unwrap();
        assert_eq!(formatted, 1);

        let err = format_files(
            &ScopedCommand::new("test").arg("-f"),
            dir.path(),
            &[PathBuf::from("missing.js")],
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::Process { .. }));
    }

    #[test]
    fn test_nothing_to_format() {
        let formatted = format_files(&default_formatter(), Path::new("."), &[PathBuf::from("notes.md")]).unwrap();
        assert_eq!(formatted, 0);
    }
}
