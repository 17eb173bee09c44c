//! Diff generation for previewing staged changes.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write;
use std::path::Path;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Generates a unified diff between two strings.
pub fn unified_diff(original: &str, modified: &str, path: &Path) -> String {
    render(original, modified, path, false)
}

/// Colorized diff output for terminal display.
pub fn colorized_diff(original: &str, modified: &str, path: &Path) -> String {
    render(original, modified, path, true)
}

fn render(original: &str, modified: &str, path: &Path, color: bool) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();
    let (header, reset) = if color { (CYAN, RESET) } else { ("", "") };

    let _ = writeln!(output, "{header}--- a/{}{reset}", path.display());
    let _ = writeln!(output, "{header}+++ b/{}{reset}", path.display());

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        let _ = writeln!(output, "{header}{}{reset}", hunk.header());
        for change in hunk.iter_changes() {
            let (sign, line_color) = match change.tag() {
                ChangeTag::Delete => ("-", RED),
                ChangeTag::Insert => ("+", GREEN),
                ChangeTag::Equal => (" ", ""),
            };
            let value = change.value();
            let newline = if value.ends_with('\n') { "" } else { "\n" };

            if color && !line_color.is_empty() {
                let _ = write!(output, "{line_color}{sign}{value}{RESET}{newline}");
            } else {
                let _ = write!(output, "{sign}{value}{newline}");
            }
        }
    }

    output
}

/// Line-level summary of one or more changes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffSummary {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    /// Creates a summary from original and modified content.
    pub fn from_diff(original: &str, modified: &str) -> Self {
        let diff = TextDiff::from_lines(original, modified);
        let mut insertions = 0;
        let mut deletions = 0;

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => insertions += 1,
                ChangeTag::Delete => deletions += 1,
                ChangeTag::Equal => {}
            }
        }

        Self {
            files_changed: usize::from(insertions > 0 || deletions > 0),
            insertions,
            deletions,
        }
    }

    /// Combines two summaries.
    pub fn merge(&mut self, other: &DiffSummary) {
        self.files_changed += other.files_changed;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} file(s) changed, {} insertions(+), {} deletions(-)",
            self.files_changed, self.insertions, self.deletions
        )
    }
}
