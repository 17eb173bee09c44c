//! Accumulated outcome of a migration run.

use crate::diff::DiffSummary;
use crate::error::{MigrateError, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;

/// Severity of a report warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningLevel {
    /// Best-effort output was produced, e.g. a default plugin argument.
    Info,
    /// A manual follow-up step is required.
    Warn,
    /// A project could not be migrated.
    Error,
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningLevel::Info => write!(f, "info"),
            WarningLevel::Warn => write!(f, "warning"),
            WarningLevel::Error => write!(f, "error"),
        }
    }
}

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: WarningLevel,
    /// Project the message is about, if any.
    pub project: Option<String>,
    pub message: String,
}

/// What happened to one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    /// At least one unit was migrated.
    Migrated {
        units: usize,
        /// Generated config, if the project had a legacy config file.
        synthesized: Option<PathBuf>,
    },
    /// Nothing was changed; the reason is user-facing.
    Skipped(String),
}

/// Counters, warnings and per-project outcomes of a run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Units migrated: base targets that were migrated plus variants that
    /// were stripped.
    pub migrated: usize,
    /// Base units that could not be migrated.
    pub skipped: usize,
    pub warnings: Vec<Warning>,
    pub projects: IndexMap<String, ProjectStatus>,
    /// Files written to disk (empty on a dry run).
    pub written: Vec<PathBuf>,
    pub dry_run: bool,
    pub diff: DiffSummary,
}

impl MigrationReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a migrated project.
    pub fn record_migrated(&mut self, project: &str, units: usize, synthesized: Option<PathBuf>) {
        self.migrated += units;
        self.projects.insert(
            project.to_string(),
            ProjectStatus::Migrated { units, synthesized },
        );
    }

    /// Records a skipped project. `units` is the number of base units lost.
    pub fn record_skipped(&mut self, project: &str, units: usize, reason: impl Into<String>) {
        self.skipped += units;
        self.projects
            .insert(project.to_string(), ProjectStatus::Skipped(reason.into()));
    }

    /// Adds a warning.
    pub fn warn(&mut self, level: WarningLevel, project: Option<&str>, message: impl Into<String>) {
        self.warnings.push(Warning {
            level,
            project: project.map(String::from),
            message: message.into(),
        });
    }

    /// Warnings at or above `level`.
    pub fn warnings_at(&self, level: WarningLevel) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.level >= level)
    }

    /// Names of migrated projects, in run order.
    pub fn migrated_projects(&self) -> impl Iterator<Item = &str> {
        self.projects
            .iter()
            .filter(|(_, s)| matches!(s, ProjectStatus::Migrated { .. }))
            .map(|(name, _)| name.as_str())
    }

    /// Skipped projects and why.
    pub fn skipped_projects(&self) -> impl Iterator<Item = (&str, &str)> {
        self.projects.iter().filter_map(|(name, s)| match s {
            ProjectStatus::Skipped(reason) => Some((name.as_str(), reason.as_str())),
            ProjectStatus::Migrated { .. } => None,
        })
    }

    /// True if anything was migrated.
    pub fn success(&self) -> bool {
        self.migrated > 0
    }

    /// Converts an unsuccessful report into `NothingMigrated`.
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(MigrateError::NothingMigrated)
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "Would migrate" } else { "Migrated" };
        writeln!(f, "{} {} target(s), skipped {}", verb, self.migrated, self.skipped)?;

        for (name, status) in &self.projects {
            match status {
                ProjectStatus::Migrated { units, synthesized } => {
                    write!(f, "  ✓ {} ({} target(s)", name, units)?;
                    if let Some(path) = synthesized {
                        write!(f, ", rewrote {}", path.display())?;
                    }
                    writeln!(f, ")")?;
                }
                ProjectStatus::Skipped(reason) => writeln!(f, "  - {} skipped: {}", name, reason)?,
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            for warning in &self.warnings {
                match &warning.project {
                    Some(project) => writeln!(f, "{} [{}]: {}", warning.level, project, warning.message)?,
                    None => writeln!(f, "{}: {}", warning.level, warning.message)?,
                }
            }
        }

        if self.diff.files_changed > 0 {
            writeln!(f)?;
            writeln!(f, "{}", self.diff)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_fails() {
        let report = MigrationReport::new();
        assert!(!report.success());
        assert!(matches!(report.into_result(), Err(MigrateError::NothingMigrated)));
    }

    #[test]
    fn test_skips_do_not_fail_a_run() {
        let mut report = MigrationReport::new();
        report.record_migrated("web", 3, Some(PathBuf::from("apps/web/webpack.config.js")));
        report.record_skipped("admin", 1, "apps/admin/webpack.config.js does not exist");

        assert_eq!(report.migrated, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.migrated_projects().collect::<Vec<_>>(), vec!["web"]);
        assert_eq!(
            report.skipped_projects().collect::<Vec<_>>(),
            vec![("admin", "apps/admin/webpack.config.js does not exist")]
        );
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_warning_filter() {
        let mut report = MigrationReport::new();
        report.warn(WarningLevel::Info, Some("web"), "default options");
        report.warn(WarningLevel::Warn, Some("web"), "move proxyConfig");
        report.warn(WarningLevel::Error, None, "formatter failed");

        assert_eq!(report.warnings_at(WarningLevel::Warn).count(), 2);
        assert_eq!(report.warnings_at(WarningLevel::Error).count(), 1);
    }

    #[test]
    fn test_display_lists_projects_and_warnings() {
        let mut report = MigrationReport::new();
        report.record_migrated("web", 2, Some(PathBuf::from("apps/web/webpack.config.js")));
        report.record_skipped("admin", 1, "config missing");
        report.warn(WarningLevel::Warn, Some("web"), "move proxyConfig");

        let text = report.to_string();

        assert!(text.starts_with("Migrated 2 target(s), skipped 1\n"));
        assert!(text.contains("  ✓ web (2 target(s), rewrote apps/web/webpack.config.js)\n"));
        assert!(text.contains("  - admin skipped: config missing\n"));
        assert!(text.contains("warning [web]: move proxyConfig\n"));
    }

    #[test]
    fn test_display_dry_run() {
        let report = MigrationReport {
            dry_run: true,
            migrated: 1,
            ..Default::default()
        };
        assert!(report.to_string().starts_with("Would migrate 1 target(s)"));
    }
}
