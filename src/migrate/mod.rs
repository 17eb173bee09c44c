//! The migration driver.
//!
//! A [`Migration`] walks every unit bound to the profile's executor,
//! project by project. For each project it stages all edits in the
//! [`Tree`], then flushes them; a failure anywhere inside a project rolls
//! that project back and the run moves on.
//!
//! ```rust,no_run
//! use target_migrate::migrate::Migration;
//! use target_migrate::profile::MigrationProfile;
//! use target_migrate::tree::Tree;
//! use target_migrate::workspace::Workspace;
//!
//! let mut tree = Tree::open(".");
//! let mut workspace = Workspace::discover(&tree)?;
//! let report = Migration::new(MigrationProfile::webpack())
//!     .project("web")
//!     .skip_format()
//!     .run(&mut tree, &mut workspace)?;
//! println!("{report}");
//! # Ok::<(), target_migrate::error::MigrateError>(())
//! ```

pub mod format;
pub mod report;

pub use format::{DEFAULT_FORMATTER, default_formatter, format_files};
pub use report::{MigrationReport, ProjectStatus, Warning, WarningLevel};

use crate::error::{MigrateError, Result};
use crate::extract::ExtractedOptions;
use crate::process::ScopedCommand;
use crate::profile::MigrationProfile;
use crate::transform::{tidy, unmerged_override};
use crate::tree::{Tree, normalize_key};
use crate::transform::SynthesizedFile;
use crate::workspace::{MigrationUnit, Project, TargetConfiguration, Workspace, enumerate};
use indexmap::{IndexMap, IndexSet};
use path_slash::PathExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the driver treats one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitClass {
    /// The target is not bound to the profile's executor.
    NotApplicable,
    /// A configuration variant: stripped, never synthesized. Left alone
    /// when its base target was skipped.
    HasVariant,
    /// A base target that can be migrated, with its legacy config file if
    /// the profile uses one.
    Migratable { config: Option<PathBuf> },
    /// A base target that cannot be migrated, and why.
    Skipped(String),
}

/// What one project contributed to the run.
#[derive(Debug, Default)]
struct ProjectRun {
    migrated: usize,
    skipped: usize,
    synthesized: Option<PathBuf>,
    skip_reasons: Vec<String>,
}

/// A configured migration run.
#[derive(Debug, Clone)]
pub struct Migration {
    profile: MigrationProfile,
    project: Option<String>,
    skip_format: bool,
    dry_run: bool,
    formatter: ScopedCommand,
}

impl Migration {
    /// Creates a run for a profile.
    pub fn new(profile: MigrationProfile) -> Self {
        Self {
            profile,
            project: None,
            skip_format: false,
            dry_run: false,
            formatter: default_formatter(),
        }
    }

    /// Restricts the run to one project.
    pub fn project(mut self, name: impl Into<String>) -> Self {
        self.project = Some(name.into());
        self
    }

    /// Disables the formatter.
    pub fn skip_format(mut self) -> Self {
        self.skip_format = true;
        self
    }

    /// Stages changes without writing them.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Replaces the formatter command.
    pub fn formatter(mut self, formatter: ScopedCommand) -> Self {
        self.formatter = formatter;
        self
    }

    /// Returns the profile.
    pub fn profile(&self) -> &MigrationProfile {
        &self.profile
    }

    /// Classifies a unit against the current tree.
    pub fn classify(&self, tree: &Tree, unit: &MigrationUnit, target: &TargetConfiguration) -> UnitClass {
        if target.executor() != Some(self.profile.executor.as_str()) {
            return UnitClass::NotApplicable;
        }
        if !unit.is_base() {
            return UnitClass::HasVariant;
        }
        let Some(key) = &self.profile.legacy_config_key else {
            return UnitClass::Migratable { config: None };
        };
        match target.option_str(key) {
            None | Some("") => UnitClass::Skipped(format!("{} has no '{}' option", unit.label(), key)),
            Some(path) if tree.exists(path) => UnitClass::Migratable {
                config: Some(normalize_key(Path::new(path))),
            },
            Some(path) => UnitClass::Skipped(format!("{} does not exist", path)),
        }
    }

    /// Runs the migration.
    ///
    /// Fails with `ProjectNotFound` for an unknown project filter and with
    /// `NothingMigrated` when no unit was migrated; in both cases nothing
    /// has been written.
    pub fn run(&self, tree: &mut Tree, workspace: &mut Workspace) -> Result<MigrationReport> {
        if let Some(name) = &self.project
            && workspace.project(name).is_none()
        {
            return Err(MigrateError::ProjectNotFound(name.clone()));
        }

        let mut by_project: IndexMap<String, Vec<MigrationUnit>> = IndexMap::new();
        for unit in enumerate(workspace, &self.profile.executor, self.project.as_deref()) {
            by_project.entry(unit.project.clone()).or_default().push(unit);
        }
        info!(
            profile = %self.profile.name,
            executor = %self.profile.executor,
            projects = by_project.len(),
            "starting migration"
        );

        let mut report = MigrationReport::new();
        report.dry_run = self.dry_run;

        for (name, units) in by_project {
            let Some(snapshot) = workspace.project(&name).cloned() else {
                continue;
            };
            let mark = tree.mark();
            let warnings_before = report.warnings.len();

            match self.migrate_project(tree, workspace, &snapshot, units.clone(), &mut report) {
                Ok(run) if run.migrated > 0 => {
                    info!(project = %name, units = run.migrated, "migrated project");
                    report.skipped += run.skipped;
                    report.record_migrated(&name, run.migrated, run.synthesized);
                }
                Ok(run) => {
                    report.record_skipped(&name, run.skipped, run.skip_reasons.join("; "));
                }
                Err(e) => {
                    warn!(project = %name, error = %e, "project failed; rolling back");
                    tree.rollback(mark);
                    report.warnings.truncate(warnings_before);
                    if let Some(project) = workspace.project_mut(&name) {
                        *project = snapshot;
                    }
                    let bases = units.iter().filter(|u| u.is_base()).count();
                    report.warn(WarningLevel::Error, Some(&name), e.to_string());
                    report.record_skipped(&name, bases, e.to_string());
                }
            }
        }

        let mut report = report.into_result()?;

        for change in tree.changes() {
            report.diff.merge(&change.summary());
        }

        if !self.dry_run
            && !self.skip_format
            && let Some(root) = tree.root()
        {
            if let Err(e) = format_files(&self.formatter, root, &report.written) {
                warn!(error = %e, "formatting failed");
                report.warn(WarningLevel::Warn, None, format!("Formatting skipped: {}", e));
            }
        }

        Ok(report)
    }

    fn migrate_project(
        &self,
        tree: &mut Tree,
        workspace: &mut Workspace,
        project: &Project,
        units: Vec<MigrationUnit>,
        report: &mut MigrationReport,
    ) -> Result<ProjectRun> {
        let mut run = ProjectRun::default();
        let mut extracted: IndexMap<PathBuf, Arc<ExtractedOptions>> = IndexMap::new();
        let mut configs: IndexMap<String, PathBuf> = IndexMap::new();
        let mut skipped_targets: IndexSet<String> = IndexSet::new();
        let mut migrated_bases: IndexSet<String> = IndexSet::new();
        let mut touched: IndexSet<String> = IndexSet::new();
        let transformer = self.profile.transformer();

        for mut unit in units {
            let Some(target) = workspace
                .project(&project.name)
                .and_then(|p| p.targets.get(&unit.target))
            else {
                continue;
            };
            let class = self.classify(tree, &unit, target);
            debug!(unit = %unit.label(), class = ?class, "classified");

            match class {
                UnitClass::NotApplicable => continue,
                UnitClass::Skipped(reason) => {
                    warn!(unit = %unit.label(), %reason, "skipping");
                    report.warn(WarningLevel::Warn, Some(&project.name), format!("Skipped {}: {}", unit.label(), reason));
                    run.skipped += 1;
                    run.skip_reasons.push(reason);
                    skipped_targets.insert(unit.target.clone());
                    continue;
                }
                UnitClass::HasVariant if skipped_targets.contains(&unit.target) => {
                    debug!(unit = %unit.label(), "base target skipped; leaving variant");
                    continue;
                }
                UnitClass::Migratable { config: Some(config) } => {
                    if let Some(fragments) = extracted.get(&config) {
                        unit = unit.with_fragments(Arc::clone(fragments));
                    } else {
                        let fragments = Arc::new(self.extract(tree, project, &config, report)?);
                        extracted.insert(config.clone(), Arc::clone(&fragments));
                        unit = unit.with_fragments(fragments);
                        let file = self.synthesize(tree, &config, &unit)?;
                        for note in file.warnings {
                            report.warn(WarningLevel::Info, Some(&project.name), note);
                        }
                        run.synthesized = Some(file.path);
                    }
                    configs.insert(unit.target.clone(), config);
                }
                UnitClass::Migratable { config: None } | UnitClass::HasVariant => {}
            }

            let Some(target) = workspace
                .project_mut(&project.name)
                .and_then(|p| p.targets.get_mut(&unit.target))
            else {
                continue;
            };
            if let Some(name) = unit.configuration.as_deref() {
                let migrated = configs.get(&unit.target).map(PathBuf::as_path);
                if let Some(kept) = transformer.release_legacy_override(target, name, migrated) {
                    warn!(unit = %unit.label(), config = %kept, "variant keeps its own legacy config");
                    report.warn(
                        WarningLevel::Warn,
                        Some(&project.name),
                        format!("{}: {}", unit.label(), unmerged_override(name, &kept)),
                    );
                }
            }
            for message in transformer.transform_unit(target, unit.configuration.as_deref()) {
                report.warn(WarningLevel::Warn, Some(&project.name), expand_message(&message, project));
            }
            if unit.is_base() {
                migrated_bases.insert(unit.target.clone());
            }
            touched.insert(unit.target.clone());
            run.migrated += 1;
        }

        if run.migrated == 0 {
            return Ok(run);
        }

        if let Some(p) = workspace.project_mut(&project.name) {
            for name in &touched {
                let Some(target) = p.targets.get_mut(name) else {
                    continue;
                };
                tidy(target);
                if migrated_bases.contains(name) {
                    target.remove_executor();
                    if target.is_empty() {
                        debug!(project = %project.name, target = %name, "target fully inferred; removing");
                        p.targets.shift_remove(name);
                    }
                }
            }
        }

        workspace.save_project(tree, &project.name)?;
        if !self.dry_run {
            report.written.extend(tree.flush()?);
        }
        Ok(run)
    }

    /// Writes the plugin config for a unit from the fragments attached to it.
    fn synthesize(&self, tree: &mut Tree, config: &Path, unit: &MigrationUnit) -> Result<SynthesizedFile> {
        let empty = ExtractedOptions::default();
        let fragments = unit.fragments.as_deref().unwrap_or(&empty);
        self.profile.synthesizer().synthesize(tree, config, fragments)
    }

    /// Extracts the profile's fragments from a legacy config and relocates
    /// their paths from the workspace root to the project root.
    fn extract(
        &self,
        tree: &Tree,
        project: &Project,
        config: &Path,
        report: &mut MigrationReport,
    ) -> Result<ExtractedOptions> {
        let mut extracted = self.profile.extractor().extract_file(tree, config)?;
        let normalizer = self.profile.normalizer();

        let callees: Vec<String> = extracted.iter().map(|(name, _)| name.to_string()).collect();
        for callee in callees {
            let Some(fragment) = extracted.get(&callee) else {
                continue;
            };
            let normalized = normalizer.normalize(fragment, Path::new(""), &project.root);
            for (from, to) in &normalized.rewritten {
                debug!(project = %project.name, %from, %to, "relocated path");
            }
            for path in &normalized.unresolved {
                report.warn(
                    WarningLevel::Warn,
                    Some(&project.name),
                    format!(
                        "Could not relocate '{}' in {}(...) from {}; update it by hand",
                        path,
                        callee,
                        config.display()
                    ),
                );
            }
            extracted.set(&callee, Some(normalized.fragment));
        }
        Ok(extracted)
    }
}

/// Replaces `{project}` and `{root}` in a profile message.
pub fn expand_message(message: &str, project: &Project) -> String {
    message
        .replace("{project}", &project.name)
        .replace("{root}", &project.root.to_slash_lossy())
}
