//! Enumeration of the targets bound to an executor.

use super::{Project, Workspace};
use crate::extract::ExtractedOptions;
use std::path::PathBuf;
use std::sync::Arc;

/// One (project, target, configuration variant) triple scheduled for
/// migration. `configuration` is `None` for the target's default options.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationUnit {
    pub project: String,
    pub root: PathBuf,
    pub target: String,
    pub configuration: Option<String>,
    /// Fragments extracted from the legacy config this unit points at,
    /// once the driver has read it. Units sharing a config share one copy.
    pub fragments: Option<Arc<ExtractedOptions>>,
}

impl MigrationUnit {
    /// Returns true for the unit covering the target's default options.
    pub fn is_base(&self) -> bool {
        self.configuration.is_none()
    }

    /// Attaches the fragments extracted for this unit's legacy config.
    pub fn with_fragments(mut self, fragments: Arc<ExtractedOptions>) -> Self {
        self.fragments = Some(fragments);
        self
    }

    /// `project:target` or `project:target:configuration`.
    pub fn label(&self) -> String {
        match &self.configuration {
            Some(configuration) => format!("{}:{}:{}", self.project, self.target, configuration),
            None => format!("{}:{}", self.project, self.target),
        }
    }
}

/// Lazily yields a unit for every target variant bound to `executor`.
///
/// Order is project order, then target order, then the default options
/// followed by each configuration variant in insertion order. With a
/// `project_filter`, only that project is visited. Nothing matching is an
/// empty sequence, never an error.
pub fn enumerate<'w>(
    workspace: &'w Workspace,
    executor: &'w str,
    project_filter: Option<&'w str>,
) -> impl Iterator<Item = MigrationUnit> + 'w {
    workspace
        .projects()
        .filter(move |project| project_filter.is_none_or(|name| project.name == name))
        .flat_map(move |project| project_units(project, executor))
}

fn project_units<'w>(project: &'w Project, executor: &'w str) -> impl Iterator<Item = MigrationUnit> + 'w {
    project
        .targets
        .iter()
        .filter(move |(_, target)| target.executor() == Some(executor))
        .flat_map(move |(target_name, target)| {
            std::iter::once(None)
                .chain(target.configuration_names().into_iter().map(Some))
                .map(move |configuration| MigrationUnit {
                    project: project.name.clone(),
                    root: project.root.clone(),
                    target: target_name.clone(),
                    configuration,
                    fragments: None,
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{Options, TargetConfiguration};

    const WEBPACK: &str = "@nx/webpack:webpack";

    fn workspace() -> Workspace {
        Workspace::from_projects([
            Project::new("web", "apps/web")
                .with_target("lint", TargetConfiguration::new("@nx/eslint:lint"))
                .with_target(
                    "build",
                    TargetConfiguration::new(WEBPACK)
                        .with_configuration("production", Options::new())
                        .with_configuration("development", Options::new()),
                ),
            Project::new("ui", "libs/ui"),
            Project::new("admin", "apps/admin")
                .with_target("build", TargetConfiguration::new(WEBPACK))
                .with_target("build-ssr", TargetConfiguration::new(WEBPACK)),
        ])
    }

    #[test]
    fn test_yields_units_in_deterministic_order() {
        let workspace = workspace();
        let labels: Vec<String> = enumerate(&workspace, WEBPACK, None)
            .map(|u| u.label())
            .collect();

        assert_eq!(
            labels,
            vec![
                "web:build",
                "web:build:production",
                "web:build:development",
                "admin:build",
                "admin:build-ssr",
            ]
        );
    }

    #[test]
    fn test_project_filter() {
        let workspace = workspace();
        let units: Vec<MigrationUnit> = enumerate(&workspace, WEBPACK, Some("admin")).collect();

        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.project == "admin" && u.is_base()));
        assert_eq!(units[0].root, PathBuf::from("apps/admin"));
    }

    #[test]
    fn test_no_match_is_empty() {
        let workspace = workspace();
        assert_eq!(enumerate(&workspace, "@nx/vite:build", None).count(), 0);
        assert_eq!(enumerate(&workspace, WEBPACK, Some("missing")).count(), 0);
    }

    #[test]
    fn test_units_start_without_fragments() {
        let workspace = workspace();
        let unit = enumerate(&workspace, WEBPACK, None).next().unwrap();
        assert!(unit.fragments.is_none());

        let fragments = Arc::new(ExtractedOptions::default());
        let unit = unit.with_fragments(Arc::clone(&fragments));
        assert!(Arc::ptr_eq(unit.fragments.as_ref().unwrap(), &fragments));
    }
}
