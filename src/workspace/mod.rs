//! Workspace state: projects and their target definitions.
//!
//! Projects are read from `project.json` files and written back through
//! the [`Tree`](crate::tree::Tree), so a migration stages project edits the
//! same way it stages config file rewrites.

mod enumerate;
mod target;

pub use enumerate::{MigrationUnit, enumerate};
pub use target::{Options, TargetConfiguration};

use crate::error::{MigrateError, Result};
use crate::matcher::FileMatcher;
use crate::tree::Tree;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of a project definition.
pub const PROJECT_FILE: &str = "project.json";

/// Directories never searched for projects.
const IGNORED_DIRS: &[&str] = &["**/node_modules", "**/dist", "**/.git", "**/tmp", "**/.nx"];

/// A project and its targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    /// Workspace-relative root directory.
    pub root: PathBuf,
    /// Workspace-relative path of the `project.json` this was read from.
    pub config_path: PathBuf,
    pub targets: IndexMap<String, TargetConfiguration>,
    document: Map<String, Value>,
}

impl Project {
    /// Creates an empty project rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: name.into(),
            config_path: root.join(PROJECT_FILE),
            root,
            targets: IndexMap::new(),
            document: Map::new(),
        }
    }

    /// Adds a target.
    pub fn with_target(mut self, name: impl Into<String>, target: TargetConfiguration) -> Self {
        self.targets.insert(name.into(), target);
        self
    }

    /// Parses a `project.json` document found at `config_path`.
    pub fn from_json(config_path: &Path, text: &str) -> Result<Self> {
        let invalid = |message: String| MigrateError::InvalidProject {
            path: config_path.to_path_buf(),
            message,
        };

        let mut document = match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            _ => return Err(invalid("expected a JSON object".to_string())),
        };

        let dir = config_path.parent().unwrap_or(Path::new("")).to_path_buf();
        let root = document
            .get("root")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| dir.clone());
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| {
                dir.file_name()
                    .and_then(|n| n.to_str())
                    .map(String::from)
            })
            .ok_or_else(|| invalid("project has no name and sits at the workspace root".to_string()))?;

        let targets = match document.get_mut("targets").map(Value::take) {
            None | Some(Value::Null) => IndexMap::new(),
            Some(value @ Value::Object(_)) => serde_json::from_value(value)?,
            Some(_) => return Err(invalid("'targets' must be an object".to_string())),
        };

        Ok(Self {
            name,
            root,
            config_path: config_path.to_path_buf(),
            targets,
            document,
        })
    }

    /// Serializes the project back to its `project.json` document.
    ///
    /// Fields other than `targets` are written exactly as they were read.
    pub fn to_json(&self) -> Result<String> {
        let mut document = self.document.clone();
        if !self.targets.is_empty() || document.contains_key("targets") {
            document.insert("targets".to_string(), serde_json::to_value(&self.targets)?);
        }
        if !document.contains_key("name") {
            document.insert("name".to_string(), Value::String(self.name.clone()));
        }
        let mut text = serde_json::to_string_pretty(&Value::Object(document))?;
        text.push('\n');
        Ok(text)
    }
}

/// The set of projects in a workspace, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    projects: IndexMap<String, Project>,
}

impl Workspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a workspace from projects, keeping their order.
    pub fn from_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        Self {
            projects: projects.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    /// Finds every `project.json` under the tree's root directory.
    ///
    /// A tree without a backing directory yields an empty workspace.
    pub fn discover(tree: &Tree) -> Result<Self> {
        let Some(root) = tree.root() else {
            return Ok(Self::new());
        };

        let matcher = IGNORED_DIRS
            .iter()
            .fold(FileMatcher::new().file_name(PROJECT_FILE), |m, dir| m.exclude(*dir));

        let mut workspace = Self::new();
        for path in matcher.collect(root)? {
            let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let project = Project::from_json(&rel, &tree.read(&rel)?)?;
            debug!(project = %project.name, path = %rel.display(), "discovered project");
            workspace.insert(project)?;
        }
        Ok(workspace)
    }

    /// Adds a project, rejecting duplicate names.
    pub fn insert(&mut self, project: Project) -> Result<()> {
        if let Some(existing) = self.projects.get(&project.name) {
            return Err(MigrateError::InvalidProject {
                path: project.config_path.clone(),
                message: format!(
                    "project name '{}' is already used by {}",
                    project.name,
                    existing.config_path.display()
                ),
            });
        }
        self.projects.insert(project.name.clone(), project);
        Ok(())
    }

    /// Looks up a project by name.
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Looks up a project by name for modification.
    pub fn project_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.get_mut(name)
    }

    /// Iterates the projects in order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Returns true if there are no projects.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Stages the project's `project.json` into the tree.
    pub fn save_project(&self, tree: &mut Tree, name: &str) -> Result<()> {
        let project = self
            .project(name)
            .ok_or_else(|| MigrateError::ProjectNotFound(name.to_string()))?;
        tree.write(&project.config_path, project.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const WEB_PROJECT: &str = r#"{
  "name": "web",
  "$schema": "../../node_modules/nx/schemas/project-schema.json",
  "sourceRoot": "apps/web/src",
  "projectType": "application",
  "targets": {
    "build": {
      "executor": "@nx/webpack:webpack",
      "options": { "webpackConfig": "apps/web/webpack.config.js" }
    },
    "lint": { "executor": "@nx/eslint:lint" }
  },
  "tags": []
}
"#;

    #[test]
    fn test_from_json_reads_targets_and_root() {
        let project = Project::from_json(Path::new("apps/web/project.json"), WEB_PROJECT).unwrap();

        assert_eq!(project.name, "web");
        assert_eq!(project.root, Path::new("apps/web"));
        assert_eq!(project.targets.keys().collect::<Vec<_>>(), vec!["build", "lint"]);
        assert_eq!(
            project.targets["build"].option_str("webpackConfig"),
            Some("apps/web/webpack.config.js")
        );
    }

    #[test]
    fn test_to_json_preserves_field_order() {
        let mut project = Project::from_json(Path::new("apps/web/project.json"), WEB_PROJECT).unwrap();
        project.targets.shift_remove("lint");

        let value: Value = serde_json::from_str(&project.to_json().unwrap()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "$schema", "sourceRoot", "projectType", "targets", "tags"]);
        assert_eq!(value["targets"], json!({
            "build": {
                "executor": "@nx/webpack:webpack",
                "options": { "webpackConfig": "apps/web/webpack.config.js" }
            }
        }));
    }

    #[test]
    fn test_name_defaults_to_directory() {
        let project = Project::from_json(Path::new("libs/ui/project.json"), r#"{ "targets": {} }"#).unwrap();
        assert_eq!(project.name, "ui");
        assert_eq!(project.root, Path::new("libs/ui"));
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(matches!(
            Project::from_json(Path::new("a/project.json"), "[]"),
            Err(MigrateError::InvalidProject { .. })
        ));
        assert!(matches!(
            Project::from_json(Path::new("a/project.json"), r#"{ "targets": [] }"#),
            Err(MigrateError::InvalidProject { .. })
        ));
        assert!(matches!(
            Project::from_json(Path::new("a/project.json"), "{"),
            Err(MigrateError::Json(_))
        ));
    }

    #[test]
    fn test_discover_skips_ignored_directories() {
        let dir = TempDir::new().unwrap();
        for (rel, text) in [
            ("apps/web/project.json", WEB_PROJECT),
            ("libs/ui/project.json", r#"{ "name": "ui" }"#),
            ("node_modules/nx/project.json", r#"{ "name": "nx" }"#),
        ] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }

        let workspace = Workspace::discover(&Tree::open(dir.path())).unwrap();

        let names: Vec<&str> = workspace.projects().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["web", "ui"]);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut workspace = Workspace::new();
        workspace.insert(Project::new("web", "apps/web")).unwrap();
        let err = workspace.insert(Project::new("web", "apps/web2")).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidProject { .. }));
    }

    #[test]
    fn test_save_project_stages_write() {
        let workspace = Workspace::from_projects([Project::new("web", "apps/web")
            .with_target("build", TargetConfiguration::new("@nx/webpack:webpack"))]);
        let mut tree = Tree::in_memory();

        workspace.save_project(&mut tree, "web").unwrap();

        let saved: Value = serde_json::from_str(&tree.read("apps/web/project.json").unwrap()).unwrap();
        assert_eq!(saved["name"], "web");
        assert_eq!(saved["targets"]["build"]["executor"], "@nx/webpack:webpack");
        assert!(matches!(
            workspace.save_project(&mut tree, "api"),
            Err(MigrateError::ProjectNotFound(_))
        ));
    }
}
