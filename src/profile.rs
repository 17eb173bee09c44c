//! Migration profiles: everything that varies between executors.
//!
//! A profile names the executor being retired, the option that points at
//! its legacy config file, which options the inferred plugin makes
//! redundant, and how to render the replacement config.
//!
//! # Example YAML
//!
//! ```yaml
//! name: webpack
//! description: Convert withNx webpack configs to NxAppWebpackPlugin
//! executor: "@nx/webpack:webpack"
//! legacy_config_key: webpackConfig
//! plugins:
//!   - callee: withNx
//!     class_name: NxAppWebpackPlugin
//!     module: "@nx/webpack/app-plugin"
//! deprecated_keys:
//!   proxyConfig: "Move proxyConfig for {project} into {root}/webpack.config.js"
//! ```

use crate::error::{MigrateError, Result};
use crate::extract::{OptionExtractor, PathKeys, PathNormalizer};
use crate::transform::{ConfigSynthesizer, PluginSpec, TargetTransformer, TransformOptions};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SVGR_COMMENT: &str = "Uncomment this line if you don't want to use SVGR\n\
See: https://react-svgr.com/\n\
svgr: false";

const PROXY_WARNING: &str = "Encountered 'proxyConfig' in project.json when migrating \
'@nx/vite:preview-server' for '{project}'. You will need to copy the contents of this file \
to your {root}/vite.config.ts 'server.proxy' property.";

fn default_archive_suffix() -> String {
    "old".to_string()
}

/// A serializable migration definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProfile {
    /// Unique name for this profile.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Executor whose targets are migrated.
    pub executor: String,

    /// Option holding the workspace-relative path of the legacy config
    /// file. Profiles without one never synthesize a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_config_key: Option<String>,

    /// Options the inferred plugin supplies.
    #[serde(default)]
    pub implied_keys: IndexSet<String>,

    /// Options dropped with a warning. Messages may use `{project}` and
    /// `{root}`.
    #[serde(default)]
    pub deprecated_keys: IndexMap<String, String>,

    /// Keys whose string values are paths. Defaults to [`PathKeys::default`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_keys: Option<Vec<String>>,

    /// Plugins of the generated config, in output order.
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    /// Comment written at the top of the generated config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Suffix given to the archived legacy config.
    #[serde(default = "default_archive_suffix")]
    pub archive_suffix: String,
}

impl MigrationProfile {
    /// Creates a profile for an executor with nothing to strip.
    pub fn new(name: impl Into<String>, executor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            executor: executor.into(),
            legacy_config_key: None,
            implied_keys: IndexSet::new(),
            deprecated_keys: IndexMap::new(),
            path_keys: None,
            plugins: Vec::new(),
            header: None,
            archive_suffix: default_archive_suffix(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the legacy config option key.
    pub fn with_legacy_config_key(mut self, key: impl Into<String>) -> Self {
        self.legacy_config_key = Some(key.into());
        self
    }

    /// Adds an implied option key.
    pub fn with_implied_key(mut self, key: impl Into<String>) -> Self {
        self.implied_keys.insert(key.into());
        self
    }

    /// Adds a deprecated option key.
    pub fn with_deprecated_key(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.deprecated_keys.insert(key.into(), message.into());
        self
    }

    /// Replaces the path-valued keys.
    pub fn with_path_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.path_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a plugin.
    pub fn with_plugin(mut self, plugin: PluginSpec) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Sets the generated file header.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// The built-in webpack profile.
    pub fn webpack() -> Self {
        Self::new("webpack", "@nx/webpack:webpack")
            .with_description("Convert withNx/withReact webpack configs to standalone webpack plugins")
            .with_legacy_config_key("webpackConfig")
            .with_plugin(PluginSpec::new(
                "withNx",
                "NxAppWebpackPlugin",
                "@nx/webpack/app-plugin",
            ))
            .with_plugin(
                PluginSpec::new("withReact", "NxReactWebpackPlugin", "@nx/react/webpack-plugin")
                    .fallback_comment(SVGR_COMMENT),
            )
            .with_header("This file was migrated using target-migrate --profile webpack")
    }

    /// The built-in vite preview-server profile.
    pub fn vite_preview() -> Self {
        Self::new("vite-preview", "@nx/vite:preview-server")
            .with_description("Remove options the vite plugin infers from preview-server targets")
            .with_implied_key("buildTarget")
            .with_implied_key("staticFilePath")
            .with_deprecated_key("proxyConfig", PROXY_WARNING)
    }

    /// All built-in profiles.
    pub fn builtins() -> Vec<Self> {
        vec![Self::webpack(), Self::vite_preview()]
    }

    /// Looks up a built-in profile by name.
    pub fn by_name(name: &str) -> Option<Self> {
        Self::builtins().into_iter().find(|p| p.name == name)
    }

    /// Resolves a built-in name or a path to a YAML/JSON profile.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if let Some(profile) = Self::by_name(name_or_path) {
            return Ok(profile);
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return Self::load(path);
        }
        Err(MigrateError::InvalidProfile(format!(
            "'{}' is neither a built-in profile nor a profile file",
            name_or_path
        )))
    }

    /// Loads and validates a profile, picking the format by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let profile: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Parses and validates a YAML profile.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Serializes the profile as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks the profile for mistakes that would produce broken output.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(MigrateError::InvalidProfile(format!("{}: {}", self.name, message)));

        if self.name.trim().is_empty() {
            return Err(MigrateError::InvalidProfile("profile name is empty".to_string()));
        }
        if self.executor.trim().is_empty() {
            return invalid("executor is empty".to_string());
        }
        if self.archive_suffix.is_empty() || self.archive_suffix.contains(['/', '\\', '.']) {
            return invalid(format!("archive suffix '{}' is not a plain name", self.archive_suffix));
        }
        if !self.plugins.is_empty() && self.legacy_config_key.is_none() {
            return invalid("plugins need a legacy_config_key to read fragments from".to_string());
        }

        let mut callees = IndexSet::new();
        for plugin in &self.plugins {
            for name in [&plugin.callee, &plugin.class_name] {
                if !is_identifier(name) {
                    return invalid(format!("'{}' is not a valid identifier", name));
                }
            }
            if plugin.module.is_empty() || plugin.module.contains(['\'', '\n']) {
                return invalid(format!("module '{}' cannot be required", plugin.module));
            }
            if !callees.insert(plugin.callee.as_str()) {
                return invalid(format!("callee '{}' is listed twice", plugin.callee));
            }
        }
        Ok(())
    }

    /// Options for the target transformer.
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            legacy_config_key: self.legacy_config_key.clone(),
            implied_keys: self.implied_keys.clone(),
            deprecated_keys: self.deprecated_keys.clone(),
        }
    }

    /// A transformer configured by this profile.
    pub fn transformer(&self) -> TargetTransformer {
        TargetTransformer::new(self.transform_options())
    }

    /// An extractor for this profile's callees.
    pub fn extractor(&self) -> OptionExtractor {
        OptionExtractor::new().callees(self.plugins.iter().map(|p| p.callee.clone()))
    }

    /// A path normalizer using this profile's keys.
    pub fn normalizer(&self) -> PathNormalizer {
        match &self.path_keys {
            Some(keys) => PathNormalizer::with_keys(keys.iter().cloned().collect::<PathKeys>()),
            None => PathNormalizer::new(),
        }
    }

    /// A synthesizer for this profile's plugins.
    pub fn synthesizer(&self) -> ConfigSynthesizer {
        let synth = ConfigSynthesizer::new()
            .plugins(self.plugins.iter().cloned())
            .archive_suffix(self.archive_suffix.clone());
        match &self.header {
            Some(header) => synth.header(header.clone()),
            None => synth,
        }
    }
}

/// Returns true for a plain JavaScript identifier.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
