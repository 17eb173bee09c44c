//! Generation of plugin-based config files from extracted fragments.

use crate::error::{MigrateError, Result};
use crate::extract::ExtractedOptions;
use crate::lang::LanguageRegistry;
use crate::tree::Tree;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One plugin in the generated config, fed by one legacy call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    /// Legacy function whose argument becomes the plugin options.
    pub callee: String,
    /// Plugin class to instantiate.
    pub class_name: String,
    /// Module the class is required from.
    pub module: String,
    /// Comment placed inside the constructor call when the legacy call is
    /// absent, one line per entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_comment: Option<String>,
}

impl PluginSpec {
    pub fn new(callee: impl Into<String>, class_name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            callee: callee.into(),
            class_name: class_name.into(),
            module: module.into(),
            fallback_comment: None,
        }
    }

    /// Sets the fallback comment.
    pub fn fallback_comment(mut self, comment: impl Into<String>) -> Self {
        self.fallback_comment = Some(comment.into());
        self
    }
}

/// Result of a synthesis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedFile {
    /// Where the new config was written (the original path).
    pub path: PathBuf,
    /// Where the original config was moved.
    pub archived_path: PathBuf,
    pub contents: String,
    /// One note per plugin rendered without a legacy fragment.
    pub warnings: Vec<String>,
}

/// Renders a config file that instantiates plugins in a fixed order.
#[derive(Debug, Clone)]
pub struct ConfigSynthesizer {
    plugins: Vec<PluginSpec>,
    header: Option<String>,
    archive_suffix: String,
}

impl Default for ConfigSynthesizer {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            header: None,
            archive_suffix: "old".to_string(),
        }
    }
}

impl ConfigSynthesizer {
    /// Creates a synthesizer with no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin.
    pub fn plugin(mut self, spec: PluginSpec) -> Self {
        self.plugins.push(spec);
        self
    }

    /// Appends several plugins.
    pub fn plugins(mut self, specs: impl IntoIterator<Item = PluginSpec>) -> Self {
        self.plugins.extend(specs);
        self
    }

    /// Sets the comment written above the exports.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Sets the suffix inserted before the archived file's extension.
    pub fn archive_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.archive_suffix = suffix.into();
        self
    }

    /// The callees whose fragments this synthesizer consumes, in order.
    pub fn callees(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.callee.as_str())
    }

    /// Path the original file is archived to:
    /// `webpack.config.js` → `webpack.config.old.js`.
    pub fn archive_path(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, self.archive_suffix, ext.to_string_lossy()),
            None => format!("{}.{}", stem, self.archive_suffix),
        };
        path.with_file_name(name)
    }

    /// Renders the new file without touching the tree.
    ///
    /// Returns the contents and a note for each plugin whose callee had no
    /// fragment.
    pub fn render(&self, fragments: &ExtractedOptions) -> (String, Vec<String>) {
        let mut out = String::new();
        let mut warnings = Vec::new();

        let mut imports: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for plugin in &self.plugins {
            let names = imports.entry(plugin.module.as_str()).or_default();
            if !names.contains(&plugin.class_name.as_str()) {
                names.push(&plugin.class_name);
            }
        }
        for (module, names) in &imports {
            out.push_str(&format!("const {{ {} }} = require('{}');\n", names.join(", "), module));
        }
        if !imports.is_empty() {
            out.push('\n');
        }

        if let Some(header) = &self.header {
            for line in header.lines() {
                out.push_str("// ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str("module.exports = {\n  plugins: [\n");
        for plugin in &self.plugins {
            match fragments.get(&plugin.callee) {
                Some(fragment) if !fragment.is_empty() => {
                    out.push_str(&format!("    new {}({}),\n", plugin.class_name, fragment.text));
                }
                Some(_) => {
                    out.push_str(&format!("    new {}(),\n", plugin.class_name));
                }
                None => {
                    warnings.push(format!(
                        "No {}(...) call found; {} is created with default options.",
                        plugin.callee, plugin.class_name
                    ));
                    match &plugin.fallback_comment {
                        Some(comment) => {
                            out.push_str(&format!("    new {}({{\n", plugin.class_name));
                            for line in comment.lines() {
                                out.push_str("      // ");
                                out.push_str(line);
                                out.push('\n');
                            }
                            out.push_str("    }),\n");
                        }
                        None => out.push_str(&format!("    new {}(),\n", plugin.class_name)),
                    }
                }
            }
        }
        out.push_str("  ],\n};\n");

        (out, warnings)
    }

    /// Archives `original` and writes the generated config in its place.
    ///
    /// The generated text is parsed before anything is staged, so a
    /// fragment that does not survive re-emission leaves the tree untouched.
    /// Fails with `ArchiveExists` when the archive path is taken.
    pub fn synthesize(&self, tree: &mut Tree, original: &Path, fragments: &ExtractedOptions) -> Result<SynthesizedFile> {
        let (contents, warnings) = self.render(fragments);

        let registry = LanguageRegistry::new();
        registry
            .require(original)?
            .parse(&contents)
            .map_err(|e| e.at_path(original))?;

        let archived_path = self.archive_path(original);
        if tree.exists(&archived_path) {
            return Err(MigrateError::ArchiveExists(archived_path));
        }
        tree.rename(original, &archived_path)?;
        tree.write(original, contents.clone())?;
        debug!(
            path = %original.display(),
            archived = %archived_path.display(),
            "synthesized config"
        );

        Ok(SynthesizedFile {
            path: original.to_path_buf(),
            archived_path,
            contents,
            warnings,
        })
    }
}
