//! Reduction of executor targets to what an inferred plugin cannot derive.

use crate::tree::normalize_key;
use crate::workspace::{Options, TargetConfiguration};
use indexmap::{IndexMap, IndexSet};
use std::path::Path;

/// What the transformer removes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Option naming the legacy config file. Removed from the default
    /// options once migrated; a variant override is removed only when it
    /// names the same file.
    pub legacy_config_key: Option<String>,
    /// Options the inferred plugin supplies on its own.
    pub implied_keys: IndexSet<String>,
    /// Options that have no plugin equivalent, with the manual step to
    /// surface when one is dropped.
    pub deprecated_keys: IndexMap<String, String>,
}

impl TransformOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the legacy config option key.
    pub fn legacy_config_key(mut self, key: impl Into<String>) -> Self {
        self.legacy_config_key = Some(key.into());
        self
    }

    /// Adds an implied option key.
    pub fn implied(mut self, key: impl Into<String>) -> Self {
        self.implied_keys.insert(key.into());
        self
    }

    /// Adds a deprecated option key and its warning.
    pub fn deprecated(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.deprecated_keys.insert(key.into(), message.into());
        self
    }
}

/// A target after transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedTarget {
    pub target: TargetConfiguration,
    pub warnings: Vec<String>,
}

/// Strips implied and deprecated options from a target and its variants.
///
/// Pure and total: it never fails, and a target with nothing to strip is
/// returned unchanged with no warnings.
#[derive(Debug, Clone, Default)]
pub struct TargetTransformer {
    options: TransformOptions,
}

impl TargetTransformer {
    /// Creates a transformer.
    pub fn new(options: TransformOptions) -> Self {
        Self { options }
    }

    /// Returns the transformer options.
    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Transforms a whole target: default options, every variant, then
    /// the structural cleanup.
    pub fn transform(&self, target: &TargetConfiguration) -> TransformedTarget {
        let mut target = target.clone();
        let config = self
            .options
            .legacy_config_key
            .as_deref()
            .and_then(|key| target.option_str(key))
            .map(|path| normalize_key(Path::new(path)));

        let mut warnings = self.transform_unit(&mut target, None);
        for name in target.configuration_names() {
            if let Some(kept) = self.release_legacy_override(&mut target, &name, config.as_deref()) {
                warnings.push(unmerged_override(&name, &kept));
            }
            warnings.extend(self.transform_unit(&mut target, Some(&name)));
        }
        tidy(&mut target);
        TransformedTarget { target, warnings }
    }

    /// Strips one part of a target in place: the default options when
    /// `configuration` is `None`, otherwise the named variant. The legacy
    /// config key is only removed from the default options. An options
    /// object left empty is removed. Returns the warnings raised.
    pub fn transform_unit(&self, target: &mut TargetConfiguration, configuration: Option<&str>) -> Vec<String> {
        match configuration {
            None => {
                let Some(options) = target.options_mut() else {
                    return Vec::new();
                };
                let warnings = self.strip(options);
                if let Some(key) = &self.options.legacy_config_key {
                    options.shift_remove(key);
                }
                if options.is_empty() {
                    target.remove_options();
                }
                warnings
            }
            Some(name) => {
                let Some(overrides) = target.configuration_mut(name) else {
                    return Vec::new();
                };
                let warnings = self.strip(overrides);
                if overrides.is_empty() {
                    target.remove_configuration(name);
                }
                warnings
            }
        }
    }

    /// Removes implied and deprecated keys from one options object.
    pub fn strip(&self, options: &mut Options) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, message) in &self.options.deprecated_keys {
            if options.shift_remove(key).is_some() {
                warnings.push(message.clone());
            }
        }
        for key in &self.options.implied_keys {
            options.shift_remove(key);
        }

        warnings
    }

    /// Drops a variant's legacy config override when it names `migrated`,
    /// the file the default options pointed at.
    ///
    /// An override naming any other file is left in place and returned,
    /// since its contents were never carried into the plugin config.
    pub fn release_legacy_override(
        &self,
        target: &mut TargetConfiguration,
        configuration: &str,
        migrated: Option<&Path>,
    ) -> Option<String> {
        let key = self.options.legacy_config_key.as_deref()?;
        let overrides = target.configuration_mut(configuration)?;
        let (same_file, path) = {
            let value = overrides.get(key)?;
            let same_file = value
                .as_str()
                .zip(migrated)
                .is_some_and(|(path, migrated)| normalize_key(Path::new(path)) == normalize_key(migrated));
            (same_file, value.as_str().map_or_else(|| value.to_string(), str::to_string))
        };

        if same_file {
            overrides.shift_remove(key);
            return None;
        }
        Some(path)
    }
}

/// Warning for a variant whose legacy config could not be carried over.
pub fn unmerged_override(configuration: &str, path: &str) -> String {
    format!(
        "Configuration '{}' still uses {}, which was not migrated; merge it into the plugin config by hand.",
        configuration, path
    )
}

/// Enforces the variant invariants after stripping.
///
/// Empty variants are gone already; an empty `configurations` map is
/// dropped along with `defaultConfiguration`, and a `defaultConfiguration`
/// naming a variant that no longer exists is dropped on its own.
pub fn tidy(target: &mut TargetConfiguration) {
    if target.options().is_some_and(|o| o.is_empty()) {
        target.remove_options();
    }

    if target.has_configurations() {
        let names = target.configuration_names();
        for name in &names {
            if target.configuration(name).is_some_and(|c| c.is_empty()) {
                target.remove_configuration(name);
            }
        }
        if target.configuration_names().is_empty() {
            target.remove_configurations();
            target.remove_default_configuration();
        }
    }

    if let Some(default) = target.default_configuration()
        && target.configuration(default).is_none()
    {
        target.remove_default_configuration();
    }
}
