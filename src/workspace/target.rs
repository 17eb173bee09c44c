//! Target definitions as stored in `project.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option name → value mapping for a target or one of its variants.
pub type Options = Map<String, Value>;

/// A named, project-scoped unit of work.
///
/// Backed by the raw JSON object so that fields this crate does not
/// understand (`dependsOn`, `outputs`, `cache`, ...) and the original key
/// order survive a load/save round trip. Accessors expose the parts the
/// migration touches: executor, default options, configuration variants,
/// and the default-variant reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetConfiguration(Map<String, Value>);

const EXECUTOR: &str = "executor";
const OPTIONS: &str = "options";
const CONFIGURATIONS: &str = "configurations";
const DEFAULT_CONFIGURATION: &str = "defaultConfiguration";

impl TargetConfiguration {
    /// Creates a target bound to an executor.
    pub fn new(executor: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(EXECUTOR.to_string(), Value::String(executor.into()));
        Self(map)
    }

    /// Wraps a raw JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns the raw JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Sets a default option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options_entry().insert(key.into(), value.into());
        self
    }

    /// Adds or replaces a configuration variant.
    pub fn with_configuration(mut self, name: impl Into<String>, overrides: Options) -> Self {
        let configurations = self
            .0
            .entry(CONFIGURATIONS)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = configurations {
            map.insert(name.into(), Value::Object(overrides));
        }
        self
    }

    /// Sets the default-variant reference.
    pub fn with_default_configuration(mut self, name: impl Into<String>) -> Self {
        self.0
            .insert(DEFAULT_CONFIGURATION.to_string(), Value::String(name.into()));
        self
    }

    /// Sets any other field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The executor identifier, if the target has one.
    pub fn executor(&self) -> Option<&str> {
        self.0.get(EXECUTOR).and_then(Value::as_str)
    }

    /// Removes the executor field.
    pub fn remove_executor(&mut self) -> Option<String> {
        match self.0.shift_remove(EXECUTOR) {
            Some(Value::String(executor)) => Some(executor),
            _ => None,
        }
    }

    /// Default options.
    pub fn options(&self) -> Option<&Options> {
        self.0.get(OPTIONS).and_then(Value::as_object)
    }

    /// Mutable default options.
    pub fn options_mut(&mut self) -> Option<&mut Options> {
        self.0.get_mut(OPTIONS).and_then(Value::as_object_mut)
    }

    /// Reads a string-valued default option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options().and_then(|o| o.get(key)).and_then(Value::as_str)
    }

    /// Removes the default options object.
    pub fn remove_options(&mut self) {
        self.0.shift_remove(OPTIONS);
    }

    /// Names of the configuration variants, in insertion order.
    pub fn configuration_names(&self) -> Vec<String> {
        self.0
            .get(CONFIGURATIONS)
            .and_then(Value::as_object)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns true if the target has a `configurations` field.
    pub fn has_configurations(&self) -> bool {
        self.0.contains_key(CONFIGURATIONS)
    }

    /// Overrides for one variant.
    pub fn configuration(&self, name: &str) -> Option<&Options> {
        self.0
            .get(CONFIGURATIONS)
            .and_then(Value::as_object)
            .and_then(|c| c.get(name))
            .and_then(Value::as_object)
    }

    /// Mutable overrides for one variant.
    pub fn configuration_mut(&mut self, name: &str) -> Option<&mut Options> {
        self.0
            .get_mut(CONFIGURATIONS)
            .and_then(Value::as_object_mut)
            .and_then(|c| c.get_mut(name))
            .and_then(Value::as_object_mut)
    }

    /// Removes one variant.
    pub fn remove_configuration(&mut self, name: &str) {
        if let Some(configurations) = self.0.get_mut(CONFIGURATIONS).and_then(Value::as_object_mut) {
            configurations.shift_remove(name);
        }
    }

    /// Removes the whole `configurations` field.
    pub fn remove_configurations(&mut self) {
        self.0.shift_remove(CONFIGURATIONS);
    }

    /// The default-variant reference.
    pub fn default_configuration(&self) -> Option<&str> {
        self.0.get(DEFAULT_CONFIGURATION).and_then(Value::as_str)
    }

    /// Removes the default-variant reference.
    pub fn remove_default_configuration(&mut self) {
        self.0.shift_remove(DEFAULT_CONFIGURATION);
    }

    /// Returns true if the target has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn options_entry(&mut self) -> &mut Options {
        let entry = self
            .0
            .entry(OPTIONS)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("options entry was just made an object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_target() -> TargetConfiguration {
        serde_json::from_value(json!({
            "executor": "@nx/webpack:webpack",
            "outputs": ["{options.outputPath}"],
            "options": { "webpackConfig": "apps/web/webpack.config.js" },
            "configurations": {
                "production": { "optimization": true },
                "development": {}
            },
            "defaultConfiguration": "production"
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let target = build_target();
        assert_eq!(target.executor(), Some("@nx/webpack:webpack"));
        assert_eq!(target.option_str("webpackConfig"), Some("apps/web/webpack.config.js"));
        assert_eq!(target.configuration_names(), vec!["production", "development"]);
        assert_eq!(target.default_configuration(), Some("production"));
        assert_eq!(
            target.configuration("production").unwrap().get("optimization"),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_round_trip_preserves_key_order_and_unknown_fields() {
        let target = build_target();
        let text = serde_json::to_string(&target).unwrap();
        assert_eq!(
            text,
            r#"{"executor":"@nx/webpack:webpack","outputs":["{options.outputPath}"],"options":{"webpackConfig":"apps/web/webpack.config.js"},"configurations":{"production":{"optimization":true},"development":{}},"defaultConfiguration":"production"}"#
        );
    }

    #[test]
    fn test_removals_keep_remaining_order() {
        let mut target = build_target();
        target.remove_configuration("production");
        target.remove_executor();

        let keys: Vec<&String> = target.as_map().keys().collect();
        assert_eq!(keys, vec!["outputs", "options", "configurations", "defaultConfiguration"]);
        assert_eq!(target.configuration_names(), vec!["development"]);
    }

    #[test]
    fn test_builders() {
        let target = TargetConfiguration::new("@nx/vite:preview-server")
            .with_option("buildTarget", "web:build")
            .with_configuration("production", Options::new())
            .with_default_configuration("production");

        assert_eq!(target.option_str("buildTarget"), Some("web:build"));
        assert!(target.configuration("production").unwrap().is_empty());
        assert!(target.has_configurations());
    }

    #[test]
    fn test_non_object_options_are_ignored() {
        let mut target: TargetConfiguration =
            serde_json::from_value(json!({ "executor": "x", "options": "oops" })).unwrap();
        assert!(target.options().is_none());
        assert!(target.options_mut().is_none());
    }
}
