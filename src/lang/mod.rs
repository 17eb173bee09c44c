//! Language abstraction for parsing legacy config sources.

mod typescript;

pub use typescript::{Tsx, TypeScript};

use crate::error::{MigrateError, Result};
use std::path::Path;
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, Tree};

/// A source language the extractor can parse.
pub trait Language: Send + Sync {
    /// Returns the name of the language.
    fn name(&self) -> &'static str;

    /// Returns the file extensions associated with this language.
    fn extensions(&self) -> &[&'static str];

    /// Returns the tree-sitter language grammar.
    fn grammar(&self) -> TsLanguage;

    /// Parses source code into a tree-sitter AST.
    ///
    /// Tree-sitter recovers from syntax errors by inserting ERROR and
    /// MISSING nodes; a tree containing either is rejected, since the
    /// extracted fragments must be re-emittable as valid source.
    fn parse(&self, source: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| MigrateError::parse("<source>", format!("Failed to set language: {e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| MigrateError::parse("<source>", "Failed to parse source"))?;

        if let Some(bad) = first_error(tree.root_node()) {
            let position = bad.start_position();
            let message = if bad.is_missing() {
                format!("missing '{}'", bad.kind())
            } else {
                "unexpected syntax".to_string()
            };
            return Err(MigrateError::Parse {
                path: Path::new("<source>").to_path_buf(),
                line: position.row + 1,
                column: position.column + 1,
                message,
            });
        }

        Ok(tree)
    }

    /// Creates a tree-sitter query for this language.
    fn query(&self, pattern: &str) -> Result<Query> {
        Ok(Query::new(&self.grammar(), pattern)?)
    }

    /// Checks if this language handles the given file extension.
    fn matches_extension(&self, ext: &str) -> bool {
        self.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Finds the first ERROR or MISSING node in pre-order.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    if !root.has_error() {
        return None;
    }

    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        // Only descend into subtrees that actually contain the error.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Registry of supported languages.
#[derive(Default)]
pub struct LanguageRegistry {
    languages: Vec<Box<dyn Language>>,
}

impl LanguageRegistry {
    /// Creates a new registry with all built-in languages.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(TypeScript));
        registry.register(Box::new(Tsx));
        registry
    }

    /// Registers a new language.
    pub fn register(&mut self, lang: Box<dyn Language>) {
        self.languages.push(lang);
    }

    /// Finds a language by file extension.
    pub fn by_extension(&self, ext: &str) -> Option<&dyn Language> {
        self.languages
            .iter()
            .find(|l| l.matches_extension(ext))
            .map(|l| l.as_ref())
    }

    /// Finds a language by name.
    pub fn by_name(&self, name: &str) -> Option<&dyn Language> {
        self.languages
            .iter()
            .find(|l| l.name().eq_ignore_ascii_case(name))
            .map(|l| l.as_ref())
    }

    /// Detects the language for a given file path.
    pub fn detect(&self, path: &Path) -> Option<&dyn Language> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension(ext))
    }

    /// Detects the language for a path or fails with `UnsupportedLanguage`.
    pub fn require(&self, path: &Path) -> Result<&dyn Language> {
        self.detect(path).ok_or_else(|| {
            MigrateError::UnsupportedLanguage(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            )
        })
    }

    /// Returns all registered languages.
    pub fn all(&self) -> &[Box<dyn Language>] {
        &self.languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_config_extensions() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.detect(Path::new("webpack.config.js")).map(|l| l.name()),
            Some("typescript")
        );
        assert_eq!(
            registry.detect(Path::new("vite.config.mts")).map(|l| l.name()),
            Some("typescript")
        );
        assert_eq!(
            registry.detect(Path::new("app.jsx")).map(|l| l.name()),
            Some("tsx")
        );
        assert!(registry.detect(Path::new("project.json")).is_none());
    }

    #[test]
    fn test_require_unsupported() {
        let registry = LanguageRegistry::new();
        let err = registry.require(Path::new("build.gradle")).err();
        assert!(matches!(err, Some(MigrateError::UnsupportedLanguage(ext)) if ext == "gradle"));
    }

    #[test]
    fn test_parse_valid_source() {
        let tree = TypeScript
            .parse("const { withNx } = require('@nx/webpack');\nmodule.exports = withNx({});\n")
            .unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_parse_rejects_broken_source() {
        let err = TypeScript.parse("module.exports = withNx({ outputPath: );").unwrap_err();
        match err {
            MigrateError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_by_name() {
        let registry = LanguageRegistry::new();
        assert!(registry.by_name("TypeScript").is_some());
        assert!(registry.by_name("python").is_none());
    }
}
