//! Extraction of call-argument fragments from legacy config sources.
//!
//! A legacy config file such as
//!
//! ```js
//! const { composePlugins, withNx } = require('@nx/webpack');
//! module.exports = composePlugins(withNx({ outputPath: 'dist/apps/web' }), (config) => config);
//! ```
//!
//! carries its real configuration as the literal argument of a known
//! call. The extractor finds that call without evaluating anything and
//! hands back the argument as an opaque, verbatim [`Fragment`].
//!
//! ```rust
//! use target_migrate::extract::OptionExtractor;
//! use target_migrate::lang::TypeScript;
//!
//! let source = "module.exports = withNx({ outputPath: 'dist' });";
//! let extracted = OptionExtractor::new()
//!     .callee("withNx")
//!     .callee("withReact")
//!     .extract(source, &TypeScript)?;
//!
//! assert_eq!(extracted.get("withNx").unwrap().text, "{ outputPath: 'dist' }");
//! assert!(extracted.get("withReact").is_none());
//! # Ok::<(), target_migrate::error::MigrateError>(())
//! ```

pub mod paths;

pub use paths::{NormalizedFragment, PathKeys, PathNormalizer};

use crate::error::{MigrateError, Result};
use crate::lang::{Language, LanguageRegistry, TypeScript};
use crate::tree::Tree;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// The verbatim first argument of a matched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Name of the matched callee.
    pub callee: String,
    /// Source text of the argument, byte-for-byte.
    pub text: String,
    /// File the fragment was extracted from.
    pub source: PathBuf,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-based line of the matched call.
    pub line: usize,
}

impl Fragment {
    /// Returns true if the call had no arguments.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns a copy with different text, keeping provenance.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// How to treat several calls to the same callee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractMode {
    /// Use the first call in pre-order.
    #[default]
    FirstMatch,
    /// Fail with `AmbiguousMatch` when a callee is called more than once.
    Strict,
}

/// Extraction results keyed by requested callee, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedOptions {
    entries: IndexMap<String, Option<Fragment>>,
}

impl ExtractedOptions {
    /// Returns the fragment for `callee`, or `None` if it was absent.
    pub fn get(&self, callee: &str) -> Option<&Fragment> {
        self.entries.get(callee).and_then(Option::as_ref)
    }

    /// Replaces the fragment for a callee that was requested.
    pub fn set(&mut self, callee: &str, fragment: Option<Fragment>) {
        if let Some(slot) = self.entries.get_mut(callee) {
            *slot = fragment;
        }
    }

    /// Requested callees that had no matching call.
    pub fn absent(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, f)| f.is_none())
            .map(|(name, _)| name.as_str())
    }

    /// All entries in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Fragment>)> {
        self.entries
            .iter()
            .map(|(name, f)| (name.as_str(), f.as_ref()))
    }

    /// Number of requested callees.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Finds call expressions by callee name and captures their first argument.
#[derive(Default)]
pub struct OptionExtractor {
    callees: Vec<String>,
    mode: ExtractMode,
    registry: LanguageRegistry,
}

impl OptionExtractor {
    /// Creates an extractor with no callees.
    pub fn new() -> Self {
        Self {
            callees: Vec::new(),
            mode: ExtractMode::default(),
            registry: LanguageRegistry::new(),
        }
    }

    /// Requests a callee name.
    pub fn callee(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.callees.contains(&name) {
            self.callees.push(name);
        }
        self
    }

    /// Requests several callee names.
    pub fn callees(self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        names.into_iter().fold(self, |e, n| e.callee(n))
    }

    /// Sets how repeated calls are handled.
    pub fn mode(mut self, mode: ExtractMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fails instead of picking the first of several matching calls.
    pub fn strict(self) -> Self {
        self.mode(ExtractMode::Strict)
    }

    /// Extracts fragments from in-memory source text.
    pub fn extract(&self, source: &str, lang: &dyn Language) -> Result<ExtractedOptions> {
        self.extract_from(source, lang, Path::new("<source>"))
    }

    /// Reads `path` through the tree and extracts fragments from it.
    pub fn extract_file(&self, tree: &Tree, path: &Path) -> Result<ExtractedOptions> {
        let lang = self.registry.require(path)?;
        let source = tree.read(path)?;
        self.extract_from(&source, lang, path)
            .map_err(|e| e.at_path(path))
    }

    fn extract_from(&self, source: &str, lang: &dyn Language, path: &Path) -> Result<ExtractedOptions> {
        let tree = lang.parse(source)?;

        let mut found: IndexMap<String, Vec<Fragment>> = self
            .callees
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();

        visit_calls(tree.root_node(), source, |callee, arguments, line| {
            let Some(hits) = found.get_mut(callee) else {
                return;
            };
            if self.mode == ExtractMode::FirstMatch && !hits.is_empty() {
                return;
            }
            let (text, start_byte, end_byte) = match arguments.and_then(first_argument) {
                Some(arg) => (
                    source[arg.start_byte()..arg.end_byte()].to_string(),
                    arg.start_byte(),
                    arg.end_byte(),
                ),
                None => {
                    let at = arguments.map(|a| a.start_byte()).unwrap_or_default();
                    (String::new(), at, at)
                }
            };
            hits.push(Fragment {
                callee: callee.to_string(),
                text,
                source: path.to_path_buf(),
                start_byte,
                end_byte,
                line,
            });
        });

        let mut entries = IndexMap::new();
        for (callee, mut hits) in found {
            if self.mode == ExtractMode::Strict && hits.len() > 1 {
                return Err(MigrateError::AmbiguousMatch {
                    path: path.to_path_buf(),
                    callee,
                    count: hits.len(),
                });
            }
            let first = if hits.is_empty() {
                None
            } else {
                Some(hits.swap_remove(0))
            };
            entries.insert(callee, first);
        }

        Ok(ExtractedOptions { entries })
    }
}

/// Extracts the first-argument fragment of each named call from a
/// JavaScript or TypeScript source.
pub fn extract(source: &str, callees: &[&str]) -> Result<ExtractedOptions> {
    OptionExtractor::new()
        .callees(callees.iter().copied())
        .extract(source, &TypeScript)
}

/// Walks the tree in pre-order, reporting every call or constructor
/// expression whose callee is a bare identifier.
fn visit_calls<'t, F>(root: Node<'t>, source: &str, mut visit: F)
where
    F: FnMut(&str, Option<Node<'t>>, usize),
{
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        let callee_field = match node.kind() {
            "call_expression" => Some("function"),
            "new_expression" => Some("constructor"),
            _ => None,
        };

        if let Some(field) = callee_field
            && let Some(callee) = node.child_by_field_name(field)
            && callee.kind() == "identifier"
        {
            let name = &source[callee.start_byte()..callee.end_byte()];
            let arguments = node.child_by_field_name("arguments");
            visit(name, arguments, node.start_position().row + 1);
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// First argument of an `arguments` node, skipping comments.
fn first_argument(arguments: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = arguments.walk();
    let first = arguments
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBPACK_CONFIG: &str = r#"const { composePlugins, withNx } = require('@nx/webpack');
const { withReact } = require('@nx/react');

module.exports = composePlugins(
  withNx({
    outputPath: 'dist/apps/web',
    main: 'apps/web/src/main.tsx',
    assets: ['apps/web/src/favicon.ico'],
  }),
  withReact({ svgr: false }),
  (config) => config
);
"#;

    #[test]
    fn test_extracts_first_argument_verbatim() {
        let extracted = extract(WEBPACK_CONFIG, &["withNx", "withReact"]).unwrap();

        let with_nx = extracted.get("withNx").unwrap();
        assert!(with_nx.text.starts_with("{\n    outputPath: 'dist/apps/web',"));
        assert!(with_nx.text.ends_with("],\n  }"));
        assert_eq!(with_nx.line, 5);
        assert_eq!(
            &WEBPACK_CONFIG[with_nx.start_byte..with_nx.end_byte],
            with_nx.text
        );

        assert_eq!(extracted.get("withReact").unwrap().text, "{ svgr: false }");
    }

    #[test]
    fn test_absent_callee_is_not_an_error() {
        let extracted = extract(WEBPACK_CONFIG, &["withNx", "withModuleFederation"]).unwrap();

        assert!(extracted.get("withModuleFederation").is_none());
        assert_eq!(extracted.absent().collect::<Vec<_>>(), vec!["withModuleFederation"]);
        assert_eq!(extracted.len(), 2);
    }

    #[test]
    fn test_call_without_arguments_is_present_but_empty() {
        let extracted = extract("module.exports = composePlugins(withNx());", &["withNx"]).unwrap();

        let fragment = extracted.get("withNx").unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_first_match_in_pre_order_wins() {
        let source = r#"
const base = withNx({ outputPath: 'first' });
if (process.env.CI) {
  module.exports = withNx({ outputPath: 'second' });
}
"#;
        let extracted = extract(source, &["withNx"]).unwrap();
        assert_eq!(
            extracted.get("withNx").unwrap().text,
            "{ outputPath: 'first' }"
        );
    }

    #[test]
    fn test_outer_call_precedes_nested_call() {
        let source = "withNx(withNx({ inner: true }));";
        let extracted = extract(source, &["withNx"]).unwrap();
        assert_eq!(
            extracted.get("withNx").unwrap().text,
            "withNx({ inner: true })"
        );
    }

    #[test]
    fn test_strict_mode_rejects_repeated_calls() {
        let source = "withNx({ a: 1 }); withNx({ a: 2 });";
        let err = OptionExtractor::new()
            .callee("withNx")
            .strict()
            .extract(source, &TypeScript)
            .unwrap_err();

        assert!(matches!(err, MigrateError::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn test_strict_mode_accepts_single_call() {
        let extracted = OptionExtractor::new()
            .callee("withNx")
            .strict()
            .extract("withNx({ a: 1 });", &TypeScript)
            .unwrap();
        assert_eq!(extracted.get("withNx").unwrap().text, "{ a: 1 }");
    }

    #[test]
    fn test_matches_constructor_expressions() {
        let source = "module.exports = { plugins: [new NxAppWebpackPlugin({ outputPath: 'dist' })] };";
        let extracted = extract(source, &["NxAppWebpackPlugin"]).unwrap();
        assert_eq!(
            extracted.get("NxAppWebpackPlugin").unwrap().text,
            "{ outputPath: 'dist' }"
        );
    }

    #[test]
    fn test_member_callee_does_not_match() {
        let extracted = extract("nx.withNx({ a: 1 });", &["withNx"]).unwrap();
        assert!(extracted.get("withNx").is_none());
    }

    #[test]
    fn test_comments_before_argument_are_skipped() {
        let extracted = extract("withNx(/* options */ { a: 1 });", &["withNx"]).unwrap();
        assert_eq!(extracted.get("withNx").unwrap().text, "{ a: 1 }");
    }

    #[test]
    fn test_non_literal_argument_is_opaque_text() {
        let extracted = extract("withNx(buildOptions(env));", &["withNx"]).unwrap();
        assert_eq!(extracted.get("withNx").unwrap().text, "buildOptions(env)");
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = extract("module.exports = withNx({ outputPath: });", &["withNx"]).unwrap_err();
        assert!(matches!(err, MigrateError::Parse { .. }));
    }

    #[test]
    fn test_extract_file_reads_through_tree() {
        let mut tree = Tree::in_memory();
        tree.write("apps/web/webpack.config.js", WEBPACK_CONFIG).unwrap();

        let extracted = OptionExtractor::new()
            .callee("withReact")
            .extract_file(&tree, Path::new("apps/web/webpack.config.js"))
            .unwrap();

        let fragment = extracted.get("withReact").unwrap();
        assert_eq!(fragment.source, Path::new("apps/web/webpack.config.js"));
    }

    #[test]
    fn test_extract_file_rehomes_parse_error() {
        let mut tree = Tree::in_memory();
        tree.write("apps/web/webpack.config.js", "withNx({").unwrap();

        let err = OptionExtractor::new()
            .callee("withNx")
            .extract_file(&tree, Path::new("apps/web/webpack.config.js"))
            .unwrap_err();

        assert!(matches!(err, MigrateError::Parse { path, .. } if path == Path::new("apps/web/webpack.config.js")));
    }

    #[test]
    fn test_set_replaces_requested_entry_only() {
        let mut extracted = extract("withNx({ a: 1 });", &["withNx"]).unwrap();
        let replaced = extracted.get("withNx").unwrap().with_text("{ a: 2 }");

        extracted.set("withNx", Some(replaced));
        extracted.set("withReact", None);

        assert_eq!(extracted.get("withNx").unwrap().text, "{ a: 2 }");
        assert_eq!(extracted.len(), 1);
    }
}
