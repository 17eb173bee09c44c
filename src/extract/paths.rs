//! Relocation of path literals inside extracted fragments.
//!
//! Options passed to `withNx(...)` are resolved from the workspace root,
//! while the same options passed to a plugin constructor are resolved from
//! the project root. Moving a fragment between the two hosts therefore has
//! to rewrite every path-valued literal it contains.

use super::Fragment;
use crate::lang::{Language, TypeScript};
use crate::matcher::AstMatcher;
use indexmap::IndexSet;
use path_slash::PathExt;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid regex"));

const STRING_PAIR_QUERY: &str =
    "(pair key: [(property_identifier) (string)] @key value: (string) @value)";
const ARRAY_PAIR_QUERY: &str =
    "(pair key: [(property_identifier) (string)] @key value: (array (string) @value))";

/// Option keys whose string values are filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKeys(IndexSet<String>);

impl PathKeys {
    /// An empty allow-list.
    pub fn none() -> Self {
        Self(IndexSet::new())
    }

    /// Adds a key.
    pub fn with(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into());
        self
    }

    /// Returns true if values under `key` are paths.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Iterates the keys in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for PathKeys {
    fn default() -> Self {
        [
            "outputPath",
            "index",
            "main",
            "tsConfig",
            "polyfills",
            "postcssConfig",
            "babelConfig",
            "styles",
            "scripts",
            "assets",
            "input",
            "replace",
            "with",
            "includePaths",
            "entryPath",
            "staticFilePath",
            "proxyConfig",
        ]
        .into_iter()
        .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PathKeys {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A fragment after path relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFragment {
    pub fragment: Fragment,
    /// `(old, new)` for every literal that was rewritten.
    pub rewritten: Vec<(String, String)>,
    /// Path literals that could not be re-expressed and were left as-is.
    pub unresolved: Vec<String>,
}

/// Rewrites path literals so they stay correct under a new host directory.
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    keys: PathKeys,
}

impl PathNormalizer {
    /// Creates a normalizer with the default key allow-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer with a custom key allow-list.
    pub fn with_keys(keys: PathKeys) -> Self {
        Self { keys }
    }

    /// Returns the key allow-list.
    pub fn keys(&self) -> &PathKeys {
        &self.keys
    }

    /// Relocates the path literals of `fragment` from `old_host` to
    /// `new_host`. Never fails: anything that cannot be handled is copied
    /// unchanged, and unresolvable paths are listed for the caller.
    pub fn normalize(&self, fragment: &Fragment, old_host: &Path, new_host: &Path) -> NormalizedFragment {
        let unchanged = || NormalizedFragment {
            fragment: fragment.clone(),
            rewritten: Vec::new(),
            unresolved: Vec::new(),
        };

        if fragment.is_empty() || self.keys.0.is_empty() {
            return unchanged();
        }

        // Parenthesized so an object literal parses as an expression, not a block.
        let wrapped = format!("({})", fragment.text);
        let offset = 1;

        let matcher = AstMatcher::new().query(STRING_PAIR_QUERY).query(ARRAY_PAIR_QUERY);
        let Ok(matches) = matcher.find_matches(&wrapped, &TypeScript as &dyn Language) else {
            return unchanged();
        };

        let mut edits: Vec<(usize, usize, String)> = Vec::new();
        let mut rewritten = Vec::new();
        let mut unresolved = Vec::new();

        for m in &matches {
            let (Some(key), Some(value)) = (m.capture("key"), m.capture("value")) else {
                continue;
            };
            if !self.keys.contains(unquote(&key.text)) {
                continue;
            }
            if edits.iter().any(|(start, _, _)| *start == value.start_byte - offset) {
                continue;
            }

            let Some((quote, literal)) = split_literal(&value.text) else {
                continue;
            };
            if !is_relocatable(literal) {
                continue;
            }

            match rebase(literal, old_host, new_host) {
                Some(relocated) if relocated != literal => {
                    edits.push((
                        value.start_byte - offset,
                        value.end_byte - offset,
                        format!("{quote}{relocated}{quote}"),
                    ));
                    rewritten.push((literal.to_string(), relocated));
                }
                Some(_) => {}
                None => unresolved.push(literal.to_string()),
            }
        }

        let mut text = fragment.text.clone();
        edits.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end, replacement) in edits {
            text.replace_range(start..end, &replacement);
        }

        NormalizedFragment {
            fragment: fragment.with_text(text),
            rewritten,
            unresolved,
        }
    }
}

/// Re-expresses `path`, relative to `old_host`, as a path relative to
/// `new_host`. Returns `None` if the path climbs out of the tree.
pub fn rebase(path: &str, old_host: &Path, new_host: &Path) -> Option<String> {
    let trailing_slash = path.len() > 1 && path.ends_with('/');
    let target = lexical_normalize(&old_host.join(path))?;
    let base = lexical_normalize(new_host)?;

    let relative = pathdiff::diff_paths(&target, &base)?;
    let mut rendered = if relative.as_os_str().is_empty() {
        ".".to_string()
    } else {
        relative.to_slash_lossy().into_owned()
    };
    if trailing_slash && !rendered.ends_with('/') {
        rendered.push('/');
    }
    Some(rendered)
}

/// Resolves `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

fn unquote(key: &str) -> &str {
    split_literal(key).map(|(_, inner)| inner).unwrap_or(key)
}

/// Splits a quoted string literal into its quote char and contents.
fn split_literal(text: &str) -> Option<(char, &str)> {
    let quote = text.chars().next()?;
    if !matches!(quote, '\'' | '"') || text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    Some((quote, &text[1..text.len() - 1]))
}

fn is_relocatable(literal: &str) -> bool {
    !literal.is_empty()
        && !literal.contains('\\')
        && !literal.starts_with('/')
        && !Path::new(literal).is_absolute()
        && !URL_SCHEME.is_match(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> Fragment {
        Fragment {
            callee: "withNx".to_string(),
            text: text.to_string(),
            source: PathBuf::from("apps/web/webpack.config.js"),
            start_byte: 0,
            end_byte: text.len(),
            line: 1,
        }
    }

    fn resolve(host: &Path, path: &str) -> PathBuf {
        lexical_normalize(&host.join(path)).unwrap()
    }

    #[test]
    fn test_rewrites_allow_listed_string_values() {
        let normalized = PathNormalizer::new().normalize(
            &fragment("{ outputPath: 'dist/apps/web', main: \"apps/web/src/main.ts\", compiler: 'babel' }"),
            Path::new(""),
            Path::new("apps/web"),
        );

        assert_eq!(
            normalized.fragment.text,
            "{ outputPath: '../../dist/apps/web', main: \"src/main.ts\", compiler: 'babel' }"
        );
        assert_eq!(normalized.rewritten.len(), 2);
        assert!(normalized.unresolved.is_empty());
    }

    #[test]
    fn test_rewrites_array_elements_and_nested_objects() {
        let normalized = PathNormalizer::new().normalize(
            &fragment("{ assets: ['apps/web/src/favicon.ico', { input: 'libs/shared/assets', glob: '**/*', output: 'assets' }] }"),
            Path::new(""),
            Path::new("apps/web"),
        );

        assert_eq!(
            normalized.fragment.text,
            "{ assets: ['src/favicon.ico', { input: '../../libs/shared/assets', glob: '**/*', output: 'assets' }] }"
        );
    }

    #[test]
    fn test_quoted_keys_are_recognized() {
        let normalized = PathNormalizer::new().normalize(
            &fragment("{ 'tsConfig': 'apps/web/tsconfig.app.json' }"),
            Path::new(""),
            Path::new("apps/web"),
        );
        assert_eq!(normalized.fragment.text, "{ 'tsConfig': 'tsconfig.app.json' }");
    }

    #[test]
    fn test_leaves_non_path_values_alone() {
        let text = "{ outputPath: `dist/${name}`, index: '/abs/index.html', baseHref: '/', proxyConfig: 'http://localhost:3000/api', styles: [] }";
        let normalized =
            PathNormalizer::new().normalize(&fragment(text), Path::new(""), Path::new("apps/web"));

        assert_eq!(normalized.fragment.text, text);
        assert!(normalized.rewritten.is_empty());
    }

    #[test]
    fn test_escaping_path_is_reported_unresolved() {
        let text = "{ outputPath: '../../outside' }";
        let normalized =
            PathNormalizer::new().normalize(&fragment(text), Path::new(""), Path::new("apps/web"));

        assert_eq!(normalized.fragment.text, text);
        assert_eq!(normalized.unresolved, vec!["../../outside".to_string()]);
    }

    #[test]
    fn test_custom_key_allow_list() {
        let normalizer = PathNormalizer::with_keys(PathKeys::none().with("sourceRoot"));
        let normalized = normalizer.normalize(
            &fragment("{ sourceRoot: 'apps/web/src', outputPath: 'dist' }"),
            Path::new(""),
            Path::new("apps/web"),
        );
        assert_eq!(normalized.fragment.text, "{ sourceRoot: 'src', outputPath: 'dist' }");
    }

    #[test]
    fn test_empty_and_unparseable_fragments_pass_through() {
        let normalizer = PathNormalizer::new();

        let empty = normalizer.normalize(&fragment(""), Path::new(""), Path::new("apps/web"));
        assert_eq!(empty.fragment.text, "");

        let broken = normalizer.normalize(&fragment("{ outputPath: "), Path::new(""), Path::new("apps/web"));
        assert_eq!(broken.fragment.text, "{ outputPath: ");
    }

    #[test]
    fn test_rebase_round_trips_through_new_host() {
        let old_host = Path::new("");
        let new_host = Path::new("apps/web");
        for p in ["dist/apps/web", "apps/web/src/main.ts", "apps/web", "./libs/ui/../ui/index.ts", "apps/web/assets/"] {
            let rebased = rebase(p, old_host, new_host).unwrap();
            assert_eq!(
                resolve(new_host, &rebased),
                resolve(old_host, p),
                "{p} -> {rebased}"
            );
        }
    }

    #[test]
    fn test_rebase_between_sibling_hosts() {
        assert_eq!(
            rebase("../shared/proxy.conf.json", Path::new("apps/web"), Path::new("apps/admin")).unwrap(),
            "../shared/proxy.conf.json"
        );
        assert_eq!(rebase("apps/web", Path::new(""), Path::new("apps/web")).unwrap(), ".");
        assert_eq!(rebase("apps/web/assets/", Path::new(""), Path::new("apps/web")).unwrap(), "assets/");
    }

    #[test]
    fn test_default_keys_include_preview_options() {
        let keys = PathKeys::default();
        assert!(keys.contains("staticFilePath"));
        assert!(keys.contains("proxyConfig"));
        assert!(!keys.contains("buildTarget"));
    }
}
