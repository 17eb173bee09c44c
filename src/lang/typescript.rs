//! TypeScript and JavaScript language support.

use super::Language;
use tree_sitter::Language as TsLanguage;

/// TypeScript and plain JavaScript config sources.
///
/// The TypeScript grammar is a superset of the JavaScript that build
/// config files are written in, so one grammar covers both.
pub struct TypeScript;

impl Language for TypeScript {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &[&'static str] {
        &["ts", "mts", "cts", "js", "mjs", "cjs"]
    }

    fn grammar(&self) -> TsLanguage {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }
}

/// TSX and JSX sources.
pub struct Tsx;

impl Language for Tsx {
    fn name(&self) -> &'static str {
        "tsx"
    }

    fn extensions(&self) -> &[&'static str] {
        &["tsx", "jsx"]
    }

    fn grammar(&self) -> TsLanguage {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }
}
