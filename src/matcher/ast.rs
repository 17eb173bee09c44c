//! AST-based code matching using tree-sitter queries.

use crate::error::Result;
use crate::lang::Language;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Query, QueryCursor, Tree};

/// A single captured node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstCapture {
    pub name: String,
    pub text: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

/// One query match: every capture the pattern produced, in capture order.
#[derive(Debug, Clone)]
pub struct AstMatch {
    pub pattern_index: usize,
    pub captures: Vec<AstCapture>,
}

impl AstMatch {
    /// Returns the first capture with the given name.
    pub fn capture(&self, name: &str) -> Option<&AstCapture> {
        self.captures.iter().find(|c| c.name == name)
    }

    /// Returns the start byte of the earliest capture.
    pub fn start_byte(&self) -> usize {
        self.captures
            .iter()
            .map(|c| c.start_byte)
            .min()
            .unwrap_or_default()
    }
}

/// AST-based matching using tree-sitter queries.
#[derive(Default, Clone)]
pub struct AstMatcher {
    queries: Vec<String>,
    capture_names: Vec<String>,
}

impl AstMatcher {
    /// Creates a new AST matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tree-sitter query pattern.
    ///
    /// Query syntax follows tree-sitter's S-expression format:
    /// - `(call_expression function: (identifier) @fn)` - captures called functions
    /// - `(pair key: (_) @key value: (string) @value)` - captures object entries
    pub fn query(mut self, pattern: impl Into<String>) -> Self {
        self.queries.push(pattern.into());
        self
    }

    /// Keeps only captures with the specified name.
    pub fn capture(mut self, name: impl Into<String>) -> Self {
        self.capture_names.push(name.into());
        self
    }

    /// Finds all matches in the given source code, ordered by position.
    pub fn find_matches(&self, source: &str, lang: &dyn Language) -> Result<Vec<AstMatch>> {
        let tree = lang.parse(source)?;
        self.find_matches_in_tree(&tree, source, lang)
    }

    /// Runs the queries against an already parsed tree.
    pub fn find_matches_in_tree(
        &self,
        tree: &Tree,
        source: &str,
        lang: &dyn Language,
    ) -> Result<Vec<AstMatch>> {
        let mut all_matches = Vec::new();

        for query_str in &self.queries {
            let query = lang.query(query_str)?;
            all_matches.extend(self.execute_query(&query, tree, source));
        }

        if !self.capture_names.is_empty() {
            for m in &mut all_matches {
                m.captures.retain(|c| self.capture_names.contains(&c.name));
            }
            all_matches.retain(|m| !m.captures.is_empty());
        }

        all_matches.sort_by_key(|m| m.start_byte());
        Ok(all_matches)
    }

    fn execute_query(&self, query: &Query, tree: &Tree, source: &str) -> Vec<AstMatch> {
        let mut cursor = QueryCursor::new();
        let source_bytes = source.as_bytes();
        let mut matches = Vec::new();

        let mut query_matches = cursor.matches(query, tree.root_node(), source_bytes);
        while let Some(query_match) = query_matches.next() {
            let captures = query_match
                .captures
                .iter()
                .map(|capture| {
                    let node = capture.node;
                    AstCapture {
                        name: query.capture_names()[capture.index as usize].to_string(),
                        text: node.utf8_text(source_bytes).unwrap_or("").to_string(),
                        start_byte: node.start_byte(),
                        end_byte: node.end_byte(),
                        start_row: node.start_position().row,
                        start_col: node.start_position().column,
                        end_row: node.end_position().row,
                        end_col: node.end_position().column,
                    }
                })
                .collect();

            matches.push(AstMatch {
                pattern_index: query_match.pattern_index,
                captures,
            });
        }

        matches
    }

    /// Returns the query strings.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::TypeScript;

    #[test]
    fn test_find_called_functions() {
        let source = r#"
const { composePlugins, withNx } = require('@nx/webpack');
module.exports = composePlugins(withNx(), (config) => config);
"#;
        let matcher = AstMatcher::new().query("(call_expression function: (identifier) @fn)");

        let matches = matcher.find_matches(source, &TypeScript).unwrap();

        let names: Vec<&str> = matches
            .iter()
            .filter_map(|m| m.capture("fn"))
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(names, vec!["require", "composePlugins", "withNx"]);
    }

    #[test]
    fn test_captures_grouped_per_match() {
        let source = "const o = { outputPath: 'dist', main: 'src/main.ts' };";
        let matcher =
            AstMatcher::new().query("(pair key: (property_identifier) @key value: (string) @value)");

        let matches = matcher.find_matches(source, &TypeScript).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].capture("key").unwrap().text, "outputPath");
        assert_eq!(matches[0].capture("value").unwrap().text, "'dist'");
        assert_eq!(matches[1].capture("key").unwrap().text, "main");
    }

    #[test]
    fn test_capture_filtering() {
        let source = "const o = { outputPath: 'dist' };";
        let matcher = AstMatcher::new()
            .query("(pair key: (property_identifier) @key value: (string) @value)")
            .capture("value");

        let matches = matcher.find_matches(source, &TypeScript).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].captures.len(), 1);
        assert_eq!(matches[0].captures[0].name, "value");
    }

    #[test]
    fn test_match_positions() {
        let source = "withNx({})";
        let matcher = AstMatcher::new().query("(call_expression function: (identifier) @fn)");

        let matches = matcher.find_matches(source, &TypeScript).unwrap();

        assert_eq!(matches.len(), 1);
        let c = matches[0].capture("fn").unwrap();
        assert_eq!(c.text, "withNx");
        assert_eq!(c.start_row, 0);
        assert_eq!(c.start_col, 0);
        assert_eq!(c.end_byte, 6);
    }

    #[test]
    fn test_empty_source() {
        let matcher = AstMatcher::new().query("(call_expression function: (identifier) @fn)");
        assert!(matcher.find_matches("", &TypeScript).unwrap().is_empty());
    }

    #[test]
    fn test_queries_getter() {
        let matcher = AstMatcher::new()
            .query("(call_expression) @call")
            .query("(new_expression) @new");
        assert_eq!(matcher.queries().len(), 2);
    }
}
