//! Matchers for workspace files, git state, and code patterns.

pub mod ast;
pub mod file;
pub mod git;

pub use ast::{AstCapture, AstMatch, AstMatcher};
pub use file::FileMatcher;
pub use git::GitMatcher;
