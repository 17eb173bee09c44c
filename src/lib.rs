//! # Target Migrate
//!
//! Moves build targets off an explicit executor and onto an inferred
//! plugin, rewriting legacy config files along the way.
//!
//! This crate provides:
//! - Extraction of call arguments from JavaScript/TypeScript config files
//!   (tree-sitter), without evaluating them
//! - Relocation of path literals inside those arguments
//! - Reduction of `project.json` targets to what the plugin cannot infer
//! - Generation of plugin-based config files, archiving the originals
//! - A per-project staged driver with rollback, dry runs and a report
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use target_migrate::prelude::*;
//!
//! let mut tree = Tree::open("./my-workspace");
//! let mut workspace = Workspace::discover(&tree)?;
//!
//! let report = Migration::new(MigrationProfile::webpack())
//!     .dry_run()
//!     .run(&mut tree, &mut workspace)?;
//!
//! for change in tree.changes() {
//!     println!("{}", change.diff());
//! }
//! println!("{report}");
//! # Ok::<(), target_migrate::error::MigrateError>(())
//! ```
//!
//! ## Extracting Fragments
//!
//! ```rust
//! use target_migrate::prelude::*;
//!
//! let extracted = extract(
//!     "module.exports = composePlugins(withNx({ outputPath: 'dist' }));",
//!     &["withNx", "withReact"],
//! )?;
//!
//! assert_eq!(extracted.get("withNx").unwrap().text, "{ outputPath: 'dist' }");
//! assert_eq!(extracted.absent().collect::<Vec<_>>(), vec!["withReact"]);
//! # Ok::<(), target_migrate::error::MigrateError>(())
//! ```
//!
//! ## Supported Languages
//!
//! - TypeScript/JavaScript (`.ts`, `.mts`, `.cts`, `.js`, `.mjs`, `.cjs`)
//! - TSX/JSX (`.tsx`, `.jsx`)

pub mod diff;
pub mod error;
pub mod extract;
pub mod lang;
pub mod matcher;
pub mod migrate;
pub mod process;
pub mod profile;
pub mod transform;
pub mod tree;
pub mod workspace;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::diff::DiffSummary;
    pub use crate::error::{MigrateError, Result};
    pub use crate::extract::{
        ExtractMode, ExtractedOptions, Fragment, NormalizedFragment, OptionExtractor, PathKeys,
        PathNormalizer, extract,
    };
    pub use crate::lang::{Language, LanguageRegistry, Tsx, TypeScript};
    pub use crate::matcher::{AstMatcher, FileMatcher, GitMatcher};
    pub use crate::migrate::{
        Migration, MigrationReport, ProjectStatus, UnitClass, Warning, WarningLevel,
    };
    pub use crate::process::{ProcessOutput, ScopedCommand};
    pub use crate::profile::MigrationProfile;
    pub use crate::transform::{
        ConfigSynthesizer, PluginSpec, SynthesizedFile, TargetTransformer, TransformOptions,
        TransformedTarget,
    };
    pub use crate::tree::{FileChange, Tree};
    pub use crate::workspace::{
        MigrationUnit, Options, Project, TargetConfiguration, Workspace, enumerate,
    };
}

pub use prelude::*;
