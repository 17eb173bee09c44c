//! CLI for target-migrate.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use target_migrate::prelude::*;

#[derive(Parser)]
#[command(name = "target-migrate")]
#[command(author, version, about = "Migrate executor targets to inferred plugins", long_about = None)]
struct Cli {
    /// Log verbosity (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every target bound to a profile's executor
    Migrate {
        /// Path to the workspace root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Built-in profile name or path to a YAML/JSON profile
        #[arg(short, long, default_value = "webpack")]
        profile: String,

        /// Only migrate this project
        #[arg(long)]
        project: Option<String>,

        /// Do not run the formatter afterwards
        #[arg(long)]
        skip_format: bool,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,

        /// Run even if the git working tree has uncommitted changes
        #[arg(long)]
        allow_dirty: bool,

        /// Formatter command run over written files
        #[arg(long)]
        formatter: Option<String>,
    },

    /// Print the first argument of named calls in a config file
    Extract {
        /// File to read
        file: PathBuf,

        /// Callee names to look for
        #[arg(short, long = "callee", required = true)]
        callees: Vec<String>,

        /// Fail if a callee is called more than once
        #[arg(long)]
        strict: bool,
    },

    /// List built-in profiles
    Profiles,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match cli.command {
        Commands::Migrate {
            path,
            profile,
            project,
            skip_format,
            dry_run,
            allow_dirty,
            formatter,
        } => cmd_migrate(path, profile, project, skip_format, dry_run, allow_dirty, formatter),
        Commands::Extract {
            file,
            callees,
            strict,
        } => cmd_extract(file, callees, strict),
        Commands::Profiles => cmd_profiles(),
    }
}

fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn cmd_migrate(
    path: PathBuf,
    profile: String,
    project: Option<String>,
    skip_format: bool,
    dry_run: bool,
    allow_dirty: bool,
    formatter: Option<String>,
) -> Result<()> {
    let profile = MigrationProfile::resolve(&profile).context("Failed to load profile")?;

    if !allow_dirty && !dry_run {
        let dirty = GitMatcher::new()
            .uncommitted(&path)
            .context("Failed to read git status")?;
        if !dirty.is_empty() {
            bail!(
                "{} has {} uncommitted change(s); commit them or pass --allow-dirty",
                path.display(),
                dirty.len()
            );
        }
    }

    let mut tree = Tree::open(&path);
    let mut workspace = Workspace::discover(&tree).context("Failed to read workspace projects")?;

    let mut migration = Migration::new(profile);
    if let Some(name) = project {
        migration = migration.project(name);
    }
    if skip_format {
        migration = migration.skip_format();
    }
    if dry_run {
        migration = migration.dry_run();
    }
    if let Some(command) = formatter {
        let command = ScopedCommand::parse(&command).context("Formatter command is empty")?;
        migration = migration.formatter(command);
    }

    let report = migration
        .run(&mut tree, &mut workspace)
        .context("Migration failed")?;

    if dry_run {
        for change in tree.changes() {
            println!("{}", change.colorized_diff());
        }
    }
    print!("{report}");

    Ok(())
}

fn cmd_extract(file: PathBuf, callees: Vec<String>, strict: bool) -> Result<()> {
    let tree = Tree::open(".");
    let mut extractor = OptionExtractor::new().callees(callees);
    if strict {
        extractor = extractor.strict();
    }

    let extracted = extractor
        .extract_file(&tree, &file)
        .with_context(|| format!("Failed to extract from {}", file.display()))?;

    for (callee, fragment) in extracted.iter() {
        match fragment {
            Some(f) => println!("{} (line {}):\n{}\n", callee, f.line, f.text),
            None => println!("{}: absent\n", callee),
        }
    }

    Ok(())
}

fn cmd_profiles() -> Result<()> {
    println!("Built-in profiles:\n");
    for profile in MigrationProfile::builtins() {
        println!("  {:<14} {}", profile.name, profile.executor);
        if !profile.description.is_empty() {
            println!("  {:<14} {}", "", profile.description);
        }
    }
    Ok(())
}
