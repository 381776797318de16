// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

/// Command-line arguments for `incbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "incbuild",
    version,
    about = "Incrementally build a multi-module project.",
    long_about = None
)]
#[command(group(ArgGroup::new("variant").args(["tests_only", "production_only"])))]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "incbuild.toml")]
    pub config: PathBuf,

    /// Discard all build data and outputs and build everything.
    #[arg(long, conflicts_with_all = ["module", "file", "tests_only", "production_only"])]
    pub rebuild: bool,

    /// Force recompilation of this module; may be repeated.
    #[arg(long, value_name = "NAME")]
    pub module: Vec<String>,

    /// Recompile this source file; may be repeated.
    #[arg(long, value_name = "PATH")]
    pub file: Vec<PathBuf>,

    /// Only build test sources.
    #[arg(long)]
    pub tests_only: bool,

    /// Only build production sources.
    #[arg(long)]
    pub production_only: bool,

    /// Keep building after a chunk reports errors.
    #[arg(long)]
    pub proceed_on_errors: bool,

    /// After the first build, rebuild incrementally whenever sources change.
    #[arg(long)]
    pub watch: bool,

    /// Parse and validate, print modules, chunks and steps, but build nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INCBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
