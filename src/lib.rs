// src/lib.rs

pub mod builders;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod fs_state;
pub mod logging;
pub mod messages;
pub mod project;
pub mod scope;
pub mod storage;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::builders::{BuildStepProvider, BuilderRegistry};
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::ConfigFile;
use crate::engine::{BuildReport, ProjectBuilder, ProjectDescriptor};
use crate::errors::BuildError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::project::{BuildTarget, Project};
use crate::scope::CompileScope;
use crate::types::Variant;

/// Source name of messages produced by the engine itself.
pub const ENGINE_NAME: &str = "incbuild";

const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// How a build treats existing build data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Dirty files only.
    Make,
    /// Everything, from scratch.
    Rebuild,
    /// Named modules and files, regardless of their state.
    Forced,
}

impl BuildMode {
    fn is_make(self) -> bool {
        self == BuildMode::Make
    }

    fn is_rebuild(self) -> bool {
        self == BuildMode::Rebuild
    }
}

/// High-level entry point used by `main.rs`. Returns whether the build
/// succeeded.
///
/// This wires together:
/// - config loading
/// - the project model and build steps
/// - Ctrl-C handling
/// - (optional) the file watcher
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_and_validate(&args.config)?;
    let project = cfg.to_project()?;
    let provider = cfg.step_provider()?;
    let registry = BuilderRegistry::from_providers([&provider as &dyn BuildStepProvider]);

    if args.dry_run {
        print_dry_run(&cfg, &project, &registry);
        return Ok(true);
    }

    let (scope, mode) = scope_from_args(&args, &project)?;
    let watch_roots: Vec<PathBuf> = project
        .roots()
        .all()
        .iter()
        .map(|rd| rd.root.clone())
        .collect();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let descriptor = ProjectDescriptor::new(project, fs, cfg.data_dir())
        .proceed_on_errors(cfg.project.proceed_on_errors || args.proceed_on_errors)
        .use_hash(cfg.project.use_hash);
    let builder = ProjectBuilder::new(descriptor, registry);

    // Ctrl-C → cancel the running build and leave watch mode.
    let shutdown = Arc::new(Notify::new());
    {
        let cancel = builder.cancel_token();
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received, canceling build");
            cancel.cancel();
            shutdown.notify_one();
        });
    }

    let (mut builder, outcome) = run_build(builder, scope, mode).await?;
    let mut success = summarize(&outcome);
    if !args.watch || matches!(outcome, Err(BuildError::Canceled)) {
        return Ok(success);
    }

    let (changes_tx, mut changes_rx) = mpsc::channel::<Vec<PathBuf>>(16);
    let _watcher = watch::spawn_watcher(watch_roots, WATCH_DEBOUNCE, changes_tx)?;
    info!("watching for changes, press Ctrl+C to stop");

    loop {
        tokio::select! {
            batch = changes_rx.recv() => {
                let Some(paths) = batch else {
                    break;
                };
                let accepted = builder.notify_changed(paths.iter().map(PathBuf::as_path))?;
                if accepted == 0 {
                    continue;
                }
                let (next, outcome) =
                    run_build(builder, CompileScope::all(false), BuildMode::Make).await?;
                builder = next;
                success = summarize(&outcome);
                if matches!(outcome, Err(BuildError::Canceled)) {
                    break;
                }
            }
            _ = shutdown.notified() => break,
        }
    }
    Ok(success)
}

/// Run one build on a blocking thread, handing the builder back afterwards.
async fn run_build(
    mut builder: ProjectBuilder,
    scope: CompileScope,
    mode: BuildMode,
) -> Result<(ProjectBuilder, errors::Result<BuildReport>)> {
    debug!(?mode, "starting build");
    let handle = tokio::task::spawn_blocking(move || {
        let outcome = builder.build(&scope, mode.is_make(), mode.is_rebuild());
        (builder, outcome)
    });
    handle.await.context("build thread panicked")
}

fn summarize(outcome: &errors::Result<BuildReport>) -> bool {
    match outcome {
        Ok(report) => {
            info!(
                state = %report.state,
                built = report.chunks_built.len(),
                up_to_date = report.chunks_up_to_date.len(),
                retried_as_rebuild = report.retried_as_rebuild,
                "build summary"
            );
            if report.errors_found {
                warn!("build finished with errors");
            }
            report.is_success()
        }
        Err(_) => false,
    }
}

/// Translate CLI flags into a compile scope and build mode.
pub fn scope_from_args(args: &CliArgs, project: &Project) -> Result<(CompileScope, BuildMode)> {
    let variants: &[Variant] = if args.tests_only {
        &[Variant::Test]
    } else if args.production_only {
        &[Variant::Production]
    } else {
        &Variant::ALL
    };

    if args.rebuild {
        return Ok((CompileScope::all(true), BuildMode::Rebuild));
    }

    if args.module.is_empty() && args.file.is_empty() {
        let mut builder = CompileScope::builder();
        for &variant in variants {
            builder = builder.variant(variant);
        }
        return Ok((builder.build(), BuildMode::Make));
    }

    let mut builder = CompileScope::builder();
    for name in &args.module {
        if project.module(name).is_none() {
            anyhow::bail!("unknown module '{name}'");
        }
        for &variant in variants {
            builder = builder.forced_target(BuildTarget::new(name.clone(), variant));
        }
    }
    for file in &args.file {
        let path = absolute(file)?;
        let rd = project
            .roots()
            .root_for_file(&path)
            .with_context(|| format!("{} is not under any source root", path.display()))?;
        if variants.contains(&rd.target.variant) {
            builder = builder.file(rd.target.clone(), path);
        }
    }
    Ok((builder.build(), BuildMode::Forced))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolving the working directory")?;
    Ok(cwd.join(path))
}

/// Print modules, chunks and steps without building anything.
fn print_dry_run(cfg: &ConfigFile, project: &Project, registry: &BuilderRegistry) {
    println!("incbuild dry-run");
    println!("  data_dir = {}", cfg.data_dir().display());
    println!("  proceed_on_errors = {}", cfg.project.proceed_on_errors);
    println!("  use_hash = {}", cfg.project.use_hash);
    println!();

    println!("modules ({}):", cfg.module.len());
    for module in project.modules() {
        println!("  - {}", module.name);
        for root in &module.roots {
            let kind = if root.is_test { "tests" } else { "sources" };
            println!("      {kind}: {}", root.path.display());
        }
        println!("      output: {}", module.output.display());
        println!("      test_output: {}", module.test_output.display());
        if !module.dependencies.is_empty() {
            let deps: Vec<&str> = module.dependencies.iter().map(|d| d.module.as_str()).collect();
            println!("      deps: {deps:?}");
        }
    }
    println!();

    for variant in Variant::ALL {
        let chunks = project.chunks().for_variant(variant);
        println!("{variant} chunks ({}):", chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            println!("  {}. {}", i + 1, chunk.name());
        }
    }
    println!();

    println!("steps ({}):", registry.total_builder_count());
    for step in registry.all_steps() {
        println!("  - {} [{}]", step.name(), step.category());
    }

    debug!("dry-run complete (no build)");
}
