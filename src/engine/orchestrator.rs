// src/engine/orchestrator.rs

//! Drives a build: phases, chunks, categories and passes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::builders::{BuilderCategory, BuilderRegistry, ExitCode, ProjectTask};
use crate::dag::ModuleChunk;
use crate::engine::cancel::CancelToken;
use crate::engine::context::{CompileContext, ContextOptions};
use crate::engine::progress::ProgressTracker;
use crate::engine::state::{BuildReport, BuildState};
use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::fs_state::FsState;
use crate::messages::{BuildMessage, MessageDispatcher, MessageSink, TracingSink};
use crate::project::Project;
use crate::scope::CompileScope;
use crate::storage::BuildDataManager;
use crate::types::Variant;

/// Long-lived state of one project, reused across builds.
#[derive(Debug)]
pub struct ProjectDescriptor {
    pub project: Project,
    pub fs: Arc<dyn FileSystem>,
    pub fs_state: FsState,
    pub data: BuildDataManager,
    pub proceed_on_errors: bool,
    pub use_hash: bool,
}

impl ProjectDescriptor {
    pub fn new(project: Project, fs: Arc<dyn FileSystem>, data_dir: impl Into<PathBuf>) -> Self {
        let data = BuildDataManager::new(fs.clone(), data_dir);
        Self::with_data(project, fs, data)
    }

    pub fn with_data(project: Project, fs: Arc<dyn FileSystem>, data: BuildDataManager) -> Self {
        Self {
            project,
            fs,
            fs_state: FsState::new(),
            data,
            proceed_on_errors: false,
            use_hash: false,
        }
    }

    pub fn proceed_on_errors(mut self, proceed: bool) -> Self {
        self.proceed_on_errors = proceed;
        self
    }

    pub fn use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }
}

/// Runs builds of one project with a fixed set of build steps.
#[derive(Debug)]
pub struct ProjectBuilder {
    descriptor: ProjectDescriptor,
    registry: BuilderRegistry,
    cancel: CancelToken,
    dispatcher: MessageDispatcher,
    state: BuildState,
}

impl ProjectBuilder {
    pub fn new(descriptor: ProjectDescriptor, registry: BuilderRegistry) -> Self {
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.add(Arc::new(TracingSink));
        Self {
            descriptor,
            registry,
            cancel: CancelToken::new(),
            dispatcher,
            state: BuildState::Init,
        }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn add_message_sink(&mut self, sink: Arc<dyn MessageSink>) {
        self.dispatcher.add(sink);
    }

    /// Token that cancels the running build; clones share state.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut ProjectDescriptor {
        &mut self.descriptor
    }

    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    /// Feed file-system changes observed outside a build.
    ///
    /// Existing files are marked dirty, vanished ones registered as deleted.
    /// Paths outside every source root or under an excluded directory are
    /// ignored. Returns how many paths were accepted.
    pub fn notify_changed<'p>(
        &mut self,
        paths: impl IntoIterator<Item = &'p Path>,
    ) -> Result<usize> {
        let ProjectDescriptor {
            project,
            fs,
            fs_state,
            data,
            ..
        } = &mut self.descriptor;

        let mut accepted = 0;
        for path in paths {
            let Some(rd) = project.roots().root_for_file(path) else {
                continue;
            };
            let excluded = project
                .module(&rd.target.module)
                .is_some_and(|m| m.is_excluded(path));
            if excluded || fs.is_dir(path) {
                continue;
            }
            if fs.exists(path) {
                fs_state.mark_dirty(rd, path);
            } else {
                fs_state.register_deleted(&rd.target, path);
            }
            data.timestamps().remove(&rd.target, path)?;
            accepted += 1;
        }
        debug!(accepted, "recorded external file changes");
        Ok(accepted)
    }

    /// Incremental build of the whole project.
    pub fn make(&mut self) -> Result<BuildReport> {
        self.build(&CompileScope::all(false), true, false)
    }

    /// Full rebuild from scratch.
    pub fn rebuild(&mut self) -> Result<BuildReport> {
        self.build(&CompileScope::all(true), false, true)
    }

    /// Run one build.
    ///
    /// A build that finishes with reported errors returns `Ok` with a
    /// `Failed` report (or `Done` with `errors_found` when proceeding on
    /// errors). Cancellation, aborts and step failures return `Err`.
    pub fn build(
        &mut self,
        scope: &CompileScope,
        is_make: bool,
        is_rebuild: bool,
    ) -> Result<BuildReport> {
        self.state = BuildState::Init;
        let mut report = BuildReport::new();

        let result = match self.run_once(scope, is_make, is_rebuild, &mut report) {
            Err(e) if e.is_store_corruption() => {
                info!(error = %e, "build data unreadable, retrying as rebuild");
                self.dispatcher.process(&BuildMessage::info(
                    crate::ENGINE_NAME,
                    format!(
                        "Internal caches are corrupted or have outdated format, \
                         forcing project rebuild: {e}"
                    ),
                ));
                self.state = BuildState::RetryAsRebuild;
                report = BuildReport::new();
                report.retried_as_rebuild = true;
                self.run_once(&CompileScope::all(true), false, true, &mut report)
            }
            other => other,
        };

        match result {
            Ok(()) => {
                report.state = self.state;
                info!(state = %self.state, errors = report.errors_found, "build finished");
                Ok(report)
            }
            Err(e) => {
                self.state = match e {
                    BuildError::Canceled => BuildState::Canceled,
                    _ => BuildState::Failed,
                };
                let msg = match e {
                    BuildError::Canceled | BuildError::Aborted(_) => {
                        BuildMessage::progress(e.to_string())
                    }
                    _ => BuildMessage::error(crate::ENGINE_NAME, e.to_string()),
                };
                self.dispatcher.process(&msg);
                warn!(state = %self.state, error = %e, "build stopped");
                Err(e)
            }
        }
    }

    fn run_once(
        &mut self,
        scope: &CompileScope,
        is_make: bool,
        is_rebuild: bool,
        report: &mut BuildReport,
    ) -> Result<()> {
        let ProjectDescriptor {
            project,
            fs,
            fs_state,
            data,
            proceed_on_errors,
            use_hash,
        } = &mut self.descriptor;

        let options = ContextOptions {
            is_make,
            is_rebuild,
            proceed_on_errors: *proceed_on_errors,
            use_hash: *use_hash,
        };
        let total_work = project.chunks().all().map(|c| c.targets().len()).sum();
        let mut ctx = CompileContext::new(
            project,
            scope,
            &**fs,
            fs_state,
            data,
            &self.dispatcher,
            &self.cancel,
            options,
        )?;

        let mut run = Run {
            registry: &self.registry,
            state: &mut self.state,
            report,
            progress: ProgressTracker::new(total_work, self.registry.total_builder_count()),
        };
        let result = run.execute(&mut ctx);
        run.report.errors_found = ctx.errors_detected();

        let finished = ctx.finish();
        result?;
        finished
    }
}

/// One pass over the project; borrows everything it mutates.
struct Run<'r> {
    registry: &'r BuilderRegistry,
    state: &'r mut BuildState,
    report: &'r mut BuildReport,
    progress: ProgressTracker,
}

impl Run<'_> {
    fn execute(&mut self, ctx: &mut CompileContext<'_>) -> Result<()> {
        ctx.set_done(0.0);
        if ctx.is_rebuild() {
            ctx.clean_output_roots()?;
        }

        ctx.progress("Running 'before' tasks");
        run_tasks(self.registry.before_tasks(), ctx)?;

        for variant in Variant::ALL {
            *self.state = match variant {
                Variant::Production => BuildState::RunningProduction,
                Variant::Test => BuildState::RunningTests,
            };
            ctx.set_compiling_tests(variant.is_tests());
            ctx.progress(match variant {
                Variant::Production => "Building production sources",
                Variant::Test => "Building test sources",
            });
            if !self.build_chunks(ctx, variant)? {
                *self.state = BuildState::Failed;
                return Ok(());
            }
        }

        ctx.progress("Running 'after' tasks");
        run_tasks(self.registry.after_tasks(), ctx)?;
        *self.state = BuildState::Done;
        Ok(())
    }

    /// Returns false when the build has to stop after a failed chunk.
    fn build_chunks(&mut self, ctx: &mut CompileContext<'_>, variant: Variant) -> Result<bool> {
        let project = ctx.project();
        for chunk in project.chunks().for_variant(variant) {
            ctx.check_canceled()?;
            if !ctx.scope().is_chunk_affected(chunk) {
                ctx.set_done(self.progress.chunk_skipped(chunk.targets().len()));
                continue;
            }
            self.build_chunk(ctx, chunk)?;
            if ctx.chunk_errors_detected() && !ctx.is_proceed_on_errors() {
                info!(chunk = %chunk, "errors reported, stopping build");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn build_chunk(&mut self, ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) -> Result<()> {
        ctx.begin_chunk();
        ctx.ensure_fs_state_initialized(chunk)?;

        if ctx.is_make() {
            ctx.reconcile_deleted_sources(chunk)?;
            if ctx.is_chunk_up_to_date(chunk) {
                debug!(chunk = %chunk, "chunk is up to date");
                self.report.chunks_up_to_date.push(chunk.name());
                ctx.set_done(self.progress.chunk_skipped(chunk.targets().len()));
                return ctx.on_chunk_build_complete(chunk, true);
            }
        }

        info!(chunk = %chunk, "building chunk");
        self.report.chunks_built.push(chunk.name());

        let result = self.run_categories(ctx, chunk);
        for step in self.registry.all_steps() {
            step.cleanup(ctx, chunk);
        }
        let completed = ctx.on_chunk_build_complete(chunk, result.is_ok());
        result?;
        completed
    }

    fn run_categories(&mut self, ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) -> Result<()> {
        for category in BuilderCategory::ALL {
            self.run_builders(ctx, chunk, category)?;
        }
        Ok(())
    }

    fn run_builders(
        &mut self,
        ctx: &mut CompileContext<'_>,
        chunk: &ModuleChunk,
        category: BuilderCategory,
    ) -> Result<()> {
        let steps = self.registry.builders_for(category);
        if steps.is_empty() {
            return Ok(());
        }

        let mut progress = self.progress.start_category(chunk.targets().len());
        let mut pass = 0;
        loop {
            pass += 1;
            let mut next_pass = false;
            ctx.before_next_round();
            if !ctx.is_rebuild() {
                ctx.sync_output_files(chunk)?;
            }

            for step in steps {
                debug!(
                    step = step.name(),
                    category = ?category,
                    chunk = %chunk,
                    pass,
                    "running build step"
                );
                let code = step
                    .build(ctx, chunk)
                    .map_err(|e| step_error(step.name(), e))?;
                if code == ExitCode::Abort {
                    return Err(BuildError::Aborted(step.name().to_string()));
                }
                ctx.check_canceled()?;
                if code == ExitCode::AdditionalPassRequired {
                    if !next_pass {
                        progress.additional_pass();
                    }
                    next_pass = true;
                }
                ctx.set_done(progress.stage_finished());
            }

            if !next_pass {
                return Ok(());
            }
            debug!(category = ?category, chunk = %chunk, pass, "additional pass requested");
        }
    }
}

fn run_tasks(tasks: &[Box<dyn ProjectTask>], ctx: &mut CompileContext<'_>) -> Result<()> {
    for task in tasks {
        debug!(task = task.name(), "running project task");
        task.run(ctx).map_err(|e| step_error(task.name(), e))?;
        ctx.check_canceled()?;
    }
    Ok(())
}

/// Keep engine errors raised inside a step as they are; wrap everything else.
fn step_error(step: &str, error: anyhow::Error) -> BuildError {
    match error.downcast::<BuildError>() {
        Ok(
            e @ (BuildError::StoreCorrupted { .. }
            | BuildError::Canceled
            | BuildError::Aborted(_)),
        ) => e,
        Ok(other) => BuildError::StepFailed {
            step: step.to_string(),
            error: other.into(),
        },
        Err(error) => BuildError::StepFailed {
            step: step.to_string(),
            error,
        },
    }
}
