// src/engine/context.rs

//! Per-build state shared between the orchestrator and the build steps.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::dag::ModuleChunk;
use crate::engine::cancel::CancelToken;
use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::fs_state::{FsState, RootScanner};
use crate::messages::{BuildMessage, MessageKind, MessageSink};
use crate::project::{BuildTarget, Project, RootDescriptor};
use crate::scope::CompileScope;
use crate::storage::BuildDataManager;
use crate::types::{ClasspathKind, Variant};

/// Switches fixed for one build run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextOptions {
    pub is_make: bool,
    pub is_rebuild: bool,
    pub proceed_on_errors: bool,
    pub use_hash: bool,
}

/// A dirty source handed to a build step.
#[derive(Debug, Clone)]
pub struct DirtyFile<'p> {
    pub root: &'p RootDescriptor,
    pub path: PathBuf,
}

impl DirtyFile<'_> {
    /// Path relative to its source root.
    pub fn relative_path(&self) -> &Path {
        self.path.strip_prefix(&self.root.root).unwrap_or(&self.path)
    }
}

/// Everything one build run can see.
///
/// The project, FS state and build data are lent for the duration of the
/// run; nothing here outlives it.
pub struct CompileContext<'a> {
    project: &'a Project,
    scope: &'a CompileScope,
    fs: &'a dyn FileSystem,
    fs_state: &'a mut FsState,
    data: &'a mut BuildDataManager,
    sink: &'a dyn MessageSink,
    cancel: &'a CancelToken,
    options: ContextOptions,
    start_stamp: u64,
    compiling_tests: bool,
    done: f32,
    errors_found: bool,
    chunk_errors: bool,
    removed_sources: BTreeSet<PathBuf>,
    /// Dirty sources whose stale outputs were already deleted in this chunk.
    synced: BTreeSet<PathBuf>,
    /// Targets flagged non-incremental in this build.
    non_incremental: BTreeSet<BuildTarget>,
    /// Targets flagged by an earlier build that have not completed since.
    carried: BTreeSet<BuildTarget>,
}

impl<'a> CompileContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: &'a Project,
        scope: &'a CompileScope,
        fs: &'a dyn FileSystem,
        fs_state: &'a mut FsState,
        data: &'a mut BuildDataManager,
        sink: &'a dyn MessageSink,
        cancel: &'a CancelToken,
        options: ContextOptions,
    ) -> Result<Self> {
        let options = ContextOptions {
            is_make: options.is_make && !options.is_rebuild,
            ..options
        };
        let carried = if options.is_rebuild {
            BTreeSet::new()
        } else {
            data.quarantine().load()?
        };
        if !carried.is_empty() {
            info!(targets = ?carried, "targets carried over as non-incremental");
        }

        Ok(Self {
            start_stamp: fs.current_stamp(),
            project,
            scope,
            fs,
            fs_state,
            data,
            sink,
            cancel,
            options,
            compiling_tests: false,
            done: 0.0,
            errors_found: false,
            chunk_errors: false,
            removed_sources: BTreeSet::new(),
            synced: BTreeSet::new(),
            non_incremental: BTreeSet::new(),
            carried,
        })
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn scope(&self) -> &'a CompileScope {
        self.scope
    }

    pub fn fs(&self) -> &'a dyn FileSystem {
        self.fs
    }

    pub fn is_make(&self) -> bool {
        self.options.is_make
    }

    pub fn is_rebuild(&self) -> bool {
        self.options.is_rebuild
    }

    pub fn is_proceed_on_errors(&self) -> bool {
        self.options.proceed_on_errors
    }

    pub fn is_compiling_tests(&self) -> bool {
        self.compiling_tests
    }

    pub(crate) fn set_compiling_tests(&mut self, tests: bool) {
        self.compiling_tests = tests;
    }

    pub fn variant(&self) -> Variant {
        Variant::for_tests(self.compiling_tests)
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(BuildError::Canceled);
        }
        Ok(())
    }

    pub fn done(&self) -> f32 {
        self.done
    }

    pub(crate) fn set_done(&mut self, done: f32) {
        self.done = done;
    }

    pub fn process_message(&mut self, mut msg: BuildMessage) {
        match msg.kind {
            MessageKind::Error => {
                self.errors_found = true;
                self.chunk_errors = true;
            }
            MessageKind::Progress => msg.done = Some(self.done),
            _ => {}
        }
        self.sink.process(&msg);
    }

    pub(crate) fn progress(&mut self, text: impl Into<String>) {
        self.process_message(BuildMessage::progress(text));
    }

    pub fn errors_detected(&self) -> bool {
        self.errors_found
    }

    pub fn chunk_errors_detected(&self) -> bool {
        self.chunk_errors
    }

    /// Sources of the current chunk deleted since they were last compiled.
    pub fn removed_sources(&self) -> &BTreeSet<PathBuf> {
        &self.removed_sources
    }

    pub fn is_non_incremental(&self, target: &BuildTarget) -> bool {
        self.non_incremental.contains(target) || self.carried.contains(target)
    }

    /// Dirty files of the chunk's targets, in root order.
    pub fn files_to_recompile(&self, chunk: &ModuleChunk) -> Vec<DirtyFile<'a>> {
        let roots = self.project.roots();
        let mut out = Vec::new();
        for target in chunk.targets() {
            self.fs_state
                .process_files_to_recompile(roots.roots_of(target), |root, file| {
                    out.push(DirtyFile {
                        root,
                        path: file.to_path_buf(),
                    });
                    true
                });
        }
        out
    }

    /// Files marked dirty since the current pass began.
    pub fn round_files(&self) -> &BTreeSet<PathBuf> {
        self.fs_state.round_files()
    }

    pub fn output_dir(&self, target: &BuildTarget) -> Option<&'a Path> {
        let project = self.project;
        project
            .module(&target.module)
            .map(|m| m.output_dir(target.variant))
    }

    /// Record that `output` was generated from `source`.
    pub fn register_output(
        &mut self,
        target: &BuildTarget,
        source: &Path,
        output: impl Into<PathBuf>,
    ) -> Result<()> {
        self.data.output_mapping(target).append_output(source, output)
    }

    /// Bind a secondary artifact to `source`.
    pub fn register_artifact(&mut self, source: &Path, artifact: impl Into<PathBuf>) -> Result<()> {
        self.data.artifacts().update(source, artifact)
    }

    /// Mark one file for recompilation. Files outside every source root are
    /// ignored.
    pub fn mark_dirty(&mut self, file: &Path) -> Result<()> {
        let project = self.project;
        let Some(rd) = project.roots().root_for_file(file) else {
            return Ok(());
        };
        self.fs_state.mark_dirty(rd, file);
        if !self.options.is_rebuild {
            self.data.timestamps().remove(&rd.target, file)?;
        }
        Ok(())
    }

    pub fn mark_deleted(&mut self, file: &Path) -> Result<()> {
        let project = self.project;
        let Some(rd) = project.roots().root_for_file(file) else {
            return Ok(());
        };
        self.register_deleted(&rd.target, file)
    }

    fn register_deleted(&mut self, target: &BuildTarget, file: &Path) -> Result<()> {
        self.fs_state.register_deleted(target, file);
        self.data.timestamps().remove(target, file)
    }

    /// Mark the chunk and every later chunk of the current phase that can
    /// see one of its modules as fully dirty.
    ///
    /// In make mode the chunk's modules are additionally flagged
    /// non-incremental until they complete cleanly.
    pub fn request_cascade_invalidation(&mut self, chunk: &ModuleChunk) -> Result<()> {
        let project = self.project;
        let kind = ClasspathKind::compile(self.compiling_tests);
        let chunk_modules: BTreeSet<String> =
            chunk.modules().into_iter().map(str::to_string).collect();

        let mut seeing: BTreeSet<String> = BTreeSet::new();
        for module in &chunk_modules {
            seeing.extend(project.graph().dependents_recursive(module, kind));
        }

        let mut dirty_modules = chunk_modules.clone();
        let chunks = project.chunks().for_variant(self.variant());
        if let Some(pos) = chunks.iter().position(|c| c == chunk) {
            for later in &chunks[pos + 1..] {
                if later.modules().iter().any(|m| seeing.contains(*m)) {
                    dirty_modules.extend(later.modules().into_iter().map(str::to_string));
                }
            }
        }
        info!(chunk = %chunk, modules = ?dirty_modules, "cascading invalidation");

        // Production changes invalidate tests too.
        let variants: &[Variant] = if self.compiling_tests {
            &[Variant::Test]
        } else {
            &Variant::ALL
        };
        for module in &dirty_modules {
            for &variant in variants {
                let target = BuildTarget::new(module.clone(), variant);
                self.mark_target_files(&target, true, &mut BTreeSet::new())?;
            }
        }

        if self.options.is_make {
            for module in &chunk_modules {
                if !self.compiling_tests {
                    self.non_incremental.insert(BuildTarget::production(module.clone()));
                }
                self.non_incremental.insert(BuildTarget::test(module.clone()));
            }
        }
        Ok(())
    }

    fn mark_target_files(
        &mut self,
        target: &BuildTarget,
        force_dirty: bool,
        seen: &mut BTreeSet<PathBuf>,
    ) -> Result<()> {
        let project = self.project;
        let Some(module) = project.module(&target.module) else {
            return Ok(());
        };
        let roots = project.roots();
        for rd in roots.roots_of(target) {
            if !self.fs.is_dir(&rd.root) {
                continue;
            }
            self.fs_state.clear_recompile(&rd.root);
            let nested: Vec<PathBuf> = roots.nested_in(&rd.root).map(Path::to_path_buf).collect();
            let mut scanner = RootScanner {
                fs: self.fs,
                stamps: self.data.timestamps(),
                force_dirty,
                invalidate: !self.options.is_rebuild,
                use_hash: self.options.use_hash,
            };
            scanner.scan(self.fs_state, rd, &module.excludes, &nested, seen)?;
        }
        Ok(())
    }

    /// Bring the FS state of the chunk's targets up to date for this run.
    pub(crate) fn ensure_fs_state_initialized(&mut self, chunk: &ModuleChunk) -> Result<()> {
        for target in chunk.targets() {
            if self.options.is_rebuild {
                self.mark_target_files(target, true, &mut BTreeSet::new())?;
                self.fs_state.mark_initial_scan_performed(target);
                self.update_output_layout(target)?;
            } else if self.options.is_make {
                let carried = self.carried.contains(target);
                if self.fs_state.mark_initial_scan_performed(target) {
                    self.init_target_fs_state(target, carried)?;
                    self.update_output_layout(target)?;
                } else if carried {
                    self.mark_target_files(target, true, &mut BTreeSet::new())?;
                }
            } else {
                if self.scope.is_recompilation_forced(target) {
                    self.mark_target_files(target, true, &mut BTreeSet::new())?;
                    self.fs_state.mark_initial_scan_performed(target);
                    self.update_output_layout(target)?;
                } else if self.fs_state.mark_initial_scan_performed(target) {
                    self.init_target_fs_state(target, false)?;
                    self.update_output_layout(target)?;
                }
                let requested: Vec<PathBuf> =
                    self.scope.files(target).map(Path::to_path_buf).collect();
                for file in requested {
                    if self.fs.is_file(&file) {
                        self.mark_dirty(&file)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// First scan of a target in this process: compare against stored
    /// stamps and register sources that vanished since the last build.
    fn init_target_fs_state(&mut self, target: &BuildTarget, force: bool) -> Result<()> {
        let mut force_dirty = force;
        if let Some(current) = self.output_dir(target) {
            let previous = self
                .data
                .layout()
                .get(&target.module)?
                .and_then(|roots| roots.get(target.variant).map(Path::to_path_buf));
            if previous.as_deref() != Some(current) {
                debug!(target = %target, ?previous, "output root changed, forcing full scan");
                force_dirty = true;
            }
        }

        let mut seen = BTreeSet::new();
        self.mark_target_files(target, force_dirty, &mut seen)?;

        self.fs_state.clear_deleted_paths(target);
        let recorded = self.data.output_mapping(target).sources()?;
        for source in recorded {
            if !seen.contains(&source) {
                debug!(target = %target, source = ?source, "source deleted since last build");
                self.register_deleted(target, &source)?;
            }
        }
        Ok(())
    }

    fn update_output_layout(&mut self, target: &BuildTarget) -> Result<()> {
        if let Some(output) = self.output_dir(target) {
            self.data
                .layout()
                .update(&target.module, target.variant, output)?;
        }
        Ok(())
    }

    pub(crate) fn begin_chunk(&mut self) {
        self.chunk_errors = false;
        self.removed_sources.clear();
        self.synced.clear();
    }

    /// Delete outputs of sources removed since the last build and drop their
    /// mapping entries.
    pub(crate) fn reconcile_deleted_sources(&mut self, chunk: &ModuleChunk) -> Result<()> {
        let mut removed = BTreeSet::new();
        for target in chunk.targets() {
            for source in self.fs_state.deleted_paths(target) {
                let outputs = self.data.output_mapping(target).outputs(&source)?;
                if !outputs.is_empty() {
                    for output in &outputs {
                        self.delete_output(output);
                    }
                    self.data.output_mapping(target).remove(&source)?;
                }
                if let Some(artifact) = self.data.artifacts().get(&source)? {
                    if self.fs.exists(&artifact) {
                        self.mark_dirty(&artifact)?;
                    }
                    self.data.artifacts().remove(&source)?;
                }
                removed.insert(source);
            }
        }
        for target in chunk.targets() {
            self.fs_state.clear_deleted_paths(target);
        }
        if !removed.is_empty() {
            info!(chunk = %chunk, removed = removed.len(), "cleaned outputs of deleted sources");
        }
        self.removed_sources = removed;
        Ok(())
    }

    /// Nothing to do for this chunk in make mode.
    pub(crate) fn is_chunk_up_to_date(&self, chunk: &ModuleChunk) -> bool {
        if !self.removed_sources.is_empty() {
            return false;
        }
        if chunk.targets().iter().any(|t| self.is_non_incremental(t)) {
            return false;
        }
        let roots = self.project.roots();
        !chunk
            .targets()
            .iter()
            .any(|t| self.fs_state.has_dirty_files(roots.roots_of(t)))
    }

    pub(crate) fn before_next_round(&mut self) {
        self.fs_state.before_next_round_start();
    }

    /// Delete outputs recorded for every dirty source; they are about to be
    /// regenerated. Each source is synced once per chunk, so outputs
    /// registered by an earlier category survive the later ones.
    pub(crate) fn sync_output_files(&mut self, chunk: &ModuleChunk) -> Result<()> {
        for dirty in self.files_to_recompile(chunk) {
            if !self.synced.insert(dirty.path.clone()) {
                continue;
            }
            let target = &dirty.root.target;
            let outputs = self.data.output_mapping(target).outputs(&dirty.path)?;
            if outputs.is_empty() {
                continue;
            }
            for output in &outputs {
                self.delete_output(output);
            }
            self.data.output_mapping(target).remove(&dirty.path)?;
        }
        Ok(())
    }

    fn delete_output(&self, output: &Path) {
        if let Err(e) = self.fs.remove(output) {
            warn!(output = ?output, error = %e, "failed to delete stale output");
        }
    }

    /// Finish a chunk. Timestamps are saved only when `succeeded`; output
    /// mappings are flushed regardless.
    pub(crate) fn on_chunk_build_complete(
        &mut self,
        chunk: &ModuleChunk,
        succeeded: bool,
    ) -> Result<()> {
        self.fs_state.before_next_round_start();

        let marked = if succeeded && !self.chunk_errors && !self.is_canceled() {
            self.mark_chunk_up_to_date(chunk)
        } else {
            Ok(false)
        };

        let flushed = self
            .data
            .flush_mappings(chunk.targets())
            .and_then(|_| self.data.flush());

        if marked? {
            debug!(chunk = %chunk, "saved stamps of up-to-date files");
        }
        flushed
    }

    fn mark_chunk_up_to_date(&mut self, chunk: &ModuleChunk) -> Result<bool> {
        let mut marked = false;
        let project = self.project;
        let roots = project.roots();
        for target in chunk.targets() {
            if self.options.is_make || self.options.is_rebuild {
                self.non_incremental.remove(target);
                self.carried.remove(target);
            }
            for rd in roots.roots_of(target) {
                marked |= self.fs_state.mark_all_up_to_date(
                    self.fs,
                    self.scope,
                    rd,
                    self.data.timestamps(),
                    self.start_stamp,
                    self.options.use_hash,
                )?;
            }
        }
        Ok(marked)
    }

    /// Wipe all build data and output roots for a full rebuild.
    pub(crate) fn clean_output_roots(&mut self) -> Result<()> {
        self.data.clean()?;
        self.fs_state.on_rebuild();

        let project = self.project;
        let source_roots: Vec<&Path> = project
            .roots()
            .all()
            .iter()
            .map(|rd| rd.root.as_path())
            .collect();
        let outputs: BTreeSet<&Path> = project
            .modules()
            .flat_map(|m| Variant::ALL.map(|v| m.output_dir(v)))
            .collect();

        for output in outputs {
            self.check_canceled()?;
            let overlaps = source_roots
                .iter()
                .any(|src| output.starts_with(src) || src.starts_with(output));
            if overlaps {
                self.process_message(BuildMessage::warning(
                    crate::ENGINE_NAME,
                    format!(
                        "Output path {} intersects with a source root. \
                         The output cannot be cleaned.",
                        output.display()
                    ),
                ));
                continue;
            }
            if !self.fs.is_dir(output) {
                continue;
            }
            for child in self.fs.read_dir(output)? {
                self.fs.remove(&child)?;
            }
            debug!(output = ?output, "cleaned output root");
        }
        Ok(())
    }

    /// Persist the non-incremental flags still pending at the end of the run.
    pub(crate) fn finish(&mut self) -> Result<()> {
        let pending: BTreeSet<BuildTarget> = self
            .carried
            .union(&self.non_incremental)
            .cloned()
            .collect();
        if !pending.is_empty() {
            info!(targets = ?pending, "targets left non-incremental for the next build");
        }
        self.data.quarantine().store(&pending)?;
        self.data.flush()
    }
}
