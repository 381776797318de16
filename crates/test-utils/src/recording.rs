// crates/test-utils/src/recording.rs

//! A scriptable build step that records every call it receives.
//!
//! Tests register one or more [`RecordingStep`]s, run builds, then inspect
//! the shared [`Journal`] to see which chunks were built with which files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use incbuild::builders::{BuildStep, BuilderCategory, ExitCode};
use incbuild::dag::ModuleChunk;
use incbuild::engine::{CancelToken, CompileContext};
use incbuild::messages::BuildMessage;
use incbuild::types::Variant;

/// One `build` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step: String,
    pub chunk: String,
    pub variant: Variant,
    /// Dirty files handed to the step, sorted.
    pub files: Vec<PathBuf>,
    /// Sources removed since the previous build of the chunk.
    pub removed: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct JournalState {
    builds: Vec<Invocation>,
    cleanups: Vec<String>,
}

/// Shared log of step calls; clones write to the same log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalState>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn builds(&self) -> Vec<Invocation> {
        self.lock().builds.clone()
    }

    /// Names of the chunks built for `variant`, in call order, one entry per
    /// call of the first step that saw them.
    pub fn chunks(&self, variant: Variant) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for inv in self.lock().builds.iter().filter(|i| i.variant == variant) {
            if out.last() != Some(&inv.chunk) {
                out.push(inv.chunk.clone());
            }
        }
        out
    }

    /// Every file handed to any step, sorted and deduplicated.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .lock()
            .builds
            .iter()
            .flat_map(|i| i.files.iter().cloned())
            .collect();
        files.sort();
        files.dedup();
        files
    }

    pub fn files_for(&self, chunk: &str, variant: Variant) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .lock()
            .builds
            .iter()
            .filter(|i| i.chunk == chunk && i.variant == variant)
            .flat_map(|i| i.files.iter().cloned())
            .collect();
        files.sort();
        files.dedup();
        files
    }

    pub fn cleanups(&self) -> Vec<String> {
        self.lock().cleanups.clone()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.builds.clear();
        state.cleanups.clear();
    }

    fn record(&self, inv: Invocation) {
        self.lock().builds.push(inv);
    }

    fn record_cleanup(&self, chunk: String) {
        self.lock().cleanups.push(chunk);
    }
}

/// Build step whose behaviour is set up by the test.
///
/// By default it records the call and returns `ExitCode::Ok`.
#[derive(Debug)]
pub struct RecordingStep {
    name: String,
    category: BuilderCategory,
    journal: Journal,
    output_ext: Option<String>,
    artifact_ext: Option<String>,
    extra_passes: usize,
    passes_left: Mutex<BTreeMap<String, usize>>,
    fail_on: Option<String>,
    cascade_from: Option<String>,
    abort_on: Option<String>,
    error_on: Option<String>,
    cancel: Mutex<Option<CancelToken>>,
}

impl RecordingStep {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            category: BuilderCategory::Translator,
            journal: journal.clone(),
            output_ext: None,
            artifact_ext: None,
            extra_passes: 0,
            passes_left: Mutex::new(BTreeMap::new()),
            fail_on: None,
            cascade_from: None,
            abort_on: None,
            error_on: None,
            cancel: Mutex::new(None),
        }
    }

    pub fn in_category(mut self, category: BuilderCategory) -> Self {
        self.category = category;
        self
    }

    /// Write `<output>/<relative source path>` with the extension replaced
    /// by `ext` for every dirty file, and register it as an output.
    pub fn writing_outputs(mut self, ext: &str) -> Self {
        self.output_ext = Some(ext.to_string());
        self
    }

    /// Bind the sibling with extension `ext` to every dirty file as its
    /// secondary artifact.
    pub fn binding_artifacts(mut self, ext: &str) -> Self {
        self.artifact_ext = Some(ext.to_string());
        self
    }

    /// Ask for `n` additional passes the first time each chunk is built.
    pub fn extra_passes(mut self, n: usize) -> Self {
        self.extra_passes = n;
        self
    }

    /// Report an ERROR message for dirty files whose name contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Request cascade invalidation when building a chunk of `module`.
    pub fn cascading_from(mut self, module: &str) -> Self {
        self.cascade_from = Some(module.to_string());
        self
    }

    /// Return `ExitCode::Abort` when building a chunk of `module`.
    pub fn aborting_on(mut self, module: &str) -> Self {
        self.abort_on = Some(module.to_string());
        self
    }

    /// Return `Err` when building a chunk of `module`.
    pub fn erroring_on(mut self, module: &str) -> Self {
        self.error_on = Some(module.to_string());
        self
    }

    /// Cancel `token` from inside the first `build` call.
    pub fn canceling(mut self, token: CancelToken) -> Self {
        self.cancel = Mutex::new(Some(token));
        self
    }

    fn wants_pass(&self, chunk: &ModuleChunk) -> bool {
        if self.extra_passes == 0 {
            return false;
        }
        let mut left = self.passes_left.lock().unwrap_or_else(|p| p.into_inner());
        let remaining = left.entry(chunk.to_string()).or_insert(self.extra_passes);
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }

    fn write_output(
        &self,
        ctx: &mut CompileContext<'_>,
        ext: &str,
        file: &incbuild::engine::DirtyFile<'_>,
    ) -> anyhow::Result<()> {
        let Some(out_dir) = ctx.output_dir(&file.root.target) else {
            return Ok(());
        };
        let dest = out_dir.join(file.relative_path()).with_extension(ext);
        let contents = ctx.fs().read(&file.path)?;
        ctx.fs().write(&dest, &contents)?;
        ctx.register_output(&file.root.target, &file.path, dest)?;
        Ok(())
    }
}

impl BuildStep for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> BuilderCategory {
        self.category
    }

    fn build(&self, ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) -> anyhow::Result<ExitCode> {
        let dirty = ctx.files_to_recompile(chunk);
        let mut files: Vec<PathBuf> = dirty.iter().map(|f| f.path.clone()).collect();
        files.sort();
        self.journal.record(Invocation {
            step: self.name.clone(),
            chunk: chunk.name(),
            variant: chunk.variant(),
            files,
            removed: ctx.removed_sources().iter().cloned().collect(),
        });

        let token = self.cancel.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(token) = token {
            token.cancel();
        }
        if self.abort_on.as_deref().is_some_and(|m| chunk.contains_module(m)) {
            return Ok(ExitCode::Abort);
        }
        if self.error_on.as_deref().is_some_and(|m| chunk.contains_module(m)) {
            anyhow::bail!("step {} blew up", self.name);
        }

        for file in &dirty {
            let failing = self.fail_on.as_deref().is_some_and(|needle| {
                file.path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().contains(needle))
            });
            if failing {
                ctx.process_message(
                    BuildMessage::error(self.name.clone(), "cannot compile").with_path(&file.path),
                );
                continue;
            }
            if let Some(ext) = &self.output_ext {
                self.write_output(ctx, ext, file)?;
            }
            if let Some(ext) = &self.artifact_ext {
                let is_artifact = file.path.extension().is_some_and(|e| e == ext.as_str());
                if !is_artifact {
                    ctx.register_artifact(&file.path, file.path.with_extension(ext))?;
                }
            }
        }

        if self
            .cascade_from
            .as_deref()
            .is_some_and(|m| chunk.contains_module(m) && !chunk.is_tests())
        {
            ctx.request_cascade_invalidation(chunk)?;
        }

        if self.wants_pass(chunk) {
            return Ok(ExitCode::AdditionalPassRequired);
        }
        Ok(ExitCode::Ok)
    }

    fn cleanup(&self, _ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) {
        self.journal.record_cleanup(chunk.to_string());
    }
}
