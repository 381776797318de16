// tests/passes_and_tasks.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::{Arc, Mutex};

use incbuild::builders::{BuilderCategory, BuilderRegistry, ProjectTask, TaskPhase};
use incbuild::engine::{BuildState, CompileContext, ProjectBuilder, ProjectDescriptor};
use incbuild::fs::mock::MockFileSystem;
use incbuild::fs::FileSystem;
use incbuild::project::Project;
use incbuild_test_utils::fixture::{module, src, MockProject, DATA_DIR};
use incbuild_test_utils::recording::{Journal, RecordingStep};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn additional_pass_reruns_every_step_of_the_category() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(src("a", "x.src"), "x");
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .step(RecordingStep::new("first", &journal).extra_passes(2))
        .step(RecordingStep::new("second", &journal))
        .step(RecordingStep::new("package", &journal).in_category(BuilderCategory::Packager))
        .build();

    let report = project.make()?;
    assert!(report.is_success());

    let steps: Vec<String> = journal.builds().into_iter().map(|i| i.step).collect();
    assert_eq!(
        steps,
        vec!["first", "second", "first", "second", "first", "second", "package"]
    );
    // Every pass still sees the same dirty file.
    assert!(journal.builds().iter().all(|i| i.files == vec![src("a", "x.src")]));
    Ok(())
}

#[test]
fn steps_run_in_category_order() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(src("a", "x.src"), "x");
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .step(RecordingStep::new("validate", &journal).in_category(BuilderCategory::Validator))
        .step(
            RecordingStep::new("generate", &journal)
                .in_category(BuilderCategory::SourceGenerator),
        )
        .step(
            RecordingStep::new("instrument", &journal)
                .in_category(BuilderCategory::ClassInstrumenter),
        )
        .step(RecordingStep::new("compile", &journal))
        .build();

    project.make()?;

    let steps: Vec<String> = journal.builds().into_iter().map(|i| i.step).collect();
    assert_eq!(steps, vec!["generate", "compile", "instrument", "validate"]);
    Ok(())
}

#[test]
fn cleanup_runs_for_every_step_of_built_chunks_only() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(src("a", "x.src"), "x");
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .step(RecordingStep::new("compile", &journal))
        .step(RecordingStep::new("package", &journal).in_category(BuilderCategory::Packager))
        .build();

    project.make()?;
    assert_eq!(
        journal.cleanups(),
        vec!["[a] (production)", "[a] (production)"]
    );

    journal.clear();
    project.make()?;
    assert!(journal.cleanups().is_empty());
    Ok(())
}

#[derive(Clone, Default)]
struct TaskLog(Arc<Mutex<Vec<String>>>);

impl TaskLog {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct LoggingTask {
    name: &'static str,
    phase: TaskPhase,
    log: TaskLog,
}

impl ProjectTask for LoggingTask {
    fn name(&self) -> &str {
        self.name
    }

    fn phase(&self) -> TaskPhase {
        self.phase
    }

    fn run(&self, ctx: &mut CompileContext<'_>) -> anyhow::Result<()> {
        let entry = format!("{}:{}", self.name, ctx.is_rebuild());
        self.log.0.lock().unwrap().push(entry);
        Ok(())
    }
}

#[test]
fn project_tasks_wrap_the_chunk_phases() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(src("a", "x.src"), "x");
    let journal = Journal::new();
    let log = TaskLog::default();

    let mut registry = BuilderRegistry::new();
    registry.register_step(Box::new(RecordingStep::new("compile", &journal)));
    registry.register_task(Box::new(LoggingTask {
        name: "after",
        phase: TaskPhase::After,
        log: log.clone(),
    }));
    registry.register_task(Box::new(LoggingTask {
        name: "before",
        phase: TaskPhase::Before,
        log: log.clone(),
    }));

    let project = Project::new([module("a", &[])])?;
    let fs_handle: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let descriptor = ProjectDescriptor::new(project, fs_handle, DATA_DIR);
    let mut builder = ProjectBuilder::new(descriptor, registry);

    let report = builder.make()?;
    assert_eq!(report.state, BuildState::Done);
    assert_eq!(log.entries(), vec!["before:false", "after:false"]);
    assert_eq!(journal.builds().len(), 1);

    builder.rebuild()?;
    assert_eq!(
        log.entries(),
        vec!["before:false", "after:false", "before:true", "after:true"]
    );
    Ok(())
}
