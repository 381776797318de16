// tests/errors_and_cancel.rs

mod common;
use crate::common::{init_tracing, seed_chain};

use std::error::Error;

use incbuild::engine::{BuildState, CancelToken};
use incbuild::errors::BuildError;
use incbuild::fs::mock::MockFileSystem;
use incbuild::messages::MessageKind;
use incbuild::types::Variant;
use incbuild_test_utils::fixture::{module, src, MockProject, MockProjectBuilder};
use incbuild_test_utils::recording::{Journal, RecordingStep};

type TestResult = Result<(), Box<dyn Error>>;

fn chain(fs: &MockFileSystem) -> MockProjectBuilder {
    MockProject::builder(fs)
        .module(module("a", &[]))
        .module(module("b", &["a"]))
        .module(module("c", &["b"]))
}

#[test]
fn reported_errors_stop_at_the_failing_chunk() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    fs.add_file(src("b", "broken.src"), "nope");
    let journal = Journal::new();
    let mut project = chain(&fs)
        .step(RecordingStep::new("compile", &journal).failing_on("broken"))
        .build();

    let report = project.make()?;

    assert_eq!(report.state, BuildState::Failed);
    assert!(report.errors_found);
    assert!(!report.is_success());
    assert_eq!(report.chunks_built, vec!["a", "b"]);
    let errors = project.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path.as_deref(), Some(src("b", "broken.src").as_path()));

    // Nothing of the failed chunk was marked up to date.
    journal.clear();
    let report = project.make()?;
    assert_eq!(report.chunks_built, vec!["b"]);
    assert_eq!(
        journal.files_for("b", Variant::Production),
        vec![src("b", "broken.src"), src("b", "one.src"), src("b", "two.src")]
    );
    Ok(())
}

#[test]
fn proceed_on_errors_builds_the_remaining_chunks() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    fs.add_file(src("b", "broken.src"), "nope");
    let journal = Journal::new();
    let mut project = chain(&fs)
        .step(RecordingStep::new("compile", &journal).failing_on("broken"))
        .proceed_on_errors()
        .build();

    let report = project.make()?;

    assert_eq!(report.state, BuildState::Done);
    assert!(report.errors_found);
    assert!(!report.is_success());
    assert_eq!(journal.chunks(Variant::Production), vec!["a", "b", "c"]);
    assert_eq!(journal.chunks(Variant::Test), vec!["a"]);

    // Only the chunk that reported errors stays dirty.
    journal.clear();
    let report = project.make()?;
    assert_eq!(report.chunks_built, vec!["b"]);
    Ok(())
}

#[test]
fn abort_stops_the_build_immediately() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain(&fs)
        .step(RecordingStep::new("compile", &journal).aborting_on("b"))
        .build();

    let err = project.make().unwrap_err();

    assert!(matches!(err, BuildError::Aborted(ref step) if step == "compile"));
    assert_eq!(project.builder.state(), BuildState::Failed);
    assert_eq!(journal.chunks(Variant::Production), vec!["a", "b"]);
    assert!(journal.chunks(Variant::Test).is_empty());
    let progress = project.messages.of_kind(MessageKind::Progress);
    assert!(progress.iter().any(|m| m.text.contains("requested build stop")));
    Ok(())
}

#[test]
fn failing_step_is_reported_as_a_step_failure() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain(&fs)
        .step(RecordingStep::new("compile", &journal).erroring_on("a"))
        .build();

    let err = project.make().unwrap_err();

    match err {
        BuildError::StepFailed { step, error } => {
            assert_eq!(step, "compile");
            assert!(error.to_string().contains("blew up"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(project.builder.state(), BuildState::Failed);
    assert!(project.errors().iter().any(|m| m.text.contains("Builder compile failed")));
    Ok(())
}

#[test]
fn cancel_mid_build_leaves_the_chunk_dirty() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let token = CancelToken::new();
    let mut project = chain(&fs)
        .step(RecordingStep::new("compile", &journal).canceling(token.clone()))
        .cancel_token(token.clone())
        .build();

    let err = project.make().unwrap_err();
    assert!(matches!(err, BuildError::Canceled));
    assert_eq!(project.builder.state(), BuildState::Canceled);
    assert_eq!(journal.chunks(Variant::Production), vec!["a"]);

    token.reset();
    journal.clear();
    let report = project.make()?;
    assert!(report.is_success());
    assert_eq!(journal.chunks(Variant::Production), vec!["a", "b", "c"]);
    assert_eq!(
        journal.files_for("a", Variant::Production),
        vec![src("a", "one.src"), src("a", "two.src")]
    );
    Ok(())
}

#[test]
fn canceled_before_start_builds_nothing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain(&fs)
        .step(RecordingStep::new("compile", &journal))
        .build();

    project.builder.cancel_token().cancel();
    let err = project.make().unwrap_err();

    assert!(matches!(err, BuildError::Canceled));
    assert!(journal.builds().is_empty());
    Ok(())
}
