// tests/cascade_and_quarantine.rs

mod common;
use crate::common::{init_tracing, seed_chain};

use std::error::Error;
use std::path::Path;

use incbuild::engine::BuildState;
use incbuild::fs::mock::MockFileSystem;
use incbuild::fs::FileSystem;
use incbuild::project::Dependency;
use incbuild::types::Variant;
use incbuild_test_utils::fixture::{module, src, test_src, MockProject, DATA_DIR};
use incbuild_test_utils::recording::{Journal, RecordingStep};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn cascade_reaches_direct_dependents_only() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .module(module("b", &["a"]))
        .module(module("c", &["b"]))
        .step(RecordingStep::new("compile", &journal).cascading_from("a"))
        .build();
    project.make()?;
    journal.clear();

    fs.add_file(src("a", "one.src"), "a one, edited");
    project.restart();
    let report = project.make()?;

    assert_eq!(report.chunks_built, vec!["a", "b", "a"]);
    assert_eq!(
        journal.files_for("b", Variant::Production),
        vec![src("b", "one.src"), src("b", "two.src")]
    );
    assert_eq!(
        journal.files_for("a", Variant::Test),
        vec![test_src("a", "one_test.src")]
    );
    assert!(!fs.exists(&Path::new(DATA_DIR).join("quarantine")));
    Ok(())
}

#[test]
fn cascade_follows_exported_dependencies() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .module(module("b", &[]).with_dependency(Dependency::new("a").exported()))
        .module(module("c", &["b"]))
        .step(RecordingStep::new("compile", &journal).cascading_from("a"))
        .build();
    project.make()?;
    journal.clear();

    fs.add_file(src("a", "two.src"), "a two, edited");
    project.restart();
    let report = project.make()?;

    assert_eq!(report.chunks_built, vec!["a", "b", "c", "a"]);
    assert_eq!(journal.files_for("a", Variant::Production), vec![src("a", "two.src")]);
    assert_eq!(
        journal.files_for("c", Variant::Production),
        vec![src("c", "one.src"), src("c", "two.src")]
    );
    Ok(())
}

#[test]
fn unfinished_cascade_is_carried_into_the_next_build() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(src("a", "one.src"), "a");
    fs.add_file(src("b", "bad.src"), "does not compile");
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .module(module("b", &["a"]))
        .step(
            RecordingStep::new("compile", &journal)
                .cascading_from("a")
                .failing_on("bad"),
        )
        .build();

    let report = project.make()?;
    assert_eq!(report.state, BuildState::Failed);
    assert!(report.errors_found);
    assert_eq!(report.chunks_built, vec!["a", "b"]);
    let quarantine = Path::new(DATA_DIR).join("quarantine");
    assert!(fs.exists(&quarantine));

    // Fix the broken module; the test half of `a` never got built after
    // the cascade, so it is rebuilt although none of its files changed.
    fs.remove(&src("b", "bad.src"))?;
    project.restart();
    journal.clear();
    let report = project.make()?;

    assert_eq!(report.state, BuildState::Done);
    assert_eq!(journal.chunks(Variant::Test), vec!["a"]);
    assert!(journal.chunks(Variant::Production).is_empty());
    assert!(!fs.exists(&quarantine));

    project.restart();
    journal.clear();
    assert!(project.make()?.chunks_built.is_empty());
    Ok(())
}
