// tests/incremental_make.rs

mod common;
use crate::common::{init_tracing, seed_chain};

use std::error::Error;
use std::path::Path;

use incbuild::engine::BuildState;
use incbuild::fs::mock::MockFileSystem;
use incbuild::project::BuildTarget;
use incbuild::scope::CompileScope;
use incbuild::types::Variant;
use incbuild_test_utils::fixture::{module, src, test_src, MockProject};
use incbuild_test_utils::recording::{Journal, RecordingStep};

type TestResult = Result<(), Box<dyn Error>>;

fn chain_project(fs: &MockFileSystem, journal: &Journal) -> MockProject {
    MockProject::builder(fs)
        .module(module("a", &[]))
        .module(module("b", &["a"]))
        .module(module("c", &["b"]))
        .step(RecordingStep::new("compile", journal))
        .build()
}

#[test]
fn first_make_builds_every_chunk_in_dependency_order() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);

    let report = project.make()?;

    assert_eq!(report.state, BuildState::Done);
    assert!(report.is_success());
    assert_eq!(report.chunks_built, vec!["a", "b", "c", "a"]);
    assert_eq!(report.chunks_up_to_date, vec!["b", "c"]);
    assert_eq!(journal.chunks(Variant::Production), vec!["a", "b", "c"]);
    assert_eq!(journal.chunks(Variant::Test), vec!["a"]);
    assert_eq!(
        journal.files_for("b", Variant::Production),
        vec![src("b", "one.src"), src("b", "two.src")]
    );
    assert_eq!(
        journal.files_for("a", Variant::Test),
        vec![test_src("a", "one_test.src")]
    );
    Ok(())
}

#[test]
fn second_make_is_a_no_op() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);

    project.make()?;
    journal.clear();

    let report = project.make()?;
    assert!(report.chunks_built.is_empty());
    assert!(journal.builds().is_empty());

    // Same after a restart: every stored stamp still matches.
    project.restart();
    let report = project.make()?;
    assert!(report.chunks_built.is_empty(), "built {:?}", report.chunks_built);
    assert!(journal.builds().is_empty());
    Ok(())
}

#[test]
fn only_the_modified_file_is_recompiled() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);
    project.make()?;
    journal.clear();

    fs.add_file(src("b", "two.src"), "b two, edited");
    project.restart();
    let report = project.make()?;

    assert_eq!(report.chunks_built, vec!["b"]);
    assert_eq!(journal.files(), vec![src("b", "two.src")]);

    journal.clear();
    let report = project.make()?;
    assert!(report.chunks_built.is_empty());
    Ok(())
}

#[test]
fn new_files_are_picked_up_after_a_restart() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);
    project.make()?;
    journal.clear();

    fs.add_file(src("c", "three.src"), "c three");
    project.restart();
    project.make()?;

    assert_eq!(journal.files(), vec![src("c", "three.src")]);
    Ok(())
}

#[test]
fn notified_changes_are_rebuilt_without_rescanning() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);
    project.make()?;
    journal.clear();

    fs.add_file(src("a", "one.src"), "a one, edited");
    let accepted = project.builder.notify_changed([
        src("a", "one.src").as_path(),
        Path::new("/elsewhere/notes.txt"),
        Path::new("/p/a/src"),
    ])?;
    assert_eq!(accepted, 1);

    let report = project.make()?;
    assert_eq!(report.chunks_built, vec!["a"]);
    assert_eq!(journal.files(), vec![src("a", "one.src")]);
    Ok(())
}

#[test]
fn excluded_directories_are_never_compiled() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(src("a", "keep.src"), "keep");
    fs.add_file(src("a", "gen/skip.src"), "skip");
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]).with_exclude("/p/a/src/gen"))
        .step(RecordingStep::new("compile", &journal))
        .build();

    project.make()?;
    assert_eq!(journal.files(), vec![src("a", "keep.src")]);

    journal.clear();
    let accepted = project
        .builder
        .notify_changed([src("a", "gen/skip.src").as_path()])?;
    assert_eq!(accepted, 0);
    assert!(project.make()?.chunks_built.is_empty());
    Ok(())
}

#[test]
fn touched_files_with_unchanged_content_stay_clean_when_hashing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = MockProject::builder(&fs)
        .module(module("a", &[]))
        .step(RecordingStep::new("compile", &journal))
        .use_hash()
        .build();
    project.make()?;
    journal.clear();

    fs.touch(src("a", "one.src"));
    project.restart();
    assert!(project.make()?.chunks_built.is_empty());

    fs.add_file(src("a", "one.src"), "really changed");
    project.restart();
    project.make()?;
    assert_eq!(journal.files(), vec![src("a", "one.src")]);
    Ok(())
}

#[test]
fn touched_files_are_recompiled_without_hashing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);
    project.make()?;
    journal.clear();

    fs.touch(src("a", "one.src"));
    project.restart();
    let report = project.make()?;
    assert_eq!(report.chunks_built, vec!["a"]);
    Ok(())
}

#[test]
fn forced_module_recompiles_it_even_when_up_to_date() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);
    project.make()?;
    journal.clear();

    let scope = CompileScope::builder().forced_module("b").build();
    let report = project.build(&scope, false, false)?;

    assert_eq!(report.chunks_built, vec!["b", "b"]);
    assert_eq!(
        journal.files_for("b", Variant::Production),
        vec![src("b", "one.src"), src("b", "two.src")]
    );
    assert!(journal.files_for("a", Variant::Production).is_empty());
    assert!(journal.files_for("c", Variant::Production).is_empty());
    Ok(())
}

#[test]
fn file_scope_compiles_just_the_named_file() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_chain(&fs);
    let journal = Journal::new();
    let mut project = chain_project(&fs, &journal);
    project.make()?;
    journal.clear();

    let scope = CompileScope::builder()
        .file(BuildTarget::production("c"), src("c", "one.src"))
        .build();
    let report = project.build(&scope, false, false)?;

    assert_eq!(report.chunks_built, vec!["c"]);
    assert_eq!(journal.files(), vec![src("c", "one.src")]);
    Ok(())
}
