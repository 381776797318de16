// tests/cli_scope.rs

use std::path::Path;

use clap::Parser;
use incbuild::cli::CliArgs;
use incbuild::project::{BuildTarget, Module, Project};
use incbuild::{scope_from_args, BuildMode};

fn project() -> Project {
    Project::new([
        Module::new("core", "/p/out/core", "/p/out/core-test")
            .with_source_root("/p/core/src")
            .with_test_root("/p/core/tests"),
        Module::new("app", "/p/out/app", "/p/out/app-test")
            .with_source_root("/p/app/src")
            .depends_on("core"),
    ])
    .unwrap()
}

fn args(argv: &[&str]) -> CliArgs {
    let mut full = vec!["incbuild"];
    full.extend_from_slice(argv);
    CliArgs::try_parse_from(full).unwrap()
}

#[test]
fn plain_invocation_is_an_incremental_make() {
    let (scope, mode) = scope_from_args(&args(&[]), &project()).unwrap();
    assert_eq!(mode, BuildMode::Make);
    assert!(scope.is_affected(&BuildTarget::production("app")));
    assert!(scope.is_affected(&BuildTarget::test("core")));
    assert!(!scope.is_recompilation_forced(&BuildTarget::production("app")));
}

#[test]
fn tests_only_limits_the_variants() {
    let (scope, mode) = scope_from_args(&args(&["--tests-only"]), &project()).unwrap();
    assert_eq!(mode, BuildMode::Make);
    assert!(scope.is_affected(&BuildTarget::test("app")));
    assert!(!scope.is_affected(&BuildTarget::production("app")));
}

#[test]
fn rebuild_forces_everything() {
    let (scope, mode) = scope_from_args(&args(&["--rebuild"]), &project()).unwrap();
    assert_eq!(mode, BuildMode::Rebuild);
    assert!(scope.is_recompilation_forced(&BuildTarget::production("core")));
    assert!(scope.is_recompilation_forced(&BuildTarget::test("app")));
}

#[test]
fn named_modules_are_forced() {
    let (scope, mode) =
        scope_from_args(&args(&["--module", "core", "--production-only"]), &project()).unwrap();
    assert_eq!(mode, BuildMode::Forced);
    assert!(scope.is_recompilation_forced(&BuildTarget::production("core")));
    assert!(!scope.is_affected(&BuildTarget::test("core")));
    assert!(!scope.is_affected(&BuildTarget::production("app")));
}

#[test]
fn unknown_module_is_rejected() {
    let err = scope_from_args(&args(&["--module", "nope"]), &project()).unwrap_err();
    assert!(err.to_string().contains("unknown module 'nope'"));
}

#[test]
fn files_map_to_their_target() {
    let (scope, mode) =
        scope_from_args(&args(&["--file", "/p/core/tests/a_test.src"]), &project()).unwrap();
    assert_eq!(mode, BuildMode::Forced);
    let target = BuildTarget::test("core");
    assert!(scope.is_affected_file(&target, Path::new("/p/core/tests/a_test.src")));
    assert!(!scope.is_affected_file(&target, Path::new("/p/core/tests/other.src")));
    assert!(!scope.is_recompilation_forced(&target));
    assert!(!scope.is_affected(&BuildTarget::production("core")));
}

#[test]
fn files_outside_every_root_are_rejected() {
    let err = scope_from_args(&args(&["--file", "/tmp/stray.src"]), &project()).unwrap_err();
    assert!(err.to_string().contains("is not under any source root"));
}
