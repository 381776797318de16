// tests/common/mod.rs

#![allow(dead_code)]

pub use incbuild_test_utils::init_tracing;

use incbuild::fs::mock::MockFileSystem;
use incbuild_test_utils::fixture::{src, test_src};

/// Three modules in a chain, `c -> b -> a`, with two sources each and one
/// test in `a`.
pub fn seed_chain(fs: &MockFileSystem) {
    for module in ["a", "b", "c"] {
        fs.add_file(src(module, "one.src"), format!("{module} one"));
        fs.add_file(src(module, "two.src"), format!("{module} two"));
    }
    fs.add_file(test_src("a", "one_test.src"), "a test");
}
