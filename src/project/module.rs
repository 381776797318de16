// src/project/module.rs

use std::path::{Path, PathBuf};

use crate::types::{DependencyScope, Variant};

/// A directory of sources belonging to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub path: PathBuf,
    pub is_test: bool,
    /// Package path prepended to outputs copied from this root, e.g. `com/acme`.
    pub package_prefix: String,
}

impl SourceRoot {
    pub fn new(path: impl Into<PathBuf>, is_test: bool) -> Self {
        Self {
            path: path.into(),
            is_test,
            package_prefix: String::new(),
        }
    }

    pub fn with_package_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.package_prefix = prefix.into();
        self
    }
}

/// A module-to-module edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub module: String,
    pub scope: DependencyScope,
    /// Re-export this dependency to modules depending on the owner.
    pub exported: bool,
}

impl Dependency {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            scope: DependencyScope::Compile,
            exported: false,
        }
    }

    pub fn scope(mut self, scope: DependencyScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }
}

/// A compilation unit. Immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub roots: Vec<SourceRoot>,
    pub excludes: Vec<PathBuf>,
    pub output: PathBuf,
    pub test_output: PathBuf,
    pub dependencies: Vec<Dependency>,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        output: impl Into<PathBuf>,
        test_output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            roots: Vec::new(),
            excludes: Vec::new(),
            output: output.into(),
            test_output: test_output.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_source_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(SourceRoot::new(path, false));
        self
    }

    pub fn with_test_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(SourceRoot::new(path, true));
        self
    }

    pub fn with_root(mut self, root: SourceRoot) -> Self {
        self.roots.push(root);
        self
    }

    pub fn with_exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excludes.push(path.into());
        self
    }

    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn depends_on(self, module: impl Into<String>) -> Self {
        self.with_dependency(Dependency::new(module))
    }

    pub fn output_dir(&self, variant: Variant) -> &Path {
        match variant {
            Variant::Production => &self.output,
            Variant::Test => &self.test_output,
        }
    }

    /// Roots compiled by the given variant.
    pub fn roots_for(&self, variant: Variant) -> impl Iterator<Item = &SourceRoot> {
        self.roots
            .iter()
            .filter(move |r| r.is_test == variant.is_tests())
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        crate::fs::is_under_any(&self.excludes, path)
    }
}
