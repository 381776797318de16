// src/scope.rs

//! Which targets and files a build run covers.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::dag::ModuleChunk;
use crate::project::BuildTarget;
use crate::types::Variant;

/// Immutable query object describing what a build covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileScope {
    types: BTreeSet<Variant>,
    forced_types: BTreeSet<Variant>,
    targets: BTreeSet<BuildTarget>,
    forced_targets: BTreeSet<BuildTarget>,
    modules: BTreeSet<String>,
    files: BTreeMap<BuildTarget, BTreeSet<PathBuf>>,
}

impl CompileScope {
    /// Both variants of every module; `forced` recompiles everything.
    pub fn all(forced: bool) -> Self {
        let mut builder = Self::builder().all_types();
        if forced {
            builder = builder.force_all_types();
        }
        builder.build()
    }

    pub fn builder() -> CompileScopeBuilder {
        CompileScopeBuilder::default()
    }

    fn is_whole_target_affected(&self, target: &BuildTarget) -> bool {
        self.types.contains(&target.variant)
            || self.targets.contains(target)
            || self.modules.contains(&target.module)
    }

    pub fn is_affected(&self, target: &BuildTarget) -> bool {
        self.is_whole_target_affected(target) || self.files.contains_key(target)
    }

    pub fn is_chunk_affected(&self, chunk: &ModuleChunk) -> bool {
        chunk.targets().iter().any(|t| self.is_affected(t))
    }

    pub fn is_affected_file(&self, target: &BuildTarget, file: &Path) -> bool {
        if self.is_whole_target_affected(target) {
            return true;
        }
        self.files
            .get(target)
            .is_some_and(|files| files.contains(file))
    }

    pub fn is_recompilation_forced(&self, target: &BuildTarget) -> bool {
        self.forced_types.contains(&target.variant) || self.forced_targets.contains(target)
    }

    /// Files explicitly requested for `target`.
    pub fn files(&self, target: &BuildTarget) -> impl Iterator<Item = &Path> {
        self.files
            .get(target)
            .into_iter()
            .flat_map(|f| f.iter().map(PathBuf::as_path))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileScopeBuilder {
    scope: CompileScope,
}

impl CompileScopeBuilder {
    pub fn all_types(mut self) -> Self {
        self.scope.types.extend(Variant::ALL);
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.scope.types.insert(variant);
        self
    }

    pub fn force_all_types(mut self) -> Self {
        self.scope.forced_types.extend(Variant::ALL);
        self
    }

    pub fn force_variant(mut self, variant: Variant) -> Self {
        self.scope.types.insert(variant);
        self.scope.forced_types.insert(variant);
        self
    }

    pub fn target(mut self, target: BuildTarget) -> Self {
        self.scope.targets.insert(target);
        self
    }

    pub fn forced_target(mut self, target: BuildTarget) -> Self {
        self.scope.targets.insert(target.clone());
        self.scope.forced_targets.insert(target);
        self
    }

    /// Naming a module covers every target of it.
    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.scope.modules.insert(name.into());
        self
    }

    /// Cover and force-recompile every target of the module.
    pub fn forced_module(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        for variant in Variant::ALL {
            self.scope
                .forced_targets
                .insert(BuildTarget::new(name.clone(), variant));
        }
        self.scope.modules.insert(name);
        self
    }

    pub fn file(mut self, target: BuildTarget, file: impl Into<PathBuf>) -> Self {
        self.scope.files.entry(target).or_default().insert(file.into());
        self
    }

    pub fn build(self) -> CompileScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_cover_both_variants() {
        let scope = CompileScope::builder().module("core").build();
        assert!(scope.is_affected(&BuildTarget::production("core")));
        assert!(scope.is_affected(&BuildTarget::test("core")));
        assert!(!scope.is_affected(&BuildTarget::production("app")));
        assert!(!scope.is_recompilation_forced(&BuildTarget::test("core")));
    }

    #[test]
    fn file_restriction_applies_only_to_partially_covered_targets() {
        let target = BuildTarget::production("core");
        let scope = CompileScope::builder()
            .file(target.clone(), "/p/src/a.txt")
            .build();

        assert!(scope.is_affected(&target));
        assert!(scope.is_affected_file(&target, Path::new("/p/src/a.txt")));
        assert!(!scope.is_affected_file(&target, Path::new("/p/src/b.txt")));

        let whole = CompileScope::all(false);
        assert!(whole.is_affected_file(&target, Path::new("/p/src/b.txt")));
    }

    #[test]
    fn forced_scope_forces_every_target() {
        let scope = CompileScope::all(true);
        assert!(scope.is_recompilation_forced(&BuildTarget::test("any")));
        assert!(!CompileScope::all(false).is_recompilation_forced(&BuildTarget::test("any")));
    }
}
