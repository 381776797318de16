// src/project/roots.rs

use std::path::{Path, PathBuf};

use crate::project::module::Module;
use crate::project::target::BuildTarget;
use crate::types::Variant;

/// A source root resolved to the target that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDescriptor {
    pub root: PathBuf,
    pub target: BuildTarget,
    pub is_test: bool,
    pub package_prefix: String,
}

/// Lookup from files to the root (and thus target) that contains them.
#[derive(Debug, Clone, Default)]
pub struct RootsIndex {
    /// Sorted by descending path depth so the first prefix hit is the
    /// innermost root.
    roots: Vec<RootDescriptor>,
}

impl RootsIndex {
    pub fn new<'a>(modules: impl IntoIterator<Item = &'a Module>) -> Self {
        let mut roots: Vec<RootDescriptor> = modules
            .into_iter()
            .flat_map(|m| {
                m.roots.iter().map(move |r| RootDescriptor {
                    root: r.path.clone(),
                    target: BuildTarget::new(m.name.clone(), Variant::for_tests(r.is_test)),
                    is_test: r.is_test,
                    package_prefix: r.package_prefix.clone(),
                })
            })
            .collect();
        roots.sort_by(|a, b| {
            b.root
                .components()
                .count()
                .cmp(&a.root.components().count())
                .then_with(|| a.root.cmp(&b.root))
        });
        Self { roots }
    }

    /// Innermost root containing `file`.
    pub fn root_for_file(&self, file: &Path) -> Option<&RootDescriptor> {
        self.roots.iter().find(|rd| file.starts_with(&rd.root))
    }

    pub fn root(&self, root: &Path) -> Option<&RootDescriptor> {
        self.roots.iter().find(|rd| rd.root == root)
    }

    pub fn roots_of<'s, 't>(
        &'s self,
        target: &'t BuildTarget,
    ) -> impl Iterator<Item = &'s RootDescriptor> + use<'s, 't> {
        self.roots.iter().filter(move |rd| &rd.target == target)
    }

    pub fn all(&self) -> &[RootDescriptor] {
        &self.roots
    }

    /// Roots strictly nested inside `root` (owned by other descriptors).
    pub fn nested_in<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.roots
            .iter()
            .map(|rd| rd.root.as_path())
            .filter(move |p| *p != root && p.starts_with(root))
    }
}
