// src/project/mod.rs

//! The immutable project model: modules, their roots, and the chunked
//! target graph derived from them.

pub mod module;
pub mod roots;
pub mod target;

use std::collections::BTreeMap;

use tracing::debug;

use crate::dag::{ProjectChunks, TargetGraph};
use crate::errors::{BuildError, Result};
use crate::types::Variant;

pub use module::{Dependency, Module, SourceRoot};
pub use roots::{RootDescriptor, RootsIndex};
pub use target::BuildTarget;

#[derive(Debug, Clone)]
pub struct Project {
    modules: BTreeMap<String, Module>,
    roots: RootsIndex,
    graph: TargetGraph,
    chunks: ProjectChunks,
}

impl Project {
    /// Build the project model. Fails on duplicate module names and on
    /// dependencies naming modules that do not exist.
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for module in modules {
            if by_name.contains_key(&module.name) {
                return Err(BuildError::ConfigError(format!(
                    "module '{}' is defined more than once",
                    module.name
                )));
            }
            by_name.insert(module.name.clone(), module);
        }

        for module in by_name.values() {
            for dep in &module.dependencies {
                if !by_name.contains_key(&dep.module) {
                    return Err(BuildError::ConfigError(format!(
                        "module '{}' depends on unknown module '{}'",
                        module.name, dep.module
                    )));
                }
            }
        }

        let roots = RootsIndex::new(by_name.values());
        let graph = TargetGraph::new(&by_name);
        let chunks = ProjectChunks::compute(&graph);
        debug!(
            modules = by_name.len(),
            production_chunks = chunks.production().len(),
            test_chunks = chunks.test().len(),
            "project model built"
        );

        Ok(Self {
            modules: by_name,
            roots,
            graph,
            chunks,
        })
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn roots(&self) -> &RootsIndex {
        &self.roots
    }

    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    pub fn chunks(&self) -> &ProjectChunks {
        &self.chunks
    }

    /// Every (production, test) target pair of every module.
    pub fn targets(&self) -> impl Iterator<Item = BuildTarget> + '_ {
        self.modules
            .keys()
            .flat_map(|name| Variant::ALL.map(|v| BuildTarget::new(name.clone(), v)))
    }
}
