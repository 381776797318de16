// src/dag/chunks.rs

use std::collections::BTreeSet;
use std::fmt;

use petgraph::algo::tarjan_scc;

use crate::dag::graph::TargetGraph;
use crate::project::BuildTarget;
use crate::types::Variant;

/// A strongly connected set of targets, built as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleChunk {
    targets: Vec<BuildTarget>,
}

impl ModuleChunk {
    /// `targets` must be non-empty and share one variant.
    pub fn new(mut targets: Vec<BuildTarget>) -> Self {
        targets.sort();
        targets.dedup();
        Self { targets }
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn modules(&self) -> BTreeSet<&str> {
        self.targets.iter().map(|t| t.module.as_str()).collect()
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.targets.iter().any(|t| t.module == module)
    }

    pub fn variant(&self) -> Variant {
        self.targets
            .first()
            .map(|t| t.variant)
            .unwrap_or(Variant::Production)
    }

    pub fn is_tests(&self) -> bool {
        self.variant().is_tests()
    }

    pub fn name(&self) -> String {
        self.targets
            .iter()
            .map(|t| t.module.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ModuleChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({})", self.name(), self.variant())
    }
}

/// Chunks of the project split by phase, each list in build order.
#[derive(Debug, Clone, Default)]
pub struct ProjectChunks {
    production: Vec<ModuleChunk>,
    test: Vec<ModuleChunk>,
}

impl ProjectChunks {
    pub fn compute(graph: &TargetGraph) -> Self {
        let inner = graph.inner();
        let mut production = Vec::new();
        let mut test = Vec::new();

        // tarjan_scc yields components in post-order, so with edges pointing
        // at dependencies every chunk comes after everything it depends on.
        for component in tarjan_scc(inner) {
            let targets: Vec<BuildTarget> =
                component.into_iter().map(|n| inner[n].clone()).collect();
            let chunk = ModuleChunk::new(targets);
            match chunk.variant() {
                Variant::Production => production.push(chunk),
                Variant::Test => test.push(chunk),
            }
        }

        Self { production, test }
    }

    pub fn production(&self) -> &[ModuleChunk] {
        &self.production
    }

    pub fn test(&self) -> &[ModuleChunk] {
        &self.test
    }

    pub fn for_variant(&self, variant: Variant) -> &[ModuleChunk] {
        match variant {
            Variant::Production => &self.production,
            Variant::Test => &self.test,
        }
    }

    /// Index of the chunk containing `target` within its phase list.
    pub fn position_of(&self, target: &BuildTarget) -> Option<usize> {
        self.for_variant(target.variant)
            .iter()
            .position(|c| c.targets().contains(target))
    }

    pub fn all(&self) -> impl Iterator<Item = &ModuleChunk> {
        self.production.iter().chain(self.test.iter())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::project::Module;

    fn graph(list: Vec<Module>) -> TargetGraph {
        let map: BTreeMap<String, Module> = list.into_iter().map(|m| (m.name.clone(), m)).collect();
        TargetGraph::new(&map)
    }

    fn module(name: &str) -> Module {
        Module::new(name, format!("/out/{name}"), format!("/out/{name}-test"))
    }

    #[test]
    fn cycle_forms_one_chunk_after_its_dependencies() {
        let chunks = ProjectChunks::compute(&graph(vec![
            module("base"),
            module("x").depends_on("y").depends_on("base"),
            module("y").depends_on("x"),
            module("top").depends_on("x"),
        ]));

        let names: Vec<String> = chunks.production().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["base", "x, y", "top"]);
        assert_eq!(chunks.test().len(), 3);
        assert!(chunks.test().iter().all(|c| c.is_tests()));
    }

    #[test]
    fn every_target_lands_in_exactly_one_chunk() {
        let chunks = ProjectChunks::compute(&graph(vec![
            module("a"),
            module("b").depends_on("a"),
            module("c"),
        ]));

        let mut seen: Vec<&BuildTarget> = chunks.all().flat_map(|c| c.targets()).collect();
        seen.sort();
        assert_eq!(seen.len(), 6);
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }
}
