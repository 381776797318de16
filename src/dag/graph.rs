// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::warn;

use crate::project::{BuildTarget, Dependency, Module};
use crate::types::{ClasspathKind, Variant};

/// Directed graph of build targets.
///
/// Edge direction: target -> dependency. For
///
/// ```toml
/// [module.app]
/// deps = [{ module = "core" }]
/// ```
///
/// we add `app:production -> core:production` and
/// `app:test -> core:production`, `app:test -> core:test`,
/// `app:test -> app:production`.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    graph: DiGraph<BuildTarget, ()>,
    index: HashMap<BuildTarget, NodeIndex>,
    /// Module name -> its declared dependencies, kept for classpath walks.
    deps: BTreeMap<String, Vec<Dependency>>,
}

impl TargetGraph {
    /// Assumes every dependency refers to a known module.
    pub fn new(modules: &BTreeMap<String, Module>) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for name in modules.keys() {
            for variant in Variant::ALL {
                let target = BuildTarget::new(name.clone(), variant);
                let node = graph.add_node(target.clone());
                index.insert(target, node);
            }
        }

        let deps: BTreeMap<String, Vec<Dependency>> = modules
            .iter()
            .map(|(name, m)| (name.clone(), m.dependencies.clone()))
            .collect();

        let mut edges = Vec::new();
        for target in index.keys() {
            for dep in compute_dependencies(&deps, target) {
                edges.push((index[target], index[&dep]));
            }
        }
        // Stable edge insertion keeps SCC output deterministic.
        edges.sort();
        edges.dedup();
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        Self { graph, index, deps }
    }

    pub fn inner(&self) -> &DiGraph<BuildTarget, ()> {
        &self.graph
    }

    pub fn targets(&self) -> impl Iterator<Item = &BuildTarget> {
        self.graph.node_weights()
    }

    /// Direct dependencies of a target, sorted.
    pub fn dependencies(&self, target: &BuildTarget) -> Vec<BuildTarget> {
        let Some(&node) = self.index.get(target) else {
            return Vec::new();
        };
        let mut out: Vec<BuildTarget> = self
            .graph
            .neighbors(node)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    /// Every module whose `kind` classpath sees `module`, either directly or
    /// through a chain of exported dependencies.
    pub fn dependents_recursive(&self, module: &str, kind: ClasspathKind) -> BTreeSet<String> {
        // Modules that expose `module` on their own classpath to dependents:
        // `module` itself plus everything re-exporting it.
        let mut exposing: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        exposing.insert(module);
        queue.push_back(module);

        while let Some(current) = queue.pop_front() {
            for (name, deps) in &self.deps {
                let reexports = deps.iter().any(|d| {
                    d.module == current && d.exported && d.scope.is_included_in(kind)
                });
                if reexports && exposing.insert(name.as_str()) {
                    queue.push_back(name.as_str());
                }
            }
        }

        self.deps
            .iter()
            .filter(|(name, deps)| {
                deps.iter().any(|d| {
                    d.module != **name
                        && exposing.contains(d.module.as_str())
                        && d.scope.is_included_in(kind)
                })
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Targets that must be built before `target`.
///
/// Production targets follow production-compile dependencies; test targets
/// follow test-compile dependencies (both variants of the dependency) and
/// always depend on their own production target.
pub fn compute_dependencies(
    deps: &BTreeMap<String, Vec<Dependency>>,
    target: &BuildTarget,
) -> Vec<BuildTarget> {
    let kind = ClasspathKind::compile(target.is_tests());
    let mut out = BTreeSet::new();

    for dep in deps.get(&target.module).into_iter().flatten() {
        if !dep.scope.is_included_in(kind) {
            continue;
        }
        if dep.module == target.module {
            warn!(module = %target.module, "ignoring dependency of module on itself");
            continue;
        }
        out.insert(BuildTarget::production(dep.module.clone()));
        if target.is_tests() {
            out.insert(BuildTarget::test(dep.module.clone()));
        }
    }

    if target.is_tests() {
        out.insert(BuildTarget::production(target.module.clone()));
    }

    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependencyScope;

    fn modules(list: Vec<Module>) -> BTreeMap<String, Module> {
        list.into_iter().map(|m| (m.name.clone(), m)).collect()
    }

    fn module(name: &str) -> Module {
        Module::new(name, format!("/out/{name}"), format!("/out/{name}-test"))
    }

    #[test]
    fn test_targets_see_both_variants_and_own_production() {
        let graph = TargetGraph::new(&modules(vec![
            module("core"),
            module("app").depends_on("core"),
        ]));

        assert_eq!(
            graph.dependencies(&BuildTarget::test("app")),
            vec![
                BuildTarget::production("app"),
                BuildTarget::production("core"),
                BuildTarget::test("core"),
            ]
        );
        assert_eq!(
            graph.dependencies(&BuildTarget::production("app")),
            vec![BuildTarget::production("core")]
        );
    }

    #[test]
    fn runtime_and_test_scopes_do_not_order_production() {
        let graph = TargetGraph::new(&modules(vec![
            module("core"),
            module("fixtures"),
            module("app")
                .with_dependency(Dependency::new("core").scope(DependencyScope::Runtime))
                .with_dependency(Dependency::new("fixtures").scope(DependencyScope::Test)),
        ]));

        assert!(graph.dependencies(&BuildTarget::production("app")).is_empty());
        assert!(graph
            .dependencies(&BuildTarget::test("app"))
            .contains(&BuildTarget::test("fixtures")));
    }

    #[test]
    fn self_dependency_is_ignored() {
        let graph = TargetGraph::new(&modules(vec![module("solo").depends_on("solo")]));
        assert!(graph.dependencies(&BuildTarget::production("solo")).is_empty());
    }

    #[test]
    fn dependents_follow_exported_chains_only() {
        // c -> b -(exported)-> a ; d -> e -> a (not exported)
        let graph = TargetGraph::new(&modules(vec![
            module("a"),
            module("b").with_dependency(Dependency::new("a").exported()),
            module("c").depends_on("b"),
            module("e").depends_on("a"),
            module("d").depends_on("e"),
        ]));

        let dependents = graph.dependents_recursive("a", ClasspathKind::ProductionCompile);
        let names: Vec<&str> = dependents.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "c", "e"]);
    }
}
