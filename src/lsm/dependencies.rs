// Dependency aggregation per scope.
//
// Raw class-level links are rolled up to sibling granularity:
// - a class depends on siblings (classes or packages) under its parent
// - a package depends on its siblings through any link leaving it
// - the root has no dependencies
//
// Each aggregated `Dependency` keeps the number of raw links it folds in;
// that count is the edge weight used by cycle removal.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::{LsmTree, NodeId, NodeKind, is_inside, is_within};
use crate::graph::DependencyGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub target: NodeId,
    /// Number of raw links folded into this dependency.
    pub count: usize,
    /// Raw links by source full name, kept for diagnostics.
    pub per_source_targets: BTreeMap<String, Vec<String>>,
}

impl Dependency {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            count: 0,
            per_source_targets: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, from: &str, to: &str) {
        self.per_source_targets
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.count += 1;
    }
}

/// A raw link whose target has no node in the scope it should resolve in.
/// The contribution is dropped; layering continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTarget {
    pub source: String,
    pub target: String,
    pub scope: String,
}

impl LsmTree {
    /// Computes the sibling dependencies of every node, parents first.
    pub fn aggregate_dependencies(&mut self, graph: &DependencyGraph) -> Vec<UnresolvedTarget> {
        let mut unresolved = Vec::new();
        for id in self.pre_order() {
            let deps = match self.node(id).kind {
                NodeKind::Class => self.class_dependencies(id, graph, &mut unresolved),
                NodeKind::Package => self.package_dependencies(id, graph, &mut unresolved),
            };
            self.node_mut(id).dependencies = deps;
        }
        unresolved
    }

    fn class_dependencies(
        &self,
        id: NodeId,
        graph: &DependencyGraph,
        unresolved: &mut Vec<UnresolvedTarget>,
    ) -> BTreeMap<String, Dependency> {
        let mut result = BTreeMap::new();
        let node = self.node(id);
        let Some(parent) = node.parent else {
            return result;
        };
        let scope = &self.node(parent).full_name;

        for target in graph.targets(&node.full_name) {
            // links leaving the parent are accounted for by an ancestor package
            if !is_inside(target, scope) {
                continue;
            }
            self.accumulate(&mut result, id, parent, &node.full_name, target, unresolved);
        }
        result
    }

    fn package_dependencies(
        &self,
        id: NodeId,
        graph: &DependencyGraph,
        unresolved: &mut Vec<UnresolvedTarget>,
    ) -> BTreeMap<String, Dependency> {
        let mut result = BTreeMap::new();
        let node = self.node(id);
        let Some(parent) = node.parent else {
            return result;
        };
        let own = &node.full_name;
        let scope = &self.node(parent).full_name;

        for source in graph.sources().filter(|s| is_within(s, own)) {
            for target in graph.targets(source) {
                if is_within(target, own) || !is_inside(target, scope) {
                    continue;
                }
                self.accumulate(&mut result, id, parent, source, target, unresolved);
            }
        }
        result
    }

    fn accumulate(
        &self,
        result: &mut BTreeMap<String, Dependency>,
        id: NodeId,
        parent: NodeId,
        source: &str,
        target: &str,
        unresolved: &mut Vec<UnresolvedTarget>,
    ) {
        match self.resolve_in_scope(parent, target) {
            // self-loops never order siblings
            Some(sibling) if sibling == id => {}
            Some(sibling) => result
                .entry(self.node(sibling).full_name.clone())
                .or_insert_with(|| Dependency::new(sibling))
                .add(source, target),
            None => {
                let scope = self.node(parent).full_name.clone();
                warn!(%source, %target, %scope, "dependency target not found in scope");
                unresolved.push(UnresolvedTarget {
                    source: source.to_string(),
                    target: target.to_string(),
                    scope,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(links: &[(&str, &str)]) -> (DependencyGraph, LsmTree) {
        let mut graph = DependencyGraph::new();
        for (from, to) in links {
            graph.add_link(from, to).unwrap();
        }
        let mut tree = LsmTree::from_graph(&graph);
        let unresolved = tree.aggregate_dependencies(&graph);
        assert!(unresolved.is_empty());
        (graph, tree)
    }

    fn deps_of<'a>(tree: &'a LsmTree, name: &str) -> &'a BTreeMap<String, Dependency> {
        &tree.node(tree.get_by_name(name).unwrap()).dependencies
    }

    #[test]
    fn test_class_depends_on_sibling_class() {
        let (_, tree) = build(&[("x.A", "x.B")]);

        let deps = deps_of(&tree, "x.A");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps["x.B"].count, 1);
        assert_eq!(deps["x.B"].target, tree.get_by_name("x.B").unwrap());
        assert!(deps_of(&tree, "x.B").is_empty());
    }

    #[test]
    fn test_class_depends_on_sibling_subpackage() {
        let (_, tree) = build(&[("x.A", "x.sub.B"), ("x.A", "x.sub.C")]);

        let deps = deps_of(&tree, "x.A");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps["x.sub"].count, 2);
        assert_eq!(
            deps["x.sub"].per_source_targets["x.A"],
            vec!["x.sub.B".to_string(), "x.sub.C".to_string()]
        );
    }

    #[test]
    fn test_package_dependencies_roll_up() {
        let (_, tree) = build(&[
            ("x.A", "y.C"),
            ("x.B", "y.C"),
            ("x.B", "y.D"),
            ("x.A", "x.B"),
        ]);

        let deps = deps_of(&tree, "x");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps["y"].count, 3);
        // class links leaving the parent do not show up on the class
        assert!(!deps_of(&tree, "x.A").contains_key("y"));
        assert_eq!(deps_of(&tree, "x.A")["x.B"].count, 1);
        assert!(deps_of(&tree, "y").is_empty());
    }

    #[test]
    fn test_nested_package_dependencies_stay_in_scope() {
        let (_, tree) = build(&[("a.p.A", "a.q.B"), ("a.p.A", "z.C")]);

        let p_deps = deps_of(&tree, "a.p");
        assert_eq!(p_deps.len(), 1);
        assert_eq!(p_deps["a.q"].count, 1);
        assert_eq!(deps_of(&tree, "a")["z"].count, 1);
    }

    #[test]
    fn test_root_and_self_loops_have_no_dependencies() {
        let (_, tree) = build(&[("x.A", "x.A"), ("x.A", "y.B")]);

        assert!(tree.node(tree.root()).dependencies.is_empty());
        assert!(deps_of(&tree, "x.A").is_empty());
    }

    #[test]
    fn test_unresolved_target_is_reported() {
        let mut graph = DependencyGraph::new();
        graph.add_link("x.A", "x.B").unwrap();
        let mut tree = LsmTree::new();
        tree.insert_path("x.A");

        let unresolved = tree.aggregate_dependencies(&graph);
        assert_eq!(
            unresolved,
            vec![UnresolvedTarget {
                source: "x.A".to_string(),
                target: "x.B".to_string(),
                scope: "x".to_string(),
            }]
        );
        assert!(deps_of(&tree, "x.A").is_empty());
    }
}
