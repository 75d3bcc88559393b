// Heuristic cycle breaking inside one scope.
//
// Per detected cycle, the consecutive pairs (wrapping last -> first) are
// weighted by their aggregated link count. The lightest positive pairs are
// candidates; ties prefer the source with the fewest dependency entries, then
// the lexicographically smallest (from, to) pair. One edge per cycle is
// removed, then detection runs again until the scope is acyclic.
//
// Picks are made on a snapshot of the detection pass and applied afterwards,
// so the live dependency maps are never mutated while being read.

use serde::Serialize;
use tracing::{debug, error};

use super::{LsmTree, NodeId};
use crate::error::{CityError, Result};
use crate::graph::{CycleDetector, NamedGraph};

/// A feedback edge removed to make its scope acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedDependency {
    pub from: String,
    pub to: String,
    /// Link count of the removed dependency.
    pub weight: usize,
}

/// The children of one package, seen as a graph over their sibling dependencies.
#[derive(Debug, Clone, Copy)]
pub struct ScopeGraph<'a> {
    tree: &'a LsmTree,
    scope: NodeId,
}

impl<'a> ScopeGraph<'a> {
    pub fn new(tree: &'a LsmTree, scope: NodeId) -> Self {
        Self { tree, scope }
    }
}

impl NamedGraph for ScopeGraph<'_> {
    fn node_names(&self) -> Vec<&str> {
        self.tree
            .children(self.scope)
            .iter()
            .map(|&c| self.tree.node(c).full_name.as_str())
            .collect()
    }

    fn successors(&self, name: &str) -> Vec<&str> {
        let Some(id) = self.tree.get_by_name(name) else {
            return Vec::new();
        };
        self.tree
            .node(id)
            .dependencies
            .values()
            .filter(|dep| dep.count > 0 && self.tree.node(dep.target).parent == Some(self.scope))
            .map(|dep| self.tree.node(dep.target).full_name.as_str())
            .collect()
    }
}

/// Removes dependencies among the children of `scope` until none of them form a cycle.
/// Returns the removed edges in removal order.
pub fn remove_cyclic_dependencies(tree: &mut LsmTree, scope: NodeId) -> Result<Vec<RemovedDependency>> {
    let mut removed = Vec::new();

    loop {
        let detector = CycleDetector::for_graph(&ScopeGraph::new(tree, scope));
        if !detector.has_cycles() {
            return Ok(removed);
        }

        let mut picks: Vec<(NodeId, NodeId)> = Vec::with_capacity(detector.cycles().len());
        for cycle in detector.cycles() {
            match pick_feedback_edge(tree, cycle) {
                Some(pick) => picks.push(pick),
                None => {
                    let scope_name = scope_display_name(tree, scope);
                    error!(scope = %scope_name, cycle = ?cycle, "cycle has no removable dependency");
                    return Err(CityError::CyclicScope {
                        scope: scope_name,
                        cycle: cycle.clone(),
                    });
                }
            }
        }

        for (from, to) in picks {
            let to_name = tree.node(to).full_name.clone();
            let from_node = tree.node_mut(from);
            let Some(dep) = from_node.dependencies.remove(&to_name) else {
                continue;
            };
            debug!(from = %from_node.full_name, to = %to_name, weight = dep.count, "removed cyclic dependency");
            removed.push(RemovedDependency {
                from: from_node.full_name.clone(),
                to: to_name,
                weight: dep.count,
            });
        }
    }
}

/// Chooses the edge to drop from `cycle`, or `None` if no consecutive pair is an edge.
fn pick_feedback_edge(tree: &LsmTree, cycle: &[String]) -> Option<(NodeId, NodeId)> {
    let mut candidates: Vec<(NodeId, NodeId)> = Vec::new();
    let mut min_weight = usize::MAX;

    for (i, from_name) in cycle.iter().enumerate() {
        let to_name = &cycle[(i + 1) % cycle.len()];
        let (Some(from), Some(to)) = (tree.get_by_name(from_name), tree.get_by_name(to_name)) else {
            continue;
        };
        if from == to {
            continue;
        }
        let weight = tree.depends(from, to);
        if weight == 0 {
            continue;
        }
        if weight < min_weight {
            candidates.clear();
            min_weight = weight;
        }
        if weight == min_weight {
            candidates.push((from, to));
        }
    }

    candidates.into_iter().min_by(|a, b| {
        let out_a = tree.node(a.0).dependencies.len();
        let out_b = tree.node(b.0).dependencies.len();
        out_a
            .cmp(&out_b)
            .then_with(|| tree.node(a.0).full_name.cmp(&tree.node(b.0).full_name))
            .then_with(|| tree.node(a.1).full_name.cmp(&tree.node(b.1).full_name))
    })
}

pub(crate) fn scope_display_name(tree: &LsmTree, scope: NodeId) -> String {
    let node = tree.node(scope);
    if node.full_name.is_empty() {
        node.name.clone()
    } else {
        node.full_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;

    fn scoped_tree(links: &[(&str, &str)]) -> (LsmTree, NodeId) {
        let mut graph = DependencyGraph::new();
        for (from, to) in links {
            graph.add_link(from, to).unwrap();
        }
        let mut tree = LsmTree::from_graph(&graph);
        tree.aggregate_dependencies(&graph);
        let scope = tree.get_by_name("s").unwrap();
        (tree, scope)
    }

    fn pairs(removed: &[RemovedDependency]) -> Vec<(&str, &str)> {
        removed.iter().map(|r| (r.from.as_str(), r.to.as_str())).collect()
    }

    #[test]
    fn test_acyclic_scope_is_untouched() {
        let (mut tree, scope) = scoped_tree(&[("s.A", "s.B"), ("s.B", "s.C")]);
        let removed = remove_cyclic_dependencies(&mut tree, scope).unwrap();

        assert!(removed.is_empty());
        assert_eq!(tree.node(tree.get_by_name("s.A").unwrap()).dependencies.len(), 1);
    }

    #[test]
    fn test_lightest_edge_is_removed() {
        // s.A -> s.sub weighs 2, s.sub -> s.A weighs 1
        let (mut tree, scope) = scoped_tree(&[
            ("s.A", "s.sub.X"),
            ("s.A", "s.sub.Y"),
            ("s.sub.X", "s.A"),
        ]);
        let removed = remove_cyclic_dependencies(&mut tree, scope).unwrap();

        assert_eq!(pairs(&removed), vec![("s.sub", "s.A")]);
        assert_eq!(removed[0].weight, 1);
        let sub = tree.get_by_name("s.sub").unwrap();
        assert!(tree.node(sub).dependencies.is_empty());
        assert!(!CycleDetector::for_graph(&ScopeGraph::new(&tree, scope)).has_cycles());
    }

    #[test]
    fn test_tie_prefers_source_with_fewest_dependencies() {
        // A -> B -> C -> A, all weight 1; A also depends on D, B on D
        let (mut tree, scope) = scoped_tree(&[
            ("s.A", "s.B"),
            ("s.B", "s.C"),
            ("s.C", "s.A"),
            ("s.A", "s.D"),
            ("s.B", "s.D"),
        ]);
        let removed = remove_cyclic_dependencies(&mut tree, scope).unwrap();

        assert_eq!(pairs(&removed), vec![("s.C", "s.A")]);
    }

    #[test]
    fn test_full_tie_breaks_lexicographically() {
        let (mut tree, scope) = scoped_tree(&[("s.A", "s.B"), ("s.B", "s.A")]);
        let removed = remove_cyclic_dependencies(&mut tree, scope).unwrap();

        assert_eq!(pairs(&removed), vec![("s.A", "s.B")]);
    }

    #[test]
    fn test_separate_cycles_each_lose_one_edge() {
        let (mut tree, scope) = scoped_tree(&[
            ("s.A", "s.B"),
            ("s.B", "s.A"),
            ("s.C", "s.D"),
            ("s.D", "s.C"),
        ]);
        assert_eq!(CycleDetector::for_graph(&ScopeGraph::new(&tree, scope)).cycles().len(), 2);

        let removed = remove_cyclic_dependencies(&mut tree, scope).unwrap();

        assert_eq!(pairs(&removed), vec![("s.A", "s.B"), ("s.C", "s.D")]);
        assert!(removed.iter().all(|r| r.weight == 1));
        assert!(!CycleDetector::for_graph(&ScopeGraph::new(&tree, scope)).has_cycles());
        // the reverse edges survive
        assert_eq!(tree.depends(tree.get_by_name("s.B").unwrap(), tree.get_by_name("s.A").unwrap()), 1);
        assert_eq!(tree.depends(tree.get_by_name("s.D").unwrap(), tree.get_by_name("s.C").unwrap()), 1);
    }

    #[test]
    fn test_repeats_until_acyclic() {
        // complete digraph on three nodes needs more than one removal
        let (mut tree, scope) = scoped_tree(&[
            ("s.A", "s.B"),
            ("s.B", "s.A"),
            ("s.B", "s.C"),
            ("s.C", "s.B"),
            ("s.A", "s.C"),
            ("s.C", "s.A"),
        ]);
        let removed = remove_cyclic_dependencies(&mut tree, scope).unwrap();

        assert!(removed.len() >= 2);
        assert!(!CycleDetector::for_graph(&ScopeGraph::new(&tree, scope)).has_cycles());
    }

    #[test]
    fn test_removal_is_deterministic() {
        let links = [
            ("s.A", "s.B"),
            ("s.B", "s.C"),
            ("s.C", "s.A"),
            ("s.C", "s.D"),
            ("s.D", "s.C"),
            ("s.D", "s.A"),
        ];
        let (mut first, scope) = scoped_tree(&links);
        let (mut second, _) = scoped_tree(&links);

        let a = remove_cyclic_dependencies(&mut first, scope).unwrap();
        let b = remove_cyclic_dependencies(&mut second, scope).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
