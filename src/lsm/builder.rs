// LSM construction: graph -> tree -> aggregated dependencies -> levels.
//
// Levelling works scope by scope, parents first:
// - a scope with fewer than two children has nothing to order
// - otherwise its cycles are removed, then every child gets the length of
//   the longest dependency path (in sibling hops) starting at it
// - a scope that stays cyclic is reported and its subtree is left unlevelled
//
// Scopes are visited from a pre-order list, so nesting depth never grows the
// call stack.

use std::collections::{HashMap, HashSet};

use tracing::{error, info, warn};

use super::cycle_removal::{RemovedDependency, remove_cyclic_dependencies};
use super::dependencies::UnresolvedTarget;
use super::{LsmTree, NodeId};
use crate::error::{CityError, Result};
use crate::graph::DependencyGraph;

/// A fully levelled tree plus what was changed or dropped to get there.
#[derive(Debug, Clone)]
pub struct Lsm {
    pub tree: LsmTree,
    /// Feedback edges, in removal order.
    pub removed: Vec<RemovedDependency>,
    pub unresolved: Vec<UnresolvedTarget>,
}

pub struct LsmBuilder<'g> {
    graph: &'g DependencyGraph,
    tree: LsmTree,
    removed: Vec<RemovedDependency>,
    unresolved: Vec<UnresolvedTarget>,
    violations: Vec<CityError>,
}

impl<'g> LsmBuilder<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            tree: LsmTree::new(),
            removed: Vec::new(),
            unresolved: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Runs the whole construction for `graph`.
    pub fn build(graph: &'g DependencyGraph) -> Result<Lsm> {
        let mut builder = Self::new(graph);
        builder.construct();
        builder.finish()
    }

    fn construct(&mut self) {
        self.tree = LsmTree::from_graph(self.graph);
        info!(nodes = self.tree.node_count(), links = self.graph.link_count(), "built hierarchy");

        self.unresolved = self.tree.aggregate_dependencies(self.graph);

        self.levelize();
        info!(removed = self.removed.len(), "levelled hierarchy");
    }

    /// Levels every scope, parents first. A scope whose cycles cannot be
    /// broken is reported and its whole subtree is skipped.
    fn levelize(&mut self) {
        let mut stopped: HashSet<NodeId> = HashSet::new();

        for scope in self.tree.pre_order() {
            if let Some(parent) = self.tree.node(scope).parent {
                if stopped.contains(&parent) {
                    stopped.insert(scope);
                    continue;
                }
            }
            if self.tree.children(scope).len() < 2 {
                continue;
            }

            match remove_cyclic_dependencies(&mut self.tree, scope) {
                Ok(removed) => self.removed.extend(removed),
                Err(err) => {
                    self.violations.push(err);
                    stopped.insert(scope);
                    continue;
                }
            }
            assign_levels(&mut self.tree, scope);
        }
    }

    fn finish(mut self) -> Result<Lsm> {
        if !self.violations.is_empty() {
            for violation in &self.violations {
                error!(%violation, "layering failed");
            }
            return Err(self.violations.swap_remove(0));
        }
        Ok(Lsm {
            tree: self.tree,
            removed: self.removed,
            unresolved: self.unresolved,
        })
    }
}

/// Sets the level of every child of `scope` to its longest in-scope path length.
pub(crate) fn assign_levels(tree: &mut LsmTree, scope: NodeId) {
    let members = tree.children(scope).to_vec();
    let mut memo: HashMap<NodeId, usize> = HashMap::new();
    for member in members {
        let level = longest_path(tree, scope, member, &mut memo);
        tree.node_mut(member).level = level;
    }
}

struct Frame {
    node: NodeId,
    targets: Vec<NodeId>,
    next: usize,
    best: usize,
}

impl Frame {
    fn new(tree: &LsmTree, scope: NodeId, node: NodeId) -> Self {
        let targets = tree
            .node(node)
            .dependencies
            .values()
            .filter(|dep| dep.count > 0 && tree.node(dep.target).parent == Some(scope))
            .map(|dep| dep.target)
            .collect();
        Self {
            node,
            targets,
            next: 0,
            best: 0,
        }
    }
}

/// Number of hops on the longest dependency path starting at `start`.
/// Dependencies that lead back onto the current path are residual cycles and
/// are dropped from the live tree.
fn longest_path(
    tree: &mut LsmTree,
    scope: NodeId,
    start: NodeId,
    memo: &mut HashMap<NodeId, usize>,
) -> usize {
    if let Some(&level) = memo.get(&start) {
        return level;
    }

    let mut on_path: HashSet<NodeId> = HashSet::from([start]);
    let mut frames = vec![Frame::new(tree, scope, start)];

    while let Some(top) = frames.last_mut() {
        if top.next < top.targets.len() {
            let target = top.targets[top.next];
            top.next += 1;

            if let Some(&level) = memo.get(&target) {
                top.best = top.best.max(level + 1);
                continue;
            }
            if on_path.contains(&target) {
                let node = top.node;
                let target_name = tree.node(target).full_name.clone();
                warn!(from = %tree.node(node).full_name, to = %target_name, "dropping residual cyclic dependency");
                tree.node_mut(node).dependencies.remove(&target_name);
                continue;
            }

            on_path.insert(target);
            frames.push(Frame::new(tree, scope, target));
            continue;
        }

        let Some(done) = frames.pop() else { break };
        on_path.remove(&done.node);
        memo.insert(done.node, done.best);
        match frames.last_mut() {
            Some(parent) => parent.best = parent.best.max(done.best + 1),
            None => return done.best,
        }
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(links: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (from, to) in links {
            graph.add_link(from, to).unwrap();
        }
        graph
    }

    fn level(lsm: &Lsm, name: &str) -> usize {
        lsm.tree.node(lsm.tree.get_by_name(name).unwrap()).level
    }

    #[test]
    fn test_chain_levels() {
        let graph = graph_of(&[("p.A", "p.B"), ("p.B", "p.C")]);
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert_eq!(level(&lsm, "p.A"), 2);
        assert_eq!(level(&lsm, "p.B"), 1);
        assert_eq!(level(&lsm, "p.C"), 0);
        assert!(lsm.removed.is_empty());
    }

    #[test]
    fn test_longest_path_wins_over_shortcut() {
        // A reaches D directly and through B -> C
        let graph = graph_of(&[
            ("p.A", "p.D"),
            ("p.A", "p.B"),
            ("p.B", "p.C"),
            ("p.C", "p.D"),
        ]);
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert_eq!(level(&lsm, "p.A"), 3);
        assert_eq!(level(&lsm, "p.B"), 2);
        assert_eq!(level(&lsm, "p.C"), 1);
        assert_eq!(level(&lsm, "p.D"), 0);
    }

    #[test]
    fn test_single_child_scope_keeps_default_level() {
        let graph = graph_of(&[("a.b.A", "a.b.B")]);
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert_eq!(level(&lsm, "a"), 0);
        assert_eq!(level(&lsm, "a.b"), 0);
        assert_eq!(level(&lsm, "a.b.A"), 1);
        assert_eq!(level(&lsm, "a.b.B"), 0);
    }

    #[test]
    fn test_cycle_is_broken_before_levelling() {
        let graph = graph_of(&[("p.A", "p.B"), ("p.B", "p.C"), ("p.C", "p.A")]);
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert_eq!(lsm.removed.len(), 1);
        assert_eq!(lsm.removed[0].from, "p.A");
        assert_eq!(lsm.removed[0].to, "p.B");
        // remaining chain: B -> C -> A
        assert_eq!(level(&lsm, "p.B"), 2);
        assert_eq!(level(&lsm, "p.C"), 1);
        assert_eq!(level(&lsm, "p.A"), 0);
    }

    #[test]
    fn test_package_levels_follow_package_dependencies() {
        let graph = graph_of(&[("x.A", "y.B"), ("y.B", "z.C")]);
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert_eq!(level(&lsm, "x"), 2);
        assert_eq!(level(&lsm, "y"), 1);
        assert_eq!(level(&lsm, "z"), 0);
    }

    #[test]
    fn test_residual_cycle_is_dropped_while_levelling() {
        let graph = graph_of(&[("p.A", "p.B"), ("p.B", "p.A")]);
        let mut tree = LsmTree::from_graph(&graph);
        tree.aggregate_dependencies(&graph);
        let scope = tree.get_by_name("p").unwrap();

        // skip cycle removal on purpose
        assign_levels(&mut tree, scope);

        let a = tree.get_by_name("p.A").unwrap();
        let b = tree.get_by_name("p.B").unwrap();
        assert_eq!(tree.node(a).level, 1);
        assert_eq!(tree.node(b).level, 0);
        assert!(tree.node(b).dependencies.is_empty());
    }

    #[test]
    fn test_self_loop_terminates() {
        let graph = graph_of(&[("p.A", "p.A"), ("p.A", "p.B")]);
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert_eq!(level(&lsm, "p.A"), 1);
        assert_eq!(level(&lsm, "p.B"), 0);
    }

    #[test]
    fn test_empty_graph_builds_bare_root() {
        let graph = DependencyGraph::new();
        let lsm = LsmBuilder::build(&graph).unwrap();

        assert!(lsm.tree.has_only_root());
        assert_eq!(lsm.tree.node_count(), 1);
        assert!(lsm.removed.is_empty());
    }

    #[test]
    fn test_deeply_nested_name_is_levelled() {
        let segments: Vec<String> = (0..5000).map(|i| format!("s{i}")).collect();
        let deep = segments.join(".");
        let mut graph = DependencyGraph::new();
        graph.add_link(&deep, "x.Y").unwrap();
        graph.add_link("x.Y", "x.Z").unwrap();

        let lsm = LsmBuilder::build(&graph).unwrap();

        // root scope: s0 depends on x
        assert_eq!(level(&lsm, "s0"), 1);
        assert_eq!(level(&lsm, "x"), 0);
        assert_eq!(level(&lsm, "x.Y"), 1);
        assert_eq!(lsm.tree.node_count(), 1 + 5000 + 3);
    }
}
