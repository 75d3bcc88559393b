// Hierarchy tree (LSM): dotted names -> packages and classes.
//
// What this does:
// - Turns every name of the dependency graph into a path of nodes:
//   prefix segments become packages, the last segment becomes a class
// - Stores the tree as an arena indexed by `NodeId`; parents are indices,
//   children are owned id lists in discovery order
// - Enforces global uniqueness of full names (shared prefixes reuse nodes)
// - Provides pre/post-order traversal in place of a visitor interface
//
// The root is a package with the short name "root" and an empty full name,
// so every top-level segment is a child of the root.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::graph::DependencyGraph;

mod builder;
mod cycle_removal;
mod dependencies;

pub use builder::{Lsm, LsmBuilder};
pub use cycle_removal::{RemovedDependency, ScopeGraph, remove_cyclic_dependencies};
pub use dependencies::{Dependency, UnresolvedTarget};

pub const ROOT_NAME: &str = "root";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Package,
    Class,
}

#[derive(Debug, Clone)]
pub struct LsmNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Short name: the last segment of `full_name`.
    pub name: String,
    /// Unique dotted path. Empty for the root.
    pub full_name: String,
    /// Row in the layout. 0 until levelled.
    pub level: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Dependencies on siblings, keyed by the sibling's full name.
    pub dependencies: BTreeMap<String, Dependency>,
}

impl LsmNode {
    pub fn is_class(&self) -> bool {
        self.kind == NodeKind::Class
    }

    pub fn is_package(&self) -> bool {
        self.kind == NodeKind::Package
    }

    /// Number of raw links from this node to `target`, 0 if it does not depend on it.
    pub fn depends_on(&self, target_full_name: &str) -> usize {
        self.dependencies
            .get(target_full_name)
            .map_or(0, |dep| dep.count)
    }
}

#[derive(Debug, Clone)]
pub struct LsmTree {
    nodes: Vec<LsmNode>,
    by_name: HashMap<String, NodeId>,
}

impl Default for LsmTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LsmTree {
    /// A tree holding only the root package.
    pub fn new() -> Self {
        let root = LsmNode {
            id: NodeId(0),
            kind: NodeKind::Package,
            name: ROOT_NAME.to_string(),
            full_name: String::new(),
            level: 0,
            parent: None,
            children: Vec::new(),
            dependencies: BTreeMap::new(),
        };
        Self {
            nodes: vec![root],
            by_name: HashMap::new(),
        }
    }

    /// Builds the package/class structure for every name in `graph`.
    /// Sources are visited in order, each followed by its targets.
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let mut tree = Self::new();
        for source in graph.sources() {
            tree.insert_path(source);
            for target in graph.targets(source) {
                tree.insert_path(target);
            }
        }
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included. Ids run from 0 to `node_count() - 1`.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when no name has been inserted yet.
    pub fn has_only_root(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn node(&self, id: NodeId) -> &LsmNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut LsmNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LsmNode> {
        self.nodes.iter()
    }

    pub fn get_by_name(&self, full_name: &str) -> Option<NodeId> {
        if full_name.is_empty() {
            return Some(self.root());
        }
        self.by_name.get(full_name).copied()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// A package that contains no packages, only classes.
    pub fn is_top_package(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.is_package() && node.children.iter().all(|&c| self.node(c).is_class())
    }

    /// Raw link count from `from` to its sibling `to`.
    pub fn depends(&self, from: NodeId, to: NodeId) -> usize {
        self.node(from).depends_on(&self.node(to).full_name)
    }

    /// Inserts `full_name` and all its prefixes. Returns the id of the leaf.
    pub fn insert_path(&mut self, full_name: &str) -> NodeId {
        let segments: Vec<&str> = full_name.split('.').collect();
        let mut parent = self.root();
        let mut path = String::new();

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            path = child_path(&path, segment);
            let kind = if is_last { NodeKind::Class } else { NodeKind::Package };

            parent = match self.by_name.get(&path) {
                Some(&existing) => {
                    let node = &mut self.nodes[existing.0];
                    if kind == NodeKind::Package && node.kind == NodeKind::Class {
                        debug!(name = %node.full_name, "promoting class to package");
                        node.kind = NodeKind::Package;
                    }
                    existing
                }
                None => self.push_node(kind, segment, &path, parent),
            };
        }
        parent
    }

    fn push_node(&mut self, kind: NodeKind, name: &str, full_name: &str, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(LsmNode {
            id,
            kind,
            name: name.to_string(),
            full_name: full_name.to_string(),
            level: 0,
            parent: Some(parent),
            children: Vec::new(),
            dependencies: BTreeMap::new(),
        });
        self.nodes[parent.0].children.push(id);
        self.by_name.insert(full_name.to_string(), id);
        id
    }

    /// Resolves `name` (strictly inside `scope`) to the child of `scope` on its path:
    /// a sibling class, or the sibling package that contains it.
    pub fn resolve_in_scope(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        let scope_name = &self.node(scope).full_name;
        if !is_inside(name, scope_name) {
            return None;
        }
        let rest = if scope_name.is_empty() {
            name
        } else {
            &name[scope_name.len() + 1..]
        };
        let segment = rest.split('.').next()?;
        let child = *self.by_name.get(&child_path(scope_name, segment))?;
        (self.node(child).parent == Some(scope)).then_some(child)
    }

    /// Calls `enter` for each node before its children and `leave` after them.
    pub fn traverse<E, L>(&self, from: NodeId, mut enter: E, mut leave: L)
    where
        E: FnMut(&LsmNode),
        L: FnMut(&LsmNode),
    {
        // (node, children already scheduled)
        let mut stack: Vec<(NodeId, bool)> = vec![(from, false)];
        while let Some((id, expanded)) = stack.pop() {
            let node = self.node(id);
            if expanded {
                leave(node);
                continue;
            }
            enter(node);
            stack.push((id, true));
            for &child in node.children.iter().rev() {
                stack.push((child, false));
            }
        }
    }

    /// Parent before children, children in discovery order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.node_count());
        self.traverse(self.root(), |n| out.push(n.id), |_| {});
        out
    }

    /// Children before parent.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.node_count());
        self.traverse(self.root(), |_| {}, |n| out.push(n.id));
        out
    }
}

/// Full name of `segment` under `parent` (the root has an empty full name).
pub(crate) fn child_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}

/// Whether `name` lies strictly below `scope` in the dotted hierarchy.
pub(crate) fn is_inside(name: &str, scope: &str) -> bool {
    if scope.is_empty() {
        return !name.is_empty();
    }
    name.len() > scope.len()
        && name.starts_with(scope)
        && name.as_bytes()[scope.len()] == b'.'
}

/// `name` is `scope` itself or lies below it.
pub(crate) fn is_within(name: &str, scope: &str) -> bool {
    name == scope || is_inside(name, scope)
}
