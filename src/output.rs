//! Output types for the rendering adapter.
//!
//! These structs are serialized to JSON and handed to whatever draws the
//! city. Geometry is final: the adapter only has to create boxes, not
//! re-run any layout.

use serde::Serialize;
use tracing::warn;

use crate::error::CityError;
use crate::graph::CycleDetector;
use crate::layout::{CityLayout, ElementKind, Footprint, Position};
use crate::load::LoadTable;
use crate::lsm::{Lsm, LsmTree, NodeId, RemovedDependency, UnresolvedTarget};
use crate::parser::ParseWarning;

/// One node of the city, with its children nested inside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementOutput {
    pub full_name: String,
    pub name: String,
    pub is_leaf: bool,
    /// A package holding only classes. Renderers pick basement materials by it.
    pub top_package: bool,
    pub level: usize,
    #[serde(flatten)]
    pub kind: ElementKind,
    pub footprint: Footprint,
    /// Local to the parent element.
    pub position: Position,
    /// Member of a dependency cycle, or (for packages) contains one.
    pub cyclic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementOutput>,
}

/// A runtime call drawn between two towers, in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkOutput {
    pub from: String,
    pub to: String,
    pub start: Position,
    pub end: Position,
    pub intensity: f32,
}

/// A skipped input line, for editor markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningInfo {
    pub message: String,
    pub line: usize,   // 1-based line number
    pub column: usize, // 1-based column number
}

impl From<&ParseWarning> for WarningInfo {
    fn from(w: &ParseWarning) -> Self {
        Self {
            message: w.msg.clone(),
            line: w.line,
            column: w.col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    /// The pipeline broke one of its own invariants, as opposed to bad input.
    pub invariant_violation: bool,
}

impl From<&CityError> for ErrorInfo {
    fn from(e: &CityError) -> Self {
        Self {
            message: e.to_string(),
            invariant_violation: e.is_invariant_violation(),
        }
    }
}

/// The combined output sent to the renderer
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CityOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<ElementOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_dependencies: Vec<RemovedDependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl CityOutput {
    pub fn assemble(
        lsm: &Lsm,
        layout: &CityLayout,
        cycles: &CycleDetector,
        loads: Option<&LoadTable>,
        warnings: &[ParseWarning],
    ) -> Self {
        let tree = &lsm.tree;
        let root = element_tree(tree, layout, cycles, loads);
        let links = loads.map(|l| call_links(tree, layout, l)).unwrap_or_default();

        Self {
            root: Some(root),
            removed_dependencies: lsm.removed.clone(),
            cycles: cycles.cycles().to_vec(),
            unresolved: lsm.unresolved.clone(),
            links,
            warnings: warnings.iter().map(WarningInfo::from).collect(),
            error: None,
        }
    }

    /// An output carrying only the error and the warnings gathered before it.
    pub fn failure(error: &CityError, warnings: &[ParseWarning]) -> Self {
        Self {
            warnings: warnings.iter().map(WarningInfo::from).collect(),
            error: Some(ErrorInfo::from(error)),
            ..Self::default()
        }
    }
}

/// Builds the nested element tree bottom-up, so every package sees its
/// finished children before deciding whether it is cyclic.
fn element_tree(
    tree: &LsmTree,
    layout: &CityLayout,
    cycles: &CycleDetector,
    loads: Option<&LoadTable>,
) -> ElementOutput {
    let range = loads.map(LoadTable::component_range);
    let mut built: Vec<Option<ElementOutput>> = vec![None; tree.node_count()];

    for id in tree.post_order() {
        let node = tree.node(id);
        let el = layout.element(id);
        let children: Vec<ElementOutput> = node
            .children
            .iter()
            .filter_map(|c| built[c.0].take())
            .collect();

        let cyclic = cycles.is_cyclic(&node.full_name) || children.iter().any(|c| c.cyclic);
        let intensity = match (loads, range) {
            (Some(loads), Some(range)) if node.is_class() => loads
                .component_load(&node.full_name, &node.name)
                .map(|load| range.scale(load)),
            _ => None,
        };

        built[id.0] = Some(ElementOutput {
            full_name: node.full_name.clone(),
            name: node.name.clone(),
            is_leaf: node.is_class(),
            top_package: tree.is_top_package(id),
            level: node.level,
            kind: el.kind,
            footprint: el.footprint,
            position: el.position,
            cyclic,
            intensity,
            children,
        });
    }

    let root = tree.root();
    built[root.0].take().unwrap_or_else(|| ElementOutput {
        full_name: String::new(),
        name: tree.node(root).name.clone(),
        is_leaf: false,
        top_package: tree.is_top_package(root),
        level: 0,
        kind: ElementKind::PackageBasement,
        footprint: layout.element(root).footprint,
        position: Position::ORIGIN,
        cyclic: false,
        intensity: None,
        children: Vec::new(),
    })
}

fn call_links(tree: &LsmTree, layout: &CityLayout, loads: &LoadTable) -> Vec<LinkOutput> {
    let range = loads.call_range();
    let mut links = Vec::with_capacity(loads.calls.len());

    for call in &loads.calls {
        let (Some(from), Some(to)) = (find_component(tree, &call.component), find_component(tree, &call.parent))
        else {
            warn!(component = %call.component, parent = %call.parent, "call endpoint not in city");
            continue;
        };
        links.push(LinkOutput {
            from: tree.node(from).full_name.clone(),
            to: tree.node(to).full_name.clone(),
            start: layout.top_center(tree, from),
            end: layout.top_center(tree, to),
            intensity: range.scale(call.load),
        });
    }
    links
}

/// Full name first; otherwise the first class (pre-order) with that short name.
fn find_component(tree: &LsmTree, name: &str) -> Option<NodeId> {
    if name.is_empty() {
        return None;
    }
    tree.get_by_name(name).or_else(|| {
        tree.pre_order()
            .into_iter()
            .find(|&id| tree.node(id).is_class() && tree.node(id).name == name)
    })
}
