// City layout for a levelled LSM tree.
//
// Goals:
// - Deterministic: same tree, same boxes, same positions
// - Bottom-up sizing: classes are towers sized by coupling, packages are
//   basements sized to hold their children row by row
// - Top-down placement: one row per level, rows stacked along z, each row
//   centred along x inside its parent basement
// - Positions are local to the parent; world positions are summed on demand
//
// Submodules:
// - footprint: post-order box sizes
// - placement: pre-order local positions
//
// Output:
// - CityLayout with one element per tree node, indexed by NodeId.

use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};
use crate::graph::DependencyGraph;
use crate::lsm::{LsmTree, NodeId};

mod footprint;
mod placement;

use footprint::compute_footprints;
use placement::place_children;

/// Box extents: `length` along x, `height` along y, `width` along z.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct Footprint {
    pub length: f32,
    pub height: f32,
    pub width: f32,
}

impl Footprint {
    pub fn new(length: f32, height: f32, width: f32) -> Self {
        Self { length, height, width }
    }

    pub fn is_degenerate(&self) -> bool {
        [self.length, self.height, self.width]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
    }
}

/// Minimum corner of a box, relative to its parent's minimum corner.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, by: Position) -> Position {
        Position {
            x: self.x + by.x,
            y: self.y + by.y,
            z: self.z + by.z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    /// Gap between siblings, and margin inside basements.
    pub spacing: f32,
    /// Height of every package basement.
    pub basement_height: f32,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            spacing: 2.0,
            basement_height: 1.0,
        }
    }
}

impl CityConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("spacing", self.spacing), ("basement_height", self.basement_height)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CityError::InvalidConfig(format!(
                    "{field} must be a finite, non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    ClassTower { fan_in: usize, fan_out: usize },
    PackageBasement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityElement {
    pub node: NodeId,
    #[serde(flatten)]
    pub kind: ElementKind,
    pub footprint: Footprint,
    /// Local to the parent basement. The root sits at the origin.
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CityLayout {
    elements: Vec<CityElement>,
}

impl CityLayout {
    pub fn element(&self, id: NodeId) -> &CityElement {
        &self.elements[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CityElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn find_element(&self, tree: &LsmTree, full_name: &str) -> Option<&CityElement> {
        tree.get_by_name(full_name).map(|id| self.element(id))
    }

    /// Position of `id` in world space: its local position plus every ancestor's.
    pub fn world_position(&self, tree: &LsmTree, id: NodeId) -> Position {
        let mut pos = self.element(id).position;
        let mut current = tree.node(id).parent;
        while let Some(parent) = current {
            pos = pos.offset(self.element(parent).position);
            current = tree.node(parent).parent;
        }
        pos
    }

    /// World-space centre of the top face of `id`'s box.
    pub fn top_center(&self, tree: &LsmTree, id: NodeId) -> Position {
        let fp = self.element(id).footprint;
        self.world_position(tree, id)
            .offset(Position::new(fp.length / 2.0, fp.height, fp.width / 2.0))
    }
}

/// Children of `package` grouped into rows by level. Row `i` holds the
/// children at level `i`; levels with no child give empty rows.
pub fn lsm_rows(tree: &LsmTree, package: NodeId) -> Vec<Vec<NodeId>> {
    let children = tree.children(package);
    let Some(max_level) = children.iter().map(|&c| tree.node(c).level).max() else {
        return Vec::new();
    };
    let mut rows = vec![Vec::new(); max_level + 1];
    for &child in children {
        rows[tree.node(child).level].push(child);
    }
    rows
}

pub fn layout_city(tree: &LsmTree, graph: &DependencyGraph, cfg: &CityConfig) -> Result<CityLayout> {
    cfg.validate()?;

    // First pass: sizes, children before parents.
    let sized = compute_footprints(tree, graph, cfg)?;

    // Second pass: local positions, parents before children.
    let positions = place_children(tree, &sized, cfg);

    let elements = sized
        .into_iter()
        .zip(positions)
        .enumerate()
        .map(|(i, ((kind, footprint), position))| CityElement {
            node: NodeId(i),
            kind,
            footprint,
            position,
        })
        .collect();
    Ok(CityLayout { elements })
}
