// Footprint sizing, children first.
//
// A class tower is (fan_out, fan_in, fan_out), both counts plus one so a
// tower with no links is still a unit cube. A basement holds its rows side by
// side along z; each row is as long as its children plus spacing, as wide as
// its widest child.

use tracing::error;

use super::{CityConfig, ElementKind, Footprint, lsm_rows};
use crate::error::{CityError, Result};
use crate::graph::DependencyGraph;
use crate::lsm::{LsmTree, NodeId};

/// Kind and footprint of every node, indexed by `NodeId`.
pub(super) fn compute_footprints(
    tree: &LsmTree,
    graph: &DependencyGraph,
    cfg: &CityConfig,
) -> Result<Vec<(ElementKind, Footprint)>> {
    let fan_in = graph.fan_in_counts();
    let mut sized: Vec<Option<(ElementKind, Footprint)>> = vec![None; tree.node_count()];

    for id in tree.post_order() {
        let node = tree.node(id);
        let entry = if node.is_class() {
            let fan_out = graph.targets(&node.full_name).len() + 1;
            let fan_in = fan_in.get(node.full_name.as_str()).copied().unwrap_or(0) + 1;
            (
                ElementKind::ClassTower { fan_in, fan_out },
                Footprint::new(fan_out as f32, fan_in as f32, fan_out as f32),
            )
        } else {
            let footprint = basement_footprint(tree, id, cfg, |child| {
                sized[child.0].map(|(_, fp)| fp).unwrap_or_default()
            });
            (ElementKind::PackageBasement, footprint)
        };

        if entry.1.is_degenerate() {
            let name = node.full_name.clone();
            error!(%name, footprint = ?entry.1, "degenerate footprint");
            return Err(CityError::DegenerateFootprint {
                name,
                footprint: entry.1,
            });
        }
        sized[id.0] = Some(entry);
    }

    // post-order reaches every node of the arena
    Ok(sized.into_iter().flatten().collect())
}

fn basement_footprint<F>(tree: &LsmTree, package: NodeId, cfg: &CityConfig, size_of: F) -> Footprint
where
    F: Fn(NodeId) -> Footprint,
{
    let mut length: f32 = 0.0;
    let mut width = cfg.spacing;

    for row in lsm_rows(tree, package) {
        let mut row_length = 0.0;
        let mut row_width: f32 = 0.0;
        for child in row {
            let fp = size_of(child);
            row_length += fp.length + cfg.spacing;
            row_width = row_width.max(fp.width);
        }
        length = length.max(row_length);
        width += row_width + cfg.spacing;
    }

    Footprint::new(length + cfg.spacing, cfg.basement_height, width)
}
