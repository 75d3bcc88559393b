// Row placement inside each basement.
//
// Rows are laid out along z in level order, starting one spacing in from the
// basement edge. Within a row, children go left to right along x and the
// row is centred on the basement's length. Children stand on top of the
// basement (y = basement height).

use super::{CityConfig, ElementKind, Footprint, Position, lsm_rows};
use crate::lsm::LsmTree;

/// Local position of every node, indexed by `NodeId`. The root stays at the origin.
pub(super) fn place_children(
    tree: &LsmTree,
    sized: &[(ElementKind, Footprint)],
    cfg: &CityConfig,
) -> Vec<Position> {
    let mut positions = vec![Position::ORIGIN; tree.node_count()];

    for id in tree.pre_order() {
        if !tree.node(id).is_package() {
            continue;
        }
        let parent_length = sized[id.0].1.length;
        let mut z = cfg.spacing;

        for row in lsm_rows(tree, id) {
            let mut row_width: f32 = 0.0;
            if !row.is_empty() {
                let lengths: f32 = row.iter().map(|c| sized[c.0].1.length).sum();
                let row_extent = lengths + (row.len() - 1) as f32 * cfg.spacing;
                let mut x = (parent_length - row_extent) / 2.0;

                for &child in &row {
                    let fp = sized[child.0].1;
                    positions[child.0] = Position::new(x, cfg.basement_height, z);
                    x += fp.length + cfg.spacing;
                    row_width = row_width.max(fp.width);
                }
            }
            z += row_width + cfg.spacing;
        }
    }

    positions
}
