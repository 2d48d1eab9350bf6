//! Tile tree construction
//!
//! Two passes over the content tiles:
//! 1. containment grouping: tiles whose world box lies inside a larger
//!    tile's world box are grouped under it, so nested detail is never
//!    separated from the object around it
//! 2. SAH partition: the groups are split recursively along the axis and
//!    position with the lowest surface-area cost

use glam::DVec3;
use log::debug;

use super::tile::{Refine, Tile};
use crate::math::Box3;

/// Surface-area proxy of a box of `size` holding `count` items.
pub fn sah_cost(size: DVec3, count: usize) -> f64 {
    (size.x * size.y + size.y * size.z + size.z * size.x) * count as f64
}

/// Build the full tree from content tiles. The root refines with `ADD`.
pub fn build_tree(mut tiles: Vec<Tile>) -> Tile {
    tiles.sort_by(|a, b| a.box_world().diagonal().total_cmp(&b.box_world().diagonal()));
    let content_count = tiles.len();

    let groups = split_group(tiles);
    debug!("{} content tiles grouped into {} containment groups", content_count, groups.len());

    let mut root = build_bvh(groups);
    root.refine = Some(Refine::Add);
    root.finalize();
    root
}

/// Containment grouping over tiles sorted by ascending world diagonal.
///
/// The last (largest) tile anchors a group with every tile its world box
/// contains; the remaining tiles are grouped the same way.
pub fn split_group(mut tiles: Vec<Tile>) -> Vec<Tile> {
    match tiles.len() {
        0 | 1 => return tiles,
        2 => {
            let mut group = Tile::group();
            while let Some(tile) = tiles.pop() {
                group.add_child(tile);
            }
            return vec![group];
        }
        _ => {}
    }

    let mut groups = Vec::new();
    while let Some(anchor_box) = tiles.last().map(Tile::box_world) {
        let (mut contained, rest): (Vec<Tile>, Vec<Tile>) = tiles
            .into_iter()
            .partition(|tile| anchor_box.contains(&tile.box_world()));
        tiles = rest;

        // The anchor contains itself and is the last contained tile
        let Some(anchor) = contained.pop() else {
            break;
        };
        let mut group = Tile::group().with_child(anchor);
        if !contained.is_empty() {
            group.add_children(split_group(contained));
        }
        groups.push(group);
    }
    groups
}

/// SAH partition. Fewer than three nodes end up under a single group.
pub fn build_bvh(mut nodes: Vec<Tile>) -> Tile {
    if nodes.len() < 3 {
        let mut group = Tile::group();
        group.add_children(nodes);
        return group;
    }

    let (axis, split) = best_split(&nodes);
    debug!("SAH split of {} nodes on axis {} at {}", nodes.len(), axis, split);

    sort_by_centroid(&mut nodes, axis);
    let right = nodes.split_off(split);
    Tile::group()
        .with_child(build_bvh(nodes))
        .with_child(build_bvh(right))
}

/// Lowest-cost `(axis, split)` over all axes; ties keep the first found.
fn best_split(nodes: &[Tile]) -> (usize, usize) {
    let n = nodes.len();
    let mut best: Option<(f64, usize, usize)> = None;

    for axis in 0..3 {
        let mut order: Vec<&Tile> = nodes.iter().collect();
        order.sort_by(|a, b| a.centroid_world()[axis].total_cmp(&b.centroid_world()[axis]));

        let mut left_cost = vec![0.0; n - 1];
        let mut right_cost = vec![0.0; n - 1];
        let mut left = Box3::Empty;
        let mut right = Box3::Empty;
        for i in 0..n - 1 {
            left = left.union(&order[i].box_world());
            left_cost[i] = sah_cost(left.size(), i + 1);
            right = right.union(&order[n - 1 - i].box_world());
            right_cost[n - 2 - i] = sah_cost(right.size(), i + 1);
        }

        for i in 0..n - 1 {
            let cost = left_cost[i] + right_cost[i];
            if best.map_or(true, |(min_cost, _, _)| cost < min_cost) {
                best = Some((cost, axis, i + 1));
            }
        }
    }

    match best {
        Some((_, axis, split)) => (axis, split),
        // Every cost was NaN
        None => (0, n / 2),
    }
}

fn sort_by_centroid(nodes: &mut [Tile], axis: usize) {
    nodes.sort_by(|a, b| a.centroid_world()[axis].total_cmp(&b.centroid_world()[axis]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tileset::tile::TileContent;

    fn leaf(id: usize, min: [f64; 3], max: [f64; 3]) -> Tile {
        Tile::from_content(TileContent {
            id,
            instance_box: Box3::from_min_max(min, max),
            instances: Vec::new(),
            glb: Vec::new(),
        })
    }

    fn ids(tile: &Tile) -> Vec<usize> {
        let mut ids: Vec<usize> = tile
            .content_tiles()
            .iter()
            .filter_map(|t| t.content().map(|c| c.id))
            .collect();
        ids.sort();
        ids
    }

    fn check_containment(tile: &Tile) {
        for child in tile.children() {
            assert!(tile.box_world().contains(&child.box_world()));
            check_containment(child);
        }
    }

    /// Innermost group holding the content tile `id`.
    fn parent_of(tile: &Tile, id: usize) -> Option<&Tile> {
        for child in tile.children() {
            if child.content().map(|c| c.id) == Some(id) {
                return Some(tile);
            }
            if let Some(found) = parent_of(child, id) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn test_sah_cost() {
        assert_eq!(sah_cost(DVec3::new(1.0, 2.0, 3.0), 2), (2.0 + 6.0 + 3.0) * 2.0);
    }

    #[test]
    fn test_nested_tile_stays_with_enclosing_tile() {
        let tiles = vec![
            leaf(0, [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
            leaf(1, [10.0, 0.0, 0.0], [11.0, 1.0, 1.0]),
            leaf(2, [0.2, 0.2, 0.2], [0.5, 0.5, 0.5]),
        ];
        let root = build_tree(tiles);

        assert_eq!(ids(&root), vec![0, 1, 2]);
        let parent = parent_of(&root, 2).unwrap();
        let siblings: Vec<usize> = parent.children().iter().filter_map(|c| c.content().map(|c| c.id)).collect();
        assert!(siblings.contains(&0));
        assert!(!siblings.contains(&1));
        check_containment(&root);
    }

    #[test]
    fn test_split_group_base_cases() {
        let single = split_group(vec![leaf(0, [0.0; 3], [1.0; 3])]);
        assert_eq!(single.len(), 1);
        assert!(single[0].is_content());

        let pair = split_group(vec![leaf(0, [0.0; 3], [1.0; 3]), leaf(1, [5.0; 3], [6.0; 3])]);
        assert_eq!(pair.len(), 1);
        assert!(!pair[0].is_content());
        assert_eq!(pair[0].children().len(), 2);
        assert_eq!(pair[0].children()[0].content().unwrap().id, 1);
    }

    #[test]
    fn test_disjoint_tiles_each_get_a_group() {
        let groups = split_group(vec![
            leaf(0, [0.0; 3], [1.0; 3]),
            leaf(1, [5.0; 3], [6.0; 3]),
            leaf(2, [10.0; 3], [11.0; 3]),
        ]);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.children().len() == 1));
        assert_eq!(groups[0].children()[0].content().unwrap().id, 2);
    }

    #[test]
    fn test_bvh_splits_distant_clusters() {
        let mut tiles = Vec::new();
        for i in 0..4 {
            let x = i as f64 * 2.0;
            tiles.push(leaf(i, [x, 0.0, 0.0], [x + 1.0, 1.0, 1.0]));
            tiles.push(leaf(10 + i, [x + 100.0, 0.0, 0.0], [x + 101.0, 1.0, 1.0]));
        }
        let root = build_bvh(tiles);
        assert_eq!(root.children().len(), 2);
        assert_eq!(ids(&root.children()[0]), vec![0, 1, 2, 3]);
        assert_eq!(ids(&root.children()[1]), vec![10, 11, 12, 13]);
        check_containment(&root);
    }

    #[test]
    fn test_empty_input_gives_empty_root() {
        let root = build_tree(Vec::new());
        assert!(root.children().is_empty());
        assert_eq!(root.refine, Some(Refine::Add));
        assert!(root.box_world().is_empty());
    }

    #[test]
    fn test_many_tiles_keep_containment() {
        let mut tiles = Vec::new();
        for i in 0..20 {
            let f = i as f64;
            let size = 1.0 + (i % 4) as f64;
            tiles.push(leaf(i, [f * 1.5, (i % 3) as f64, 0.0], [f * 1.5 + size, 2.0 + size, size]));
        }
        let root = build_tree(tiles);
        assert_eq!(ids(&root).len(), 20);
        check_containment(&root);
    }
}
