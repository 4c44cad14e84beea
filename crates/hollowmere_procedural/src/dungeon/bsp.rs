//! Binary space partitioning layout.
//!
//! The floor rectangle is split in two until leaves reach the minimum leaf
//! size. Each leaf gets one room; at each merge step the two subtrees are
//! joined by a corridor between their closest rooms.
//!
//! The tree lives in a flat arena and is built from an explicit work-list,
//! so stack use does not grow with tree depth. Children are always pushed
//! after their parent, which makes a reverse index walk a post-order.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use hollowmere_shared::Rect;

use super::corridor::{facing_points, gap, l_path};
use super::{Layout, LayoutParams};

/// How uneven a split may be.
const SPLIT_RATIO_MIN: f64 = 0.35;
const SPLIT_RATIO_MAX: f64 = 0.65;

/// A side this much longer than the other is always the one split.
const ASPECT_BIAS: f64 = 1.25;

#[derive(Clone, Debug)]
struct Node {
    area: Rect,
    children: Option<(usize, usize)>,
}

/// Splits `area` into a flat tree. Index 0 is the root.
fn partition(area: Rect, min_leaf: i32, rng: &mut ChaCha8Rng) -> Vec<Node> {
    let mut nodes = vec![Node {
        area,
        children: None,
    }];
    let mut work = vec![0];

    while let Some(index) = work.pop() {
        let area = nodes[index].area;
        let can_split_x = area.width >= min_leaf * 2;
        let can_split_y = area.height >= min_leaf * 2;
        if !can_split_x && !can_split_y {
            continue;
        }

        let (w, h) = (f64::from(area.width), f64::from(area.height));
        let prefer_y = if w >= h * ASPECT_BIAS {
            false
        } else if h >= w * ASPECT_BIAS {
            true
        } else {
            rng.gen_bool(0.5)
        };
        let split_y = match (can_split_x, can_split_y) {
            (true, true) => prefer_y,
            (_, can_y) => can_y,
        };

        let ratio = rng.gen_range(SPLIT_RATIO_MIN..SPLIT_RATIO_MAX);
        let (first, second) = if split_y {
            let cut = ((f64::from(area.height) * ratio) as i32).clamp(min_leaf, area.height - min_leaf);
            (
                Rect::new(area.x, area.y, area.width, cut),
                Rect::new(area.x, area.y + cut, area.width, area.height - cut),
            )
        } else {
            let cut = ((f64::from(area.width) * ratio) as i32).clamp(min_leaf, area.width - min_leaf);
            (
                Rect::new(area.x, area.y, cut, area.height),
                Rect::new(area.x + cut, area.y, area.width - cut, area.height),
            )
        };

        let left = nodes.len();
        nodes.push(Node {
            area: first,
            children: None,
        });
        nodes.push(Node {
            area: second,
            children: None,
        });
        nodes[index].children = Some((left, left + 1));
        work.push(left + 1);
        work.push(left);
    }

    nodes
}

/// A room inside a leaf, leaving at least one wall tile on every side.
fn room_in(leaf: Rect, params: &LayoutParams, rng: &mut ChaCha8Rng) -> Option<Rect> {
    let max_w = (leaf.width - 2).min(params.room_max);
    let max_h = (leaf.height - 2).min(params.room_max);
    if max_w < params.room_min || max_h < params.room_min {
        return None;
    }
    let width = rng.gen_range(params.room_min..=max_w);
    let height = rng.gen_range(params.room_min..=max_h);
    let x = leaf.x + 1 + rng.gen_range(0..=leaf.width - 2 - width);
    let y = leaf.y + 1 + rng.gen_range(0..=leaf.height - 2 - height);
    Some(Rect::new(x, y, width, height))
}

pub(super) fn layout(params: &LayoutParams, rng: &mut ChaCha8Rng) -> Layout {
    let nodes = partition(
        Rect::new(0, 0, params.width, params.height),
        params.bsp_min_leaf,
        rng,
    );

    let mut layout = Layout::default();
    // Rooms contained in each subtree
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (index, node) in nodes.iter().enumerate() {
        if node.children.is_none() {
            if let Some(room) = room_in(node.area, params, rng) {
                members[index].push(layout.rooms.len());
                layout.rooms.push(room);
            }
        }
    }

    for index in (0..nodes.len()).rev() {
        let Some((left, right)) = nodes[index].children else {
            continue;
        };
        let pair = members[left]
            .iter()
            .flat_map(|&a| members[right].iter().map(move |&b| (a, b)))
            .min_by_key(|&(a, b)| (gap(&layout.rooms[a], &layout.rooms[b]), a, b));
        if let Some((a, b)) = pair {
            let (from, to) = facing_points(&layout.rooms[a], &layout.rooms[b]);
            let path = l_path(from, to, rng.gen_bool(0.5));
            layout.connect(a, b, path);
        }
        let mut merged = std::mem::take(&mut members[left]);
        merged.append(&mut members[right]);
        members[index] = merged;
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DungeonConfig;
    use crate::seed::WorldSeed;

    #[test]
    fn test_partition_covers_area() {
        let area = Rect::new(0, 0, 64, 48);
        let nodes = partition(area, 10, &mut WorldSeed::new(3).derive(&[]).rng());
        let leaves: Vec<Rect> = nodes
            .iter()
            .filter(|n| n.children.is_none())
            .map(|n| n.area)
            .collect();
        assert!(leaves.len() > 1);
        assert_eq!(leaves.iter().map(Rect::area).sum::<i32>(), area.area());
        for leaf in &leaves {
            assert!(leaf.width >= 10 && leaf.height >= 10, "leaf {leaf:?} below minimum");
        }
    }

    #[test]
    fn test_deep_partition_without_recursion() {
        // Tens of thousands of nodes, built without recursion
        let nodes = partition(Rect::new(0, 0, 1024, 1024), 4, &mut WorldSeed::new(1).derive(&[]).rng());
        assert!(nodes.len() > 10_000);
    }

    #[test]
    fn test_one_room_per_leaf_and_tree_links() {
        let params = LayoutParams::for_attempt(&DungeonConfig::default(), 0);
        let layout = layout(&params, &mut WorldSeed::new(11).derive(&[]).rng());
        assert!(layout.rooms.len() >= 4);
        assert_eq!(layout.links.len(), layout.rooms.len() - 1, "a tree has n - 1 edges");
        for (i, a) in layout.rooms.iter().enumerate() {
            for b in &layout.rooms[i + 1..] {
                assert!(!a.intersects_padded(b, 1));
            }
        }
    }
}
