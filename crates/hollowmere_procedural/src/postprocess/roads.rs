//! Cost-weighted road pathfinding.
//!
//! A* over the 4-connected grid. Entering a tile costs
//! `1 + water·[water] + clearing·[not walkable] + elevation·|e − 0.5|`,
//! so every step costs at least 1 and the Manhattan distance never
//! overestimates: the first time the goal is popped its cost is optimal.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use hollowmere_shared::{Tile, TilePos};

use super::{brush, paint, TileGrid};
use crate::config::{RoadConfig, TerrainRegistry};

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// A found road.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadPath {
    /// Tiles from start to goal, both included.
    pub points: Vec<TilePos>,
    /// Sum of edge costs (the start tile is free).
    pub cost: f64,
}

/// Cost of stepping onto `tile`.
#[must_use]
pub fn edge_cost(tile: &Tile, config: &RoadConfig, terrain: &TerrainRegistry) -> f64 {
    let mut cost = 1.0;
    if terrain.is_water(tile.terrain) {
        cost += config.water_penalty;
    }
    if !tile.walkable {
        cost += config.clearing_penalty;
    }
    cost + config.elevation_penalty * (f64::from(tile.elevation) - 0.5).abs()
}

#[derive(Clone, Copy, Debug)]
struct HeapEntry {
    estimate: f64,
    cost: f64,
    pos: TilePos,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Min-heap on estimate; deeper nodes first on ties
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| self.cost.total_cmp(&other.cost))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

/// Cheapest 4-connected path from `from` to `to`, or `None` if either end is
/// off the grid or they are not connected.
#[must_use]
pub fn find_road<G: TileGrid + ?Sized>(
    grid: &G,
    from: TilePos,
    to: TilePos,
    config: &RoadConfig,
    terrain: &TerrainRegistry,
) -> Option<RoadPath> {
    grid.get(from)?;
    grid.get(to)?;

    let mut best: HashMap<TilePos, f64> = HashMap::from([(from, 0.0)]);
    let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
    let mut open = BinaryHeap::from([HeapEntry {
        estimate: f64::from(from.manhattan(to)),
        cost: 0.0,
        pos: from,
    }]);

    while let Some(HeapEntry { cost, pos, .. }) = open.pop() {
        if pos == to {
            return Some(RoadPath {
                points: reconstruct(&came_from, from, to),
                cost,
            });
        }
        if best.get(&pos).is_some_and(|&b| cost > b) {
            continue;
        }
        for (dx, dy) in NEIGHBORS {
            let next = pos.offset(dx, dy);
            let Some(tile) = grid.get(next) else { continue };
            let next_cost = cost + edge_cost(tile, config, terrain);
            if best.get(&next).map_or(true, |&b| next_cost < b) {
                best.insert(next, next_cost);
                came_from.insert(next, pos);
                open.push(HeapEntry {
                    estimate: next_cost + f64::from(next.manhattan(to)),
                    cost: next_cost,
                    pos: next,
                });
            }
        }
    }
    None
}

fn reconstruct(came_from: &HashMap<TilePos, TilePos>, from: TilePos, to: TilePos) -> Vec<TilePos> {
    let mut points = vec![to];
    let mut cur = to;
    while cur != from {
        match came_from.get(&cur) {
            Some(&prev) => {
                points.push(prev);
                cur = prev;
            }
            None => break,
        }
    }
    points.reverse();
    points
}

/// Finds the cheapest road and paints it `config.width` tiles wide.
/// Water and protected terrain along the way are left untouched.
pub fn carve_road<G: TileGrid + ?Sized>(
    grid: &mut G,
    from: TilePos,
    to: TilePos,
    config: &RoadConfig,
    terrain: &TerrainRegistry,
) -> Option<RoadPath> {
    let road_tile = terrain.tile(terrain.lookup(&config.road_terrain)?, 0.0);
    let path = find_road(grid, from, to, config, terrain)?;
    for point in &path.points {
        for (dx, dy) in brush(config.width) {
            if let Some(tile) = grid.get_mut(point.offset(dx, dy)) {
                if !terrain.is_protected(tile.terrain) && !terrain.is_water(tile.terrain) {
                    paint(tile, road_tile);
                }
            }
        }
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::postprocess::Region;
    use hollowmere_shared::Rect;

    fn registry() -> TerrainRegistry {
        TerrainRegistry::new(&WorldConfig::standard().terrain)
    }

    fn flat(size: i32, terrain: &TerrainRegistry) -> Region {
        let grass = terrain.tile(terrain.lookup("grass").expect("grass"), 0.5);
        Region::from_fn(Rect::new(0, 0, size, size), |_| grass)
    }

    #[test]
    fn test_flat_road_is_straight() {
        let terrain = registry();
        let mut region = flat(50, &terrain);
        let (from, to) = (TilePos::new(3, 20), TilePos::new(46, 20));
        let road = carve_road(&mut region, from, to, &RoadConfig::default(), &terrain).expect("road");

        assert_eq!(road.points.len(), 44);
        assert!(road.points.iter().all(|p| p.y == 20));
        assert!((road.cost - 43.0).abs() < 1e-9, "cost is pure distance");
        let road_id = terrain.lookup("road").expect("road terrain");
        assert!(road.points.iter().all(|p| region.get(*p).map(|t| t.terrain) == Some(road_id)));
    }

    #[test]
    fn test_road_detours_around_water() {
        let terrain = registry();
        let water = terrain.tile(terrain.lookup("water").expect("water"), 0.5);
        let mut region = flat(20, &terrain);
        // Water wall down column 10 with a gap from y = 6
        for y in 0..6 {
            if let Some(tile) = region.get_mut(TilePos::new(10, y)) {
                *tile = water;
            }
        }
        let road = carve_road(
            &mut region,
            TilePos::new(2, 2),
            TilePos::new(17, 2),
            &RoadConfig::default(),
            &terrain,
        )
        .expect("road");

        // Wading costs 15 + 14 = 29; going round the wall costs 15 + 8 = 23
        assert!(road.points.iter().all(|p| p.x != 10 || p.y >= 6));
        assert!((road.cost - 23.0).abs() < 1e-9);
        assert!(terrain.is_water(region.get(TilePos::new(10, 0)).expect("tile").terrain));
    }

    #[test]
    fn test_unreachable_goal() {
        let terrain = registry();
        let region = flat(5, &terrain);
        assert!(find_road(&region, TilePos::new(0, 0), TilePos::new(9, 9), &RoadConfig::default(), &terrain).is_none());
    }

    /// Every simple 4-connected path on a small grid, by DFS.
    fn brute_force_min(region: &Region, from: TilePos, to: TilePos, config: &RoadConfig, terrain: &TerrainRegistry) -> f64 {
        fn dfs(
            region: &Region,
            cur: TilePos,
            to: TilePos,
            cost: f64,
            seen: &mut Vec<TilePos>,
            best: &mut f64,
            config: &RoadConfig,
            terrain: &TerrainRegistry,
        ) {
            if cur == to {
                *best = best.min(cost);
                return;
            }
            for (dx, dy) in NEIGHBORS {
                let next = cur.offset(dx, dy);
                let Some(tile) = region.get(next) else { continue };
                if seen.contains(&next) {
                    continue;
                }
                seen.push(next);
                dfs(region, next, to, cost + edge_cost(tile, config, terrain), seen, best, config, terrain);
                seen.pop();
            }
        }
        let mut best = f64::INFINITY;
        dfs(region, from, to, 0.0, &mut vec![from], &mut best, config, terrain);
        best
    }

    #[test]
    fn test_astar_matches_brute_force() {
        let terrain = registry();
        let grass = terrain.lookup("grass").expect("grass");
        let water = terrain.lookup("water").expect("water");
        let rock = terrain.lookup("stone_wall").expect("wall");
        let config = RoadConfig::default();

        for seed in 0..12u64 {
            let mut rng = crate::seed::WorldSeed::new(seed).derive(&[]).rng();
            let region = Region::from_fn(Rect::new(0, 0, 4, 4), |_| {
                use rand::Rng;
                let id = match rng.gen_range(0..6) {
                    0 => water,
                    1 => rock,
                    _ => grass,
                };
                terrain.tile(id, rng.gen_range(0.0..1.0))
            });
            let (from, to) = (TilePos::new(0, 0), TilePos::new(3, 3));
            let road = find_road(&region, from, to, &config, &terrain).expect("connected grid");
            let brute = brute_force_min(&region, from, to, &config, &terrain);
            assert!((road.cost - brute).abs() < 1e-9, "seed {seed}: A* {} vs brute force {brute}", road.cost);

            let recomputed: f64 = road.points[1..]
                .iter()
                .map(|p| edge_cost(region.get(*p).expect("tile"), &config, &terrain))
                .sum();
            assert!((recomputed - road.cost).abs() < 1e-9);
        }
    }
}
