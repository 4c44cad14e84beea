//! Gradient-descent river tracing.
//!
//! Sources are tiles above `source_threshold`, visited in a seeded shuffle
//! of position order. From each source the river steps to the lowest
//! 8-connected neighbor that is strictly lower (or is existing water no
//! higher than the current tile) until it reaches water, a local minimum,
//! or `max_length` points.

use std::collections::HashSet;

use hollowmere_shared::{Tile, TilePos};
use rand::seq::SliceRandom;
use tracing::debug;

use super::{brush, paint, TileGrid};
use crate::config::{RiverConfig, TerrainRegistry};
use crate::seed::SubSeed;

/// 8-neighborhood: E, NE, N, NW, W, SW, S, SE.
const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Why a river stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiverEnd {
    /// Flowed into existing water (the last point is that water tile).
    ReachedWater,
    /// No lower neighbor left.
    LocalMinimum,
    /// Hit `max_length`.
    LengthCap,
}

/// One carved river.
#[derive(Clone, Debug, PartialEq)]
pub struct RiverPath {
    /// Points from source to mouth.
    pub points: Vec<TilePos>,
    /// Elevation at each point before carving.
    pub elevations: Vec<f32>,
    /// Termination.
    pub end: RiverEnd,
}

impl RiverPath {
    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the path has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Traces and carves up to `config.sources` rivers.
///
/// Dead ends shorter than `config.min_length` are discarded uncarved.
/// Returns the carved rivers in tracing order.
pub fn carve_rivers<G: TileGrid + ?Sized>(
    grid: &mut G,
    config: &RiverConfig,
    terrain: &TerrainRegistry,
    seed: SubSeed,
) -> Vec<RiverPath> {
    let Some(water_id) = terrain.lookup(&config.water_terrain) else {
        return Vec::new();
    };
    let water = terrain.tile(water_id, 0.0);

    let mut sources: Vec<TilePos> = grid
        .present()
        .into_iter()
        .filter(|p| {
            grid.get(*p).is_some_and(|t| {
                f64::from(t.elevation) > config.source_threshold && !terrain.is_water(t.terrain)
            })
        })
        .collect();
    sources.shuffle(&mut seed.rng());

    let mut rivers = Vec::new();
    let mut attempted = 0;
    for source in sources {
        if attempted >= config.sources {
            break;
        }
        // An earlier river may have flooded this source
        if grid.get(source).map_or(true, |t| terrain.is_water(t.terrain)) {
            continue;
        }
        attempted += 1;

        let river = trace(grid, source, config.max_length, terrain);
        if river.end == RiverEnd::LocalMinimum && river.len() < config.min_length {
            debug!(?source, len = river.len(), "discarding short dead-end river");
            continue;
        }
        carve(grid, &river, config, terrain, water);
        rivers.push(river);
    }
    rivers
}

fn trace<G: TileGrid + ?Sized>(
    grid: &G,
    source: TilePos,
    max_length: usize,
    terrain: &TerrainRegistry,
) -> RiverPath {
    let start = grid.get(source).map_or(0.0, |t| t.elevation);
    let mut points = vec![source];
    let mut elevations = vec![start];
    let mut visited = HashSet::from([source]);
    let (mut cur, mut height) = (source, start);

    let end = loop {
        if points.len() >= max_length {
            break RiverEnd::LengthCap;
        }

        let mut best: Option<(f32, bool, TilePos)> = None;
        for (dx, dy) in NEIGHBORS {
            let next = cur.offset(dx, dy);
            if visited.contains(&next) {
                continue;
            }
            let Some(tile) = grid.get(next) else { continue };
            let is_water = terrain.is_water(tile.terrain);
            let admissible = tile.elevation < height || (is_water && tile.elevation <= height);
            if !admissible {
                continue;
            }
            // Lowest first; water wins ties
            let better = best.map_or(true, |(e, w, _)| {
                tile.elevation < e || (tile.elevation == e && is_water && !w)
            });
            if better {
                best = Some((tile.elevation, is_water, next));
            }
        }

        let Some((elevation, is_water, next)) = best else {
            break RiverEnd::LocalMinimum;
        };
        points.push(next);
        elevations.push(elevation);
        visited.insert(next);
        if is_water {
            break RiverEnd::ReachedWater;
        }
        cur = next;
        height = elevation;
    };

    RiverPath {
        points,
        elevations,
        end,
    }
}

/// Paints water along the path, one tile wider every `widen_every` points.
fn carve<G: TileGrid + ?Sized>(
    grid: &mut G,
    river: &RiverPath,
    config: &RiverConfig,
    terrain: &TerrainRegistry,
    water: Tile,
) {
    for (step, point) in river.points.iter().enumerate() {
        let width = (1 + step / config.widen_every.max(1)).min(config.max_width.max(1) as usize);
        for (dx, dy) in brush(width as u32) {
            if let Some(tile) = grid.get_mut(point.offset(dx, dy)) {
                if !terrain.is_protected(tile.terrain) && !terrain.is_water(tile.terrain) {
                    paint(tile, water);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::postprocess::Region;
    use crate::seed::{SeedTag, WorldSeed};
    use hollowmere_shared::Rect;

    fn registry() -> TerrainRegistry {
        TerrainRegistry::new(&WorldConfig::standard().terrain)
    }

    /// A cone: highest in the middle, falling to the edges.
    fn cone(size: i32, terrain: &TerrainRegistry) -> Region {
        let grass = terrain.tile(terrain.lookup("grass").expect("grass"), 0.0);
        let c = size / 2;
        Region::from_fn(Rect::new(0, 0, size, size), |p| {
            let d = f64::from((p.x - c).abs().max((p.y - c).abs()));
            Tile {
                elevation: (1.0 - d / f64::from(c + 1)) as f32,
                ..grass
            }
        })
    }

    #[test]
    fn test_river_descends_strictly() {
        let terrain = registry();
        let mut region = cone(41, &terrain);
        let config = RiverConfig {
            sources: 3,
            source_threshold: 0.8,
            min_length: 2,
            ..RiverConfig::default()
        };
        let rivers = carve_rivers(&mut region, &config, &terrain, WorldSeed::new(1).purpose(SeedTag::River));
        assert!(!rivers.is_empty());
        for river in &rivers {
            assert!(river.len() <= config.max_length);
            for (i, pair) in river.elevations.windows(2).enumerate() {
                let into_water = river.end == RiverEnd::ReachedWater && i + 2 == river.len();
                assert!(pair[1] < pair[0] || (into_water && pair[1] <= pair[0]), "step {i} climbs");
            }
            for point in &river.points {
                let tile = region.get(*point).expect("in region");
                assert!(terrain.is_water(tile.terrain));
            }
        }
    }

    #[test]
    fn test_length_cap() {
        let terrain = registry();
        let mut region = cone(61, &terrain);
        let config = RiverConfig {
            sources: 1,
            source_threshold: 0.9,
            min_length: 1,
            max_length: 5,
            ..RiverConfig::default()
        };
        let rivers = carve_rivers(&mut region, &config, &terrain, WorldSeed::new(2).derive(&[]));
        assert_eq!(rivers.len(), 1);
        assert_eq!(rivers[0].len(), 5);
        assert_eq!(rivers[0].end, RiverEnd::LengthCap);
    }

    #[test]
    fn test_flat_source_is_short_dead_end() {
        let terrain = registry();
        let grass = terrain.tile(terrain.lookup("grass").expect("grass"), 0.9);
        let mut region = Region::from_fn(Rect::new(0, 0, 8, 8), |_| grass);
        let config = RiverConfig {
            source_threshold: 0.5,
            ..RiverConfig::default()
        };
        let rivers = carve_rivers(&mut region, &config, &terrain, WorldSeed::new(3).derive(&[]));
        assert!(rivers.is_empty(), "no downhill anywhere");
        assert!(region.tiles().iter().all(|t| !terrain.is_water(t.terrain)));
    }

    #[test]
    fn test_river_stops_at_existing_water() {
        let terrain = registry();
        let water_id = terrain.lookup("water").expect("water");
        let grass = terrain.tile(terrain.lookup("grass").expect("grass"), 0.0);
        // Slope falling to the east, with a lake at x >= 12
        let mut region = Region::from_fn(Rect::new(0, 0, 16, 3), |p| {
            let base = if p.x >= 12 { terrain.tile(water_id, 0.0) } else { grass };
            Tile {
                elevation: 1.0 - p.x as f32 / 16.0,
                ..base
            }
        });
        let config = RiverConfig {
            sources: 1,
            source_threshold: 0.95,
            min_length: 1,
            ..RiverConfig::default()
        };
        let rivers = carve_rivers(&mut region, &config, &terrain, WorldSeed::new(4).derive(&[]));
        assert_eq!(rivers.len(), 1);
        assert_eq!(rivers[0].end, RiverEnd::ReachedWater);
        assert_eq!(rivers[0].points.last().map(|p| p.x), Some(12));
    }
}
