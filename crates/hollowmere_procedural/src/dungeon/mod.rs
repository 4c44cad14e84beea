//! # Dungeon Floors
//!
//! Floors are generated from `(world seed, dungeon id, floor number)` alone.
//!
//! ## Pipeline
//!
//! ```text
//! strategy (rectangular | bsp) ──> Layout ──carve──> DungeonFloor ──check──┐
//!        ^                                                                 │
//!        └─── retry with a fresh sub-seed and relaxed params ◄── Err ──────┤
//!                                                                          │ Ok
//! linear fallback (after max_attempts) ──carve──────────────────────────────┤
//!                                                                          v
//!                        entrance / exit / stairs / tags / spawn points / schedules
//! ```
//!
//! A returned floor always has every room reachable from the entrance, both
//! through the room graph and by walking carved tiles.

mod bsp;
mod cache;
mod corridor;
mod features;
mod linear;
mod rectangular;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bytemuck::bytes_of;
use hollowmere_shared::{Rect, Room, RoomId, SpawnKind, SpawnPoint, Tile, TilePos};
use tracing::{debug, error, warn};

use crate::chunk::PackedTile;
use crate::config::{DungeonConfig, LayoutStrategy, TerrainRegistry};
use crate::delta::DeltaOverlay;
use crate::error::{GenerationError, GenerationResult};
use crate::noise::SimplexNoise;
use crate::postprocess::TileGrid;
use crate::seed::{DungeonId, SeedTag, SubSeed, WorldSeed};

pub use cache::FloorCache;
pub use features::annotate_scheduled_features;

/// Feature size of the floor elevation field, in tiles.
const ELEVATION_SCALE: f64 = 0.07;

/// Identity of one floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FloorId {
    /// Dungeon.
    pub dungeon: DungeonId,
    /// Floor number (1 is the top floor).
    pub floor: u32,
}

impl FloorId {
    /// Creates a floor identity.
    #[must_use]
    pub const fn new(dungeon: DungeonId, floor: u32) -> Self {
        Self { dungeon, floor }
    }
}

/// The layout a floor ended up with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// Random rectangles with a nearest-room spanning tree.
    Rectangular,
    /// Binary space partitioning.
    Bsp,
    /// Guaranteed linear chain.
    Linear,
}

/// Rooms and corridors before carving.
#[derive(Clone, Debug, Default)]
pub(crate) struct Layout {
    pub rooms: Vec<Rect>,
    /// Room index pairs, smaller index first.
    pub links: Vec<(usize, usize)>,
    /// One tile path per link.
    pub corridors: Vec<Vec<TilePos>>,
}

impl Layout {
    fn connect(&mut self, a: usize, b: usize, path: Vec<TilePos>) {
        self.links.push((a.min(b), a.max(b)));
        self.corridors.push(path);
    }

    fn is_linked(&self, a: usize, b: usize) -> bool {
        self.links.contains(&(a.min(b), a.max(b)))
    }
}

/// Layout knobs for one attempt.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LayoutParams {
    pub width: i32,
    pub height: i32,
    pub min_rooms: usize,
    pub target_rooms: usize,
    pub room_min: i32,
    pub room_max: i32,
    pub placement_retries: u32,
    pub extra_connections: u32,
    pub padding: i32,
    pub bsp_min_leaf: i32,
}

impl LayoutParams {
    /// Params for attempt `attempt` (0-based). Later attempts aim for fewer
    /// rooms, smaller BSP leaves and, from the third attempt on, allow rooms
    /// to touch.
    pub(crate) fn for_attempt(config: &DungeonConfig, attempt: u32) -> Self {
        let relax = attempt as usize;
        let room_min = config.room_min_size;
        Self {
            width: config.width,
            height: config.height,
            min_rooms: config.min_rooms,
            target_rooms: config
                .target_rooms
                .saturating_sub(relax * 2)
                .max(config.min_rooms),
            room_min,
            room_max: config
                .room_max_size
                .min(config.width - 2)
                .min(config.height - 2)
                .max(room_min),
            placement_retries: config.placement_retries,
            extra_connections: config.extra_connections,
            padding: if attempt >= 2 { 0 } else { config.overlap_padding },
            bsp_min_leaf: (config.bsp_min_leaf - attempt as i32).max(room_min + 2),
        }
    }
}

/// A generated dungeon floor.
#[derive(Clone, Debug)]
pub struct DungeonFloor {
    id: FloorId,
    layout: LayoutKind,
    attempts: u32,
    bounds: Rect,
    /// Carved tiles only; anything absent is solid rock.
    tiles: BTreeMap<TilePos, Tile>,
    rooms: Vec<Room>,
    entrance: usize,
    exit: usize,
    spawns: Vec<SpawnPoint>,
    overlay: DeltaOverlay,
}

impl DungeonFloor {
    /// Floor identity.
    #[must_use]
    pub fn id(&self) -> FloorId {
        self.id
    }

    /// Layout the floor ended up with.
    #[must_use]
    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    /// Layout attempts made (the fallback counts as one more).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Floor rectangle.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Rooms in id order.
    #[must_use]
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// A room by id.
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(usize::from(id.0))
    }

    /// The room holding the stairs up.
    #[must_use]
    pub fn entrance(&self) -> &Room {
        &self.rooms[self.entrance]
    }

    /// The room holding the stairs down.
    #[must_use]
    pub fn exit(&self) -> &Room {
        &self.rooms[self.exit]
    }

    /// Every spawn point, including consumed ones.
    #[must_use]
    pub fn spawn_points(&self) -> &[SpawnPoint] {
        &self.spawns
    }

    /// Spawn points not removed or depleted by the overlay.
    pub fn active_spawn_points(&self) -> impl Iterator<Item = &SpawnPoint> + '_ {
        self.spawns
            .iter()
            .filter(|s| self.overlay.at(s.pos).is_empty())
    }

    /// Spawn points of one kind.
    pub fn spawns_of(&self, kind: SpawnKind) -> impl Iterator<Item = &SpawnPoint> + '_ {
        self.spawns.iter().filter(move |s| s.kind == kind)
    }

    /// Effective tile (pristine + overlay). `None` is solid rock.
    #[must_use]
    pub fn tile(&self, pos: TilePos) -> Option<Tile> {
        self.tiles.get(&pos).map(|t| self.overlay.apply(pos, *t))
    }

    /// Carved tiles in position order.
    pub fn tiles(&self) -> impl Iterator<Item = (TilePos, &Tile)> + '_ {
        self.tiles.iter().map(|(pos, tile)| (*pos, tile))
    }

    /// Number of carved tiles.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// The delta overlay.
    #[must_use]
    pub fn overlay(&self) -> &DeltaOverlay {
        &self.overlay
    }

    pub(crate) fn overlay_mut(&mut self) -> &mut DeltaOverlay {
        &mut self.overlay
    }

    pub(crate) fn set_overlay(&mut self, overlay: DeltaOverlay) {
        self.overlay = overlay;
    }

    /// Rooms reachable from the entrance through the room graph.
    #[must_use]
    pub fn reachable_rooms(&self) -> BTreeSet<RoomId> {
        self.room_hops().into_keys().collect()
    }

    /// Room graph is a single component containing the entrance.
    #[must_use]
    pub fn is_fully_connected(&self) -> bool {
        self.reachable_rooms().len() == self.rooms.len()
    }

    /// BFS hop count from the entrance to every reachable room.
    fn room_hops(&self) -> BTreeMap<RoomId, usize> {
        let mut hops = BTreeMap::new();
        let Some(start) = self.rooms.get(self.entrance) else {
            return hops;
        };
        let mut queue = VecDeque::from([(start.id, 0)]);
        hops.insert(start.id, 0);
        while let Some((id, depth)) = queue.pop_front() {
            let Some(room) = self.room(id) else { continue };
            for &next in &room.connections {
                if !hops.contains_key(&next) {
                    hops.insert(next, depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }
        hops
    }

    /// Rooms whose center can be walked to from the entrance center.
    fn walkable_rooms(&self) -> BTreeSet<RoomId> {
        let mut seen = BTreeSet::new();
        let Some(start) = self.rooms.get(self.entrance).map(|r| r.bounds.center()) else {
            return BTreeSet::new();
        };
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(pos) = queue.pop_front() {
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let next = pos.offset(dx, dy);
                if !seen.contains(&next) && self.tiles.get(&next).is_some_and(|t| t.walkable) {
                    seen.insert(next);
                    queue.push_back(next);
                }
            }
        }
        self.rooms
            .iter()
            .filter(|r| seen.contains(&r.bounds.center()))
            .map(|r| r.id)
            .collect()
    }

    /// Stable byte image of the pristine floor: tiles, rooms, spawn points.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.tiles.len() * 28);
        for (pos, tile) in &self.tiles {
            out.extend_from_slice(&pos.x.to_le_bytes());
            out.extend_from_slice(&pos.y.to_le_bytes());
            out.extend_from_slice(bytes_of(&PackedTile::pack(tile)));
        }
        for room in &self.rooms {
            for v in [room.bounds.x, room.bounds.y, room.bounds.width, room.bounds.height] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.push(u8::from(room.is_entrance) | (u8::from(room.is_exit) << 1));
            out.extend_from_slice(room.type_tag.as_bytes());
            for link in &room.connections {
                out.extend_from_slice(&link.0.to_le_bytes());
            }
        }
        for spawn in &self.spawns {
            out.push(spawn.kind as u8);
            out.extend_from_slice(&spawn.pos.x.to_le_bytes());
            out.extend_from_slice(&spawn.pos.y.to_le_bytes());
            out.extend_from_slice(spawn.tag.as_bytes());
        }
        out
    }
}

impl TileGrid for DungeonFloor {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.tiles.get_mut(&pos)
    }
}

/// Builds dungeon floors. Holds only seeded, read-only state.
#[derive(Clone, Debug)]
pub struct DungeonGenerator {
    seed: WorldSeed,
    config: DungeonConfig,
    floor_tile: Tile,
    wall_tile: Tile,
    stairs_up: Tile,
    stairs_down: Tile,
}

impl DungeonGenerator {
    /// Creates a generator from a validated dungeon config.
    #[must_use]
    pub fn new(seed: WorldSeed, config: &DungeonConfig, terrain: &TerrainRegistry) -> Self {
        let tile = |name: &str| terrain.tile(terrain.lookup(name).unwrap_or_default(), 0.0);
        Self {
            seed,
            floor_tile: tile(&config.floor_terrain),
            wall_tile: tile(&config.wall_terrain),
            stairs_up: tile(&config.stairs_up_terrain),
            stairs_down: tile(&config.stairs_down_terrain),
            config: config.clone(),
        }
    }

    /// The dungeon config.
    #[must_use]
    pub fn config(&self) -> &DungeonConfig {
        &self.config
    }

    fn floor_seed(&self, id: FloorId) -> SubSeed {
        self.seed
            .purpose(SeedTag::Dungeon)
            .derive(&[id.dungeon.context(), i64::from(id.floor)])
    }

    /// Strategy used for a floor (`mixed` picks one per floor).
    #[must_use]
    pub fn strategy_for(&self, id: FloorId) -> LayoutKind {
        match self.config.strategy {
            LayoutStrategy::Rectangular => LayoutKind::Rectangular,
            LayoutStrategy::Bsp => LayoutKind::Bsp,
            LayoutStrategy::Mixed => {
                if self.floor_seed(id).derive(&[SeedTag::Strategy.code()]).unit() < 0.5 {
                    LayoutKind::Rectangular
                } else {
                    LayoutKind::Bsp
                }
            }
        }
    }

    /// Generates a floor. Never fails: after `max_attempts` failed layouts
    /// the linear chain is used.
    #[must_use]
    pub fn generate_floor(&self, dungeon: DungeonId, floor: u32) -> DungeonFloor {
        let id = FloorId::new(dungeon, floor);
        let seed = self.floor_seed(id);
        let elevation = SimplexNoise::new(seed.derive(&[SeedTag::Elevation.code()]));
        let kind = self.strategy_for(id);

        let mut carved = None;
        for attempt in 0..self.config.max_attempts {
            let params = LayoutParams::for_attempt(&self.config, attempt);
            let mut rng = seed.derive(&[i64::from(attempt)]).rng();
            let layout = match kind {
                LayoutKind::Bsp => bsp::layout(&params, &mut rng),
                _ => rectangular::layout(&params, &mut rng),
            };
            let candidate = self.carve(id, kind, attempt + 1, &layout, &elevation);
            match check(&candidate, params.min_rooms) {
                Ok(()) => {
                    carved = Some(candidate);
                    break;
                }
                Err(e) => warn!(?id, attempt, error = %e, "dungeon layout rejected; retrying"),
            }
        }

        let mut floor = carved.unwrap_or_else(|| {
            warn!(?id, attempts = self.config.max_attempts, "falling back to linear dungeon layout");
            let layout = linear::layout(&LayoutParams::for_attempt(&self.config, 0));
            let floor = self.carve(
                id,
                LayoutKind::Linear,
                self.config.max_attempts + 1,
                &layout,
                &elevation,
            );
            if let Err(e) = check(&floor, self.config.min_rooms) {
                error!(?id, error = %e, "linear dungeon layout failed its own check");
            }
            floor
        });

        self.place_stairs(&mut floor);
        features::decorate(&mut floor, &self.config, &mut seed.derive(&[SeedTag::SpawnRoll.code()]).rng());
        annotate_scheduled_features(&mut floor, &self.config.scheduled_features);

        debug!(
            ?id,
            layout = ?floor.layout,
            rooms = floor.rooms.len(),
            tiles = floor.tiles.len(),
            spawns = floor.spawns.len(),
            "dungeon floor generated"
        );
        floor
    }

    fn carve(
        &self,
        id: FloorId,
        layout_kind: LayoutKind,
        attempts: u32,
        layout: &Layout,
        elevation: &SimplexNoise,
    ) -> DungeonFloor {
        let bounds = Rect::new(0, 0, self.config.width, self.config.height);

        let mut open = BTreeSet::new();
        for room in &layout.rooms {
            open.extend(room.positions());
        }
        for path in &layout.corridors {
            open.extend(path.iter().copied().filter(|p| bounds.contains(*p)));
        }

        let mut tiles = BTreeMap::new();
        for &pos in &open {
            let height = elevation.normalized(
                f64::from(pos.x) * ELEVATION_SCALE,
                f64::from(pos.y) * ELEVATION_SCALE,
                3,
                0.5,
                2.0,
            );
            tiles.insert(pos, Tile {
                elevation: height as f32,
                ..self.floor_tile
            });
        }
        for &pos in &open {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let next = pos.offset(dx, dy);
                    if bounds.contains(next) && !open.contains(&next) {
                        tiles.entry(next).or_insert(self.wall_tile);
                    }
                }
            }
        }

        let mut rooms: Vec<Room> = layout
            .rooms
            .iter()
            .enumerate()
            .map_while(|(i, bounds)| room_id(i).map(|id| Room::new(id, *bounds)))
            .collect();
        if rooms.len() < layout.rooms.len() {
            warn!(
                ?id,
                placed = layout.rooms.len(),
                kept = rooms.len(),
                "layout exceeds the room id space, extra rooms dropped"
            );
        }
        for &(a, b) in &layout.links {
            if let (Some(ra), Some(rb)) = (room_id(a), room_id(b)) {
                if a < rooms.len() && b < rooms.len() {
                    rooms[a].connections.insert(rb);
                    rooms[b].connections.insert(ra);
                }
            }
        }

        DungeonFloor {
            id,
            layout: layout_kind,
            attempts,
            bounds,
            tiles,
            rooms,
            entrance: 0,
            exit: 0,
            spawns: Vec::new(),
            overlay: DeltaOverlay::new(),
        }
    }

    /// Entrance is the first room, exit the room most hops away from it.
    fn place_stairs(&self, floor: &mut DungeonFloor) {
        if floor.rooms.is_empty() {
            return;
        }
        floor.entrance = 0;
        floor.exit = floor
            .room_hops()
            .into_iter()
            .max_by_key(|&(id, hops)| (hops, std::cmp::Reverse(id)))
            .map_or(0, |(id, _)| usize::from(id.0));

        for (index, stairs) in [(floor.entrance, self.stairs_up), (floor.exit, self.stairs_down)] {
            let center = floor.rooms[index].bounds.center();
            if let Some(tile) = floor.tiles.get_mut(&center) {
                *tile = Tile {
                    elevation: tile.elevation,
                    ..stairs
                };
            }
        }
        floor.rooms[floor.entrance].is_entrance = true;
        floor.rooms[floor.exit].is_exit = true;
    }
}

/// Id of the room at `index`, or `None` past the last representable id.
fn room_id(index: usize) -> Option<RoomId> {
    u16::try_from(index).ok().map(RoomId)
}

/// Minimum room count and two-way reachability.
fn check(floor: &DungeonFloor, min_rooms: usize) -> GenerationResult<()> {
    if floor.rooms.len() < min_rooms {
        return Err(GenerationError::InsufficientRooms {
            placed: floor.rooms.len(),
            required: min_rooms,
        });
    }
    let by_graph = floor.reachable_rooms();
    let by_tiles = floor.walkable_rooms();
    let unreachable = floor
        .rooms
        .iter()
        .filter(|r| !by_graph.contains(&r.id) || !by_tiles.contains(&r.id))
        .count();
    if unreachable > 0 {
        return Err(GenerationError::Disconnected { unreachable });
    }
    Ok(())
}
