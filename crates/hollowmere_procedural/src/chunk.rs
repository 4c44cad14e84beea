//! # Chunk System
//!
//! The overworld is cut into fixed `CHUNK_SIZE x CHUNK_SIZE` tile chunks,
//! the unit of generation, caching and delta persistence.
//!
//! ## Pristine + overlay
//!
//! A chunk owns its pristine tile grid (a pure function of world seed,
//! coordinate and config) and a [`DeltaOverlay`]. Reads go through the
//! overlay; nothing ever writes a pristine tile after generation.
//!
//! ## Packed Format
//!
//! [`Chunk::to_bytes`] packs pristine tiles through the `Pod` [`PackedTile`]
//! record followed by the creature candidates. Two generations of the same
//! chunk produce identical bytes.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use hollowmere_shared::{OccupantId, Tile, TilePos};

use crate::biome::BiomeClassifier;
use crate::config::{OccupantRegistry, TerrainRegistry, WorldConfig};
use crate::delta::DeltaOverlay;
use crate::seed::WorldSeed;
use crate::spawn::{CreatureCandidate, SiteInfo, SpawnEngine, SpawnTable};

/// Chunk side in tiles.
pub const CHUNK_SIZE: usize = 32;

/// Tiles per chunk.
pub const TILES_PER_CHUNK: usize = CHUNK_SIZE * CHUNK_SIZE;

const SIZE_I32: i32 = CHUNK_SIZE as i32;

/// Chunk coordinate (in chunks, not tiles).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The chunk containing a tile.
    #[inline]
    #[must_use]
    pub const fn from_tile(pos: TilePos) -> Self {
        Self {
            x: pos.x.div_euclid(SIZE_I32),
            y: pos.y.div_euclid(SIZE_I32),
        }
    }

    /// World position of the chunk's top-left tile.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> TilePos {
        TilePos::new(self.x * SIZE_I32, self.y * SIZE_I32)
    }

    /// Euclidean distance in chunk units.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Row-major index of a world tile inside this chunk.
    #[inline]
    fn local_index(self, pos: TilePos) -> Option<usize> {
        let lx = pos.x - self.x * SIZE_I32;
        let ly = pos.y - self.y * SIZE_I32;
        if (0..SIZE_I32).contains(&lx) && (0..SIZE_I32).contains(&ly) {
            Some((ly * SIZE_I32 + lx) as usize)
        } else {
            None
        }
    }

    /// Every chunk whose distance to `self` is at most `radius`, nearest
    /// first (ties in coordinate order).
    #[must_use]
    pub fn within(self, radius: f64) -> Vec<Self> {
        let r = radius.max(0.0).floor() as i32;
        let mut out = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dy in -r..=r {
            for dx in -r..=r {
                let c = Self::new(self.x + dx, self.y + dy);
                if self.distance(c) <= radius {
                    out.push(c);
                }
            }
        }
        out.sort_by(|a, b| self.distance(*a).total_cmp(&self.distance(*b)).then(a.cmp(b)));
        out
    }
}

/// Fixed-layout tile record for packed output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PackedTile {
    /// Elevation.
    pub elevation: f32,
    /// Glyph as a Unicode scalar.
    pub glyph: u32,
    /// Occupant id (valid when `FLAG_OCCUPIED` is set).
    pub occupant: u32,
    /// Terrain id.
    pub terrain: u16,
    /// Display color.
    pub color: [u8; 3],
    /// Bit flags.
    pub flags: u8,
    _pad: [u8; 2],
}

impl PackedTile {
    /// Tile is walkable.
    pub const FLAG_WALKABLE: u8 = 1;
    /// Tile is transparent.
    pub const FLAG_TRANSPARENT: u8 = 2;
    /// `occupant` is meaningful.
    pub const FLAG_OCCUPIED: u8 = 4;

    /// Packs a tile.
    #[must_use]
    pub fn pack(tile: &Tile) -> Self {
        let mut flags = 0;
        if tile.walkable {
            flags |= Self::FLAG_WALKABLE;
        }
        if tile.transparent {
            flags |= Self::FLAG_TRANSPARENT;
        }
        if tile.occupant.is_some() {
            flags |= Self::FLAG_OCCUPIED;
        }
        Self {
            elevation: tile.elevation,
            glyph: u32::from(tile.glyph),
            occupant: tile.occupant.map_or(0, |o| o.0),
            terrain: tile.terrain.0,
            color: tile.color,
            flags,
            _pad: [0; 2],
        }
    }
}

/// A generated chunk plus its delta overlay.
#[derive(Clone, Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    /// Pristine tiles, row-major.
    tiles: Vec<Tile>,
    /// Uncapped creature candidates in sampling order.
    creatures: Vec<CreatureCandidate>,
    overlay: DeltaOverlay,
}

impl Chunk {
    /// Chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Pristine tile at local coordinates.
    #[inline]
    #[must_use]
    pub fn pristine(&self, local_x: usize, local_y: usize) -> Option<&Tile> {
        if local_x < CHUNK_SIZE && local_y < CHUNK_SIZE {
            self.tiles.get(local_y * CHUNK_SIZE + local_x)
        } else {
            None
        }
    }

    /// Effective tile (pristine + overlay) at a world position.
    #[must_use]
    pub fn tile_at(&self, pos: TilePos) -> Option<Tile> {
        let index = self.coord.local_index(pos)?;
        Some(self.overlay.apply(pos, self.tiles[index]))
    }

    /// Pristine `(position, occupant)` pairs in row-major order.
    #[must_use]
    pub fn occupants(&self) -> Vec<(TilePos, OccupantId)> {
        let origin = self.coord.origin();
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                t.occupant.map(|o| {
                    (origin.offset((i % CHUNK_SIZE) as i32, (i / CHUNK_SIZE) as i32), o)
                })
            })
            .collect()
    }

    /// Creature candidates (uncapped, no exclusion applied).
    #[must_use]
    pub fn creature_candidates(&self) -> &[CreatureCandidate] {
        &self.creatures
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

    /// Packs the pristine grid and creature candidates.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let packed: Vec<PackedTile> = self.tiles.iter().map(PackedTile::pack).collect();
        let mut out = Vec::with_capacity(
            std::mem::size_of_val(packed.as_slice()) + 4 + self.creatures.len() * 16,
        );
        out.extend_from_slice(bytemuck::cast_slice(&packed));
        out.extend_from_slice(&(self.creatures.len() as u32).to_le_bytes());
        for c in &self.creatures {
            out.extend_from_slice(&c.spawn.occupant.0.to_le_bytes());
            out.extend_from_slice(&c.spawn.pos.x.to_le_bytes());
            out.extend_from_slice(&c.spawn.pos.y.to_le_bytes());
            out.extend_from_slice(&c.max_population.to_le_bytes());
        }
        out
    }
}

/// Produces pristine chunks. Pure: holds only seeded, read-only state.
pub struct ChunkGenerator {
    classifier: Arc<BiomeClassifier>,
    spawns: Arc<SpawnEngine>,
    terrain: Arc<TerrainRegistry>,
}

impl ChunkGenerator {
    /// Builds a standalone generator from a validated config.
    #[must_use]
    pub fn new(seed: WorldSeed, config: &WorldConfig) -> Self {
        let terrain = Arc::new(TerrainRegistry::new(&config.terrain));
        let occupants = Arc::new(OccupantRegistry::new(&config.occupants));
        let classifier = Arc::new(BiomeClassifier::new(
            seed,
            &config.biomes,
            &terrain,
            &config.spawn_tables,
        ));
        let spawns = Arc::new(SpawnEngine::new(seed, &config.spawning, occupants));
        Self::from_parts(classifier, spawns, terrain)
    }

    /// Builds a generator sharing existing components.
    #[must_use]
    pub fn from_parts(
        classifier: Arc<BiomeClassifier>,
        spawns: Arc<SpawnEngine>,
        terrain: Arc<TerrainRegistry>,
    ) -> Self {
        Self {
            classifier,
            spawns,
            terrain,
        }
    }

    /// The classifier this generator samples.
    #[must_use]
    pub fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    /// The spawn engine this generator uses.
    #[must_use]
    pub fn spawns(&self) -> &SpawnEngine {
        &self.spawns
    }

    /// Generates the pristine chunk at `coord` (empty overlay).
    #[must_use]
    pub fn generate(&self, coord: ChunkCoord) -> Chunk {
        let origin = coord.origin();
        let mut tiles = Vec::with_capacity(TILES_PER_CHUNK);
        let mut sites = Vec::with_capacity(TILES_PER_CHUNK);
        let mut tables: Vec<Arc<SpawnTable>> = Vec::new();
        let mut table_of_biome: HashMap<usize, u16> = HashMap::new();

        for ly in 0..SIZE_I32 {
            for lx in 0..SIZE_I32 {
                let pos = origin.offset(lx, ly);
                let (wx, wy) = (f64::from(pos.x), f64::from(pos.y));

                // Discrete pick for the tile type, blended tint for its color
                let record = self.classifier.classify(wx, wy);
                let tint = self.classifier.blend(wx, wy).tint;

                let mut tile = self.terrain.tile(record.floor_tile, record.elevation as f32);
                tile.color = tint;
                if tile.walkable {
                    tile.occupant = self.spawns.tile_occupant(
                        &record.spawn_table,
                        pos,
                        record.elevation,
                        record.moisture,
                    );
                }

                let table = *table_of_biome.entry(record.index).or_insert_with(|| {
                    tables.push(Arc::clone(&record.spawn_table));
                    (tables.len() - 1) as u16
                });
                sites.push(SiteInfo {
                    elevation: record.elevation,
                    moisture: record.moisture,
                    table,
                    walkable: tile.walkable,
                });
                tiles.push(tile);
            }
        }

        let creatures = self.spawns.creature_candidates(
            (coord.x, coord.y),
            origin,
            SIZE_I32,
            &sites,
            &tables,
        );

        Chunk {
            coord,
            tiles,
            creatures,
            overlay: DeltaOverlay::new(),
        }
    }
}
