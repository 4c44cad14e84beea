//! # World Configuration
//!
//! Every tunable the generator reads lives in one [`WorldConfig`] document,
//! loaded from TOML once at startup. Each record type has an explicit schema
//! (`deny_unknown_fields`), and [`WorldConfig::validate`] rejects semantic
//! problems with an error naming the exact record.
//!
//! ## Layout
//!
//! ```toml
//! [chunks]                  # streaming radii and cache size
//! [[terrain]]               # terrain registry
//! [[occupants]]             # resource / flora / creature / structure ids
//! [biomes]                  # climate noise + default biome
//! [[biomes.entries]]        # ordered threshold table, first match wins
//! [[spawn_tables]]          # per-biome spawn entries
//! [spawning]                # clustering field + creature sampling
//! [dungeon]                 # floor layout parameters
//! [[dungeon.scheduled_features]]
//! [rivers]
//! [roads]
//! ```
//!
//! Occupant ids referenced by spawn tables are deliberately NOT checked
//! here: a missing occupant is skipped (and logged) at generation time.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use hollowmere_shared::{OccupantId, SpawnKind, TerrainId, Tile};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::spawn::{SpawnEntry, SpawnTable};

/// Inclusive `[min, max]` band over a normalized value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band(pub f64, pub f64);

impl Band {
    /// The whole unit interval.
    pub const FULL: Self = Self(0.0, 1.0);

    /// Lower bound.
    #[inline]
    #[must_use]
    pub const fn min(self) -> f64 {
        self.0
    }

    /// Upper bound.
    #[inline]
    #[must_use]
    pub const fn max(self) -> f64 {
        self.1
    }

    /// Inclusive containment.
    #[inline]
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        self.0 <= value && value <= self.1
    }

    fn check(self, record: &str, field: &str) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.0) || !(0.0..=1.0).contains(&self.1) || self.0 > self.1 {
            return Err(ConfigError::invalid(
                record,
                format!("{field} [{}, {}] must be an ordered band within [0, 1]", self.0, self.1),
            ));
        }
        Ok(())
    }
}

impl Default for Band {
    fn default() -> Self {
        Self::FULL
    }
}

/// `[chunks]`: streaming radii (in chunk units) and cache bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkConfig {
    /// R1: chunks within this distance are kept loaded.
    pub active_radius: f64,
    /// Chunks within this distance are generated ahead of time by workers.
    pub prefetch_radius: f64,
    /// R2: loaded chunks beyond this distance are evicted.
    pub retain_radius: f64,
    /// Soft cap on resident chunks.
    pub max_loaded: usize,
    /// Background generation threads (0 = generate on the caller's thread).
    pub worker_threads: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            active_radius: 2.0,
            prefetch_radius: 3.0,
            retain_radius: 4.0,
            max_loaded: 96,
            worker_threads: 0,
        }
    }
}

/// `[[terrain]]`: one terrain type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerrainDef {
    /// Numeric id stored in tiles.
    pub id: u16,
    /// Name referenced by biomes, dungeons, rivers and roads.
    pub name: String,
    /// Display glyph.
    pub glyph: char,
    /// Display color.
    pub color: [u8; 3],
    /// Creatures can stand here.
    pub walkable: bool,
    /// Sight passes through.
    #[serde(default = "default_true")]
    pub transparent: bool,
    /// Counts as water for rivers and roads.
    #[serde(default)]
    pub water: bool,
    /// Never overwritten by river or road carving.
    #[serde(default)]
    pub protected: bool,
}

const fn default_true() -> bool {
    true
}

/// Broad category of an occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupantCategory {
    /// Harvestable resource.
    Resource,
    /// Plants.
    Flora,
    /// Wildlife.
    Creature,
    /// Player-built.
    Structure,
}

/// `[[occupants]]`: a known occupant id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OccupantDef {
    /// Numeric id.
    pub id: u32,
    /// Name for logs and tools.
    pub name: String,
    /// Category.
    pub category: OccupantCategory,
}

/// `[biomes]`: climate fields plus the ordered threshold table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiomeTableConfig {
    /// Biome used when no entry matches.
    pub default: String,
    /// Elevation noise frequency (per tile).
    #[serde(default = "default_elevation_scale")]
    pub elevation_scale: f64,
    /// Moisture noise frequency (per tile).
    #[serde(default = "default_moisture_scale")]
    pub moisture_scale: f64,
    /// Octaves for both fields.
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    /// Amplitude decay per octave.
    #[serde(default = "default_persistence")]
    pub persistence: f64,
    /// Frequency gain per octave.
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f64,
    /// Distance (tiles) of the blend sample ring.
    #[serde(default = "default_blend_radius")]
    pub blend_radius: f64,
    /// Gaussian width (tiles) of blend weights.
    #[serde(default = "default_blend_sigma")]
    pub blend_sigma: f64,
    /// Ordered threshold entries.
    pub entries: Vec<BiomeEntry>,
}

const fn default_elevation_scale() -> f64 {
    0.008
}
const fn default_moisture_scale() -> f64 {
    0.011
}
const fn default_octaves() -> u32 {
    4
}
const fn default_persistence() -> f64 {
    0.5
}
const fn default_lacunarity() -> f64 {
    2.0
}
const fn default_blend_radius() -> f64 {
    6.0
}
const fn default_blend_sigma() -> f64 {
    5.0
}

/// `[[biomes.entries]]`: one row of the threshold table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiomeEntry {
    /// Biome id.
    pub id: String,
    /// Elevation band.
    pub elevation: Band,
    /// Moisture band.
    pub moisture: Band,
    /// Terrain name of the biome's floor.
    pub floor_tile: String,
    /// Floor tint used by blended color fields.
    pub tint: [u8; 3],
    /// Spawn table name.
    pub spawn_table: String,
}

/// `[spawning]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpawningConfig {
    /// Cell size (tiles) of the cellular clustering fields.
    pub cluster_cell_size: f64,
    /// Field value at which a fully clustered entry reaches base density.
    pub cluster_pivot: f64,
    /// Creature candidate positions sampled per chunk and entry.
    pub creature_samples_per_chunk: u32,
    /// No creature spawns within this many tiles of the player.
    pub player_exclusion_radius: f64,
}

impl Default for SpawningConfig {
    fn default() -> Self {
        Self {
            cluster_cell_size: 12.0,
            cluster_pivot: 0.7,
            creature_samples_per_chunk: 24,
            player_exclusion_radius: 10.0,
        }
    }
}

/// Layout algorithm for dungeon floors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStrategy {
    /// Random non-overlapping rectangles joined by corridors.
    Rectangular,
    /// Binary space partitioning.
    Bsp,
    /// Seeded per floor.
    Mixed,
}

/// `[[dungeon.scheduled_features]]`: a feature guaranteed every K floors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledFeature {
    /// Applies on floors where `floor % every == 0`.
    pub every: u32,
    /// Content tag.
    pub tag: String,
    /// Spawn kind.
    #[serde(default = "default_scheduled_kind")]
    pub kind: SpawnKind,
}

const fn default_scheduled_kind() -> SpawnKind {
    SpawnKind::Feature
}

/// `[dungeon]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DungeonConfig {
    /// Floor width in tiles.
    pub width: i32,
    /// Floor height in tiles.
    pub height: i32,
    /// Layout algorithm.
    pub strategy: LayoutStrategy,
    /// Fewest playable rooms.
    pub min_rooms: usize,
    /// Rooms the rectangular strategy aims for.
    pub target_rooms: usize,
    /// Smallest room side.
    pub room_min_size: i32,
    /// Largest room side.
    pub room_max_size: i32,
    /// Placement proposals per attempt.
    pub placement_retries: u32,
    /// Extra loop corridors (rectangular).
    pub extra_connections: u32,
    /// Gap kept between rectangular rooms.
    pub overlap_padding: i32,
    /// Smallest BSP leaf side.
    pub bsp_min_leaf: i32,
    /// Layout attempts before the linear fallback.
    pub max_attempts: u32,
    /// Room floor terrain.
    pub floor_terrain: String,
    /// Room wall terrain.
    pub wall_terrain: String,
    /// Entrance stairs terrain.
    pub stairs_up_terrain: String,
    /// Exit stairs terrain.
    pub stairs_down_terrain: String,
    /// Room type tags, drawn per room.
    pub room_tags: Vec<String>,
    /// Feature tags.
    pub feature_tags: Vec<String>,
    /// Hazard tags.
    pub hazard_tags: Vec<String>,
    /// Enemy tags.
    pub enemy_tags: Vec<String>,
    /// Features per room `[min, max]`.
    pub features_per_room: [u32; 2],
    /// Hazards per room `[min, max]`.
    pub hazards_per_room: [u32; 2],
    /// Enemies per room `[min, max]`.
    pub enemies_per_room: [u32; 2],
    /// Guaranteed features.
    pub scheduled_features: Vec<ScheduledFeature>,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            strategy: LayoutStrategy::Mixed,
            min_rooms: 4,
            target_rooms: 10,
            room_min_size: 4,
            room_max_size: 10,
            placement_retries: 300,
            extra_connections: 2,
            overlap_padding: 1,
            bsp_min_leaf: 10,
            max_attempts: 4,
            floor_terrain: "stone_floor".to_string(),
            wall_terrain: "stone_wall".to_string(),
            stairs_up_terrain: "stairs_up".to_string(),
            stairs_down_terrain: "stairs_down".to_string(),
            room_tags: ["hall", "crypt", "storeroom", "shrine_room", "ossuary"]
                .map(String::from)
                .to_vec(),
            feature_tags: ["chest", "altar", "fountain"].map(String::from).to_vec(),
            hazard_tags: ["spike_trap", "pit", "poison_vent"].map(String::from).to_vec(),
            enemy_tags: ["skeleton", "ghoul", "giant_rat"].map(String::from).to_vec(),
            features_per_room: [0, 1],
            hazards_per_room: [0, 2],
            enemies_per_room: [0, 3],
            scheduled_features: Vec::new(),
        }
    }
}

/// `[rivers]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiverConfig {
    /// Rivers attempted per region.
    pub sources: u32,
    /// Sources must lie strictly above this elevation.
    pub source_threshold: f64,
    /// Dead-end rivers shorter than this are discarded.
    pub min_length: usize,
    /// Hard cap on river points.
    pub max_length: usize,
    /// Width grows by one every this many steps.
    pub widen_every: usize,
    /// Width cap.
    pub max_width: u32,
    /// Terrain carved into river tiles.
    pub water_terrain: String,
}

impl Default for RiverConfig {
    fn default() -> Self {
        Self {
            sources: 4,
            source_threshold: 0.65,
            min_length: 8,
            max_length: 256,
            widen_every: 24,
            max_width: 3,
            water_terrain: "water".to_string(),
        }
    }
}

/// `[roads]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoadConfig {
    /// Extra cost for stepping onto water.
    pub water_penalty: f64,
    /// Extra cost for stepping onto a non-walkable tile.
    pub clearing_penalty: f64,
    /// Cost per unit of `|elevation - 0.5|`.
    pub elevation_penalty: f64,
    /// Road width in tiles.
    pub width: u32,
    /// Terrain carved into road tiles.
    pub road_terrain: String,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            water_penalty: 10.0,
            clearing_penalty: 4.0,
            elevation_penalty: 2.0,
            width: 1,
            road_terrain: "road".to_string(),
        }
    }
}

/// The whole world configuration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldConfig {
    /// `[chunks]`
    #[serde(default)]
    pub chunks: ChunkConfig,
    /// `[[terrain]]`
    pub terrain: Vec<TerrainDef>,
    /// `[[occupants]]`
    #[serde(default)]
    pub occupants: Vec<OccupantDef>,
    /// `[biomes]`
    pub biomes: BiomeTableConfig,
    /// `[[spawn_tables]]`
    #[serde(default)]
    pub spawn_tables: Vec<SpawnTable>,
    /// `[spawning]`
    #[serde(default)]
    pub spawning: SpawningConfig,
    /// `[dungeon]`
    #[serde(default)]
    pub dungeon: DungeonConfig,
    /// `[rivers]`
    #[serde(default)]
    pub rivers: RiverConfig,
    /// `[roads]`
    #[serde(default)]
    pub roads: RoadConfig,
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on schema or validation failure.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on I/O, schema or validation failure.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Built-in tables: seven overworld biomes, a small occupant set and the
    /// terrain needed by dungeons, rivers and roads.
    #[must_use]
    pub fn standard() -> Self {
        let terrain = vec![
            terrain(0, "grass", '.', [86, 140, 62], true, false),
            terrain(1, "sand", ',', [212, 196, 140], true, false),
            terrain(2, "marsh", '"', [74, 104, 80], true, false),
            TerrainDef {
                water: true,
                ..terrain(3, "water", '~', [48, 92, 168], false, false)
            },
            terrain(4, "forest_floor", '.', [52, 96, 44], true, false),
            terrain(5, "rock", '^', [120, 116, 110], true, false),
            terrain(6, "snow", '*', [236, 240, 244], true, false),
            terrain(7, "road", '=', [150, 120, 84], true, false),
            terrain(8, "stone_floor", '.', [96, 96, 96], true, false),
            TerrainDef {
                transparent: false,
                ..terrain(9, "stone_wall", '#', [64, 60, 56], false, false)
            },
            terrain(10, "stairs_up", '<', [200, 200, 120], true, true),
            terrain(11, "stairs_down", '>', [200, 200, 120], true, true),
        ];

        let occupants = vec![
            occupant(100, "iron_ore", OccupantCategory::Resource),
            occupant(101, "copper_ore", OccupantCategory::Resource),
            occupant(102, "clay", OccupantCategory::Resource),
            occupant(103, "salt", OccupantCategory::Resource),
            occupant(200, "oak", OccupantCategory::Flora),
            occupant(201, "reeds", OccupantCategory::Flora),
            occupant(202, "cactus", OccupantCategory::Flora),
            occupant(203, "berry_bush", OccupantCategory::Flora),
            occupant(204, "pine", OccupantCategory::Flora),
            occupant(300, "deer", OccupantCategory::Creature),
            occupant(301, "wolf", OccupantCategory::Creature),
            occupant(302, "frog", OccupantCategory::Creature),
            occupant(303, "goat", OccupantCategory::Creature),
            occupant(400, "palisade", OccupantCategory::Structure),
            occupant(401, "campfire", OccupantCategory::Structure),
        ];

        let entries = vec![
            biome("deep_water", Band(0.0, 0.25), Band::FULL, "water", [40, 80, 160]),
            biome("wetland", Band(0.25, 0.45), Band(0.65, 1.0), "marsh", [70, 110, 84]),
            biome("desert", Band(0.25, 0.6), Band(0.0, 0.25), "sand", [222, 200, 140]),
            biome("plains", Band(0.25, 0.6), Band(0.25, 0.65), "grass", [100, 156, 70]),
            biome("hills", Band(0.6, 0.8), Band(0.0, 0.65), "rock", [130, 124, 104]),
            biome("forest", Band(0.45, 0.8), Band(0.65, 1.0), "forest_floor", [48, 100, 48]),
            biome("mountain", Band(0.8, 1.0), Band::FULL, "snow", [226, 230, 236]),
        ];

        let spawn_tables = vec![
            table("deep_water", vec![], vec![], vec![]),
            table(
                "wetland",
                vec![entry(102, 0.02, 0.7)],
                vec![entry(201, 0.12, 0.5)],
                vec![creature(302, 0.08, 0.3, 6)],
            ),
            table(
                "desert",
                vec![entry(103, 0.01, 0.8)],
                vec![entry(202, 0.015, 0.2)],
                vec![],
            ),
            table(
                "plains",
                vec![entry(101, 0.004, 0.9)],
                vec![entry(203, 0.02, 0.6), entry(200, 0.01, 0.4)],
                vec![creature(300, 0.06, 0.4, 5), creature(301, 0.02, 0.8, 3)],
            ),
            table(
                "hills",
                vec![entry(100, 0.03, 0.8), entry(101, 0.01, 0.6)],
                vec![],
                vec![creature(303, 0.05, 0.5, 4)],
            ),
            table(
                "forest",
                vec![],
                vec![entry(200, 0.2, 0.5), entry(204, 0.1, 0.7), entry(203, 0.02, 0.3)],
                vec![creature(300, 0.08, 0.3, 6), creature(301, 0.03, 0.9, 4)],
            ),
            table("mountain", vec![entry(100, 0.05, 1.0)], vec![], vec![]),
        ];

        Self {
            chunks: ChunkConfig::default(),
            terrain,
            occupants,
            biomes: BiomeTableConfig {
                default: "plains".to_string(),
                elevation_scale: default_elevation_scale(),
                moisture_scale: default_moisture_scale(),
                octaves: default_octaves(),
                persistence: default_persistence(),
                lacunarity: default_lacunarity(),
                blend_radius: default_blend_radius(),
                blend_sigma: default_blend_sigma(),
                entries,
            },
            spawn_tables,
            spawning: SpawningConfig::default(),
            dungeon: DungeonConfig::default(),
            rivers: RiverConfig::default(),
            roads: RoadConfig::default(),
        }
    }

    /// Checks cross-references and value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        let terrain_names = self.validate_terrain()?;
        self.validate_occupants()?;
        let table_names = self.validate_spawn_tables()?;
        self.validate_biomes(&terrain_names, &table_names)?;
        self.validate_chunks()?;
        self.validate_dungeon(&terrain_names)?;
        self.validate_post_process(&terrain_names)
    }

    fn validate_terrain(&self) -> ConfigResult<HashSet<&str>> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for (i, def) in self.terrain.iter().enumerate() {
            let record = format!("terrain[{i}] ({:?})", def.name);
            if !ids.insert(def.id) {
                return Err(ConfigError::invalid(record, format!("duplicate terrain id {}", def.id)));
            }
            if !names.insert(def.name.as_str()) {
                return Err(ConfigError::invalid(record, "duplicate terrain name"));
            }
        }
        Ok(names)
    }

    fn validate_occupants(&self) -> ConfigResult<()> {
        let mut ids = HashSet::new();
        for (i, def) in self.occupants.iter().enumerate() {
            if !ids.insert(def.id) {
                return Err(ConfigError::invalid(
                    format!("occupants[{i}] ({:?})", def.name),
                    format!("duplicate occupant id {}", def.id),
                ));
            }
        }
        Ok(())
    }

    fn validate_spawn_tables(&self) -> ConfigResult<HashSet<&str>> {
        let mut names = HashSet::new();
        for (i, table) in self.spawn_tables.iter().enumerate() {
            let record = format!("spawn_tables[{i}] ({:?})", table.name);
            if !names.insert(table.name.as_str()) {
                return Err(ConfigError::invalid(record, "duplicate spawn table name"));
            }
            let groups: [(&str, &[SpawnEntry]); 3] = [
                ("resources", &table.resources),
                ("flora", &table.flora),
                ("creatures", &table.creatures),
            ];
            for (group, entries) in groups {
                for (j, entry) in entries.iter().enumerate() {
                    let record = format!("{record}.{group}[{j}]");
                    entry.validate(&record)?;
                }
            }
        }
        Ok(names)
    }

    fn validate_biomes(
        &self,
        terrain_names: &HashSet<&str>,
        table_names: &HashSet<&str>,
    ) -> ConfigResult<()> {
        let biomes = &self.biomes;
        if biomes.entries.is_empty() {
            return Err(ConfigError::NoBiomes);
        }
        let mut ids = HashSet::new();
        for (i, entry) in biomes.entries.iter().enumerate() {
            let record = format!("biomes.entries[{i}] ({:?})", entry.id);
            if !ids.insert(entry.id.as_str()) {
                return Err(ConfigError::invalid(record, "duplicate biome id"));
            }
            entry.elevation.check(&record, "elevation")?;
            entry.moisture.check(&record, "moisture")?;
            if !terrain_names.contains(entry.floor_tile.as_str()) {
                return Err(ConfigError::invalid(
                    record,
                    format!("unknown floor_tile {:?}", entry.floor_tile),
                ));
            }
            if !table_names.contains(entry.spawn_table.as_str()) {
                return Err(ConfigError::invalid(
                    record,
                    format!("unknown spawn_table {:?}", entry.spawn_table),
                ));
            }
        }
        if !ids.contains(biomes.default.as_str()) {
            return Err(ConfigError::invalid(
                "biomes.default",
                format!("default biome {:?} is not in the table", biomes.default),
            ));
        }
        if biomes.elevation_scale <= 0.0 || biomes.moisture_scale <= 0.0 {
            return Err(ConfigError::invalid("biomes", "noise scales must be positive"));
        }
        if biomes.octaves == 0 {
            return Err(ConfigError::invalid("biomes", "octaves must be at least 1"));
        }
        if biomes.blend_radius <= 0.0 || biomes.blend_sigma <= 0.0 {
            return Err(ConfigError::invalid("biomes", "blend radius and sigma must be positive"));
        }
        Ok(())
    }

    fn validate_chunks(&self) -> ConfigResult<()> {
        let chunks = &self.chunks;
        if chunks.active_radius < 0.0 {
            return Err(ConfigError::invalid("chunks", "active_radius must be non-negative"));
        }
        if chunks.retain_radius < chunks.active_radius {
            return Err(ConfigError::invalid("chunks", "retain_radius must be >= active_radius"));
        }
        if chunks.prefetch_radius < chunks.active_radius || chunks.prefetch_radius > chunks.retain_radius {
            return Err(ConfigError::invalid(
                "chunks",
                "prefetch_radius must lie between active_radius and retain_radius",
            ));
        }
        if chunks.max_loaded == 0 {
            return Err(ConfigError::invalid("chunks", "max_loaded must be positive"));
        }
        if self.spawning.cluster_cell_size < 1.0 {
            return Err(ConfigError::invalid("spawning", "cluster_cell_size must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.spawning.cluster_pivot) {
            return Err(ConfigError::invalid("spawning", "cluster_pivot must be within [0, 1]"));
        }
        Ok(())
    }

    fn validate_dungeon(&self, terrain_names: &HashSet<&str>) -> ConfigResult<()> {
        let d = &self.dungeon;
        for (field, name) in [
            ("floor_terrain", &d.floor_terrain),
            ("wall_terrain", &d.wall_terrain),
            ("stairs_up_terrain", &d.stairs_up_terrain),
            ("stairs_down_terrain", &d.stairs_down_terrain),
        ] {
            if !terrain_names.contains(name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("dungeon.{field}"),
                    format!("unknown terrain {name:?}"),
                ));
            }
        }
        if d.min_rooms < 2 {
            return Err(ConfigError::invalid("dungeon", "min_rooms must be at least 2"));
        }
        if d.target_rooms < d.min_rooms {
            return Err(ConfigError::invalid("dungeon", "target_rooms must be >= min_rooms"));
        }
        if d.target_rooms > usize::from(u16::MAX) + 1 {
            return Err(ConfigError::invalid("dungeon", "target_rooms must fit in a 16-bit room id"));
        }
        if d.room_min_size < 2 || d.room_max_size < d.room_min_size {
            return Err(ConfigError::invalid(
                "dungeon",
                "room sizes must satisfy 2 <= room_min_size <= room_max_size",
            ));
        }
        if d.max_attempts == 0 {
            return Err(ConfigError::invalid("dungeon", "max_attempts must be at least 1"));
        }
        if d.bsp_min_leaf < d.room_min_size + 2 {
            return Err(ConfigError::invalid("dungeon", "bsp_min_leaf must be >= room_min_size + 2"));
        }
        if d.height < d.room_min_size + 2 {
            return Err(ConfigError::invalid("dungeon", "floor height cannot fit a room"));
        }
        // Linear fallback: min_rooms rooms in a row, each with a one-tile gap.
        let fallback_width = d.min_rooms as i64 * i64::from(d.room_min_size + 1) + 1;
        if i64::from(d.width) < fallback_width {
            return Err(ConfigError::invalid(
                "dungeon",
                format!("width {} cannot fit the linear fallback (needs {fallback_width})", d.width),
            ));
        }
        for (name, range) in [
            ("features_per_room", d.features_per_room),
            ("hazards_per_room", d.hazards_per_room),
            ("enemies_per_room", d.enemies_per_room),
        ] {
            if range[0] > range[1] {
                return Err(ConfigError::invalid(format!("dungeon.{name}"), "min exceeds max"));
            }
        }
        for (i, rule) in d.scheduled_features.iter().enumerate() {
            if rule.every == 0 {
                return Err(ConfigError::invalid(
                    format!("dungeon.scheduled_features[{i}] ({:?})", rule.tag),
                    "every must be at least 1",
                ));
            }
        }
        Ok(())
    }

    fn validate_post_process(&self, terrain_names: &HashSet<&str>) -> ConfigResult<()> {
        if !terrain_names.contains(self.rivers.water_terrain.as_str()) {
            return Err(ConfigError::invalid(
                "rivers.water_terrain",
                format!("unknown terrain {:?}", self.rivers.water_terrain),
            ));
        }
        if self.rivers.max_length < self.rivers.min_length || self.rivers.widen_every == 0 {
            return Err(ConfigError::invalid(
                "rivers",
                "need min_length <= max_length and widen_every >= 1",
            ));
        }
        if !terrain_names.contains(self.roads.road_terrain.as_str()) {
            return Err(ConfigError::invalid(
                "roads.road_terrain",
                format!("unknown terrain {:?}", self.roads.road_terrain),
            ));
        }
        let roads = &self.roads;
        if roads.water_penalty < 0.0 || roads.clearing_penalty < 0.0 || roads.elevation_penalty < 0.0 {
            return Err(ConfigError::invalid("roads", "penalties must be non-negative"));
        }
        Ok(())
    }
}

fn terrain(id: u16, name: &str, glyph: char, color: [u8; 3], walkable: bool, protected: bool) -> TerrainDef {
    TerrainDef {
        id,
        name: name.to_string(),
        glyph,
        color,
        walkable,
        transparent: true,
        water: false,
        protected,
    }
}

fn occupant(id: u32, name: &str, category: OccupantCategory) -> OccupantDef {
    OccupantDef {
        id,
        name: name.to_string(),
        category,
    }
}

fn biome(id: &str, elevation: Band, moisture: Band, floor_tile: &str, tint: [u8; 3]) -> BiomeEntry {
    BiomeEntry {
        id: id.to_string(),
        elevation,
        moisture,
        floor_tile: floor_tile.to_string(),
        tint,
        spawn_table: id.to_string(),
    }
}

fn table(name: &str, resources: Vec<SpawnEntry>, flora: Vec<SpawnEntry>, creatures: Vec<SpawnEntry>) -> SpawnTable {
    SpawnTable {
        name: name.to_string(),
        resources,
        flora,
        creatures,
    }
}

fn entry(occupant: u32, base_density: f64, clustering_factor: f64) -> SpawnEntry {
    SpawnEntry {
        occupant: OccupantId(occupant),
        base_density,
        clustering_factor,
        elevation: Band::FULL,
        moisture: Band::FULL,
        max_population: None,
    }
}

fn creature(occupant: u32, base_density: f64, clustering_factor: f64, max_population: u32) -> SpawnEntry {
    SpawnEntry {
        max_population: Some(max_population),
        ..entry(occupant, base_density, clustering_factor)
    }
}

/// Terrain lookup by id and by name.
#[derive(Clone, Debug)]
pub struct TerrainRegistry {
    defs: HashMap<TerrainId, TerrainDef>,
    by_name: HashMap<String, TerrainId>,
}

impl TerrainRegistry {
    /// Builds the registry from validated definitions.
    #[must_use]
    pub fn new(defs: &[TerrainDef]) -> Self {
        let mut registry = Self {
            defs: HashMap::with_capacity(defs.len()),
            by_name: HashMap::with_capacity(defs.len()),
        };
        for def in defs {
            registry.by_name.insert(def.name.clone(), TerrainId(def.id));
            registry.defs.insert(TerrainId(def.id), def.clone());
        }
        registry
    }

    /// Id of a named terrain.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TerrainId> {
        self.by_name.get(name).copied()
    }

    /// Definition of a terrain id.
    #[must_use]
    pub fn get(&self, id: TerrainId) -> Option<&TerrainDef> {
        self.defs.get(&id)
    }

    /// Builds a tile of the given terrain.
    ///
    /// Unknown ids produce an impassable `?` tile; validated configs never
    /// reference one.
    #[must_use]
    pub fn tile(&self, id: TerrainId, elevation: f32) -> Tile {
        match self.defs.get(&id) {
            Some(def) => Tile {
                terrain: id,
                walkable: def.walkable,
                transparent: def.transparent,
                elevation,
                glyph: def.glyph,
                color: def.color,
                occupant: None,
            },
            None => Tile {
                terrain: id,
                walkable: false,
                transparent: false,
                elevation,
                glyph: '?',
                color: [255, 0, 255],
                occupant: None,
            },
        }
    }

    /// Water terrain.
    #[inline]
    #[must_use]
    pub fn is_water(&self, id: TerrainId) -> bool {
        self.defs.get(&id).is_some_and(|def| def.water)
    }

    /// Terrain never overwritten by carving.
    #[inline]
    #[must_use]
    pub fn is_protected(&self, id: TerrainId) -> bool {
        self.defs.get(&id).is_some_and(|def| def.protected)
    }
}

/// Known occupant ids.
#[derive(Clone, Debug, Default)]
pub struct OccupantRegistry {
    defs: HashMap<OccupantId, OccupantDef>,
}

impl OccupantRegistry {
    /// Builds the registry from definitions.
    #[must_use]
    pub fn new(defs: &[OccupantDef]) -> Self {
        Self {
            defs: defs.iter().map(|d| (OccupantId(d.id), d.clone())).collect(),
        }
    }

    /// Returns true if the id is defined.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: OccupantId) -> bool {
        self.defs.contains_key(&id)
    }

    /// Category of a defined occupant.
    #[must_use]
    pub fn category(&self, id: OccupantId) -> Option<OccupantCategory> {
        self.defs.get(&id).map(|d| d.category)
    }

    /// Name of a defined occupant.
    #[must_use]
    pub fn name(&self, id: OccupantId) -> Option<&str> {
        self.defs.get(&id).map(|d| d.name.as_str())
    }
}
