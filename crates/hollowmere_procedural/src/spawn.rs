//! # Spawn / Clustering Engine
//!
//! Places resources, flora and creatures from a biome's [`SpawnTable`].
//!
//! ## Placement
//!
//! For every entry whose elevation/moisture gates pass:
//!
//! ```text
//! density' = base_density * cluster_factor(field(x, y), clustering_factor)
//! accept   = roll(x, y) < density'
//! ```
//!
//! `field` is a cellular noise field dedicated to the (category, occupant)
//! pair, and `roll` is a position-seeded draw. No shared random stream is
//! consumed, so the outcome at one tile never depends on the order in which
//! other tiles were visited.
//!
//! Resources are tried before flora; the first accepted entry wins, so a
//! tile never holds more than one occupant. Creatures are sampled per chunk.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hollowmere_shared::{CreatureSpawn, OccupantId, TilePos};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{Band, OccupantRegistry, SpawningConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::noise::CellularNoise;
use crate::seed::{SeedTag, SubSeed, WorldSeed};

/// One row of a spawn table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnEntry {
    /// What spawns.
    pub occupant: OccupantId,
    /// Uniform placement probability per tile, in `[0, 1]`.
    pub base_density: f64,
    /// 0 = uniform, 1 = near-binary clusters.
    #[serde(default)]
    pub clustering_factor: f64,
    /// Elevation gate.
    #[serde(default)]
    pub elevation: Band,
    /// Moisture gate.
    #[serde(default)]
    pub moisture: Band,
    /// Per-chunk cap (creatures only).
    #[serde(default)]
    pub max_population: Option<u32>,
}

impl SpawnEntry {
    /// Elevation and moisture gates.
    #[inline]
    #[must_use]
    pub fn admits(&self, elevation: f64, moisture: f64) -> bool {
        self.elevation.contains(elevation) && self.moisture.contains(moisture)
    }

    pub(crate) fn validate(&self, record: &str) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.base_density) {
            return Err(ConfigError::invalid(record, "base_density must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.clustering_factor) {
            return Err(ConfigError::invalid(record, "clustering_factor must be within [0, 1]"));
        }
        for (field, band) in [("elevation", self.elevation), ("moisture", self.moisture)] {
            if band.min() > band.max() || band.min() < 0.0 || band.max() > 1.0 {
                return Err(ConfigError::invalid(
                    record,
                    format!("{field} gate must be an ordered band within [0, 1]"),
                ));
            }
        }
        Ok(())
    }
}

/// A biome's spawn entries, grouped by category in priority order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnTable {
    /// Table name referenced by biomes.
    pub name: String,
    /// Tried first.
    #[serde(default)]
    pub resources: Vec<SpawnEntry>,
    /// Tried after resources.
    #[serde(default)]
    pub flora: Vec<SpawnEntry>,
    /// Sampled per chunk.
    #[serde(default)]
    pub creatures: Vec<SpawnEntry>,
}

/// Spawn category. The code separates clustering fields and roll streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnCategory {
    /// Resources.
    Resource = 1,
    /// Flora.
    Flora = 2,
    /// Creatures.
    Creature = 3,
}

impl SpawnCategory {
    #[inline]
    const fn code(self) -> i64 {
        self as i64
    }
}

/// Per-tile data the creature sampler needs.
#[derive(Clone, Copy, Debug)]
pub struct SiteInfo {
    /// Normalized elevation.
    pub elevation: f64,
    /// Normalized moisture.
    pub moisture: f64,
    /// Index into the chunk's spawn table list.
    pub table: u16,
    /// Whether a creature could stand here.
    pub walkable: bool,
}

/// A creature spawn plus the cap of the entry that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CreatureCandidate {
    /// Creature and position.
    pub spawn: CreatureSpawn,
    /// `max_population` of the producing entry.
    pub max_population: u32,
}

/// Maps a clustering field sample through the clustering factor.
///
/// Exactly `1.0` for `clustering_factor == 0`. As the factor rises, the
/// response becomes a steep logistic around `pivot`, reaching a near-binary
/// `0` / `2` at factor 1.
#[must_use]
pub fn cluster_factor(field: f64, clustering_factor: f64, pivot: f64) -> f64 {
    if clustering_factor <= 0.0 {
        return 1.0;
    }
    let cf = clustering_factor.min(1.0);
    let steepness = 4.0 + 60.0 * cf;
    let logistic = 1.0 / (1.0 + (-(field - pivot) * steepness).exp());
    (1.0 - cf) + cf * 2.0 * logistic
}

/// The placement engine. Holds only seeds, config, and a warn-once set.
pub struct SpawnEngine {
    cluster_root: SubSeed,
    roll_root: SubSeed,
    creature_root: SubSeed,
    cell_size: f64,
    pivot: f64,
    samples_per_chunk: u32,
    occupants: Arc<OccupantRegistry>,
    warned: Mutex<HashSet<OccupantId>>,
    skipped: AtomicU64,
}

impl SpawnEngine {
    /// Creates an engine for a world seed.
    #[must_use]
    pub fn new(seed: WorldSeed, config: &SpawningConfig, occupants: Arc<OccupantRegistry>) -> Self {
        Self {
            cluster_root: seed.purpose(SeedTag::Cluster),
            roll_root: seed.purpose(SeedTag::SpawnRoll),
            creature_root: seed.purpose(SeedTag::Creature),
            cell_size: config.cluster_cell_size,
            pivot: config.cluster_pivot,
            samples_per_chunk: config.creature_samples_per_chunk,
            occupants,
            warned: Mutex::new(HashSet::new()),
            skipped: AtomicU64::new(0),
        }
    }

    /// The clustering field of one (category, occupant) pair.
    #[must_use]
    pub fn cluster_field(&self, category: SpawnCategory, occupant: OccupantId) -> CellularNoise {
        CellularNoise::new(
            self.cluster_root.derive(&[category.code(), i64::from(occupant.0)]),
            self.cell_size,
        )
    }

    /// `density'` of an entry at a position (gates not applied).
    #[must_use]
    pub fn effective_density(&self, category: SpawnCategory, entry: &SpawnEntry, pos: TilePos) -> f64 {
        let factor = if entry.clustering_factor <= 0.0 {
            1.0
        } else {
            let field = self
                .cluster_field(category, entry.occupant)
                .sample(f64::from(pos.x), f64::from(pos.y));
            cluster_factor(field, entry.clustering_factor, self.pivot)
        };
        (entry.base_density * factor).clamp(0.0, 1.0)
    }

    #[inline]
    fn roll(&self, category: SpawnCategory, occupant: OccupantId, pos: TilePos) -> f64 {
        self.roll_root
            .derive(&[
                category.code(),
                i64::from(occupant.0),
                i64::from(pos.x),
                i64::from(pos.y),
            ])
            .unit()
    }

    /// Tries one entry at a tile.
    fn accepts(&self, category: SpawnCategory, entry: &SpawnEntry, pos: TilePos, elevation: f64, moisture: f64) -> bool {
        if !self.is_known(entry.occupant) || !entry.admits(elevation, moisture) {
            return false;
        }
        self.roll(category, entry.occupant, pos) < self.effective_density(category, entry, pos)
    }

    /// Picks the occupant of one tile, if any.
    #[must_use]
    pub fn tile_occupant(&self, table: &SpawnTable, pos: TilePos, elevation: f64, moisture: f64) -> Option<OccupantId> {
        let ordered = [
            (SpawnCategory::Resource, &table.resources),
            (SpawnCategory::Flora, &table.flora),
        ];
        for (category, entries) in ordered {
            for entry in entries {
                if self.accepts(category, entry, pos, elevation, moisture) {
                    return Some(entry.occupant);
                }
            }
        }
        None
    }

    /// Samples creature candidates for one chunk.
    ///
    /// `sites` is the chunk's tiles in row-major order starting at `origin`,
    /// `tables` the spawn tables referenced by `SiteInfo::table`. Candidates
    /// are returned uncapped in sampling order; caps and the player
    /// exclusion zone are applied by the caller at query time.
    #[must_use]
    pub fn creature_candidates(
        &self,
        chunk: (i32, i32),
        origin: TilePos,
        size: i32,
        sites: &[SiteInfo],
        tables: &[Arc<SpawnTable>],
    ) -> Vec<CreatureCandidate> {
        let mut taken = HashSet::new();
        let mut out = Vec::new();

        for (table_index, table) in tables.iter().enumerate() {
            for entry in &table.creatures {
                if !self.is_known(entry.occupant) {
                    continue;
                }
                let mut rng = self
                    .creature_root
                    .derive(&[
                        i64::from(chunk.0),
                        i64::from(chunk.1),
                        table_index as i64,
                        i64::from(entry.occupant.0),
                    ])
                    .rng();

                for _ in 0..self.samples_per_chunk {
                    let lx = rng.gen_range(0..size);
                    let ly = rng.gen_range(0..size);
                    let Some(site) = sites.get((ly * size + lx) as usize) else {
                        continue;
                    };
                    if usize::from(site.table) != table_index || !site.walkable {
                        continue;
                    }
                    let pos = origin.offset(lx, ly);
                    if taken.contains(&pos) {
                        continue;
                    }
                    if self.accepts(SpawnCategory::Creature, entry, pos, site.elevation, site.moisture) {
                        taken.insert(pos);
                        out.push(CreatureCandidate {
                            spawn: CreatureSpawn {
                                occupant: entry.occupant,
                                pos,
                            },
                            max_population: entry.max_population.unwrap_or(u32::MAX),
                        });
                    }
                }
            }
        }
        out
    }

    fn is_known(&self, occupant: OccupantId) -> bool {
        if self.occupants.contains(occupant) {
            return true;
        }
        self.skipped.fetch_add(1, Ordering::Relaxed);
        if self.warned.lock().insert(occupant) {
            warn!(occupant = occupant.0, "spawn entry references unknown occupant; skipping");
        }
        false
    }

    /// Number of spawn evaluations skipped because of unknown occupants.
    #[must_use]
    pub fn missing_occupant_skips(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Applies the player exclusion zone and per-entry caps to candidates.
#[must_use]
pub fn select_creatures(
    candidates: &[CreatureCandidate],
    player: TilePos,
    exclusion_radius: f64,
    removed: impl Fn(TilePos) -> bool,
) -> Vec<CreatureSpawn> {
    let exclusion_sq = exclusion_radius * exclusion_radius;
    let mut counts: HashMap<OccupantId, u32> = HashMap::new();
    let mut out = Vec::new();
    for candidate in candidates {
        let spawn = candidate.spawn;
        if (spawn.pos.distance_squared(player) as f64) < exclusion_sq || removed(spawn.pos) {
            continue;
        }
        let count = counts.entry(spawn.occupant).or_insert(0);
        if *count >= candidate.max_population {
            continue;
        }
        *count += 1;
        out.push(spawn);
    }
    out
}
