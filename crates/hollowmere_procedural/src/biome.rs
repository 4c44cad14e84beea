//! # Biome Classification
//!
//! Maps world coordinates to biomes through two independent climate fields,
//! elevation and moisture, both normalized to `[0, 1]`.
//!
//! ## Two query modes
//!
//! - [`BiomeClassifier::classify`]: discrete. One biome per tile, chosen by
//!   the first threshold entry whose bands contain the sample. Drives tile
//!   types and spawn tables.
//! - [`BiomeClassifier::blend`]: continuous. A Gaussian-weighted mix of the
//!   classifications around a point. Only for smooth visual/density fields
//!   such as floor tints.
//!
//! Never use a blended result to pick a tile type, and never use a discrete
//! result to shade a gradient.
//!
//! Nothing here is cached or persisted: every query is a pure function of
//! the world seed and the coordinate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hollowmere_shared::TerrainId;
use tracing::{debug, warn};

use crate::config::{Band, BiomeTableConfig, TerrainRegistry};
use crate::noise::SimplexNoise;
use crate::seed::{SeedTag, WorldSeed};
use crate::spawn::SpawnTable;

/// Discrete classification of one position.
#[derive(Clone, Debug)]
pub struct BiomeRecord {
    /// Biome id from the threshold table.
    pub biome_id: Arc<str>,
    /// Index of the biome in the threshold table.
    pub index: usize,
    /// Normalized elevation.
    pub elevation: f64,
    /// Normalized moisture.
    pub moisture: f64,
    /// Floor terrain.
    pub floor_tile: TerrainId,
    /// Floor tint.
    pub tint: [u8; 3],
    /// Spawn table of the biome.
    pub spawn_table: Arc<SpawnTable>,
}

/// Continuous classification around one position.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedBiomeSet {
    /// `(biome_id, weight)`, heaviest first; weights sum to 1.
    pub weights: Vec<(Arc<str>, f64)>,
    /// Weighted floor tint.
    pub tint: [u8; 3],
    /// Weighted elevation.
    pub elevation: f64,
    /// Weighted moisture.
    pub moisture: f64,
}

impl WeightedBiomeSet {
    /// Heaviest biome.
    #[must_use]
    pub fn dominant(&self) -> Option<&str> {
        self.weights.first().map(|(id, _)| id.as_ref())
    }

    /// Weight of one biome (0 if absent).
    #[must_use]
    pub fn weight_of(&self, biome_id: &str) -> f64 {
        self.weights
            .iter()
            .find(|(id, _)| id.as_ref() == biome_id)
            .map_or(0.0, |(_, w)| *w)
    }
}

struct ResolvedBiome {
    id: Arc<str>,
    elevation: Band,
    moisture: Band,
    floor_tile: TerrainId,
    tint: [u8; 3],
    spawn_table: Arc<SpawnTable>,
}

/// Biome classifier bound to one world seed and one threshold table.
pub struct BiomeClassifier {
    elevation_noise: SimplexNoise,
    moisture_noise: SimplexNoise,
    biomes: Vec<ResolvedBiome>,
    default_index: usize,
    elevation_scale: f64,
    moisture_scale: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
    blend_radius: f64,
    blend_sigma: f64,
    gap_fallbacks: AtomicU64,
}

impl BiomeClassifier {
    /// Stretch applied around 0.5: octaved noise clusters near the middle.
    const CONTRAST: f64 = 1.8;

    /// Builds a classifier from a validated table.
    ///
    /// Biomes referencing an unknown terrain or spawn table (impossible after
    /// validation) get terrain 0 and an empty table.
    #[must_use]
    pub fn new(
        seed: WorldSeed,
        table: &BiomeTableConfig,
        terrain: &TerrainRegistry,
        spawn_tables: &[SpawnTable],
    ) -> Self {
        let biomes: Vec<ResolvedBiome> = table
            .entries
            .iter()
            .map(|entry| ResolvedBiome {
                id: Arc::from(entry.id.as_str()),
                elevation: entry.elevation,
                moisture: entry.moisture,
                floor_tile: terrain.lookup(&entry.floor_tile).unwrap_or_default(),
                tint: entry.tint,
                spawn_table: Arc::new(
                    spawn_tables
                        .iter()
                        .find(|t| t.name == entry.spawn_table)
                        .cloned()
                        .unwrap_or_default(),
                ),
            })
            .collect();
        let default_index = table
            .entries
            .iter()
            .position(|e| e.id == table.default)
            .unwrap_or(0);

        Self {
            elevation_noise: SimplexNoise::new(seed.purpose(SeedTag::Elevation)),
            moisture_noise: SimplexNoise::new(seed.purpose(SeedTag::Moisture)),
            biomes,
            default_index,
            elevation_scale: table.elevation_scale,
            moisture_scale: table.moisture_scale,
            octaves: table.octaves,
            persistence: table.persistence,
            lacunarity: table.lacunarity,
            blend_radius: table.blend_radius,
            blend_sigma: table.blend_sigma,
            gap_fallbacks: AtomicU64::new(0),
        }
    }

    #[inline]
    fn stretch(value: f64) -> f64 {
        ((value - 0.5) * Self::CONTRAST + 0.5).clamp(0.0, 1.0)
    }

    /// Normalized elevation at world coordinates.
    #[must_use]
    pub fn elevation(&self, x: f64, y: f64) -> f64 {
        let s = self.elevation_scale;
        Self::stretch(self.elevation_noise.normalized(
            x * s,
            y * s,
            self.octaves,
            self.persistence,
            self.lacunarity,
        ))
    }

    /// Normalized moisture at world coordinates.
    #[must_use]
    pub fn moisture(&self, x: f64, y: f64) -> f64 {
        let s = self.moisture_scale;
        Self::stretch(self.moisture_noise.normalized(
            x * s,
            y * s,
            self.octaves,
            self.persistence,
            self.lacunarity,
        ))
    }

    /// Discrete query: the one biome at a position.
    #[must_use]
    pub fn classify(&self, x: f64, y: f64) -> BiomeRecord {
        self.classify_climate(self.elevation(x, y), self.moisture(x, y))
    }

    /// Evaluates the threshold table for a climate sample.
    ///
    /// First matching entry wins. A gap falls back to the default biome and
    /// is logged as a configuration warning.
    #[must_use]
    pub fn classify_climate(&self, elevation: f64, moisture: f64) -> BiomeRecord {
        let index = self.table_index(elevation, moisture);
        self.record(index, elevation, moisture)
    }

    fn table_index(&self, elevation: f64, moisture: f64) -> usize {
        if let Some(index) = self
            .biomes
            .iter()
            .position(|b| b.elevation.contains(elevation) && b.moisture.contains(moisture))
        {
            return index;
        }
        let previous = self.gap_fallbacks.fetch_add(1, Ordering::Relaxed);
        if previous == 0 {
            warn!(
                elevation,
                moisture,
                fallback = %self.biomes[self.default_index].id,
                "biome table has no entry for climate sample; using default biome"
            );
        } else {
            debug!(elevation, moisture, "biome table gap");
        }
        self.default_index
    }

    fn record(&self, index: usize, elevation: f64, moisture: f64) -> BiomeRecord {
        let biome = &self.biomes[index];
        BiomeRecord {
            biome_id: Arc::clone(&biome.id),
            index,
            elevation,
            moisture,
            floor_tile: biome.floor_tile,
            tint: biome.tint,
            spawn_table: Arc::clone(&biome.spawn_table),
        }
    }

    /// Continuous query: Gaussian-weighted classification of the position
    /// and a ring of eight samples at `blend_radius`.
    #[must_use]
    pub fn blend(&self, x: f64, y: f64) -> WeightedBiomeSet {
        let mut per_biome = vec![0.0_f64; self.biomes.len()];
        let mut tint = [0.0_f64; 3];
        let mut elevation = 0.0;
        let mut moisture = 0.0;
        let mut total = 0.0;

        let ring_weight = (-(self.blend_radius * self.blend_radius)
            / (2.0 * self.blend_sigma * self.blend_sigma))
            .exp();

        for k in 0..9 {
            let (sx, sy, weight) = if k == 0 {
                (x, y, 1.0)
            } else {
                let angle = f64::from(k - 1) * std::f64::consts::FRAC_PI_4;
                (
                    x + self.blend_radius * angle.cos(),
                    y + self.blend_radius * angle.sin(),
                    ring_weight,
                )
            };
            let e = self.elevation(sx, sy);
            let m = self.moisture(sx, sy);
            let index = self.table_index(e, m);

            per_biome[index] += weight;
            for (channel, value) in tint.iter_mut().zip(self.biomes[index].tint) {
                *channel += weight * f64::from(value);
            }
            elevation += weight * e;
            moisture += weight * m;
            total += weight;
        }

        let mut weights: Vec<(Arc<str>, f64)> = per_biome
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, w)| (Arc::clone(&self.biomes[i].id), w / total))
            .collect();
        // Heaviest first; table order breaks ties
        weights.sort_by(|a, b| b.1.total_cmp(&a.1));

        WeightedBiomeSet {
            weights,
            tint: tint.map(|c| (c / total).round().clamp(0.0, 255.0) as u8),
            elevation: elevation / total,
            moisture: moisture / total,
        }
    }

    /// Number of biomes in the table.
    #[must_use]
    pub fn biome_count(&self) -> usize {
        self.biomes.len()
    }

    /// Id of the biome used on table gaps.
    #[must_use]
    pub fn default_biome(&self) -> &str {
        &self.biomes[self.default_index].id
    }

    /// How many samples fell into a table gap.
    #[must_use]
    pub fn gap_fallbacks(&self) -> u64 {
        self.gap_fallbacks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::config::WorldConfig;

    fn classifier(seed: u64, config: &WorldConfig) -> BiomeClassifier {
        let terrain = TerrainRegistry::new(&config.terrain);
        BiomeClassifier::new(WorldSeed::new(seed), &config.biomes, &terrain, &config.spawn_tables)
    }

    #[test]
    fn test_biome_determinism() {
        let config = WorldConfig::standard();
        let classifier1 = classifier(42, &config);
        let classifier2 = classifier(42, &config);

        for i in 0..100 {
            let x = f64::from(i) * 100.0;
            let y = f64::from(i) * 73.0;
            let a = classifier1.classify(x, y);
            let b = classifier2.classify(x, y);
            assert_eq!(a.biome_id, b.biome_id, "Biome classification should be deterministic");
            assert_eq!(a.elevation, b.elevation);
        }
    }

    #[test]
    fn test_wetland_threshold() {
        let config = WorldConfig::standard();
        let classifier = classifier(42, &config);
        let record = classifier.classify_climate(0.3, 0.8);
        assert_eq!(&*record.biome_id, "wetland");
        assert_eq!(record.spawn_table.name, "wetland");
        assert_eq!(classifier.gap_fallbacks(), 0);
    }

    #[test]
    fn test_first_match_wins() {
        let mut config = WorldConfig::standard();
        // plains and a later overlapping entry: plains must still win
        let mut overlap = config.biomes.entries[3].clone();
        overlap.id = "meadow".to_string();
        config.biomes.entries.push(overlap);
        let classifier = classifier(1, &config);
        assert_eq!(&*classifier.classify_climate(0.5, 0.5).biome_id, "plains");
    }

    #[test]
    fn test_gap_falls_back_to_default() {
        let mut config = WorldConfig::standard();
        config.biomes.entries.retain(|b| b.id != "mountain");
        let classifier = classifier(1, &config);
        let record = classifier.classify_climate(0.95, 0.5);
        assert_eq!(&*record.biome_id, "plains");
        assert_eq!(classifier.gap_fallbacks(), 1);
    }

    #[test]
    fn test_climate_ranges() {
        let config = WorldConfig::standard();
        let classifier = classifier(42, &config);
        for i in 0..1000 {
            let x = (f64::from(i) - 500.0) * 10.0;
            let y = (f64::from(i) * 0.7 - 350.0) * 10.0;
            let e = classifier.elevation(x, y);
            let m = classifier.moisture(x, y);
            assert!((0.0..=1.0).contains(&e), "Elevation {e} out of range");
            assert!((0.0..=1.0).contains(&m), "Moisture {m} out of range");
        }
    }

    #[test]
    fn test_many_biomes_reachable() {
        let config = WorldConfig::standard();
        let classifier = classifier(12345, &config);
        let mut found = HashSet::new();
        for x in (-3000..3000).step_by(60) {
            for y in (-3000..3000).step_by(60) {
                found.insert(classifier.classify(f64::from(x), f64::from(y)).biome_id);
            }
        }
        assert!(found.len() >= 4, "Should find multiple biomes, found: {found:?}");
    }

    #[test]
    fn test_blend_weights_sum_to_one() {
        let config = WorldConfig::standard();
        let classifier = classifier(7, &config);
        for i in 0..200 {
            let x = f64::from(i) * 37.0;
            let y = f64::from(i) * -11.0;
            let set = classifier.blend(x, y);
            let sum: f64 = set.weights.iter().map(|(_, w)| w).sum();
            assert!((sum - 1.0).abs() < 1e-9, "weights sum to {sum}");
            for pair in set.weights.windows(2) {
                assert!(pair[0].1 >= pair[1].1, "weights sorted heaviest first");
            }
            assert!(set.dominant().is_some());
        }
    }

    #[test]
    fn test_blend_is_uniform_inside_one_biome() {
        let mut config = WorldConfig::standard();
        let mut only = config.biomes.entries[3].clone();
        only.elevation = Band::FULL;
        only.moisture = Band::FULL;
        config.biomes.entries = vec![only];
        let classifier = classifier(7, &config);
        let set = classifier.blend(10.0, 10.0);
        assert_eq!(set.weights.len(), 1);
        assert_eq!(set.dominant(), Some("plains"));
        assert_eq!(set.tint, config.biomes.entries[0].tint);
        assert!((set.weight_of("plains") - 1.0).abs() < 1e-12);
    }
}
