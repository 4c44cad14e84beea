//! # Generation Context
//!
//! The one object gameplay holds. Owns the seed, the validated config and
//! every generation component, and exposes the collaborator-facing API:
//! climate queries, chunk streaming and mutation, dungeon floors, and the
//! river/road post-processor.

use std::sync::Arc;

use hollowmere_shared::{CreatureSpawn, OccupantId, Tile, TilePos};
use tracing::info;

use crate::biome::{BiomeClassifier, BiomeRecord, WeightedBiomeSet};
use crate::chunk::{ChunkCoord, ChunkGenerator};
use crate::chunk_manager::{ChunkManager, WorldStats};
use crate::config::{OccupantRegistry, TerrainRegistry, WorldConfig};
use crate::delta::SharedDeltaStore;
use crate::dungeon::{DungeonFloor, DungeonGenerator, FloorCache, FloorId};
use crate::error::{ConfigResult, WorldResult};
use crate::postprocess::{self, Region, RiverPath, RoadPath, TileGrid};
use crate::seed::{DungeonId, SeedTag, WorldSeed};
use crate::spawn::SpawnEngine;

/// Everything needed to generate, stream and mutate one world.
pub struct GenerationContext {
    seed: WorldSeed,
    config: WorldConfig,
    terrain: Arc<TerrainRegistry>,
    occupants: Arc<OccupantRegistry>,
    classifier: Arc<BiomeClassifier>,
    chunks: ChunkManager,
    dungeons: Arc<DungeonGenerator>,
    floors: FloorCache,
    store: SharedDeltaStore,
}

impl GenerationContext {
    /// Validates `config` and builds every component from `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if the config is
    /// malformed. Nothing else here can fail.
    pub fn new(seed: WorldSeed, config: WorldConfig, store: SharedDeltaStore) -> ConfigResult<Self> {
        config.validate()?;

        let terrain = Arc::new(TerrainRegistry::new(&config.terrain));
        let occupants = Arc::new(OccupantRegistry::new(&config.occupants));
        let classifier = Arc::new(BiomeClassifier::new(
            seed,
            &config.biomes,
            &terrain,
            &config.spawn_tables,
        ));
        let spawns = Arc::new(SpawnEngine::new(seed, &config.spawning, Arc::clone(&occupants)));
        let generator = Arc::new(ChunkGenerator::from_parts(
            Arc::clone(&classifier),
            spawns,
            Arc::clone(&terrain),
        ));
        let chunks = ChunkManager::new(&config, generator, Arc::clone(&store));
        let dungeons = Arc::new(DungeonGenerator::new(seed, &config.dungeon, &terrain));
        let floors = FloorCache::new(Arc::clone(&dungeons), Arc::clone(&store));

        info!(
            seed = seed.value(),
            biomes = classifier.biome_count(),
            workers = config.chunks.worker_threads,
            "generation context ready"
        );

        Ok(Self {
            seed,
            config,
            terrain,
            occupants,
            classifier,
            chunks,
            dungeons,
            floors,
            store,
        })
    }

    /// World seed.
    #[must_use]
    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// The validated config.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Terrain registry.
    #[must_use]
    pub fn terrain(&self) -> &TerrainRegistry {
        &self.terrain
    }

    /// Occupant registry.
    #[must_use]
    pub fn occupants(&self) -> &OccupantRegistry {
        &self.occupants
    }

    /// Shared delta store.
    #[must_use]
    pub fn store(&self) -> &SharedDeltaStore {
        &self.store
    }

    // Climate

    /// Biome at world coordinates.
    #[must_use]
    pub fn classify(&self, x: f64, y: f64) -> BiomeRecord {
        self.classifier.classify(x, y)
    }

    /// Weighted biome mix around world coordinates.
    #[must_use]
    pub fn blend(&self, x: f64, y: f64) -> WeightedBiomeSet {
        self.classifier.blend(x, y)
    }

    // Overworld streaming

    /// Streams chunks around `center`. Returns the number committed.
    pub fn ensure_active(&mut self, center: TilePos) -> usize {
        self.chunks.ensure_active(center)
    }

    /// Waits for every outstanding background generation.
    pub fn flush_generation_queue(&mut self) -> usize {
        self.chunks.flush_generation_queue()
    }

    /// Effective overworld tile.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`](crate::error::WorldError::ChunkNotLoaded)
    /// if the chunk is not resident.
    pub fn get_tile(&self, pos: TilePos) -> WorldResult<Tile> {
        self.chunks.get_tile(pos)
    }

    /// Marks an overworld occupant as used up.
    ///
    /// # Errors
    ///
    /// See [`ChunkManager::deplete`].
    pub fn deplete(&mut self, pos: TilePos) -> WorldResult<()> {
        self.chunks.deplete(pos)
    }

    /// Records a player structure on the overworld.
    ///
    /// # Errors
    ///
    /// See [`ChunkManager::place_structure`].
    pub fn place_structure(&mut self, pos: TilePos, structure: OccupantId) -> WorldResult<()> {
        self.chunks.place_structure(pos, structure)
    }

    /// Records that the overworld entity spawned at `pos` is gone.
    ///
    /// # Errors
    ///
    /// See [`ChunkManager::remove_entity`].
    pub fn remove_entity(&mut self, pos: TilePos) -> WorldResult<()> {
        self.chunks.remove_entity(pos)
    }

    /// Creature spawns of a loaded chunk, given the player position.
    ///
    /// # Errors
    ///
    /// See [`ChunkManager::creature_spawns`].
    pub fn creature_spawns(&self, coord: ChunkCoord, player: TilePos) -> WorldResult<Vec<CreatureSpawn>> {
        self.chunks.creature_spawns(coord, player)
    }

    /// Dense copy of loaded overworld tiles, for post-processing.
    ///
    /// # Errors
    ///
    /// See [`ChunkManager::snapshot_region`].
    pub fn snapshot_region(&self, origin: TilePos, width: i32, height: i32) -> WorldResult<Region> {
        self.chunks.snapshot_region(origin, width, height)
    }

    /// Persists every dirty chunk delta.
    ///
    /// # Errors
    ///
    /// The first persistence failure.
    pub fn persist_all(&mut self) -> WorldResult<usize> {
        self.chunks.persist_all()
    }

    /// Streaming statistics.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        self.chunks.stats()
    }

    /// The chunk manager, for state queries.
    #[must_use]
    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    // Dungeons

    /// Generates a pristine floor. Pure; does not touch the floor cache.
    #[must_use]
    pub fn generate_floor(&self, dungeon: DungeonId, floor: u32) -> DungeonFloor {
        self.dungeons.generate_floor(dungeon, floor)
    }

    /// Moves the player onto a floor.
    ///
    /// # Errors
    ///
    /// See [`FloorCache::enter_floor`].
    pub fn enter_floor(&mut self, id: FloorId) -> WorldResult<&DungeonFloor> {
        self.floors.enter_floor(id)
    }

    /// Moves the player off the current floor.
    ///
    /// # Errors
    ///
    /// See [`FloorCache::leave_floor`].
    pub fn leave_floor(&mut self) -> WorldResult<()> {
        self.floors.leave_floor()
    }

    /// The floor cache, for floor mutations.
    pub fn floors(&mut self) -> &mut FloorCache {
        &mut self.floors
    }

    // Post-processing

    /// Traces and carves rivers with the configured `[rivers]` settings.
    ///
    /// `context` distinguishes grids so that two regions do not pick the
    /// same source order (use the region origin, or the floor identity).
    pub fn carve_rivers<G: TileGrid + ?Sized>(&self, grid: &mut G, context: &[i64]) -> Vec<RiverPath> {
        let seed = self.seed.purpose(SeedTag::River).derive(context);
        postprocess::carve_rivers(grid, &self.config.rivers, &self.terrain, seed)
    }

    /// Finds and carves a road with the configured `[roads]` settings.
    pub fn carve_road<G: TileGrid + ?Sized>(
        &self,
        grid: &mut G,
        from: TilePos,
        to: TilePos,
    ) -> Option<RoadPath> {
        postprocess::carve_road(grid, from, to, &self.config.roads, &self.terrain)
    }
}
