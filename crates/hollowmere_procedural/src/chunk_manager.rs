//! # Chunk Manager
//!
//! The single owner of cached overworld state.
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded ──request──> Generating ──commit──> Loaded ──evict──> Unloaded
//!                                     (restore delta)   (persist delta)
//! ```
//!
//! Eviction persists and drops a chunk inside one call, so there is no
//! separate evicting state to observe.
//!
//! On every [`ChunkManager::ensure_active`] call:
//!
//! 1. Finished background results are committed (or discarded when they
//!    are no longer wanted).
//! 2. Every chunk within the active radius R1 is made resident: generated
//!    if absent, with any persisted delta re-applied on commit.
//! 3. Loaded chunks outside the retain radius R2 are evicted, least
//!    recently used first, persisting their deltas first. If the cache is
//!    still above `max_loaded`, chunks outside R1 are evicted LRU-first; if
//!    even that is not enough the overflow is logged and tolerated.
//!
//! A coordinate is generated at most once while pending, and a result for
//! a coordinate that is already loaded is dropped, never overwriting the
//! cached chunk.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use hollowmere_shared::{CreatureSpawn, Mutation, OccupantId, Rect, Tile, TilePos};
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkCoord, ChunkGenerator};
use crate::config::{ChunkConfig, WorldConfig};
use crate::delta::{DeltaKey, SharedDeltaStore};
use crate::error::{WorldError, WorldResult};
use crate::postprocess::Region;
use crate::spawn::select_creatures;
use crate::worker::GenerationWorkers;

/// How long to wait on workers before generating a needed chunk inline.
const WORKER_STALL: Duration = Duration::from_secs(5);

/// Observable state of one coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Not resident, not requested.
    Unloaded,
    /// Requested from a worker.
    Generating,
    /// Resident. A chunk stays `Loaded` until its delta is saved; eviction
    /// then drops it within the same call.
    Loaded,
}

/// Session counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Resident chunks.
    pub loaded: usize,
    /// Chunks requested from workers and not yet committed.
    pub pending: usize,
    /// Pristine chunks produced (inline or by workers).
    pub generated_this_session: u64,
    /// Chunks committed into the cache.
    pub committed: u64,
    /// Commits that re-applied a persisted delta.
    pub restored: u64,
    /// Chunks evicted.
    pub unloaded_this_session: u64,
    /// Results dropped as duplicates or no longer needed.
    pub discarded: u64,
    /// Updates that ended above `max_loaded`.
    pub overflow_events: u64,
    /// Evictions blocked by a failed delta save.
    pub persist_failures: u64,
}

struct Slot {
    chunk: Chunk,
    last_used: u64,
}

/// Streaming LRU cache of overworld chunks.
pub struct ChunkManager {
    config: ChunkConfig,
    exclusion_radius: f64,
    generator: Arc<ChunkGenerator>,
    workers: Option<GenerationWorkers>,
    store: SharedDeltaStore,
    loaded: HashMap<ChunkCoord, Slot>,
    pending: HashSet<ChunkCoord>,
    clock: u64,
    center: ChunkCoord,
    stats: WorldStats,
}

impl ChunkManager {
    /// Creates a manager. Starts `chunks.worker_threads` background workers
    /// when non-zero; if they cannot be started, generation runs inline.
    #[must_use]
    pub fn new(config: &WorldConfig, generator: Arc<ChunkGenerator>, store: SharedDeltaStore) -> Self {
        let workers = if config.chunks.worker_threads > 0 {
            match GenerationWorkers::spawn(Arc::clone(&generator), config.chunks.worker_threads) {
                Ok(workers) => Some(workers),
                Err(e) => {
                    warn!(error = %e, "failed to start generation workers; generating inline");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config: config.chunks.clone(),
            exclusion_radius: config.spawning.player_exclusion_radius,
            generator,
            workers,
            store,
            loaded: HashMap::new(),
            pending: HashSet::new(),
            clock: 0,
            center: ChunkCoord::default(),
            stats: WorldStats::default(),
        }
    }

    /// Streams the working set around a world tile position.
    ///
    /// Returns the number of chunks committed during this call.
    pub fn ensure_active(&mut self, center: TilePos) -> usize {
        let center = ChunkCoord::from_tile(center);
        self.center = center;
        self.clock += 1;
        let committed_before = self.stats.committed;

        self.drain_ready();

        let active = center.within(self.config.active_radius);
        for &coord in &active {
            if let Some(slot) = self.loaded.get_mut(&coord) {
                slot.last_used = self.clock;
            } else if !self.pending.contains(&coord) {
                self.request(coord);
            }
        }

        if self.workers.is_some() {
            for coord in center.within(self.config.prefetch_radius) {
                if !self.loaded.contains_key(&coord) && !self.pending.contains(&coord) {
                    self.request(coord);
                }
            }
            self.wait_for(&active);
        }

        self.evict_outside_retain();
        (self.stats.committed - committed_before) as usize
    }

    /// Generates inline or hands the coordinate to a worker.
    fn request(&mut self, coord: ChunkCoord) {
        if let Some(workers) = &self.workers {
            if workers.request(coord) {
                self.pending.insert(coord);
                return;
            }
        }
        let chunk = self.generator.generate(coord);
        self.stats.generated_this_session += 1;
        self.commit(chunk);
    }

    /// Commits whatever results are already finished.
    fn drain_ready(&mut self) {
        while let Some(chunk) = self.workers.as_ref().and_then(GenerationWorkers::try_recv) {
            self.receive(chunk);
        }
    }

    /// Blocks until every coordinate in `needed` is loaded.
    fn wait_for(&mut self, needed: &[ChunkCoord]) {
        while let Some(&missing) = needed.iter().find(|c| !self.loaded.contains_key(*c)) {
            let received = self
                .workers
                .as_ref()
                .and_then(|w| w.recv_timeout(WORKER_STALL));
            match received {
                Some(chunk) => self.receive(chunk),
                None => {
                    warn!(?missing, "generation workers stalled; generating inline");
                    self.pending.remove(&missing);
                    let chunk = self.generator.generate(missing);
                    self.stats.generated_this_session += 1;
                    self.commit(chunk);
                }
            }
        }
    }

    /// Handles a worker result: commit, or discard if unwanted.
    fn receive(&mut self, chunk: Chunk) {
        let coord = chunk.coord();
        self.pending.remove(&coord);
        self.stats.generated_this_session += 1;

        if self.loaded.contains_key(&coord) {
            self.stats.discarded += 1;
            debug!(?coord, "dropping duplicate generation result");
            return;
        }
        if coord.distance(self.center) > self.config.retain_radius {
            self.stats.discarded += 1;
            debug!(?coord, "dropping generation result outside retain radius");
            return;
        }
        self.commit(chunk);
    }

    /// Inserts a pristine chunk, re-applying any persisted delta.
    fn commit(&mut self, mut chunk: Chunk) {
        let coord = chunk.coord();
        match self.store.lock().load(&DeltaKey::Chunk(coord)) {
            Ok(Some(overlay)) => {
                debug!(?coord, entries = overlay.len(), "restoring chunk delta");
                chunk.set_overlay(overlay);
                self.stats.restored += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(?coord, error = %e, "failed to load chunk delta; using pristine chunk"),
        }
        self.loaded.insert(
            coord,
            Slot {
                chunk,
                last_used: self.clock,
            },
        );
        self.stats.committed += 1;
        debug!(?coord, loaded = self.loaded.len(), "chunk committed");
    }

    fn evict_outside_retain(&mut self) {
        let center = self.center;

        let mut outside: Vec<(u64, ChunkCoord)> = self
            .loaded
            .iter()
            .filter(|(c, _)| c.distance(center) > self.config.retain_radius)
            .map(|(c, s)| (s.last_used, *c))
            .collect();
        outside.sort_unstable();
        for (_, coord) in outside {
            self.evict(coord);
        }

        if self.loaded.len() > self.config.max_loaded {
            let mut inactive: Vec<(u64, ChunkCoord)> = self
                .loaded
                .iter()
                .filter(|(c, _)| c.distance(center) > self.config.active_radius)
                .map(|(c, s)| (s.last_used, *c))
                .collect();
            inactive.sort_unstable();
            for (_, coord) in inactive {
                if self.loaded.len() <= self.config.max_loaded {
                    break;
                }
                self.evict(coord);
            }
        }

        if self.loaded.len() > self.config.max_loaded {
            self.stats.overflow_events += 1;
            warn!(
                loaded = self.loaded.len(),
                target = self.config.max_loaded,
                "chunk cache over capacity; every loaded chunk is in use"
            );
        }
    }

    /// Persists (if dirty) and drops one chunk. A chunk whose delta cannot
    /// be saved stays loaded.
    fn evict(&mut self, coord: ChunkCoord) -> bool {
        let Some(slot) = self.loaded.get_mut(&coord) else {
            return false;
        };
        let overlay = slot.chunk.overlay_mut();
        if overlay.is_dirty() {
            if let Err(e) = self.store.lock().save(&DeltaKey::Chunk(coord), overlay) {
                warn!(?coord, error = %e, "failed to persist chunk delta; keeping chunk loaded");
                self.stats.persist_failures += 1;
                return false;
            }
            overlay.mark_clean();
        }
        self.loaded.remove(&coord);
        self.stats.unloaded_this_session += 1;
        debug!(?coord, "chunk evicted");
        true
    }

    /// Waits for every outstanding worker request and commits the results.
    ///
    /// Returns the number of chunks committed.
    pub fn flush_generation_queue(&mut self) -> usize {
        let before = self.stats.committed;
        self.drain_ready();
        let pending: Vec<ChunkCoord> = self.pending.iter().copied().collect();
        while !self.pending.is_empty() {
            let received = self
                .workers
                .as_ref()
                .and_then(|w| w.recv_timeout(WORKER_STALL));
            match received {
                Some(chunk) => self.receive(chunk),
                None => {
                    warn!(pending = self.pending.len(), "generation workers stalled during flush");
                    self.pending.clear();
                }
            }
        }
        debug!(requested = pending.len(), "generation queue flushed");
        (self.stats.committed - before) as usize
    }

    /// Saves every dirty delta without evicting anything.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure; chunks after it are still tried.
    pub fn persist_all(&mut self) -> WorldResult<usize> {
        let mut saved = 0;
        let mut first_error = None;
        let mut store = self.store.lock();
        for (coord, slot) in &mut self.loaded {
            let overlay = slot.chunk.overlay_mut();
            if !overlay.is_dirty() {
                continue;
            }
            match store.save(&DeltaKey::Chunk(*coord), overlay) {
                Ok(()) => {
                    overlay.mark_clean();
                    saved += 1;
                }
                Err(e) => {
                    warn!(?coord, error = %e, "failed to persist chunk delta");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(saved),
        }
    }

    fn loaded_chunk(&self, pos: TilePos) -> WorldResult<&Chunk> {
        let coord = ChunkCoord::from_tile(pos);
        self.loaded
            .get(&coord)
            .map(|slot| &slot.chunk)
            .ok_or(WorldError::ChunkNotLoaded(coord))
    }

    fn loaded_chunk_mut(&mut self, pos: TilePos) -> WorldResult<&mut Chunk> {
        let coord = ChunkCoord::from_tile(pos);
        let clock = self.clock;
        let slot = self
            .loaded
            .get_mut(&coord)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        slot.last_used = clock;
        Ok(&mut slot.chunk)
    }

    /// Effective tile (pristine + delta) at a world position.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`] if the chunk is not resident.
    pub fn get_tile(&self, pos: TilePos) -> WorldResult<Tile> {
        let chunk = self.loaded_chunk(pos)?;
        chunk
            .tile_at(pos)
            .ok_or(WorldError::ChunkNotLoaded(chunk.coord()))
    }

    /// Records that the resource or flora at `pos` was harvested.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`], or [`WorldError::NothingToDeplete`]
    /// if the tile has no occupant.
    pub fn deplete(&mut self, pos: TilePos) -> WorldResult<()> {
        let chunk = self.loaded_chunk_mut(pos)?;
        let occupied = chunk.tile_at(pos).is_some_and(|t| t.occupant.is_some());
        if !occupied {
            return Err(WorldError::NothingToDeplete(pos));
        }
        chunk.overlay_mut().push(pos, Mutation::ResourceDepleted);
        Ok(())
    }

    /// Records a structure built at `pos`.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`] if the chunk is not resident.
    pub fn place_structure(&mut self, pos: TilePos, structure: OccupantId) -> WorldResult<()> {
        self.loaded_chunk_mut(pos)?
            .overlay_mut()
            .push(pos, Mutation::StructurePlaced { structure });
        Ok(())
    }

    /// Records that the creature spawned at `pos` is gone.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`] if the chunk is not resident.
    pub fn remove_entity(&mut self, pos: TilePos) -> WorldResult<()> {
        self.loaded_chunk_mut(pos)?
            .overlay_mut()
            .push(pos, Mutation::EntityRemoved);
        Ok(())
    }

    /// Creature spawns of a loaded chunk with the player exclusion zone,
    /// removals and per-entry caps applied.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`] if the chunk is not resident.
    pub fn creature_spawns(&self, coord: ChunkCoord, player: TilePos) -> WorldResult<Vec<CreatureSpawn>> {
        let chunk = self
            .loaded
            .get(&coord)
            .map(|slot| &slot.chunk)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        let overlay = chunk.overlay();
        Ok(select_creatures(
            chunk.creature_candidates(),
            player,
            self.exclusion_radius,
            |pos| overlay.is_removed(pos),
        ))
    }

    /// Copies effective tiles of a `width x height` rectangle at `origin`
    /// into a dense region.
    ///
    /// # Errors
    ///
    /// [`WorldError::ChunkNotLoaded`] for the first uncovered chunk.
    pub fn snapshot_region(&self, origin: TilePos, width: i32, height: i32) -> WorldResult<Region> {
        let bounds = Rect::new(origin.x, origin.y, width.max(0), height.max(0));
        let mut tiles = Vec::with_capacity(bounds.area() as usize);
        for pos in bounds.positions() {
            tiles.push(self.get_tile(pos)?);
        }
        Ok(Region::from_tiles(bounds, tiles))
    }

    /// State of a coordinate.
    #[must_use]
    pub fn state(&self, coord: ChunkCoord) -> ChunkState {
        if self.loaded.contains_key(&coord) {
            ChunkState::Loaded
        } else if self.pending.contains(&coord) {
            ChunkState::Generating
        } else {
            ChunkState::Unloaded
        }
    }

    /// A resident chunk.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.loaded.get(&coord).map(|slot| &slot.chunk)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    /// Session counters.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            loaded: self.loaded.len(),
            pending: self.pending.len(),
            ..self.stats
        }
    }
}
