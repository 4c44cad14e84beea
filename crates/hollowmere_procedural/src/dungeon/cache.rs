//! Per-session floor cache.
//!
//! A floor's geometry is generated once per identity and kept for the
//! session. Player changes live in the floor's delta overlay, which is
//! persisted when the player leaves and re-applied when they come back.

use std::collections::HashMap;
use std::sync::Arc;

use hollowmere_shared::{Mutation, OccupantId, SpawnKind, TilePos};
use tracing::{debug, warn};

use super::{DungeonFloor, DungeonGenerator, FloorId};
use crate::delta::{DeltaKey, SharedDeltaStore};
use crate::error::{WorldError, WorldResult};

/// Generated floors plus the one the player is on.
pub struct FloorCache {
    generator: Arc<DungeonGenerator>,
    store: SharedDeltaStore,
    floors: HashMap<FloorId, DungeonFloor>,
    current: Option<FloorId>,
}

impl FloorCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(generator: Arc<DungeonGenerator>, store: SharedDeltaStore) -> Self {
        Self {
            generator,
            store,
            floors: HashMap::new(),
            current: None,
        }
    }

    /// Makes `id` the current floor, generating it on first visit and
    /// restoring its persisted delta.
    ///
    /// Leaving the previous floor persists its delta first.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Persistence`] if the previous floor's delta
    /// cannot be saved. The previous floor then stays current.
    pub fn enter_floor(&mut self, id: FloorId) -> WorldResult<&DungeonFloor> {
        if self.current.is_some_and(|current| current != id) {
            self.leave_floor()?;
        }

        let generator = &self.generator;
        let floor = self
            .floors
            .entry(id)
            .or_insert_with(|| generator.generate_floor(id.dungeon, id.floor));

        // A dirty overlay is newer than anything in the store
        if !floor.overlay().is_dirty() {
            match self.store.lock().load(&DeltaKey::Floor(id)) {
                Ok(Some(overlay)) => {
                    debug!(?id, entries = overlay.len(), "restoring floor delta");
                    floor.set_overlay(overlay);
                }
                Ok(None) => {}
                Err(e) => warn!(?id, error = %e, "failed to load floor delta; keeping cached state"),
            }
        }

        self.current = Some(id);
        Ok(floor)
    }

    /// Persists the current floor's delta and clears the current floor.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Persistence`] if the delta cannot be saved; the
    /// floor stays current.
    pub fn leave_floor(&mut self) -> WorldResult<()> {
        let Some(id) = self.current else {
            return Ok(());
        };
        if let Some(floor) = self.floors.get_mut(&id) {
            let overlay = floor.overlay_mut();
            if overlay.is_dirty() {
                self.store.lock().save(&DeltaKey::Floor(id), overlay)?;
                overlay.mark_clean();
            }
        }
        self.current = None;
        Ok(())
    }

    /// The floor the player is on.
    #[must_use]
    pub fn current(&self) -> Option<&DungeonFloor> {
        self.current.and_then(|id| self.floors.get(&id))
    }

    /// A cached floor.
    #[must_use]
    pub fn floor(&self, id: FloorId) -> Option<&DungeonFloor> {
        self.floors.get(&id)
    }

    /// Number of floors generated this session.
    #[must_use]
    pub fn cached_floors(&self) -> usize {
        self.floors.len()
    }

    fn current_mut(&mut self, pos: TilePos) -> WorldResult<&mut DungeonFloor> {
        let id = self.current.ok_or(WorldError::FloorNotLoaded)?;
        let floor = self.floors.get_mut(&id).ok_or(WorldError::FloorNotLoaded)?;
        if floor.tiles.contains_key(&pos) {
            Ok(floor)
        } else {
            Err(WorldError::OutOfFloor(pos))
        }
    }

    /// Marks the feature or occupant at `pos` on the current floor as used up.
    ///
    /// # Errors
    ///
    /// [`WorldError::FloorNotLoaded`], [`WorldError::OutOfFloor`], or
    /// [`WorldError::NothingToDeplete`] if nothing there can be depleted.
    pub fn deplete(&mut self, pos: TilePos) -> WorldResult<()> {
        let floor = self.current_mut(pos)?;
        let has_feature = floor
            .active_spawn_points()
            .any(|s| s.pos == pos && s.kind == SpawnKind::Feature);
        let has_occupant = floor.tile(pos).is_some_and(|t| t.occupant.is_some());
        if !has_feature && !has_occupant {
            return Err(WorldError::NothingToDeplete(pos));
        }
        floor.overlay_mut().push(pos, Mutation::ResourceDepleted);
        Ok(())
    }

    /// Records a structure built on the current floor.
    ///
    /// # Errors
    ///
    /// [`WorldError::FloorNotLoaded`] or [`WorldError::OutOfFloor`].
    pub fn place_structure(&mut self, pos: TilePos, structure: OccupantId) -> WorldResult<()> {
        self.current_mut(pos)?
            .overlay_mut()
            .push(pos, Mutation::StructurePlaced { structure });
        Ok(())
    }

    /// Records that the entity spawned at `pos` on the current floor is gone.
    ///
    /// # Errors
    ///
    /// [`WorldError::FloorNotLoaded`] or [`WorldError::OutOfFloor`].
    pub fn remove_entity(&mut self, pos: TilePos) -> WorldResult<()> {
        self.current_mut(pos)?
            .overlay_mut()
            .push(pos, Mutation::EntityRemoved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TerrainRegistry, WorldConfig};
    use crate::delta::{shared, MemoryDeltaStore};
    use crate::seed::{DungeonId, WorldSeed};

    fn generator() -> DungeonGenerator {
        let world = WorldConfig::standard();
        DungeonGenerator::new(WorldSeed::new(42), &world.dungeon, &TerrainRegistry::new(&world.terrain))
    }

    fn cache() -> FloorCache {
        FloorCache::new(Arc::new(generator()), shared(MemoryDeltaStore::new()))
    }

    /// First burial_barrow floor holding a spawn point of `kind`.
    fn floor_with(kind: SpawnKind) -> (FloorId, TilePos) {
        let generator = generator();
        (1..=20)
            .map(|n| FloorId::new(DungeonId::from_name("burial_barrow"), n))
            .find_map(|id| {
                let floor = generator.generate_floor(id.dungeon, id.floor);
                let pos = floor.spawns_of(kind).next().map(|s| s.pos);
                pos.map(|pos| (id, pos))
            })
            .expect("some floor in 1..=20 has a spawn point of this kind")
    }

    #[test]
    fn test_mutations_need_current_floor() {
        let mut cache = cache();
        assert!(matches!(cache.remove_entity(TilePos::new(1, 1)), Err(WorldError::FloorNotLoaded)));

        let id = FloorId::new(DungeonId::from_name("burial_barrow"), 1);
        cache.enter_floor(id).expect("enter");
        assert!(matches!(
            cache.remove_entity(TilePos::new(-5, -5)),
            Err(WorldError::OutOfFloor(_))
        ));
    }

    #[test]
    fn test_floor_state_survives_leaving() {
        let (id, enemy) = floor_with(SpawnKind::Enemy);
        let mut cache = cache();
        let floor = cache.enter_floor(id).expect("enter");
        let geometry = floor.to_bytes();
        let stairs = floor.exit().bounds.center();
        assert!(floor.active_spawn_points().any(|s| s.pos == enemy));

        cache.place_structure(stairs, OccupantId(401)).expect("place");
        cache.remove_entity(enemy).expect("remove");
        cache.leave_floor().expect("leave");
        assert!(cache.current().is_none());

        // Visiting another floor does not disturb the first one
        let other = FloorId::new(id.dungeon, id.floor + 1);
        cache.enter_floor(other).expect("enter other");

        let floor = cache.enter_floor(id).expect("re-enter");
        assert_eq!(floor.to_bytes(), geometry, "geometry is not regenerated");
        assert_eq!(floor.tile(stairs).and_then(|t| t.occupant), Some(OccupantId(401)));
        assert!(floor.active_spawn_points().all(|s| s.pos != enemy));
        assert_eq!(cache.cached_floors(), 2);
    }

    #[test]
    fn test_deplete_requires_feature() {
        let (id, feature) = floor_with(SpawnKind::Feature);
        let mut cache = cache();
        let floor = cache.enter_floor(id).expect("enter");
        let empty = floor.entrance().bounds.center();

        assert!(matches!(cache.deplete(empty), Err(WorldError::NothingToDeplete(_))));
        cache.deplete(feature).expect("deplete feature");
        assert!(matches!(cache.deplete(feature), Err(WorldError::NothingToDeplete(_))));
    }
}
