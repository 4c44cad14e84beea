//! Spawn records read by the entity layer.

use serde::{Deserialize, Serialize};

use crate::room::RoomId;
use crate::tile::{OccupantId, TilePos};

/// What a dungeon spawn point instantiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    /// Interactive feature (altar, chest, fountain).
    Feature,
    /// Static danger (trap, pit).
    Hazard,
    /// Hostile creature.
    Enemy,
}

/// A dungeon spawn point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Category.
    pub kind: SpawnKind,
    /// Content tag resolved by the entity layer.
    pub tag: String,
    /// Floor position.
    pub pos: TilePos,
    /// Room the point belongs to.
    pub room: RoomId,
}

/// An overworld creature spawn candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreatureSpawn {
    /// Creature type.
    pub occupant: OccupantId,
    /// World position.
    pub pos: TilePos,
}
