//! Dungeon room records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::rect::Rect;

/// Room identifier, unique within one floor.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u16);

/// A carved room and its place in the floor's connectivity graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id.
    pub id: RoomId,
    /// Floor area of the room (walls excluded).
    pub bounds: Rect,
    /// Rooms reachable through a direct corridor.
    pub connections: BTreeSet<RoomId>,
    /// Content tag (e.g. `"crypt"`, `"armory"`).
    pub type_tag: String,
    /// Stairs up are in this room.
    pub is_entrance: bool,
    /// Stairs down are in this room.
    pub is_exit: bool,
}

impl Room {
    /// Creates an unconnected, untagged room.
    #[must_use]
    pub fn new(id: RoomId, bounds: Rect) -> Self {
        Self {
            id,
            bounds,
            connections: BTreeSet::new(),
            type_tag: String::new(),
            is_entrance: false,
            is_exit: false,
        }
    }
}
