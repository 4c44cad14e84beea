//! Tile-level records.
//!
//! These are the canonical representations handed to rendering and gameplay.

use serde::{Deserialize, Serialize};

/// Integer tile coordinate in world (or floor) space.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TilePos {
    /// X coordinate (in tiles).
    pub x: i32,
    /// Y coordinate (in tiles).
    pub y: i32,
}

impl TilePos {
    /// Creates a new tile position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this position shifted by the given offset.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan (4-connected) distance.
    #[inline]
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Chebyshev (8-connected) distance.
    #[inline]
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// Squared euclidean distance (avoids sqrt).
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Terrain type identifier (index into the terrain registry).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TerrainId(pub u16);

/// Occupant identifier: a resource, flora, creature or structure type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OccupantId(pub u32);

/// A single semantic tile.
///
/// Tiles are values: no tile owns another, and copying one never aliases
/// world state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain type.
    pub terrain: TerrainId,
    /// Whether creatures can stand here.
    pub walkable: bool,
    /// Whether light and sight pass through.
    pub transparent: bool,
    /// Normalized elevation in `[0, 1]`.
    pub elevation: f32,
    /// Display glyph (presentation hint only).
    pub glyph: char,
    /// Display color (presentation hint only).
    pub color: [u8; 3],
    /// Resource, flora or structure standing on this tile.
    pub occupant: Option<OccupantId>,
}

impl Tile {
    /// Returns true if something stands on this tile.
    #[inline]
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}
