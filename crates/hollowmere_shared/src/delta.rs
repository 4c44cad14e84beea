//! Mutation records written back by gameplay.
//!
//! A mutation never rewrites a pristine tile. It is appended to the delta
//! overlay of its chunk (or floor) and re-applied every time that chunk is
//! regenerated.

use serde::{Deserialize, Serialize};

use crate::tile::{OccupantId, TilePos};

/// A single player-caused change to generated content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// The resource or flora at this tile was harvested.
    ResourceDepleted,
    /// A structure now stands on this tile.
    StructurePlaced {
        /// Occupant id of the structure.
        structure: OccupantId,
    },
    /// The creature spawned at this tile is dead or otherwise gone.
    EntityRemoved,
}

impl Mutation {
    /// Wire code for `ResourceDepleted`.
    pub const KIND_DEPLETED: u8 = 1;
    /// Wire code for `StructurePlaced`.
    pub const KIND_STRUCTURE: u8 = 2;
    /// Wire code for `EntityRemoved`.
    pub const KIND_REMOVED: u8 = 3;

    /// Stable wire code of this mutation kind.
    #[inline]
    #[must_use]
    pub const fn kind_code(&self) -> u8 {
        match self {
            Self::ResourceDepleted => Self::KIND_DEPLETED,
            Self::StructurePlaced { .. } => Self::KIND_STRUCTURE,
            Self::EntityRemoved => Self::KIND_REMOVED,
        }
    }

    /// Payload word (zero for kinds without a payload).
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> u32 {
        match self {
            Self::StructurePlaced { structure } => structure.0,
            Self::ResourceDepleted | Self::EntityRemoved => 0,
        }
    }

    /// Rebuilds a mutation from its wire parts. Returns `None` for an
    /// unknown kind code.
    #[must_use]
    pub const fn from_parts(kind: u8, payload: u32) -> Option<Self> {
        match kind {
            Self::KIND_DEPLETED => Some(Self::ResourceDepleted),
            Self::KIND_STRUCTURE => Some(Self::StructurePlaced {
                structure: OccupantId(payload),
            }),
            Self::KIND_REMOVED => Some(Self::EntityRemoved),
            _ => None,
        }
    }
}

/// One `(position, mutation)` entry of a persisted overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeltaEntry {
    /// Where the mutation happened.
    pub pos: TilePos,
    /// What happened.
    pub mutation: Mutation,
}
