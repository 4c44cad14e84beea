//! # Hollowmere Shared
//!
//! Plain data records produced by world generation and consumed by the
//! gameplay and presentation layers.
//!
//! ## CRITICAL RULE
//!
//! Records here are values. Nothing in this crate generates, caches or
//! mutates world state; live objects are built from these records elsewhere.

#![deny(unsafe_code)]

pub mod delta;
pub mod rect;
pub mod room;
pub mod spawn;
pub mod tile;

pub use delta::{DeltaEntry, Mutation};
pub use rect::Rect;
pub use room::{Room, RoomId};
pub use spawn::{CreatureSpawn, SpawnKind, SpawnPoint};
pub use tile::{OccupantId, TerrainId, Tile, TilePos};
