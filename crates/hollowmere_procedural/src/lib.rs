//! # Hollowmere Procedural Generation
//!
//! Deterministic world generation and streaming for an infinite tile world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: same seed and same identity give the same content
//! 2. **Chunked**: the overworld is generated in fixed 32x32 chunks
//! 3. **Streamable**: chunks load and unload independently; only player
//!    changes (delta overlays) are ever persisted
//! 4. **Guaranteed**: every dungeon floor is fully connected
//!
//! ## Core Components
//!
//! - [`WorldSeed`]: one root seed, independent sub-seeds per step
//! - [`BiomeClassifier`]: elevation/moisture threshold table with blending
//! - [`SpawnEngine`]: density x clustering placement of occupants
//! - [`ChunkManager`]: LRU streaming with persisted [`DeltaOverlay`]s
//! - [`DungeonGenerator`]: rectangular and BSP floors, linear fallback
//! - [`postprocess`]: river tracing and A* roads
//! - [`GenerationContext`]: all of the above behind one API
//!
//! ## Example
//!
//! ```rust,no_run
//! use hollowmere_procedural::{shared, GenerationContext, MemoryDeltaStore, WorldConfig, WorldSeed};
//! use hollowmere_shared::TilePos;
//!
//! let store = shared(MemoryDeltaStore::new());
//! let mut ctx = GenerationContext::new(WorldSeed::new(12345), WorldConfig::standard(), store)?;
//!
//! // Player at tile (100, 200)
//! ctx.ensure_active(TilePos::new(100, 200));
//! let tile = ctx.get_tile(TilePos::new(100, 200))?;
//! println!("standing on {}", tile.glyph);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod biome;
pub mod chunk;
pub mod chunk_manager;
pub mod config;
pub mod context;
pub mod delta;
pub mod dungeon;
pub mod error;
pub mod noise;
pub mod postprocess;
pub mod seed;
pub mod spawn;
pub mod worker;

pub use biome::{BiomeClassifier, BiomeRecord, WeightedBiomeSet};
pub use chunk::{Chunk, ChunkCoord, ChunkGenerator, PackedTile, CHUNK_SIZE};
pub use chunk_manager::{ChunkManager, ChunkState, WorldStats};
pub use config::{LayoutStrategy, OccupantRegistry, TerrainRegistry, WorldConfig};
pub use context::GenerationContext;
pub use delta::{shared, DeltaKey, DeltaOverlay, DeltaStore, FileDeltaStore, MemoryDeltaStore, SharedDeltaStore};
pub use dungeon::{DungeonFloor, DungeonGenerator, FloorCache, FloorId, LayoutKind};
pub use error::{
    ConfigError, ConfigResult, GenerationError, GenerationResult, PersistenceError, PersistenceResult, WorldError,
    WorldResult,
};
pub use noise::{CellularNoise, SimplexNoise};
pub use postprocess::{Region, RiverPath, RoadPath, TileGrid};
pub use seed::{DungeonId, SeedTag, SubSeed, WorldSeed};
pub use spawn::SpawnEngine;
pub use worker::GenerationWorkers;
