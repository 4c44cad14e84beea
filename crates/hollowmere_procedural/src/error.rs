//! # Generation Error Types
//!
//! Only configuration errors are fatal. Everything else in here is either
//! recovered inside the engine or returned to a caller that misused the
//! mutation API. Non-fatal generation conditions (biome table gaps, missing
//! spawn occupants, cache overflow, disconnected layouts) are logged and
//! never show up as `Err`.

use thiserror::Error;

use crate::chunk::ChunkCoord;
use hollowmere_shared::TilePos;

/// A malformed world configuration. Fails fast at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document did not match the schema.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The biome table is empty.
    #[error("world config defines no biomes")]
    NoBiomes,

    /// A record failed semantic validation.
    #[error("invalid {record}: {reason}")]
    Invalid {
        /// Which record, e.g. `biomes.entries[2] ("wetland")`.
        record: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A single dungeon layout attempt failed. Recovered by the generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Room placement ran out of retries below the playable minimum.
    #[error("placed {placed} rooms, need at least {required}")]
    InsufficientRooms {
        /// Rooms placed.
        placed: usize,
        /// Configured minimum.
        required: usize,
    },

    /// Carving left at least one room unreachable from the entrance.
    #[error("{unreachable} rooms unreachable from the entrance")]
    Disconnected {
        /// Number of unreachable rooms.
        unreachable: usize,
    },
}

/// Result type for a single layout attempt.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Delta overlay persistence failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Store I/O failed.
    #[error("delta store I/O: {0}")]
    Io(#[from] std::io::Error),

    /// LZ4 payload could not be decompressed.
    #[error("delta decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// The payload does not start with the overlay magic.
    #[error("bad delta magic {0:#010x}")]
    BadMagic(u32),

    /// The payload ended inside a record.
    #[error("truncated delta overlay: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },

    /// An entry carries an unknown mutation kind.
    #[error("unknown mutation kind {kind} at {pos}")]
    UnknownMutation {
        /// Wire kind code.
        kind: u8,
        /// Entry position.
        pos: TilePos,
    },
}

/// Result type for delta persistence.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Mutation API misuse.
#[derive(Error, Debug)]
pub enum WorldError {
    /// The chunk holding the position is not resident.
    #[error("chunk {0:?} is not loaded")]
    ChunkNotLoaded(ChunkCoord),

    /// `deplete` on a tile without a resource or flora occupant.
    #[error("nothing to deplete at {0}")]
    NothingToDeplete(TilePos),

    /// The position is outside the floor.
    #[error("position {0} is not part of the floor")]
    OutOfFloor(TilePos),

    /// The floor has not been entered this session.
    #[error("floor is not loaded")]
    FloorNotLoaded,

    /// Persisting or restoring a delta failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result type for world mutations.
pub type WorldResult<T> = Result<T, WorldError>;
