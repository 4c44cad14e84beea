//! # Delta Overlays
//!
//! Player-caused changes are kept apart from generated content. A chunk (or
//! dungeon floor) is always regenerated pristine from its seed, then its
//! overlay is re-applied on top. Only overlays are ever persisted.
//!
//! ## Wire Format
//!
//! ```text
//! magic: u32 LE  ("HMDO")
//! count: u32 LE
//! count x { x: i32 LE, y: i32 LE, kind: u8, payload: u32 LE }
//! ```
//!
//! Entries are written in position order, then in the order they were
//! appended at that position.
//!
//! [`FileDeltaStore`] LZ4-compresses each encoded overlay into its own file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hollowmere_shared::{DeltaEntry, Mutation, Tile, TilePos};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use parking_lot::Mutex;

use crate::chunk::ChunkCoord;
use crate::dungeon::FloorId;
use crate::error::{PersistenceError, PersistenceResult};

/// "HMDO" little-endian.
pub const DELTA_MAGIC: u32 = u32::from_le_bytes(*b"HMDO");

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 13;

/// Sparse position -> mutations map layered over a pristine grid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaOverlay {
    entries: BTreeMap<TilePos, Vec<Mutation>>,
    dirty: bool,
}

impl DeltaOverlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mutation.
    pub fn push(&mut self, pos: TilePos, mutation: Mutation) {
        self.entries.entry(pos).or_default().push(mutation);
        self.dirty = true;
    }

    /// Mutations recorded at a position, oldest first.
    #[must_use]
    pub fn at(&self, pos: TilePos) -> &[Mutation] {
        self.entries.get(&pos).map_or(&[][..], Vec::as_slice)
    }

    /// Number of `(position, mutation)` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if nothing was ever recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Changed since it was last loaded or persisted.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// All entries in wire order.
    pub fn entries(&self) -> impl Iterator<Item = DeltaEntry> + '_ {
        self.entries.iter().flat_map(|(pos, mutations)| {
            mutations.iter().map(move |mutation| DeltaEntry {
                pos: *pos,
                mutation: *mutation,
            })
        })
    }

    /// Applies the mutations at `pos` to a pristine tile, in order.
    ///
    /// Depleting a placed structure clears it and gives back the pristine
    /// walkability.
    #[must_use]
    pub fn apply(&self, pos: TilePos, mut tile: Tile) -> Tile {
        let pristine_walkable = tile.walkable;
        for mutation in self.at(pos) {
            match *mutation {
                Mutation::ResourceDepleted => {
                    tile.occupant = None;
                    tile.walkable = pristine_walkable;
                }
                Mutation::StructurePlaced { structure } => {
                    tile.occupant = Some(structure);
                    tile.walkable = false;
                }
                Mutation::EntityRemoved => {}
            }
        }
        tile
    }

    /// The creature spawned at `pos` has been removed.
    #[must_use]
    pub fn is_removed(&self, pos: TilePos) -> bool {
        self.at(pos).iter().any(|m| matches!(m, Mutation::EntityRemoved))
    }

    /// Encodes to the wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let count = self.len();
        let mut buf = Vec::with_capacity(HEADER_LEN + count * ENTRY_LEN);
        buf.extend_from_slice(&DELTA_MAGIC.to_le_bytes());
        buf.extend_from_slice(&(count as u32).to_le_bytes());
        for entry in self.entries() {
            buf.extend_from_slice(&entry.pos.x.to_le_bytes());
            buf.extend_from_slice(&entry.pos.y.to_le_bytes());
            buf.push(entry.mutation.kind_code());
            buf.extend_from_slice(&entry.mutation.payload().to_le_bytes());
        }
        buf
    }

    /// Decodes the wire format. The result is clean.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on bad magic, truncation or an unknown
    /// mutation kind.
    pub fn decode(data: &[u8]) -> PersistenceResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(PersistenceError::Truncated {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }
        let magic = read_u32(data, 0);
        if magic != DELTA_MAGIC {
            return Err(PersistenceError::BadMagic(magic));
        }
        let count = read_u32(data, 4) as usize;
        let expected = HEADER_LEN + count * ENTRY_LEN;
        if data.len() < expected {
            return Err(PersistenceError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let mut overlay = Self::new();
        for chunk in data[HEADER_LEN..expected].chunks_exact(ENTRY_LEN) {
            let pos = TilePos::new(read_u32(chunk, 0) as i32, read_u32(chunk, 4) as i32);
            let kind = chunk[8];
            let payload = read_u32(chunk, 9);
            let mutation = Mutation::from_parts(kind, payload)
                .ok_or(PersistenceError::UnknownMutation { kind, pos })?;
            overlay.push(pos, mutation);
        }
        overlay.mark_clean();
        Ok(overlay)
    }
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Identity an overlay is persisted under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKey {
    /// Overworld chunk.
    Chunk(ChunkCoord),
    /// Dungeon floor.
    Floor(FloorId),
}

impl DeltaKey {
    /// Stable file name of this key.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Chunk(coord) => format!("chunk_{}_{}.delta", coord.x, coord.y),
            Self::Floor(floor) => format!("floor_{:016x}_{}.delta", floor.dungeon.0, floor.floor),
        }
    }
}

/// The persistence collaborator.
///
/// Saving an empty overlay removes whatever was stored for the key.
pub trait DeltaStore: Send {
    /// Previously persisted overlay, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if stored data cannot be read or decoded.
    fn load(&self, key: &DeltaKey) -> PersistenceResult<Option<DeltaOverlay>>;

    /// Persists an overlay.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the overlay cannot be written.
    fn save(&mut self, key: &DeltaKey, overlay: &DeltaOverlay) -> PersistenceResult<()>;
}

/// Store shared between the chunk manager and the floor cache.
pub type SharedDeltaStore = Arc<Mutex<dyn DeltaStore>>;

/// Wraps a store for sharing.
#[must_use]
pub fn shared(store: impl DeltaStore + 'static) -> SharedDeltaStore {
    Arc::new(Mutex::new(store))
}

/// In-memory store holding encoded overlays.
#[derive(Debug, Default)]
pub struct MemoryDeltaStore {
    blobs: HashMap<DeltaKey, Vec<u8>>,
}

impl MemoryDeltaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored overlays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl DeltaStore for MemoryDeltaStore {
    fn load(&self, key: &DeltaKey) -> PersistenceResult<Option<DeltaOverlay>> {
        self.blobs
            .get(key)
            .map(|bytes| DeltaOverlay::decode(bytes))
            .transpose()
    }

    fn save(&mut self, key: &DeltaKey, overlay: &DeltaOverlay) -> PersistenceResult<()> {
        if overlay.is_empty() {
            self.blobs.remove(key);
        } else {
            self.blobs.insert(*key, overlay.encode());
        }
        Ok(())
    }
}

/// One LZ4-compressed file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileDeltaStore {
    root: PathBuf,
}

impl FileDeltaStore {
    /// Opens (creating if needed) a store directory.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> PersistenceResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &DeltaKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl DeltaStore for FileDeltaStore {
    fn load(&self, key: &DeltaKey) -> PersistenceResult<Option<DeltaOverlay>> {
        let path = self.path(key);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = decompress_size_prepended(&compressed)?;
        DeltaOverlay::decode(&raw).map(Some)
    }

    fn save(&mut self, key: &DeltaKey, overlay: &DeltaOverlay) -> PersistenceResult<()> {
        let path = self.path(key);
        if overlay.is_empty() {
            return match std::fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        // Write-then-rename: readers never see half an overlay
        let tmp = path.with_extension("delta.tmp");
        std::fs::write(&tmp, compress_prepend_size(&overlay.encode()))?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hollowmere_shared::{OccupantId, TerrainId};

    fn tile() -> Tile {
        Tile {
            terrain: TerrainId(0),
            walkable: true,
            transparent: true,
            elevation: 0.5,
            glyph: '.',
            color: [1, 2, 3],
            occupant: Some(OccupantId(100)),
        }
    }

    fn sample_overlay() -> DeltaOverlay {
        let mut overlay = DeltaOverlay::new();
        overlay.push(TilePos::new(5, -3), Mutation::ResourceDepleted);
        overlay.push(
            TilePos::new(-7, 2),
            Mutation::StructurePlaced {
                structure: OccupantId(400),
            },
        );
        overlay.push(TilePos::new(5, -3), Mutation::EntityRemoved);
        overlay
    }

    #[test]
    fn test_apply_semantics() {
        let overlay = sample_overlay();
        let depleted = overlay.apply(TilePos::new(5, -3), tile());
        assert_eq!(depleted.occupant, None);
        assert!(depleted.walkable);

        let built = overlay.apply(TilePos::new(-7, 2), tile());
        assert_eq!(built.occupant, Some(OccupantId(400)));
        assert!(!built.walkable);

        assert_eq!(overlay.apply(TilePos::new(0, 0), tile()), tile());
        assert!(overlay.is_removed(TilePos::new(5, -3)));
        assert!(!overlay.is_removed(TilePos::new(-7, 2)));
    }

    #[test]
    fn test_depleting_structure_restores_walkability() {
        let pos = TilePos::new(2, 2);
        let mut overlay = DeltaOverlay::new();
        overlay.push(pos, Mutation::StructurePlaced { structure: OccupantId(400) });
        overlay.push(pos, Mutation::ResourceDepleted);
        let cleared = overlay.apply(pos, tile());
        assert_eq!(cleared.occupant, None);
        assert!(cleared.walkable);

        // Building again on the cleared tile blocks it once more
        overlay.push(pos, Mutation::StructurePlaced { structure: OccupantId(401) });
        let rebuilt = overlay.apply(pos, tile());
        assert_eq!(rebuilt.occupant, Some(OccupantId(401)));
        assert!(!rebuilt.walkable);

        // A pristine wall stays a wall
        let wall = Tile { walkable: false, ..tile() };
        let mut overlay = DeltaOverlay::new();
        overlay.push(pos, Mutation::StructurePlaced { structure: OccupantId(400) });
        overlay.push(pos, Mutation::ResourceDepleted);
        assert!(!overlay.apply(pos, wall).walkable);
    }

    #[test]
    fn test_codec_layout() {
        let overlay = sample_overlay();
        let bytes = overlay.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 3 * ENTRY_LEN);
        assert_eq!(&bytes[0..4], b"HMDO");

        let decoded = DeltaOverlay::decode(&bytes).expect("decode");
        assert_eq!(decoded.entries().collect::<Vec<_>>(), overlay.entries().collect::<Vec<_>>());
        assert!(!decoded.is_dirty());
    }

    #[test]
    fn test_wire_bytes_are_stable() {
        let mut overlay = DeltaOverlay::new();
        overlay.push(
            TilePos::new(-7, 2),
            Mutation::StructurePlaced {
                structure: OccupantId(400),
            },
        );
        assert_eq!(
            overlay.encode(),
            vec![
                b'H', b'M', b'D', b'O', 1, 0, 0, 0, // magic, count
                0xf9, 0xff, 0xff, 0xff, 2, 0, 0, 0, // x = -7, y = 2
                2, 0x90, 0x01, 0, 0, // structure 400
            ]
        );
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let bytes = sample_overlay().encode();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(DeltaOverlay::decode(&bad_magic), Err(PersistenceError::BadMagic(_))));

        assert!(matches!(
            DeltaOverlay::decode(&bytes[..bytes.len() - 1]),
            Err(PersistenceError::Truncated { .. })
        ));

        let mut bad_kind = bytes;
        bad_kind[HEADER_LEN + 8] = 42;
        assert!(matches!(
            DeltaOverlay::decode(&bad_kind),
            Err(PersistenceError::UnknownMutation { kind: 42, .. })
        ));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryDeltaStore::new();
        let key = DeltaKey::Chunk(ChunkCoord::new(1, -1));
        assert!(store.load(&key).expect("load").is_none());

        store.save(&key, &sample_overlay()).expect("save");
        assert_eq!(store.load(&key).expect("load").map(|o| o.len()), Some(3));

        store.save(&key, &DeltaOverlay::new()).expect("save empty");
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "hollowmere_delta_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        let mut store = FileDeltaStore::open(&dir).expect("open");
        let key = DeltaKey::Chunk(ChunkCoord::new(-4, 9));

        store.save(&key, &sample_overlay()).expect("save");
        assert!(dir.join("chunk_-4_9.delta").exists());
        let loaded = store.load(&key).expect("load").expect("present");
        assert_eq!(loaded.len(), 3);

        store.save(&key, &DeltaOverlay::new()).expect("clear");
        assert!(store.load(&key).expect("load").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
