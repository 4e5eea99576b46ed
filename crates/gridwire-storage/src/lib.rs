//! Binary persistence for gridwire puzzles.
//!
//! Documents start with the `PUZL` tag and an `int32` version. The encoder
//! only ever writes [`CURRENT_VERSION`]; every earlier layout keeps a read
//! path so old puzzles continue to load.

mod bytes;
mod decode;
mod encode;

pub use bytes::{ByteReader, ByteWriter};

use gridwire_core::{Guid, Puzzle, PuzzleConfig, PuzzleError, TileSet};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Four-byte document tag.
pub const TAG: [u8; 4] = *b"PUZL";
/// Version emitted by the encoder.
pub const CURRENT_VERSION: i32 = 5;
/// Oldest version the decoder still reads.
pub const OLDEST_VERSION: i32 = 3;

/// Errors surfaced by the document codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not a puzzle document (tag {0:?})")]
    BadTag([u8; 4]),
    #[error("unsupported document version {0}")]
    UnsupportedVersion(i32),
    #[error("document truncated at byte {offset} (wanted {wanted} more)")]
    Truncated { offset: usize, wanted: usize },
    #[error("malformed document: {0}")]
    Malformed(&'static str),
    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Asset lookups consulted while decoding references.
///
/// Every lookup defaults to "present"; a missing asset leaves the property
/// at its default value.
pub trait AssetCatalog {
    fn has_sound(&self, _id: Guid) -> bool {
        true
    }

    fn has_background(&self, _id: Guid) -> bool {
        true
    }

    fn has_decal(&self, _id: Guid) -> bool {
        true
    }
}

/// Catalog that accepts every reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl AssetCatalog for AcceptAll {}

/// Catalog backed by explicit id sets.
#[derive(Debug, Default, Clone)]
pub struct AssetSet {
    sounds: HashSet<Guid>,
    backgrounds: HashSet<Guid>,
    decals: HashSet<Guid>,
}

impl AssetSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sound(mut self, id: Guid) -> Self {
        self.sounds.insert(id);
        self
    }

    #[must_use]
    pub fn with_background(mut self, id: Guid) -> Self {
        self.backgrounds.insert(id);
        self
    }

    #[must_use]
    pub fn with_decal(mut self, id: Guid) -> Self {
        self.decals.insert(id);
        self
    }
}

impl AssetCatalog for AssetSet {
    fn has_sound(&self, id: Guid) -> bool {
        self.sounds.contains(&id)
    }

    fn has_background(&self, id: Guid) -> bool {
        self.backgrounds.contains(&id)
    }

    fn has_decal(&self, id: Guid) -> bool {
        self.decals.contains(&id)
    }
}

/// Renamed or replaced templates: old id → new id.
#[derive(Debug, Default, Clone)]
pub struct MigrationTable {
    map: HashMap<Guid, Guid>,
}

impl MigrationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, from: Guid, to: Guid) -> Self {
        self.insert(from, to);
        self
    }

    pub fn insert(&mut self, from: Guid, to: Guid) {
        self.map.insert(from, to);
    }

    /// Follows a single hop; unmapped ids resolve to themselves.
    #[must_use]
    pub fn resolve(&self, id: Guid) -> Guid {
        self.map.get(&id).copied().unwrap_or(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Fixed leading fields of every document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentHeader {
    pub version: i32,
    pub tiles: usize,
    pub wires: usize,
}

impl DocumentHeader {
    /// Read and validate the tag, version, and table sizes.
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let tag: [u8; 4] = reader.read_array()?;
        if tag != TAG {
            return Err(CodecError::BadTag(tag));
        }
        let version = reader.read_i32()?;
        if !(OLDEST_VERSION..=CURRENT_VERSION).contains(&version) {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let tiles = reader.read_len()?;
        let wires = reader.read_len()?;
        Ok(Self {
            version,
            tiles,
            wires,
        })
    }
}

/// Encoder/decoder configured with template migrations and asset lookups.
pub struct DocumentCodec {
    migrations: MigrationTable,
    catalog: Box<dyn AssetCatalog>,
}

impl Default for DocumentCodec {
    fn default() -> Self {
        Self {
            migrations: MigrationTable::new(),
            catalog: Box::new(AcceptAll),
        }
    }
}

impl std::fmt::Debug for DocumentCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCodec")
            .field("migrations", &self.migrations.len())
            .finish_non_exhaustive()
    }
}

impl DocumentCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_migrations(mut self, migrations: MigrationTable) -> Self {
        self.migrations = migrations;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: impl AssetCatalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    #[must_use]
    pub fn migrations(&self) -> &MigrationTable {
        &self.migrations
    }

    /// Header of an encoded document without decoding the body.
    pub fn inspect(bytes: &[u8]) -> Result<DocumentHeader, CodecError> {
        DocumentHeader::read(&mut ByteReader::new(bytes))
    }

    /// Encode `puzzle` and write it to `path`.
    pub fn save(&self, puzzle: &Puzzle, path: impl AsRef<Path>) -> Result<(), CodecError> {
        let path = path.as_ref();
        let bytes = self.encode(puzzle);
        fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "puzzle saved");
        Ok(())
    }

    /// Read `path` and decode it into a new puzzle.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        config: PuzzleConfig,
        tileset: Arc<TileSet>,
    ) -> Result<Puzzle, CodecError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let puzzle = self.decode(&bytes, config, tileset)?;
        info!(path = %path.display(), tiles = puzzle.tile_count(), "puzzle loaded");
        Ok(puzzle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_rejects_bad_tag_and_versions() {
        let mut writer = ByteWriter::new();
        writer.write_bytes(b"NOPE");
        assert!(matches!(
            DocumentCodec::inspect(&writer.into_inner()),
            Err(CodecError::BadTag(_))
        ));

        for version in [2, 6] {
            let mut writer = ByteWriter::new();
            writer.write_bytes(&TAG);
            writer.write_i32(version);
            writer.write_i32(0);
            writer.write_i32(0);
            assert!(matches!(
                DocumentCodec::inspect(&writer.into_inner()),
                Err(CodecError::UnsupportedVersion(v)) if v == version
            ));
        }
    }

    #[test]
    fn migrations_follow_one_hop() {
        let a = Guid::from_u128(1);
        let b = Guid::from_u128(2);
        let c = Guid::from_u128(3);
        let table = MigrationTable::new().with(a, b).with(b, c);
        assert_eq!(table.resolve(a), b);
        assert_eq!(table.resolve(b), c);
        assert_eq!(table.resolve(c), c);
    }
}
