//! Block registry: maps compact [`BlockTypeId`] values to immutable [`BlockType`]s.
//!
//! The registry is built once at startup and then shared behind an `Arc`.
//! Air is always ID 0 so that absent sparse entries read as empty space.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{AtlasCoord, BlockType, BlockTypeDef, BlockTypeId, FaceAtlas, Health};

/// Maximum number of block types, including air (ids are `u8`).
pub const MAX_BLOCK_TYPES: usize = 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while building a block registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with the same name has already been registered.
    #[error("duplicate block type name: {0}")]
    DuplicateName(String),
    /// All 256 ids are in use.
    #[error("block registry is full (max {MAX_BLOCK_TYPES} types)")]
    RegistryFull,
    /// A face tile lies outside the atlas grid.
    #[error("block {name:?} uses atlas tile {coord:?} outside the atlas")]
    AtlasOutOfRange {
        /// Offending block type.
        name: String,
        /// Offending tile.
        coord: AtlasCoord,
    },
    /// The atlas has zero columns or rows.
    #[error("atlas must have at least one column and one row")]
    EmptyAtlas,
    /// I/O error reading a block table file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RON deserialization error.
    #[error("ron parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

// ---------------------------------------------------------------------------
// Block table
// ---------------------------------------------------------------------------

/// Dimensions of the texture atlas in tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasLayout {
    /// Tiles per row.
    pub columns: u16,
    /// Tiles per column.
    pub rows: u16,
}

impl Default for AtlasLayout {
    fn default() -> Self {
        Self {
            columns: 8,
            rows: 8,
        }
    }
}

impl AtlasLayout {
    /// Returns `true` if `coord` names a tile inside the grid.
    pub fn contains(&self, coord: AtlasCoord) -> bool {
        coord.column < self.columns && coord.row < self.rows
    }

    /// UV rectangle `[u_min, v_min, u_max, v_max]` of a linear tile index.
    pub fn uv_rect(&self, index: u32) -> [f32; 4] {
        let columns = u32::from(self.columns.max(1));
        let rows = u32::from(self.rows.max(1));
        let column = (index % columns) as f32;
        let row = (index / columns) as f32;
        let w = 1.0 / columns as f32;
        let h = 1.0 / rows as f32;
        [column * w, row * h, (column + 1.0) * w, (row + 1.0) * h]
    }
}

/// RON block table: an atlas layout plus the non-air block definitions.
#[derive(Debug, Deserialize)]
pub struct BlockTable {
    /// Atlas dimensions.
    #[serde(default)]
    pub atlas: AtlasLayout,
    /// Definitions, assigned ids 1.. in order.
    pub blocks: Vec<BlockTypeDef>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Process-wide table of block types.
#[derive(Debug)]
pub struct BlockRegistry {
    atlas: AtlasLayout,
    /// Dense array where `index == BlockTypeId.0`.
    types: Vec<BlockType>,
    name_to_id: FxHashMap<String, BlockTypeId>,
}

impl BlockRegistry {
    /// Creates a registry holding only air.
    pub fn new(atlas: AtlasLayout) -> Self {
        let air = BlockType::from_def(
            BlockTypeDef {
                name: "air".to_string(),
                solid: false,
                transparent: true,
                atlas: FaceAtlas::default(),
                health: Health::NonDiggable,
                tint: [0.0; 4],
                metallic: 0.0,
                smoothness: 0.0,
            },
            atlas.columns,
        );
        let mut name_to_id = FxHashMap::default();
        name_to_id.insert(air.name.clone(), BlockTypeId::AIR);
        Self {
            atlas,
            types: vec![air],
            name_to_id,
        }
    }

    /// Registers a block type and returns its id (sequential from 1).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`], [`RegistryError::AtlasOutOfRange`]
    /// or [`RegistryError::RegistryFull`].
    pub fn register(&mut self, def: BlockTypeDef) -> Result<BlockTypeId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if let Some(coord) = def
            .atlas
            .faces()
            .into_iter()
            .find(|&coord| !self.atlas.contains(coord))
        {
            return Err(RegistryError::AtlasOutOfRange {
                name: def.name,
                coord,
            });
        }
        if self.types.len() >= MAX_BLOCK_TYPES {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockTypeId(self.types.len() as u8);
        self.name_to_id.insert(def.name.clone(), id);
        self.types.push(BlockType::from_def(def, self.atlas.columns));
        Ok(id)
    }

    /// Builds a registry from an atlas layout and definitions.
    ///
    /// # Errors
    ///
    /// Fails on an empty atlas, out-of-atlas tiles, duplicate names, or more
    /// than 255 definitions.
    pub fn from_defs(
        atlas: AtlasLayout,
        defs: impl IntoIterator<Item = BlockTypeDef>,
    ) -> Result<Self, RegistryError> {
        if atlas.columns == 0 || atlas.rows == 0 {
            return Err(RegistryError::EmptyAtlas);
        }
        let mut registry = Self::new(atlas);
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Parses a RON [`BlockTable`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Ron`] on malformed input, or any registration error.
    pub fn from_ron_str(ron_str: &str) -> Result<Self, RegistryError> {
        let table: BlockTable = ron::from_str(ron_str)?;
        Self::from_defs(table.atlas, table.blocks)
    }

    /// Loads a RON [`BlockTable`] from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the file cannot be read.
    pub fn from_ron_file(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// The built-in block table used when no table file is configured.
    pub fn standard() -> Self {
        let mut registry = Self::new(AtlasLayout::default());
        for def in standard_defs() {
            // Names in the standard table are unique and far below the limit.
            if let Err(e) = registry.register(def) {
                tracing::error!("standard block table rejected: {e}");
            }
        }
        registry
    }

    /// Returns the block type for `id`, or air for ids that were never registered.
    pub fn get(&self, id: BlockTypeId) -> &BlockType {
        self.types.get(id.0 as usize).unwrap_or(&self.types[0])
    }

    /// Returns `true` if `id` was registered.
    pub fn contains(&self, id: BlockTypeId) -> bool {
        (id.0 as usize) < self.types.len()
    }

    /// Returns the id registered under `name`.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockTypeId> {
        self.name_to_id.get(name).copied()
    }

    /// Returns `true` if `id` is a solid block.
    pub fn is_solid(&self, id: BlockTypeId) -> bool {
        self.get(id).solid
    }

    /// The atlas layout used to resolve texture indices.
    pub fn atlas(&self) -> AtlasLayout {
        self.atlas
    }

    /// Number of registered types, including air.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.types.len() <= 1
    }
}

fn def(
    name: &str,
    tile: (u16, u16),
    health: Health,
    tint: [f32; 4],
    metallic: f32,
    smoothness: f32,
) -> BlockTypeDef {
    BlockTypeDef {
        name: name.to_string(),
        solid: true,
        transparent: false,
        atlas: FaceAtlas::uniform(AtlasCoord::new(tile.0, tile.1)),
        health,
        tint,
        metallic,
        smoothness,
    }
}

fn standard_defs() -> Vec<BlockTypeDef> {
    let grass = BlockTypeDef {
        atlas: FaceAtlas {
            top: AtlasCoord::new(0, 0),
            side: AtlasCoord::new(1, 0),
            bottom: AtlasCoord::new(2, 0),
        },
        ..def("grass", (0, 0), Health::Low, [0.55, 0.8, 0.4, 1.0], 0.0, 0.05)
    };
    let glass = BlockTypeDef {
        transparent: true,
        ..def("glass", (5, 1), Health::OneHit, [0.85, 0.95, 1.0, 0.35], 0.0, 0.95)
    };
    vec![
        def("stone", (3, 0), Health::Medium, [0.6, 0.6, 0.6, 1.0], 0.0, 0.2),
        def("dirt", (2, 0), Health::Low, [0.5, 0.36, 0.25, 1.0], 0.0, 0.0),
        grass,
        def("planks", (4, 0), Health::Medium, [0.75, 0.6, 0.4, 1.0], 0.0, 0.15),
        def("sand", (5, 0), Health::Low, [0.9, 0.85, 0.6, 1.0], 0.0, 0.0),
        def("brick", (6, 0), Health::High, [0.7, 0.3, 0.25, 1.0], 0.0, 0.1),
        def("metal", (7, 0), Health::High, [0.8, 0.82, 0.85, 1.0], 0.9, 0.6),
        glass,
        def("bedrock", (0, 1), Health::Indestructible, [0.2, 0.2, 0.22, 1.0], 0.0, 0.0),
        def("barrier", (1, 1), Health::NonDiggable, [0.3, 0.3, 0.35, 1.0], 0.2, 0.3),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
