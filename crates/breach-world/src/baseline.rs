//! Baselines: the unedited contents of the world.
//!
//! A region is materialized by filling it from the baseline and then replaying
//! the edit log on top. Baselines are pure functions of position, so a region
//! can be discarded and rebuilt at any time.

use std::path::Path;

use breach_voxel::{BlockPos, BlockRegistry, BlockTypeId, LocalPos, REGION_SIZE, Region, RegionCoord};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading an authored map.
#[derive(Debug, Error)]
pub enum BaselineError {
    /// The map names a block type the registry does not know.
    #[error("unknown block type in map: {0}")]
    UnknownBlock(String),
    /// A fill's minimum corner lies above its maximum corner.
    #[error("inverted fill bounds: {min:?} > {max:?}")]
    InvertedFill {
        /// Minimum corner as written.
        min: [i32; 3],
        /// Maximum corner as written.
        max: [i32; 3],
    },
    /// I/O error reading the map file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RON deserialization error.
    #[error("ron parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Source of unedited world contents.
pub trait Baseline: Send + Sync {
    /// Writes the baseline blocks of region `coord` into `region`.
    fn populate(&self, coord: RegionCoord, region: &mut Region);

    /// Baseline block at a single world position.
    fn block_at(&self, pos: BlockPos) -> BlockTypeId;
}

// ---------------------------------------------------------------------------
// EmptyBaseline
// ---------------------------------------------------------------------------

/// A world of air.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyBaseline;

impl Baseline for EmptyBaseline {
    fn populate(&self, _coord: RegionCoord, _region: &mut Region) {}

    fn block_at(&self, _pos: BlockPos) -> BlockTypeId {
        BlockTypeId::AIR
    }
}

// ---------------------------------------------------------------------------
// FlatBaseline
// ---------------------------------------------------------------------------

/// Layered flat ground: bedrock at `y = 0`, stone, three dirt layers, and a
/// grass surface at `y = ground_height - 1`.
#[derive(Clone, Debug)]
pub struct FlatBaseline {
    ground_height: i32,
    floor: BlockTypeId,
    filler: BlockTypeId,
    subsoil: BlockTypeId,
    surface: BlockTypeId,
}

impl FlatBaseline {
    const SUBSOIL_DEPTH: i32 = 3;

    /// Creates a flat baseline with explicit layer blocks.
    pub fn new(
        ground_height: i32,
        floor: BlockTypeId,
        filler: BlockTypeId,
        subsoil: BlockTypeId,
        surface: BlockTypeId,
    ) -> Self {
        Self {
            ground_height,
            floor,
            filler,
            subsoil,
            surface,
        }
    }

    /// Resolves the layer blocks by name (`bedrock`, `stone`, `dirt`,
    /// `grass`). Missing names fall back to air.
    pub fn from_registry(registry: &BlockRegistry, ground_height: i32) -> Self {
        let lookup = |name: &str| {
            registry.lookup_by_name(name).unwrap_or_else(|| {
                tracing::warn!("block table has no '{name}', flat baseline uses air");
                BlockTypeId::AIR
            })
        };
        Self::new(
            ground_height,
            lookup("bedrock"),
            lookup("stone"),
            lookup("dirt"),
            lookup("grass"),
        )
    }

    /// Height of the first air layer.
    pub fn ground_height(&self) -> i32 {
        self.ground_height
    }

    fn layer(&self, y: i32) -> BlockTypeId {
        if y < 0 || y >= self.ground_height {
            BlockTypeId::AIR
        } else if y == 0 {
            self.floor
        } else if y == self.ground_height - 1 {
            self.surface
        } else if y >= self.ground_height - 1 - Self::SUBSOIL_DEPTH {
            self.subsoil
        } else {
            self.filler
        }
    }
}

impl Baseline for FlatBaseline {
    fn populate(&self, coord: RegionCoord, region: &mut Region) {
        let origin = coord.origin();
        for ly in 0..REGION_SIZE as u8 {
            let id = self.layer(origin.y + i32::from(ly));
            if id.is_air() {
                continue;
            }
            for lx in 0..REGION_SIZE as u8 {
                for lz in 0..REGION_SIZE as u8 {
                    region.set(LocalPos::new(lx, ly, lz), id);
                }
            }
        }
    }

    fn block_at(&self, pos: BlockPos) -> BlockTypeId {
        self.layer(pos.y)
    }
}

// ---------------------------------------------------------------------------
// AuthoredBaseline
// ---------------------------------------------------------------------------

/// A single authored block.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthoredBlock {
    /// World position.
    pub pos: [i32; 3],
    /// Block type name.
    pub block: String,
}

/// An authored axis-aligned box of one block type, bounds inclusive.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthoredFill {
    /// Minimum corner.
    pub min: [i32; 3],
    /// Maximum corner.
    pub max: [i32; 3],
    /// Block type name.
    pub block: String,
}

/// RON map file. Fills are applied first, then single blocks.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthoredMap {
    /// Box fills.
    #[serde(default)]
    pub fills: Vec<AuthoredFill>,
    /// Single blocks.
    #[serde(default)]
    pub blocks: Vec<AuthoredBlock>,
}

/// A hand-built map held as an explicit block list.
#[derive(Clone, Debug, Default)]
pub struct AuthoredBaseline {
    blocks: FxHashMap<BlockPos, BlockTypeId>,
    by_region: FxHashMap<RegionCoord, Vec<(LocalPos, BlockTypeId)>>,
}

impl AuthoredBaseline {
    /// Builds a baseline from explicit `(position, block)` pairs. Later pairs
    /// win on duplicate positions.
    pub fn from_blocks(blocks: impl IntoIterator<Item = (BlockPos, BlockTypeId)>) -> Self {
        let mut map = FxHashMap::default();
        for (pos, id) in blocks {
            if id.is_air() {
                map.remove(&pos);
            } else {
                map.insert(pos, id);
            }
        }

        let mut by_region: FxHashMap<RegionCoord, Vec<(LocalPos, BlockTypeId)>> =
            FxHashMap::default();
        for (&pos, &id) in &map {
            by_region
                .entry(pos.region())
                .or_default()
                .push((pos.local(), id));
        }

        Self {
            blocks: map,
            by_region,
        }
    }

    /// Resolves an [`AuthoredMap`] against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::UnknownBlock`] for unregistered names and
    /// [`BaselineError::InvertedFill`] for malformed boxes.
    pub fn from_map(map: &AuthoredMap, registry: &BlockRegistry) -> Result<Self, BaselineError> {
        let resolve = |name: &str| {
            registry
                .lookup_by_name(name)
                .ok_or_else(|| BaselineError::UnknownBlock(name.to_string()))
        };

        let mut blocks = Vec::new();
        for fill in &map.fills {
            let id = resolve(&fill.block)?;
            if (0..3).any(|axis| fill.min[axis] > fill.max[axis]) {
                return Err(BaselineError::InvertedFill {
                    min: fill.min,
                    max: fill.max,
                });
            }
            for x in fill.min[0]..=fill.max[0] {
                for y in fill.min[1]..=fill.max[1] {
                    for z in fill.min[2]..=fill.max[2] {
                        blocks.push((BlockPos::new(x, y, z), id));
                    }
                }
            }
        }
        for block in &map.blocks {
            let [x, y, z] = block.pos;
            blocks.push((BlockPos::new(x, y, z), resolve(&block.block)?));
        }

        Ok(Self::from_blocks(blocks))
    }

    /// Parses a RON [`AuthoredMap`] and resolves it.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::Ron`] on malformed input, or any resolution error.
    pub fn from_ron_str(ron_str: &str, registry: &BlockRegistry) -> Result<Self, BaselineError> {
        let map: AuthoredMap = ron::from_str(ron_str)?;
        Self::from_map(&map, registry)
    }

    /// Loads a RON map file.
    ///
    /// # Errors
    ///
    /// Returns [`BaselineError::Io`] if the file cannot be read.
    pub fn from_ron_file(path: &Path, registry: &BlockRegistry) -> Result<Self, BaselineError> {
        let contents = std::fs::read_to_string(path)?;
        let baseline = Self::from_ron_str(&contents, registry)?;
        tracing::info!(
            "loaded map {} ({} blocks in {} regions)",
            path.display(),
            baseline.len(),
            baseline.by_region.len()
        );
        Ok(baseline)
    }

    /// Number of non-air authored blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Baseline for AuthoredBaseline {
    fn populate(&self, coord: RegionCoord, region: &mut Region) {
        if let Some(cells) = self.by_region.get(&coord) {
            for &(local, id) in cells {
                region.set(local, id);
            }
        }
    }

    fn block_at(&self, pos: BlockPos) -> BlockTypeId {
        self.blocks.get(&pos).copied().unwrap_or(BlockTypeId::AIR)
    }
}
