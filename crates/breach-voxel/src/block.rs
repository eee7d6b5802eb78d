//! Block type descriptors: identity, solidity, textures, and health class.

use serde::{Deserialize, Serialize};

/// Compact identifier stored in every voxel cell. `0` is air.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockTypeId(pub u8);

impl BlockTypeId {
    /// Empty space.
    pub const AIR: Self = Self(0);

    /// Returns `true` for air.
    pub fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Durability class of a block type. The discriminant is the starting health.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Health {
    /// Cannot be dug; damage is ignored.
    NonDiggable = 0,
    /// Any positive damage destroys the block.
    OneHit = 1,
    /// Weak material.
    Low = 50,
    /// Regular material.
    Medium = 85,
    /// Reinforced material.
    High = 140,
    /// Map geometry that must never break.
    Indestructible = u32::MAX,
}

impl Health {
    /// Starting health for a block of this class.
    pub fn max_health(self) -> u32 {
        self as u32
    }

    /// Returns `false` for classes that reject all damage.
    pub fn is_damageable(self) -> bool {
        !matches!(self, Self::NonDiggable | Self::Indestructible)
    }

    /// Returns `true` when this class keeps a health ledger entry.
    pub fn tracks_health(self) -> bool {
        matches!(self, Self::Low | Self::Medium | Self::High)
    }
}

/// Sound family played when a block of a given health class is hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageSound {
    /// Ricochet; the block does not break.
    Unbreakable,
    /// Shatter.
    Brittle,
    /// Dull thud.
    Soft,
    /// Crack.
    Hard,
    /// Deep impact.
    Heavy,
}

impl From<Health> for DamageSound {
    fn from(health: Health) -> Self {
        match health {
            Health::NonDiggable | Health::Indestructible => Self::Unbreakable,
            Health::OneHit => Self::Brittle,
            Health::Low => Self::Soft,
            Health::Medium => Self::Hard,
            Health::High => Self::Heavy,
        }
    }
}

/// Cell in the texture atlas grid, counted from the top-left tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasCoord {
    /// Column.
    pub column: u16,
    /// Row.
    pub row: u16,
}

impl AtlasCoord {
    /// Creates an atlas coordinate.
    pub const fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }
}

/// Atlas tiles for the three face groups of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceAtlas {
    /// +Y face.
    pub top: AtlasCoord,
    /// ±X and ±Z faces.
    pub side: AtlasCoord,
    /// −Y face.
    pub bottom: AtlasCoord,
}

impl FaceAtlas {
    /// Same tile on every face.
    pub const fn uniform(coord: AtlasCoord) -> Self {
        Self {
            top: coord,
            side: coord,
            bottom: coord,
        }
    }

    /// The three face-group tiles, top first.
    pub fn faces(&self) -> [AtlasCoord; 3] {
        [self.top, self.side, self.bottom]
    }
}

/// Resolved linear texture indices (`row * columns + column`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaceTextures {
    /// +Y face.
    pub top: u32,
    /// ±X and ±Z faces.
    pub side: u32,
    /// −Y face.
    pub bottom: u32,
}

/// Serializable block definition, as authored in a block table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockTypeDef {
    /// Unique name (e.g. "stone").
    pub name: String,
    /// Participates in collision and face culling.
    pub solid: bool,
    /// Light passes through (glass).
    #[serde(default)]
    pub transparent: bool,
    /// Atlas tiles per face group.
    #[serde(default)]
    pub atlas: FaceAtlas,
    /// Durability class.
    pub health: Health,
    /// Vertex tint, RGBA in `0.0..=1.0`.
    #[serde(default = "white")]
    pub tint: [f32; 4],
    /// Metallic shading parameter.
    #[serde(default)]
    pub metallic: f32,
    /// Smoothness shading parameter.
    #[serde(default)]
    pub smoothness: f32,
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

/// Immutable block type as held by the registry.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockType {
    /// Unique name.
    pub name: String,
    /// Participates in collision and face culling.
    pub solid: bool,
    /// Light passes through.
    pub transparent: bool,
    /// Per-face texture indices.
    pub textures: FaceTextures,
    /// Durability class.
    pub health: Health,
    /// Derived from `health`.
    pub damage_sound: DamageSound,
    /// Vertex tint.
    pub tint: [f32; 4],
    /// Metallic shading parameter.
    pub metallic: f32,
    /// Smoothness shading parameter.
    pub smoothness: f32,
}

impl BlockType {
    /// Resolves a definition against an atlas that is `atlas_columns` tiles wide.
    ///
    /// Coordinates are not range-checked here; the registry rejects tiles
    /// outside its atlas before calling this.
    pub fn from_def(def: BlockTypeDef, atlas_columns: u16) -> Self {
        let index = |c: AtlasCoord| {
            u32::from(c.row) * u32::from(atlas_columns) + u32::from(c.column)
        };
        Self {
            textures: FaceTextures {
                top: index(def.atlas.top),
                side: index(def.atlas.side),
                bottom: index(def.atlas.bottom),
            },
            damage_sound: def.health.into(),
            name: def.name,
            solid: def.solid,
            transparent: def.transparent,
            health: def.health,
            tint: def.tint,
            metallic: def.metallic,
            smoothness: def.smoothness,
        }
    }

    /// Tint with alpha forced to opaque, as written into mesh colors.
    pub fn opaque_tint(&self) -> [f32; 4] {
        [self.tint[0], self.tint[1], self.tint[2], 1.0]
    }
}
