//! World, region, and region-local block coordinates.
//!
//! World block coordinates are signed and unbounded in memory, but only the
//! `i16` range can travel over the wire. Regions tile the world in
//! [`REGION_SIZE`]-sided cubes; conversion uses Euclidean division so that
//! negative coordinates land in the correct region.

use serde::{Deserialize, Serialize};

/// Side length of a region in blocks.
pub const REGION_SIZE: usize = 16;

/// Total number of cells in a region (16³).
pub const REGION_VOLUME: usize = REGION_SIZE * REGION_SIZE * REGION_SIZE;

const REGION_SIZE_I32: i32 = REGION_SIZE as i32;

/// Absolute block coordinate in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// World X.
    pub x: i32,
    /// World Y (up).
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the region containing this block.
    pub fn region(self) -> RegionCoord {
        RegionCoord::new(
            self.x.div_euclid(REGION_SIZE_I32),
            self.y.div_euclid(REGION_SIZE_I32),
            self.z.div_euclid(REGION_SIZE_I32),
        )
    }

    /// Returns this block's coordinate inside its region.
    pub fn local(self) -> LocalPos {
        LocalPos::new(
            self.x.rem_euclid(REGION_SIZE_I32) as u8,
            self.y.rem_euclid(REGION_SIZE_I32) as u8,
            self.z.rem_euclid(REGION_SIZE_I32) as u8,
        )
    }

    /// Returns the neighbouring position offset by `(dx, dy, dz)`.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Returns `true` when every axis fits in the `i16` wire encoding.
    pub fn fits_wire(self) -> bool {
        i16::try_from(self.x).is_ok() && i16::try_from(self.y).is_ok() && i16::try_from(self.z).is_ok()
    }

    /// Narrows to the wire encoding, or `None` if any axis overflows `i16`.
    pub fn to_wire(self) -> Option<(i16, i16, i16)> {
        Some((
            i16::try_from(self.x).ok()?,
            i16::try_from(self.y).ok()?,
            i16::try_from(self.z).ok()?,
        ))
    }

    /// Widens a wire-encoded coordinate.
    pub fn from_wire(x: i16, y: i16, z: i16) -> Self {
        Self::new(x.into(), y.into(), z.into())
    }

    /// Squared distance from this block's center to a point in world units.
    pub fn center_distance_sq(self, point: [f32; 3]) -> f32 {
        let dx = self.x as f32 + 0.5 - point[0];
        let dy = self.y as f32 + 0.5 - point[1];
        let dz = self.z as f32 + 0.5 - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Coordinate of a block inside a region; each axis is in `0..REGION_SIZE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalPos {
    /// Local X.
    pub x: u8,
    /// Local Y.
    pub y: u8,
    /// Local Z.
    pub z: u8,
}

impl LocalPos {
    /// Creates a local position. Callers must keep each axis below [`REGION_SIZE`].
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Returns `Some` when all axes are inside the region.
    pub fn checked(x: i32, y: i32, z: i32) -> Option<Self> {
        let range = 0..REGION_SIZE_I32;
        (range.contains(&x) && range.contains(&y) && range.contains(&z))
            .then(|| Self::new(x as u8, y as u8, z as u8))
    }

    /// Returns `true` if this cell touches any face of the region.
    pub fn on_boundary(self) -> bool {
        let max = (REGION_SIZE - 1) as u8;
        [self.x, self.y, self.z].iter().any(|&v| v == 0 || v == max)
    }
}

/// Region grid coordinate. The region's origin block is `coord * REGION_SIZE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionCoord {
    /// Region-grid X.
    pub x: i32,
    /// Region-grid Y.
    pub y: i32,
    /// Region-grid Z.
    pub z: i32,
}

impl RegionCoord {
    /// Creates a region coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World position of the region's minimum corner.
    pub fn origin(self) -> BlockPos {
        BlockPos::new(
            self.x * REGION_SIZE_I32,
            self.y * REGION_SIZE_I32,
            self.z * REGION_SIZE_I32,
        )
    }

    /// Converts a local coordinate of this region to a world position.
    pub fn world_pos(self, local: LocalPos) -> BlockPos {
        self.origin()
            .offset(local.x.into(), local.y.into(), local.z.into())
    }

    /// Returns the neighbouring region offset by `(dx, dy, dz)`.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Region containing a world-space point.
    pub fn containing(point: [f32; 3]) -> Self {
        BlockPos::new(
            point[0].floor() as i32,
            point[1].floor() as i32,
            point[2].floor() as i32,
        )
        .region()
    }
}
