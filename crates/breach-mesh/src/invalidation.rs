//! Mesh cache invalidation: tracks region data versions and determines which
//! regions need remeshing after block edits.

use breach_voxel::{LocalPos, REGION_SIZE, RegionCoord};

use crate::FaceDirection;

/// Metadata for a region's mesh cache state.
#[derive(Clone, Debug, Default)]
pub struct RegionMeshState {
    /// Version of the region data when the current mesh was generated.
    /// `None` until the first mesh is built.
    pub meshed_version: Option<u64>,
}

impl RegionMeshState {
    /// Creates a new mesh state with no mesh generated yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the mesh is stale (version mismatch with current data).
    pub fn is_stale(&self, current_data_version: u64) -> bool {
        self.meshed_version != Some(current_data_version)
    }

    /// Records that a mesh was built at `version`.
    pub fn mark_meshed(&mut self, version: u64) {
        self.meshed_version = Some(version);
    }

    /// Forces the next staleness check to report `true`.
    pub fn invalidate(&mut self) {
        self.meshed_version = None;
    }
}

/// Determines which regions need remeshing after a block edit.
pub struct MeshInvalidator;

impl MeshInvalidator {
    /// Returns the regions that should be invalidated after the block at
    /// `local` inside `edited` changes.
    ///
    /// The edited region itself is always first. Face neighbours are added
    /// when the edit sits on the shared boundary, because their boundary faces
    /// are culled against it.
    pub fn invalidate(edited: RegionCoord, local: LocalPos) -> Vec<RegionCoord> {
        let mut dirty = vec![edited];
        let max = (REGION_SIZE - 1) as u8;
        let checks = [
            (local.x == max, FaceDirection::PosX),
            (local.x == 0, FaceDirection::NegX),
            (local.y == max, FaceDirection::PosY),
            (local.y == 0, FaceDirection::NegY),
            (local.z == max, FaceDirection::PosZ),
            (local.z == 0, FaceDirection::NegZ),
        ];
        for (on_face, dir) in checks {
            if on_face {
                let (dx, dy, dz) = dir.delta();
                dirty.push(edited.offset(dx, dy, dz));
            }
        }
        dirty
    }
}
