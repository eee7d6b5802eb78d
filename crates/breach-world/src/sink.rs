//! Render and collision collaborators.
//!
//! The streamer hands finished meshes and region contents to a [`RegionSink`],
//! which owns whatever engine-side objects represent them. The engine decides
//! what a handle means; the streamer only stores it and gives it back.

use breach_mesh::RegionMesh;
use breach_voxel::{Region, RegionCoord};

/// Opaque handle to an uploaded mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Receives region geometry from the streamer.
pub trait RegionSink: Send {
    /// Uploads `mesh` for region `coord`. `previous` is the handle from the
    /// last upload of the same region, if any, and may be reused.
    fn upload_mesh(
        &mut self,
        coord: RegionCoord,
        mesh: &RegionMesh,
        previous: Option<MeshHandle>,
    ) -> MeshHandle;

    /// Rebuilds collision for region `coord` from its current blocks.
    fn assign_collision(&mut self, coord: RegionCoord, region: &Region);

    /// Frees everything held for region `coord`.
    fn release(&mut self, coord: RegionCoord, handle: MeshHandle);
}

/// Sink for headless processes: hands out handles and discards geometry.
#[derive(Debug, Default)]
pub struct NullSink {
    next_handle: u64,
}

impl RegionSink for NullSink {
    fn upload_mesh(
        &mut self,
        _coord: RegionCoord,
        _mesh: &RegionMesh,
        previous: Option<MeshHandle>,
    ) -> MeshHandle {
        previous.unwrap_or_else(|| {
            self.next_handle += 1;
            MeshHandle(self.next_handle)
        })
    }

    fn assign_collision(&mut self, _coord: RegionCoord, _region: &Region) {}

    fn release(&mut self, _coord: RegionCoord, _handle: MeshHandle) {}
}
