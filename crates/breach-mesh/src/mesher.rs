//! Visibility-culled region meshing.
//!
//! For every solid block and each of the six directions, a face is emitted
//! when the neighbour across it is not solid. Neighbours inside the region are
//! read from the region itself; neighbours outside are asked of a
//! [`NeighborSampler`].

use breach_voxel::{BlockPos, BlockRegistry, BlockTypeId, LocalPos, Region, RegionCoord};

use crate::face_direction::FaceDirection;
use crate::region_mesh::{FaceStyle, RegionMesh};

/// Answers solidity queries for blocks outside the region being meshed.
pub trait NeighborSampler {
    /// Returns `true` if the block at world position `pos` is solid.
    fn is_solid(&self, pos: BlockPos) -> bool;
}

/// Treats everything outside the region as open space.
///
/// Faces on region boundaries are always emitted, so two solid blocks that
/// straddle a seam each draw their shared face.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenBoundary;

impl NeighborSampler for OpenBoundary {
    fn is_solid(&self, _pos: BlockPos) -> bool {
        false
    }
}

/// Builds region meshes, reusing its block scratch list across builds.
#[derive(Debug, Default)]
pub struct RegionMesher {
    cells: Vec<(LocalPos, BlockTypeId)>,
}

impl RegionMesher {
    /// Creates a mesher with an empty scratch list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity of the scratch list, in blocks.
    pub fn scratch_capacity(&self) -> usize {
        self.cells.capacity()
    }

    /// Clears `mesh` and refills it with the visible faces of `region`.
    ///
    /// Blocks are visited in ascending `(x, y, z)` order so the output is
    /// deterministic. An empty region yields an empty mesh.
    pub fn build<N: NeighborSampler + ?Sized>(
        &mut self,
        region: &Region,
        coord: RegionCoord,
        registry: &BlockRegistry,
        neighbors: &N,
        mesh: &mut RegionMesh,
    ) {
        mesh.clear();
        if region.is_empty() {
            return;
        }

        let atlas = registry.atlas();
        self.cells.clear();
        self.cells
            .extend(region.iter().filter(|&(_, id)| registry.is_solid(id)));
        self.cells.sort_unstable_by_key(|&(local, _)| local);

        for &(local, id) in &self.cells {
            let block = registry.get(id);
            let origin = [local.x as f32, local.y as f32, local.z as f32];

            for dir in FaceDirection::ALL {
                if Self::neighbor_solid(region, coord, registry, neighbors, local, dir) {
                    continue;
                }
                let texture = match dir {
                    FaceDirection::PosY => block.textures.top,
                    FaceDirection::NegY => block.textures.bottom,
                    _ => block.textures.side,
                };
                let style = FaceStyle {
                    uv_rect: atlas.uv_rect(texture),
                    color: block.opaque_tint(),
                    uv2: [block.metallic, block.smoothness],
                };
                mesh.push_face(dir, origin, &style);
            }
        }

        tracing::trace!(
            "meshed region {:?}: {} blocks, {} faces",
            coord,
            region.len(),
            mesh.face_count()
        );
    }

    fn neighbor_solid<N: NeighborSampler + ?Sized>(
        region: &Region,
        coord: RegionCoord,
        registry: &BlockRegistry,
        neighbors: &N,
        local: LocalPos,
        dir: FaceDirection,
    ) -> bool {
        let (nx, ny, nz) = dir.offset(local.x.into(), local.y.into(), local.z.into());
        match LocalPos::checked(nx, ny, nz) {
            Some(inner) => registry.is_solid(region.get(inner)),
            None => neighbors.is_solid(dir.neighbor(coord.world_pos(local))),
        }
    }
}
