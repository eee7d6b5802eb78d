//! Region meshing: face directions, mesh buffers, the culling mesher, and
//! remesh invalidation.

pub mod face_direction;
pub mod invalidation;
pub mod mesher;
pub mod region_mesh;

pub use face_direction::FaceDirection;
pub use invalidation::{MeshInvalidator, RegionMeshState};
pub use mesher::{NeighborSampler, OpenBoundary, RegionMesher};
pub use region_mesh::{FaceStyle, INDICES_PER_FACE, RegionMesh, VERTICES_PER_FACE};
