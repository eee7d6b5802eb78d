//! Voxel storage for the Breach engine: coordinates, block types, sparse
//! regions, the damage ledger, and the edit history.

pub mod block;
pub mod coords;
pub mod damage;
pub mod edit;
pub mod region;
pub mod registry;

pub use block::{
    AtlasCoord, BlockType, BlockTypeDef, BlockTypeId, DamageSound, FaceAtlas, FaceTextures, Health,
};
pub use coords::{BlockPos, LocalPos, REGION_SIZE, REGION_VOLUME, RegionCoord};
pub use damage::{DamageOutcome, DamageRejection, DamageTracker};
pub use edit::{EditLog, EditRecord};
pub use region::Region;
pub use registry::{AtlasLayout, BlockRegistry, BlockTable, MAX_BLOCK_TYPES, RegistryError};
