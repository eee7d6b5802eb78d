//! Edit and damage request validation against current world state.
//!
//! The host validates every request before touching its world; peers run the
//! same checks locally so obviously invalid requests never leave the process.

use breach_config::GameplayConfig;
use breach_voxel::{BlockPos, BlockTypeId};
use breach_world::VoxelWorld;
use glam::Vec3;

/// Reason an edit or damage request was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditRejection {
    /// The coordinate does not fit the `i16` wire encoding.
    #[error("position {0:?} is outside the wire range")]
    OutOfWireRange(BlockPos),
    /// The requested block id is not registered.
    #[error("unknown block id {0}")]
    UnknownBlock(u8),
    /// Placement onto a cell that already holds a block.
    #[error("target voxel is obstructed")]
    Obstructed,
    /// Removal or damage of an empty cell.
    #[error("target voxel is already empty")]
    AlreadyEmpty,
    /// Removal or damage of a non-diggable or indestructible block.
    #[error("target block cannot be broken")]
    Undamageable,
    /// A damage request carrying zero damage.
    #[error("zero damage")]
    ZeroDamage,
    /// The target is beyond the requester's reach.
    #[error("target {distance:.1} blocks away, reach is {reach:.1}")]
    OutOfReach {
        /// Distance from requester to block center.
        distance: f32,
        /// Configured reach.
        reach: f32,
    },
    /// The peer has no authoritative snapshot yet.
    #[error("not synchronized with the host")]
    NotSynced,
}

/// Gameplay rules applied to requests.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRules {
    /// Maximum requester-to-block distance in blocks.
    pub reach_distance: f32,
}

impl Default for EditRules {
    fn default() -> Self {
        Self::from(&GameplayConfig::default())
    }
}

impl From<&GameplayConfig> for EditRules {
    fn from(config: &GameplayConfig) -> Self {
        Self {
            reach_distance: config.reach_distance,
        }
    }
}

impl EditRules {
    fn check_reach(&self, pos: BlockPos, requester: Option<Vec3>) -> Result<(), EditRejection> {
        let Some(origin) = requester else {
            return Ok(());
        };
        let distance_sq = pos.center_distance_sq(origin.to_array());
        if distance_sq > self.reach_distance * self.reach_distance {
            return Err(EditRejection::OutOfReach {
                distance: distance_sq.sqrt(),
                reach: self.reach_distance,
            });
        }
        Ok(())
    }
}

/// Validates an overwrite of `pos` with `block`. Air removes; anything else
/// places.
///
/// # Errors
///
/// Returns the first [`EditRejection`] that applies.
pub fn validate_edit(
    world: &VoxelWorld,
    rules: &EditRules,
    requester: Option<Vec3>,
    pos: BlockPos,
    block: BlockTypeId,
) -> Result<(), EditRejection> {
    if !pos.fits_wire() {
        return Err(EditRejection::OutOfWireRange(pos));
    }
    if !world.registry().contains(block) {
        return Err(EditRejection::UnknownBlock(block.0));
    }
    rules.check_reach(pos, requester)?;

    let current = world.block_at(pos);
    if block.is_air() {
        if current.is_air() {
            return Err(EditRejection::AlreadyEmpty);
        }
        if !world.registry().get(current).health.is_damageable() {
            return Err(EditRejection::Undamageable);
        }
    } else if !current.is_air() {
        return Err(EditRejection::Obstructed);
    }

    Ok(())
}

/// Validates a hit of `amount` on `pos`.
///
/// # Errors
///
/// Returns the first [`EditRejection`] that applies.
pub fn validate_damage(
    world: &VoxelWorld,
    rules: &EditRules,
    requester: Option<Vec3>,
    pos: BlockPos,
    amount: u32,
) -> Result<(), EditRejection> {
    if !pos.fits_wire() {
        return Err(EditRejection::OutOfWireRange(pos));
    }
    rules.check_reach(pos, requester)?;

    let current = world.block_at(pos);
    if current.is_air() {
        return Err(EditRejection::AlreadyEmpty);
    }
    if !world.registry().get(current).health.is_damageable() {
        return Err(EditRejection::Undamageable);
    }
    if amount == 0 {
        return Err(EditRejection::ZeroDamage);
    }

    Ok(())
}
