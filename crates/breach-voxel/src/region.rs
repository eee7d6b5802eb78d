//! Sparse block storage for one region of the world.
//!
//! A [`Region`] covers a [`REGION_SIZE`]-sided cube. Only non-air cells are
//! stored; every absent coordinate reads as air. Each effective mutation bumps
//! a monotonically increasing version so consumers can tell when a derived
//! mesh is stale.

use rustc_hash::FxHashMap;

use crate::block::BlockTypeId;
use crate::coords::{LocalPos, REGION_SIZE};

/// Sparse map of non-air blocks inside one region.
#[derive(Clone, Debug, Default)]
pub struct Region {
    blocks: FxHashMap<LocalPos, BlockTypeId>,
    version: u64,
}

impl Region {
    /// Creates an empty region (all air).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the block at `local`, or air if unset.
    pub fn get(&self, local: LocalPos) -> BlockTypeId {
        self.blocks.get(&local).copied().unwrap_or(BlockTypeId::AIR)
    }

    /// Overwrites the block at `local`. Writing air removes the entry.
    ///
    /// Returns `true` if the stored value changed. Only a change bumps the
    /// version, so repeating a write is a no-op.
    pub fn set(&mut self, local: LocalPos, id: BlockTypeId) -> bool {
        debug_assert!(
            (local.x as usize) < REGION_SIZE
                && (local.y as usize) < REGION_SIZE
                && (local.z as usize) < REGION_SIZE,
            "local position out of range: {local:?}"
        );
        let changed = if id.is_air() {
            self.blocks.remove(&local).is_some()
        } else {
            self.blocks.insert(local, id) != Some(id)
        };
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Removes every block. Bumps the version if anything was stored.
    pub fn clear(&mut self) {
        if !self.blocks.is_empty() {
            self.blocks.clear();
            self.version += 1;
        }
    }

    /// Number of non-air cells.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the region holds only air.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over the non-air cells in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (LocalPos, BlockTypeId)> + '_ {
        self.blocks.iter().map(|(&pos, &id)| (pos, id))
    }

    /// Mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: BlockTypeId = BlockTypeId(1);
    const DIRT: BlockTypeId = BlockTypeId(2);

    #[test]
    fn test_unset_reads_as_air() {
        let region = Region::new();
        for x in [0, 7, 15] {
            assert_eq!(region.get(LocalPos::new(x, x, x)), BlockTypeId::AIR);
        }
        assert!(region.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut region = Region::new();
        let pos = LocalPos::new(1, 2, 3);
        assert!(region.set(pos, STONE));
        assert_eq!(region.get(pos), STONE);
        assert_eq!(region.len(), 1);
    }

    #[test]
    fn test_repeated_write_is_idempotent() {
        let mut region = Region::new();
        let pos = LocalPos::new(4, 4, 4);
        region.set(pos, STONE);
        let version = region.version();
        assert!(!region.set(pos, STONE));
        assert_eq!(region.version(), version);
        assert_eq!(region.len(), 1);
    }

    #[test]
    fn test_writing_air_removes_entry() {
        let mut region = Region::new();
        let pos = LocalPos::new(0, 0, 0);
        region.set(pos, DIRT);
        assert!(region.set(pos, BlockTypeId::AIR));
        assert!(region.is_empty());
        assert!(!region.set(pos, BlockTypeId::AIR));
    }

    #[test]
    fn test_overwrite_bumps_version() {
        let mut region = Region::new();
        let pos = LocalPos::new(9, 9, 9);
        region.set(pos, STONE);
        let v1 = region.version();
        region.set(pos, DIRT);
        assert!(region.version() > v1);
        assert_eq!(region.get(pos), DIRT);
    }

    #[test]
    fn test_clear() {
        let mut region = Region::new();
        region.set(LocalPos::new(1, 1, 1), STONE);
        region.set(LocalPos::new(2, 1, 1), DIRT);
        let v = region.version();
        region.clear();
        assert!(region.is_empty());
        assert!(region.version() > v);
        let v = region.version();
        region.clear();
        assert_eq!(region.version(), v);
    }

    #[test]
    fn test_iter_yields_stored_cells() {
        let mut region = Region::new();
        region.set(LocalPos::new(1, 0, 0), STONE);
        region.set(LocalPos::new(0, 1, 0), DIRT);
        let mut cells: Vec<_> = region.iter().collect();
        cells.sort();
        assert_eq!(
            cells,
            vec![(LocalPos::new(0, 1, 0), DIRT), (LocalPos::new(1, 0, 0), STONE)]
        );
    }
}
