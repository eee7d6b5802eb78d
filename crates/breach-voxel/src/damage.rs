//! Per-block health ledger and the damage state machine.
//!
//! Ledger entries are created lazily on the first hit to a block with a
//! tracked health class and removed once the block is destroyed. Health only
//! ever decreases. The tracker never touches the grid: callers turn
//! [`DamageOutcome::Destroyed`] into an air write.

use rustc_hash::FxHashMap;

use crate::block::BlockTypeId;
use crate::coords::BlockPos;
use crate::registry::BlockRegistry;

/// Why a hit was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageRejection {
    /// The block's class refuses all damage.
    Undamageable,
    /// Zero damage is never applied.
    ZeroDamage,
    /// The target cell is air.
    Empty,
}

/// Result of a single hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Nothing changed.
    Rejected(DamageRejection),
    /// The block survives with `remaining` health.
    Damaged {
        /// Health left after the hit.
        remaining: u32,
    },
    /// Health reached zero; the block must be removed.
    Destroyed,
}

/// Health ledger keyed by world position.
#[derive(Debug, Default)]
pub struct DamageTracker {
    health: FxHashMap<BlockPos, u32>,
}

impl DamageTracker {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `amount` damage to the block `id` currently stored at `pos`.
    pub fn damage(
        &mut self,
        pos: BlockPos,
        id: BlockTypeId,
        amount: u32,
        registry: &BlockRegistry,
    ) -> DamageOutcome {
        if id.is_air() {
            return DamageOutcome::Rejected(DamageRejection::Empty);
        }
        let block = registry.get(id);
        if !block.health.is_damageable() {
            return DamageOutcome::Rejected(DamageRejection::Undamageable);
        }
        if amount == 0 {
            return DamageOutcome::Rejected(DamageRejection::ZeroDamage);
        }
        if !block.health.tracks_health() {
            // OneHit: any positive damage destroys, no ledger entry.
            self.health.remove(&pos);
            return DamageOutcome::Destroyed;
        }

        let entry = self
            .health
            .entry(pos)
            .or_insert_with(|| block.health.max_health());
        *entry = entry.saturating_sub(amount);
        let remaining = *entry;
        if remaining == 0 {
            self.health.remove(&pos);
            tracing::trace!("block at {pos:?} destroyed");
            DamageOutcome::Destroyed
        } else {
            DamageOutcome::Damaged { remaining }
        }
    }

    /// Applies a host-confirmed non-lethal delta.
    ///
    /// Health is floored at 1: destruction always arrives as an explicit
    /// overwrite. Returns the new remaining health, or `None` when the block
    /// does not keep a ledger entry.
    pub fn apply_remote(
        &mut self,
        pos: BlockPos,
        id: BlockTypeId,
        amount: u32,
        registry: &BlockRegistry,
    ) -> Option<u32> {
        let block = registry.get(id);
        if !block.health.tracks_health() || amount == 0 {
            return None;
        }
        let entry = self
            .health
            .entry(pos)
            .or_insert_with(|| block.health.max_health());
        *entry = entry.saturating_sub(amount).max(1);
        Some(*entry)
    }

    /// Remaining health at `pos`, if the block has been hit.
    pub fn remaining(&self, pos: BlockPos) -> Option<u32> {
        self.health.get(&pos).copied()
    }

    /// Drops the entry at `pos`, e.g. when the block is overwritten.
    pub fn forget(&mut self, pos: BlockPos) {
        self.health.remove(&pos);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.health.clear();
    }

    /// Number of damaged blocks.
    pub fn len(&self) -> usize {
        self.health.len()
    }

    /// Returns `true` when no block is damaged.
    pub fn is_empty(&self) -> bool {
        self.health.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        registry: BlockRegistry,
        tracker: DamageTracker,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: BlockRegistry::standard(),
                tracker: DamageTracker::new(),
            }
        }

        fn id(&self, name: &str) -> BlockTypeId {
            self.registry.lookup_by_name(name).unwrap()
        }

        fn hit(&mut self, pos: BlockPos, name: &str, amount: u32) -> DamageOutcome {
            let id = self.id(name);
            self.tracker.damage(pos, id, amount, &self.registry)
        }

        fn remote(&mut self, pos: BlockPos, name: &str, amount: u32) -> Option<u32> {
            let id = self.id(name);
            self.tracker.apply_remote(pos, id, amount, &self.registry)
        }
    }

    #[test]
    fn test_medium_block_destroyed_on_third_hit() {
        let mut f = Fixture::new();
        let pos = BlockPos::new(3, 4, 5);

        assert_eq!(f.hit(pos, "stone", 30), DamageOutcome::Damaged { remaining: 55 });
        assert_eq!(f.hit(pos, "stone", 30), DamageOutcome::Damaged { remaining: 25 });
        assert_eq!(f.hit(pos, "stone", 30), DamageOutcome::Destroyed);
        assert_eq!(f.tracker.remaining(pos), None);
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_low_block_overkill_floors_at_zero() {
        let mut f = Fixture::new();
        let pos = BlockPos::new(0, 0, 0);
        f.hit(BlockPos::new(1, 0, 0), "dirt", 10);

        assert_eq!(f.hit(pos, "dirt", 60), DamageOutcome::Destroyed);
        assert_eq!(f.tracker.remaining(pos), None);
        // Neighbour untouched.
        assert_eq!(f.tracker.remaining(BlockPos::new(1, 0, 0)), Some(40));
    }

    #[test]
    fn test_undamageable_classes_reject() {
        let mut f = Fixture::new();
        let pos = BlockPos::new(0, 0, 0);
        for name in ["barrier", "bedrock"] {
            assert_eq!(
                f.hit(pos, name, u32::MAX),
                DamageOutcome::Rejected(DamageRejection::Undamageable)
            );
        }
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_one_hit_destroyed_without_ledger_entry() {
        let mut f = Fixture::new();
        assert_eq!(f.hit(BlockPos::new(2, 2, 2), "glass", 1), DamageOutcome::Destroyed);
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_zero_damage_rejected() {
        let mut f = Fixture::new();
        assert_eq!(
            f.hit(BlockPos::new(0, 0, 0), "stone", 0),
            DamageOutcome::Rejected(DamageRejection::ZeroDamage)
        );
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_air_rejected_as_empty() {
        let mut f = Fixture::new();
        assert_eq!(
            f.tracker
                .damage(BlockPos::new(0, 0, 0), BlockTypeId::AIR, 5, &f.registry),
            DamageOutcome::Rejected(DamageRejection::Empty)
        );
    }

    #[test]
    fn test_apply_remote_never_destroys() {
        let mut f = Fixture::new();
        let pos = BlockPos::new(-4, 1, 9);
        assert_eq!(f.remote(pos, "brick", 100), Some(40));
        assert_eq!(f.remote(pos, "brick", 100), Some(1));
        assert_eq!(f.tracker.remaining(pos), Some(1));
    }

    #[test]
    fn test_apply_remote_ignores_untracked_classes() {
        let mut f = Fixture::new();
        assert_eq!(f.remote(BlockPos::new(0, 0, 0), "glass", 5), None);
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_forget_and_clear() {
        let mut f = Fixture::new();
        f.hit(BlockPos::new(0, 0, 0), "stone", 1);
        f.hit(BlockPos::new(1, 0, 0), "stone", 1);
        f.tracker.forget(BlockPos::new(0, 0, 0));
        assert_eq!(f.tracker.len(), 1);
        f.tracker.clear();
        assert!(f.tracker.is_empty());
    }
}
