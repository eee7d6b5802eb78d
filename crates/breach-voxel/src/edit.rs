//! Edit records and the compacted edit history.
//!
//! Every process keeps an [`EditLog`]: the host's is canonical, peers mirror
//! it from snapshots and incremental broadcasts. Edits are idempotent and
//! last-write-wins, so the log stores at most one record per coordinate. A
//! later write to the same block replaces the value in place. Records that
//! write air are kept because they override the baseline.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::block::BlockTypeId;
use crate::coords::{BlockPos, RegionCoord};

/// One block overwrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditRecord {
    /// Target block.
    pub pos: BlockPos,
    /// New block type (air removes).
    pub block: BlockTypeId,
}

impl EditRecord {
    /// Creates an edit record.
    pub const fn new(pos: BlockPos, block: BlockTypeId) -> Self {
        Self { pos, block }
    }
}

/// Compacted, region-indexed edit history.
#[derive(Clone, Debug, Default)]
pub struct EditLog {
    records: Vec<EditRecord>,
    by_pos: FxHashMap<BlockPos, usize>,
    by_region: FxHashMap<RegionCoord, Vec<usize>>,
}

impl EditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log by applying `records` in order.
    pub fn from_records(records: impl IntoIterator<Item = EditRecord>) -> Self {
        let mut log = Self::new();
        for record in records {
            log.apply(record);
        }
        log
    }

    /// Records an edit. Returns `true` if the logged value for that
    /// coordinate changed.
    pub fn apply(&mut self, record: EditRecord) -> bool {
        if let Some(&index) = self.by_pos.get(&record.pos) {
            let slot = &mut self.records[index];
            let changed = slot.block != record.block;
            slot.block = record.block;
            return changed;
        }
        let index = self.records.len();
        self.records.push(record);
        self.by_pos.insert(record.pos, index);
        self.by_region
            .entry(record.pos.region())
            .or_default()
            .push(index);
        true
    }

    /// Latest logged value at `pos`, if it was ever edited.
    pub fn get(&self, pos: BlockPos) -> Option<BlockTypeId> {
        self.by_pos.get(&pos).map(|&i| self.records[i].block)
    }

    /// All records, ordered by the first edit of each coordinate.
    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    /// Records whose coordinate lies in `region`.
    pub fn records_in(&self, region: RegionCoord) -> impl Iterator<Item = EditRecord> + '_ {
        self.by_region
            .get(&region)
            .into_iter()
            .flatten()
            .map(|&i| self.records[i])
    }

    /// Regions touched by at least one record.
    pub fn regions(&self) -> impl Iterator<Item = RegionCoord> + '_ {
        self.by_region.keys().copied()
    }

    /// Number of distinct edited coordinates.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was edited.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forgets all history.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_pos.clear();
        self.by_region.clear();
    }

    /// Replaces the history wholesale, e.g. with a decoded snapshot.
    pub fn replace(&mut self, records: impl IntoIterator<Item = EditRecord>) {
        *self = Self::from_records(records);
    }
}
