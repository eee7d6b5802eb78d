//! `MapStatus` codec: the edit history as four parallel columns.
//!
//! Record `i` is `(xs[i], ys[i], zs[i], ids[i])`. Order is preserved both
//! ways, so replaying a decoded snapshot under last-write-wins yields the
//! same grid as the history it was built from.

use breach_net::MapStatus;
use breach_voxel::{BlockPos, BlockRegistry, BlockTypeId, EditRecord};

/// Reasons a snapshot cannot be built or accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// A record's coordinate does not fit in `i16` per axis.
    #[error("record {index} at {pos:?} is outside the wire range")]
    OutOfRange {
        /// Record index.
        index: usize,
        /// Offending coordinate.
        pos: BlockPos,
    },

    /// The four columns have different lengths.
    #[error("ragged columns: xs={xs} ys={ys} zs={zs} ids={ids}")]
    RaggedColumns {
        /// Length of `xs`.
        xs: usize,
        /// Length of `ys`.
        ys: usize,
        /// Length of `zs`.
        zs: usize,
        /// Length of `ids`.
        ids: usize,
    },

    /// A record names a block type this process does not know.
    #[error("record {index} has unknown block id {id}")]
    UnknownBlock {
        /// Record index.
        index: usize,
        /// Offending id.
        id: u8,
    },
}

/// Packs `records` into a snapshot tagged with `last_seq`.
///
/// # Errors
///
/// [`SnapshotError::OutOfRange`] if any coordinate overflows `i16`.
pub fn encode_map_status(records: &[EditRecord], last_seq: u64) -> Result<MapStatus, SnapshotError> {
    let mut status = MapStatus {
        last_seq,
        xs: Vec::with_capacity(records.len()),
        ys: Vec::with_capacity(records.len()),
        zs: Vec::with_capacity(records.len()),
        ids: Vec::with_capacity(records.len()),
    };

    for (index, record) in records.iter().enumerate() {
        let (x, y, z) = record
            .pos
            .to_wire()
            .ok_or(SnapshotError::OutOfRange {
                index,
                pos: record.pos,
            })?;
        status.xs.push(x);
        status.ys.push(y);
        status.zs.push(z);
        status.ids.push(record.block.0);
    }

    Ok(status)
}

/// Unpacks a snapshot into records, in order.
///
/// # Errors
///
/// [`SnapshotError::RaggedColumns`] if the columns disagree in length.
pub fn decode_map_status(status: &MapStatus) -> Result<Vec<EditRecord>, SnapshotError> {
    let len = status.xs.len();
    if status.ys.len() != len || status.zs.len() != len || status.ids.len() != len {
        return Err(SnapshotError::RaggedColumns {
            xs: status.xs.len(),
            ys: status.ys.len(),
            zs: status.zs.len(),
            ids: status.ids.len(),
        });
    }

    let records = status
        .xs
        .iter()
        .zip(&status.ys)
        .zip(&status.zs)
        .zip(&status.ids)
        .map(|(((&x, &y), &z), &id)| EditRecord::new(BlockPos::from_wire(x, y, z), BlockTypeId(id)))
        .collect();
    Ok(records)
}

/// Checks every record's block id against `registry`.
///
/// # Errors
///
/// [`SnapshotError::UnknownBlock`] for the first unregistered id.
pub fn check_known_blocks(
    records: &[EditRecord],
    registry: &BlockRegistry,
) -> Result<(), SnapshotError> {
    match records
        .iter()
        .position(|record| !registry.contains(record.block))
    {
        Some(index) => Err(SnapshotError::UnknownBlock {
            index,
            id: records[index].block.0,
        }),
        None => Ok(()),
    }
}
