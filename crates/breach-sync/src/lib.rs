//! Host-authoritative edit replication.
//!
//! One [`EditHost`] owns the canonical edit history. Every [`EditPeer`] joins,
//! receives a [`MapStatus`](breach_net::MapStatus) snapshot, and from then on
//! applies the host's sequenced `BlockEdit` / `BlockDamage` broadcasts. A gap
//! in the sequence sends the peer back for a fresh snapshot.

pub mod host;
pub mod peer;
pub mod snapshot;
pub mod validation;

pub use host::{Applied, EditHost, Outgoing, Recipient};
pub use peer::{EditPeer, PendingRequest, RequestKind, SyncEvent, SyncPhase};
pub use snapshot::{SnapshotError, check_known_blocks, decode_map_status, encode_map_status};
pub use validation::{EditRejection, EditRules, validate_damage, validate_edit};
