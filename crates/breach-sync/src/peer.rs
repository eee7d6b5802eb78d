//! The replicating side of edit synchronization.
//!
//! An [`EditPeer`] never edits its world on its own. It asks the host, then
//! applies whatever the host broadcasts. Incoming messages are queued by
//! [`EditPeer::receive`] and applied in arrival order by [`EditPeer::tick`],
//! which also re-meshes whatever the batch touched.
//!
//! Phases:
//!
//! ```text
//! Idle --join--> AwaitingSnapshot --MapStatus--> Live --seq gap--> Desynced
//!                                                 ^                    |
//!                                                 +-----MapStatus------+
//! ```

use std::collections::VecDeque;

use breach_net::{DamageRequest, EditRequest, JoinRequest, MapStatus, Message, PlayerPosition};
use breach_voxel::{BlockPos, BlockTypeId, EditRecord};
use breach_world::{ObserverId, StreamReport, VoxelWorld};
use glam::Vec3;

use crate::snapshot::{SnapshotError, check_known_blocks, decode_map_status};
use crate::validation::{EditRejection, EditRules, validate_damage, validate_edit};

/// Observer slot used for the local player.
const LOCAL_OBSERVER: ObserverId = ObserverId(0);

/// Where the peer is in the join/replicate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not joined.
    Idle,
    /// Joined; incremental traffic is buffered until the snapshot lands.
    AwaitingSnapshot,
    /// Applying incremental traffic in sequence.
    Live,
    /// A sequence gap was seen; waiting for a fresh snapshot.
    Desynced,
}

/// What a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Overwrite with this block.
    Edit(BlockTypeId),
    /// Hit for this much damage.
    Damage(u32),
}

/// A request sent to the host and not yet answered by a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    /// Target coordinate.
    pub pos: BlockPos,
    /// Requested change.
    pub kind: RequestKind,
}

/// Something [`EditPeer::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The host assigned this peer an id.
    Welcomed(u64),
    /// A snapshot replaced the local edit history.
    SnapshotApplied {
        /// Records in the snapshot.
        records: usize,
        /// Sequence number it was taken at.
        last_seq: u64,
    },
    /// A snapshot was malformed and discarded.
    SnapshotRejected(SnapshotError),
    /// A confirmed overwrite was applied.
    EditApplied(EditRecord),
    /// A confirmed damage delta was applied.
    DamageApplied {
        /// Target.
        pos: BlockPos,
        /// Health left, if the block keeps a ledger entry.
        remaining: Option<u32>,
    },
    /// Incremental traffic skipped a sequence number.
    GapDetected {
        /// Sequence number that should have arrived.
        expected: u64,
        /// Sequence number that did.
        received: u64,
    },
    /// A broadcast touching a pending request's coordinate was applied.
    Resolved(PendingRequest),
    /// A snapshot replaced history before the request was answered.
    Abandoned(PendingRequest),
}

/// Replicating edit peer.
pub struct EditPeer {
    world: VoxelWorld,
    rules: EditRules,
    phase: SyncPhase,
    peer_id: Option<u64>,
    last_seq: u64,
    position: Option<Vec3>,
    inbound: VecDeque<Message>,
    buffered: Vec<Message>,
    outbox: Vec<Message>,
    pending: Vec<PendingRequest>,
    events: Vec<SyncEvent>,
}

impl EditPeer {
    /// Wraps a local world replica.
    pub fn new(world: VoxelWorld, rules: EditRules) -> Self {
        Self {
            world,
            rules,
            phase: SyncPhase::Idle,
            peer_id: None,
            last_seq: 0,
            position: None,
            inbound: VecDeque::new(),
            buffered: Vec::new(),
            outbox: Vec::new(),
            pending: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The local replica.
    pub fn world(&self) -> &VoxelWorld {
        &self.world
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Id assigned by the host, once welcomed.
    pub fn peer_id(&self) -> Option<u64> {
        self.peer_id
    }

    /// Sequence number of the last applied broadcast.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Requests still waiting for a broadcast.
    pub fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    /// Sends a join request and waits for the snapshot.
    pub fn join(&mut self, player_name: impl Into<String>) {
        self.phase = SyncPhase::AwaitingSnapshot;
        self.last_seq = 0;
        self.buffered.clear();
        self.outbox.push(Message::JoinRequest(JoinRequest {
            player_name: player_name.into(),
        }));
    }

    /// Drops back to [`SyncPhase::Idle`] and releases loaded regions.
    pub fn leave(&mut self) {
        self.phase = SyncPhase::Idle;
        self.peer_id = None;
        self.inbound.clear();
        self.buffered.clear();
        self.pending.clear();
        self.world.shutdown();
    }

    /// Moves the local player. The position feeds streaming, local reach
    /// checks, and the host's reach checks.
    pub fn update_position(&mut self, position: Vec3) -> StreamReport {
        self.position = Some(position);
        self.outbox.push(Message::PlayerPosition(PlayerPosition {
            x: position.x,
            y: position.y,
            z: position.z,
        }));
        self.world.update_observer(LOCAL_OBSERVER, position)
    }

    /// Queues a message from the host.
    pub fn receive(&mut self, message: Message) {
        self.inbound.push_back(message);
    }

    /// Applies queued messages in arrival order, then continues streaming
    /// and re-meshes touched regions.
    pub fn tick(&mut self) -> Vec<SyncEvent> {
        while let Some(message) = self.inbound.pop_front() {
            self.apply(message);
        }
        self.world.tick();
        std::mem::take(&mut self.events)
    }

    /// Asks the host to overwrite `pos` with `block`.
    ///
    /// # Errors
    ///
    /// Returns the local [`EditRejection`]; nothing is sent in that case.
    pub fn request_edit(
        &mut self,
        pos: BlockPos,
        block: BlockTypeId,
    ) -> Result<PendingRequest, EditRejection> {
        self.ensure_live()?;
        validate_edit(&self.world, &self.rules, self.position, pos, block)
            .inspect_err(|reason| tracing::debug!("Edit at {pos:?} refused locally: {reason}"))?;
        let (x, y, z) = pos.to_wire().ok_or(EditRejection::OutOfWireRange(pos))?;

        self.outbox.push(Message::EditRequest(EditRequest {
            x,
            y,
            z,
            block_id: block.0,
        }));
        Ok(self.track(pos, RequestKind::Edit(block)))
    }

    /// Asks the host to hit `pos` for `amount`.
    ///
    /// # Errors
    ///
    /// Returns the local [`EditRejection`]; nothing is sent in that case.
    pub fn request_damage(
        &mut self,
        pos: BlockPos,
        amount: u32,
    ) -> Result<PendingRequest, EditRejection> {
        self.ensure_live()?;
        validate_damage(&self.world, &self.rules, self.position, pos, amount)
            .inspect_err(|reason| tracing::debug!("Damage at {pos:?} refused locally: {reason}"))?;
        let (x, y, z) = pos.to_wire().ok_or(EditRejection::OutOfWireRange(pos))?;

        self.outbox.push(Message::DamageRequest(DamageRequest {
            x,
            y,
            z,
            damage: amount,
        }));
        Ok(self.track(pos, RequestKind::Damage(amount)))
    }

    /// Takes everything queued for the host, in order.
    pub fn drain_outgoing(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    fn ensure_live(&self) -> Result<(), EditRejection> {
        if self.phase == SyncPhase::Live {
            Ok(())
        } else {
            Err(EditRejection::NotSynced)
        }
    }

    fn track(&mut self, pos: BlockPos, kind: RequestKind) -> PendingRequest {
        let request = PendingRequest { pos, kind };
        self.pending.push(request);
        request
    }

    fn apply(&mut self, message: Message) {
        match message {
            Message::Welcome(welcome) => {
                tracing::info!("Welcomed by host as peer {}", welcome.peer_id);
                self.peer_id = Some(welcome.peer_id);
                self.events.push(SyncEvent::Welcomed(welcome.peer_id));
            }
            Message::MapStatus(status) => self.apply_snapshot(&status),
            message @ (Message::BlockEdit(_) | Message::BlockDamage(_)) => {
                self.apply_incremental(message);
            }
            other => tracing::trace!("Ignoring {other:?} from host"),
        }
    }

    fn apply_snapshot(&mut self, status: &MapStatus) {
        let decoded = decode_map_status(status)
            .and_then(|records| check_known_blocks(&records, self.world.registry()).map(|()| records));
        let records = match decoded {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Discarding snapshot at seq {}: {e}", status.last_seq);
                self.events.push(SyncEvent::SnapshotRejected(e));
                return;
            }
        };

        let count = records.len();
        self.world.replace_edits(records);
        self.last_seq = status.last_seq;
        self.phase = SyncPhase::Live;
        self.events
            .extend(self.pending.drain(..).map(SyncEvent::Abandoned));
        self.events.push(SyncEvent::SnapshotApplied {
            records: count,
            last_seq: status.last_seq,
        });
        tracing::info!("Applied snapshot of {count} edits at seq {}", status.last_seq);

        for message in std::mem::take(&mut self.buffered) {
            self.apply_incremental(message);
        }
    }

    fn apply_incremental(&mut self, message: Message) {
        let Some(seq) = message.seq() else {
            return;
        };

        match self.phase {
            SyncPhase::Idle => tracing::debug!("Ignoring seq {seq} while not joined"),
            SyncPhase::AwaitingSnapshot => self.buffered.push(message),
            SyncPhase::Desynced => tracing::trace!("Dropping seq {seq} while desynced"),
            SyncPhase::Live => {
                if seq <= self.last_seq {
                    tracing::trace!("Skipping seq {seq}, already at {}", self.last_seq);
                    return;
                }
                let expected = self.last_seq + 1;
                if seq != expected {
                    tracing::warn!("Sequence gap: expected {expected}, got {seq}; requesting resync");
                    self.phase = SyncPhase::Desynced;
                    self.outbox.push(Message::ResyncRequest);
                    self.events.push(SyncEvent::GapDetected {
                        expected,
                        received: seq,
                    });
                    return;
                }
                self.last_seq = seq;
                self.apply_confirmed(message);
            }
        }
    }

    fn apply_confirmed(&mut self, message: Message) {
        match message {
            Message::BlockEdit(edit) => {
                let record = EditRecord::new(
                    BlockPos::from_wire(edit.x, edit.y, edit.z),
                    BlockTypeId(edit.block_id),
                );
                if !self.world.registry().contains(record.block) {
                    tracing::warn!("Host sent unknown block id {} at seq {}", edit.block_id, edit.seq);
                    return;
                }
                self.world.apply_edit(record);
                self.events.push(SyncEvent::EditApplied(record));
                self.resolve(record.pos);
            }
            Message::BlockDamage(damage) => {
                let pos = BlockPos::from_wire(damage.x, damage.y, damage.z);
                let remaining = self.world.apply_remote_damage(pos, damage.damage);
                self.events.push(SyncEvent::DamageApplied { pos, remaining });
                self.resolve(pos);
            }
            _ => {}
        }
    }

    fn resolve(&mut self, pos: BlockPos) {
        let (resolved, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|request| request.pos == pos);
        self.pending = waiting;
        self.events
            .extend(resolved.into_iter().map(SyncEvent::Resolved));
    }
}
