//! The authoritative side of edit replication.
//!
//! [`EditHost`] owns the canonical world. Requests from peers (and from
//! players on the host itself) are validated, applied to the host world, and
//! then broadcast with a fresh sequence number. Everything the host wants to
//! send is queued as [`Outgoing`] and drained by the transport once per tick.

use std::collections::BTreeMap;

use breach_net::{BlockDamage, BlockEdit, DamageRequest, EditRequest, Message, PeerId, Welcome};
use breach_voxel::{BlockPos, BlockTypeId, DamageOutcome, DamageRejection, EditRecord};
use breach_world::{StreamReport, VoxelWorld};
use glam::Vec3;

use crate::snapshot::encode_map_status;
use crate::validation::{EditRejection, EditRules, validate_damage, validate_edit};

/// Who an outgoing message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// One peer.
    Peer(PeerId),
    /// Every connected peer.
    All,
}

/// A message waiting for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    /// Destination.
    pub to: Recipient,
    /// Payload.
    pub message: Message,
}

#[derive(Debug, Default)]
struct PeerInfo {
    name: Option<String>,
    position: Option<Vec3>,
}

/// What an accepted request did to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The block was overwritten (placement, removal, or destruction).
    Edit(EditRecord),
    /// The block took non-lethal damage.
    Damage {
        /// Target.
        pos: BlockPos,
        /// Health left.
        remaining: u32,
    },
}

/// Authoritative edit host.
pub struct EditHost {
    world: VoxelWorld,
    rules: EditRules,
    last_seq: u64,
    peers: BTreeMap<PeerId, PeerInfo>,
    outbox: Vec<Outgoing>,
}

impl EditHost {
    /// Wraps the canonical world.
    pub fn new(world: VoxelWorld, rules: EditRules) -> Self {
        Self {
            world,
            rules,
            last_seq: 0,
            peers: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    /// The canonical world.
    pub fn world(&self) -> &VoxelWorld {
        &self.world
    }

    /// Mutable world access for streaming (observers, shutdown).
    pub fn world_mut(&mut self) -> &mut VoxelWorld {
        &mut self.world
    }

    /// Sequence number of the last broadcast.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Number of joined peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Display name a peer gave in its join request.
    pub fn peer_name(&self, peer: PeerId) -> Option<&str> {
        self.peers.get(&peer)?.name.as_deref()
    }

    /// Registers a new peer and queues its welcome and a full snapshot.
    pub fn peer_joined(&mut self, peer: PeerId) {
        self.peers.entry(peer).or_default();
        self.outbox.push(Outgoing {
            to: Recipient::Peer(peer),
            message: Message::Welcome(Welcome { peer_id: peer.0 }),
        });
        self.queue_snapshot(peer);
        tracing::info!("Peer {peer:?} joined, {} connected", self.peers.len());
    }

    /// Forgets a peer.
    pub fn peer_left(&mut self, peer: PeerId) {
        if self.peers.remove(&peer).is_some() {
            tracing::info!("Peer {peer:?} left, {} connected", self.peers.len());
        }
    }

    /// Handles one message from a peer.
    ///
    /// # Errors
    ///
    /// Returns the rejection for refused requests. Rejections are not sent
    /// back to the peer.
    pub fn handle_message(
        &mut self,
        peer: PeerId,
        message: Message,
    ) -> Result<Option<Applied>, EditRejection> {
        tracing::trace!("Peer {peer:?} sent {message:?}");
        match message {
            Message::JoinRequest(join) => {
                tracing::info!("Peer {peer:?} is {:?}", join.player_name);
                self.peers.entry(peer).or_default().name = Some(join.player_name);
                Ok(None)
            }
            Message::PlayerPosition(p) => {
                self.peers.entry(peer).or_default().position = Some(Vec3::new(p.x, p.y, p.z));
                Ok(None)
            }
            Message::ResyncRequest => {
                tracing::info!("Peer {peer:?} requested a resync");
                self.queue_snapshot(peer);
                Ok(None)
            }
            Message::EditRequest(EditRequest { x, y, z, block_id }) => {
                let requester = self.position_of(peer);
                let result =
                    self.request_edit(BlockPos::from_wire(x, y, z), BlockTypeId(block_id), requester);
                log_rejection(peer, result).map(Some)
            }
            Message::DamageRequest(DamageRequest { x, y, z, damage }) => {
                let requester = self.position_of(peer);
                let result = self.request_damage(BlockPos::from_wire(x, y, z), damage, requester);
                log_rejection(peer, result).map(Some)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(None),
            other => {
                tracing::warn!("Peer {peer:?} sent host-only message {other:?}, ignoring");
                Ok(None)
            }
        }
    }

    /// Validates and applies an overwrite, then broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns the [`EditRejection`] if the request is refused.
    pub fn request_edit(
        &mut self,
        pos: BlockPos,
        block: BlockTypeId,
        requester: Option<Vec3>,
    ) -> Result<Applied, EditRejection> {
        validate_edit(&self.world, &self.rules, requester, pos, block)?;
        let record = EditRecord::new(pos, block);
        self.commit_edit(record)?;
        Ok(Applied::Edit(record))
    }

    /// Validates and applies a hit, then broadcasts the result: lethal hits
    /// as an air overwrite, non-lethal ones as a damage delta.
    ///
    /// # Errors
    ///
    /// Returns the [`EditRejection`] if the request is refused.
    pub fn request_damage(
        &mut self,
        pos: BlockPos,
        amount: u32,
        requester: Option<Vec3>,
    ) -> Result<Applied, EditRejection> {
        validate_damage(&self.world, &self.rules, requester, pos, amount)?;
        let (x, y, z) = pos.to_wire().ok_or(EditRejection::OutOfWireRange(pos))?;

        match self.world.damage_block(pos, amount) {
            DamageOutcome::Destroyed => {
                let record = EditRecord::new(pos, BlockTypeId::AIR);
                self.broadcast_edit(record)?;
                Ok(Applied::Edit(record))
            }
            DamageOutcome::Damaged { remaining } => {
                self.last_seq += 1;
                self.outbox.push(Outgoing {
                    to: Recipient::All,
                    message: Message::BlockDamage(BlockDamage {
                        seq: self.last_seq,
                        x,
                        y,
                        z,
                        damage: amount,
                    }),
                });
                Ok(Applied::Damage { pos, remaining })
            }
            DamageOutcome::Rejected(reason) => Err(match reason {
                DamageRejection::Undamageable => EditRejection::Undamageable,
                DamageRejection::ZeroDamage => EditRejection::ZeroDamage,
                DamageRejection::Empty => EditRejection::AlreadyEmpty,
            }),
        }
    }

    /// Advances streaming on the host world.
    pub fn tick(&mut self) -> StreamReport {
        self.world.tick()
    }

    /// Takes everything queued since the last drain, in order.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    fn commit_edit(&mut self, record: EditRecord) -> Result<(), EditRejection> {
        if !record.pos.fits_wire() {
            return Err(EditRejection::OutOfWireRange(record.pos));
        }
        self.world.apply_edit(record);
        self.broadcast_edit(record)
    }

    /// Broadcasts an edit already applied to the host world.
    fn broadcast_edit(&mut self, record: EditRecord) -> Result<(), EditRejection> {
        let (x, y, z) = record
            .pos
            .to_wire()
            .ok_or(EditRejection::OutOfWireRange(record.pos))?;
        self.last_seq += 1;
        self.outbox.push(Outgoing {
            to: Recipient::All,
            message: Message::BlockEdit(BlockEdit {
                seq: self.last_seq,
                x,
                y,
                z,
                block_id: record.block.0,
            }),
        });
        Ok(())
    }

    fn queue_snapshot(&mut self, peer: PeerId) {
        match encode_map_status(self.world.edits().records(), self.last_seq) {
            Ok(status) => {
                tracing::info!(
                    "Sending snapshot of {} edits (seq {}) to {peer:?}",
                    status.ids.len(),
                    status.last_seq
                );
                self.outbox.push(Outgoing {
                    to: Recipient::Peer(peer),
                    message: Message::MapStatus(status),
                });
            }
            Err(e) => tracing::error!("Cannot snapshot the edit log for {peer:?}: {e}"),
        }
    }

    fn position_of(&self, peer: PeerId) -> Option<Vec3> {
        self.peers.get(&peer)?.position
    }
}

fn log_rejection(
    peer: PeerId,
    result: Result<Applied, EditRejection>,
) -> Result<Applied, EditRejection> {
    if let Err(reason) = &result {
        tracing::debug!("Rejected request from {peer:?}: {reason}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use breach_net::{JoinRequest, MapStatus, PlayerPosition};
    use breach_voxel::BlockRegistry;
    use breach_world::{FlatBaseline, NullSink, StreamerConfig};
    use std::sync::Arc;

    fn host() -> EditHost {
        let registry = Arc::new(BlockRegistry::standard());
        let baseline = Box::new(FlatBaseline::from_registry(&registry, 8));
        let world = VoxelWorld::new(
            registry,
            baseline,
            Box::new(NullSink::default()),
            StreamerConfig::default(),
        );
        EditHost::new(world, EditRules::default())
    }

    fn id(host: &EditHost, name: &str) -> BlockTypeId {
        host.world().registry().lookup_by_name(name).unwrap()
    }

    fn edit_request(x: i16, y: i16, z: i16, block_id: u8) -> Message {
        Message::EditRequest(EditRequest { x, y, z, block_id })
    }

    #[test]
    fn test_join_queues_welcome_then_snapshot() {
        let mut host = host();
        host.request_edit(BlockPos::new(0, 20, 0), id(&host, "brick"), None)
            .unwrap();
        host.drain();

        host.peer_joined(PeerId(7));
        let out = host.drain();
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            Outgoing {
                to: Recipient::Peer(PeerId(7)),
                message: Message::Welcome(Welcome { peer_id: 7 }),
            }
        );
        assert_eq!(
            out[1].message,
            Message::MapStatus(MapStatus {
                last_seq: 1,
                xs: vec![0],
                ys: vec![20],
                zs: vec![0],
                ids: vec![6],
            })
        );
        assert_eq!(host.peer_count(), 1);
    }

    #[test]
    fn test_accepted_edit_is_applied_then_broadcast() {
        let mut host = host();
        host.peer_joined(PeerId(1));
        host.drain();

        let applied = host
            .handle_message(PeerId(1), edit_request(2, 20, 2, 6))
            .unwrap();
        assert!(matches!(applied, Some(Applied::Edit(_))));
        assert_eq!(host.world().block_at(BlockPos::new(2, 20, 2)), BlockTypeId(6));
        assert_eq!(
            host.drain(),
            vec![Outgoing {
                to: Recipient::All,
                message: Message::BlockEdit(BlockEdit {
                    seq: 1,
                    x: 2,
                    y: 20,
                    z: 2,
                    block_id: 6,
                }),
            }]
        );
    }

    #[test]
    fn test_rejected_edit_changes_nothing() {
        let mut host = host();
        host.peer_joined(PeerId(1));
        host.drain();

        let result = host.handle_message(PeerId(1), edit_request(0, 3, 0, 6));
        assert_eq!(result, Err(EditRejection::Obstructed));
        assert!(host.drain().is_empty());
        assert_eq!(host.last_seq(), 0);
        assert!(host.world().edits().is_empty());
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut host = host();
        let brick = id(&host, "brick");
        host.request_edit(BlockPos::new(0, 20, 0), brick, None).unwrap();
        host.request_edit(BlockPos::new(0, 20, 0), BlockTypeId::AIR, None)
            .unwrap();
        host.request_damage(BlockPos::new(0, 3, 0), 10, None).unwrap();

        let seqs: Vec<u64> = host
            .drain()
            .iter()
            .filter_map(|out| out.message.seq())
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(host.last_seq(), 3);
    }

    #[test]
    fn test_non_lethal_damage_broadcasts_delta() {
        let mut host = host();
        let pos = BlockPos::new(1, 3, 1);
        assert_eq!(
            host.request_damage(pos, 30, None),
            Ok(Applied::Damage { pos, remaining: 55 })
        );
        assert_eq!(
            host.drain()[0].message,
            Message::BlockDamage(BlockDamage {
                seq: 1,
                x: 1,
                y: 3,
                z: 1,
                damage: 30,
            })
        );
    }

    #[test]
    fn test_lethal_damage_broadcasts_air() {
        let mut host = host();
        let pos = BlockPos::new(1, 5, 1);
        host.request_damage(pos, 60, None).unwrap();
        assert_eq!(host.world().block_at(pos), BlockTypeId::AIR);
        assert_eq!(
            host.drain()[0].message,
            Message::BlockEdit(BlockEdit {
                seq: 1,
                x: 1,
                y: 5,
                z: 1,
                block_id: 0,
            })
        );
        assert_eq!(host.world().edits().get(pos), Some(BlockTypeId::AIR));
    }

    #[test]
    fn test_reach_uses_reported_position() {
        let mut host = host();
        host.peer_joined(PeerId(3));
        host.drain();
        host.handle_message(
            PeerId(3),
            Message::PlayerPosition(PlayerPosition {
                x: 100.0,
                y: 10.0,
                z: 100.0,
            }),
        )
        .unwrap();

        let result = host.handle_message(PeerId(3), edit_request(0, 20, 0, 6));
        assert!(matches!(result, Err(EditRejection::OutOfReach { .. })));

        let result = host.handle_message(PeerId(3), edit_request(100, 10, 100, 6));
        assert!(result.is_ok());
    }

    #[test]
    fn test_resync_request_sends_fresh_snapshot() {
        let mut host = host();
        host.peer_joined(PeerId(2));
        host.request_edit(BlockPos::new(5, 20, 5), id(&host, "sand"), None)
            .unwrap();
        host.drain();

        host.handle_message(PeerId(2), Message::ResyncRequest).unwrap();
        let out = host.drain();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipient::Peer(PeerId(2)));
        let Message::MapStatus(status) = &out[0].message else {
            panic!("expected MapStatus");
        };
        assert_eq!(status.last_seq, 1);
        assert_eq!(status.ids, vec![5]);
    }

    #[test]
    fn test_join_request_records_name() {
        let mut host = host();
        host.peer_joined(PeerId(4));
        host.handle_message(
            PeerId(4),
            Message::JoinRequest(JoinRequest {
                player_name: "Rin".to_string(),
            }),
        )
        .unwrap();
        assert_eq!(host.peer_name(PeerId(4)), Some("Rin"));

        host.peer_left(PeerId(4));
        assert_eq!(host.peer_count(), 0);
        assert_eq!(host.peer_name(PeerId(4)), None);
    }

    #[test]
    fn test_host_only_messages_ignored() {
        let mut host = host();
        let bogus = Message::BlockEdit(BlockEdit {
            seq: 99,
            x: 0,
            y: 3,
            z: 0,
            block_id: 0,
        });
        assert_eq!(host.handle_message(PeerId(1), bogus), Ok(None));
        assert_eq!(host.world().block_at(BlockPos::new(0, 3, 0)), BlockTypeId(1));
        assert!(host.drain().is_empty());
    }
}
