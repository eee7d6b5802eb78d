//! Network message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding.
//!
//! Block coordinates travel as `i16` per axis; the edit layer rejects
//! anything that does not fit before it reaches this module.

use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level network message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    // --- Session ---
    /// Peer asks to join the host's world.
    JoinRequest(JoinRequest),
    /// Host confirms the join with the peer's assigned id.
    Welcome(Welcome),

    // --- Host broadcasts ---
    /// A confirmed block overwrite.
    BlockEdit(BlockEdit),
    /// A confirmed non-lethal hit.
    BlockDamage(BlockDamage),
    /// Full edit-history snapshot in columnar form.
    MapStatus(MapStatus),

    // --- Peer requests ---
    /// Peer asks the host to overwrite a block.
    EditRequest(EditRequest),
    /// Peer asks the host to damage a block.
    DamageRequest(DamageRequest),
    /// Peer detected a sequence gap and needs a fresh snapshot.
    ResyncRequest,
    /// Peer reports its observer position (used for reach checks).
    PlayerPosition(PlayerPosition),

    // --- System ---
    /// Heartbeat ping. Sender expects a Pong in response.
    Ping(Ping),
    /// Heartbeat pong. Response to a Ping.
    Pong(Pong),
}

impl Message {
    /// Sequence number of an incremental host broadcast.
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::BlockEdit(edit) => Some(edit.seq),
            Self::BlockDamage(damage) => Some(damage.seq),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Join request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRequest {
    /// Display name of the joining player.
    pub player_name: String,
}

/// Join confirmation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Welcome {
    /// Identifier the host assigned to this peer.
    pub peer_id: u64,
}

/// Confirmed block overwrite. `block_id == 0` removes the block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockEdit {
    /// Host sequence number.
    pub seq: u64,
    /// Block X.
    pub x: i16,
    /// Block Y.
    pub y: i16,
    /// Block Z.
    pub z: i16,
    /// New block type.
    pub block_id: u8,
}

/// Confirmed non-lethal damage delta.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockDamage {
    /// Host sequence number.
    pub seq: u64,
    /// Block X.
    pub x: i16,
    /// Block Y.
    pub y: i16,
    /// Block Z.
    pub z: i16,
    /// Damage applied.
    pub damage: u32,
}

/// Edit-history snapshot. The four columns are parallel: record `i` is
/// `(xs[i], ys[i], zs[i], ids[i])`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapStatus {
    /// Sequence number of the last incremental edit folded in.
    pub last_seq: u64,
    /// X column.
    pub xs: Vec<i16>,
    /// Y column.
    pub ys: Vec<i16>,
    /// Z column.
    pub zs: Vec<i16>,
    /// Block-id column.
    pub ids: Vec<u8>,
}

/// Request to overwrite a block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditRequest {
    /// Block X.
    pub x: i16,
    /// Block Y.
    pub y: i16,
    /// Block Z.
    pub z: i16,
    /// Requested block type (0 removes).
    pub block_id: u8,
}

/// Request to damage a block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DamageRequest {
    /// Block X.
    pub x: i16,
    /// Block Y.
    pub y: i16,
    /// Block Z.
    pub z: i16,
    /// Damage to apply.
    pub damage: u32,
}

/// Observer position in world units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlayerPosition {
    /// World X.
    pub x: f32,
    /// World Y.
    pub y: f32,
    /// World Z.
    pub z: f32,
}

/// Heartbeat ping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ping {
    /// Sender timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Sequence number.
    pub sequence: u32,
}

/// Heartbeat pong (response to [`Ping`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pong {
    /// Echoed timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Echoed sequence number.
    pub sequence: u32,
}

impl From<Ping> for Pong {
    fn from(ping: Ping) -> Self {
        Self {
            timestamp_ms: ping.timestamp_ms,
            sequence: ping.sequence,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
///
/// Returns an error if the version is unsupported or the payload is malformed.
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let Some((&version, body)) = data.split_first() else {
        return Err(MessageError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }

    let msg = postcard::from_bytes(body)?;
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) {
        let bytes = serialize_message(&msg).unwrap();
        let decoded = deserialize_message(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_edit_traffic_roundtrip() {
        roundtrip(Message::BlockEdit(BlockEdit {
            seq: 42,
            x: i16::MIN,
            y: 2,
            z: i16::MAX,
            block_id: 6,
        }));
        roundtrip(Message::BlockDamage(BlockDamage {
            seq: u64::MAX,
            x: -1,
            y: 0,
            z: 1,
            damage: 30,
        }));
        roundtrip(Message::EditRequest(EditRequest {
            x: 1,
            y: 2,
            z: 3,
            block_id: 0,
        }));
        roundtrip(Message::DamageRequest(DamageRequest {
            x: 1,
            y: 2,
            z: 3,
            damage: u32::MAX,
        }));
    }

    #[test]
    fn test_map_status_roundtrip() {
        roundtrip(Message::MapStatus(MapStatus {
            last_seq: 7,
            xs: vec![1, -2, 300],
            ys: vec![0, 0, -300],
            zs: vec![5, 6, 7],
            ids: vec![1, 0, 255],
        }));
        roundtrip(Message::MapStatus(MapStatus::default()));
    }

    #[test]
    fn test_session_and_system_roundtrip() {
        roundtrip(Message::JoinRequest(JoinRequest {
            player_name: "Alice".to_string(),
        }));
        roundtrip(Message::Welcome(Welcome { peer_id: 9 }));
        roundtrip(Message::ResyncRequest);
        roundtrip(Message::PlayerPosition(PlayerPosition {
            x: 1.5,
            y: -2.25,
            z: 1e6,
        }));
        roundtrip(Message::Ping(Ping {
            timestamp_ms: 1234567890,
            sequence: 42,
        }));
        roundtrip(Message::Pong(Pong {
            timestamp_ms: 1234567891,
            sequence: 42,
        }));
    }

    #[test]
    fn test_seq_accessor() {
        let edit = Message::BlockEdit(BlockEdit {
            seq: 3,
            x: 0,
            y: 0,
            z: 0,
            block_id: 1,
        });
        assert_eq!(edit.seq(), Some(3));
        assert_eq!(Message::ResyncRequest.seq(), None);
    }

    #[test]
    fn test_block_edit_is_compact() {
        let msg = Message::BlockEdit(BlockEdit {
            seq: 100,
            x: 10,
            y: 10,
            z: 10,
            block_id: 3,
        });
        let bytes = serialize_message(&msg).unwrap();
        assert!(
            bytes.len() < 12,
            "BlockEdit should be compact, got {} bytes",
            bytes.len()
        );
    }

    #[test]
    fn test_pong_echoes_ping() {
        let ping = Ping {
            timestamp_ms: 55,
            sequence: 4,
        };
        let pong = Pong::from(ping);
        assert_eq!(pong.timestamp_ms, 55);
        assert_eq!(pong.sequence, 4);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = serialize_message(&Message::ResyncRequest).unwrap();
        bytes[0] = 255;
        let result = deserialize_message(&bytes);
        assert!(matches!(result, Err(MessageError::UnsupportedVersion(255))));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let result = deserialize_message(&[]);
        assert!(matches!(result, Err(MessageError::EmptyPayload)));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let result = deserialize_message(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]);
        assert!(
            result.is_err(),
            "Corrupted payload should fail deserialization"
        );
    }

    #[test]
    fn test_version_byte_is_first_byte() {
        let bytes = serialize_message(&Message::Welcome(Welcome { peer_id: 1 })).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }
}
