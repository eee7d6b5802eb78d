//! Message codec: serialize, compress, frame.
//!
//! ```text
//! frame = [len: u32 LE] [flag: u8] [body]
//! body  = [version: u8] [postcard Message]   (LZ4-compressed when flag = 0x01)
//! ```

use tokio::io::{AsyncRead, AsyncWrite};

use crate::compression::{CompressionConfig, CompressionError, compress_payload, decompress_payload};
use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::messages::{Message, MessageError, deserialize_message, serialize_message};

/// Errors from encoding, decoding, or moving a message.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Serialization failed.
    #[error("encode: {0}")]
    Encode(#[from] postcard::Error),
    /// The payload is not a valid message.
    #[error("decode: {0}")]
    Decode(#[from] MessageError),
    /// The compression envelope is invalid.
    #[error("compression: {0}")]
    Compression(#[from] CompressionError),
    /// Framing or transport failure.
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
    /// The connection's outbound queue is gone.
    #[error("connection closed")]
    Closed,
}

impl WireError {
    /// Whether the error means the stream is finished.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Frame(FrameError::ConnectionClosed)
        )
    }
}

/// Framing and compression settings shared by both ends.
#[derive(Debug, Clone, Default)]
pub struct WireCodec {
    /// Frame size limit.
    pub frame: FrameConfig,
    /// Compression policy.
    pub compression: CompressionConfig,
}

impl WireCodec {
    /// Codec with the given frame limit and compression threshold.
    pub fn new(max_frame_bytes: u32, compression_threshold: usize) -> Self {
        Self {
            frame: FrameConfig {
                max_payload_size: max_frame_bytes,
            },
            compression: CompressionConfig::with_threshold(compression_threshold),
        }
    }

    /// Encodes a message into a frame payload (flag byte onwards).
    pub fn encode(&self, msg: &Message) -> Result<Vec<u8>, WireError> {
        let bytes = serialize_message(msg)?;
        Ok(compress_payload(&bytes, &self.compression))
    }

    /// Decodes a frame payload into a message.
    pub fn decode(&self, payload: &[u8]) -> Result<Message, WireError> {
        let bytes = decompress_payload(payload)?;
        Ok(deserialize_message(&bytes)?)
    }

    /// Reads and decodes the next message.
    pub async fn read<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<Message, WireError> {
        let payload = read_frame(reader, &self.frame).await?;
        self.decode(&payload)
    }

    /// Encodes and writes a message.
    pub async fn write<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        msg: &Message,
    ) -> Result<(), WireError> {
        let payload = self.encode(msg)?;
        write_frame(writer, &payload, &self.frame).await?;
        Ok(())
    }

    /// Writes an already-encoded payload.
    pub async fn write_encoded<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        payload: &[u8],
    ) -> Result<(), WireError> {
        write_frame(writer, payload, &self.frame).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{COMPRESSION_FLAG_LZ4, COMPRESSION_FLAG_NONE};
    use crate::messages::{BlockEdit, MapStatus};
    use tokio::io::duplex;

    fn big_snapshot() -> Message {
        let n = 2_000;
        Message::MapStatus(MapStatus {
            last_seq: 99,
            xs: (0..n).map(|i| (i % 64) as i16).collect(),
            ys: vec![8; n],
            zs: (0..n).map(|i| (i / 64) as i16).collect(),
            ids: vec![0; n],
        })
    }

    #[test]
    fn test_small_message_goes_out_raw() {
        let codec = WireCodec::default();
        let msg = Message::BlockEdit(BlockEdit {
            seq: 1,
            x: 0,
            y: 0,
            z: 0,
            block_id: 1,
        });
        let payload = codec.encode(&msg).unwrap();
        assert_eq!(payload[0], COMPRESSION_FLAG_NONE);
        assert_eq!(codec.decode(&payload).unwrap(), msg);
    }

    #[test]
    fn test_snapshot_is_compressed() {
        let codec = WireCodec::default();
        let msg = big_snapshot();
        let payload = codec.encode(&msg).unwrap();
        assert_eq!(payload[0], COMPRESSION_FLAG_LZ4);
        assert_eq!(codec.decode(&payload).unwrap(), msg);
    }

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let (mut a, mut b) = duplex(1 << 16);
        let codec = WireCodec::default();

        codec.write(&mut a, &big_snapshot()).await.unwrap();
        codec.write(&mut a, &Message::ResyncRequest).await.unwrap();

        assert_eq!(codec.read(&mut b).await.unwrap(), big_snapshot());
        assert_eq!(codec.read(&mut b).await.unwrap(), Message::ResyncRequest);
    }

    #[tokio::test]
    async fn test_frame_limit_applies_after_compression() {
        let (mut a, _b) = duplex(1 << 16);
        let codec = WireCodec::new(32, usize::MAX);
        let result = codec.write(&mut a, &big_snapshot()).await;
        assert!(matches!(
            result,
            Err(WireError::Frame(FrameError::PayloadTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_closed_stream_reports_closed() {
        let (a, mut b) = duplex(64);
        drop(a);
        let err = WireCodec::default().read(&mut b).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn test_garbage_payload_is_decode_error() {
        let codec = WireCodec::default();
        let err = codec.decode(&[COMPRESSION_FLAG_NONE, 77, 1, 2]).unwrap_err();
        assert!(matches!(err, WireError::Decode(MessageError::UnsupportedVersion(77))));
        assert!(!err.is_closed());
    }
}
