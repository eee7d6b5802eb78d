//! Conditional LZ4 compression for network payloads.
//!
//! Map snapshots can carry thousands of edit records and are compressed with
//! LZ4. Single edits and heartbeats stay below the threshold and go out raw.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// Compression flag: payload is uncompressed.
pub const COMPRESSION_FLAG_NONE: u8 = 0x00;

/// Compression flag: payload is LZ4-compressed.
pub const COMPRESSION_FLAG_LZ4: u8 = 0x01;

/// Controls when payloads are compressed.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Payloads at or above this size (bytes) are compressed. Default: 256.
    pub threshold: usize,
    /// Whether compression is enabled at all. Default: true.
    pub enabled: bool,
}

impl CompressionConfig {
    /// Compression enabled with the given threshold.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            enabled: true,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: 256,
            enabled: true,
        }
    }
}

/// Wrap a serialized message payload with optional compression.
///
/// Input: the versioned message bytes (version byte + postcard body).
/// Output: compression flag byte + (possibly compressed) data, ready for framing.
pub fn compress_payload(data: &[u8], config: &CompressionConfig) -> Vec<u8> {
    if !config.enabled || data.len() < config.threshold {
        return flagged(COMPRESSION_FLAG_NONE, data);
    }
    flagged(COMPRESSION_FLAG_LZ4, &compress_prepend_size(data))
}

fn flagged(flag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(flag);
    out.extend_from_slice(body);
    out
}

/// Unwrap a received payload, decompressing if necessary.
///
/// Input: compression flag byte + (possibly compressed) data.
/// Output: the versioned message bytes.
pub fn decompress_payload(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let Some((&flag, body)) = data.split_first() else {
        return Err(CompressionError::EmptyPayload);
    };

    match flag {
        COMPRESSION_FLAG_NONE => Ok(body.to_vec()),
        COMPRESSION_FLAG_LZ4 => decompress_size_prepended(body)
            .map_err(|e| CompressionError::DecompressFailed(e.to_string())),
        other => Err(CompressionError::UnknownFlag(other)),
    }
}

/// Errors that can occur during payload decompression.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// The payload was empty, no compression flag present.
    #[error("empty payload, no compression flag")]
    EmptyPayload,
    /// LZ4 decompression failed.
    #[error("LZ4 decompression failed: {0}")]
    DecompressFailed(String),
    /// An unknown compression flag byte was encountered.
    #[error("unknown compression flag: 0x{0:02X}")]
    UnknownFlag(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_message_is_not_compressed() {
        let payload = compress_payload(b"tiny", &CompressionConfig::default());
        assert_eq!(payload[0], COMPRESSION_FLAG_NONE);
        assert_eq!(&payload[1..], b"tiny");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let config = CompressionConfig::with_threshold(16);
        assert_eq!(compress_payload(&[1u8; 15], &config)[0], COMPRESSION_FLAG_NONE);
        assert_eq!(compress_payload(&[1u8; 16], &config)[0], COMPRESSION_FLAG_LZ4);
    }

    #[test]
    fn test_large_snapshot_shrinks_and_recovers() {
        // Columnar snapshot bodies are long runs of similar small integers.
        let mut snapshot = Vec::with_capacity(12_000);
        for i in 0..3_000u32 {
            snapshot.extend_from_slice(&[(i % 16) as u8, 0, 8, 3]);
        }

        let payload = compress_payload(&snapshot, &CompressionConfig::default());
        assert_eq!(payload[0], COMPRESSION_FLAG_LZ4);
        assert!(
            payload.len() < snapshot.len() / 2,
            "Compressed size {} should be under half of {}",
            payload.len(),
            snapshot.len()
        );
        assert_eq!(decompress_payload(&payload).unwrap(), snapshot);
    }

    #[test]
    fn test_uncompressed_message_decompresses_correctly() {
        let payload = compress_payload(b"short message", &CompressionConfig::default());
        assert_eq!(decompress_payload(&payload).unwrap(), b"short message");
    }

    #[test]
    fn test_compression_disabled() {
        let config = CompressionConfig {
            threshold: 256,
            enabled: false,
        };
        let data = vec![0u8; 1024];
        let payload = compress_payload(&data, &config);

        assert_eq!(payload[0], COMPRESSION_FLAG_NONE);
        assert_eq!(&payload[1..], &data[..]);
    }

    #[test]
    fn test_empty_payload_error() {
        let result = decompress_payload(&[]);
        assert!(matches!(result, Err(CompressionError::EmptyPayload)));
    }

    #[test]
    fn test_unknown_flag_error() {
        let result = decompress_payload(&[0xFF, 0x01, 0x02]);
        assert!(matches!(result, Err(CompressionError::UnknownFlag(0xFF))));
    }

    #[test]
    fn test_truncated_lz4_body_fails() {
        let payload = compress_payload(&[9u8; 1024], &CompressionConfig::default());
        let truncated = &payload[..payload.len() / 2];
        assert!(matches!(
            decompress_payload(truncated),
            Err(CompressionError::DecompressFailed(_))
        ));
    }
}
