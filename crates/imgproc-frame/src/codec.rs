use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: a 4-byte big-endian payload length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 256 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 256 * 1024 * 1024;

/// Largest single read issued while reassembling a payload.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4069;

/// Delay before retrying a length-prefix read that produced no data.
pub const DEFAULT_IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Encode the length prefix for a payload.
pub fn encode_length(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE]> {
    let len = u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })?;
    Ok(len.to_be_bytes())
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────────┬──────────────────┐
/// │ Length (4B BE)│ Payload          │
/// │ u32           │ (Length bytes)   │
/// └───────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let prefix = encode_length(payload.len())?;
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_slice(&prefix);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let payload_len = u32::from_be_bytes(prefix) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < LENGTH_PREFIX_SIZE + payload_len {
        src.reserve(LENGTH_PREFIX_SIZE + payload_len - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 256 MiB.
    pub max_payload_size: usize,
    /// Upper bound on a single payload read. Default: 4069 bytes.
    pub read_chunk_size: usize,
    /// Wait between length-prefix reads that returned no data. Default: 10ms.
    pub idle_poll_interval: Duration,
    /// Read timeout applied to the underlying stream.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the underlying stream.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            idle_poll_interval: DEFAULT_IDLE_POLL_INTERVAL,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
