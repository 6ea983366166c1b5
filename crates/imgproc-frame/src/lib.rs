//! Length-prefixed message framing for the image-processing server channel.
//!
//! Every message on the channel is a 4-byte big-endian payload length
//! followed by exactly that many payload bytes. Readers hand out fully
//! assembled payloads only; a frame is either complete or the read fails.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, encode_frame, encode_length, FrameConfig, DEFAULT_IDLE_POLL_INTERVAL,
    DEFAULT_MAX_PAYLOAD, DEFAULT_READ_CHUNK_SIZE, LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
