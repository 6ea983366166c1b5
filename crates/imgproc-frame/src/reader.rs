use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use imgproc_transport::IpcStream;
use tracing::trace;

use crate::codec::{FrameConfig, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// The length prefix is read first; the payload is then pulled in chunks of
/// at most [`FrameConfig::read_chunk_size`] bytes. Callers only ever see a
/// fully assembled payload.
pub struct FrameReader<T> {
    inner: T,
    chunk: Box<[u8]>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_size.max(1)].into_boxed_slice();
        Self {
            inner,
            chunk,
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ChannelBroken)` when the peer closes the
    /// channel, whether between frames or in the middle of one.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let declared = self.read_length()?;
        if declared > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: declared,
                max: self.config.max_payload_size,
            });
        }

        let mut payload = BytesMut::with_capacity(declared);
        while payload.len() < declared {
            let want = (declared - payload.len()).min(self.chunk.len());
            let read = match self.inner.read(&mut self.chunk[..want]) {
                Ok(0) => return Err(FrameError::closed()),
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            payload.extend_from_slice(&self.chunk[..read]);
        }

        trace!(len = declared, "frame assembled");
        Ok(payload.freeze())
    }

    /// Read the 4-byte length prefix, polling while the stream has no data.
    fn read_length(&mut self) -> Result<usize> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let mut filled = 0usize;
        while filled < LENGTH_PREFIX_SIZE {
            match self.inner.read(&mut prefix[filled..]) {
                Ok(0) => return Err(FrameError::closed()),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    std::thread::sleep(self.config.idle_poll_interval);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(u32::from_be_bytes(prefix) as usize)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
