use bytes::Bytes;
use imgproc_frame::{FrameConfig, FrameReader, FrameWriter, Result};
use imgproc_transport::{IpcStream, StreamCanceller};
use tracing::trace;

/// An open, framed channel to the server.
///
/// Reader and writer own separate handles of the same stream.
pub struct Connection {
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("stream", self.reader.get_ref())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap a connected stream, applying the stream timeouts in `config`.
    pub fn open(stream: IpcStream, config: &FrameConfig) -> Result<Self> {
        let write_half = stream.try_clone()?;
        Ok(Self {
            reader: FrameReader::with_config_ipc(stream, config.clone())?,
            writer: FrameWriter::with_config_ipc(write_half, config.clone())?,
        })
    }

    /// Send one framed message.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.send(payload)
    }

    /// Read one framed message.
    pub fn receive(&mut self) -> Result<Bytes> {
        self.reader.read_frame()
    }

    /// Send `payload`, then read exactly `expected` frames in arrival order.
    pub fn exchange(&mut self, payload: &[u8], expected: usize) -> Result<Vec<Bytes>> {
        self.send(payload)?;
        let mut frames = Vec::with_capacity(expected);
        for index in 0..expected {
            let frame = self.receive()?;
            trace!(index, len = frame.len(), "response frame");
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Handle that aborts blocked reads and writes on this connection.
    pub fn canceller(&self) -> Result<StreamCanceller> {
        Ok(self.reader.get_ref().canceller()?)
    }
}
