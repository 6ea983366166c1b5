use std::io;

use imgproc_transport::{ChannelFault, TransportError};

/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared or supplied payload exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The channel no longer exists.
    #[error("channel gone: {0}")]
    ChannelGone(#[source] io::Error),

    /// The remote end closed or the connection broke.
    #[error("broken channel: {0}")]
    ChannelBroken(#[source] io::Error),

    /// Any other I/O error while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[source] io::Error),
}

impl FrameError {
    /// The peer closed the channel (a zero-byte read or write).
    pub fn closed() -> Self {
        FrameError::ChannelBroken(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "channel closed by peer",
        ))
    }

    /// True when the channel itself is unusable (gone or broken).
    pub fn is_channel_fault(&self) -> bool {
        matches!(self, FrameError::ChannelGone(_) | FrameError::ChannelBroken(_))
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match ChannelFault::on_stream(&err) {
            ChannelFault::Gone => FrameError::ChannelGone(err),
            ChannelFault::Broken => FrameError::ChannelBroken(err),
            ChannelFault::NotYetAvailable | ChannelFault::Other => FrameError::Io(err),
        }
    }
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io)
            | TransportError::Accept(io)
            | TransportError::Bind { source: io, .. }
            | TransportError::Connect { source: io, .. } => FrameError::from(io),
            other => FrameError::Io(io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
