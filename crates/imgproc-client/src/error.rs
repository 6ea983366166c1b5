use std::time::Duration;

use imgproc_frame::FrameError;
use imgproc_transport::TransportError;

use crate::decode::DecodeError;

/// Errors surfaced by the image-processing client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error while opening the channel.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error on an open channel.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The remote end was gone or broken when opening the channel.
    #[error("broken channel while connecting: {0}")]
    ChannelBroken(#[source] TransportError),

    /// The channel did not appear within the configured connect timeout.
    #[error("channel {channel} not available after {waited:?}")]
    ConnectTimeout { channel: String, waited: Duration },

    /// The server executable could not be started.
    #[error("failed to launch server {program}: {source}")]
    ServerSpawn {
        program: String,
        source: std::io::Error,
    },

    /// The supervised server exited and may not be restarted again.
    #[error("server process exited ({status}) after {restarts} restart(s)")]
    ServerExited { status: String, restarts: u32 },

    /// The initial `setup` command could not be delivered.
    #[error("setup handshake failed: {0}")]
    Setup(#[source] FrameError),

    /// A command argument cannot be encoded on the wire.
    #[error("invalid command argument: {0}")]
    InvalidArgument(String),

    /// One request attempt exceeded its time bound.
    #[error("request timed out after {0:?}")]
    RequestTimedOut(Duration),

    /// Every attempt failed; carries the last failure.
    #[error("could not get images after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    /// A response frame could not be decoded into an image.
    #[error("failed to decode image {index} ({path}): {source}")]
    Decode {
        index: usize,
        path: String,
        source: DecodeError,
    },

    /// The request worker could not be started or panicked.
    #[error("request worker failed: {0}")]
    Worker(String),
}

impl ClientError {
    /// Whether a failed request attempt is recovered by reconnecting and
    /// trying again.
    ///
    /// Timeouts and any failure on the channel during an attempt qualify:
    /// after either, the stream position is unknown and the channel must be
    /// replaced.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::RequestTimedOut(_) | ClientError::Frame(_) | ClientError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
