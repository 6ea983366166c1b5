//! Named local channel transport.
//!
//! The image-processing server publishes a single named channel. On Unix
//! that channel is a Unix domain socket; this crate opens it, exposes the
//! connection as a blocking [`IpcStream`], and classifies OS failures into
//! [`ChannelFault`]s the layers above use to decide between waiting,
//! reconnecting and giving up.

pub mod error;
pub mod fault;
pub mod name;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use fault::ChannelFault;
pub use name::{ChannelName, DEFAULT_CHANNEL_NAME};
pub use traits::{IpcStream, StreamCanceller};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
