//! Classification of OS errors into channel faults.
//!
//! The same OS error means different things depending on when it happens:
//! a missing socket while connecting means the server has not created the
//! channel yet, while the same error on an open stream means the channel
//! went away underneath us.

use std::io::{self, ErrorKind};

use crate::error::TransportError;

/// What an I/O failure says about the state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFault {
    /// The server has not created (or is not yet listening on) the channel.
    NotYetAvailable,
    /// The channel no longer exists.
    Gone,
    /// The remote end is gone or the connection is broken.
    Broken,
    /// Any other failure.
    Other,
}

impl ChannelFault {
    /// Classify an error returned while opening the channel.
    pub fn on_connect(err: &io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => ChannelFault::NotYetAvailable,
            kind if is_broken(kind) => ChannelFault::Broken,
            _ => ChannelFault::Other,
        }
    }

    /// Classify an error returned by a read or write on an open channel.
    pub fn on_stream(err: &io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ChannelFault::Gone,
            kind if is_broken(kind) => ChannelFault::Broken,
            _ => ChannelFault::Other,
        }
    }

    /// Classify a transport error produced by a connect attempt.
    pub fn of_connect_error(err: &TransportError) -> Self {
        err.io_error().map_or(ChannelFault::Other, Self::on_connect)
    }
}

fn is_broken(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}
