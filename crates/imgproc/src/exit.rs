use std::fmt;
use std::io;

use imgproc_client::ClientError;
use imgproc_frame::FrameError;
use imgproc_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

/// Exit code for a client failure. A retries-exhausted error takes the code
/// of its last attempt.
fn client_code(err: &ClientError) -> i32 {
    match err {
        ClientError::Transport(err) => match err {
            TransportError::PathTooLong { .. } => USAGE,
            _ => TRANSPORT_ERROR,
        },
        ClientError::Frame(FrameError::PayloadTooLarge { .. }) => DATA_INVALID,
        ClientError::Frame(_) | ClientError::ChannelBroken(_) | ClientError::Setup(_) => {
            TRANSPORT_ERROR
        }
        ClientError::ConnectTimeout { .. } | ClientError::RequestTimedOut(_) => TIMEOUT,
        ClientError::ServerSpawn { source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            PERMISSION_DENIED
        }
        ClientError::ServerSpawn { .. } | ClientError::ServerExited { .. } => FAILURE,
        ClientError::InvalidArgument(_) => USAGE,
        ClientError::Decode { .. } => DATA_INVALID,
        ClientError::RetriesExhausted { last, .. } => client_code(last),
        ClientError::Worker(_) => INTERNAL,
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Frame(err) => frame_error(context, err),
        other => CliError::new(client_code(&other), format!("{context}: {other}")),
    }
}
