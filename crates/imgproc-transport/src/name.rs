use std::fmt;
use std::path::{Path, PathBuf};

/// Channel name shared out-of-band by the client and the server.
pub const DEFAULT_CHANNEL_NAME: &str = "img_process_server";

/// Identifier of a named local channel.
///
/// A bare name (`img_process_server`) resolves to a socket in the system
/// temporary directory; anything containing a path separator is used as a
/// socket path verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path of the socket backing this channel.
    pub fn socket_path(&self) -> PathBuf {
        if self.0.contains('/') {
            PathBuf::from(&self.0)
        } else {
            std::env::temp_dir().join(format!("{}.sock", self.0))
        }
    }
}

impl Default for ChannelName {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_NAME)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&Path> for ChannelName {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for ChannelName {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}
