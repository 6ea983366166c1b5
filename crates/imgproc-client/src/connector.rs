use std::thread;
use std::time::{Duration, Instant};

use imgproc_transport::{ChannelFault, ChannelName, IpcStream, TransportError, UnixDomainSocket};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

/// Opens the server's named channel, waiting for it to appear.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    channel: ChannelName,
    retry_interval: Duration,
    timeout: Option<Duration>,
}

impl ChannelConnector {
    pub fn new(channel: ChannelName) -> Self {
        Self {
            channel,
            retry_interval: Duration::from_secs(1),
            timeout: None,
        }
    }

    /// Wait between attempts while the channel does not exist yet.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Stop waiting after `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Open the channel (blocking).
    pub fn connect(&self) -> Result<IpcStream> {
        self.connect_with_liveness(|| Ok(()))
    }

    /// Open the channel, calling `check_alive` between attempts.
    ///
    /// A channel that does not exist yet is retried every retry interval.
    /// A broken remote end fails immediately, as does any other OS error.
    /// An error from `check_alive` ends the wait with that error.
    pub fn connect_with_liveness(
        &self,
        mut check_alive: impl FnMut() -> Result<()>,
    ) -> Result<IpcStream> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match UnixDomainSocket::connect_channel(&self.channel) {
                Ok(stream) => {
                    configure(&stream);
                    let peer_pid = stream.peer_credentials().map(|(_, _, pid)| pid);
                    info!(channel = %self.channel, attempts, ?peer_pid, "channel connected");
                    return Ok(stream);
                }
                Err(err) => err,
            };

            match ChannelFault::of_connect_error(&err) {
                ChannelFault::NotYetAvailable => {
                    if attempts == 1 {
                        info!(channel = %self.channel, "channel not available yet, waiting");
                    } else {
                        debug!(channel = %self.channel, attempts, "channel still not available");
                    }
                }
                ChannelFault::Broken | ChannelFault::Gone => {
                    return Err(ClientError::ChannelBroken(err));
                }
                ChannelFault::Other => return Err(ClientError::Transport(err)),
            }

            check_alive()?;

            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    return Err(ClientError::ConnectTimeout {
                        channel: self.channel.to_string(),
                        waited: started.elapsed(),
                    });
                }
            }
            thread::sleep(self.retry_interval);
        }
    }
}

fn configure(stream: &IpcStream) {
    match stream.set_message_read_mode() {
        Ok(()) => {}
        Err(TransportError::Unsupported(what)) => {
            debug!(what, "message read mode unavailable, relying on length prefixes");
        }
        Err(err) => warn!(error = %err, "could not set message read mode"),
    }
}
