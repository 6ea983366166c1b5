//! Channel ownership, command serialization and the setup handshake.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::command::Command;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::connector::ChannelConnector;
use crate::error::{ClientError, Result};
use crate::server::ServerProcess;

/// Sends commands to the image-processing server, one at a time.
///
/// Holds the only channel to the server. Callers on other threads queue on
/// an internal lock until the current command has finished.
#[derive(Debug)]
pub struct CommandClient {
    config: ClientConfig,
    session: Mutex<Session>,
    in_flight: Mutex<Option<String>>,
}

impl CommandClient {
    /// Launch the server (unless attaching), open the channel and send
    /// `setup`.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        Command::setup(&config.cache_dir, &config.working_dir, config.threaded_reads).validate()?;

        let server = config
            .server
            .clone()
            .map(ServerProcess::spawn)
            .transpose()?;
        let connector = ChannelConnector::new(config.channel.clone())
            .with_retry_interval(config.connect_retry_interval)
            .with_timeout(config.connect_timeout);

        let mut session = Session {
            connection: None,
            server,
            connector,
            needs_setup: true,
        };
        let connection = session.take_connection(&config)?;
        session.restore(connection);

        Ok(Self {
            config,
            session: Mutex::new(session),
            in_flight: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a command that has no response frames.
    ///
    /// Opens a new channel first if the previous one was discarded. On
    /// failure the channel is discarded and the error returned; there is no
    /// retry.
    pub fn send_command(&self, command: &Command) -> Result<()> {
        let payload = command.encode()?;
        let mut session = self.lock_session();
        let mut connection = session.take_connection(&self.config)?;

        let _marker = self.mark_in_flight(command);
        connection.send(&payload)?;
        session.restore(connection);
        Ok(())
    }

    /// Ask the server to drop its image cache.
    pub fn clear_cache(&self) -> Result<()> {
        self.send_command(&Command::ClearCache)
    }

    /// Close the channel and open a new one.
    pub fn reconnect(&self) -> Result<()> {
        let mut session = self.lock_session();
        session.discard();
        let connection = session.take_connection(&self.config)?;
        session.restore(connection);
        Ok(())
    }

    /// Text of the command currently awaiting completion, if any.
    pub fn current_command(&self) -> Option<String> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// OS process id of the supervised server, when one was launched.
    pub fn server_pid(&self) -> Option<u32> {
        self.lock_session().server.as_ref().map(ServerProcess::id)
    }

    pub(crate) fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_in_flight(&self, command: &Command) -> InFlight<'_> {
        let text = command.to_string();
        debug!(command = %text, "command in flight");
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
        InFlight {
            slot: &self.in_flight,
        }
    }
}

/// State guarded by the session lock.
#[derive(Debug)]
pub(crate) struct Session {
    connection: Option<Connection>,
    server: Option<ServerProcess>,
    connector: ChannelConnector,
    needs_setup: bool,
}

impl Session {
    /// Take the open channel, or open a new one.
    ///
    /// A dead server is restarted first (within its restart budget). The
    /// `setup` handshake goes out on the first channel and again after
    /// every restart.
    pub(crate) fn take_connection(&mut self, config: &ClientConfig) -> Result<Connection> {
        if let Some(connection) = self.connection.take() {
            return Ok(connection);
        }

        if let Some(server) = self.server.as_mut() {
            if server.ensure_running()? {
                self.needs_setup = true;
            }
        }

        let server = &mut self.server;
        let stream = self.connector.connect_with_liveness(|| match server.as_mut() {
            Some(server) => server.check_alive(),
            None => Ok(()),
        })?;
        let mut connection = Connection::open(stream, &config.frame)?;

        if self.needs_setup {
            let setup = Command::setup(&config.cache_dir, &config.working_dir, config.threaded_reads);
            let payload = setup.encode()?;
            connection.send(&payload).map_err(ClientError::Setup)?;
            self.needs_setup = false;
            info!(command = %setup, "setup sent");
        }
        Ok(connection)
    }

    /// Hand a healthy channel back for the next command.
    pub(crate) fn restore(&mut self, connection: Connection) {
        self.connection = Some(connection);
    }

    /// Close the current channel, if any.
    pub(crate) fn discard(&mut self) {
        if self.connection.take().is_some() {
            debug!(channel = %self.connector.channel(), "channel discarded");
        }
    }
}

/// Clears the in-flight marker when dropped.
pub(crate) struct InFlight<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    use imgproc_transport::{IpcStream, UnixDomainSocket};

    use super::*;

    fn temp_socket(tag: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "imgproc-client-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sock = dir.join("server.sock");
        (dir, sock)
    }

    fn read_text(stream: &mut IpcStream) -> String {
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).unwrap();
        let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
        stream.read_exact(&mut payload).unwrap();
        String::from_utf8(payload).unwrap()
    }

    fn attach(sock: &std::path::Path) -> ClientConfig {
        ClientConfig::new("cache", true)
            .attach()
            .with_channel(sock)
            .with_working_dir("/srv/images")
            .with_connect_retry_interval(Duration::from_millis(10))
            .with_connect_timeout(Some(Duration::from_secs(5)))
    }

    #[test]
    fn connect_sends_setup_then_commands() {
        let (dir, sock) = temp_socket("setup");
        let listener = UnixDomainSocket::bind(&sock).unwrap();
        let server = thread::spawn(move || {
            let mut conn = listener.accept().unwrap();
            vec![read_text(&mut conn), read_text(&mut conn)]
        });

        let client = CommandClient::connect(attach(&sock)).unwrap();
        assert_eq!(client.current_command(), None);
        assert_eq!(client.server_pid(), None);
        client.clear_cache().unwrap();
        assert_eq!(client.current_command(), None);

        let received = server.join().unwrap();
        assert_eq!(received, ["setup|cache|/srv/images|true", "clear_cache"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_setup_argument_fails_construction() {
        let (dir, sock) = temp_socket("invalid");
        let config = attach(&sock)
            .with_working_dir("a|b")
            .with_server(crate::config::ServerConfig::new("/nonexistent/server"));

        let err = CommandClient::connect(config).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn server_exiting_before_channel_fails_connect() {
        let (dir, sock) = temp_socket("exit");
        let config = attach(&sock).with_server(
            crate::config::ServerConfig::new("/bin/sh")
                .with_args(["-c", "exit 7"])
                .with_max_restarts(0),
        );

        let err = CommandClient::connect(config).unwrap_err();
        assert!(matches!(err, ClientError::ServerExited { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn in_flight_marker_clears_on_drop() {
        let marker = Mutex::new(None);
        {
            *marker.lock().unwrap() = Some("gets|8|8|a.png".to_string());
            let _guard = InFlight { slot: &marker };
        }
        assert_eq!(*marker.lock().unwrap(), None);
    }
}
