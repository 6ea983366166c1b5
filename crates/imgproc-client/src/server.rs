//! Launching and supervising the server process.

use std::process::{Child, Command, Stdio};

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ClientError, Result};

/// A server child process owned by the client.
#[derive(Debug)]
pub struct ServerProcess {
    config: ServerConfig,
    child: Child,
    restarts: u32,
}

impl ServerProcess {
    /// Launch the server executable.
    pub fn spawn(config: ServerConfig) -> Result<Self> {
        let child = launch(&config)?;
        info!(program = %config.program.display(), pid = child.id(), "launched server");
        Ok(Self {
            config,
            child,
            restarts: 0,
        })
    }

    /// OS process id of the current server process.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Number of times the server has been restarted.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Fail with [`ClientError::ServerExited`] if the process has exited.
    pub fn check_alive(&mut self) -> Result<()> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(ClientError::ServerExited {
                status: status.to_string(),
                restarts: self.restarts,
            }),
            Err(err) => {
                warn!(error = %err, "could not poll server process");
                Ok(())
            }
        }
    }

    /// Make sure a server process is running, restarting a dead one while
    /// the restart budget allows.
    ///
    /// Returns `true` when a new process was launched.
    pub fn ensure_running(&mut self) -> Result<bool> {
        let exited = match self.check_alive() {
            Ok(()) => return Ok(false),
            Err(err) => err,
        };
        if self.restarts >= self.config.max_restarts {
            return Err(exited);
        }

        warn!(
            reason = %exited,
            restart = self.restarts + 1,
            max_restarts = self.config.max_restarts,
            "server exited, restarting"
        );
        self.child = launch(&self.config)?;
        self.restarts += 1;
        info!(pid = self.child.id(), "server restarted");
        Ok(true)
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if !self.config.kill_on_drop {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

fn launch(config: &ServerConfig) -> Result<Child> {
    Command::new(&config.program)
        .args(&config.args)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| ClientError::ServerSpawn {
            program: config.program.display().to_string(),
            source,
        })
}
