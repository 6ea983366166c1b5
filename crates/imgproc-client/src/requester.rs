//! Image requests with a bounded wait per attempt, reconnecting between
//! attempts.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::client::CommandClient;
use crate::command::Command;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::decode::{CodecDecoder, ImageDecoder};
use crate::error::{ClientError, Result};

/// Fetches resized images from the server.
///
/// Each attempt runs on its own worker thread and is bounded by the
/// configured attempt timeout. A timed-out attempt is cancelled by shutting
/// the channel down, its worker is joined, and the request is retried on a
/// new channel. Results are all-or-nothing and in request order.
#[derive(Debug)]
pub struct ImageClient<D: ImageDecoder = CodecDecoder> {
    commands: CommandClient,
    decoder: D,
}

impl ImageClient<CodecDecoder> {
    /// Connect and decode responses into RGB images.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with_decoder(config, CodecDecoder)
    }
}

impl<D: ImageDecoder> ImageClient<D> {
    pub fn connect_with_decoder(config: ClientConfig, decoder: D) -> Result<Self> {
        Ok(Self {
            commands: CommandClient::connect(config)?,
            decoder,
        })
    }

    /// Fetch `paths` resized to `width`x`height`. `images[i]` is the image
    /// for `paths[i]`. An empty batch returns no images without touching
    /// the channel.
    pub fn ask_for_images<S: AsRef<str>>(
        &self,
        paths: &[S],
        width: u32,
        height: u32,
    ) -> Result<Vec<D::Image>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let command = Command::gets(paths, width, height);
        let frames = self.fetch_frames(&command)?;
        frames
            .into_iter()
            .zip(paths)
            .enumerate()
            .map(|(index, (frame, path))| self.decode(index, path.as_ref(), frame))
            .collect()
    }

    /// Fetch a single image.
    pub fn ask_for_image(&self, path: &str, width: u32, height: u32) -> Result<D::Image> {
        let command = Command::get(path, width, height);
        let frame = self
            .fetch_frames(&command)?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Worker("response frame missing".to_string()))?;
        self.decode(0, path, frame)
    }

    /// Fetch a batch like [`ImageClient::ask_for_images`], returning the
    /// encoded payloads without decoding them.
    pub fn ask_for_image_bytes<S: AsRef<str>>(
        &self,
        paths: &[S],
        width: u32,
        height: u32,
    ) -> Result<Vec<Bytes>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_frames(&Command::gets(paths, width, height))
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.commands.clear_cache()
    }

    pub fn current_command(&self) -> Option<String> {
        self.commands.current_command()
    }

    /// The underlying command client.
    pub fn commands(&self) -> &CommandClient {
        &self.commands
    }

    fn decode(&self, index: usize, path: &str, frame: Bytes) -> Result<D::Image> {
        self.decoder
            .decode(frame)
            .map_err(|source| ClientError::Decode {
                index,
                path: path.to_string(),
                source,
            })
    }

    /// Send `command` and collect its response frames, retrying timed-out
    /// or failed attempts on a fresh channel.
    fn fetch_frames(&self, command: &Command) -> Result<Vec<Bytes>> {
        let payload: Arc<[u8]> = command.encode()?.into();
        let expected = command.expected_responses();
        let policy = &self.commands.config().retry;
        let max_attempts = policy.max_attempts.max(1);

        let mut session = self.commands.lock_session();
        let _marker = self.commands.mark_in_flight(command);

        let mut last = None;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                thread::sleep(policy.backoff);
            }
            let connection = session.take_connection(self.commands.config())?;

            match run_attempt(
                connection,
                Arc::clone(&payload),
                expected,
                policy.attempt_timeout,
                attempt,
            ) {
                Ok((connection, frames)) => {
                    session.restore(connection);
                    debug!(attempt, frames = frames.len(), "request complete");
                    return Ok(frames);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "request attempt failed, discarding channel"
                    );
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(ClientError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(
                last.unwrap_or_else(|| ClientError::Worker("no attempt was made".to_string())),
            ),
        })
    }
}

type AttemptOutcome = imgproc_frame::Result<(Connection, Vec<Bytes>)>;

/// One bounded exchange on `connection`, run on a worker thread.
///
/// The connection comes back only when the exchange completed in time.
/// Otherwise it is shut down and dropped with the worker.
fn run_attempt(
    mut connection: Connection,
    payload: Arc<[u8]>,
    expected: usize,
    timeout: Duration,
    attempt: u32,
) -> Result<(Connection, Vec<Bytes>)> {
    let canceller = connection.canceller()?;
    let (tx, rx) = mpsc::channel::<AttemptOutcome>();

    let worker = thread::Builder::new()
        .name(format!("imgproc-request-{attempt}"))
        .spawn(move || {
            let outcome = connection
                .exchange(&payload, expected)
                .map(|frames| (connection, frames));
            let _ = tx.send(outcome);
        })
        .map_err(|err| ClientError::Worker(format!("failed to spawn request worker: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(outcome) => {
            join(worker)?;
            Ok(outcome?)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(attempt, ?timeout, "request attempt timed out, cancelling");
            canceller.cancel();
            join(worker)?;
            Err(ClientError::RequestTimedOut(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => {
            join(worker)?;
            Err(ClientError::Worker(
                "request worker exited without a result".to_string(),
            ))
        }
    }
}

fn join(worker: JoinHandle<()>) -> Result<()> {
    worker
        .join()
        .map_err(|_| ClientError::Worker("request worker panicked".to_string()))
}
