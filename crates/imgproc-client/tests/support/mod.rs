//! Scripted stand-in for the image-processing server.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::{ImageFormat, Rgb, RgbImage};
use imgproc_client::{ClientConfig, RetryPolicy};
use imgproc_transport::{IpcStream, UnixDomainSocket};

/// What the fake server does with the requests on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer every request.
    Respond,
    /// Read requests but never answer them.
    Hang,
    /// Close the connection as soon as a request arrives.
    CloseOnRequest,
    /// Close the connection right after `setup`.
    CloseAfterSetup,
}

/// One command received by the fake server.
#[derive(Debug, Clone)]
pub struct Received {
    pub connection: usize,
    pub command: String,
    pub at: Instant,
}

pub struct FakeServer {
    dir: PathBuf,
    socket: PathBuf,
    log: Arc<Mutex<Vec<Received>>>,
    connections: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    accept_loop: Option<JoinHandle<()>>,
}

pub struct FakeServerBuilder {
    behaviors: Vec<Behavior>,
    bind_delay: Duration,
    response_delay: Duration,
}

impl FakeServer {
    pub fn builder() -> FakeServerBuilder {
        FakeServerBuilder {
            behaviors: Vec::new(),
            bind_delay: Duration::ZERO,
            response_delay: Duration::ZERO,
        }
    }

    pub fn start() -> Self {
        Self::builder().start()
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Client configuration that attaches to this server with short timings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new("image_cache", false)
            .attach()
            .with_channel(self.socket.as_path())
            .with_connect_retry_interval(Duration::from_millis(20))
            .with_connect_timeout(Some(Duration::from_secs(10)))
            .with_retry(RetryPolicy {
                max_attempts: 3,
                attempt_timeout: Duration::from_secs(5),
                backoff: Duration::from_millis(10),
            })
    }

    pub fn received(&self) -> Vec<Received> {
        self.log.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.received().into_iter().map(|r| r.command).collect()
    }

    /// Commands of the given type, in arrival order.
    pub fn commands_of(&self, kind: &str) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.command.split('|').next() == Some(kind))
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` commands have arrived.
    pub fn wait_for_commands(&self, count: usize) -> Vec<Received> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let received = self.received();
            if received.len() >= count {
                return received;
            }
            assert!(Instant::now() < deadline, "timed out waiting for commands");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_loop.take() {
            // Wake the accept loop; it may not have bound yet.
            let deadline = Instant::now() + Duration::from_secs(10);
            while !handle.is_finished() && Instant::now() < deadline {
                let _ = UnixDomainSocket::connect(&self.socket);
                thread::sleep(Duration::from_millis(5));
            }
            let _ = handle.join();
        }
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

impl FakeServerBuilder {
    /// Behavior for successive connections; later connections respond.
    pub fn behaviors(mut self, behaviors: &[Behavior]) -> Self {
        self.behaviors = behaviors.to_vec();
        self
    }

    /// Create the channel only after `delay`.
    pub fn bind_after(mut self, delay: Duration) -> Self {
        self.bind_delay = delay;
        self
    }

    /// Pause before answering each image request.
    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn start(self) -> FakeServer {
        let dir = unique_temp_dir("imgproc-fake");
        let socket = dir.join("server.sock");
        let log = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let accept_loop = {
            let socket = socket.clone();
            let log = Arc::clone(&log);
            let connections = Arc::clone(&connections);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let bind_at = Instant::now() + self.bind_delay;
                while Instant::now() < bind_at {
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                let listener = UnixDomainSocket::bind(&socket).unwrap();
                loop {
                    let Ok(stream) = listener.accept() else {
                        return;
                    };
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    let behavior = self
                        .behaviors
                        .get(index)
                        .copied()
                        .unwrap_or(Behavior::Respond);
                    let log = Arc::clone(&log);
                    let delay = self.response_delay;
                    thread::spawn(move || serve(stream, index, behavior, delay, log));
                }
            })
        };

        FakeServer {
            dir,
            socket,
            log,
            connections,
            stop,
            accept_loop: Some(accept_loop),
        }
    }
}

fn serve(
    mut stream: IpcStream,
    connection: usize,
    behavior: Behavior,
    delay: Duration,
    log: Arc<Mutex<Vec<Received>>>,
) {
    while let Some(command) = read_frame(&mut stream) {
        let text = String::from_utf8(command).unwrap();
        log.lock().unwrap().push(Received {
            connection,
            command: text.clone(),
            at: Instant::now(),
        });

        let fields: Vec<&str> = text.split('|').collect();
        match (fields[0], behavior) {
            ("setup", Behavior::CloseAfterSetup) => return,
            ("setup" | "clear_cache", _) => {}
            (_, Behavior::Hang) => {}
            (_, Behavior::CloseOnRequest) => return,
            ("gets", _) => {
                thread::sleep(delay);
                let (width, height) = (fields[1].parse().unwrap(), fields[2].parse().unwrap());
                for path in &fields[3..] {
                    if write_frame(&mut stream, &png_for(path, width, height)).is_err() {
                        return;
                    }
                }
            }
            ("get", _) => {
                thread::sleep(delay);
                let (width, height) = (fields[2].parse().unwrap(), fields[3].parse().unwrap());
                if write_frame(&mut stream, &png_for(fields[1], width, height)).is_err() {
                    return;
                }
            }
            (other, _) => panic!("fake server got unknown command {other}"),
        }
    }
}

fn read_frame(stream: &mut IpcStream) -> Option<Vec<u8>> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).ok()?;
    let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut payload).ok()?;
    Some(payload)
}

fn write_frame(stream: &mut IpcStream, payload: &[u8]) -> std::io::Result<()> {
    stream.write_all(&(payload.len() as u32).to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()
}

/// Fill color the fake server uses for `path`.
pub fn color_for(path: &str) -> Rgb<u8> {
    let sum = path.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    Rgb([sum as u8, (sum >> 8) as u8, (sum >> 16) as u8])
}

/// PNG the fake server sends for `path`.
pub fn png_for(path: &str, width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, color_for(path));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "{prefix}-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
