use std::path::PathBuf;
use std::time::Duration;

use imgproc_frame::FrameConfig;
use imgproc_transport::ChannelName;

/// Name of the server executable launched by default.
pub const DEFAULT_SERVER_PROGRAM: &str = "img_process_server";

/// How each image request is bounded and retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first. Default: 3.
    pub max_attempts: u32,
    /// Time bound for a single attempt. Default: 60s.
    pub attempt_timeout: Duration,
    /// Pause between discarding a failed channel and reconnecting. Default: 0.5s.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(60),
            backoff: Duration::from_millis(500),
        }
    }
}

/// How the server process is launched and supervised.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Executable to launch.
    pub program: PathBuf,
    /// Extra command-line arguments.
    pub args: Vec<String>,
    /// Restarts allowed after the process exits. Default: 3.
    pub max_restarts: u32,
    /// Kill and reap the process when the client is dropped. Default: true.
    pub kill_on_drop: bool,
}

impl ServerConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            max_restarts: 3,
            kill_on_drop: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_kill_on_drop(mut self, kill_on_drop: bool) -> Self {
        self.kill_on_drop = kill_on_drop;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_PROGRAM)
    }
}

/// Configuration for [`crate::CommandClient`] and [`crate::ImageClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Channel the server listens on.
    pub channel: ChannelName,
    /// Server to launch; `None` attaches to a server that is already running.
    pub server: Option<ServerConfig>,
    /// Server-side disk cache directory, sent in `setup`.
    pub cache_dir: PathBuf,
    /// Server working directory, sent in `setup`.
    pub working_dir: PathBuf,
    /// Let the server read image files from several threads at once.
    pub threaded_reads: bool,
    /// Request timeout and retry budget.
    pub retry: RetryPolicy,
    /// Wait between attempts to open a channel that does not exist yet.
    pub connect_retry_interval: Duration,
    /// Give up opening the channel after this long. `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Framing limits and stream timeouts.
    pub frame: FrameConfig,
}

impl ClientConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, threaded_reads: bool) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            threaded_reads,
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<ChannelName>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Connect to an already running server instead of launching one.
    pub fn attach(mut self) -> Self {
        self.server = None;
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.retry.attempt_timeout = timeout;
        self
    }

    pub fn with_connect_retry_interval(mut self, interval: Duration) -> Self {
        self.connect_retry_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel: ChannelName::default(),
            server: Some(ServerConfig::default()),
            cache_dir: PathBuf::from("image_cache"),
            working_dir: PathBuf::from("./"),
            threaded_reads: false,
            retry: RetryPolicy::default(),
            connect_retry_interval: Duration::from_secs(1),
            connect_timeout: None,
            frame: FrameConfig::default(),
        }
    }
}
