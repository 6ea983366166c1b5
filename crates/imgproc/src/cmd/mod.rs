use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use imgproc_client::{ClientConfig, RetryPolicy, ServerConfig, DEFAULT_SERVER_PROGRAM};
use imgproc_transport::DEFAULT_CHANNEL_NAME;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bench;
pub mod clear_cache;
pub mod fetch;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a batch of resized images and describe them.
    Fetch(FetchArgs),
    /// Time repeated batch requests for every image in a directory.
    Bench(BenchArgs),
    /// Drop the server's image cache.
    ClearCache,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, client: &ClientArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Fetch(args) => fetch::run(args, client, format),
        Command::Bench(args) => bench::run(args, client, format),
        Command::ClearCache => clear_cache::run(client, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the server; shared by every subcommand that talks to it.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Channel name, or a socket path when it contains '/'.
    #[arg(long, env = "IMGPROC_CHANNEL", default_value = DEFAULT_CHANNEL_NAME, global = true)]
    pub channel: String,
    /// Server executable to launch.
    #[arg(long, env = "IMGPROC_SERVER", default_value = DEFAULT_SERVER_PROGRAM, global = true)]
    pub server: PathBuf,
    /// Extra argument for the server executable (repeatable).
    #[arg(long = "server-arg", value_name = "ARG", global = true)]
    pub server_args: Vec<String>,
    /// Attach to a server that is already running.
    #[arg(long, env = "IMGPROC_NO_LAUNCH", global = true)]
    pub no_launch: bool,
    /// Server-side cache directory.
    #[arg(long, env = "IMGPROC_CACHE_DIR", default_value = "image_cache", global = true)]
    pub cache_dir: PathBuf,
    /// Server working directory.
    #[arg(long, env = "IMGPROC_WORKING_DIR", default_value = "./", global = true)]
    pub working_dir: PathBuf,
    /// Let the server read image files from several threads.
    #[arg(long, env = "IMGPROC_THREADED_READS", global = true)]
    pub threaded_reads: bool,
    /// Attempts per request, including the first.
    #[arg(long, env = "IMGPROC_ATTEMPTS", default_value_t = 3, global = true)]
    pub attempts: u32,
    /// Time bound for one attempt (e.g. 60s, 500ms).
    #[arg(long, env = "IMGPROC_TIMEOUT", default_value = "60s", global = true)]
    pub timeout: String,
    /// Pause before reconnecting after a failed attempt.
    #[arg(long, env = "IMGPROC_BACKOFF", default_value = "500ms", global = true)]
    pub backoff: String,
    /// Give up if the channel does not appear within this time.
    #[arg(long, env = "IMGPROC_CONNECT_TIMEOUT", global = true)]
    pub connect_timeout: Option<String>,
}

impl ClientArgs {
    pub fn config(&self) -> CliResult<ClientConfig> {
        let mut config = ClientConfig::new(&self.cache_dir, self.threaded_reads)
            .with_channel(self.channel.as_str())
            .with_working_dir(&self.working_dir)
            .with_retry(RetryPolicy {
                max_attempts: self.attempts,
                attempt_timeout: parse_duration(&self.timeout)?,
                backoff: parse_duration(&self.backoff)?,
            })
            .with_connect_timeout(
                self.connect_timeout
                    .as_deref()
                    .map(parse_duration)
                    .transpose()?,
            );

        config = if self.no_launch {
            config.attach()
        } else {
            config.with_server(ServerConfig::new(&self.server).with_args(self.server_args.clone()))
        };

        if self.attempts == 0 {
            return Err(CliError::new(USAGE, "--attempts must be at least 1"));
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Image paths, resolved by the server.
    #[arg(required = true)]
    pub paths: Vec<String>,
    /// Target width in pixels.
    #[arg(long, default_value_t = 128)]
    pub width: u32,
    /// Target height in pixels.
    #[arg(long, default_value_t = 128)]
    pub height: u32,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Directory whose images are requested in each iteration.
    pub dir: PathBuf,
    /// Timed iterations after the warm-up request.
    #[arg(long, default_value_t = 20)]
    pub iterations: u32,
    /// Target width in pixels.
    #[arg(long, default_value_t = 128)]
    pub width: u32,
    /// Target height in pixels.
    #[arg(long, default_value_t = 128)]
    pub height: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `"5s"`, `"150ms"` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
