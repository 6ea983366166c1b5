//! Commands understood by the image-processing server.
//!
//! On the wire a command is UTF-8 text: the command type followed by its
//! arguments, all joined with `|`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, Result};

/// Field separator of the command encoding.
pub const DELIMITER: char = '|';

pub const SETUP: &str = "setup";
pub const GETS: &str = "gets";
pub const GET: &str = "get";
pub const CLEAR_CACHE: &str = "clear_cache";

/// A single logical request to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Configure the server's disk cache, working directory and read mode.
    /// No response.
    Setup {
        cache_dir: PathBuf,
        working_dir: PathBuf,
        threaded_reads: bool,
    },
    /// Fetch a batch of images resized to `width`x`height`. One response
    /// frame per path, in request order.
    Gets {
        width: u32,
        height: u32,
        paths: Vec<String>,
    },
    /// Fetch a single image. One response frame.
    Get {
        path: String,
        width: u32,
        height: u32,
    },
    /// Drop everything the server has cached. No response.
    ClearCache,
}

impl Command {
    pub fn setup(cache_dir: &Path, working_dir: &Path, threaded_reads: bool) -> Self {
        Command::Setup {
            cache_dir: cache_dir.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            threaded_reads,
        }
    }

    pub fn gets<S: AsRef<str>>(paths: &[S], width: u32, height: u32) -> Self {
        Command::Gets {
            width,
            height,
            paths: paths.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }

    pub fn get(path: impl Into<String>, width: u32, height: u32) -> Self {
        Command::Get {
            path: path.into(),
            width,
            height,
        }
    }

    /// Type tag sent as the first field.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Setup { .. } => SETUP,
            Command::Gets { .. } => GETS,
            Command::Get { .. } => GET,
            Command::ClearCache => CLEAR_CACHE,
        }
    }

    /// Arguments in wire order, stringified.
    pub fn args(&self) -> Vec<String> {
        match self {
            Command::Setup {
                cache_dir,
                working_dir,
                threaded_reads,
            } => vec![
                cache_dir.to_string_lossy().into_owned(),
                working_dir.to_string_lossy().into_owned(),
                threaded_reads.to_string(),
            ],
            Command::Gets {
                width,
                height,
                paths,
            } => {
                let mut args = Vec::with_capacity(paths.len() + 2);
                args.push(width.to_string());
                args.push(height.to_string());
                args.extend(paths.iter().cloned());
                args
            }
            Command::Get {
                path,
                width,
                height,
            } => vec![path.clone(), width.to_string(), height.to_string()],
            Command::ClearCache => Vec::new(),
        }
    }

    /// Number of response frames the server sends back.
    pub fn expected_responses(&self) -> usize {
        match self {
            Command::Gets { paths, .. } => paths.len(),
            Command::Get { .. } => 1,
            Command::Setup { .. } | Command::ClearCache => 0,
        }
    }

    /// Check that every argument survives the `|`-joined encoding.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Gets { paths, .. } if paths.is_empty() => {
                return Err(ClientError::InvalidArgument(
                    "gets needs at least one path".to_string(),
                ));
            }
            Command::Gets { paths, .. } if paths.iter().any(String::is_empty) => {
                return Err(ClientError::InvalidArgument(
                    "image path must not be empty".to_string(),
                ));
            }
            Command::Get { path, .. } if path.is_empty() => {
                return Err(ClientError::InvalidArgument(
                    "image path must not be empty".to_string(),
                ));
            }
            Command::Setup {
                cache_dir,
                working_dir,
                ..
            } => {
                if let Some(dir) = [cache_dir, working_dir]
                    .into_iter()
                    .find(|dir| dir.to_str().is_none())
                {
                    return Err(ClientError::InvalidArgument(format!(
                        "{} is not valid UTF-8",
                        dir.display()
                    )));
                }
            }
            _ => {}
        }

        if let Some(arg) = self.args().into_iter().find(|a| a.contains(DELIMITER)) {
            return Err(ClientError::InvalidArgument(format!(
                "'{arg}' contains the '{DELIMITER}' delimiter"
            )));
        }
        Ok(())
    }

    /// Validate and encode to the wire payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(self.to_string().into_bytes())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())?;
        for arg in self.args() {
            write!(f, "{DELIMITER}{arg}")?;
        }
        Ok(())
    }
}
