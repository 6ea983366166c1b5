//! Client for a local image-processing server.
//!
//! The server runs as a separate process and answers resize requests over a
//! named channel. This crate opens that channel, frames every message with
//! a length prefix, and fetches images in batches with a per-attempt
//! timeout and reconnecting retries.
//!
//! # Crate Structure
//!
//! - [`transport`]: channel names, Unix domain socket streams, fault classification
//! - [`frame`]: length-prefixed message framing
//! - [`client`]: commands, connection management, retrying image requests
//!
//! ```no_run
//! use imgproc::client::{ClientConfig, ImageClient};
//!
//! # fn main() -> imgproc::client::Result<()> {
//! let client = ImageClient::connect(ClientConfig::new("image_cache", true))?;
//! let images = client.ask_for_images(&["a.png", "b.png"], 64, 64)?;
//! assert_eq!(images.len(), 2);
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use imgproc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use imgproc_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use imgproc_client::*;
}

pub use imgproc_client::{ClientConfig, ClientError, ImageClient};
