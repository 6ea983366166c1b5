//! Client for the image-processing server.
//!
//! [`ImageClient`] launches (or attaches to) the server, opens its named
//! channel, sends the `setup` handshake, and then fetches resized images
//! in batches. Requests are serialized on the one channel. Every attempt is
//! bounded by a timeout; a timed-out or broken attempt is cancelled and
//! retried on a fresh channel.

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod connector;
pub mod decode;
pub mod error;
pub mod requester;
pub mod server;

#[cfg(feature = "async")]
pub mod async_client;

#[cfg(feature = "async")]
pub use async_client::AsyncImageClient;
pub use client::CommandClient;
pub use command::{Command, CLEAR_CACHE, DELIMITER, GET, GETS, SETUP};
pub use config::{ClientConfig, RetryPolicy, ServerConfig, DEFAULT_SERVER_PROGRAM};
pub use connection::Connection;
pub use connector::ChannelConnector;
pub use decode::{CodecDecoder, DecodeError, ImageDecoder, RawDecoder};
pub use error::{ClientError, Result};
pub use requester::ImageClient;
pub use server::ServerProcess;
