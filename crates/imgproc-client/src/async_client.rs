//! Tokio front end for [`ImageClient`].

use std::sync::Arc;

use bytes::Bytes;

use crate::config::ClientConfig;
use crate::decode::{CodecDecoder, ImageDecoder};
use crate::error::{ClientError, Result};
use crate::requester::ImageClient;

/// Runs an [`ImageClient`] on tokio's blocking thread pool.
///
/// Cheap to clone; clones share one channel and queue behind each other
/// exactly like threads sharing an `ImageClient`.
#[derive(Debug)]
pub struct AsyncImageClient<D: ImageDecoder = CodecDecoder> {
    inner: Arc<ImageClient<D>>,
}

impl<D: ImageDecoder> Clone for AsyncImageClient<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AsyncImageClient<CodecDecoder> {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with_decoder(config, CodecDecoder).await
    }
}

impl<D: ImageDecoder> AsyncImageClient<D> {
    pub async fn connect_with_decoder(config: ClientConfig, decoder: D) -> Result<Self> {
        let client =
            blocking(move || ImageClient::connect_with_decoder(config, decoder)).await?;
        Ok(Self::from(client))
    }

    pub async fn ask_for_images(
        &self,
        paths: Vec<String>,
        width: u32,
        height: u32,
    ) -> Result<Vec<D::Image>> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.ask_for_images(&paths, width, height)).await
    }

    pub async fn ask_for_image(&self, path: String, width: u32, height: u32) -> Result<D::Image> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.ask_for_image(&path, width, height)).await
    }

    pub async fn ask_for_image_bytes(
        &self,
        paths: Vec<String>,
        width: u32,
        height: u32,
    ) -> Result<Vec<Bytes>> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.ask_for_image_bytes(&paths, width, height)).await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.clear_cache()).await
    }

    pub fn current_command(&self) -> Option<String> {
        self.inner.current_command()
    }

    /// The wrapped blocking client.
    pub fn blocking_client(&self) -> &ImageClient<D> {
        &self.inner
    }
}

impl<D: ImageDecoder> From<ImageClient<D>> for AsyncImageClient<D> {
    fn from(client: ImageClient<D>) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ClientError::Worker(format!("blocking task failed: {err}")))?
}
