//! Bundle storage seam.

use crate::bundler::CheckBundle;
use crate::error::BundleError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use std::pin::Pin;

/// Readable byte stream handed to an uploader
pub type UploadBody = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Stores bundle bytes and returns a storage key
#[async_trait]
pub trait BundleUploader: Send + Sync {
    /// Upload `length` bytes read from `body`
    ///
    /// # Errors
    ///
    /// Returns error on I/O or transport failure
    async fn upload(
        &self,
        body: UploadBody,
        length: u64,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Serialize `bundle` and hand it to `uploader`
///
/// # Errors
///
/// Returns `Upload` with a readable prefix when the uploader fails
pub async fn upload_bundle(
    uploader: &dyn BundleUploader,
    bundle: &CheckBundle,
) -> Result<String, BundleError> {
    let bytes = Bytes::from(serde_json::to_vec(bundle)?);
    let length = bytes.len() as u64;
    let body: UploadBody = Box::pin(stream::once(async move { Ok(bytes) }));

    uploader
        .upload(body, length)
        .await
        .map_err(|e| BundleError::Upload(e.to_string()))
}
