use std::path::PathBuf;

use async_trait::async_trait;
use lumen_model::{ItemImage, LibraryItem};

use crate::error::Result;

/// Image-provider boundary: downloads a remote image to local storage.
///
/// The core only needs this single entry point; provider selection, retry
/// policy, and caching belong to the plugin layer.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Returns the local path the image was written to.
    async fn fetch_to_local(
        &self,
        item: &LibraryItem,
        image: &ItemImage,
    ) -> Result<PathBuf>;
}
