use std::sync::Arc;

use image::GenericImageView;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use lumen_model::{ItemImage, LibraryItem};

use crate::error::Result;
use crate::fs::FileSystem;
use crate::providers::ImageFetcher;

/// Refreshes the images attached to an item: fetches remote images to local
/// storage, probes dimensions, and records a content hash plus the on-disk
/// modification time.
///
/// The three steps fail independently; a broken image never aborts the
/// others.
pub struct ImageRefresher {
    fs: Arc<dyn FileSystem>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl std::fmt::Debug for ImageRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRefresher").finish()
    }
}

impl ImageRefresher {
    pub fn new(fs: Arc<dyn FileSystem>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fs, fetcher }
    }

    /// Refresh every outdated image on the item in place. Returns whether
    /// anything changed (callers persist the item when it did).
    pub async fn refresh_item_images(&self, item: &mut LibraryItem) -> Result<bool> {
        let mut changed = false;
        for index in 0..item.images.len() {
            let image = item.images[index].clone();
            if !self.is_outdated(&image).await {
                continue;
            }
            if let Some(updated) = self.refresh_one(item, image).await {
                item.images[index] = updated;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Remote images are always considered outdated until dimensions and
    /// hash have been computed; local images only when the on-disk
    /// modification time differs from the recorded one.
    async fn is_outdated(&self, image: &ItemImage) -> bool {
        if image.is_remote() {
            return image.width.is_none()
                || image.height.is_none()
                || image.content_hash.is_none();
        }
        let Some(path) = image.path.as_deref() else {
            return false;
        };
        match self.fs.entry(path).await {
            Ok(Some(entry)) => entry.modified != image.date_modified,
            Ok(None) => false,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "could not stat image");
                false
            }
        }
    }

    async fn refresh_one(
        &self,
        item: &LibraryItem,
        mut image: ItemImage,
    ) -> Option<ItemImage> {
        // Step 1: fetch remote images to local storage.
        if image.path.is_none() {
            match self.fetcher.fetch_to_local(item, &image).await {
                Ok(path) => image.path = Some(path),
                Err(err) => {
                    warn!(
                        item = %item.id,
                        url = image.remote_url.as_deref().unwrap_or(""),
                        error = %err,
                        "failed to fetch remote image"
                    );
                    return None;
                }
            }
        }
        let path = image.path.clone()?;

        // Step 2: dimensions and content hash from the local bytes.
        match self.fs.read_bytes(&path).await {
            Ok(bytes) => {
                match image::load_from_memory(&bytes) {
                    Ok(decoded) => {
                        let (width, height) = decoded.dimensions();
                        image.width = Some(width);
                        image.height = Some(height);
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "failed to decode image for dimensions"
                        );
                    }
                }
                let digest = Sha256::digest(&bytes);
                image.content_hash =
                    Some(digest.iter().map(|b| format!("{b:02x}")).collect());
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read image bytes"
                );
            }
        }

        // Step 3: record the on-disk modification time.
        match self.fs.entry(&path).await {
            Ok(Some(entry)) => image.date_modified = entry.modified,
            Ok(None) => {}
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to stat refreshed image"
                );
            }
        }

        Some(image)
    }
}
