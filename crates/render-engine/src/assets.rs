//! Overlay image decoding.

use std::path::Path;

use quickedit_composition_core::overlay::{ImageCatalog, ImageInfo};

/// Fully decodes each image with the `image` crate.
///
/// Decoding the whole file, rather than only reading its header, catches
/// truncated or corrupt images before the encoder starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodedImageCatalog;

impl ImageCatalog for DecodedImageCatalog {
    fn image_info(&self, path: &Path) -> Result<ImageInfo, String> {
        let reader = image::ImageReader::open(path).map_err(|e| e.to_string())?;
        let decoded = reader
            .with_guessed_format()
            .map_err(|e| e.to_string())?
            .decode()
            .map_err(|e| e.to_string())?;
        tracing::debug!(
            path = %path.display(),
            width = decoded.width(),
            height = decoded.height(),
            "Decoded overlay image"
        );
        Ok(ImageInfo {
            width: decoded.width(),
            height: decoded.height(),
        })
    }
}
