use std::path::Path;

use image::RgbImage;
use tracing::instrument;

use crate::{Error, Result};

/// Reads `path` into memory and decodes it, so file names the platform can
/// open but codecs can't guess from are still accepted. Gray and alpha
/// images come back as 3-channel RGB.
#[instrument(level = "debug")]
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(Error::EmptyFile(path.to_path_buf()));
    }
    let image = image::load_from_memory(&bytes).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    log::trace!("Decoded {:?} {}x{}", image.color(), image.width(), image.height());
    Ok(image.to_rgb8())
}
