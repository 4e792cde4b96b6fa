//! Loading, re-encoding and sampling of trash images.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::providers::ImageAttachment;

/// File extensions picked up when scanning a dataset directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// How many images a random sample holds by default.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// A decoded image ready to be uploaded.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// RGB JPEG re-encoding of the source image.
    pub jpeg: Vec<u8>,
}

impl ImageInfo {
    pub fn attachment(&self) -> ImageAttachment {
        ImageAttachment::jpeg(self.jpeg.clone())
    }
}

/// Read and decode an image, re-encoding it as JPEG for upload.
pub fn load_image_from_path(path: &Path) -> Result<ImageInfo, ImageError> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| ImageError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(ImageInfo {
        path: path.to_path_buf(),
        name,
        width: decoded.width(),
        height: decoded.height(),
        jpeg: encode_jpeg(&decoded)?,
    })
}

/// Encode as an RGB JPEG; alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let rgb = image.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder.encode_image(&rgb).map_err(ImageError::Encode)?;
    Ok(out)
}

/// Load every path, skipping (and logging) the ones that fail.
pub fn load_images(paths: &[PathBuf]) -> Vec<ImageInfo> {
    let images: Vec<ImageInfo> = paths
        .iter()
        .filter_map(|path| match load_image_from_path(path) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping image");
                None
            }
        })
        .collect();
    tracing::info!(loaded = images.len(), requested = paths.len(), "Loaded images");
    images
}

/// Where the bundled dataset is unpacked by default.
pub fn default_dataset_roots() -> Vec<PathBuf> {
    let base = PathBuf::from("complete_dataset");
    let nested = base.join("complete_dataset");
    vec![base, nested]
}

/// Every image file below the given roots, recursively and without
/// duplicates. Roots that do not exist are ignored.
pub fn find_dataset_images(roots: &[PathBuf]) -> Vec<PathBuf> {
    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut seen = BTreeSet::new();
    for root in roots.iter().filter(|r| r.is_dir()) {
        let escaped = glob::Pattern::escape(&root.to_string_lossy());
        for ext in IMAGE_EXTENSIONS {
            let pattern = format!("{escaped}/**/*.{ext}");
            let paths = match glob::glob_with(&pattern, options) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(%pattern, error = %e, "Invalid dataset pattern");
                    continue;
                }
            };
            for path in paths.filter_map(Result::ok).filter(|p| p.is_file()) {
                seen.insert(std::fs::canonicalize(&path).unwrap_or(path));
            }
        }
    }

    tracing::debug!(found = seen.len(), "Scanned dataset directories");
    seen.into_iter().collect()
}

/// Pick up to `max_count` distinct files uniformly at random.
pub fn sample_images<R: Rng + ?Sized>(
    files: &[PathBuf],
    max_count: usize,
    rng: &mut R,
) -> Vec<PathBuf> {
    if files.len() <= max_count {
        return files.to_vec();
    }
    files.choose_multiple(rng, max_count).cloned().collect()
}
