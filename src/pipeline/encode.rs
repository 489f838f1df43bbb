//! Screenshot encoding: PNG on disk → base64 PNG wrapped in `ImageData`.
//!
//! A 1920×1080 capture is larger than most vision models ingest at full
//! resolution, so the image is downscaled until its longest side fits
//! `max_dim` before encoding. PNG is kept because logo edges and small
//! brand text survive it intact.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Load a screenshot from disk and encode it for the vision API.
pub fn encode_screenshot(path: &Path, max_dim: u32) -> Result<ImageData, image::ImageError> {
    let img = image::open(path)?;
    encode_image(&fit_within(img, max_dim))
}

/// Downscale so neither side exceeds `max_dim`, preserving aspect ratio.
pub fn fit_within(img: DynamicImage, max_dim: u32) -> DynamicImage {
    if img.width() <= max_dim && img.height() <= max_dim {
        return img;
    }
    debug!(
        "Downscaling screenshot {}x{} to fit {}px",
        img.width(),
        img.height(),
        max_dim
    );
    img.resize(max_dim, max_dim, FilterType::Triangle)
}

/// Encode an image as base64 PNG with `detail: "high"`.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded screenshot → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
