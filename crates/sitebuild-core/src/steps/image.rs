//! Image compression
//!
//! PNG is re-encoded at best compression with adaptive filtering, JPEG at the
//! configured quality. The smaller of the original and re-encoded bytes wins,
//! so an already-optimized file is never made larger. Formats without an
//! encoder here (svg, gif, ico, ...) pass through unchanged.

use ::image::codecs::jpeg::JpegEncoder;
use ::image::codecs::png::{CompressionType, FilterType, PngEncoder};
use ::image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::{extension, Asset};
use crate::error::{BuildError, Result};

const STEP: &str = "compress_image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// JPEG re-encode quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

pub(crate) fn compress(mut asset: Asset, options: &ImageOptions) -> Result<Asset> {
    let format = match extension(&asset.path).as_str() {
        "png" => ImageFormat::Png,
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        _ => return Ok(asset),
    };

    let img = ::image::load_from_memory_with_format(&asset.contents, format)
        .map_err(|e| BuildError::transform(STEP, &asset.path, e))?;

    let mut out = Cursor::new(Vec::new());
    let encoded = match format {
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Best,
            FilterType::Adaptive,
        )),
        _ => img.write_with_encoder(JpegEncoder::new_with_quality(
            &mut out,
            options.jpeg_quality.clamp(1, 100),
        )),
    };
    encoded.map_err(|e| BuildError::transform(STEP, &asset.path, e))?;

    let out = out.into_inner();
    if out.len() < asset.contents.len() {
        tracing::debug!(
            "{}: {} -> {} bytes",
            asset.path.display(),
            asset.contents.len(),
            out.len()
        );
        asset.contents = out;
    }
    Ok(asset)
}
