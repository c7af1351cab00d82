//! Photo fitting for inline storage.
//!
//! Photos live as base64 JPEG text inside a sheet cell, so the limit that
//! matters is the length of the encoded text, not the size of the upload.
//! [`fit_photo`] walks a fixed grid of edge sizes and JPEG qualities, largest
//! and best first, and keeps the first encoding that fits the budget.

use std::borrow::Cow;
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{HerdError, Result};
use crate::logging::OperationTimer;

/// Default budget, in base64 characters, for a stored photo
pub const DEFAULT_MAX_ENCODED_LEN: usize = 32_000;

/// Longest-edge candidates, tried in order
pub const EDGE_CANDIDATES: [u32; 5] = [800, 720, 640, 560, 480];

/// JPEG quality candidates, tried in order for every edge size
pub const QUALITY_CANDIDATES: [u8; 8] = [85, 80, 75, 70, 65, 60, 55, 50];

/// Edge size of the last-resort encoding
pub const FALLBACK_EDGE: u32 = 480;

/// Quality of the last-resort encoding
pub const FALLBACK_QUALITY: u8 = 50;

/// Outcome of fitting a photo to a budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FittedPhoto {
    /// Base64 text of the chosen JPEG
    #[serde(skip)]
    pub encoded: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Edge candidate that produced the output
    pub max_edge: u32,
    /// JPEG quality of the output
    pub quality: u8,
    /// False when the grid was exhausted and the last-resort encoding was used
    pub within_budget: bool,
    /// Number of grid encodings tried
    pub attempts: usize,
}

impl FittedPhoto {
    /// Length of the encoded text
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

/// Fit `image_bytes` into at most `max_encoded_len` base64 characters.
///
/// Returns the last-resort encoding when nothing in the grid fits.
pub fn fit(image_bytes: &[u8], max_encoded_len: usize) -> Result<String> {
    fit_photo(image_bytes, max_encoded_len).map(|fitted| fitted.encoded)
}

/// Like [`fit`], but reports which grid point was chosen.
pub fn fit_photo(image_bytes: &[u8], max_encoded_len: usize) -> Result<FittedPhoto> {
    let timer = OperationTimer::new("fit_photo");
    let source = decode_upright_rgb(image_bytes)?;
    debug!(
        width = source.width(),
        height = source.height(),
        input_bytes = image_bytes.len(),
        "Decoded photo"
    );

    let mut attempts = 0;
    for max_edge in EDGE_CANDIDATES {
        let scaled = scale_to_fit(&source, max_edge);

        for quality in QUALITY_CANDIDATES {
            attempts += 1;
            let jpeg = encode_jpeg(&scaled, quality)?;
            let encoded_len = base64_len(jpeg.len());
            debug!(max_edge, quality, encoded_len, "Tried photo encoding");

            if encoded_len <= max_encoded_len {
                let fitted = to_fitted(&jpeg, &scaled, max_edge, quality, true, attempts);
                info!(
                    max_edge,
                    quality,
                    encoded_len = fitted.encoded_len(),
                    "Photo fitted within budget"
                );
                timer.finish();
                return Ok(fitted);
            }
        }
    }

    let scaled = scale_to_fit(&source, FALLBACK_EDGE);
    let jpeg = encode_jpeg(&scaled, FALLBACK_QUALITY)?;
    let fitted = to_fitted(&jpeg, &scaled, FALLBACK_EDGE, FALLBACK_QUALITY, false, attempts);
    warn!(
        encoded_len = fitted.encoded_len(),
        max_encoded_len,
        "Photo exceeds budget at every size and quality, storing last-resort encoding"
    );
    timer.finish();
    Ok(fitted)
}

/// Decode, apply the stored orientation, and drop alpha/palette.
fn decode_upright_rgb(image_bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(image_bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .into_decoder()?;

    // Bad EXIF is not worth rejecting the photo over
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    Ok(DynamicImage::ImageRgb8(image.into_rgb8()))
}

/// Shrink so the longer edge is at most `max_edge`; never enlarges.
fn scale_to_fit(source: &DynamicImage, max_edge: u32) -> Cow<'_, DynamicImage> {
    if source.width() <= max_edge && source.height() <= max_edge {
        Cow::Borrowed(source)
    } else {
        Cow::Owned(source.resize(max_edge, max_edge, FilterType::Lanczos3))
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, quality))
        .map_err(|err| HerdError::Encode(err.to_string()))?;
    Ok(jpeg)
}

/// Padded base64 length of `byte_len` bytes
const fn base64_len(byte_len: usize) -> usize {
    byte_len.div_ceil(3) * 4
}

fn to_fitted(
    jpeg: &[u8],
    image: &DynamicImage,
    max_edge: u32,
    quality: u8,
    within_budget: bool,
    attempts: usize,
) -> FittedPhoto {
    FittedPhoto {
        encoded: STANDARD.encode(jpeg),
        width: image.width(),
        height: image.height(),
        max_edge,
        quality,
        within_budget,
        attempts,
    }
}
