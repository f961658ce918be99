//! Image loading and YIQ plane export for wavedb.
//!
//! The database core never touches pixels; this crate is the narrow decoder
//! interface in front of it. It loads a file with the `image` crate,
//! rescales to the fixed signature grid when needed, and exports three
//! parallel row-major `f64` planes in the YIQ color space together with the
//! original resolution.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

/// Decoder failures, tagged with the offending path.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decode {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Decoded pixel data: YIQ planes at the requested grid size plus the
/// original image resolution (clamped to `u16`).
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Row-major planes of `side * side` samples each, in Y, I, Q order.
    pub planes: [Vec<f64>; 3],
    /// Width of the image before rescaling.
    pub width: u16,
    /// Height of the image before rescaling.
    pub height: u16,
}

/// Load `path`, rescale to `side`×`side` if not already exact, and export
/// YIQ planes.
pub fn decode_file(path: impl AsRef<Path>, side: u32) -> Result<DecodedImage, DecodeError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| DecodeError::Image {
        path: path.display().to_string(),
        source,
    })?;
    Ok(decode_image(&img, side))
}

/// Export YIQ planes from an already-decoded image.
pub fn decode_image(img: &DynamicImage, side: u32) -> DecodedImage {
    let (orig_w, orig_h) = img.dimensions();

    let rgb = if orig_w == side && orig_h == side {
        img.to_rgb8()
    } else {
        img.resize_exact(side, side, FilterType::Triangle).to_rgb8()
    };

    let samples = (side * side) as usize;
    let mut y = Vec::with_capacity(samples);
    let mut i = Vec::with_capacity(samples);
    let mut q = Vec::with_capacity(samples);

    for px in rgb.pixels() {
        let r = f64::from(px[0]);
        let g = f64::from(px[1]);
        let b = f64::from(px[2]);
        y.push(0.299 * r + 0.587 * g + 0.114 * b);
        i.push(0.596 * r - 0.275 * g - 0.321 * b);
        q.push(0.212 * r - 0.523 * g + 0.311 * b);
    }

    DecodedImage {
        planes: [y, i, q],
        width: clamp_dim(orig_w),
        height: clamp_dim(orig_h),
    }
}

fn clamp_dim(dim: u32) -> u16 {
    u16::try_from(dim).unwrap_or(u16::MAX)
}
