//! Standard 2D Haar decomposition.
//!
//! The transform is performed in place on a row-major `f64` grid: every row
//! is fully decomposed first, then every column. A single 1D pass repeatedly
//! halves the active prefix, writing pairwise sums (scaled by 1/√2) into the
//! low half and pairwise differences into the high half until one sample
//! remains. The DC coefficient ends up at index 0.
//!
//! Dimensions must be powers of two; violating that is a caller bug, not a
//! recoverable condition, and panics.

use std::f64::consts::SQRT_2;

/// Decompose one row or column in place. `scratch` must be at least
/// `data.len()` long.
fn haar_1d(data: &mut [f64], scratch: &mut [f64]) {
    let mut len = data.len();
    while len > 1 {
        let half = len / 2;
        for i in 0..half {
            let a = data[2 * i];
            let b = data[2 * i + 1];
            scratch[i] = (a + b) / SQRT_2;
            scratch[half + i] = (a - b) / SQRT_2;
        }
        data[..len].copy_from_slice(&scratch[..len]);
        len = half;
    }
}

/// Standard 2D Haar transform of a `width`×`height` row-major grid.
///
/// # Panics
///
/// Panics when `width` or `height` is not a power of two, or when `data`
/// does not hold exactly `width * height` samples.
pub fn haar_2d(data: &mut [f64], width: usize, height: usize) {
    assert!(
        width.is_power_of_two() && height.is_power_of_two(),
        "haar dimensions must be powers of two, got {width}x{height}"
    );
    assert_eq!(
        data.len(),
        width * height,
        "haar input length must equal width * height"
    );

    let mut scratch = vec![0.0; width.max(height)];

    for row in data.chunks_exact_mut(width) {
        haar_1d(row, &mut scratch);
    }

    let mut column = vec![0.0; height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        haar_1d(&mut column, &mut scratch);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }
}
