//! Signature types and the scoring constants shared with the query engine.
//!
//! The constants here are part of the on-disk format: any change to the grid
//! size, coefficient count, or weight table invalidates every stored
//! signature and must come with a format version bump.

/// Side length of the reduced image grid. Must be a power of two.
pub const IMG_SIDE: usize = 128;

/// Number of wavelet coefficient positions per channel (`IMG_SIDE`²).
pub const NUM_POSITIONS: usize = IMG_SIDE * IMG_SIDE;

/// Color channels, in YIQ order.
pub const NUM_CHANNELS: usize = 3;

/// Coefficients kept per channel after selection.
pub const NUM_COEFS: usize = 40;

/// Per-tier, per-channel score weights for the scanned-photograph profile.
///
/// Rows are magnitude tiers as computed by [`weight_bin`]; columns are the
/// Y, I, and Q channels. Row 0 doubles as the weight applied to the DC
/// (color average) distance when seeding query scores. Insert-time
/// signatures and query-time scoring must read the same table.
pub const WEIGHTS: [[f64; NUM_CHANNELS]; 6] = [
    [5.00, 19.21, 34.37],
    [0.83, 1.26, 0.36],
    [1.01, 0.44, 0.45],
    [0.52, 0.53, 0.14],
    [0.47, 0.28, 0.18],
    [0.30, 0.14, 0.27],
];

/// Magnitude tier of a coefficient position.
///
/// Positions closer to the origin of the transformed grid carry coarser,
/// more perceptually important detail and land in lower tiers. The tier is
/// `min(5, floor(log2(max(x, y))))` for grid coordinates `(x, y)`, so tier 0
/// covers the coarsest AC coefficients and tier 5 everything from the 32nd
/// row/column outward.
pub fn weight_bin(position: usize) -> usize {
    debug_assert!(position > 0 && position < NUM_POSITIONS);
    let x = position % IMG_SIDE;
    let y = position / IMG_SIDE;
    let m = x.max(y);
    if m == 0 {
        0
    } else {
        (m.ilog2() as usize).min(5)
    }
}

/// DC (position-0) value of each YIQ channel, normalized to the unit-ish
/// range produced by [`crate::extract`].
pub type DcTriple = [f64; NUM_CHANNELS];

/// Compact perceptual fingerprint of one image.
///
/// Each channel holds the positions of the `NUM_COEFS` largest-magnitude AC
/// coefficients, negated when the coefficient itself is negative. Position 0
/// (the DC) is never present and the value 0 is forbidden. Channels are kept
/// sorted ascending, so derived equality is insensitive to selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub coefs: [[i16; NUM_COEFS]; NUM_CHANNELS],
}

impl Signature {
    /// Signed positions of one channel.
    pub fn channel(&self, c: usize) -> &[i16; NUM_COEFS] {
        &self.coefs[c]
    }

    /// Whether `signed_pos` is part of channel `c`.
    pub fn contains(&self, c: usize, signed_pos: i16) -> bool {
        self.coefs[c].binary_search(&signed_pos).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_bin_tiers() {
        // First row of the grid: tier follows the column index.
        assert_eq!(weight_bin(1), 0);
        assert_eq!(weight_bin(2), 1);
        assert_eq!(weight_bin(3), 1);
        assert_eq!(weight_bin(4), 2);
        assert_eq!(weight_bin(7), 2);
        assert_eq!(weight_bin(8), 3);
        assert_eq!(weight_bin(16), 4);
        assert_eq!(weight_bin(32), 5);
        // Everything past the 64th row/column is clamped to tier 5.
        assert_eq!(weight_bin(127), 5);
        assert_eq!(weight_bin(NUM_POSITIONS - 1), 5);
    }

    #[test]
    fn weight_bin_uses_larger_coordinate() {
        // Position (x=1, y=16) sits in tier 4 because of the row.
        assert_eq!(weight_bin(16 * IMG_SIDE + 1), 4);
        // Position (x=16, y=1) mirrors it.
        assert_eq!(weight_bin(IMG_SIDE + 16), 4);
    }

    #[test]
    fn coarse_tiers_outweigh_fine_tiers() {
        for c in 0..NUM_CHANNELS {
            assert!(WEIGHTS[0][c] > WEIGHTS[5][c]);
        }
        // The chroma channels dominate the DC tier; luminance dominates most
        // AC tiers. Spot-check the anchor values the format depends on.
        assert_eq!(WEIGHTS[0], [5.00, 19.21, 34.37]);
        assert_eq!(WEIGHTS[5], [0.30, 0.14, 0.27]);
    }

    #[test]
    fn signature_equality_is_positional() {
        let a = Signature {
            coefs: [[0; NUM_COEFS]; NUM_CHANNELS],
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.coefs[1][3] = 17;
        assert_ne!(a, b);
    }

    #[test]
    fn contains_searches_sorted_channel() {
        let mut coefs = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (i, slot) in coefs[0].iter_mut().enumerate() {
            *slot = (i as i16 + 1) * 3;
        }
        let sig = Signature { coefs };
        assert!(sig.contains(0, 3));
        assert!(sig.contains(0, 120));
        assert!(!sig.contains(0, 4));
        assert!(!sig.contains(1, 3));
    }
}
