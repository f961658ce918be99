//! Coefficient selection: the N largest-magnitude AC positions per channel.

use crate::types::{NUM_COEFS, NUM_POSITIONS};
use crate::SignatureError;

/// Rank positions `1..NUM_POSITIONS` of a transformed channel by absolute
/// coefficient value and return the top [`NUM_COEFS`] as signed positions,
/// sorted ascending.
///
/// The DC at position 0 is excluded; it dominates magnitude and carries no
/// shape information. Ties on magnitude break toward the lower position so
/// the selected set is deterministic. A selected coefficient of exactly zero
/// means the channel has fewer than `NUM_COEFS` nonzero AC coefficients and
/// cannot be sign-encoded; such channels are rejected as degenerate.
pub(crate) fn top_coefficients(
    channel: &[f64],
    channel_index: usize,
) -> Result<[i16; NUM_COEFS], SignatureError> {
    debug_assert_eq!(channel.len(), NUM_POSITIONS);

    let mut positions: Vec<u16> = (1..NUM_POSITIONS as u16).collect();
    let rank = |&a: &u16, &b: &u16| {
        let ma = channel[a as usize].abs();
        let mb = channel[b as usize].abs();
        mb.total_cmp(&ma).then_with(|| a.cmp(&b))
    };
    positions.select_nth_unstable_by(NUM_COEFS - 1, rank);

    let mut out = [0i16; NUM_COEFS];
    for (slot, &pos) in out.iter_mut().zip(positions.iter().take(NUM_COEFS)) {
        let coef = channel[pos as usize];
        if coef == 0.0 {
            return Err(SignatureError::DegenerateChannel {
                channel: channel_index,
            });
        }
        *slot = if coef > 0.0 {
            pos as i16
        } else {
            -(pos as i16)
        };
    }
    out.sort_unstable();
    Ok(out)
}
