//! Inverted index from signed coefficient positions to internal IDs.
//!
//! For every `(channel, sign, position)` triple the manager keeps the set of
//! internal IDs whose signature contains that signed position. Sets are
//! sorted vectors of dense `u32` IDs: membership tests are binary searches
//! and query-time iteration is a contiguous scan.
//!
//! A parallel mirror of the signatures themselves, indexed by internal ID,
//! keeps removal and re-keying at `O(channels * coefficients)` instead of a
//! full bucket sweep.

use signature::{Signature, NUM_CHANNELS, NUM_POSITIONS};

use crate::InternId;

const NUM_BUCKETS: usize = NUM_CHANNELS * 2 * NUM_POSITIONS;

pub struct BucketManager {
    /// Flat bucket array addressed by [`slot`].
    buckets: Vec<Vec<InternId>>,
    /// Signature of every live internal ID, same order as the image array.
    sigs: Vec<Signature>,
}

/// Flat index of the bucket for `signed_pos` in `channel`.
fn slot(channel: usize, signed_pos: i16) -> usize {
    debug_assert_ne!(signed_pos, 0, "zero positions are never indexed");
    let (sign, pos) = if signed_pos < 0 {
        (0usize, (-signed_pos) as usize)
    } else {
        (1usize, signed_pos as usize)
    };
    (channel * 2 + sign) * NUM_POSITIONS + pos
}

fn insert_member(bucket: &mut Vec<InternId>, id: InternId) {
    if let Err(i) = bucket.binary_search(&id) {
        bucket.insert(i, id);
    }
}

fn remove_member(bucket: &mut Vec<InternId>, id: InternId) {
    if let Ok(i) = bucket.binary_search(&id) {
        bucket.remove(i);
    }
}

impl BucketManager {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); NUM_BUCKETS],
            sigs: Vec::new(),
        }
    }

    /// Number of indexed signatures.
    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    /// Index `sig` under `id`. IDs are dense: `id` must equal [`len`](Self::len).
    pub fn add_signature(&mut self, id: InternId, sig: Signature) {
        debug_assert_eq!(id as usize, self.sigs.len(), "internal IDs are dense");
        for (c, channel) in sig.coefs.iter().enumerate() {
            for &coef in channel {
                insert_member(&mut self.buckets[slot(c, coef)], id);
            }
        }
        self.sigs.push(sig);
    }

    /// Stored signature of a live internal ID.
    pub fn signature(&self, id: InternId) -> &Signature {
        &self.sigs[id as usize]
    }

    /// Unindex `id` and return its signature.
    ///
    /// Mirrors the image array's swap-with-last discipline: the signature of
    /// the last internal ID is re-keyed to `id`, leaving bucket memberships
    /// identical to having inserted it under `id` in the first place.
    pub fn remove_signature(&mut self, id: InternId) -> Signature {
        let last = self.sigs.len() - 1;

        for c in 0..NUM_CHANNELS {
            for k in 0..self.sigs[id as usize].coefs[c].len() {
                let coef = self.sigs[id as usize].coefs[c][k];
                remove_member(&mut self.buckets[slot(c, coef)], id);
            }
        }

        if (id as usize) != last {
            for c in 0..NUM_CHANNELS {
                for k in 0..self.sigs[last].coefs[c].len() {
                    let coef = self.sigs[last].coefs[c][k];
                    let bucket = &mut self.buckets[slot(c, coef)];
                    remove_member(bucket, last as InternId);
                    insert_member(bucket, id);
                }
            }
        }

        self.sigs.swap_remove(id as usize)
    }

    /// Internal IDs whose signature contains `signed_pos` in `channel`,
    /// sorted ascending.
    pub fn members(&self, channel: usize, signed_pos: i16) -> &[InternId] {
        &self.buckets[slot(channel, signed_pos)]
    }

    /// Population count of every bucket, addressed as
    /// `(channel * 2 + sign) * NUM_POSITIONS + position`. Diagnostic only.
    pub fn bucket_sizes(&self) -> Vec<usize> {
        self.buckets.iter().map(Vec::len).collect()
    }
}

impl Default for BucketManager {
    fn default() -> Self {
        Self::new()
    }
}
