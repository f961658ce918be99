//! Weighted coefficient-overlap queries.
//!
//! Scores start from a DC seed (the negatively weighted L1 distance between
//! the probe's and the candidate's color averages) and grow by one weight
//! table entry for every signed coefficient position the candidate shares
//! with the probe. Only `channels * coefficients` buckets are visited per
//! query, independent of database size.

use hashbrown::HashSet;

use signature::types::{weight_bin, WEIGHTS};
use signature::{DcTriple, Signature, NUM_CHANNELS};

use crate::{InternId, MemDb, UserId};

/// Probe description for a similarity query.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub signature: Signature,
    pub dc: DcTriple,
    /// Maximum number of hits to return. Zero yields an empty result.
    pub limit: usize,
    /// Drop candidates scoring below this value.
    pub min_score: Option<f64>,
    /// User IDs to exclude from the result (e.g. the probe image itself).
    pub exclude: Option<HashSet<UserId>>,
}

impl QueryParams {
    pub fn new(signature: Signature, dc: DcTriple, limit: usize) -> Self {
        Self {
            signature,
            dc,
            limit,
            min_score: None,
            exclude: None,
        }
    }
}

/// One ranked query hit. Higher score = more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub user_id: UserId,
    pub score: f64,
}

impl MemDb {
    /// Rank stored images by weighted coefficient overlap with the probe.
    ///
    /// Ties on score break toward the older internal ID so results are
    /// deterministic for a fixed database state.
    pub fn query(&self, params: &QueryParams) -> Vec<QueryHit> {
        let images = self.images();
        if params.limit == 0 || images.is_empty() {
            return Vec::new();
        }

        // DC seed: color-average distance, negatively weighted.
        let mut scores: Vec<f64> = images
            .iter()
            .map(|img| {
                -(0..NUM_CHANNELS)
                    .map(|c| WEIGHTS[0][c] * (params.dc[c] - img.dc[c]).abs())
                    .sum::<f64>()
            })
            .collect();

        // Coefficient overlap: one bucket visit per probe position.
        let buckets = self.buckets();
        for (c, channel) in params.signature.coefs.iter().enumerate() {
            for &coef in channel {
                let w = WEIGHTS[weight_bin(coef.unsigned_abs() as usize)][c];
                for &iid in buckets.members(c, coef) {
                    scores[iid as usize] += w;
                }
            }
        }

        let mut ranked: Vec<InternId> = (0..images.len() as InternId)
            .filter(|&iid| {
                let img = &images[iid as usize];
                if let Some(exclude) = &params.exclude {
                    if exclude.contains(&img.user_id) {
                        return false;
                    }
                }
                if let Some(min) = params.min_score {
                    if scores[iid as usize] < min {
                        return false;
                    }
                }
                true
            })
            .collect();

        ranked.sort_unstable_by(|&a, &b| {
            scores[b as usize]
                .total_cmp(&scores[a as usize])
                .then_with(|| a.cmp(&b))
        });
        ranked.truncate(params.limit);

        ranked
            .into_iter()
            .map(|iid| QueryHit {
                user_id: images[iid as usize].user_id,
                score: scores[iid as usize],
            })
            .collect()
    }
}

/// Score of a perfect self-match for a probe signature: every coefficient
/// hit at full weight with zero DC distance.
pub fn max_score(signature: &Signature) -> f64 {
    signature
        .coefs
        .iter()
        .enumerate()
        .map(|(c, channel)| {
            channel
                .iter()
                .map(|&coef| WEIGHTS[weight_bin(coef.unsigned_abs() as usize)][c])
                .sum::<f64>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use crate::ImageRecord;

    fn probe_from(record: &ImageRecord, limit: usize) -> QueryParams {
        QueryParams::new(record.signature.clone(), record.dc, limit)
    }

    #[test]
    fn empty_database_returns_empty() {
        let db = MemDb::new();
        let hits = db.query(&probe_from(&record(1, 10), 5));
        assert!(hits.is_empty());
    }

    #[test]
    fn zero_limit_returns_empty() {
        let mut db = MemDb::new();
        db.add_image(record(1, 10)).unwrap();
        let hits = db.query(&probe_from(&record(1, 10), 0));
        assert!(hits.is_empty());
    }

    #[test]
    fn self_match_scores_full_weight() {
        let mut db = MemDb::new();
        let rec = record(1, 10);
        db.add_image(rec.clone()).unwrap();

        let hits = db.query(&probe_from(&rec, 1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user_id, 1);
        assert!((hits[0].score - max_score(&rec.signature)).abs() < 1e-9);
    }

    #[test]
    fn closer_signature_ranks_first() {
        let mut db = MemDb::new();
        let a = record(1, 10);
        // b shares no positions with a and sits further away in DC.
        let mut b = record(2, 5000);
        b.dc = [0.9, 0.1, -0.1];
        db.add_image(a.clone()).unwrap();
        db.add_image(b).unwrap();

        let hits = db.query(&probe_from(&a, 2));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].user_id, 1);
        assert_eq!(hits[1].user_id, 2);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn partial_overlap_scores_between_none_and_full() {
        let mut db = MemDb::new();
        let a = record(1, 10);
        // Overlaps a on half of each channel's positions.
        let mut partial = record(2, 30);
        partial.dc = a.dc;
        db.add_image(a.clone()).unwrap();
        db.add_image(partial).unwrap();

        let hits = db.query(&probe_from(&a, 2));
        assert_eq!(hits[0].user_id, 1);
        assert_eq!(hits[1].user_id, 2);
        assert!(hits[1].score > 0.0, "shared positions must contribute");
        assert!(hits[1].score < hits[0].score);
    }

    #[test]
    fn min_score_filters_candidates() {
        let mut db = MemDb::new();
        let a = record(1, 10);
        let mut far = record(2, 5000);
        far.dc = [0.9, 0.2, -0.3];
        db.add_image(a.clone()).unwrap();
        db.add_image(far).unwrap();

        let mut params = probe_from(&a, 10);
        params.min_score = Some(max_score(&a.signature) / 2.0);
        let hits = db.query(&params);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user_id, 1);
    }

    #[test]
    fn exclude_filter_drops_user_ids() {
        let mut db = MemDb::new();
        let a = record(1, 10);
        let mut b = record(2, 10);
        b.dc = a.dc;
        db.add_image(a.clone()).unwrap();
        db.add_image(b).unwrap();

        let mut params = probe_from(&a, 10);
        params.exclude = Some([1u64].into_iter().collect());
        let hits = db.query(&params);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user_id, 2);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut db = MemDb::new();
        // Two identical signatures at identical DC: a perfect tie.
        let a = record(10, 50);
        let mut b = record(20, 50);
        b.dc = a.dc;
        db.add_image(a.clone()).unwrap();
        db.add_image(b).unwrap();

        let hits = db.query(&probe_from(&a, 2));
        assert_eq!(hits[0].user_id, 10);
        assert_eq!(hits[1].user_id, 20);
        assert!((hits[0].score - hits[1].score).abs() < 1e-12);
    }

    #[test]
    fn limit_truncates_ranked_results() {
        let mut db = MemDb::new();
        for uid in 1..=6u64 {
            db.add_image(record(uid, (uid as i16) * 200)).unwrap();
        }
        let probe = db.image_record(3).unwrap();
        let hits = db.query(&probe_from(&probe, 2));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].user_id, 3);
    }

    #[test]
    fn removal_then_query_matches_fresh_database() {
        let mut db = MemDb::new();
        for uid in 1..=4u64 {
            db.add_image(record(uid, (uid as i16) * 300)).unwrap();
        }
        db.remove_image(2).unwrap();

        let mut fresh = MemDb::new();
        // Same live set in the post-removal internal order.
        for uid in [1u64, 4, 3] {
            fresh.add_image(record(uid, (uid as i16) * 300)).unwrap();
        }

        let probe = record(3, 3 * 300);
        let got: Vec<UserId> = db
            .query(&probe_from(&probe, 10))
            .into_iter()
            .map(|h| h.user_id)
            .collect();
        let want: Vec<UserId> = fresh
            .query(&probe_from(&probe, 10))
            .into_iter()
            .map(|h| h.user_id)
            .collect();
        assert_eq!(got, want);
    }
}
