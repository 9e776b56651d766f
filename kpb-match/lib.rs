//! Descriptor matching between consecutive frames.
//!
//! Brute-force or kd-tree neighbour search, combined with either a plain
//! nearest-neighbour selection (optionally cross-checked) or the two-nearest
//! distance-ratio test. The distance metric always follows the descriptor
//! variant: Hamming for binary rows, Euclidean for floating-point rows.

mod brute_force;
mod config;
mod distance;
mod error;
mod kdtree;

pub use config::{MatcherConfig, MatcherKind, SelectorKind};
pub use distance::DescriptorElement;
pub use error::{MatchError, MatchResult};

use distance::Candidate;
use kpb_core::{DescriptorMatrix, Descriptors, Keypoint, Match};

/// Match the previous frame (query) against the current frame (train).
///
/// Returned matches are ordered by query index. Empty inputs produce an
/// empty result; descriptors of different families or widths, or row counts
/// that disagree with the keypoints, are errors.
pub fn match_descriptors(
    prev_keypoints: &[Keypoint],
    cur_keypoints: &[Keypoint],
    prev: &Descriptors,
    cur: &Descriptors,
    cfg: &MatcherConfig,
) -> MatchResult<Vec<Match>> {
    cfg.validate()?;
    check_rows("previous", prev_keypoints.len(), prev.rows())?;
    check_rows("current", cur_keypoints.len(), cur.rows())?;
    if prev.is_empty() || cur.is_empty() {
        return Ok(Vec::new());
    }

    let matches = match (prev, cur) {
        (Descriptors::Binary(q), Descriptors::Binary(t)) if q.cols() == t.cols() => match_rows(q, t, cfg),
        (Descriptors::Float(q), Descriptors::Float(t)) if q.cols() == t.cols() => match_rows(q, t, cfg),
        _ => {
            return Err(MatchError::IncompatibleDescriptors {
                query: (prev.metric(), prev.cols()),
                train: (cur.metric(), cur.cols()),
            })
        }
    };
    log::trace!(
        "{} {} ({}): {} of {} queries matched",
        cfg.kind,
        cfg.selector,
        prev.metric(),
        matches.len(),
        prev.rows()
    );
    Ok(matches)
}

fn check_rows(frame: &'static str, keypoints: usize, rows: usize) -> MatchResult<()> {
    if keypoints != rows {
        return Err(MatchError::RowMismatch { frame, keypoints, rows });
    }
    Ok(())
}

fn search<T: DescriptorElement>(
    query: &DescriptorMatrix<T>,
    train: &DescriptorMatrix<T>,
    k: usize,
    cfg: &MatcherConfig,
) -> Vec<Vec<Candidate>> {
    match cfg.kind {
        MatcherKind::BruteForce => brute_force::knn(query, train, k),
        MatcherKind::Flann => kdtree::knn(query, train, k, cfg.flann_checks),
    }
}

/// Matching on rows of one element type
pub fn match_rows<T: DescriptorElement>(
    query: &DescriptorMatrix<T>,
    train: &DescriptorMatrix<T>,
    cfg: &MatcherConfig,
) -> Vec<Match> {
    let k = cfg.selector.k();
    if train.rows() < k {
        return Vec::new();
    }
    let candidates = search(query, train, k, cfg);

    match cfg.selector {
        SelectorKind::NearestNeighbor => {
            let reverse = cfg.cross_check.then(|| search(train, query, 1, cfg));
            candidates
                .iter()
                .enumerate()
                .filter_map(|(query_idx, c)| {
                    let best = c.first()?;
                    if let Some(reverse) = &reverse {
                        if reverse[best.index].first().map(|r| r.index) != Some(query_idx) {
                            return None;
                        }
                    }
                    Some(Match {
                        query_idx,
                        train_idx: best.index,
                        distance: best.distance,
                    })
                })
                .collect()
        }
        SelectorKind::KNearest => candidates
            .iter()
            .enumerate()
            .filter_map(|(query_idx, c)| match c.as_slice() {
                [best, second, ..] if best.distance < cfg.ratio * second.distance => Some(Match {
                    query_idx,
                    train_idx: best.index,
                    distance: best.distance,
                }),
                _ => None,
            })
            .collect(),
    }
}
