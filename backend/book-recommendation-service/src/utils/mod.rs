// Utility functions shared by the scoring channels

pub mod lexical;

use crate::models::{BookId, ScoreMap};
use std::cmp::Ordering;

/// Order `(id, score)` pairs by descending score, ties by ascending id.
pub fn rank_descending(entries: &mut [(BookId, f64)]) {
    entries.sort_by(|a, b| compare_ranked(a, b));
}

pub fn compare_ranked(a: &(BookId, f64), b: &(BookId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Min-max normalize a score map into `[0, 1]` using its own range.
///
/// When every value is equal (including a single entry) all entries map
/// to `0.0`: a tied set carries no ranking information.
pub fn min_max_normalize(scores: &ScoreMap) -> ScoreMap {
    if scores.is_empty() {
        return ScoreMap::new();
    }

    let (lo, hi) = scores
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if hi <= lo {
        return scores.iter().map(|(id, _)| (*id, 0.0)).collect();
    }

    let range = hi - lo;
    scores
        .iter()
        .map(|(id, v)| (*id, (v - lo) / range))
        .collect()
}

/// Cosine similarity of two dense vectors.
///
/// Returns `None` when the dimensions differ; zero vectors score `0.0`.
pub fn dense_cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        Some(0.0)
    } else {
        Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
    }
}

/// Channel fetch depth: `max(k * multiplier, floor)`.
pub fn pool_size(k: usize, multiplier: usize, floor: usize) -> usize {
    k.saturating_mul(multiplier).max(floor)
}
