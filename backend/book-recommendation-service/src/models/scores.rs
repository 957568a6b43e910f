use super::BookId;
use crate::utils::rank_descending;
use serde::{Deserialize, Serialize};
use std::collections::hash_map;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Request-scoped `book_id -> score` mapping.
///
/// Lookups of absent ids read as `0.0`; every fusion step relies on that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    scores: HashMap<BookId, f64>,
}

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score for `book_id`, or `0.0` when the id is absent.
    pub fn get(&self, book_id: BookId) -> f64 {
        self.scores.get(&book_id).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, book_id: BookId) -> bool {
        self.scores.contains_key(&book_id)
    }

    /// Keep the higher of the existing and the offered score.
    pub fn merge_max(&mut self, book_id: BookId, score: f64) {
        self.scores
            .entry(book_id)
            .and_modify(|existing| {
                if score > *existing {
                    *existing = score;
                }
            })
            .or_insert(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, BookId, f64> {
        self.scores.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.scores.values().copied()
    }

    /// Sorted union of the ids present in `self` and `other`.
    pub fn union_ids(&self, other: &ScoreMap) -> BTreeSet<BookId> {
        self.scores
            .keys()
            .chain(other.scores.keys())
            .copied()
            .collect()
    }

    /// Entries ordered by descending score, ties by ascending id.
    pub fn ranked(&self) -> Vec<(BookId, f64)> {
        let mut entries: Vec<(BookId, f64)> =
            self.scores.iter().map(|(id, score)| (*id, *score)).collect();
        rank_descending(&mut entries);
        entries
    }
}

impl FromIterator<(BookId, f64)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (BookId, f64)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ScoreMap {
    type Item = (BookId, f64);
    type IntoIter = hash_map::IntoIter<BookId, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.into_iter()
    }
}

/// Independently computed relevance signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Collaborative,
    SemanticSeed,
    SemanticQuery,
    /// Book hydration; not a scoring channel, but a failure source.
    Catalog,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Collaborative => "collaborative",
            Channel::SemanticSeed => "semantic_seed",
            Channel::SemanticQuery => "semantic_query",
            Channel::Catalog => "catalog",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, pre-weighting contribution of each top-level channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelScores {
    pub cf: f64,
    pub semantic: f64,
}
