//! Template-based justification strings for recommendation results.
//!
//! Pure and deterministic: the same books and channel contributions always
//! produce the same sentence.

use crate::models::{Book, ChannelScores};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const FALLBACK_EXPLANATION: &str =
    "Recommended based on overall similarity in themes and readership.";

/// Channel contributions at or below this are not mentioned.
const CHANNEL_CUE_THRESHOLD: f64 = 0.01;
const MAX_SHARED_SUBJECTS: usize = 5;
const SIMILAR_PERIOD_YEARS: i32 = 5;

static SUBJECTS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)Subjects:\s*(.*)$").expect("hardcoded subjects regex is invalid")
});

static SUBJECT_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[|\n,]+").expect("hardcoded separator regex is invalid"));

/// Lowercase subject tags from a description's "Subjects: a | b | c" tail.
pub fn subject_tokens(description: Option<&str>) -> BTreeSet<String> {
    let Some(description) = description else {
        return BTreeSet::new();
    };
    let Some(tail) = SUBJECTS_MARKER
        .captures(description)
        .and_then(|caps| caps.get(1))
    else {
        return BTreeSet::new();
    };

    SUBJECT_SEPARATOR
        .split(tail.as_str())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Sorted subjects both books carry, capped for readability.
pub fn shared_subjects(base: &Book, candidate: &Book) -> Vec<String> {
    let a = subject_tokens(base.description.as_deref());
    let b = subject_tokens(candidate.description.as_deref());
    a.intersection(&b)
        .take(MAX_SHARED_SUBJECTS)
        .cloned()
        .collect()
}

fn same_author(base: &Book, candidate: &Book) -> Option<String> {
    let base_author = base.author.as_deref()?.trim();
    let candidate_author = candidate.author.as_deref()?.trim();
    if base_author.is_empty() || candidate_author.is_empty() {
        return None;
    }
    if base_author.to_lowercase() == candidate_author.to_lowercase() {
        Some(candidate_author.to_string())
    } else {
        None
    }
}

fn similar_period(base: &Book, candidate: &Book) -> bool {
    match (base.published_year, candidate.published_year) {
        (Some(a), Some(b)) => (a - b).abs() <= SIMILAR_PERIOD_YEARS,
        _ => false,
    }
}

/// Build the justification for one result.
///
/// Cues are collected in a fixed order: author (or publication period),
/// shared subjects, then channel cues. Without a base book only the channel
/// cues apply.
pub fn explain(base: Option<&Book>, candidate: &Book, channels: &ChannelScores) -> String {
    let mut cues: Vec<String> = Vec::new();

    if let Some(base) = base {
        if let Some(author) = same_author(base, candidate) {
            cues.push(format!("same author ({})", author));
        } else if similar_period(base, candidate) {
            cues.push("published in a similar period".to_string());
        }

        let subjects = shared_subjects(base, candidate);
        if !subjects.is_empty() {
            cues.push(format!("shared subjects: {}", subjects.join(", ")));
        }
    }

    if channels.cf > CHANNEL_CUE_THRESHOLD {
        cues.push("liked by similar readers".to_string());
    }
    if channels.semantic > CHANNEL_CUE_THRESHOLD {
        cues.push("close in theme/description".to_string());
    }

    if cues.is_empty() {
        return FALLBACK_EXPLANATION.to_string();
    }

    format!("Because it's {}.", cues.join("; "))
}
