//! Lexical relevance of a free-text query against a book's title and description.
//!
//! Query terms are combined conjunctively: a document missing any term scores
//! `0.0`. A matching document scores the mean of `tf / (tf + 1)` over the
//! distinct query terms, which keeps the result in `(0, 1)` and saturates for
//! repeated terms.

use std::collections::{BTreeSet, HashMap};
use unicode_segmentation::UnicodeSegmentation;

/// Lowercase UAX #29 words, in order of appearance.
///
/// Contractions such as "can't" stay whole; hyphens and other punctuation
/// separate words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// Term frequencies of a tokenized document.
pub fn term_frequencies(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

pub fn lexical_relevance(query: &str, document: &HashMap<String, usize>) -> f64 {
    let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
    if terms.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for term in &terms {
        match document.get(term) {
            Some(&tf) if tf > 0 => {
                let tf = tf as f64;
                total += tf / (tf + 1.0);
            }
            _ => return 0.0,
        }
    }

    total / terms.len() as f64
}
