//! Keyword tokenization used for relevance scoring and topic derivation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has", "have",
    "he", "her", "his", "i", "in", "is", "it", "its", "me", "my", "of", "on", "or", "our", "she",
    "so", "that", "the", "their", "them", "they", "this", "to", "was", "we", "were", "with", "you",
    "your",
];

/// Lowercased word tokens with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Normalized form used to recognize repeated content: every word lowercased, single-spaced.
pub fn content_key(content: &str) -> String {
    WORD.find_iter(content)
        .map(|m| m.as_str().trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fraction of distinct query terms that appear in `content`, in [0, 1].
pub fn keyword_relevance(query: &str, content: &str) -> f64 {
    let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms: HashSet<String> = tokenize(content).into_iter().collect();
    let hits = query_terms.iter().filter(|t| content_terms.contains(*t)).count();
    hits as f64 / query_terms.len() as f64
}

/// Most frequent non-trivial word, ties broken alphabetically.
pub fn dominant_keyword(content: &str) -> Option<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for word in tokenize(content).into_iter().filter(|w| w.chars().count() > 2) {
        *counts.entry(word).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(String, usize)>, (word, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((word, n)),
        })
        .map(|(word, _)| word)
}
