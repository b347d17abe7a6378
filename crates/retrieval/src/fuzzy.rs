//! Token-sort fuzzy matching for typo tolerance.

use strsim::normalized_levenshtein;
use unicode_segmentation::UnicodeSegmentation;

/// Token-sort ratio in the 0..=100 range: both sides are lowercased,
/// split into words, sorted, and rejoined before comparing, so word
/// order never hurts the score.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    normalized_levenshtein(&a, &b) * 100.0
}

fn sorted_tokens(text: &str) -> String {
    let mut words: Vec<String> = text
        .unicode_words()
        .map(|w| w.to_lowercase())
        .collect();
    words.sort();
    words.join(" ")
}
