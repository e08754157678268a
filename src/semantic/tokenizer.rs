//! Word tokenizer shared by model fitting and querying.
//!
//! Changing anything here invalidates stored vectors; bump
//! [`crate::index::meta::TOKENIZER_VERSION`] when it does.

const STOP_WORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "in", "that", "have", "it", "for", "not", "on", "with", "he",
    "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we", "her", "she", "or",
    "an", "will", "my", "all", "would", "there", "their", "what", "so", "up", "out", "if",
    "about", "who", "which", "me", "when", "can", "no", "just", "him", "into", "your", "some",
    "could", "them", "than", "then", "now", "only", "its", "over", "also", "after", "how", "our",
    "even", "any", "these", "us", "is", "was", "are", "been", "being", "were", "am", "should",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lower-case, split on anything that isn't a letter or digit (so
/// `snake_case` yields two tokens), drop one-character tokens and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() >= 2)
        .filter(|s| !is_stop_word(s))
        .map(str::to_string)
        .collect()
}
