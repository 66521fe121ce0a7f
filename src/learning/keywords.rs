//! Keyword Extractor - lexical normalization of free text into salient tokens
//!
//! Lower-cases, turns everything but ASCII word characters into separators,
//! drops short tokens and stop-words, then keeps the first few unique
//! survivors in order of appearance. No stemming and no language detection.

use std::collections::HashSet;

use crate::config::LearningConfig;

/// Default maximum number of keywords kept per text
pub const DEFAULT_MAX_KEYWORDS: usize = 5;

/// Tokens must be strictly longer than this many characters
pub const DEFAULT_MIN_KEYWORD_LEN: usize = 3;

/// Common English filler words that never become keywords
const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "have", "will", "from", "they", "know", "want",
    "been", "good", "much", "some", "time", "very", "when", "come", "here",
    "just", "like", "long", "make", "many", "over", "such", "take", "than",
    "them", "well", "were",
];

/// Further function words, dropped only when `extended_stop_words` is set
const EXTENDED_STOP_WORDS: &[&str] = &[
    "what", "there", "their", "your", "about", "would", "could", "should",
    "into", "only", "also", "then", "these", "those", "which", "while",
    "where", "after", "before", "because", "does", "being", "other",
];

/// Whether a token is in the base stop-word list
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Whether a token is in the optional extended stop-word list
pub fn is_extended_stop_word(token: &str) -> bool {
    EXTENDED_STOP_WORDS.contains(&token)
}

/// Extract keywords with the default limits
pub fn extract_keywords(text: &str) -> Vec<String> {
    KeywordExtractor::default().extract(text)
}

/// Configurable keyword extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordExtractor {
    max_keywords: usize,
    min_len: usize,
    extended_stop_words: bool,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYWORDS, DEFAULT_MIN_KEYWORD_LEN)
    }
}

impl KeywordExtractor {
    pub fn new(max_keywords: usize, min_len: usize) -> Self {
        Self {
            max_keywords,
            min_len,
            extended_stop_words: false,
        }
    }

    pub fn from_config(config: &LearningConfig) -> Self {
        Self::new(config.max_keywords, config.min_keyword_len)
            .with_extended_stop_words(config.extended_stop_words)
    }

    /// Also drop the extended function-word list
    pub fn with_extended_stop_words(mut self, enabled: bool) -> Self {
        self.extended_stop_words = enabled;
        self
    }

    fn is_dropped(&self, word: &str) -> bool {
        is_stop_word(word) || (self.extended_stop_words && is_extended_stop_word(word))
    }

    pub fn max_keywords(&self) -> usize {
        self.max_keywords
    }

    /// Extract ordered, unique keywords from `text`
    pub fn extract(&self, text: &str) -> Vec<String> {
        // Only ASCII letters, digits and '_' are word characters; accented
        // letters split a word
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { ' ' })
            .collect();

        let mut seen = HashSet::new();
        normalized
            .split_whitespace()
            .filter(|word| word.chars().count() > self.min_len)
            .filter(|word| !self.is_dropped(word))
            .filter(|word| seen.insert(*word))
            .take(self.max_keywords)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("the and this that").is_empty());
        assert!(extract_keywords("   \n\t  ").is_empty());
        assert!(extract_keywords("!!! ??? ...").is_empty());
    }

    #[test]
    fn test_crash_scenario_keywords() {
        let keywords = extract_keywords("help me debug a crash my app crashes on start");
        assert_eq!(keywords, vec!["help", "debug", "crash", "crashes", "start"]);
    }

    #[test]
    fn test_punctuation_is_a_separator() {
        let keywords = extract_keywords("Rust's borrow-checker: lifetimes, traits!");
        assert_eq!(keywords, vec!["rust", "borrow", "checker", "lifetimes", "traits"]);
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let keywords = extract_keywords("deploy server deploy Server DEPLOY logs");
        assert_eq!(keywords, vec!["deploy", "server", "logs"]);
    }

    #[test]
    fn test_underscore_is_a_word_character() {
        let keywords = extract_keywords("call read_file now");
        assert_eq!(keywords, vec!["call", "read_file"]);
    }

    #[test]
    fn test_output_properties() {
        let inputs = [
            "When will the database migration finish? The migration has been running for a long time",
            "Explain ownership, borrowing and lifetimes with concrete examples please thanks",
            "a bb ccc dddd eeeee ffffff ggggggg hhhhhhhh iiiiiiiii",
            "THIS THAT WITH HAVE Kubernetes Kubernetes Helm charts",
        ];
        for input in inputs {
            let keywords = extract_keywords(input);
            assert!(keywords.len() <= DEFAULT_MAX_KEYWORDS, "{:?}", keywords);
            let unique: HashSet<_> = keywords.iter().collect();
            assert_eq!(unique.len(), keywords.len());
            for k in &keywords {
                assert!(k.chars().count() > DEFAULT_MIN_KEYWORD_LEN);
                assert!(!is_stop_word(k));
                assert_eq!(k, &k.to_lowercase());
            }
        }
    }

    #[test]
    fn test_non_ascii_letters_split_words() {
        // "stra" survives from "straße"; the other fragments are too short
        assert_eq!(extract_keywords("naïve café résumé straße"), vec!["stra"]);
        assert_eq!(extract_keywords("déploiement"), vec!["ploiement"]);
        assert!(extract_keywords("日本語 テキスト").is_empty());
    }

    #[test]
    fn test_extended_stop_words_are_opt_in() {
        assert_eq!(extract_keywords("what is your config"), vec!["what", "your", "config"]);

        let extractor = KeywordExtractor::default().with_extended_stop_words(true);
        assert_eq!(extractor.extract("what is your config"), vec!["config"]);
        assert!(is_extended_stop_word("because"));
        assert!(!is_stop_word("because"));
    }

    #[test]
    fn test_custom_limits() {
        let extractor = KeywordExtractor::new(2, 4);
        assert_eq!(extractor.extract("tokio async runtime scheduler"), vec!["tokio", "async"]);
        let extractor = KeywordExtractor::new(10, 5);
        assert_eq!(extractor.extract("tokio async runtime scheduler"), vec!["runtime", "scheduler"]);
    }
}
