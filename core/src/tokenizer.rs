use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
}

/// Tokenize text into index terms: lowercase, punctuation replaced by spaces,
/// split on whitespace, tokens of a single character dropped.
///
/// The same rule is used for indexing, queries and similarity, so a term
/// produced here always matches a term stored in the index.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    NON_WORD
        .replace_all(&lowered, " ")
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Distinct terms of `text`.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn keeps_digits_and_underscores() {
        assert_eq!(tokenize("usb_c 65W charger"), vec!["usb_c", "65w", "charger"]);
    }

    #[test]
    fn punctuation_splits_words() {
        assert_eq!(tokenize("wi-fi/bluetooth"), vec!["wi", "fi", "bluetooth"]);
    }

    #[test]
    fn token_set_dedups() {
        let set = token_set("shoe Shoe SHOE boot");
        assert_eq!(set.len(), 2);
        assert!(set.contains("shoe"));
    }
}
