//! Recipient input normalisation
//!
//! Turns the free-text blobs and row pairs accepted by the triggers into
//! the clean sequences the campaign runner expects.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// One pre-rendered message for the per-recipient body mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePair {
    /// Recipient address
    pub email: String,

    /// Body sent verbatim to this recipient
    pub body: String,
}

impl MessagePair {
    pub fn new(email: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            body: body.into(),
        }
    }

    /// Trim both cells, as spreadsheet exports often carry padding
    pub fn trimmed(&self) -> Self {
        Self::new(self.email.trim(), self.body.trim())
    }
}

/// Split a free-text blob on whitespace, commas and semicolons
///
/// Keeps only tokens containing `@` and drops case-insensitive duplicates,
/// preserving first-occurrence order.
pub fn parse_recipient_blob(text: &str) -> Vec<String> {
    static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATOR_RE.get_or_init(|| Regex::new(r"[\s,;]+").expect("Invalid regex pattern"));

    dedupe_addresses(
        re.split(text)
            .map(str::trim)
            .filter(|token| token.contains('@'))
            .map(str::to_string),
    )
}

/// Remove case-insensitive duplicates, keeping the first spelling seen
pub fn dedupe_addresses(addresses: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|address| seen.insert(address.to_lowercase()))
        .collect()
}

/// Trim every pair and drop rows whose address cell holds no `@`
pub fn clean_pairs(pairs: &[MessagePair]) -> Vec<MessagePair> {
    pairs
        .iter()
        .map(MessagePair::trimmed)
        .filter(|pair| pair.email.contains('@'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_separators() {
        let parsed = parse_recipient_blob("a@x.com, b@x.com;c@x.com\n d@x.com\te@x.com");
        assert_eq!(
            parsed,
            vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]
        );
    }

    #[test]
    fn test_parse_filters_non_addresses() {
        let parsed = parse_recipient_blob("hello a@x.com ,, ; world");
        assert_eq!(parsed, vec!["a@x.com"]);
    }

    #[test]
    fn test_parse_dedupes_case_insensitively() {
        let parsed = parse_recipient_blob("A@x.com a@X.com b@x.com A@X.COM");
        assert_eq!(parsed, vec!["A@x.com", "b@x.com"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_recipient_blob("").is_empty());
        assert!(parse_recipient_blob("  \n ;,").is_empty());
    }

    #[test]
    fn test_pair_trimmed() {
        let pair = MessagePair::new(" a@x.com ", "\n<p>hi</p> ").trimmed();
        assert_eq!(pair, MessagePair::new("a@x.com", "<p>hi</p>"));
    }

    #[test]
    fn test_clean_pairs_keeps_duplicates() {
        let pairs = vec![
            MessagePair::new(" a@x.com", "one "),
            MessagePair::new("", "orphan body"),
            MessagePair::new("header", "body"),
            MessagePair::new("a@x.com", "two"),
        ];
        assert_eq!(
            clean_pairs(&pairs),
            vec![MessagePair::new("a@x.com", "one"), MessagePair::new("a@x.com", "two")]
        );
    }
}
