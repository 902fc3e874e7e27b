//! Word frequency index (`word:count` lines, most frequent first).

use crate::dict::{content_lines, read_file, DictError};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Provider of example words for a hanzi.
pub trait ExampleSource {
    /// Up to `count` words containing `hanzi`, most frequent first.
    fn examples_for_hanzi(&self, hanzi: &str, count: usize) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct WordIndex {
    words: Vec<String>,
}

/// Whether a char lies in a CJK Unified Ideographs block.
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{F900}'..='\u{FAFF}')
}

impl WordIndex {
    pub fn load(path: &Path) -> Result<Self, DictError> {
        let index = Self::parse(&read_file(path)?);
        debug!(path = %path.display(), words = index.len(), "loaded frequency index");
        Ok(index)
    }

    /// Parse `word:count` lines, skipping anything else.
    pub fn parse(text: &str) -> Self {
        let words = content_lines(text)
            .filter_map(|(_, line)| {
                let mut parts = line.split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(word), Some(_), None) if !word.trim().is_empty() => {
                        Some(word.trim().to_string())
                    }
                    _ => None,
                }
            })
            .collect();
        Self { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Learning order for the `limit` most frequent words.
    ///
    /// Each word is preceded by those of its hanzi not seen before, so a
    /// character is introduced ahead of the first word containing it. Words
    /// with any non-CJK rune are skipped.
    pub fn most_frequent(&self, limit: usize) -> Vec<String> {
        let mut known = HashSet::new();
        let mut order = Vec::new();

        for word in self.words.iter().take(limit) {
            if !word.chars().all(is_cjk_ideograph) {
                continue;
            }
            for c in word.chars() {
                let hanzi = c.to_string();
                if known.insert(hanzi.clone()) {
                    order.push(hanzi);
                }
            }
            if known.insert(word.clone()) {
                order.push(word.clone());
            }
        }

        order
    }
}

impl ExampleSource for WordIndex {
    fn examples_for_hanzi(&self, hanzi: &str, count: usize) -> Vec<String> {
        self.words
            .iter()
            .filter(|w| w.contains(hanzi))
            .take(count)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREQ: &str = "的:100\n我:90\n你好:80\nbad line\n好:70\nOK吗:60\n好人:50\n";

    #[test]
    fn test_parse_skips_malformed() {
        let index = WordIndex::parse(FREQ);
        assert_eq!(index.len(), 6);
        assert_eq!(index.words()[0], "的");
    }

    #[test]
    fn test_examples_for_hanzi() {
        let index = WordIndex::parse(FREQ);
        assert_eq!(index.examples_for_hanzi("好", 2), vec!["你好", "好"]);
        assert_eq!(index.examples_for_hanzi("好", 10).len(), 3);
        assert!(index.examples_for_hanzi("龘", 5).is_empty());
    }

    #[test]
    fn test_most_frequent_introduces_chars_first() {
        let index = WordIndex::parse(FREQ);
        assert_eq!(
            index.most_frequent(6),
            vec!["的", "我", "你", "好", "你好", "人", "好人"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_most_frequent_limit() {
        let index = WordIndex::parse(FREQ);
        assert_eq!(index.most_frequent(1), vec!["的".to_string()]);
        assert!(index.most_frequent(0).is_empty());
    }
}
