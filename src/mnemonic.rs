//! Mnemonic bases keyed by toneless pinyin, and per-hanzi mnemonics.

use crate::dict::{content_lines, read_file, DictError};
use crate::pinyin::strip_tones;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// A memory aid attached to a pinyin syllable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MnemonicBase {
    pub base: String,
    pub pronunciation: String,
}

/// Provider of mnemonic data consulted by the card builder.
pub trait MnemonicSource {
    /// Base for a (tone-marked or toneless) pinyin syllable.
    fn base(&self, pinyin: &str) -> Option<&MnemonicBase>;

    /// User-authored mnemonic for a hanzi.
    fn mnemonic(&self, hanzi: &str) -> Option<&str>;
}

#[derive(Debug, Default)]
pub struct MnemonicIndex {
    bases: HashMap<String, MnemonicBase>,
    mnemonics: HashMap<String, String>,
}

impl MnemonicIndex {
    /// Load the bases file and, optionally, the hanzi mnemonics file.
    pub fn load(bases: &Path, mnemonics: Option<&Path>) -> Result<Self, DictError> {
        let mut index = Self::parse_bases(&read_file(bases)?);
        if let Some(path) = mnemonics {
            index.add_mnemonics(&read_file(path)?);
        }
        debug!(
            bases = index.bases.len(),
            mnemonics = index.mnemonics.len(),
            "loaded mnemonic index"
        );
        Ok(index)
    }

    /// Parse `pinyin<TAB>base[<TAB>pronunciation]` lines.
    pub fn parse_bases(text: &str) -> Self {
        let bases = content_lines(text)
            .filter_map(|(_, line)| {
                let mut fields = line.split('\t').map(str::trim);
                let key = strip_tones(fields.next()?);
                let base = fields.next()?.to_string();
                let pronunciation = fields.next().unwrap_or_default().to_string();
                (!key.is_empty()).then(|| (key, MnemonicBase { base, pronunciation }))
            })
            .collect();

        Self {
            bases,
            mnemonics: HashMap::new(),
        }
    }

    /// Add `hanzi<TAB>mnemonic` lines.
    pub fn add_mnemonics(&mut self, text: &str) {
        for (_, line) in content_lines(text) {
            if let Some((hanzi, mnemonic)) = line.split_once('\t') {
                self.mnemonics
                    .insert(hanzi.trim().to_string(), mnemonic.trim().to_string());
            }
        }
    }
}

impl MnemonicSource for MnemonicIndex {
    fn base(&self, pinyin: &str) -> Option<&MnemonicBase> {
        self.bases.get(&strip_tones(pinyin.trim()))
    }

    fn mnemonic(&self, hanzi: &str) -> Option<&str> {
        self.mnemonics.get(hanzi).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_lookup_ignores_tones() {
        let index = MnemonicIndex::parse_bases("hao\tHoward\thow\nHǍO\tduplicate\n");
        // keys are normalised, the later line wins
        assert_eq!(index.base("hǎo").unwrap().base, "duplicate");
        assert!(index.base("ma").is_none());
    }

    #[test]
    fn test_pronunciation_is_optional() {
        let index = MnemonicIndex::parse_bases("nü\tNora\nma\tMadonna\tmah\n");
        assert_eq!(index.base("nǚ").unwrap().pronunciation, "");
        assert_eq!(index.base("mā").unwrap().pronunciation, "mah");
    }

    #[test]
    fn test_hanzi_mnemonics() {
        let mut index = MnemonicIndex::default();
        index.add_mnemonics("好\tA woman with her child is good.\n");
        assert_eq!(index.mnemonic("好"), Some("A woman with her child is good."));
        assert_eq!(index.mnemonic("你"), None);
    }
}
