//! Data structures for the zh-cards flashcard pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dictionary source of an entry.
///
/// The derived ordering is the lookup precedence: HSK, Heisig, CEDICT, Components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Hsk,
    Heisig,
    Cedict,
    Components,
}

impl Source {
    /// All sources in precedence order.
    pub const ALL: [Source; 4] = [Source::Hsk, Source::Heisig, Source::Cedict, Source::Components];

    pub fn name(&self) -> &'static str {
        match self {
            Source::Hsk => "hsk",
            Source::Heisig => "heisig",
            Source::Cedict => "cedict",
            Source::Components => "components",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single reading of a lexeme in one dictionary source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictEntry {
    pub source: Source,
    pub pinyin: String,
    pub english: String,
    pub traditional: String,
    pub mnemonic_base: String,  // Only set for single-rune lexemes
    pub pronunciation: String,  // Only set for single-rune lexemes
}

impl DictEntry {
    pub fn new(source: Source, pinyin: &str, english: &str) -> Self {
        Self {
            source,
            pinyin: pinyin.to_string(),
            english: english.to_string(),
            traditional: String::new(),
            mnemonic_base: String::new(),
            pronunciation: String::new(),
        }
    }

    pub fn with_traditional(mut self, traditional: &str) -> Self {
        self.traditional = traditional.to_string();
        self
    }
}

/// Entries per source, then per reading.
pub type DictEntries = BTreeMap<Source, BTreeMap<String, DictEntry>>;

/// A structural or lexical component of a card with its gloss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub simplified_chinese: String,
    pub english: String,
}

/// Tone of a pinyin syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    First,
    Second,
    Third,
    Fourth,
    Neutral,
}

impl Tone {
    pub fn label(&self) -> &'static str {
        match self {
            Tone::First => "first",
            Tone::Second => "second",
            Tone::Third => "third",
            Tone::Fourth => "fourth",
            Tone::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully merged flashcard for a hanzi or word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub simplified: String,
    pub traditional: String,
    pub dict_entries: DictEntries,
    pub components: Vec<Component>,
    pub mnemonic_base: String,
    pub mnemonic: String,
    pub translation: String,  // From the external translation store, empty if absent
    pub tones: Vec<Tone>,
    pub example: String,      // Frequency-based example words, single-rune lexemes only
}

impl Card {
    /// Number of runes in the simplified form.
    pub fn rune_count(&self) -> usize {
        self.simplified.chars().count()
    }

    pub fn is_single_rune(&self) -> bool {
        self.rune_count() == 1
    }

    /// Entries of one source, in reading order.
    pub fn entries(&self, source: Source) -> impl Iterator<Item = &DictEntry> {
        self.dict_entries
            .get(&source)
            .into_iter()
            .flat_map(|readings| readings.values())
    }

    /// Comma-joined tone labels, e.g. "third, third".
    pub fn tone_labels(&self) -> String {
        self.tones
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A sub-component of a decomposed hanzi with its dictionary glosses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDecomposition {
    pub ideograph: String,
    pub definitions: Vec<String>,  // One gloss per dictionary entry
    pub is_kangxi: bool,
}

/// Structural breakdown of a single rune.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HanziDecomposition {
    pub ideograph: String,
    pub components: Vec<ComponentDecomposition>,
    pub traditional: String,  // Set-deduplicated, comma-joined
    pub equivalents: String,  // Set-deduplicated, comma-joined
}

/// An LLM-generated example sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    #[serde(default)]
    pub ch: String,
    #[serde(default)]
    pub pi: String,
    #[serde(default)]
    pub en: String,
}

/// Parsed LLM response for word usage examples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentences {
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub note: String,
}

/// Exported projection of a hanzi card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HanziRecord {
    pub card: Card,
    pub audio: Option<String>,      // Cache file name of the TTS audio
    pub decomposition: Vec<String>, // "component = meaning"
    pub kangxi: Vec<String>,        // Kangxi radicals only
    pub traditional_variants: String,
    pub equivalents: String,
}

/// Exported projection of a word card, with the characters it introduces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub card: Card,
    pub audio: Option<String>,
    pub examples: Vec<Example>,
    pub note: String,
    pub new_chars: Vec<HanziRecord>,
}

/// Cache statistics of one external fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    pub hits: usize,
    pub misses: usize,
    pub failures: usize,
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub version: String,
    pub processed: usize,
    pub exported_words: usize,
    pub exported_chars: usize,
    pub skipped_known: usize,
    pub skipped_missing: usize,
    pub skipped_fetch: usize,
    pub export_failures: usize,
    pub llm: FetchStats,
    pub audio: FetchStats,
}
