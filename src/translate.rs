//! Externally maintained translations, looked up by hanzi or word.

use crate::dict::{read_file, DictError};
use std::collections::HashMap;
use std::path::Path;

/// Source of free-form translations for cards.
pub trait TranslationLookup {
    /// Translation for a key, `None` if the store has none.
    fn lookup(&self, key: &str) -> Option<String>;
}

impl TranslationLookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// JSON-backed translation store. Characters in `strip_chars` are removed
/// from keys before lookup.
#[derive(Debug, Default)]
pub struct Translations {
    entries: HashMap<String, String>,
    strip_chars: Vec<char>,
}

impl Translations {
    pub fn new(entries: HashMap<String, String>, strip_chars: &str) -> Self {
        Self {
            entries,
            strip_chars: strip_chars.chars().collect(),
        }
    }

    pub fn load(path: &Path, strip_chars: &str) -> Result<Self, DictError> {
        let text = read_file(path)?;
        let entries = serde_json::from_str(&text).map_err(|source| DictError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(entries, strip_chars))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TranslationLookup for Translations {
    fn lookup(&self, key: &str) -> Option<String> {
        let key: String = key.chars().filter(|c| !self.strip_chars.contains(c)).collect();
        self.entries.get(&key).cloned()
    }
}
