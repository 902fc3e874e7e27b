//! Persistent dedup ledger of items already turned into cards.
//!
//! Members are only ever added during a run; the set is written once at the
//! end, so an interrupted run never records items it did not export.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IgnoreError {
    #[error("IO error on ignore file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid ignore file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    members: BTreeSet<String>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a set persisted as a JSON array. A missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, IgnoreError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ignore file yet, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(IgnoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(Self::new());
        }

        let members = serde_json::from_str(&text).map_err(|source| IgnoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { members })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Add a key; adding an existing key is a no-op.
    pub fn update(&mut self, key: &str) {
        if !self.members.contains(key) {
            self.members.insert(key.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Persist as a sorted JSON array, replacing the file atomically.
    pub fn write(&self, path: &Path) -> Result<(), IgnoreError> {
        let io_err = |source| IgnoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string_pretty(&self.members).map_err(|source| IgnoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let tmp = dir.join(format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("ignore")
        ));
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), members = self.len(), "wrote ignore file");
        Ok(())
    }
}

/// The two independent namespaces of the ledger: words already exported and
/// characters already introduced, each persisted to its own file.
#[derive(Debug)]
pub struct IgnoreLedger {
    pub words: IgnoreSet,
    pub chars: IgnoreSet,
    words_path: PathBuf,
    chars_path: PathBuf,
}

impl IgnoreLedger {
    pub fn load(words_path: &Path, chars_path: &Path) -> Result<Self, IgnoreError> {
        Ok(Self {
            words: IgnoreSet::load(words_path)?,
            chars: IgnoreSet::load(chars_path)?,
            words_path: words_path.to_path_buf(),
            chars_path: chars_path.to_path_buf(),
        })
    }

    /// Claim a word, then the characters it introduces.
    pub fn claim(&mut self, word: &str, chars: &[String]) {
        self.words.update(word);
        for hanzi in chars {
            self.chars.update(hanzi);
        }
    }

    /// Persist both namespaces.
    pub fn write(&self) -> Result<(), IgnoreError> {
        self.words.write(&self.words_path)?;
        self.chars.write(&self.chars_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_is_idempotent() {
        let mut set = IgnoreSet::new();
        set.update("好");
        set.update("好");
        assert!(set.contains("好"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = IgnoreSet::load(&dir.path().join("absent.json")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_write_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("words.json");

        let mut set = IgnoreSet::new();
        for key in ["你好", "好", "再见"] {
            set.update(key);
        }
        set.write(&path).unwrap();

        let loaded = IgnoreSet::load(&path).unwrap();
        assert_eq!(loaded, set);
        // no temp file left behind
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_accepts_any_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chars.json");
        std::fs::write(&path, r#"["好", "你", "好"]"#).unwrap();

        let set = IgnoreSet::load(&path).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["你", "好"]);
    }

    #[test]
    fn test_ledger_namespaces_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let words = dir.path().join("words.json");
        let chars = dir.path().join("chars.json");

        let mut ledger = IgnoreLedger::load(&words, &chars).unwrap();
        ledger.claim("好", &["好".to_string()]);
        ledger.claim("你好", &["你".to_string()]);
        ledger.write().unwrap();

        let ledger = IgnoreLedger::load(&words, &chars).unwrap();
        assert_eq!(ledger.words.iter().collect::<Vec<_>>(), vec!["你好", "好"]);
        assert_eq!(ledger.chars.iter().collect::<Vec<_>>(), vec!["你", "好"]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chars.json");
        std::fs::write(&path, "{not a list").unwrap();
        assert!(matches!(IgnoreSet::load(&path), Err(IgnoreError::Json { .. })));
    }
}
