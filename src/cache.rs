//! Content-addressed on-disk cache, one file per key.
//!
//! File names are the hex SHA-256 of the key plus an extension, or the key
//! itself for the `*_literal` operations. The directory is listed once when
//! the cache is opened; after that the in-memory index is authoritative.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const TMP_SUFFIX: &str = ".tmp";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error on cache path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid literal cache key: {0:?}")]
    InvalidKey(String),
}

/// Hex SHA-256 digest of a cache key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct ContentCache {
    dir: PathBuf,
    extension: String,      // Including the leading dot, may be empty
    index: HashSet<String>, // File names present on disk
}

impl ContentCache {
    /// Open (creating if needed) a cache directory and index its files.
    pub fn open(dir: &Path, extension: &str) -> Result<Self, CacheError> {
        let io_err = |source| CacheError::Io {
            path: dir.to_path_buf(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;

        let mut index = HashSet::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if let Some(name) = entry.file_name().to_str() {
                // Temp files are dotfiles
                if !name.starts_with('.') {
                    index.insert(name.to_string());
                }
            }
        }

        debug!(dir = %dir.display(), entries = index.len(), "opened content cache");

        let extension = match extension {
            "" => String::new(),
            ext if ext.starts_with('.') => ext.to_string(),
            ext => format!(".{}", ext),
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            extension,
            index,
        })
    }

    /// File name a key is stored under.
    pub fn file_name(&self, key: &str) -> String {
        format!("{}{}", hash_key(key), self.extension)
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(self.file_name(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(&self.file_name(key))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Payload for a key, `None` on a miss.
    pub fn lookup(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.read(&self.file_name(key))
    }

    /// Store a payload; a key already present is left untouched.
    /// Returns the file name.
    pub fn add(&mut self, key: &str, payload: &[u8]) -> Result<String, CacheError> {
        let name = self.file_name(key);
        self.write(&name, payload)?;
        Ok(name)
    }

    /// Payload stored under a literal file name.
    pub fn lookup_literal(&self, name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        validate_literal(name)?;
        self.read(name)
    }

    /// Store a payload under a literal file name.
    pub fn add_literal(&mut self, name: &str, payload: &[u8]) -> Result<(), CacheError> {
        validate_literal(name)?;
        self.write(name, payload)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if !self.index.contains(name) {
            return Ok(None);
        }
        let path = self.dir.join(name);
        fs::read(&path)
            .map(Some)
            .map_err(|source| CacheError::Io { path, source })
    }

    fn write(&mut self, name: &str, payload: &[u8]) -> Result<(), CacheError> {
        if self.index.contains(name) {
            return Ok(());
        }

        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}{}", name, TMP_SUFFIX));
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(payload).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        self.index.insert(name.to_string());
        debug!(file = %name, bytes = payload.len(), "cached payload");
        Ok(())
    }
}

fn validate_literal(name: &str) -> Result<(), CacheError> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(CacheError::InvalidKey(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key() {
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ContentCache::open(dir.path(), "json").unwrap();

        assert_eq!(cache.lookup("你好").unwrap(), None);
        let name = cache.add("你好", b"{\"examples\":[]}").unwrap();
        assert!(name.ends_with(".json"));
        assert_eq!(cache.lookup("你好").unwrap().unwrap(), b"{\"examples\":[]}");
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ContentCache::open(dir.path(), ".mp3").unwrap();

        cache.add("好", b"audio").unwrap();
        let first = cache.lookup("好").unwrap();
        cache.add("好", b"audio").unwrap();
        assert_eq!(cache.lookup("好").unwrap(), first);
        assert_eq!(cache.lookup("好").unwrap(), first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_index_survives_reopen_and_ignores_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = ContentCache::open(dir.path(), "json").unwrap();
            cache.add("key", b"value").unwrap();
        }
        std::fs::write(dir.path().join(".partial.json.tmp"), b"half").unwrap();

        let cache = ContentCache::open(dir.path(), "json").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("key"));
    }

    #[test]
    fn test_literal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ContentCache::open(dir.path(), "").unwrap();

        cache.add_literal("好.mp3", b"audio").unwrap();
        assert_eq!(cache.lookup_literal("好.mp3").unwrap().unwrap(), b"audio");
        assert!(matches!(
            cache.add_literal("../escape", b"x"),
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_literal_key_with_tmp_suffix_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = ContentCache::open(dir.path(), "").unwrap();
            cache.add_literal("note.tmp", b"kept").unwrap();
        }

        let cache = ContentCache::open(dir.path(), "").unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup_literal("note.tmp").unwrap().unwrap(), b"kept");
    }
}
