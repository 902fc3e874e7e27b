//! Pipeline configuration: JSON file, CLI overlay and startup validation.

use crate::dict::DictionaryPaths;
use crate::fetch::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing {what} file: {path}")]
    MissingFile { what: &'static str, path: PathBuf },
    #[error("Credential variable {0} is not set")]
    MissingCredential(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    // Dictionaries
    pub cedict: PathBuf,
    pub hsk_dir: PathBuf,
    pub heisig: PathBuf,
    pub ids: PathBuf,
    pub components: PathBuf,
    pub mnemonic_bases: PathBuf,
    pub mnemonics: Option<PathBuf>,
    pub frequency: PathBuf,
    pub translations: Option<PathBuf>,
    pub translation_strip_chars: String,

    // Persistent state
    pub ignore_words: PathBuf,
    pub ignore_chars: PathBuf,
    pub llm_cache_dir: PathBuf,
    pub audio_cache_dir: PathBuf,

    pub skip_items: Vec<String>,
    pub example_count: usize,

    // External fetches
    pub llm_retry: RetryPolicy,
    pub tts_retry: RetryPolicy,
    pub llm_command: Option<Vec<String>>,
    pub tts_command: Option<Vec<String>>,
    pub llm_credential_env: Option<String>,
    pub tts_credential_env: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cedict: PathBuf::from("data/cedict_ts.u8"),
            hsk_dir: PathBuf::from("data/hsk"),
            heisig: PathBuf::from("data/heisig.json"),
            ids: PathBuf::from("data/ids.txt"),
            components: PathBuf::from("data/components.tsv"),
            mnemonic_bases: PathBuf::from("data/mnemonic_bases.tsv"),
            mnemonics: None,
            frequency: PathBuf::from("data/frequency.txt"),
            translations: None,
            translation_strip_chars: "。，！？、：；“”".to_string(),
            ignore_words: PathBuf::from("state/ignore_words.json"),
            ignore_chars: PathBuf::from("state/ignore_chars.json"),
            llm_cache_dir: PathBuf::from("cache/llm"),
            audio_cache_dir: PathBuf::from("cache/audio"),
            skip_items: ["。", "，", "！", "？", "、", "：", "；", "“", "”", "…", "—"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            example_count: 5,
            llm_retry: RetryPolicy::llm(),
            tts_retry: RetryPolicy::tts(),
            llm_command: None,
            tts_command: None,
            llm_credential_env: None,
            tts_credential_env: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            what: "config",
            path: path.to_path_buf(),
        })?;

        serde_json::from_str(&text)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
    }

    pub fn dictionary_paths(&self) -> DictionaryPaths<'_> {
        DictionaryPaths {
            cedict: &self.cedict,
            hsk_dir: &self.hsk_dir,
            heisig: &self.heisig,
            components: &self.components,
        }
    }

    /// Check everything needed before the first item is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &Path); 6] = [
            ("CEDICT", self.cedict.as_path()),
            ("Heisig", self.heisig.as_path()),
            ("IDS", self.ids.as_path()),
            ("components", self.components.as_path()),
            ("mnemonic bases", self.mnemonic_bases.as_path()),
            ("frequency", self.frequency.as_path()),
        ];
        for (what, path) in required {
            require_file(what, path)?;
        }

        if !self.hsk_dir.is_dir() {
            return Err(ConfigError::MissingFile {
                what: "HSK directory",
                path: self.hsk_dir.clone(),
            });
        }
        if let Some(path) = &self.mnemonics {
            require_file("mnemonics", path)?;
        }
        if let Some(path) = &self.translations {
            require_file("translations", path)?;
        }

        for (name, policy) in [("llm_retry", &self.llm_retry), ("tts_retry", &self.tts_retry)] {
            if policy.attempts == 0 {
                return Err(ConfigError::Invalid(format!("{}.attempts must be at least 1", name)));
            }
        }

        check_command("llm_command", &self.llm_command, &self.llm_credential_env)?;
        check_command("tts_command", &self.tts_command, &self.tts_credential_env)?;

        Ok(())
    }
}

fn require_file(what: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingFile {
            what,
            path: path.to_path_buf(),
        })
    }
}

fn check_command(
    name: &str,
    command: &Option<Vec<String>>,
    credential: &Option<String>,
) -> Result<(), ConfigError> {
    let argv = match command {
        Some(argv) => argv,
        None => return Ok(()),
    };
    if argv.is_empty() {
        return Err(ConfigError::Invalid(format!("{} is empty", name)));
    }
    if let Some(var) = credential {
        match env::var(var) {
            Ok(value) if !value.is_empty() => {}
            _ => return Err(ConfigError::MissingCredential(var.clone())),
        }
    }
    Ok(())
}
