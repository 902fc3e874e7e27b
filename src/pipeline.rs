//! Batch card pipeline.
//!
//! Items are processed strictly one after another: lookup, decomposition,
//! cache-or-fetch, card building, ledger gate, export. Input order decides
//! which word introduces a shared character.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheError, ContentCache};
use crate::card::CardBuilder;
use crate::config::PipelineConfig;
use crate::decompose::{get_components, get_kangxi, Decomposer, IdsTable};
use crate::dict::{DictError, Dictionaries};
use crate::fetch::{CachedFetcher, CommandFetcher, FetchError, Fetcher, RetryPolicy};
use crate::frequency::WordIndex;
use crate::ignore::{IgnoreError, IgnoreLedger};
use crate::mnemonic::MnemonicIndex;
use crate::models::*;
use crate::output::{format_record, Exporter};
use crate::translate::{TranslationLookup, Translations};

/// Cache-fronted fetcher over any boxed fetch implementation.
pub type DynFetcher = CachedFetcher<Box<dyn Fetcher>>;

/// Prompt sent to the LLM for usage examples; `{word}` is substituted.
const EXAMPLE_PROMPT: &str = r#"You write example sentences for Chinese learners.
Give 3 short, natural sentences that use the word "{word}", at HSK 1-3 level where possible.
Reply with JSON only, in this shape:
{"examples": [{"ch": "<hanzi>", "pi": "<tone-marked pinyin>", "en": "<English>"}], "note": "<one usage note>"}"#;

pub fn example_prompt(word: &str) -> String {
    EXAMPLE_PROMPT.replace("{word}", word)
}

/// Strip Markdown fences and a leading `json` tag from an LLM reply.
pub fn clean_llm_response(raw: &str) -> String {
    let cleaned = raw.trim().replace("```", "");
    let cleaned = cleaned.trim();
    cleaned
        .strip_prefix("json")
        .unwrap_or(cleaned)
        .trim()
        .to_string()
}

/// Parse an LLM reply into example sentences.
pub fn parse_examples(payload: &[u8]) -> Result<ExampleSentences, serde_json::Error> {
    let text = String::from_utf8_lossy(payload);
    serde_json::from_str(&clean_llm_response(&text))
}

/// TTS query for a lexeme: its runes separated by spaces.
pub fn audio_query(lexeme: &str) -> String {
    lexeme
        .chars()
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Open a cache directory and wrap a configured external command, if any.
pub fn command_fetcher(
    argv: Option<&[String]>,
    cache_dir: &Path,
    extension: &str,
    policy: RetryPolicy,
) -> Result<Option<DynFetcher>, CacheError> {
    let fetcher = match argv.and_then(CommandFetcher::from_argv) {
        Some(fetcher) => fetcher,
        None => return Ok(None),
    };
    let cache = ContentCache::open(cache_dir, extension)?;
    Ok(Some(CachedFetcher::new(cache, Box::new(fetcher), policy)))
}

// ============================================================================
// Resources
// ============================================================================

/// Every immutable lookup source, loaded once at startup.
pub struct Resources {
    pub dictionaries: Dictionaries,
    pub ids: IdsTable,
    pub mnemonics: MnemonicIndex,
    pub words: WordIndex,
    pub translations: Translations,
}

impl Resources {
    /// Load all files named by the config, in parallel.
    pub fn load(config: &PipelineConfig) -> Result<Self, DictError> {
        let (dictionaries, (ids, (mnemonics, (words, translations)))) = rayon::join(
            || Dictionaries::load(&config.dictionary_paths()),
            || {
                rayon::join(
                    || IdsTable::load(&config.ids),
                    || {
                        rayon::join(
                            || MnemonicIndex::load(&config.mnemonic_bases, config.mnemonics.as_deref()),
                            || {
                                rayon::join(
                                    || WordIndex::load(&config.frequency),
                                    || match &config.translations {
                                        Some(path) => {
                                            Translations::load(path, &config.translation_strip_chars)
                                        }
                                        None => Ok(Translations::default()),
                                    },
                                )
                            },
                        )
                    },
                )
            },
        );

        Ok(Self {
            dictionaries: dictionaries?,
            ids: ids?,
            mnemonics: mnemonics?,
            words: words?,
            translations: translations?,
        })
    }

    pub fn decomposer(&self) -> Decomposer<'_> {
        Decomposer::new(&self.dictionaries.index, &self.dictionaries.heisig, &self.ids)
    }

    pub fn card_builder(&self, example_count: usize) -> CardBuilder<'_> {
        CardBuilder::new(
            &self.dictionaries.index,
            self.decomposer(),
            &self.mnemonics,
            &self.words,
        )
        .with_example_count(example_count)
    }

    /// Words of an HSK level in list order.
    pub fn hsk_words_by_level(&self, level: u32) -> &[String] {
        self.dictionaries.hsk.words_by_level(level)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// What happened to one input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Exported { new_chars: usize },
    Ignored,
    Known,
    Missing,
    FetchExhausted,
    ExportFailed,
}

pub struct Pipeline<'a> {
    builder: CardBuilder<'a>,
    translations: &'a dyn TranslationLookup,
    ledger: IgnoreLedger,
    exporter: Box<dyn Exporter + 'a>,
    llm: Option<DynFetcher>,
    audio: Option<DynFetcher>,
    skip_items: HashSet<String>,
    summary: PipelineSummary,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        builder: CardBuilder<'a>,
        translations: &'a dyn TranslationLookup,
        ledger: IgnoreLedger,
        exporter: Box<dyn Exporter + 'a>,
    ) -> Self {
        Self {
            builder,
            translations,
            ledger,
            exporter,
            llm: None,
            audio: None,
            skip_items: HashSet::new(),
            summary: PipelineSummary {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            show_progress: false,
        }
    }

    pub fn with_llm(mut self, llm: Option<DynFetcher>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_audio(mut self, audio: Option<DynFetcher>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_skip_items<I: IntoIterator<Item = String>>(mut self, items: I) -> Self {
        self.skip_items.extend(items);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn ledger(&self) -> &IgnoreLedger {
        &self.ledger
    }

    /// Process a list of items in order.
    pub fn process_words(&mut self, words: &[String]) {
        let progress = if self.show_progress {
            let pb = ProgressBar::new(words.len() as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        for word in words {
            if let Some(ref pb) = progress {
                pb.set_message(word.clone());
            }
            self.process_word(word);
            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
    }

    /// Run one item through the whole pipeline.
    pub fn process_word(&mut self, raw: &str) -> Outcome {
        let word: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if word.is_empty() || self.skip_items.contains(&word) {
            return Outcome::Ignored;
        }
        self.summary.processed += 1;

        if self.ledger.words.contains(&word) {
            debug!(word = %word, "already known, skipping");
            self.summary.skipped_known += 1;
            return Outcome::Known;
        }

        let card = match self.builder.get_word_card(&word, self.translations) {
            Ok(card) => card,
            Err(e) => {
                warn!(word = %word, error = %e, "skipping word");
                self.summary.skipped_missing += 1;
                return Outcome::Missing;
            }
        };

        let fetched = fetch_audio(&mut self.audio, &word)
            .and_then(|audio| fetch_examples(&mut self.llm, &word).map(|examples| (audio, examples)));
        let (audio, examples) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(word = %word, error = %e, "external fetch failed, skipping word");
                self.summary.skipped_fetch += 1;
                return Outcome::FetchExhausted;
            }
        };

        let new_chars = self.new_chars(&word);

        let record = WordRecord {
            card,
            audio,
            examples: examples.examples,
            note: examples.note,
            new_chars,
        };

        match self.exporter.export(&record) {
            Ok(()) => {
                let chars: Vec<String> = record
                    .new_chars
                    .iter()
                    .map(|h| h.card.simplified.clone())
                    .collect();
                self.ledger.claim(&word, &chars);
                self.summary.exported_words += 1;
                self.summary.exported_chars += chars.len();
                info!(record = %format_record(&record), "exported");
                Outcome::Exported {
                    new_chars: chars.len(),
                }
            }
            Err(e) => {
                error!(word = %word, error = %e, "export failed");
                self.summary.export_failures += 1;
                Outcome::ExportFailed
            }
        }
    }

    /// Hanzi records for the runes of a word not yet introduced.
    fn new_chars(&mut self, word: &str) -> Vec<HanziRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for c in word.chars() {
            let hanzi = c.to_string();
            if !seen.insert(hanzi.clone()) || self.ledger.chars.contains(&hanzi) {
                continue;
            }

            let audio = match fetch_audio(&mut self.audio, &hanzi) {
                Ok(audio) => audio,
                Err(e) => {
                    error!(hanzi = %hanzi, word = %word, error = %e, "audio fetch failed, leaving character out");
                    continue;
                }
            };

            let card = self.builder.get_hanzi_card(&hanzi, self.translations);
            let decomposition = self
                .builder
                .decomposer()
                .decompose(&hanzi)
                .into_iter()
                .next()
                .unwrap_or_default();

            records.push(HanziRecord {
                card,
                audio,
                decomposition: get_components(&decomposition),
                kangxi: get_kangxi(&decomposition),
                traditional_variants: decomposition.traditional,
                equivalents: decomposition.equivalents,
            });
        }

        records
    }

    /// Counters so far, including fetch statistics.
    pub fn summary(&self) -> PipelineSummary {
        let mut summary = self.summary.clone();
        summary.llm = self.llm.as_ref().map(|f| f.stats()).unwrap_or_default();
        summary.audio = self.audio.as_ref().map(|f| f.stats()).unwrap_or_default();
        summary
    }

    /// Persist the ledger (once per run) and return the run summary.
    pub fn finish(self) -> Result<PipelineSummary, IgnoreError> {
        self.ledger.write()?;
        Ok(self.summary())
    }
}

fn fetch_audio(audio: &mut Option<DynFetcher>, lexeme: &str) -> Result<Option<String>, FetchError> {
    match audio {
        Some(fetcher) => Ok(Some(fetcher.get(lexeme, &audio_query(lexeme))?.file_name)),
        None => Ok(None),
    }
}

fn fetch_examples(llm: &mut Option<DynFetcher>, word: &str) -> Result<ExampleSentences, FetchError> {
    let fetcher = match llm {
        Some(fetcher) => fetcher,
        None => return Ok(ExampleSentences::default()),
    };

    let prompt = example_prompt(word);
    let fetched = fetcher.get(&prompt, &prompt)?;
    match parse_examples(&fetched.payload) {
        Ok(examples) => Ok(examples),
        Err(e) => {
            warn!(word = %word, error = %e, "unparsable LLM response");
            Ok(ExampleSentences::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_llm_response() {
        assert_eq!(clean_llm_response("```json\n{\"note\": \"x\"}\n```"), "{\"note\": \"x\"}");
        assert_eq!(clean_llm_response("  {\"note\": \"x\"} "), "{\"note\": \"x\"}");
    }

    #[test]
    fn test_parse_examples() {
        let reply = b"```json\n{\"examples\": [{\"ch\": \"\xe4\xbd\xa0\xe5\xa5\xbd\", \"pi\": \"n\xc7\x90 h\xc7\x8eo\", \"en\": \"hello\"}]}\n```";
        let parsed = parse_examples(reply).unwrap();
        assert_eq!(parsed.examples.len(), 1);
        assert_eq!(parsed.examples[0].ch, "你好");
        assert_eq!(parsed.examples[0].pi, "nǐ hǎo");
        assert!(parsed.note.is_empty());
    }

    #[test]
    fn test_parse_examples_rejects_prose() {
        assert!(parse_examples(b"Sure! Here are some examples.").is_err());
    }

    #[test]
    fn test_audio_query() {
        assert_eq!(audio_query("你好"), "你 好");
        assert_eq!(audio_query("好"), "好");
    }

    #[test]
    fn test_example_prompt_names_word() {
        assert!(example_prompt("你好").contains("\"你好\""));
    }

    #[test]
    fn test_command_fetcher_without_command() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = command_fetcher(None, dir.path(), "json", RetryPolicy::immediate(1)).unwrap();
        assert!(fetcher.is_none());
    }
}
