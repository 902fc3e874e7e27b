//! zh-cards: Chinese flashcard pipeline
//!
//! Turns hanzi and words into annotated flashcard records by merging several
//! static dictionaries (HSK, Heisig, CEDICT, components), decomposing
//! characters into glossed components and deriving tones from pinyin. A
//! persistent ledger keeps repeated runs from re-emitting learned items, and
//! content-addressed caches keep them from repeating expensive fetches.
//!
//! # Example
//!
//! ```no_run
//! use zh_cards::prelude::*;
//! use std::path::Path;
//!
//! let config = PipelineConfig::load(Some(Path::new("zh-cards.json"))).unwrap();
//! config.validate().unwrap();
//!
//! let resources = Resources::load(&config).unwrap();
//! let builder = resources.card_builder(config.example_count);
//!
//! let card = builder.get_word_card("你好", &resources.translations).unwrap();
//! println!("{} {}", card.simplified, card.tone_labels());
//! ```
//!
//! # Batch Example
//!
//! ```no_run
//! use zh_cards::prelude::*;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let resources = Resources::load(&config).unwrap();
//! let ledger = IgnoreLedger::load(&config.ignore_words, &config.ignore_chars).unwrap();
//! let exporter = JsonLinesExporter::create(Path::new("cards.jsonl")).unwrap();
//!
//! let mut pipeline = Pipeline::new(
//!     resources.card_builder(config.example_count),
//!     &resources.translations,
//!     ledger,
//!     Box::new(exporter),
//! );
//! pipeline.process_words(&["你好".to_string(), "谢谢".to_string()]);
//!
//! // The ledger is written exactly once, here
//! let summary = pipeline.finish().unwrap();
//! print_summary(&summary);
//! ```

pub mod cache;
pub mod card;
pub mod config;
pub mod decompose;
pub mod dict;
pub mod fetch;
pub mod frequency;
pub mod ignore;
pub mod mnemonic;
pub mod models;
pub mod output;
pub mod pinyin;
pub mod pipeline;
pub mod tones;
pub mod translate;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cache::{hash_key, CacheError, ContentCache};
    pub use crate::card::CardBuilder;
    pub use crate::config::{ConfigError, PipelineConfig};
    pub use crate::decompose::{get_components, get_kangxi, is_kangxi, DecomposeError, Decomposer, IdsTable};
    pub use crate::dict::{
        merge_readings, Cedict, ComponentsDict, DictError, DictLookup, Dictionaries,
        DictionaryIndex, DictionaryPaths, HeisigTable, HskList, LexiconSource, LookupError, RawEntry,
    };
    pub use crate::fetch::{
        with_retry, CachedFetcher, CommandFetcher, FetchError, Fetched, Fetcher, RetryPolicy,
    };
    pub use crate::frequency::{ExampleSource, WordIndex};
    pub use crate::ignore::{IgnoreError, IgnoreLedger, IgnoreSet};
    pub use crate::mnemonic::{MnemonicBase, MnemonicIndex, MnemonicSource};
    pub use crate::models::{
        Card, Component, ComponentDecomposition, DictEntries, DictEntry, Example,
        ExampleSentences, FetchStats, HanziDecomposition, HanziRecord, PipelineSummary, Source,
        Tone, WordRecord,
    };
    pub use crate::output::{
        format_record, print_summary, write_summary_json, write_summary_json_file, ExportError,
        Exporter, JsonLinesExporter,
    };
    pub use crate::pinyin::{numbered_to_marked, strip_tones};
    pub use crate::pipeline::{
        audio_query, command_fetcher, example_prompt, parse_examples, DynFetcher, Outcome,
        Pipeline, Resources,
    };
    pub use crate::tones::{get_tone_labels, get_tones};
    pub use crate::translate::{TranslationLookup, Translations};
}

// Re-export commonly used types at the crate root
pub use models::{Card, DictEntry, Source, Tone, WordRecord};
