//! zh-cards command line
//!
//! Builds annotated Chinese flashcard records from word lists, HSK levels or
//! the frequency index, and inspects the loaded dictionaries.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use zh_cards::prelude::*;

#[derive(Parser)]
#[command(name = "zh-cards")]
#[command(about = "Chinese flashcard pipeline over CEDICT, HSK and Heisig data")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build card records for new words
    ///
    /// Settings come from PipelineConfig::default(), then the --config file,
    /// then any flag given explicitly.
    #[command(group(
        ArgGroup::new("words")
            .required(true)
            .args(["input", "hsk_level", "most_frequent"])
    ))]
    Build {
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Word list file, whitespace separated
        #[arg(long)]
        input: Option<PathBuf>,

        /// Use the words of this HSK level
        #[arg(long)]
        hsk_level: Option<u32>,

        /// Use the N most frequent words (their hanzi first)
        #[arg(long)]
        most_frequent: Option<usize>,

        /// Output file (JSON lines, one record per word)
        #[arg(long)]
        output: PathBuf,

        /// Also write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,

        // === Overlays onto the configuration ===

        /// Frequency examples per hanzi [default: 5]
        #[arg(long)]
        example_count: Option<usize>,

        /// LLM fetch attempts [default: 3]
        #[arg(long)]
        llm_attempts: Option<u32>,

        /// TTS fetch attempts [default: 3]
        #[arg(long)]
        tts_attempts: Option<u32>,

        /// Word ledger file
        #[arg(long)]
        ignore_words: Option<PathBuf>,

        /// Character ledger file
        #[arg(long)]
        ignore_chars: Option<PathBuf>,
    },

    /// Show merged dictionary entries, tones and decomposition
    Lookup {
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Words or hanzi to look up
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Show tone labels of tone-marked pinyin
    Tones {
        #[arg(required = true)]
        pinyin: Vec<String>,
    },

    /// Show dictionary and ledger sizes
    Stats {
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            config,
            input,
            hsk_level,
            most_frequent,
            output,
            summary,
            quiet,
            example_count,
            llm_attempts,
            tts_attempts,
            ignore_words,
            ignore_chars,
        } => {
            let mut config = PipelineConfig::load(config.as_deref())?;

            // Overlay explicit flags onto file/default values
            config.example_count = example_count.unwrap_or(config.example_count);
            config.llm_retry.attempts = llm_attempts.unwrap_or(config.llm_retry.attempts);
            config.tts_retry.attempts = tts_attempts.unwrap_or(config.tts_retry.attempts);
            if let Some(path) = ignore_words {
                config.ignore_words = path;
            }
            if let Some(path) = ignore_chars {
                config.ignore_chars = path;
            }

            // Configuration errors are fatal before any item is processed
            config.validate()?;

            if !quiet {
                eprintln!("Loading dictionaries...");
            }
            let resources = Resources::load(&config)?;

            let words: Vec<String> = if let Some(path) = input {
                read_word_list(&path)?
            } else if let Some(level) = hsk_level {
                resources.hsk_words_by_level(level).to_vec()
            } else if let Some(limit) = most_frequent {
                resources.words.most_frequent(limit)
            } else {
                Vec::new()
            };

            if !quiet {
                eprintln!("  {} items to process", words.len());
            }

            let ledger = IgnoreLedger::load(&config.ignore_words, &config.ignore_chars)?;
            let llm = command_fetcher(
                config.llm_command.as_deref(),
                &config.llm_cache_dir,
                "json",
                config.llm_retry,
            )?;
            let audio = command_fetcher(
                config.tts_command.as_deref(),
                &config.audio_cache_dir,
                "mp3",
                config.tts_retry,
            )?;
            let exporter = JsonLinesExporter::create(&output)?;

            let mut pipeline = Pipeline::new(
                resources.card_builder(config.example_count),
                &resources.translations,
                ledger,
                Box::new(exporter),
            )
            .with_llm(llm)
            .with_audio(audio)
            .with_skip_items(config.skip_items.iter().cloned())
            .with_progress(!quiet);

            pipeline.process_words(&words);
            let run_summary = pipeline.finish()?;

            if let Some(path) = summary {
                write_summary_json_file(&run_summary, &path)?;
            }

            if !quiet {
                print_summary(&run_summary);
                eprintln!("\nOutput: {}", output.display());
            }
        }

        Commands::Lookup { config, words } => {
            let config = PipelineConfig::load(config.as_deref())?;
            config.validate()?;
            let resources = Resources::load(&config)?;
            let builder = resources.card_builder(config.example_count);

            for word in &words {
                print_lookup(&builder, &resources, word);
            }
        }

        Commands::Tones { pinyin } => {
            for p in &pinyin {
                println!("{}: {}", p, get_tone_labels(p).join(", "));
            }
        }

        Commands::Stats { config } => {
            let config = PipelineConfig::load(config.as_deref())?;
            config.validate()?;
            let resources = Resources::load(&config)?;
            let ledger = IgnoreLedger::load(&config.ignore_words, &config.ignore_chars)?;

            println!("=== Dictionary Statistics ===");
            for (source, count) in resources.dictionaries.index.source_sizes() {
                println!("{}: {} headwords", source, count);
            }
            println!("IDS formulas: {}", resources.ids.len());
            println!("Frequency words: {}", resources.words.len());
            println!("Translations: {}", resources.translations.len());
            for level in resources.dictionaries.hsk.levels() {
                println!("  HSK {}: {} words", level, resources.hsk_words_by_level(level).len());
            }
            println!();
            println!("=== Ledger ===");
            println!("Known words: {}", ledger.words.len());
            println!("Known chars: {}", ledger.chars.len());
        }
    }

    Ok(())
}

/// Whitespace-separated items of a word list file.
fn read_word_list(path: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}

fn print_lookup(builder: &CardBuilder<'_>, resources: &Resources, word: &str) {
    let card = match builder.get_word_card(word, &resources.translations) {
        Ok(card) => card,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    println!("=== {} ===", card.simplified);
    if !card.traditional.is_empty() {
        println!("Traditional: {}", card.traditional);
    }
    println!("Tones: {}", card.tone_labels());
    for (source, readings) in &card.dict_entries {
        for (pinyin, entry) in readings {
            println!("  [{}] {} {}", source, pinyin, entry.english);
        }
    }
    if !card.translation.is_empty() {
        println!("Translation: {}", card.translation);
    }
    if !card.example.is_empty() {
        println!("Examples: {}", card.example);
    }

    for decomposition in builder.decomposer().decompose(word) {
        let components = get_components(&decomposition);
        if components.is_empty() {
            continue;
        }
        println!("  {}:", decomposition.ideograph);
        for component in components {
            println!("    {}", component);
        }
    }
    println!();
}
