//! Exporting card records (JSON lines) and run summaries.

use crate::models::{PipelineSummary, WordRecord};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Export rejected: {0}")]
    Rejected(String),
}

/// Destination of finished word records, e.g. a note-creation service.
pub trait Exporter {
    fn export(&mut self, record: &WordRecord) -> Result<(), ExportError>;
}

impl<E: Exporter + ?Sized> Exporter for &mut E {
    fn export(&mut self, record: &WordRecord) -> Result<(), ExportError> {
        (**self).export(record)
    }
}

/// Collects records in memory.
impl Exporter for Vec<WordRecord> {
    fn export(&mut self, record: &WordRecord) -> Result<(), ExportError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes one JSON object per record and line.
pub struct JsonLinesExporter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesExporter<io::BufWriter<std::fs::File>> {
    /// Create (truncating) a JSON-lines file.
    pub fn create(path: &Path) -> Result<Self, ExportError> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(io::BufWriter::new(file)))
    }
}

impl<W: Write> Exporter for JsonLinesExporter<W> {
    fn export(&mut self, record: &WordRecord) -> Result<(), ExportError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

/// Write a run summary as JSON.
pub fn write_summary_json<W: Write>(
    summary: &PipelineSummary,
    writer: &mut W,
) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(summary)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write a run summary as JSON to a file.
pub fn write_summary_json_file(summary: &PipelineSummary, path: &Path) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(path)?;
    write_summary_json(summary, &mut file)
}

/// Write a run summary to stdout.
pub fn print_summary(summary: &PipelineSummary) {
    println!("\n=== Build Summary ===");
    println!("Version: {}", summary.version);
    println!();
    println!("Items processed: {}", summary.processed);
    println!("  Exported words: {}", summary.exported_words);
    println!("  Exported chars: {}", summary.exported_chars);
    println!("  Already known: {}", summary.skipped_known);
    println!("  Not in any dictionary: {}", summary.skipped_missing);
    println!("  Fetch exhausted: {}", summary.skipped_fetch);
    println!("  Export failures: {}", summary.export_failures);
    println!();
    println!("External fetches:");
    println!(
        "  LLM: {} cached, {} fetched, {} failed",
        summary.llm.hits, summary.llm.misses, summary.llm.failures
    );
    println!(
        "  Audio: {} cached, {} fetched, {} failed",
        summary.audio.hits, summary.audio.misses, summary.audio.failures
    );
}

/// One-line description of a word record.
pub fn format_record(record: &WordRecord) -> String {
    let new_chars: Vec<&str> = record
        .new_chars
        .iter()
        .map(|h| h.card.simplified.as_str())
        .collect();
    format!(
        "{} [{}] ({}) new chars: {}",
        record.card.simplified,
        record.card.tone_labels(),
        record.examples.len(),
        if new_chars.is_empty() {
            "-".to_string()
        } else {
            new_chars.join(" ")
        }
    )
}
