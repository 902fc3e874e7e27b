//! Static dictionary loaders and the merged, ordered-source `DictionaryIndex`.

use crate::models::{DictEntries, DictEntry, Source};
use crate::pinyin::{is_numbered, numbered_to_marked};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DictError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No HSK level lists found in {0}")]
    NoLevels(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("no results in lookup of word: {0}")]
    NotFound(String),
}

/// Read a whole dictionary file, attaching the path to any error.
pub(crate) fn read_file(path: &Path) -> Result<String, DictError> {
    fs::read_to_string(path).map_err(|source| DictError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Non-empty, non-comment lines of a flat file.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'))
}

fn normalize_reading(reading: &str) -> String {
    let reading = reading.trim();
    if is_numbered(reading) {
        numbered_to_marked(reading)
    } else {
        reading.to_string()
    }
}

/// One unmerged entry as a source stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub reading: String,
    pub traditional: String,
    pub definitions: Vec<String>,
}

impl RawEntry {
    pub fn new(reading: &str, definitions: Vec<String>) -> Self {
        Self {
            reading: reading.to_string(),
            traditional: String::new(),
            definitions,
        }
    }

    pub fn with_traditional(mut self, traditional: &str) -> Self {
        self.traditional = traditional.to_string();
        self
    }
}

/// Single definition list, empty for a blank gloss.
fn single(definition: &str) -> Vec<String> {
    if definition.is_empty() {
        Vec::new()
    } else {
        vec![definition.to_string()]
    }
}

/// A dictionary that can answer lookups for one `Source`.
///
/// Implementations return raw entries in file order; merging of identical
/// readings happens in `DictionaryIndex`.
pub trait LexiconSource: Send + Sync {
    /// Which source this dictionary represents.
    fn source(&self) -> Source;

    /// Raw entries for a word, empty if unknown.
    fn entries(&self, word: &str) -> Vec<RawEntry>;

    /// Number of headwords.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// CEDICT
// ============================================================================

/// One CEDICT line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CedictEntry {
    pub traditional: String,
    pub simplified: String,
    pub reading: String,           // Tone-marked
    pub definitions: Vec<String>,
}

/// CEDICT indexed by simplified form.
#[derive(Debug, Default)]
pub struct Cedict {
    entries: HashMap<String, Vec<CedictEntry>>,
}

impl Cedict {
    pub fn load(path: &Path) -> Result<Self, DictError> {
        let text = read_file(path)?;
        let dict = Self::parse(&text);
        debug!(path = %path.display(), words = dict.len(), "loaded cedict");
        Ok(dict)
    }

    /// Parse CEDICT text, skipping lines that fit neither accepted form.
    pub fn parse(text: &str) -> Self {
        let mut entries: HashMap<String, Vec<CedictEntry>> = HashMap::new();
        let mut skipped = 0usize;

        for (line_no, line) in content_lines(text) {
            match parse_cedict_line(line) {
                Some(entry) => entries.entry(entry.simplified.clone()).or_default().push(entry),
                None => {
                    skipped += 1;
                    debug!(line = line_no, "skipping malformed cedict line");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, "cedict lines could not be parsed");
        }

        Self { entries }
    }

    /// Raw CEDICT lines for a simplified headword.
    pub fn get(&self, word: &str) -> &[CedictEntry] {
        self.entries.get(word).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn split_definitions(defs: &str) -> Vec<String> {
    defs.split(|c| c == '/' || c == ';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse either `TRAD SIMP [pin1 yin1] /def/def/` or the tab-separated form.
fn parse_cedict_line(line: &str) -> Option<CedictEntry> {
    if line.contains('\t') {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let (simplified, traditional, reading, defs) = match fields.as_slice() {
            [word, reading, defs] => (*word, *word, *reading, *defs),
            [word, trad, reading, defs] => (*word, *trad, *reading, *defs),
            _ => return None,
        };
        if simplified.is_empty() {
            return None;
        }
        return Some(CedictEntry {
            traditional: traditional.to_string(),
            simplified: simplified.to_string(),
            reading: normalize_reading(reading),
            definitions: split_definitions(defs),
        });
    }

    let (traditional, rest) = line.split_once(' ')?;
    let (simplified, rest) = rest.split_once(' ')?;
    let rest = rest.trim_start().strip_prefix('[')?;
    let (reading, defs) = rest.split_once(']')?;

    Some(CedictEntry {
        traditional: traditional.to_string(),
        simplified: simplified.to_string(),
        reading: normalize_reading(reading),
        definitions: split_definitions(defs),
    })
}

impl LexiconSource for Cedict {
    fn source(&self) -> Source {
        Source::Cedict
    }

    fn entries(&self, word: &str) -> Vec<RawEntry> {
        self.get(word)
            .iter()
            .map(|e| RawEntry::new(&e.reading, e.definitions.clone()).with_traditional(&e.traditional))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// HSK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HskEntry {
    pub word: String,
    pub level: u32,
    pub pinyin: String,
    pub meaning: String,
}

/// HSK level word lists.
#[derive(Debug, Default)]
pub struct HskList {
    entries: HashMap<String, HskEntry>,
    levels: BTreeMap<u32, Vec<String>>,
}

/// Level number of a file stem such as `1`, `hsk2` or `hsk-3-2021`: the
/// first run of digits.
fn level_from_stem(stem: &str) -> Option<u32> {
    let start = stem.find(|c: char| c.is_ascii_digit())?;
    let digits = &stem[start..];
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse().ok()
}

impl HskList {
    /// Load every level list in a directory.
    pub fn load_dir(dir: &Path) -> Result<Self, DictError> {
        let read_dir = fs::read_dir(dir).map_err(|source| DictError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<(u32, PathBuf)> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let level = path.file_stem()?.to_str().and_then(level_from_stem)?;
                Some((level, path))
            })
            .collect();

        if files.is_empty() {
            return Err(DictError::NoLevels(dir.to_path_buf()));
        }
        files.sort();

        let mut list = HskList::default();
        for (level, path) in files {
            let text = read_file(&path)?;
            list.add_level(level, &text);
        }

        debug!(dir = %dir.display(), words = list.len(), "loaded hsk lists");
        Ok(list)
    }

    /// Add one level list (`word<TAB>pinyin<TAB>meaning` lines).
    ///
    /// A word already known from a lower level keeps that level.
    pub fn add_level(&mut self, level: u32, text: &str) {
        for (_, line) in content_lines(text) {
            let mut fields = line.split('\t').map(str::trim);
            let word = match fields.next() {
                Some(w) if !w.is_empty() => w,
                _ => continue,
            };
            let pinyin = normalize_reading(fields.next().unwrap_or_default());
            let meaning = fields.next().unwrap_or_default().to_string();

            if let Some(existing) = self.entries.get(word) {
                if existing.level <= level {
                    continue;
                }
                if let Some(words) = self.levels.get_mut(&existing.level) {
                    words.retain(|w| w != word);
                }
            }

            self.levels.entry(level).or_default().push(word.to_string());
            self.entries.insert(
                word.to_string(),
                HskEntry {
                    word: word.to_string(),
                    level,
                    pinyin,
                    meaning,
                },
            );
        }
    }

    pub fn get(&self, word: &str) -> Option<&HskEntry> {
        self.entries.get(word)
    }

    /// Words of one level in list order.
    pub fn words_by_level(&self, level: u32) -> &[String] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().copied()
    }
}

impl LexiconSource for HskList {
    fn source(&self) -> Source {
        Source::Hsk
    }

    fn entries(&self, word: &str) -> Vec<RawEntry> {
        self.get(word)
            .map(|e| vec![RawEntry::new(&e.pinyin, single(&e.meaning))])
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Heisig
// ============================================================================

/// One Heisig table row: keyword meaning, reading and fixed components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HeisigRecord {
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub pinyin: String,
    #[serde(default)]
    pub traditional: String,
    #[serde(default)]
    pub meaning: String,
}

/// Heisig table serving both as a dictionary source and a decomposition table.
#[derive(Debug, Default)]
pub struct HeisigTable {
    records: HashMap<String, HeisigRecord>,
}

impl HeisigTable {
    pub fn load(path: &Path) -> Result<Self, DictError> {
        let text = read_file(path)?;
        Self::from_json(&text).map_err(|source| DictError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut records: HashMap<String, HeisigRecord> = serde_json::from_str(text)?;
        for record in records.values_mut() {
            record.pinyin = normalize_reading(&record.pinyin);
        }
        Ok(Self { records })
    }

    pub fn get(&self, hanzi: &str) -> Option<&HeisigRecord> {
        self.records.get(hanzi)
    }

    /// Static decomposition of a hanzi, empty if the table has none.
    pub fn components(&self, hanzi: &str) -> &[String] {
        self.records
            .get(hanzi)
            .map(|r| r.components.as_slice())
            .unwrap_or(&[])
    }
}

impl LexiconSource for HeisigTable {
    fn source(&self) -> Source {
        Source::Heisig
    }

    fn entries(&self, word: &str) -> Vec<RawEntry> {
        match self.get(word) {
            Some(r) if !r.meaning.is_empty() || !r.pinyin.is_empty() => {
                vec![RawEntry::new(&r.pinyin, single(&r.meaning)).with_traditional(&r.traditional)]
            }
            _ => Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

// ============================================================================
// Components dictionary
// ============================================================================

/// Meanings of structural components that are not words in their own right.
#[derive(Debug, Default)]
pub struct ComponentsDict {
    definitions: HashMap<String, String>,
}

impl ComponentsDict {
    pub fn load(path: &Path) -> Result<Self, DictError> {
        Ok(Self::parse(&read_file(path)?))
    }

    /// Parse `component<TAB>definition` lines.
    pub fn parse(text: &str) -> Self {
        let definitions = content_lines(text)
            .filter_map(|(_, line)| {
                let (component, definition) = line.split_once('\t')?;
                let component = component.trim();
                if component.is_empty() {
                    return None;
                }
                Some((component.to_string(), definition.trim().to_string()))
            })
            .collect();
        Self { definitions }
    }
}

impl LexiconSource for ComponentsDict {
    fn source(&self) -> Source {
        Source::Components
    }

    fn entries(&self, word: &str) -> Vec<RawEntry> {
        self.definitions
            .get(word)
            .map(|d| vec![RawEntry::new("", single(d))])
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.definitions.len()
    }
}

// ============================================================================
// DictionaryIndex
// ============================================================================

/// Result of a merged lookup across all sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictLookup {
    pub entries: DictEntries,
    pub traditional: String,  // CEDICT's first traditional form, else Heisig's
}

impl DictLookup {
    /// English glosses of every entry, in source and reading order.
    pub fn glosses(&self) -> Vec<String> {
        self.entries
            .values()
            .flat_map(|readings| readings.values())
            .map(|e| e.english.clone())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// First reading of the highest-precedence source that has one.
    pub fn first_reading(&self) -> Option<&str> {
        self.entries
            .values()
            .flat_map(|readings| readings.keys())
            .find(|reading| !reading.is_empty())
            .map(String::as_str)
    }
}

/// Merge raw entries sharing a reading: definitions are unioned (exact
/// duplicates dropped, first-seen order kept), the first non-empty
/// traditional form wins.
pub fn merge_readings(source: Source, raw: Vec<RawEntry>) -> BTreeMap<String, DictEntry> {
    let mut merged: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();

    for entry in raw {
        let (traditional, definitions) = merged.entry(entry.reading).or_default();
        for definition in entry.definitions {
            if !definitions.contains(&definition) {
                definitions.push(definition);
            }
        }
        if traditional.is_empty() {
            *traditional = entry.traditional;
        }
    }

    merged
        .into_iter()
        .map(|(reading, (traditional, definitions))| {
            let entry = DictEntry::new(source, &reading, &definitions.join(", "))
                .with_traditional(&traditional);
            (reading, entry)
        })
        .collect()
}

/// Ordered set of dictionary sources queried by precedence.
#[derive(Default)]
pub struct DictionaryIndex {
    sources: Vec<Arc<dyn LexiconSource>>,
}

impl DictionaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; sources are kept sorted by precedence.
    pub fn with_source(mut self, source: Arc<dyn LexiconSource>) -> Self {
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.source());
        self
    }

    /// Look up a word in every source.
    ///
    /// Fails with `NotFound` only if no source has any entry.
    pub fn lookup(&self, word: &str) -> Result<DictLookup, LookupError> {
        let mut entries = DictEntries::new();
        let mut first_traditional: BTreeMap<Source, String> = BTreeMap::new();

        for source in &self.sources {
            let raw = source.entries(word);
            if raw.is_empty() {
                continue;
            }
            if let Some(t) = raw.iter().map(|e| &e.traditional).find(|t| !t.is_empty()) {
                first_traditional.entry(source.source()).or_insert_with(|| t.clone());
            }
            entries
                .entry(source.source())
                .or_default()
                .extend(merge_readings(source.source(), raw));
        }

        if entries.is_empty() {
            return Err(LookupError::NotFound(word.to_string()));
        }

        let traditional = first_traditional
            .get(&Source::Cedict)
            .or_else(|| first_traditional.get(&Source::Heisig))
            .cloned()
            .unwrap_or_default();

        Ok(DictLookup {
            entries,
            traditional,
        })
    }

    pub fn contains(&self, word: &str) -> bool {
        self.sources.iter().any(|s| !s.entries(word).is_empty())
    }

    /// Headword counts per registered source.
    pub fn source_sizes(&self) -> Vec<(Source, usize)> {
        self.sources.iter().map(|s| (s.source(), s.len())).collect()
    }
}

/// File locations of the dictionary sources.
#[derive(Debug, Clone)]
pub struct DictionaryPaths<'a> {
    pub cedict: &'a Path,
    pub hsk_dir: &'a Path,
    pub heisig: &'a Path,
    pub components: &'a Path,
}

/// Loaded dictionary sources plus the merged index over them.
pub struct Dictionaries {
    pub index: DictionaryIndex,
    pub hsk: Arc<HskList>,
    pub heisig: Arc<HeisigTable>,
}

impl Dictionaries {
    /// Build the index from already loaded sources.
    pub fn from_parts(hsk: HskList, heisig: HeisigTable, cedict: Cedict, components: ComponentsDict) -> Self {
        let hsk = Arc::new(hsk);
        let heisig = Arc::new(heisig);
        let index = DictionaryIndex::new()
            .with_source(hsk.clone())
            .with_source(heisig.clone())
            .with_source(Arc::new(cedict))
            .with_source(Arc::new(components));
        Self { index, hsk, heisig }
    }

    /// Load all four sources, parsing files in parallel.
    pub fn load(paths: &DictionaryPaths<'_>) -> Result<Self, DictError> {
        let ((hsk, heisig), (cedict, components)) = rayon::join(
            || rayon::join(|| HskList::load_dir(paths.hsk_dir), || HeisigTable::load(paths.heisig)),
            || rayon::join(|| Cedict::load(paths.cedict), || ComponentsDict::load(paths.components)),
        );
        Ok(Self::from_parts(hsk?, heisig?, cedict?, components?))
    }
}
