//! Pinyin helpers: numbered-to-marked conversion and tone stripping.
//!
//! CEDICT publishes readings with tone numbers (`ni3 hao3`); every other
//! source and the tone classifier work with tone marks (`nǐ hǎo`).

/// Tone-marked forms per base vowel, indexed by tone 1-4.
const MARKS: [(char, [char; 4]); 12] = [
    ('a', ['ā', 'á', 'ǎ', 'à']),
    ('e', ['ē', 'é', 'ě', 'è']),
    ('i', ['ī', 'í', 'ǐ', 'ì']),
    ('o', ['ō', 'ó', 'ǒ', 'ò']),
    ('u', ['ū', 'ú', 'ǔ', 'ù']),
    ('ü', ['ǖ', 'ǘ', 'ǚ', 'ǜ']),
    ('A', ['Ā', 'Á', 'Ǎ', 'À']),
    ('E', ['Ē', 'É', 'Ě', 'È']),
    ('I', ['Ī', 'Í', 'Ǐ', 'Ì']),
    ('O', ['Ō', 'Ó', 'Ǒ', 'Ò']),
    ('U', ['Ū', 'Ú', 'Ǔ', 'Ù']),
    ('Ü', ['Ǖ', 'Ǘ', 'Ǚ', 'Ǜ']),
];

fn mark(vowel: char, tone: u32) -> char {
    MARKS
        .iter()
        .find(|(base, _)| *base == vowel)
        .map(|(_, marked)| marked[(tone - 1) as usize])
        .unwrap_or(vowel)
}

fn is_plain_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u') || c == 'ü' || c == 'Ü'
}

/// Convert a single numbered syllable (`hao3`, `lu:4`, `ma5`) to tone marks.
pub fn syllable_to_marked(syllable: &str) -> String {
    let normalized = syllable
        .replace("u:", "ü")
        .replace("U:", "Ü")
        .replace('v', "ü")
        .replace('V', "Ü");

    let (body, tone) = match normalized.chars().last().and_then(|c| c.to_digit(10)) {
        Some(d) => (&normalized[..normalized.len() - 1], d),
        None => return normalized,
    };

    if !(1..=4).contains(&tone) {
        return body.to_string();
    }

    let chars: Vec<char> = body.chars().collect();
    let lower: String = body.to_lowercase();

    // a/e always carry the mark, then the o of "ou", then the last vowel
    let target = if let Some(pos) = chars.iter().position(|c| matches!(c, 'a' | 'A' | 'e' | 'E')) {
        Some(pos)
    } else if lower.contains("ou") {
        chars.iter().position(|c| matches!(c, 'o' | 'O'))
    } else {
        chars.iter().rposition(|&c| is_plain_vowel(c))
    };

    match target {
        Some(pos) => chars
            .iter()
            .enumerate()
            .map(|(i, &c)| if i == pos { mark(c, tone) } else { c })
            .collect(),
        None => body.to_string(),
    }
}

/// Convert a whitespace-separated numbered reading to tone marks.
pub fn numbered_to_marked(reading: &str) -> String {
    reading
        .split_whitespace()
        .map(syllable_to_marked)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a reading still carries tone numbers.
pub fn is_numbered(reading: &str) -> bool {
    reading
        .split_whitespace()
        .any(|s| s.chars().last().map_or(false, |c| c.is_ascii_digit()))
}

/// Remove tone marks and lowercase, keeping ü.
pub fn strip_tones(pinyin: &str) -> String {
    pinyin
        .chars()
        .map(|c| {
            MARKS
                .iter()
                .find(|(_, marked)| marked.contains(&c))
                .map(|(base, _)| *base)
                .unwrap_or(c)
        })
        .collect::<String>()
        .to_lowercase()
}
