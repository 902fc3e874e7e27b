//! Tone classification from tone-marked pinyin.
//!
//! Every tone-marked vowel contributes one tone, in reading order. A syllable
//! following the last marked vowel is taken to be neutral when a consonant is
//! immediately followed by an unmarked vowel (`māma`, `xièxie`); a bare vowel
//! after the last mark belongs to the marked syllable (`hǎo`).

use crate::models::Tone;

const VOWELS: &str = "aeiouāáǎàōóǒòēéěèīíǐìūúǔùǖüǘǚǜ";
const CONSONANTS: &str = "bcdfghjklmnpqrstvwxyz";

fn tone_of(c: char) -> Option<Tone> {
    match c {
        'ā' | 'ō' | 'ē' | 'ī' | 'ū' | 'ǖ' | 'Ā' | 'Ō' | 'Ē' | 'Ī' | 'Ū' | 'Ǖ' => Some(Tone::First),
        'á' | 'ó' | 'é' | 'í' | 'ú' | 'ǘ' | 'Á' | 'Ó' | 'É' | 'Í' | 'Ú' | 'Ǘ' => Some(Tone::Second),
        'ǎ' | 'ǒ' | 'ě' | 'ǐ' | 'ǔ' | 'ǚ' | 'Ǎ' | 'Ǒ' | 'Ě' | 'Ǐ' | 'Ǔ' | 'Ǚ' => Some(Tone::Third),
        'à' | 'ò' | 'è' | 'ì' | 'ù' | 'ǜ' | 'À' | 'Ò' | 'È' | 'Ì' | 'Ù' | 'Ǜ' => Some(Tone::Fourth),
        _ => None,
    }
}

fn is_vowel(c: char) -> bool {
    VOWELS.contains(c)
}

fn is_consonant(c: char) -> bool {
    CONSONANTS.contains(c)
}

/// Ordered tone labels of a tone-marked pinyin string.
pub fn get_tones(pinyin: &str) -> Vec<Tone> {
    let chars: Vec<char> = pinyin.chars().collect();
    let mut tones = Vec::new();
    let mut last_tone_index: Option<usize> = None;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(tone) = tone_of(c) {
            tones.push(tone);
            last_tone_index = Some(i);
        }
    }

    if chars.len() > 1 {
        let start = last_tone_index.map_or(0, |i| i + 1);
        let mut found_consonant = false;
        let mut neutral = false;

        for &c in &chars[start..] {
            if is_consonant(c) {
                found_consonant = true;
            } else if is_vowel(c) {
                neutral = found_consonant;
            }
        }

        if neutral && found_consonant {
            tones.push(Tone::Neutral);
        }
    }

    tones
}

/// Tone labels as strings, e.g. `["first", "neutral"]`.
pub fn get_tone_labels(pinyin: &str) -> Vec<&'static str> {
    get_tones(pinyin).iter().map(|t| t.label()).collect()
}
