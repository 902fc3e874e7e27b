//! Card construction: merges dictionary lookups, decomposition, tones,
//! mnemonics and frequency examples into a single `Card`.

use crate::decompose::Decomposer;
use crate::dict::{DictLookup, DictionaryIndex, LookupError};
use crate::frequency::ExampleSource;
use crate::mnemonic::MnemonicSource;
use crate::models::{Card, Component, Source};
use crate::tones::get_tones;
use crate::translate::TranslationLookup;
use std::collections::BTreeSet;
use tracing::warn;

/// Builds hanzi and word cards from the loaded lookup sources.
pub struct CardBuilder<'a> {
    dictionary: &'a DictionaryIndex,
    decomposer: Decomposer<'a>,
    mnemonics: &'a dyn MnemonicSource,
    examples: &'a dyn ExampleSource,
    example_count: usize,
}

impl<'a> CardBuilder<'a> {
    pub fn new(
        dictionary: &'a DictionaryIndex,
        decomposer: Decomposer<'a>,
        mnemonics: &'a dyn MnemonicSource,
        examples: &'a dyn ExampleSource,
    ) -> Self {
        Self {
            dictionary,
            decomposer,
            mnemonics,
            examples,
            example_count: 5,
        }
    }

    /// Number of frequency examples attached to single-rune cards.
    pub fn with_example_count(mut self, count: usize) -> Self {
        self.example_count = count;
        self
    }

    pub fn decomposer(&self) -> &Decomposer<'a> {
        &self.decomposer
    }

    /// Card for a single hanzi.
    ///
    /// Never fails: a hanzi missing from every dictionary yields a card with
    /// no entries, components come from the decomposer.
    pub fn get_hanzi_card(&self, hanzi: &str, translations: &dyn TranslationLookup) -> Card {
        let lookup = match self.dictionary.lookup(hanzi) {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(hanzi = %hanzi, error = %e, "building hanzi card without dictionary entries");
                DictLookup::default()
            }
        };

        let components = match self.decomposer.decompose_rune(hanzi) {
            Ok(decomposition) => decomposition
                .components
                .into_iter()
                .map(|c| {
                    if c.definitions.is_empty() {
                        warn!(component = %c.ideograph, hanzi = %hanzi, "component meaning is empty");
                    }
                    Component {
                        simplified_chinese: c.ideograph,
                        english: c.definitions.join(", "),
                    }
                })
                .collect(),
            Err(e) => {
                warn!(hanzi = %hanzi, error = %e, "no components found");
                Vec::new()
            }
        };

        self.assemble(hanzi, lookup, components, translations)
    }

    /// Card for a word; components are the word's runes, each looked up on
    /// its own.
    pub fn get_word_card(
        &self,
        word: &str,
        translations: &dyn TranslationLookup,
    ) -> Result<Card, LookupError> {
        let lookup = self.dictionary.lookup(word)?;
        let components = self.word_components(word);
        Ok(self.assemble(word, lookup, components, translations))
    }

    fn word_components(&self, word: &str) -> Vec<Component> {
        word.chars()
            .map(|c| {
                let hanzi = c.to_string();
                let glosses = match self.dictionary.lookup(&hanzi) {
                    Ok(lookup) => lookup.glosses(),
                    Err(e) => {
                        warn!(word = %word, error = %e, "looking up word component");
                        Vec::new()
                    }
                };
                if glosses.is_empty() {
                    warn!(component = %hanzi, "component meaning is empty");
                }
                Component {
                    simplified_chinese: hanzi,
                    english: glosses.join(", "),
                }
            })
            .collect()
    }

    fn assemble(
        &self,
        lexeme: &str,
        mut lookup: DictLookup,
        components: Vec<Component>,
        translations: &dyn TranslationLookup,
    ) -> Card {
        let single_rune = lexeme.chars().count() == 1;

        let (mnemonic_base, mnemonic, example) = if single_rune {
            (
                self.attach_mnemonic_bases(lexeme, &mut lookup),
                self.mnemonics.mnemonic(lexeme).unwrap_or_default().to_string(),
                self.example_words(lexeme),
            )
        } else {
            (String::new(), String::new(), String::new())
        };

        let tones = lookup.first_reading().map(get_tones).unwrap_or_default();

        Card {
            simplified: lexeme.to_string(),
            traditional: lookup.traditional,
            dict_entries: lookup.entries,
            components,
            mnemonic_base,
            mnemonic,
            translation: translations.lookup(lexeme).unwrap_or_default(),
            tones,
            example,
        }
    }

    /// Fill each reading's mnemonic base and render the card-level string,
    /// one block per distinct reading.
    fn attach_mnemonic_bases(&self, hanzi: &str, lookup: &mut DictLookup) -> String {
        let mut rendered = String::new();
        let mut seen = BTreeSet::new();

        for (source, readings) in lookup.entries.iter_mut() {
            if *source == Source::Components {
                continue;
            }
            for entry in readings.values_mut() {
                if entry.pinyin.is_empty() {
                    continue;
                }
                match self.mnemonics.base(&entry.pinyin) {
                    Some(base) => {
                        entry.mnemonic_base = base.base.clone();
                        entry.pronunciation = base.pronunciation.clone();
                        if seen.insert(entry.pinyin.clone()) {
                            rendered.push_str(&format!(
                                "{} - {}<br>{}<br>",
                                source, entry.pinyin, base.base
                            ));
                        }
                    }
                    None => {
                        warn!(hanzi = %hanzi, pinyin = %entry.pinyin, "no mnemonic base");
                    }
                }
            }
        }

        rendered
    }

    fn example_words(&self, hanzi: &str) -> String {
        let mut seen = BTreeSet::new();
        self.examples
            .examples_for_hanzi(hanzi, self.example_count + 1)
            .into_iter()
            .filter(|w| w != hanzi && seen.insert(w.clone()))
            .take(self.example_count)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::IdsTable;
    use crate::dict::{Cedict, ComponentsDict, Dictionaries, HeisigTable, HskList};
    use crate::frequency::WordIndex;
    use crate::mnemonic::MnemonicIndex;
    use crate::models::Tone;
    use std::collections::HashMap;

    const CEDICT: &str = "\
你好 你好 [ni3 hao3] /hello/hi/
你 你 [ni3] /you/
好 好 [hao3] /good/well/
好 好 [hao4] /to be fond of/
女 女 [nu:3] /female/woman/
子 子 [zi3] /child/
";

    struct Fixture {
        dicts: Dictionaries,
        ids: IdsTable,
        mnemonics: MnemonicIndex,
        words: WordIndex,
    }

    fn fixture() -> Fixture {
        let mut hsk = HskList::default();
        hsk.add_level(1, "你好\tnǐ hǎo\thello\n好\thǎo\tgood\n");
        let heisig = HeisigTable::from_json(r#"{"好": {"components": ["女", "子"], "meaning": "good", "pinyin": "hǎo"}}"#).unwrap();
        let mut mnemonics = MnemonicIndex::parse_bases("hao\tHoward\thow\nni\tNina\tnee\n");
        mnemonics.add_mnemonics("好\tA woman and child.\n");

        Fixture {
            dicts: Dictionaries::from_parts(hsk, heisig, Cedict::parse(CEDICT), ComponentsDict::default()),
            ids: IdsTable::default(),
            mnemonics,
            words: WordIndex::parse("你好:10\n好:9\n好人:8\n很好:7\n"),
        }
    }

    fn builder(f: &Fixture) -> CardBuilder<'_> {
        let decomposer = Decomposer::new(&f.dicts.index, &f.dicts.heisig, &f.ids);
        CardBuilder::new(&f.dicts.index, decomposer, &f.mnemonics, &f.words).with_example_count(2)
    }

    #[test]
    fn test_word_card() {
        let f = fixture();
        let builder = builder(&f);
        let translations: HashMap<String, String> =
            [("你好".to_string(), "hello!".to_string())].into_iter().collect();

        let card = builder.get_word_card("你好", &translations).unwrap();

        assert_eq!(card.dict_entries[&Source::Hsk]["nǐ hǎo"].english, "hello");
        assert_eq!(card.dict_entries[&Source::Cedict]["nǐ hǎo"].english, "hello, hi");
        assert_eq!(card.components.len(), 2);
        assert_eq!(card.components[0].simplified_chinese, "你");
        assert_eq!(card.components[0].english, "you");
        assert!(!card.components[1].english.is_empty());
        assert_eq!(card.tones, vec![Tone::Third, Tone::Third]);
        assert_eq!(card.translation, "hello!");
        // no single-rune extras on words
        assert!(card.mnemonic_base.is_empty());
        assert!(card.example.is_empty());
    }

    #[test]
    fn test_word_card_not_found() {
        let f = fixture();
        let builder = builder(&f);
        let result = builder.get_word_card("再见", &HashMap::new());
        assert_eq!(result, Err(LookupError::NotFound("再见".to_string())));
    }

    #[test]
    fn test_hanzi_card() {
        let f = fixture();
        let builder = builder(&f);
        let card = builder.get_hanzi_card("好", &HashMap::new());

        let components: Vec<&str> = card.components.iter().map(|c| c.simplified_chinese.as_str()).collect();
        assert_eq!(components, vec!["女", "子"]);
        assert_eq!(card.components[0].english, "female, woman");

        assert_eq!(card.mnemonic, "A woman and child.");
        assert_eq!(
            card.mnemonic_base,
            "hsk - hǎo<br>Howard<br>cedict - hào<br>Howard<br>"
        );
        assert_eq!(card.dict_entries[&Source::Cedict]["hǎo"].mnemonic_base, "Howard");
        assert_eq!(card.dict_entries[&Source::Cedict]["hǎo"].pronunciation, "how");
        assert_eq!(card.dict_entries[&Source::Cedict]["hào"].mnemonic_base, "Howard");
        assert_eq!(card.tones, vec![Tone::Third]);
        assert_eq!(card.example, "你好, 好人");
    }

    #[test]
    fn test_hanzi_card_without_entries() {
        let f = fixture();
        let builder = builder(&f);
        let card = builder.get_hanzi_card("龘", &HashMap::new());

        assert!(card.dict_entries.is_empty());
        assert!(card.components.is_empty());
        assert!(card.tones.is_empty());
    }
}
