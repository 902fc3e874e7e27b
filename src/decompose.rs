//! Structural decomposition of hanzi.
//!
//! Each rune is broken down with the Heisig table first and the IDS/CJKVI
//! formulas as fallback. Components are expanded exactly one level: their own
//! dictionary glosses are attached, their sub-components are not.

use crate::dict::{content_lines, read_file, DictError, DictionaryIndex, HeisigTable};
use crate::models::{ComponentDecomposition, HanziDecomposition, Source};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecomposeError {
    #[error("no decomposition available for {0}")]
    Unavailable(String),
}

/// The 214 Kangxi radicals in their traditional forms.
const KANGXI_RADICALS: &str = "一丨丶丿乙亅二亠人儿入八冂冖冫几凵刀力勹匕匚匸十卜卩厂厶又口囗土士夂夊夕大女子宀寸小尢尸屮山巛工己巾干幺广廴廾弋弓彐彡彳心戈戶手支攴文斗斤方无日曰月木欠止歹殳毋比毛氏气水火爪父爻爿片牙牛犬玄玉瓜瓦甘生用田疋疒癶白皮皿目矛矢石示禸禾穴立竹米糸缶网羊羽老而耒耳聿肉臣自至臼舌舛舟艮色艸虍虫血行衣襾見角言谷豆豕豸貝赤走足身車辛辰辵邑酉釆里金長門阜隶隹雨靑非面革韋韭音頁風飛食首香馬骨高髟鬥鬯鬲鬼魚鳥鹵鹿麥麻黃黍黑黹黽鼎鼓鼠鼻齊齒龍龜龠";

/// Simplified and positional radical forms.
const RADICAL_VARIANTS: &str = "亻刂氵忄扌犭纟钅饣讠辶阝艹礻衤罒⺮灬爫牜攵王贝见车长门页风飞马鱼鸟麦黄齐齿龙龟丬彑旡尣⺌";

/// Whether a glyph is a Kangxi radical or one of its common variant forms.
pub fn is_kangxi(glyph: &str) -> bool {
    let mut chars = glyph.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            ('\u{2F00}'..='\u{2FD5}').contains(&c)
                || KANGXI_RADICALS.contains(c)
                || RADICAL_VARIANTS.contains(c)
        }
        _ => false,
    }
}

fn is_description_char(c: char) -> bool {
    ('\u{2FF0}'..='\u{2FFF}').contains(&c) || c == '\u{31EF}'
}

fn is_placeholder(c: char) -> bool {
    // circled numbers and similar stand-ins for unencoded glyphs
    ('\u{2460}'..='\u{24FF}').contains(&c) || c == '？' || c == '〾'
}

/// Components named by IDS formulas, keyed by hanzi.
#[derive(Debug, Default)]
pub struct IdsTable {
    formulas: HashMap<String, Vec<String>>,
}

impl IdsTable {
    pub fn load(path: &Path) -> Result<Self, DictError> {
        let text = read_file(path)?;
        let table = Self::parse(&text);
        debug!(path = %path.display(), entries = table.len(), "loaded ids table");
        Ok(table)
    }

    /// Parse `[U+XXXX<TAB>]hanzi<TAB>formula[<TAB>formula...]` lines.
    pub fn parse(text: &str) -> Self {
        let mut formulas = HashMap::new();

        for (_, line) in content_lines(text) {
            let mut fields = line.split('\t').map(str::trim).peekable();
            if fields.peek().map_or(false, |f| f.starts_with("U+")) {
                fields.next();
            }
            let hanzi = match fields.next() {
                Some(h) if !h.is_empty() => h,
                _ => continue,
            };

            let components = extract_components(hanzi, fields);
            if !components.is_empty() {
                formulas.insert(hanzi.to_string(), components);
            }
        }

        Self { formulas }
    }

    pub fn components(&self, hanzi: &str) -> &[String] {
        self.formulas.get(hanzi).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

/// Glyphs of the formulas in order, de-duplicated and without the hanzi itself.
fn extract_components<'s>(hanzi: &str, formulas: impl Iterator<Item = &'s str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut components = Vec::new();

    for formula in formulas {
        let mut in_tag = false;
        for c in formula.chars() {
            match c {
                '[' => in_tag = true,
                ']' => in_tag = false,
                _ if in_tag || c.is_ascii() || c.is_whitespace() => {}
                _ if is_description_char(c) || is_placeholder(c) => {}
                _ => {
                    let glyph = c.to_string();
                    if glyph != hanzi && seen.insert(glyph.clone()) {
                        components.push(glyph);
                    }
                }
            }
        }
    }

    components
}

/// Target of a CEDICT "variant of X" gloss, as its simplified form.
fn variant_target(gloss: &str) -> Option<String> {
    let (_, rest) = gloss.split_once("variant of ")?;
    let target = rest.split(|c| c == '[' || c == ',').next()?.trim();
    let simplified = target.rsplit('|').next()?.trim();
    (!simplified.is_empty()).then(|| simplified.to_string())
}

/// Breaks runes down into glossed components.
pub struct Decomposer<'a> {
    dictionary: &'a DictionaryIndex,
    heisig: &'a HeisigTable,
    ids: &'a IdsTable,
}

impl<'a> Decomposer<'a> {
    pub fn new(dictionary: &'a DictionaryIndex, heisig: &'a HeisigTable, ids: &'a IdsTable) -> Self {
        Self {
            dictionary,
            heisig,
            ids,
        }
    }

    /// Component glyphs of a rune: Heisig first, IDS otherwise.
    pub fn component_glyphs(&self, hanzi: &str) -> Vec<String> {
        let heisig = self.heisig.components(hanzi);
        let glyphs = if heisig.is_empty() {
            self.ids.components(hanzi)
        } else {
            heisig
        };
        glyphs.iter().filter(|g| g.as_str() != hanzi).cloned().collect()
    }

    /// Decompose one rune.
    pub fn decompose_rune(&self, hanzi: &str) -> Result<HanziDecomposition, DecomposeError> {
        let glyphs = self.component_glyphs(hanzi);
        let (traditional, equivalents) = self.variants(hanzi);

        if glyphs.is_empty() {
            return Err(DecomposeError::Unavailable(hanzi.to_string()));
        }

        let components = glyphs
            .into_iter()
            .map(|glyph| {
                let definitions = self
                    .dictionary
                    .lookup(&glyph)
                    .map(|l| l.glosses())
                    .unwrap_or_default();
                ComponentDecomposition {
                    is_kangxi: is_kangxi(&glyph),
                    ideograph: glyph,
                    definitions,
                }
            })
            .collect();

        Ok(HanziDecomposition {
            ideograph: hanzi.to_string(),
            components,
            traditional,
            equivalents,
        })
    }

    /// Decompose every rune of a word. Never fails: a rune without any
    /// decomposition yields an empty component list.
    pub fn decompose(&self, word: &str) -> Vec<HanziDecomposition> {
        word.chars()
            .map(|c| {
                let hanzi = c.to_string();
                match self.decompose_rune(&hanzi) {
                    Ok(decomposition) => decomposition,
                    Err(e) => {
                        warn!(hanzi = %hanzi, error = %e, "building card without components");
                        let (traditional, equivalents) = self.variants(&hanzi);
                        HanziDecomposition {
                            ideograph: hanzi,
                            components: Vec::new(),
                            traditional,
                            equivalents,
                        }
                    }
                }
            })
            .collect()
    }

    /// Traditional forms and CEDICT variant targets, sorted and comma-joined.
    fn variants(&self, hanzi: &str) -> (String, String) {
        let lookup = match self.dictionary.lookup(hanzi) {
            Ok(lookup) => lookup,
            Err(_) => return (String::new(), String::new()),
        };

        let mut traditional = BTreeSet::new();
        let mut equivalents = BTreeSet::new();

        for (source, readings) in &lookup.entries {
            for entry in readings.values() {
                if !entry.traditional.is_empty() && entry.traditional != hanzi {
                    traditional.insert(entry.traditional.clone());
                }
                if *source == Source::Cedict {
                    equivalents.extend(
                        entry
                            .english
                            .split(", ")
                            .filter_map(variant_target)
                            .filter(|t| t != hanzi),
                    );
                }
            }
        }

        (join(traditional), join(equivalents))
    }
}

fn join(set: BTreeSet<String>) -> String {
    set.into_iter().collect::<Vec<_>>().join(", ")
}

fn render(component: &ComponentDecomposition, max_per_gloss: Option<usize>) -> String {
    let definitions: Vec<&str> = component
        .definitions
        .iter()
        .flat_map(|gloss| {
            let parts = gloss.split(',').map(str::trim).filter(|d| !d.is_empty());
            parts.take(max_per_gloss.unwrap_or(usize::MAX))
        })
        .collect();
    format!("{} = {}", component.ideograph, definitions.join(", "))
}

/// All components rendered as `"component = meaning"`.
pub fn get_components(decomposition: &HanziDecomposition) -> Vec<String> {
    decomposition
        .components
        .iter()
        .map(|c| render(c, None))
        .collect()
}

/// Kangxi radical components only, at most three definitions per gloss.
pub fn get_kangxi(decomposition: &HanziDecomposition) -> Vec<String> {
    decomposition
        .components
        .iter()
        .filter(|c| c.is_kangxi)
        .map(|c| render(c, Some(3)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::{Cedict, ComponentsDict, Dictionaries, HskList};

    const CEDICT: &str = "\
好 好 [hao3] /good/well/proper/fine/
女 女 [nu:3] /female/woman/daughter/
子 子 [zi3] /son/child/seed/egg/small thing/
媽 妈 [ma1] /ma/mom/
個 个 [ge4] /individual/measure word/
箇 个 [ge4] /variant of 個|个[ge4]/
";

    fn dictionaries() -> Dictionaries {
        let heisig = HeisigTable::from_json(r#"{"好": {"components": ["女", "子", "好"]}}"#).unwrap();
        Dictionaries::from_parts(HskList::default(), heisig, Cedict::parse(CEDICT), ComponentsDict::default())
    }

    fn ids() -> IdsTable {
        IdsTable::parse("U+5988\t妈\t⿰女马[GTV]\nU+4E00\t一\t一\n")
    }

    #[test]
    fn test_ids_parse() {
        let table = ids();
        assert_eq!(table.components("妈"), &["女".to_string(), "马".to_string()]);
        // self-decomposition is dropped entirely
        assert!(table.components("一").is_empty());
    }

    #[test]
    fn test_heisig_preferred_and_self_reference_skipped() {
        let dicts = dictionaries();
        let ids = ids();
        let decomposer = Decomposer::new(&dicts.index, &dicts.heisig, &ids);

        let d = decomposer.decompose_rune("好").unwrap();
        let glyphs: Vec<&str> = d.components.iter().map(|c| c.ideograph.as_str()).collect();
        assert_eq!(glyphs, vec!["女", "子"]);
        assert!(d.components[0].is_kangxi);
        assert_eq!(d.components[0].definitions, vec!["female, woman, daughter"]);
    }

    #[test]
    fn test_ids_fallback() {
        let dicts = dictionaries();
        let ids = ids();
        let decomposer = Decomposer::new(&dicts.index, &dicts.heisig, &ids);

        let d = decomposer.decompose_rune("妈").unwrap();
        assert_eq!(d.components.len(), 2);
        assert_eq!(d.traditional, "媽");
        // 马 is not in the dictionary
        assert!(d.components[1].definitions.is_empty());
    }

    #[test]
    fn test_decompose_never_fails() {
        let dicts = dictionaries();
        let ids = ids();
        let decomposer = Decomposer::new(&dicts.index, &dicts.heisig, &ids);

        assert_eq!(
            decomposer.decompose_rune("龘"),
            Err(DecomposeError::Unavailable("龘".to_string()))
        );
        let result = decomposer.decompose("龘好");
        assert_eq!(result.len(), 2);
        assert!(result[0].components.is_empty());
        assert_eq!(result[1].components.len(), 2);
    }

    #[test]
    fn test_variants_are_deduplicated() {
        let dicts = dictionaries();
        let ids = ids();
        let decomposer = Decomposer::new(&dicts.index, &dicts.heisig, &ids);

        // both lines share a reading, so the first traditional form wins
        let d = decomposer.decompose("个").remove(0);
        assert_eq!(d.traditional, "個");
        // the variant points back at the rune itself
        assert_eq!(d.equivalents, "");
    }

    #[test]
    fn test_variant_target() {
        assert_eq!(variant_target("variant of 個|个[ge4]"), Some("个".to_string()));
        assert_eq!(variant_target("old variant of 喫[chi1]"), Some("喫".to_string()));
        assert_eq!(variant_target("good"), None);
    }

    #[test]
    fn test_render_components_and_kangxi() {
        let decomposition = HanziDecomposition {
            ideograph: "好".to_string(),
            components: vec![
                ComponentDecomposition {
                    ideograph: "女".to_string(),
                    definitions: vec!["female, woman, daughter, girl".to_string()],
                    is_kangxi: true,
                },
                ComponentDecomposition {
                    ideograph: "马".to_string(),
                    definitions: vec!["horse".to_string()],
                    is_kangxi: false,
                },
            ],
            ..Default::default()
        };

        assert_eq!(
            get_components(&decomposition),
            vec!["女 = female, woman, daughter, girl", "马 = horse"]
        );
        assert_eq!(get_kangxi(&decomposition), vec!["女 = female, woman, daughter"]);
    }

    #[test]
    fn test_is_kangxi() {
        assert!(is_kangxi("女"));
        assert!(is_kangxi("氵"));
        assert!(is_kangxi("\u{2F00}"));
        assert!(!is_kangxi("好"));
        assert!(!is_kangxi("女子"));
    }
}
