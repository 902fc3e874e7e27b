//! Criterion benchmarks for dictionary lookup, decomposition and tones.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zh_cards::decompose::{Decomposer, IdsTable};
use zh_cards::dict::{Cedict, ComponentsDict, Dictionaries, HeisigTable, HskList};
use zh_cards::tones::get_tones;

/// Synthetic CEDICT text: one entry per CJK code point starting at U+4E00.
fn synthetic_cedict(size: u32) -> String {
    let mut text = String::from("# synthetic\n");
    for i in 0..size {
        let Some(c) = char::from_u32(0x4E00 + i) else { continue };
        let tone = i % 5 + 1;
        text.push_str(&format!("{c} {c} [ma{tone}] /gloss {i}/second gloss/\n"));
    }
    text
}

fn synthetic_ids(size: u32) -> String {
    let mut text = String::new();
    for i in 2..size {
        let (Some(c), Some(a), Some(b)) = (
            char::from_u32(0x4E00 + i),
            char::from_u32(0x4E00 + i / 2),
            char::from_u32(0x4E00 + i - 1),
        ) else {
            continue;
        };
        text.push_str(&format!("{c}\t⿰{a}{b}\n"));
    }
    text
}

fn dictionaries(size: u32) -> Dictionaries {
    let mut hsk = HskList::default();
    hsk.add_level(1, "一\tyī\tone\n人\trén\tperson\n");
    Dictionaries::from_parts(
        hsk,
        HeisigTable::default(),
        Cedict::parse(&synthetic_cedict(size)),
        ComponentsDict::default(),
    )
}

fn bench_lookup(c: &mut Criterion) {
    let sizes = [1000, 10000];

    let mut group = c.benchmark_group("lookup");

    for size in sizes {
        let dicts = dictionaries(size);
        let hit = char::from_u32(0x4E00 + size / 2).map(String::from).unwrap_or_default();

        group.bench_with_input(BenchmarkId::new("hit", size), &size, |b, _| {
            b.iter(|| dicts.index.lookup(black_box(&hit)))
        });

        group.bench_with_input(BenchmarkId::new("miss", size), &size, |b, _| {
            b.iter(|| dicts.index.lookup(black_box("龘")))
        });

        // Word that touches HSK and CEDICT
        group.bench_with_input(BenchmarkId::new("multi_source", size), &size, |b, _| {
            b.iter(|| dicts.index.lookup(black_box("人")))
        });
    }

    group.finish();
}

fn bench_decompose(c: &mut Criterion) {
    let size = 10000;
    let dicts = dictionaries(size);
    let ids = IdsTable::parse(&synthetic_ids(size));
    let decomposer = Decomposer::new(&dicts.index, &dicts.heisig, &ids);

    let word: String = (100..110).filter_map(|i| char::from_u32(0x4E00 + i)).collect();

    let mut group = c.benchmark_group("decompose");

    group.bench_function("ten_runes", |b| b.iter(|| decomposer.decompose(black_box(&word))));

    group.finish();
}

fn bench_tones(c: &mut Criterion) {
    let mut group = c.benchmark_group("tones");

    for (name, pinyin) in [
        ("short", "nǐ hǎo"),
        ("neutral", "xiè xie ma"),
        ("long", "zhōng huá rén mín gòng hé guó"),
    ] {
        group.bench_with_input(BenchmarkId::new("get_tones", name), &pinyin, |b, p| {
            b.iter(|| get_tones(black_box(p)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_decompose, bench_tones);
criterion_main!(benches);
