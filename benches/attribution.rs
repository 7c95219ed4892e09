use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sentiment_lens::explain::{AttributionMethod, Explainer};

#[path = "../tests/common/mod.rs"]
mod common;

const WORDS: &[&str] = &[
    "the", "stock", "market", "is", "not", "very", "good", "to", "the", "moon", "!", "great",
    "rally", "crash", "bad", "terrible",
];

fn text_of(tokens: usize) -> String {
    WORDS.iter().cycle().take(tokens).copied().collect::<Vec<_>>().join(" ")
}

fn bench_classify(c: &mut Criterion) {
    let pipeline = common::handle("toy/sentiment", common::BagOfWords::sentiment());

    c.bench_function("classify", |b| {
        b.iter(|| pipeline.classify(black_box("to the moon !")))
    });
}

fn bench_exact_by_tokens(c: &mut Criterion) {
    let pipeline = common::handle("toy/sentiment", common::BagOfWords::sentiment());
    let explainer = Explainer::new().method(AttributionMethod::Exact);
    let mut group = c.benchmark_group("exact_tokens");

    for tokens in [2, 6, 10, 14] {
        let text = text_of(tokens);
        group.bench_with_input(BenchmarkId::from_parameter(tokens), &text, |b, text| {
            b.iter(|| explainer.explain(&pipeline, black_box(text)))
        });
    }
    group.finish();
}

fn bench_permutation_by_pairs(c: &mut Criterion) {
    let pipeline = common::handle("toy/sentiment", common::BagOfWords::sentiment());
    let text = text_of(40);
    let mut group = c.benchmark_group("permutation_pairs");

    for permutations in [1, 8, 32] {
        let explainer = Explainer::new().method(AttributionMethod::Permutation {
            permutations,
            seed: 0,
        });
        group.bench_with_input(
            BenchmarkId::from_parameter(permutations),
            &text,
            |b, text| b.iter(|| explainer.explain(&pipeline, black_box(text))),
        );
    }
    group.finish();
}

fn bench_batch_size(c: &mut Criterion) {
    let pipeline = common::handle("toy/sentiment", common::BagOfWords::sentiment());
    let text = text_of(10);
    let mut group = c.benchmark_group("exact_batch_size");

    for batch_size in [1, 32, 256] {
        let explainer = Explainer::new()
            .method(AttributionMethod::Exact)
            .batch_size(batch_size);
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &text, |b, text| {
            b.iter(|| explainer.explain(&pipeline, black_box(text)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_exact_by_tokens,
    bench_permutation_by_pairs,
    bench_batch_size,
);
criterion_main!(benches);
