//! Benchmark suite for Ragnar subsystems.
//!
//! This module provides performance benchmarks for:
//! - Vector store search (cosine top-k over growing record counts)
//! - Prompt rendering (template fill with long histories)
//! - Context assembly (retrieved document formatting)
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ragnar::pipeline::steps::assemble_context;
use ragnar::prompt::render_generation_prompt;
use ragnar::retrieval::{DocumentRecord, RetrievedDocument, StoreMetadata, VectorStore};

const DIMENSION: usize = 64;

/// Deterministic pseudo-embedding for benchmark fixtures.
fn embedding(seed: usize) -> Vec<f32> {
    (0..DIMENSION)
        .map(|i| {
            let x = (seed * 31 + i * 7) % 97;
            x as f32 / 97.0
        })
        .collect()
}

fn store_with(records: usize) -> VectorStore {
    let metadata = StoreMetadata {
        embedding_model: "bench".to_string(),
        dimension: DIMENSION,
        built_at: Utc::now(),
        source: "bench.txt".to_string(),
    };
    let records = (0..records)
        .map(|i| DocumentRecord {
            text: format!("section {i} with some filler text about services and fees"),
            source_label: format!("bench.txt#{i}"),
            section_index: i,
            embedding: embedding(i),
        })
        .collect();
    VectorStore::new(metadata, records).expect("bench store")
}

fn bench_store_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_search");
    let query = embedding(12345);

    for size in [100, 1_000, 10_000] {
        let store = store_with(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| store.search(black_box(&query), 4));
        });
    }

    group.finish();
}

fn bench_prompt_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("prompt_rendering");

    let context = (0..4)
        .map(|i| format!("[Document {} - Source: bench.txt#{i}]\nsome section text", i + 1))
        .collect::<Vec<_>>()
        .join("\n\n");

    for exchanges in [0, 10, 50] {
        let history: Vec<(String, String)> = (0..exchanges)
            .map(|i| (format!("question number {i}"), format!("answer number {i}")))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(exchanges),
            &history,
            |b, history| {
                b.iter(|| {
                    render_generation_prompt(
                        black_box("what is the monthly fee?"),
                        black_box(&context),
                        Some("mention the exact amount"),
                        history,
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_context_assembly(c: &mut Criterion) {
    let documents: Vec<RetrievedDocument> = (0..8)
        .map(|i| RetrievedDocument {
            content: format!("retrieved section {i} spanning a couple of sentences of text"),
            source_label: format!("corpus.txt#{i}"),
            score: 1.0 - i as f32 * 0.1,
        })
        .collect();

    c.bench_function("context_assembly", |b| {
        b.iter(|| assemble_context(black_box(&documents)));
    });
}

criterion_group!(
    benches,
    bench_store_search,
    bench_prompt_rendering,
    bench_context_assembly
);
criterion_main!(benches);
