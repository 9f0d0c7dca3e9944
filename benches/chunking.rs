use criterion::{Criterion, criterion_group, criterion_main};
use doc_query::config::ChunkingConfig;
use doc_query::ingest::{Page, split};
use std::hint::black_box;

fn sample_pages() -> Vec<Page> {
    let paragraph = "Vector search compares embeddings by cosine similarity. \
        Each chunk keeps its source file and page so answers can cite them. \
        Longer documents are split on paragraph and sentence boundaries first.";
    (1..=40)
        .map(|page| Page {
            content: std::iter::repeat_n(paragraph, 12)
                .collect::<Vec<_>>()
                .join("\n\n"),
            source: "handbook.pdf".to_string(),
            page: Some(page),
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let pages = sample_pages();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| split(black_box(&pages), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
