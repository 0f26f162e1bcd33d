use criterion::{Criterion, criterion_group, criterion_main};
use folio::database::lancedb::VectorCandidate;
use folio::embeddings::HashingEmbedder;
use folio::retrieval::{cosine_similarity, rank_candidates};
use std::hint::black_box;

const DIMENSIONS: usize = 1536;

pub fn criterion_benchmark(c: &mut Criterion) {
    let embedder = HashingEmbedder::new(DIMENSIONS);
    let query = embedder.embed_sync("how does the write ahead log interact with readers");
    let vectors: Vec<Vec<f32>> = (0..1000)
        .map(|i| embedder.embed_sync(&format!("page {} about logging readers and writers", i)))
        .collect();

    c.bench_function("cosine_similarity_1000x1536", |b| {
        b.iter(|| {
            vectors
                .iter()
                .map(|v| cosine_similarity(black_box(&query), black_box(v)))
                .sum::<f32>()
        })
    });

    let candidates: Vec<VectorCandidate> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| VectorCandidate {
            chunk_id: i as i64 + 1,
            document_id: 1,
            position: i as i64 + 1,
            content: String::new(),
            distance: 1.0 - cosine_similarity(&query, v),
        })
        .collect();

    c.bench_function("rank_candidates_1000", |b| {
        b.iter(|| rank_candidates(black_box(candidates.clone()), black_box(0.1), black_box(5)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
