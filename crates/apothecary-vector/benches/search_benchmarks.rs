//! Benchmarks for exact k-NN search and end-to-end retrieval.
//!
//! The default catalog size is 1,000 products. Set `BENCH_FULL_SCALE=1` to
//! run against 20,000 products:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p apothecary-vector
//! ```

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use apothecary_core::types::Product;
use apothecary_vector::embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding};
use apothecary_vector::{CorpusIndexBuilder, IndexedCatalog, Retriever};

const CI_PRODUCT_COUNT: usize = 1_000;
const FULL_SCALE_PRODUCT_COUNT: usize = 20_000;

const EFFECTS: [&str; 5] = ["sleep", "relaxation", "energy", "focus", "recovery"];
const INGREDIENTS: [&str; 6] = [
    "Chamomile",
    "Melatonin",
    "Caffeine",
    "Ginseng",
    "Lavender",
    "Magnesium",
];

fn product_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_PRODUCT_COUNT
    } else {
        CI_PRODUCT_COUNT
    }
}

fn synthetic_product(i: usize) -> Product {
    Product {
        id: i as i64,
        name: format!("Product {}", i),
        description: format!(
            "A blend crafted for {} with a hint of {}.",
            EFFECTS[i % EFFECTS.len()],
            INGREDIENTS[i % INGREDIENTS.len()]
        ),
        product_type: if i % 2 == 0 { "tea" } else { "capsule" }.to_string(),
        effects: vec![EFFECTS[i % EFFECTS.len()].to_string()],
        ingredients: vec![
            INGREDIENTS[i % INGREDIENTS.len()].to_string(),
            INGREDIENTS[(i + 1) % INGREDIENTS.len()].to_string(),
        ],
        price: 5.0 + (i % 20) as f64,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_catalog(rt: &tokio::runtime::Runtime, count: usize) -> IndexedCatalog {
    let embedder: Arc<dyn DynEmbeddingService> = Arc::new(MockEmbedding::new());
    let products: Vec<Product> = (0..count).map(synthetic_product).collect();
    rt.block_on(CorpusIndexBuilder::new(embedder, 8).build(products))
        .expect("index build failed")
}

/// Raw k-NN over the flat index with a precomputed query vector.
fn bench_knn_search(c: &mut Criterion) {
    let rt = runtime();
    let count = product_count();
    let catalog = build_catalog(&rt, count);
    let query = rt
        .block_on(MockEmbedding::new().embed("something to help me sleep"))
        .expect("query embed failed");

    let mut group = c.benchmark_group("knn_search");
    group.measurement_time(Duration::from_secs(10));
    for k in [1usize, 3, 10, 50] {
        group.bench_with_input(BenchmarkId::new(format!("{}products", count), k), &k, |b, &k| {
            b.iter(|| {
                let hits = catalog.index().search(&query, k).expect("search failed");
                assert_eq!(hits.len(), k);
                hits
            });
        });
    }
    group.finish();
}

/// Query embedding plus search plus product resolution.
fn bench_retriever(c: &mut Criterion) {
    let rt = runtime();
    let count = product_count();
    let retriever = Retriever::new(
        Arc::new(build_catalog(&rt, count)),
        Arc::new(MockEmbedding::new()),
    );

    let mut group = c.benchmark_group("retriever");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function(format!("recommend_top3_{}products", count), |b| {
        b.iter(|| {
            rt.block_on(retriever.recommend("calming tea before bed", 3))
                .expect("recommend failed")
        });
    });
    group.finish();
}

/// Full corpus build with the mock embedder.
fn bench_index_build(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);
    group.bench_function("build_1000products", |b| {
        b.iter(|| build_catalog(&rt, 1_000));
    });
    group.finish();
}

criterion_group!(benches, bench_knn_search, bench_retriever, bench_index_build);
criterion_main!(benches);
