//! # Encore Performance Benchmarks
//!
//! Benchmarks for the hot paths of an autoplay decision.
//!
//! ## Benchmark Categories
//!
//! - **Normalization**: Text normalization and feature extraction
//! - **Scoring**: Single and batch scoring
//! - **Pool Building**: Dedup and exclusion over several sources
//! - **Reranking**: MMR at several pool sizes and batch limits
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench scoring
//! cargo bench mmr
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use encore::algorithm::{self, WeightConfig};
use encore::candidates;
use encore::features::{normalize_text, TrackFeatures};
use encore::queue::{self, RadioQueue};
use encore::session::{HistoryEntry, SessionContext};
use encore::track::{Track, TrackId};
use std::hint::black_box;

const GENRES: [&str; 5] = ["Phonk", "K-Pop", "Reggaeton", "Trap", "Indie"];

/// Realistic candidate list: 20 artists, albums of 10, a handful of genres.
fn create_test_tracks(count: u64, offset: u64) -> Vec<Track> {
    (0..count)
        .map(|i| {
            let n = i + offset;
            Track::new(n, &format!("Song {n:04} (Official Audio)"), &[format!("Artist {}", n % 20).as_str()])
                .with_album(&format!("Album {}", n / 10))
                .with_genre(GENRES[(n % 5) as usize])
                .with_duration(150.0 + (n % 90) as f64)
                .with_plays(n * 37 % 10_000)
        })
        .collect()
}

fn create_context() -> SessionContext {
    let current = Track::new("now", "Song Now", &["Artist 0"]).with_genre("Phonk").with_duration(180.0);
    let history = create_test_tracks(50, 5_000).into_iter().map(HistoryEntry::played).collect();
    SessionContext::new(Some(current))
        .with_history(history)
        .with_favorite_ids((0..200u64).step_by(7).map(TrackId::from))
        .with_trending_ids((0..200u64).step_by(11).map(TrackId::from))
        .with_recent_artists(["Artist 3", "Artist 4"])
        .with_max_plays(10_000)
        .with_seed("bench-session")
}

fn benchmark_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");

    group.bench_function("normalize_text", |b| {
        b.iter(|| normalize_text(black_box("MONTAGEM - Coral (Slowed + Reverb) [Official Video] ÉTÉ")))
    });

    let track = create_test_tracks(1, 0).remove(0);
    group.bench_function("extract_features", |b| b.iter(|| TrackFeatures::extract(black_box(&track))));

    group.finish();
}

fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let context = create_context();
    let weights = WeightConfig::default();

    let track = create_test_tracks(1, 0).remove(0);
    group.bench_function("single_track_score", |b| {
        b.iter(|| algorithm::score_track(black_box(&track), black_box(&context)))
    });

    for size in [10, 100, 300, 1000] {
        let tracks = create_test_tracks(size, 0);
        group.bench_with_input(BenchmarkId::new("batch_scoring", size), &tracks, |b, tracks| {
            b.iter(|| algorithm::batch_score_tracks(black_box(tracks), black_box(&context), &weights))
        });
    }

    group.finish();
}

fn benchmark_pool_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_building");
    let context = create_context();

    for size in [100, 500, 2000] {
        // Overlapping sources so dedup has work to do.
        let sources = vec![create_test_tracks(size, 0), create_test_tracks(size, size / 2)];
        group.bench_with_input(BenchmarkId::new("build_candidates", size), &sources, |b, sources| {
            b.iter(|| candidates::build_candidates_for(black_box(sources), &context, candidates::DEFAULT_POOL_CAPACITY))
        });
    }

    group.finish();
}

fn benchmark_mmr(c: &mut Criterion) {
    let mut group = c.benchmark_group("mmr");
    let context = create_context();

    for (pool_size, limit) in [(50, 10), (300, 20), (300, 50)] {
        let pool = create_test_tracks(pool_size, 0);
        group.bench_with_input(
            BenchmarkId::new("rank_with_mmr", format!("{pool_size}x{limit}")),
            &pool,
            |b, pool| b.iter(|| queue::rank_with_mmr(black_box(pool), &context, limit, 0.7)),
        );
    }

    let sources = vec![create_test_tracks(400, 0), create_test_tracks(100, 1_000)];
    let radio = RadioQueue::default();
    group.bench_function("next_batch_end_to_end", |b| {
        b.iter(|| radio.next_batch(black_box(&sources), &context, 20))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_normalization,
    benchmark_scoring,
    benchmark_pool_building,
    benchmark_mmr
);
criterion_main!(benches);
