//! # Autoplay Queue Generation
//!
//! Turns a candidate pool into the next batch of the radio queue with a
//! Maximal Marginal Relevance (MMR) reranker:
//!
//! 1. **Narrowing**: when enough candidates share the current genre, only they
//!    are considered. Then candidates that are neither related to the current
//!    track nor backed by favorites/history are dropped, unless that would
//!    starve the batch.
//! 2. **Ordering**: by relevance, ties broken by per-session jitter.
//! 3. **Greedy selection**: each step picks the candidate maximizing
//!    `λ·relevance − (1−λ)·max_similarity_to_selected + jitter`.
//! 4. **Local shuffle**: with a session seed, the result is shuffled inside
//!    windows of 5 so the same session still hears some variation.
//!
//! [`RadioQueue`] wires the pool builder, scorer and reranker together under
//! one [`EngineConfig`].

use crate::algorithm::{pairwise_similarity, ScoreBreakdown, Scorer, WeightConfig};
use crate::candidates::build_candidates_for;
use crate::config::EngineConfig;
use crate::features::TrackFeatures;
use crate::rng::SessionRng;
use crate::session::SessionContext;
use crate::track::Track;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Reranker settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Relevance/diversity trade-off: 1.0 is pure relevance
    pub lambda: f64,
    /// Width of the seeded local shuffle
    pub shuffle_window: usize,
    /// Batch size when the caller gives none
    pub default_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lambda: 0.7,
            shuffle_window: 5,
            default_limit: 20,
        }
    }
}

impl QueueConfig {
    /// Lambda clamped to [0, 1], or the configured value when `requested` is
    /// absent or not a number.
    #[must_use]
    pub fn resolve_lambda(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(lambda) if lambda.is_finite() => lambda.clamp(0.0, 1.0),
            _ => self.lambda,
        }
    }
}

/// One selected track and the signals that placed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTrack {
    pub track: Track,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
    pub jitter: f64,
    /// Composite MMR value at the moment of selection
    pub mmr: f64,
}

/// A pool candidate with its score, as reported by [`RadioQueue::explain`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub track: Track,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
}

struct ScoredCandidate<'a> {
    features: TrackFeatures<'a>,
    breakdown: ScoreBreakdown,
    jitter: f64,
}

impl ScoredCandidate<'_> {
    fn score(&self) -> f64 {
        self.breakdown.score
    }
}

/// MMR reranker bound to one session's scorer.
#[derive(Debug)]
pub struct Reranker<'s, 'a> {
    scorer: &'s Scorer<'a>,
    context: &'a SessionContext,
    lambda: f64,
    shuffle_window: usize,
}

impl<'s, 'a> Reranker<'s, 'a> {
    #[must_use]
    pub fn new(scorer: &'s Scorer<'a>, context: &'a SessionContext, config: &QueueConfig) -> Self {
        Self {
            scorer,
            context,
            lambda: config.resolve_lambda(None),
            shuffle_window: config.shuffle_window.max(1),
        }
    }

    #[must_use]
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        if lambda.is_finite() {
            self.lambda = lambda.clamp(0.0, 1.0);
        }
        self
    }

    /// Select and order up to `limit` candidates.
    #[must_use]
    pub fn rank(&self, candidates: &[Track], limit: usize) -> Vec<RankedTrack> {
        if limit == 0 || candidates.is_empty() {
            return Vec::new();
        }

        let features = self.narrow_to_genre(unique_features(candidates));
        let breakdowns = self.scorer.breakdown_all(&features);

        // One generator per call; jitter is drawn in pool order.
        let mut rng = SessionRng::from_seed(self.context.seed.as_ref());
        let scale = self.context.jitter_scale();
        let mut scored: Vec<ScoredCandidate<'_>> = features
            .into_iter()
            .zip(breakdowns)
            .map(|(features, breakdown)| ScoredCandidate {
                features,
                breakdown,
                jitter: rng.jitter(scale),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.jitter.partial_cmp(&a.jitter).unwrap_or(Ordering::Equal))
        });

        let pool = self.related_pool(scored, limit);
        let mut selected = self.select(pool, limit);

        if rng.is_seeded() && selected.len() > 1 {
            rng.shuffle_windows(&mut selected, self.shuffle_window);
        }
        selected
    }

    fn narrow_to_genre<'t>(&self, features: Vec<TrackFeatures<'t>>) -> Vec<TrackFeatures<'t>> {
        let Some(bucket) = self.scorer.current().map(|c| c.genre_bucket.as_str()).filter(|b| !b.is_empty()) else {
            return features;
        };

        let same_genre = features.iter().filter(|f| f.genre_bucket == bucket).count();
        let needed = self.context.min_same_genre().max(1);
        match same_genre >= needed {
            true => {
                debug!("Narrowing to {same_genre} of {} candidates in genre '{bucket}'", features.len());
                features.into_iter().filter(|f| f.genre_bucket == bucket).collect()
            }
            false => features,
        }
    }

    /// Related-only pool when it holds at least `min(min_related, limit)`
    /// candidates, else everything. An explicit `min_related` of 0 always
    /// takes the related pool, even when it is empty.
    fn related_pool<'c>(&self, scored: Vec<ScoredCandidate<'c>>, limit: usize) -> Vec<ScoredCandidate<'c>> {
        let floor = self.context.relatedness_floor();
        let needed = self.context.min_related(limit).min(limit);
        let related = scored
            .iter()
            .filter(|c| c.breakdown.relatedness >= floor || c.breakdown.affinity > 0.0)
            .count();

        match related >= needed {
            true => {
                debug!("Using {related} related candidates of {} (floor {floor})", scored.len());
                scored
                    .into_iter()
                    .filter(|c| c.breakdown.relatedness >= floor || c.breakdown.affinity > 0.0)
                    .collect()
            }
            false => {
                debug!("Only {related} related candidates, need {needed}: using all {}", scored.len());
                scored
            }
        }
    }

    fn select(&self, mut pool: Vec<ScoredCandidate<'_>>, limit: usize) -> Vec<RankedTrack> {
        let lambda = self.lambda;
        let pairwise = self.scorer.pairwise();
        let mut max_similarity = vec![0.0_f64; pool.len()];
        let mut selected = Vec::with_capacity(limit.min(pool.len()));

        while selected.len() < limit && !pool.is_empty() {
            let mut best = 0;
            let mut best_mmr = f64::NEG_INFINITY;
            for (index, candidate) in pool.iter().enumerate() {
                let mmr = lambda * candidate.score() - (1.0 - lambda) * max_similarity[index] + candidate.jitter;
                let better = mmr > best_mmr || (mmr == best_mmr && candidate.score() > pool[best].score());
                if better {
                    best = index;
                    best_mmr = mmr;
                }
            }

            let picked = pool.remove(best);
            max_similarity.remove(best);
            for (candidate, similarity) in pool.iter().zip(max_similarity.iter_mut()) {
                *similarity = similarity.max(pairwise_similarity(&candidate.features, &picked.features, pairwise));
            }

            trace!(
                "Picked '{}' (score {:.3}, mmr {:.3}), {} left",
                picked.features.track.title,
                picked.score(),
                best_mmr,
                pool.len()
            );
            selected.push(RankedTrack {
                track: picked.features.track.clone(),
                breakdown: picked.breakdown,
                jitter: picked.jitter,
                mmr: best_mmr,
            });
        }

        selected
    }
}

/// Features of each distinct recording, first occurrence wins.
fn unique_features(candidates: &[Track]) -> Vec<TrackFeatures<'_>> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(TrackFeatures::extract)
        .filter(|f| f.key.as_ref().is_some_and(|key| seen.insert(key.clone())))
        .collect()
}

/// Rerank `candidates` with default weights.
///
/// Returns at most `limit` tracks, never two with the same identity key.
///
/// ```
/// use encore::queue::rank_with_mmr;
/// use encore::session::SessionContext;
/// use encore::track::Track;
///
/// let ctx = SessionContext::new(Some(Track::new(1, "Song A", &["X"]))).with_seed("s1");
/// let pool: Vec<Track> = (2..10).map(|i| Track::new(i, &format!("Track {i}"), &["X"])).collect();
///
/// let first = rank_with_mmr(&pool, &ctx, 5, 0.7);
/// assert_eq!(first.len(), 5);
/// assert_eq!(first, rank_with_mmr(&pool, &ctx, 5, 0.7), "Seeded runs repeat");
/// assert!(rank_with_mmr(&[], &ctx, 20, 0.7).is_empty());
/// ```
#[must_use]
pub fn rank_with_mmr(candidates: &[Track], context: &SessionContext, limit: usize, lambda: f64) -> Vec<Track> {
    let scorer = Scorer::new(context, &WeightConfig::default());
    Reranker::new(&scorer, context, &QueueConfig::default())
        .with_lambda(lambda)
        .rank(candidates, limit)
        .into_iter()
        .map(|ranked| ranked.track)
        .collect()
}

/// Full autoplay pipeline: pool building, scoring and reranking.
#[derive(Debug, Clone, Default)]
pub struct RadioQueue {
    config: EngineConfig,
}

impl RadioQueue {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config: config.validated() }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn build_pool<S: AsRef<[Track]>>(&self, sources: &[S], context: &SessionContext) -> Vec<Track> {
        build_candidates_for(sources, context, self.config.pool_capacity)
    }

    /// Next batch with per-track diagnostics.
    #[must_use]
    pub fn next_ranked<S: AsRef<[Track]>>(
        &self,
        sources: &[S],
        context: &SessionContext,
        limit: usize,
        lambda: Option<f64>,
    ) -> Vec<RankedTrack> {
        let pool = self.build_pool(sources, context);
        let scorer = self.scorer(context, &pool);
        let lambda = self.config.queue.resolve_lambda(lambda);

        let ranked = Reranker::new(&scorer, context, &self.config.queue)
            .with_lambda(lambda)
            .rank(&pool, limit);
        debug!("Selected {} of {} pooled candidates (lambda {lambda})", ranked.len(), pool.len());
        ranked
    }

    #[must_use]
    pub fn next_batch<S: AsRef<[Track]>>(&self, sources: &[S], context: &SessionContext, limit: usize) -> Vec<Track> {
        self.next_ranked(sources, context, limit, None)
            .into_iter()
            .map(|ranked| ranked.track)
            .collect()
    }

    /// Score every pooled candidate, best first, without reranking.
    #[must_use]
    pub fn explain<S: AsRef<[Track]>>(&self, sources: &[S], context: &SessionContext) -> Vec<Explanation> {
        let pool = self.build_pool(sources, context);
        let scorer = self.scorer(context, &pool);
        let features: Vec<TrackFeatures<'_>> = pool.iter().map(TrackFeatures::extract).collect();

        let mut explained: Vec<Explanation> = features
            .iter()
            .zip(scorer.breakdown_all(&features))
            .map(|(f, breakdown)| Explanation { track: f.track.clone(), breakdown })
            .collect();
        explained.sort_by(|a, b| b.breakdown.score.partial_cmp(&a.breakdown.score).unwrap_or(Ordering::Equal));
        explained
    }

    fn scorer<'a>(&self, context: &'a SessionContext, pool: &[Track]) -> Scorer<'a> {
        let pool_max = pool.iter().map(Track::play_count).max().unwrap_or(0);
        Scorer::new(context, &self.config.weights)
            .with_pairwise(&self.config.pairwise)
            .with_max_plays_fallback(pool_max)
    }
}
