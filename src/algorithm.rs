//! Track scoring for autoplay recommendations.
//!
//! Scores a candidate against the current track and the listener's session
//! from four bounded signals:
//!
//! ```text
//! score = 0.55·similarity + 0.20·affinity + 0.10·trending + 0.15·popularity
//!         − skip_penalty                        (clamped to [0, 1])
//! ```
//!
//! Every weight lives in [`WeightConfig`], passed in explicitly so tests and
//! experiments can override it per call.

use crate::features::{jaccard, TrackFeatures};
use crate::session::{HistoryIndex, SessionContext};
use crate::track::Track;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Scorer weights. Defaults reproduce the documented formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Top-level weights, summing to 1.0
    pub similarity: f64,
    pub affinity: f64,
    pub trending: f64,
    pub popularity: f64,

    /// Similarity terms
    pub same_artist: f64,
    pub same_album: f64,
    pub same_genre: f64,
    pub title_overlap: f64,
    pub duration_match: f64,
    /// Relative duration difference still counted as a match
    pub duration_tolerance: f64,

    /// Affinity terms
    pub favorite_boost: f64,
    pub history_boost: f64,

    pub trending_boost: f64,
    /// Maximum penalty for a recently skipped track
    pub skip_penalty: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            similarity: 0.55,
            affinity: 0.20,
            trending: 0.10,
            popularity: 0.15,
            same_artist: 1.0,
            same_album: 0.3,
            same_genre: 0.8,
            title_overlap: 0.1,
            duration_match: 0.05,
            duration_tolerance: 0.15,
            favorite_boost: 0.5,
            history_boost: 0.3,
            trending_boost: 0.2,
            skip_penalty: 0.7,
        }
    }
}

/// Weights for track-to-track redundancy, used by the reranker and as the
/// relatedness measure against the current track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseWeights {
    pub artist: f64,
    pub album: f64,
    pub genre: f64,
    pub title: f64,
}

impl Default for PairwiseWeights {
    fn default() -> Self {
        Self { artist: 0.55, album: 0.15, genre: 0.2, title: 0.1 }
    }
}

/// Every signal that went into one score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub similarity: f64,
    pub affinity: f64,
    pub trending: f64,
    pub popularity: f64,
    pub skip_penalty: f64,
    /// Pairwise similarity to the current track
    pub relatedness: f64,
    /// Final weighted score in [0, 1]
    pub score: f64,
}

#[inline]
fn unit(value: f64) -> f64 {
    match value.is_finite() {
        true => value.clamp(0.0, 1.0),
        false => 0.0,
    }
}

#[inline]
fn both_equal(a: &str, b: &str) -> bool {
    !a.is_empty() && a == b
}

/// Redundancy between two tracks in [0, 1].
///
/// ```
/// use encore::algorithm::{pairwise_similarity, PairwiseWeights};
/// use encore::features::TrackFeatures;
/// use encore::track::Track;
///
/// let a = Track::new(1, "Night Drive", &["X"]).with_album("Roads");
/// let b = Track::new(2, "Night Drive", &["X"]).with_album("Roads");
/// let weights = PairwiseWeights::default();
///
/// let same = pairwise_similarity(&TrackFeatures::extract(&a), &TrackFeatures::extract(&b), &weights);
/// assert!((same - 0.8).abs() < 1e-9);
/// ```
#[must_use]
pub fn pairwise_similarity(a: &TrackFeatures<'_>, b: &TrackFeatures<'_>, weights: &PairwiseWeights) -> f64 {
    let mut score = 0.0;
    if both_equal(&a.artist_key, &b.artist_key) {
        score += weights.artist;
    }
    if both_equal(&a.album_key, &b.album_key) {
        score += weights.album;
    }
    if both_equal(&a.genre_bucket, &b.genre_bucket) {
        score += weights.genre;
    }
    score += jaccard(&a.title_tokens, &b.title_tokens) * weights.title;
    unit(score)
}

/// Favorite and history signals for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AffinitySignals {
    pub is_favorite: bool,
    /// Recency of the matching history entry, 0 when not in history
    pub recency: f64,
    pub affinity: f64,
    pub skip_penalty: f64,
}

/// Scores candidates against one session.
///
/// Holds the current track's features and a history index so a whole pool can
/// be scored without recomputing them. Safe to share across threads.
#[derive(Debug)]
pub struct Scorer<'a> {
    context: &'a SessionContext,
    weights: WeightConfig,
    pairwise: PairwiseWeights,
    current: Option<TrackFeatures<'a>>,
    history: HistoryIndex<'a>,
    max_plays: u64,
}

impl<'a> Scorer<'a> {
    #[must_use]
    pub fn new(context: &'a SessionContext, weights: &WeightConfig) -> Self {
        Self {
            context,
            weights: *weights,
            pairwise: PairwiseWeights::default(),
            current: context.current.as_ref().map(TrackFeatures::extract),
            history: context.history_index(),
            max_plays: context.max_plays.unwrap_or(0),
        }
    }

    #[must_use]
    pub fn with_pairwise(mut self, pairwise: &PairwiseWeights) -> Self {
        self.pairwise = *pairwise;
        self
    }

    /// Popularity denominator for sessions that did not supply one.
    #[must_use]
    pub fn with_max_plays_fallback(mut self, max_plays: u64) -> Self {
        if self.context.max_plays.is_none() {
            self.max_plays = max_plays;
        }
        self
    }

    #[must_use]
    pub fn current(&self) -> Option<&TrackFeatures<'a>> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn pairwise(&self) -> &PairwiseWeights {
        &self.pairwise
    }

    /// Similarity sub-score against the current track. 0 without one.
    #[must_use]
    pub fn similarity(&self, candidate: &TrackFeatures<'_>) -> f64 {
        let Some(current) = &self.current else {
            return 0.0;
        };
        let w = &self.weights;

        let duration_match = match candidate.duration > 0.0 && current.duration > 0.0 {
            true => (candidate.duration - current.duration).abs() / current.duration <= w.duration_tolerance,
            false => false,
        };

        let mut score = jaccard(&candidate.title_tokens, &current.title_tokens) * w.title_overlap;
        if both_equal(&candidate.artist_key, &current.artist_key) {
            score += w.same_artist;
        }
        if both_equal(&candidate.album_key, &current.album_key) {
            score += w.same_album;
        }
        if both_equal(&candidate.genre_bucket, &current.genre_bucket) {
            score += w.same_genre;
        }
        if duration_match {
            score += w.duration_match;
        }
        unit(score)
    }

    /// Relatedness to the current track, on the pairwise scale.
    #[must_use]
    pub fn relatedness(&self, candidate: &TrackFeatures<'_>) -> f64 {
        self.current
            .as_ref()
            .map_or(0.0, |current| pairwise_similarity(candidate, current, &self.pairwise))
    }

    #[must_use]
    pub fn affinity(&self, candidate: &TrackFeatures<'_>) -> AffinitySignals {
        let w = &self.weights;
        let id = candidate.track.id.as_ref();
        let key = candidate.key.as_deref();
        let is_favorite = self.context.is_favorite(id, key);

        let (recency, listen_ratio, skipped) = match self.history.lookup(id, key) {
            Some((position, entry)) => (self.history.recency(position), entry.listen_ratio(), entry.skipped),
            None => (0.0, 1.0, false),
        };

        let favorite = if is_favorite { w.favorite_boost } else { 0.0 };
        let skip_penalty = match skipped {
            true => w.skip_penalty * (1.0 - listen_ratio).max(0.35) * (0.6 + 0.4 * recency),
            false => 0.0,
        };

        AffinitySignals {
            is_favorite,
            recency,
            affinity: unit(favorite + recency * w.history_boost * listen_ratio),
            skip_penalty,
        }
    }

    #[must_use]
    pub fn trending(&self, candidate: &TrackFeatures<'_>) -> f64 {
        match self.context.is_trending(candidate.track.id.as_ref()) {
            true => unit(self.weights.trending_boost),
            false => 0.0,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn popularity(&self, candidate: &TrackFeatures<'_>) -> f64 {
        match self.max_plays {
            0 => 0.0,
            max => unit(candidate.track.play_count() as f64 / max as f64),
        }
    }

    #[must_use]
    pub fn breakdown(&self, candidate: &TrackFeatures<'_>) -> ScoreBreakdown {
        let w = &self.weights;
        let similarity = self.similarity(candidate);
        let AffinitySignals { affinity, skip_penalty, .. } = self.affinity(candidate);
        let trending = self.trending(candidate);
        let popularity = self.popularity(candidate);

        let weighted = similarity * w.similarity
            + affinity * w.affinity
            + trending * w.trending
            + popularity * w.popularity;

        ScoreBreakdown {
            similarity,
            affinity,
            trending,
            popularity,
            skip_penalty,
            relatedness: self.relatedness(candidate),
            score: unit(weighted - skip_penalty),
        }
    }

    #[must_use]
    pub fn score(&self, track: &Track) -> f64 {
        self.breakdown(&TrackFeatures::extract(track)).score
    }

    /// Breakdowns for a whole pool, in input order.
    #[must_use]
    pub fn breakdown_all(&self, candidates: &[TrackFeatures<'_>]) -> Vec<ScoreBreakdown> {
        candidates.par_iter().map(|candidate| self.breakdown(candidate)).collect()
    }
}

/// Score one candidate with the default weights.
///
/// ```
/// use encore::algorithm::score_track;
/// use encore::session::SessionContext;
/// use encore::track::Track;
///
/// let ctx = SessionContext::new(Some(Track::new(1, "Song A", &["X"]).with_duration(200.0)));
/// let candidate = Track::new(2, "Song B", &["X"]).with_duration(205.0);
///
/// let score = score_track(&candidate, &ctx);
/// assert!(score >= 0.55 && score <= 1.0);
/// ```
#[must_use]
pub fn score_track(candidate: &Track, context: &SessionContext) -> f64 {
    score_track_with(candidate, context, &WeightConfig::default())
}

#[must_use]
pub fn score_track_with(candidate: &Track, context: &SessionContext, weights: &WeightConfig) -> f64 {
    Scorer::new(context, weights).score(candidate)
}

/// Score many tracks in parallel, keeping input order.
#[must_use]
pub fn batch_score_tracks<'t>(
    tracks: &'t [Track],
    context: &SessionContext,
    weights: &WeightConfig,
) -> Vec<(&'t Track, f64)> {
    let scorer = Scorer::new(context, weights);
    tracks.par_iter().map(|track| (track, scorer.score(track))).collect()
}

/// Score distribution summaries for tuning weights.
pub mod statistics {
    use serde::Serialize;

    /// Summary of a set of scores. All zero for an empty set.
    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    pub struct ScoreStatistics {
        pub mean: f64,
        pub variance: f64,
        pub std_deviation: f64,
        pub min: f64,
        pub max: f64,
        pub count: usize,
    }

    #[must_use]
    pub fn analyze_score_distribution(scores: &[f64]) -> ScoreStatistics {
        if scores.is_empty() {
            return ScoreStatistics::default();
        }

        #[allow(clippy::cast_precision_loss)]
        let count = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / count;
        let variance = scores.iter().map(|&score| (score - mean).powi(2)).sum::<f64>() / count;

        ScoreStatistics {
            mean,
            variance,
            std_deviation: variance.sqrt(),
            min: scores.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
            max: scores.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
            count: scores.len(),
        }
    }
}
