//! # Session Context
//!
//! Everything the engine knows about the listener for one autoplay decision:
//! what is playing, what is queued, what was already heard, favorites,
//! history, trending ids and the tuning knobs for relatedness and jitter.
//!
//! The caller rebuilds a context before each decision. The engine only reads
//! it, so a context can be shared across threads but never needs to be.

use crate::features::{identity_key, normalize_text, title_key};
use crate::rng::{resolve_jitter_scale, SessionSeed};
use crate::track::{Track, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default minimum relatedness for non-affinity candidates.
pub const DEFAULT_RELATEDNESS_FLOOR: f64 = 0.12;
/// Upper bound for the default related-pool size.
pub const DEFAULT_MIN_RELATED: usize = 12;
/// Same-genre candidates needed before the pool is narrowed to them.
pub const DEFAULT_MIN_SAME_GENRE: usize = 8;

/// One play in the listening history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track: Track,
    /// The listener skipped away before the end
    #[serde(default)]
    pub skipped: bool,
    /// Fraction of the track heard, `[0, 1]`
    #[serde(default)]
    pub listen_ratio: Option<f64>,
    #[serde(default)]
    pub listen_seconds: Option<f64>,
}

impl HistoryEntry {
    #[must_use]
    pub fn played(track: Track) -> Self {
        Self { track, ..Self::default() }
    }

    #[must_use]
    pub fn skipped(track: Track, listen_ratio: f64) -> Self {
        Self {
            track,
            skipped: true,
            listen_ratio: Some(listen_ratio),
            listen_seconds: None,
        }
    }

    /// How much of the track was heard. Defaults to a full listen.
    #[must_use]
    pub fn listen_ratio(&self) -> f64 {
        if let Some(ratio) = self.listen_ratio.filter(|r| r.is_finite()) {
            return ratio.clamp(0.0, 1.0);
        }
        match self.listen_seconds {
            Some(seconds) if seconds.is_finite() && self.track.has_known_duration() => {
                (seconds / self.track.duration).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }
}

/// Listener state for a single autoplay decision.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub played_ids: HashSet<TrackId>,
    pub played_title_keys: HashSet<String>,
    /// Normalized artist keys, most recent first
    pub recent_artists: Vec<String>,
    pub favorite_ids: HashSet<TrackId>,
    pub favorite_keys: HashSet<String>,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
    pub trending_ids: HashSet<TrackId>,
    /// Largest play count observed, for popularity normalization
    pub max_plays: Option<u64>,
    pub seed: Option<SessionSeed>,
    pub relatedness_floor: Option<f64>,
    pub min_related: Option<usize>,
    pub jitter: Option<f64>,
    pub min_same_genre: Option<usize>,
}

impl SessionContext {
    /// Artist cooldown length kept by [`SessionContext::record_played`].
    pub const RECENT_ARTIST_LIMIT: usize = 10;

    #[must_use]
    pub fn new(current: Option<Track>) -> Self {
        Self { current, ..Self::default() }
    }

    #[must_use]
    pub fn with_queue(mut self, queue: Vec<Track>) -> Self {
        self.queue = queue;
        self
    }

    #[must_use]
    pub fn with_played_ids<I: IntoIterator<Item = TrackId>>(mut self, ids: I) -> Self {
        self.played_ids.extend(ids);
        self
    }

    /// Titles are normalized, so raw titles and ready-made keys both work.
    #[must_use]
    pub fn with_played_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.played_title_keys.extend(
            titles
                .into_iter()
                .map(|title| title_key(title.as_ref()))
                .filter(|key| !key.is_empty()),
        );
        self
    }

    /// Artist names or keys, most recent first. Normalized and deduplicated;
    /// the caller's list is kept whole.
    #[must_use]
    pub fn with_recent_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for artist in artists {
            let key = normalize_text(artist.as_ref());
            if !key.is_empty() && !self.recent_artists.contains(&key) {
                self.recent_artists.push(key);
            }
        }
        self
    }

    /// Favorite tracks contribute both their id and identity key.
    #[must_use]
    pub fn with_favorites<'t, I: IntoIterator<Item = &'t Track>>(mut self, favorites: I) -> Self {
        for track in favorites {
            if let Some(id) = &track.id {
                self.favorite_ids.insert(id.clone());
            }
            if let Some(key) = identity_key(track) {
                self.favorite_keys.insert(key);
            }
        }
        self
    }

    #[must_use]
    pub fn with_favorite_ids<I: IntoIterator<Item = TrackId>>(mut self, ids: I) -> Self {
        self.favorite_ids.extend(ids);
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_trending_ids<I: IntoIterator<Item = TrackId>>(mut self, ids: I) -> Self {
        self.trending_ids.extend(ids);
        self
    }

    #[must_use]
    pub fn with_max_plays(mut self, max_plays: u64) -> Self {
        self.max_plays = Some(max_plays);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<SessionSeed>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    #[must_use]
    pub fn with_relatedness_floor(mut self, floor: f64) -> Self {
        self.relatedness_floor = Some(floor);
        self
    }

    #[must_use]
    pub fn with_min_related(mut self, min_related: usize) -> Self {
        self.min_related = Some(min_related);
        self
    }

    #[must_use]
    pub fn with_min_same_genre(mut self, min_same_genre: usize) -> Self {
        self.min_same_genre = Some(min_same_genre);
        self
    }

    /// Move the session forward: `track` finished (or was skipped) and is
    /// now part of the played sets, the history and the artist cooldown.
    pub fn record_played(&mut self, entry: HistoryEntry) {
        let track = &entry.track;
        if let Some(id) = &track.id {
            self.played_ids.insert(id.clone());
        }
        let title = title_key(&track.title);
        if !title.is_empty() {
            self.played_title_keys.insert(title);
        }
        let artist = crate::features::artist_key(track);
        self.recent_artists.retain(|recent| recent != &artist);
        self.recent_artists.insert(0, artist);
        self.recent_artists.truncate(Self::RECENT_ARTIST_LIMIT);
        self.history.insert(0, entry);
    }

    #[must_use]
    pub fn relatedness_floor(&self) -> f64 {
        match self.relatedness_floor {
            Some(floor) if floor.is_finite() => floor.clamp(0.0, 1.0),
            _ => DEFAULT_RELATEDNESS_FLOOR,
        }
    }

    #[must_use]
    pub fn min_related(&self, limit: usize) -> usize {
        self.min_related.unwrap_or_else(|| DEFAULT_MIN_RELATED.min(limit))
    }

    #[must_use]
    pub fn min_same_genre(&self) -> usize {
        self.min_same_genre.unwrap_or(DEFAULT_MIN_SAME_GENRE)
    }

    #[must_use]
    pub fn jitter_scale(&self) -> f64 {
        resolve_jitter_scale(self.jitter)
    }

    #[must_use]
    pub fn is_favorite(&self, id: Option<&TrackId>, key: Option<&str>) -> bool {
        id.is_some_and(|id| self.favorite_ids.contains(id))
            || key.is_some_and(|key| self.favorite_keys.contains(key))
    }

    #[must_use]
    pub fn is_trending(&self, id: Option<&TrackId>) -> bool {
        id.is_some_and(|id| self.trending_ids.contains(id))
    }

    #[must_use]
    pub fn history_index(&self) -> HistoryIndex<'_> {
        HistoryIndex::new(&self.history)
    }
}

/// Position lookup into the history, by id first and identity key second.
#[derive(Debug, Default)]
pub struct HistoryIndex<'a> {
    entries: &'a [HistoryEntry],
    by_id: HashMap<&'a TrackId, usize>,
    by_key: HashMap<String, usize>,
}

impl<'a> HistoryIndex<'a> {
    #[must_use]
    pub fn new(entries: &'a [HistoryEntry]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_key = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            if let Some(id) = &entry.track.id {
                by_id.entry(id).or_insert(position);
            }
            if let Some(key) = identity_key(&entry.track) {
                by_key.entry(key).or_insert(position);
            }
        }
        Self { entries, by_id, by_key }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent matching entry and its position (0 = most recent).
    #[must_use]
    pub fn lookup(&self, id: Option<&TrackId>, key: Option<&str>) -> Option<(usize, &'a HistoryEntry)> {
        let position = id
            .and_then(|id| self.by_id.get(id))
            .or_else(|| key.and_then(|key| self.by_key.get(key)))
            .copied()?;
        Some((position, &self.entries[position]))
    }

    /// `1.0` for the most recent entry down to `0.0` for the oldest.
    #[must_use]
    pub fn recency(&self, position: usize) -> f64 {
        let denominator = self.entries.len().saturating_sub(1).max(1);
        #[allow(clippy::cast_precision_loss)]
        let weight = 1.0 - position as f64 / denominator as f64;
        weight.clamp(0.0, 1.0)
    }
}
