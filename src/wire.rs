//! # Request/Response Schema
//!
//! JSON shapes for driving the engine from outside the process, and their
//! conversion into a [`SessionContext`] plus candidate sources.
//!
//! Field names are snake_case; the camelCase spellings used by most web
//! clients are accepted as aliases. Every field is optional and a `null`
//! anywhere a list is expected counts as an empty list. Raw tracks go through
//! [`Track::from_json`], so any supported source shape is accepted.
//!
//! ```json
//! {
//!   "current_track": { "id": 1, "title": "Song A", "artist": "X" },
//!   "sources": [[{ "id": 2, "title": "Song B", "artists": ["X"] }], null],
//!   "played_ids": [7, "abc"],
//!   "session_seed": "listener-1",
//!   "limit": 20
//! }
//! ```

use crate::features::identity_key;
use crate::rng::SessionSeed;
use crate::session::{HistoryEntry, SessionContext};
use crate::track::{raw_number, Track, TrackId};
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One autoplay decision request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RadioRequest {
    #[serde(alias = "currentTrack", alias = "current")]
    pub current_track: Option<Value>,
    /// Raw candidate lists, in priority order
    #[serde(deserialize_with = "null_as_default")]
    pub sources: Vec<Option<Vec<Value>>>,
    #[serde(deserialize_with = "null_as_default")]
    pub queue: Vec<Value>,
    #[serde(alias = "playedIds", deserialize_with = "null_as_default")]
    pub played_ids: Vec<Value>,
    #[serde(alias = "playedTitleKeys", deserialize_with = "null_as_default")]
    pub played_title_keys: Vec<String>,
    /// Raw tracks already played; contributes ids and titles
    #[serde(deserialize_with = "null_as_default")]
    pub played: Vec<Value>,
    #[serde(alias = "recentArtists", deserialize_with = "null_as_default")]
    pub recent_artists: Vec<String>,
    #[serde(alias = "favoriteIds", deserialize_with = "null_as_default")]
    pub favorite_ids: Vec<Value>,
    #[serde(alias = "favoriteKeys", deserialize_with = "null_as_default")]
    pub favorite_keys: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub favorites: Vec<Value>,
    /// Most recent first
    #[serde(deserialize_with = "null_as_default")]
    pub history: Vec<Value>,
    #[serde(alias = "trendingIds", deserialize_with = "null_as_default")]
    pub trending_ids: Vec<Value>,
    /// Trending pool; also used as a candidate source
    #[serde(deserialize_with = "null_as_default")]
    pub trending: Vec<Value>,
    #[serde(alias = "maxPlays")]
    pub max_plays: Option<f64>,
    #[serde(alias = "sessionSeed", alias = "seed")]
    pub session_seed: Option<SessionSeed>,
    #[serde(alias = "relatednessFloor")]
    pub relatedness_floor: Option<f64>,
    #[serde(alias = "minRelated")]
    pub min_related: Option<i64>,
    #[serde(alias = "sessionJitter", alias = "jitter")]
    pub session_jitter: Option<f64>,
    #[serde(alias = "minSameGenre")]
    pub min_same_genre: Option<i64>,
    pub limit: Option<i64>,
    pub lambda: Option<f64>,
}

fn ids(values: &[Value]) -> impl Iterator<Item = TrackId> + '_ {
    values.iter().filter_map(TrackId::from_json)
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn non_negative(n: i64) -> usize {
    n.max(0) as usize
}

/// A history record: either `{ "track": {...}, "skipped": .. }` or a raw
/// track carrying `skipped`/`listen_ratio`/`listen_seconds` next to its own
/// fields.
#[must_use]
pub fn history_entry_from_json(value: &Value) -> Option<HistoryEntry> {
    let record = value.as_object()?;
    let track = match record.get("track") {
        Some(nested @ Value::Object(_)) => Track::from_json(nested)?,
        _ => Track::from_json(value)?,
    };

    let field = |names: &[&str]| names.iter().find_map(|name| record.get(*name));
    Some(HistoryEntry {
        track,
        skipped: field(&["skipped"]).and_then(Value::as_bool).unwrap_or(false),
        listen_ratio: field(&["listen_ratio", "listenRatio"]).and_then(raw_number),
        listen_seconds: field(&["listen_seconds", "listenSeconds"]).and_then(raw_number),
    })
}

impl RadioRequest {
    /// Parse a request from any JSON reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a JSON object of the expected shape.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).context("Failed to parse radio request")
    }

    /// Read a request from a file, or from stdin when `path` is `-`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or does not parse.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.as_os_str() == "-" {
            return Self::from_reader(io::stdin().lock());
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open request file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid request file {}", path.display()))
    }

    #[must_use]
    pub fn current(&self) -> Option<Track> {
        self.current_track.as_ref().and_then(Track::from_json)
    }

    /// Requested batch size; negative means nothing.
    #[must_use]
    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.map_or(default, non_negative)
    }

    /// Candidate sources, with the trending pool appended last.
    #[must_use]
    pub fn sources(&self) -> Vec<Vec<Track>> {
        self.sources
            .iter()
            .map(|source| source.as_deref().map(Track::from_json_list).unwrap_or_default())
            .chain(std::iter::once(Track::from_json_list(&self.trending)))
            .collect()
    }

    /// Build the session context this request describes.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn to_session(&self) -> SessionContext {
        let played = Track::from_json_list(&self.played);
        let favorites = Track::from_json_list(&self.favorites);
        let trending = Track::from_json_list(&self.trending);
        let history: Vec<HistoryEntry> = self
            .history
            .iter()
            .filter_map(|value| {
                let entry = history_entry_from_json(value);
                if entry.is_none() {
                    warn!("Dropping malformed history record: {value}");
                }
                entry
            })
            .collect();

        let mut context = SessionContext::new(self.current())
            .with_queue(Track::from_json_list(&self.queue))
            .with_played_ids(ids(&self.played_ids).chain(played.iter().filter_map(|t| t.id.clone())))
            .with_played_titles(self.played_title_keys.iter().map(String::as_str).chain(played.iter().map(|t| t.title.as_str())))
            .with_recent_artists(&self.recent_artists)
            .with_favorites(&favorites)
            .with_favorite_ids(ids(&self.favorite_ids))
            .with_trending_ids(ids(&self.trending_ids).chain(trending.iter().filter_map(|t| t.id.clone())))
            .with_history(history);

        context.favorite_keys.extend(self.favorite_keys.iter().cloned());
        context.max_plays = self.max_plays.filter(|n| n.is_finite() && *n > 0.0).map(|n| n as u64);
        context.seed = self.session_seed.clone().filter(|seed| !seed.is_empty());
        context.relatedness_floor = self.relatedness_floor;
        context.min_related = self.min_related.map(non_negative);
        context.jitter = self.session_jitter;
        context.min_same_genre = self.min_same_genre.map(non_negative);
        context
    }
}

/// Ordered answer to a [`RadioRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RadioResponse {
    /// Track ids in play order; tracks without one are named by identity key
    pub ids: Vec<String>,
    pub tracks: Vec<Track>,
}

impl From<Vec<Track>> for RadioResponse {
    fn from(tracks: Vec<Track>) -> Self {
        let ids = tracks
            .iter()
            .filter_map(|track| match &track.id {
                Some(id) => Some(id.to_string()),
                None => identity_key(track),
            })
            .collect();
        Self { ids, tracks }
    }
}
