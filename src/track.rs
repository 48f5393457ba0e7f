//! # Track Records
//!
//! Canonical track record consumed by the engine, plus the adapter that maps
//! the heterogeneous raw shapes handed over by recommendation and trending
//! sources into it.
//!
//! Raw sources disagree on almost everything: an artist may be a string, a list
//! of strings, a list of `{name}` objects or a single `{name}` object; a genre
//! may be a string, a `{name}`/`{title}` object, or live inside the album. The
//! adapter resolves all of that exactly once, at ingestion, so nothing
//! downstream ever probes raw fields.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque track identifier as supplied by the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id given as a JSON string or number.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(id) if !id.is_empty() => Some(Self(id.clone())),
            Value::Number(n) => Some(Self(match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(u), _, _) => u.to_string(),
                (None, Some(i), _) => i.to_string(),
                #[allow(clippy::cast_possible_truncation)]
                (None, None, Some(f)) if is_integral(f) => (f as i64).to_string(),
                _ => n.to_string(),
            })),
            _ => None,
        }
    }
}

/// Whole-valued floats (`4.0`) name the same id as the integer.
#[allow(clippy::cast_precision_loss)]
fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

macro_rules! track_id_from_int {
    ($($int:ty),*) => {
        $(impl From<$int> for TrackId {
            fn from(id: $int) -> Self {
                Self(id.to_string())
            }
        })*
    };
}

track_id_from_int!(i32, i64, u32, u64, usize);

/// A playable track in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Source identifier, absent for some trending entries
    pub id: Option<TrackId>,
    pub title: String,
    /// Credited artists in billing order. Empty means "Unknown Artist".
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    /// Seconds; `0.0` when unknown
    pub duration: f64,
    pub plays: Option<u64>,
    /// Whether the source supplied cover art for this track or its album
    pub has_artwork: bool,
}

impl Track {
    /// Shorthand used heavily by tests and benchmarks.
    #[must_use]
    pub fn new(id: impl Into<TrackId>, title: &str, artists: &[&str]) -> Self {
        Self {
            id: Some(id.into()),
            title: title.to_string(),
            artists: artists.iter().map(|a| (*a).to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_album(mut self, album: &str) -> Self {
        self.album = Some(album.to_string());
        self
    }

    #[must_use]
    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_string());
        self
    }

    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    #[must_use]
    pub fn with_plays(mut self, plays: u64) -> Self {
        self.plays = Some(plays);
        self
    }

    #[must_use]
    pub fn with_artwork(mut self) -> Self {
        self.has_artwork = true;
        self
    }

    /// Play count with unknown treated as zero.
    #[must_use]
    pub fn play_count(&self) -> u64 {
        self.plays.unwrap_or(0)
    }

    #[must_use]
    pub fn has_known_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }

    /// Adapt a raw JSON record into a canonical track.
    ///
    /// Returns `None` when the value is not an object. Individual fields that
    /// have an unsupported shape are treated as absent.
    ///
    /// ```
    /// use encore::track::Track;
    ///
    /// let raw = serde_json::json!({
    ///     "id": 42,
    ///     "title": "Montagem Coral",
    ///     "artists": [{ "name": "DJ A" }, "MC B"],
    ///     "album": { "title": "Baile", "cover": "abc.jpg" },
    ///     "duration": "143",
    /// });
    /// let track = Track::from_json(&raw).unwrap();
    /// assert_eq!(track.id.unwrap().as_str(), "42");
    /// assert_eq!(track.artists, vec!["DJ A", "MC B"]);
    /// assert!(track.has_artwork);
    /// ```
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let Value::Object(record) = value else {
            return None;
        };

        let album = record.get("album").and_then(Value::as_object);

        Some(Self {
            id: record.get("id").and_then(TrackId::from_json),
            title: record
                .get("title")
                .or_else(|| record.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            artists: raw_artists(record),
            album: record.get("album").and_then(raw_album_title),
            genre: raw_genre(record, album),
            duration: record.get("duration").and_then(raw_number).unwrap_or(0.0),
            plays: ["plays", "playCount", "play_count", "popularity"]
                .iter()
                .find_map(|field| record.get(*field).and_then(raw_number))
                .map(|plays| plays as u64),
            has_artwork: has_cover(record) || album.is_some_and(has_cover),
        })
    }

    /// Adapt a list of raw records, dropping the ones that cannot be read.
    #[must_use]
    pub fn from_json_list(values: &[Value]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|value| {
                let track = Self::from_json(value);
                if track.is_none() {
                    warn!("Dropping malformed track record: {value}");
                }
                track
            })
            .collect()
    }
}

/// A finite, non-negative number from a JSON number or numeric string.
pub(crate) fn raw_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn named(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj
            .get("name")
            .or_else(|| obj.get("title"))
            .and_then(Value::as_str),
        _ => None,
    }
    .filter(|s| !s.trim().is_empty())
}

fn raw_artists(record: &Map<String, Value>) -> Vec<String> {
    if let Some(Value::Array(list)) = record.get("artists") {
        let artists: Vec<String> = list.iter().filter_map(named).map(str::to_string).collect();
        if !artists.is_empty() {
            return artists;
        }
    }
    record
        .get("artist")
        .and_then(named)
        .map(|artist| vec![artist.to_string()])
        .unwrap_or_default()
}

fn raw_album_title(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => obj
            .get("title")
            .or_else(|| obj.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        other => named(other).map(str::to_string),
    }
}

fn first_named(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_array)?.first().and_then(named)
}

fn raw_genre(record: &Map<String, Value>, album: Option<&Map<String, Value>>) -> Option<String> {
    record
        .get("genre")
        .and_then(named)
        .or_else(|| album.and_then(|a| a.get("genre")).and_then(named))
        .or_else(|| first_named(album.and_then(|a| a.get("genres"))))
        .or_else(|| first_named(record.get("genres")))
        .map(str::to_string)
}

fn has_cover(record: &Map<String, Value>) -> bool {
    ["cover", "artwork", "image"].iter().any(|field| match record.get(*field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_whole_float_ids_match_integer_ids() {
        assert_eq!(TrackId::from_json(&json!(4.0)), Some(TrackId::from(4)));
        assert_eq!(TrackId::from_json(&json!(-2.0)), Some(TrackId::from(-2i64)));
        assert_eq!(TrackId::from_json(&json!(4.5)), Some(TrackId::from("4.5")), "Fractions keep their digits");
        assert_eq!(TrackId::from_json(&json!("")), None);
    }

    #[test]
    fn test_artist_shapes_are_unified() {
        let list = Track::from_json(&json!({ "title": "a", "artists": ["X", "Y"] })).unwrap();
        let objects = Track::from_json(&json!({ "title": "a", "artists": [{ "name": "X" }, { "name": "Y" }] })).unwrap();
        let single = Track::from_json(&json!({ "title": "a", "artist": "X" })).unwrap();
        let nested = Track::from_json(&json!({ "title": "a", "artist": { "name": "X" } })).unwrap();

        assert_eq!(list.artists, vec!["X", "Y"]);
        assert_eq!(objects.artists, list.artists, "Object artists must match plain strings");
        assert_eq!(single.artists, vec!["X"]);
        assert_eq!(nested.artists, single.artists);
    }

    #[test]
    fn test_empty_artist_list_falls_back_to_artist_field() {
        let track = Track::from_json(&json!({ "title": "a", "artists": [], "artist": "Solo" })).unwrap();
        assert_eq!(track.artists, vec!["Solo"]);
    }

    #[test]
    fn test_genre_lookup_order() {
        let top = Track::from_json(&json!({ "genre": { "name": "Phonk" }, "album": { "genre": "Rock" } })).unwrap();
        assert_eq!(top.genre.as_deref(), Some("Phonk"));

        let album = Track::from_json(&json!({ "album": { "title": "x", "genres": [{ "name": "K-Pop" }] } })).unwrap();
        assert_eq!(album.genre.as_deref(), Some("K-Pop"));

        let list = Track::from_json(&json!({ "genres": ["Trap", "Drill"] })).unwrap();
        assert_eq!(list.genre.as_deref(), Some("Trap"));
    }

    #[test]
    fn test_numeric_fields_are_lenient() {
        let track = Track::from_json(&json!({
            "id": 7,
            "duration": "201.5",
            "playCount": 1200,
        }))
        .unwrap();

        assert_eq!(track.id, Some(TrackId::from("7")));
        assert!((track.duration - 201.5).abs() < f64::EPSILON);
        assert_eq!(track.plays, Some(1200));

        let bad = Track::from_json(&json!({ "duration": "soon", "plays": -3 })).unwrap();
        assert_eq!(bad.duration, 0.0);
        assert_eq!(bad.plays, None);
    }

    #[test]
    fn test_artwork_detection() {
        assert!(Track::from_json(&json!({ "cover": "c.jpg" })).unwrap().has_artwork);
        assert!(Track::from_json(&json!({ "album": { "cover": "c.jpg" } })).unwrap().has_artwork);
        assert!(!Track::from_json(&json!({ "cover": "" })).unwrap().has_artwork);
        assert!(!Track::from_json(&json!({ "cover": null })).unwrap().has_artwork);
    }

    #[test]
    fn test_non_objects_are_dropped() {
        let values = vec![json!(3), json!("track"), json!({ "id": "ok", "title": "fine" }), json!(null)];
        let tracks = Track::from_json_list(&values);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "fine");
    }
}
