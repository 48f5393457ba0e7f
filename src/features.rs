//! # Track Feature Normalizer
//!
//! Turns a [`Track`] into the canonical comparison record used by every other
//! stage: normalized title tokens, artist/album keys, a coarse genre bucket and
//! the identity key used for deduplication.
//!
//! All functions here are pure; features are derived fresh per engine call and
//! never stored.

use crate::track::Track;
use std::collections::HashSet;

/// Artist label used when a track credits nobody.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Canonical bucket for the funk/phonk family.
pub const PHONK_FUNK: &str = "phonk_funk";
pub const KPOP: &str = "kpop";
pub const REGGAETON: &str = "reggaeton";

/// Inference table, checked top to bottom. First hit wins.
const GENRE_SYNONYMS: &[(&[&str], &str)] = &[
    (&["phonk"], PHONK_FUNK),
    (&["funk", "montagem", "baile", "mandelao"], PHONK_FUNK),
    (&["k pop", "kpop", "bts"], KPOP),
    (&["reggaeton", "regueton"], REGGAETON),
    (&["trap"], "trap"),
    (&["drill"], "drill"),
];

/// Residual synonyms collapsed onto their bucket after a label is obtained.
const GENRE_COLLAPSE: &[(&[&str], &str)] = &[
    (&["phonk", "funk"], PHONK_FUNK),
    (&["k pop", "kpop"], KPOP),
    (&["reggaeton", "regueton"], REGGAETON),
];

/// Comparison record derived from a track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeatures<'a> {
    pub track: &'a Track,
    /// Deduplication key, `None` when the track cannot be identified at all
    pub key: Option<String>,
    pub title_key: String,
    pub title_tokens: HashSet<String>,
    pub artist_key: String,
    pub album_key: String,
    /// Empty when the genre is unknown
    pub genre_bucket: String,
    pub duration: f64,
}

impl<'a> TrackFeatures<'a> {
    #[must_use]
    pub fn extract(track: &'a Track) -> Self {
        let title_key = title_key(&track.title);
        let artist_key = artist_key(track);
        Self {
            track,
            key: identity_key_parts(&title_key, &artist_key, track),
            title_tokens: tokenize(&track.title).into_iter().collect(),
            title_key,
            artist_key,
            album_key: album_key(track),
            genre_bucket: genre_bucket(track),
            duration: if track.has_known_duration() { track.duration } else { 0.0 },
        }
    }

    #[must_use]
    pub fn has_genre(&self) -> bool {
        !self.genre_bucket.is_empty()
    }
}

/// Lowercase, drop `(...)`/`[...]` segments and punctuation, collapse spaces.
///
/// ```
/// use encore::features::normalize_text;
///
/// assert_eq!(normalize_text("  Crème Brûlée (Live) [2019 Remaster]!! "), "crème brûlée");
/// assert_eq!(normalize_text("K-Pop"), "k pop");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_parens = strip_enclosed(&lowered, '(', ')');
    let without_brackets = strip_enclosed(&without_parens, '[', ']');

    without_brackets
        .chars()
        .map(|c| if is_kept_char(c) { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[inline]
fn is_kept_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '\u{c0}'..='\u{ff}') || c.is_whitespace()
}

/// Replace every `open ... close` segment with a space, shortest match first.
/// An opener without a matching closer is left for the punctuation pass.
fn strip_enclosed(text: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len_utf8()..];
        match after_open.find(close) {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                rest = &after_open[end + close.len_utf8()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets, `0.0` if either is empty.
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    match union {
        0 => 0.0,
        #[allow(clippy::cast_precision_loss)]
        u => intersection as f64 / u as f64,
    }
}

#[must_use]
pub fn title_key(title: &str) -> String {
    normalize_text(title)
}

/// Display artist credit: all artists joined with ", ".
#[must_use]
pub fn artist_display(track: &Track) -> String {
    match track.artists.is_empty() {
        true => UNKNOWN_ARTIST.to_string(),
        false => track.artists.join(", "),
    }
}

#[must_use]
pub fn artist_key(track: &Track) -> String {
    normalize_text(&artist_display(track))
}

#[must_use]
pub fn album_key(track: &Track) -> String {
    track.album.as_deref().map(normalize_text).unwrap_or_default()
}

/// Deduplication key: `t:<title>|a:<artist>`, else `id:<id>`.
#[must_use]
pub fn identity_key(track: &Track) -> Option<String> {
    identity_key_parts(&title_key(&track.title), &artist_key(track), track)
}

fn identity_key_parts(title: &str, artist: &str, track: &Track) -> Option<String> {
    if !title.is_empty() || !artist.is_empty() {
        return Some(format!("t:{title}|a:{artist}"));
    }
    track.id.as_ref().map(|id| format!("id:{id}"))
}

/// Text scanned when no explicit genre label is available.
fn genre_text(track: &Track) -> String {
    let artist = match track.artists.is_empty() {
        true => String::new(),
        false => track.artists.join(", "),
    };
    let combined = [track.title.as_str(), artist.as_str(), track.album.as_deref().unwrap_or("")]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    normalize_text(&combined)
}

fn infer_genre_bucket(track: &Track) -> Option<&'static str> {
    let text = genre_text(track);
    if text.is_empty() {
        return None;
    }
    GENRE_SYNONYMS
        .iter()
        .find(|(terms, _)| terms.iter().any(|term| text.contains(term)))
        .map(|(_, bucket)| *bucket)
}

/// Canonical genre bucket: explicit label if present, otherwise inferred from
/// title, artist and album. Empty when unknown.
///
/// ```
/// use encore::features::genre_bucket;
/// use encore::track::Track;
///
/// let explicit = Track::new(1, "Song", &["X"]).with_genre("Brazilian Funk");
/// assert_eq!(genre_bucket(&explicit), "phonk_funk");
///
/// let inferred = Track::new(2, "MONTAGEM TOMADA", &["DJ Y"]);
/// assert_eq!(genre_bucket(&inferred), "phonk_funk");
///
/// let unknown = Track::new(3, "Quiet Song", &["Z"]);
/// assert_eq!(genre_bucket(&unknown), "");
/// ```
#[must_use]
pub fn genre_bucket(track: &Track) -> String {
    let explicit = track.genre.as_deref().map(normalize_text).unwrap_or_default();
    let base = match explicit.is_empty() {
        false => explicit,
        true => match infer_genre_bucket(track) {
            Some(bucket) => bucket.to_string(),
            None => return String::new(),
        },
    };

    GENRE_COLLAPSE
        .iter()
        .find(|(terms, _)| terms.iter().any(|term| base.contains(term)))
        .map_or(base, |(_, bucket)| (*bucket).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn test_normalize_text_strips_decorations() {
        assert_eq!(normalize_text("Song A (feat. B) [Official Video]"), "song a");
        assert_eq!(normalize_text("Hello,   World!"), "hello world");
        assert_eq!(normalize_text("   "), "");
        assert_eq!(normalize_text("Ação"), "ação");
    }

    #[test]
    fn test_normalize_text_unclosed_paren() {
        // No closer: the opener is just punctuation.
        assert_eq!(normalize_text("Intro (unfinished"), "intro unfinished");
    }

    #[test]
    fn test_normalize_text_is_idempotent() {
        for input in ["MC Ryan SP, DJ Jeeh", "Stay (Remix) [Live]", "k-pop  legends", "ÉTÉ"] {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once, "Normalizing twice must not change '{input}'");
        }
    }

    #[test]
    fn test_tokenize_drops_empties() {
        assert_eq!(tokenize(" Night - Drive "), vec!["night", "drive"]);
        assert!(tokenize("(only parens)").is_empty());
    }

    #[test]
    fn test_jaccard_bounds() {
        assert_eq!(jaccard(&set(&["a"]), &HashSet::new()), 0.0);
        assert_eq!(jaccard(&set(&["a", "b"]), &set(&["a", "b"])), 1.0);
        let half = jaccard(&set(&["a", "b"]), &set(&["b", "c"]));
        assert!((half - 1.0 / 3.0).abs() < 1e-12, "One shared token out of three");
    }

    #[test]
    fn test_artist_key_fallback() {
        let anonymous = Track { title: "x".into(), ..Track::default() };
        assert_eq!(artist_key(&anonymous), "unknown artist");

        let duo = Track::new(1, "x", &["Ana", "Bê!"]);
        assert_eq!(artist_key(&duo), "ana bê");
    }

    #[test]
    fn test_identity_key_prefers_title_and_artist() {
        let track = Track::new(9, "Song A (Live)", &["X"]);
        assert_eq!(identity_key(&track).as_deref(), Some("t:song a|a:x"));
    }

    #[test]
    fn test_identity_key_falls_back_to_id() {
        let track = Track { id: Some("abc".into()), title: "!!!".into(), artists: vec!["???".into()], ..Track::default() };
        assert_eq!(identity_key(&track).as_deref(), Some("id:abc"));

        let nothing = Track { title: "!!!".into(), artists: vec!["???".into()], ..Track::default() };
        assert_eq!(identity_key(&nothing), None, "Unidentifiable tracks have no key");
    }

    #[test]
    fn test_genre_bucket_priority() {
        // phonk family is checked before trap
        let track = Track::new(1, "Trap Phonk", &["Z"]);
        assert_eq!(genre_bucket(&track), PHONK_FUNK);

        let kpop = Track::new(2, "Dynamite", &["BTS"]);
        assert_eq!(genre_bucket(&kpop), KPOP);

        let drill = Track::new(3, "Drill Anthem", &["Q"]);
        assert_eq!(genre_bucket(&drill), "drill");
    }

    #[test]
    fn test_explicit_genre_collapses_synonyms() {
        assert_eq!(genre_bucket(&Track::new(1, "x", &["y"]).with_genre("K-Pop")), KPOP);
        assert_eq!(genre_bucket(&Track::new(1, "x", &["y"]).with_genre("Regueton")), REGGAETON);
        assert_eq!(genre_bucket(&Track::new(1, "x", &["y"]).with_genre("Hip-Hop")), "hip hop");
    }

    #[test]
    fn test_unknown_artist_is_not_genre_evidence() {
        // "Unknown Artist" must never leak into inference text.
        let track = Track { title: "Plain".into(), ..Track::default() };
        assert_eq!(genre_bucket(&track), "");
    }

    #[test]
    fn test_features_zero_unknown_duration() {
        let track = Track::new(1, "x", &["y"]).with_duration(f64::NAN);
        assert_eq!(TrackFeatures::extract(&track).duration, 0.0);
    }
}
