//! # Candidate Pool Builder
//!
//! Merges raw candidate lists (recommendations, trending, ...) into one
//! deduplicated pool and throws out anything the listener should not hear
//! next: the current track, queued or already-played tracks, repeated titles,
//! artists still in cooldown and, when the current genre is known, tracks from
//! a different genre by a different artist.
//!
//! Deduplication is by identity key. When the same recording arrives twice the
//! more complete record wins (more plays, then a known duration, then artwork),
//! keeping its original position in the pool.

use crate::features::{normalize_text, TrackFeatures};
use crate::session::SessionContext;
use crate::track::{Track, TrackId};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

/// Pool size used when the caller does not pick one.
pub const DEFAULT_POOL_CAPACITY: usize = 300;

/// Why a new candidate was kept out of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    CurrentTrack,
    Queued,
    AlreadyPlayed,
    RepeatedTitle,
    ArtistCooldown,
    GenreMismatch,
}

/// Exclusion inputs, borrowed from the session.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter<'a> {
    pub current: Option<&'a Track>,
    pub queue: &'a [Track],
    pub played_ids: &'a HashSet<TrackId>,
    pub played_title_keys: &'a HashSet<String>,
    pub recent_artists: &'a [String],
}

impl<'a> From<&'a SessionContext> for CandidateFilter<'a> {
    fn from(context: &'a SessionContext) -> Self {
        Self {
            current: context.current.as_ref(),
            queue: &context.queue,
            played_ids: &context.played_ids,
            played_title_keys: &context.played_title_keys,
            recent_artists: &context.recent_artists,
        }
    }
}

/// Lookup sets prepared once per build.
struct PreparedFilter<'a> {
    current: Option<TrackFeatures<'a>>,
    queued_ids: HashSet<&'a TrackId>,
    queued_title_keys: HashSet<String>,
    played_ids: &'a HashSet<TrackId>,
    played_title_keys: &'a HashSet<String>,
    recent_artists: HashSet<String>,
}

impl<'a> PreparedFilter<'a> {
    fn new(filter: &CandidateFilter<'a>) -> Self {
        Self {
            current: filter.current.map(TrackFeatures::extract),
            queued_ids: filter.queue.iter().filter_map(|t| t.id.as_ref()).collect(),
            queued_title_keys: filter
                .queue
                .iter()
                .map(|t| normalize_text(&t.title))
                .filter(|key| !key.is_empty())
                .collect(),
            played_ids: filter.played_ids,
            played_title_keys: filter.played_title_keys,
            recent_artists: filter
                .recent_artists
                .iter()
                .map(|artist| normalize_text(artist))
                .filter(|key| !key.is_empty())
                .collect(),
        }
    }

    fn exclusion(&self, candidate: &TrackFeatures<'_>) -> Option<Exclusion> {
        let id = candidate.track.id.as_ref();

        if let Some(current) = &self.current {
            let same_id = id.is_some() && id == current.track.id.as_ref();
            if same_id || candidate.key == current.key {
                return Some(Exclusion::CurrentTrack);
            }
        }

        if let Some(id) = id {
            if self.queued_ids.contains(id) {
                return Some(Exclusion::Queued);
            }
            if self.played_ids.contains(id) {
                return Some(Exclusion::AlreadyPlayed);
            }
        }

        let title = &candidate.title_key;
        if !title.is_empty() {
            let matches_current = self.current.as_ref().is_some_and(|c| &c.title_key == title);
            if matches_current
                || self.queued_title_keys.contains(title)
                || self.played_title_keys.contains(title)
            {
                return Some(Exclusion::RepeatedTitle);
            }
        }

        if !candidate.artist_key.is_empty() && self.recent_artists.contains(&candidate.artist_key) {
            return Some(Exclusion::ArtistCooldown);
        }

        match &self.current {
            Some(current) if current.has_genre() => {
                let same_genre = candidate.genre_bucket == current.genre_bucket;
                let same_artist = candidate.artist_key == current.artist_key;
                (!same_genre && !same_artist).then_some(Exclusion::GenreMismatch)
            }
            _ => None,
        }
    }
}

/// Should `incoming` replace `existing` under the same identity key?
#[must_use]
pub fn is_more_complete(incoming: &Track, existing: &Track) -> bool {
    match incoming.play_count().cmp(&existing.play_count()) {
        std::cmp::Ordering::Greater => return true,
        std::cmp::Ordering::Less => return false,
        std::cmp::Ordering::Equal => {}
    }
    match (incoming.has_known_duration(), existing.has_known_duration()) {
        (true, false) => return true,
        (false, true) => return false,
        _ => {}
    }
    incoming.has_artwork && !existing.has_artwork
}

/// Build the deduplicated, filtered candidate pool.
///
/// Sources are read in order; each contributes nothing when empty. The result
/// keeps first-accepted order and never holds more than `capacity` tracks.
///
/// ```
/// use encore::candidates::{build_candidates, CandidateFilter};
/// use encore::session::SessionContext;
/// use encore::track::Track;
///
/// let ctx = SessionContext::new(Some(Track::new(1, "Song A", &["X"])));
/// let sources = vec![
///     vec![Track::new(1, "Song A", &["X"]), Track::new(2, "Song B", &["X"])],
///     vec![Track::new(3, "Song B", &["X"]).with_plays(10)],
/// ];
///
/// let pool = build_candidates(&sources, &CandidateFilter::from(&ctx), 300);
/// assert_eq!(pool.len(), 1);
/// assert_eq!(pool[0].plays, Some(10), "The more complete duplicate wins");
/// ```
#[must_use]
pub fn build_candidates<S: AsRef<[Track]>>(
    sources: &[S],
    filter: &CandidateFilter<'_>,
    capacity: usize,
) -> Vec<Track> {
    let prepared = PreparedFilter::new(filter);
    let mut pool: Vec<Track> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut excluded: HashMap<Exclusion, usize> = HashMap::new();
    let mut replaced = 0usize;
    let mut unidentified = 0usize;

    for track in sources.iter().flat_map(|source| source.as_ref().iter()) {
        let features = TrackFeatures::extract(track);
        let Some(key) = features.key.clone() else {
            unidentified += 1;
            continue;
        };

        if let Some(&position) = positions.get(&key) {
            if is_more_complete(track, &pool[position]) {
                trace!("Replacing pool entry {key} with a more complete record");
                pool[position] = track.clone();
                replaced += 1;
            }
            continue;
        }

        if let Some(reason) = prepared.exclusion(&features) {
            *excluded.entry(reason).or_insert(0) += 1;
            continue;
        }

        if pool.len() < capacity {
            positions.insert(key, pool.len());
            pool.push(track.clone());
        }
    }

    debug!(
        "Candidate pool: {} accepted, {} replaced, {} unidentified, excluded {:?}",
        pool.len(),
        replaced,
        unidentified,
        excluded
    );

    pool
}

/// [`build_candidates`] with exclusions taken straight from the session.
#[must_use]
pub fn build_candidates_for<S: AsRef<[Track]>>(
    sources: &[S],
    context: &SessionContext,
    capacity: usize,
) -> Vec<Track> {
    build_candidates(sources, &CandidateFilter::from(context), capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::identity_key;

    fn current() -> Track {
        Track::new(1, "Song A", &["X"]).with_duration(200.0)
    }

    fn build(sources: &[Vec<Track>], ctx: &SessionContext) -> Vec<Track> {
        build_candidates_for(sources, ctx, DEFAULT_POOL_CAPACITY)
    }

    #[test]
    fn test_empty_sources_yield_empty_pool() {
        let ctx = SessionContext::new(Some(current()));
        let none: Vec<Vec<Track>> = Vec::new();
        assert!(build(&none, &ctx).is_empty());
        assert!(build(&[vec![], vec![]], &ctx).is_empty());
    }

    #[test]
    fn test_current_track_is_excluded_by_id_and_key() {
        let ctx = SessionContext::new(Some(current()));
        let sources = vec![vec![
            current(),
            Track::new(77, "Song A", &["X"]),
            Track::new(2, "Song B", &["X"]),
        ]];

        let pool = build(&sources, &ctx);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].title, "Song B");
    }

    #[test]
    fn test_queue_and_played_exclusions() {
        let ctx = SessionContext::new(Some(current()))
            .with_queue(vec![Track::new(2, "Queued", &["X"])])
            .with_played_ids([TrackId::from(3)])
            .with_played_titles(["Heard Before"]);

        let sources = vec![vec![
            Track::new(2, "Queued Again Under Same Id", &["X"]),
            Track::new(20, "Queued (Live)", &["X"]),
            Track::new(3, "Other", &["X"]),
            Track::new(4, "Heard Before", &["X"]),
            Track::new(5, "Fresh", &["X"]),
        ]];

        let titles: Vec<_> = build(&sources, &ctx).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Fresh"]);
    }

    #[test]
    fn test_recent_artist_cooldown() {
        let ctx = SessionContext::new(None).with_recent_artists(["Y"]);
        let sources = vec![vec![Track::new(2, "One", &["Y"]), Track::new(3, "Two", &["Z"])]];

        let pool = build(&sources, &ctx);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].artists, vec!["Z"]);
    }

    #[test]
    fn test_genre_filter_requires_genre_or_artist() {
        let ctx = SessionContext::new(Some(Track::new(1, "Montagem Rave", &["DJ P"])));
        let sources = vec![vec![
            Track::new(2, "Seoul Nights", &["Someone"]).with_genre("K-Pop"),
            Track::new(3, "Untagged", &["Someone Else"]),
            Track::new(4, "Other Tune", &["DJ P"]).with_genre("K-Pop"),
            Track::new(5, "Funk Do Bailão", &["MC Q"]),
        ]];

        let ids: Vec<_> = build(&sources, &ctx)
            .into_iter()
            .map(|t| t.id.unwrap().0)
            .collect();
        assert_eq!(ids, vec!["4", "5"], "Same artist or same bucket only");
    }

    #[test]
    fn test_no_genre_filter_without_current_genre() {
        let ctx = SessionContext::new(Some(current()));
        let sources = vec![vec![Track::new(2, "Seoul Nights", &["Someone"]).with_genre("K-Pop")]];
        assert_eq!(build(&sources, &ctx).len(), 1);
    }

    #[test]
    fn test_replacement_tie_break_order() {
        let base = Track::new(2, "Song B", &["X"]);
        assert!(is_more_complete(&base.clone().with_plays(5), &base));
        assert!(!is_more_complete(&base, &base.clone().with_plays(5)));
        assert!(is_more_complete(&base.clone().with_duration(180.0), &base));
        assert!(is_more_complete(&base.clone().with_artwork(), &base));
        assert!(!is_more_complete(&base, &base), "Ties keep the existing record");
        assert!(
            !is_more_complete(&base.clone().with_artwork(), &base.clone().with_duration(180.0)),
            "Duration outranks artwork"
        );
    }

    #[test]
    fn test_replacement_keeps_first_position() {
        let ctx = SessionContext::new(None);
        let sources = vec![
            vec![Track::new(2, "B", &["X"]), Track::new(3, "C", &["X"])],
            vec![Track::new(9, "B", &["X"]).with_plays(100)],
        ];

        let pool = build(&sources, &ctx);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].id, Some(TrackId::from(9)));
        assert_eq!(pool[1].title, "C");
    }

    #[test]
    fn test_replacement_ignores_exclusions() {
        let ctx = SessionContext::new(None)
            .with_played_ids([TrackId::from(9)])
            .with_queue(vec![Track::new(10, "Queued", &["X"])]);
        let sources = vec![
            vec![Track::new(2, "B", &["X"])],
            vec![Track::new(9, "B", &["X"]).with_plays(100)],
            vec![Track::new(10, "B", &["X"]).with_plays(500)],
        ];

        let pool = build(&sources, &ctx);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, Some(TrackId::from(10)), "Replacement is not filtered by played or queued ids");
        assert_eq!(pool[0].plays, Some(500));
    }

    #[test]
    fn test_replacement_after_capacity_is_reached() {
        let ctx = SessionContext::new(None);
        let sources = vec![
            vec![Track::new(2, "B", &["X"]), Track::new(3, "C", &["X"])],
            vec![Track::new(9, "B", &["X"]).with_plays(40)],
        ];

        let pool = build_candidates_for(&sources, &ctx, 1);
        assert_eq!(pool.len(), 1, "Capacity still holds");
        assert_eq!(pool[0].id, Some(TrackId::from(9)), "A full pool still accepts better duplicates");
    }

    #[test]
    fn test_long_cooldown_list_is_honored() {
        let artists: Vec<String> = (0..12).map(|i| format!("Artist {i}")).collect();
        let ctx = SessionContext::new(None).with_recent_artists(&artists);
        let sources = vec![vec![Track::new(2, "Late", &["Artist 11"]), Track::new(3, "Fresh", &["Artist 12"])]];

        let pool = build(&sources, &ctx);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].title, "Fresh", "The 12th cooled-down artist is still excluded");
    }

    #[test]
    fn test_capacity_is_respected() {
        let ctx = SessionContext::new(None);
        let tracks: Vec<Track> = (0..50).map(|i| Track::new(i, &format!("Song {i}"), &["X"])).collect();
        let pool = build_candidates_for(&[tracks], &ctx, 10);
        assert_eq!(pool.len(), 10);
        assert_eq!(pool[9].title, "Song 9");
    }

    #[test]
    fn test_pool_has_unique_identity_keys() {
        let ctx = SessionContext::new(None);
        let sources = vec![
            (0..30).map(|i| Track::new(i, &format!("Song {}", i % 7), &["X"])).collect::<Vec<_>>(),
            (0..30).map(|i| Track::new(i + 100, &format!("song {}!", i % 5), &["x"])).collect(),
        ];
        let pool = build(&sources, &ctx);
        let keys: HashSet<_> = pool.iter().filter_map(identity_key).collect();
        assert_eq!(keys.len(), pool.len(), "Identity keys must be unique");
        assert_eq!(pool.len(), 7);
    }

    #[test]
    fn test_unidentifiable_tracks_are_dropped() {
        let ctx = SessionContext::new(None);
        let ghost = Track { title: "???".into(), artists: vec!["!!!".into()], ..Track::default() };
        assert!(build(&[vec![ghost]], &ctx).is_empty());
    }
}
