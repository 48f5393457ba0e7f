//! # Session Randomizer
//!
//! Seeded pseudo-random source for tie-breaking jitter and bounded shuffling.
//!
//! A session seed is folded into 32 bits (numbers by truncation, strings with
//! FNV-1a over UTF-16 code units) and advanced with the Mulberry32 mixing step,
//! so the same seed yields the same stream on every platform. Without a seed
//! the generator falls back to `rand`'s thread-local entropy source.
//!
//! One generator is built per ranking call and dropped afterwards; nothing is
//! shared between sessions.

use rand::rngs::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Jitter magnitude used when the session does not specify one.
pub const DEFAULT_JITTER: f64 = 0.04;
/// Upper bound on the jitter magnitude.
pub const MAX_JITTER: f64 = 0.15;

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Opaque per-session seed, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionSeed {
    Number(f64),
    Text(String),
}

impl SessionSeed {
    /// Empty text carries no seed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }

    /// Seed given on the command line. Whole numbers fold like a numeric
    /// JSON seed, so `--seed 42` and `"session_seed": 42` agree.
    #[must_use]
    pub fn from_arg(arg: &str) -> Self {
        match arg.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 => Self::Number(n),
            _ => Self::Text(arg.to_string()),
        }
    }
}

impl From<&str> for SessionSeed {
    fn from(seed: &str) -> Self {
        Self::Text(seed.to_string())
    }
}

impl From<u64> for SessionSeed {
    #[allow(clippy::cast_precision_loss)]
    fn from(seed: u64) -> Self {
        Self::Number(seed as f64)
    }
}

/// Fold a seed into the 32-bit generator state.
///
/// ```
/// use encore::rng::{hash_seed, SessionSeed};
///
/// assert_eq!(hash_seed(&SessionSeed::Number(42.0)), 42);
/// assert_eq!(hash_seed(&SessionSeed::Number(-1.0)), u32::MAX);
/// assert_eq!(hash_seed(&SessionSeed::Text(String::new())), 2_166_136_261);
/// ```
#[must_use]
pub fn hash_seed(seed: &SessionSeed) -> u32 {
    match seed {
        SessionSeed::Number(n) if n.is_finite() => n.trunc().rem_euclid(TWO_POW_32) as u32,
        SessionSeed::Number(n) => fnv1a(non_finite_label(*n)),
        SessionSeed::Text(text) => fnv1a(text),
    }
}

fn non_finite_label(n: f64) -> &'static str {
    match (n.is_nan(), n.is_sign_positive()) {
        (true, _) => "NaN",
        (false, true) => "Infinity",
        (false, false) => "-Infinity",
    }
}

fn fnv1a(text: &str) -> u32 {
    text.encode_utf16().fold(FNV_OFFSET, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Mulberry32: tiny, fast, and good enough for ordering noise.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    #[must_use]
    pub const fn new(state: u32) -> Self {
        Self { state }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / TWO_POW_32
    }
}

/// Per-call random source: deterministic when seeded, entropy otherwise.
#[derive(Debug)]
pub enum SessionRng {
    Seeded(Mulberry32),
    Entropy(ThreadRng),
}

impl SessionRng {
    #[must_use]
    pub fn from_seed(seed: Option<&SessionSeed>) -> Self {
        match seed.filter(|seed| !seed.is_empty()) {
            Some(seed) => Self::Seeded(Mulberry32::new(hash_seed(seed))),
            None => Self::Entropy(rand::thread_rng()),
        }
    }

    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        matches!(self, Self::Seeded(_))
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        match self {
            Self::Seeded(rng) => rng.next_f64(),
            Self::Entropy(rng) => rng.gen::<f64>(),
        }
    }

    /// Centered noise in `[-scale/2, scale/2)`. Draws nothing when `scale` is 0.
    pub fn jitter(&mut self, scale: f64) -> f64 {
        match scale > 0.0 {
            true => (self.next_f64() - 0.5) * scale,
            false => 0.0,
        }
    }

    /// Fisher-Yates shuffle confined to consecutive, non-overlapping windows.
    ///
    /// Items never move out of their window, so the overall ordering trend
    /// survives while short-range order varies.
    pub fn shuffle_windows<T>(&mut self, items: &mut [T], window: usize) {
        let window = window.max(1);
        for start in (0..items.len()).step_by(window) {
            let end = items.len().min(start + window);
            for i in (start + 1..end).rev() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
                let offset = (self.next_f64() * (i - start + 1) as f64).floor() as usize;
                items.swap(i, (start + offset).min(i));
            }
        }
    }
}

/// Resolve the jitter magnitude: default when absent or not finite, else
/// clamped to `[0, MAX_JITTER]`.
#[must_use]
pub fn resolve_jitter_scale(requested: Option<f64>) -> f64 {
    match requested {
        Some(scale) if scale.is_finite() => scale.clamp(0.0, MAX_JITTER),
        _ => DEFAULT_JITTER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_from_arg() {
        assert_eq!(SessionSeed::from_arg("42"), SessionSeed::Number(42.0));
        assert_eq!(SessionSeed::from_arg("-7"), SessionSeed::Number(-7.0));
        assert_eq!(SessionSeed::from_arg("4.5"), SessionSeed::Text("4.5".into()));
        assert_eq!(SessionSeed::from_arg("listener-1"), SessionSeed::from("listener-1"));
        assert_eq!(SessionSeed::from_arg("NaN"), SessionSeed::Text("NaN".into()));
        assert_eq!(
            hash_seed(&SessionSeed::from_arg("42")),
            hash_seed(&SessionSeed::Number(42.0)),
            "Flag and JSON seeds must fold identically"
        );
    }

    #[test]
    fn test_mulberry32_reference_values() {
        // First outputs of mulberry32 seeded with 0, computed independently.
        let mut rng = Mulberry32::new(0);
        assert_eq!(rng.next_u32(), 1_144_304_738);
        assert_eq!(rng.next_u32(), 1_416_247);
    }

    #[test]
    fn test_seeded_streams_are_reproducible() {
        let seed = SessionSeed::from("listener-7:2024-06-01");
        let mut a = SessionRng::from_seed(Some(&seed));
        let mut b = SessionRng::from_seed(Some(&seed));

        let first: Vec<f64> = (0..32).map(|_| a.next_f64()).collect();
        let second: Vec<f64> = (0..32).map(|_| b.next_f64()).collect();
        assert_eq!(first, second, "Same seed must give the same stream");
        assert!(first.iter().all(|x| (0.0..1.0).contains(x)));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = SessionRng::from_seed(Some(&SessionSeed::from("a")));
        let mut b = SessionRng::from_seed(Some(&SessionSeed::from("b")));
        let first: Vec<f64> = (0..8).map(|_| a.next_f64()).collect();
        let second: Vec<f64> = (0..8).map(|_| b.next_f64()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_seed_is_no_seed() {
        assert!(!SessionRng::from_seed(Some(&SessionSeed::from(""))).is_seeded());
        assert!(!SessionRng::from_seed(None).is_seeded());
        assert!(SessionRng::from_seed(Some(&SessionSeed::Number(0.0))).is_seeded());
    }

    #[test]
    fn test_numeric_seed_folding() {
        assert_eq!(hash_seed(&SessionSeed::Number(4_294_967_297.0)), 1);
        assert_eq!(hash_seed(&SessionSeed::Number(7.9)), 7);
        assert_eq!(hash_seed(&SessionSeed::Number(f64::NAN)), fnv1a("NaN"));
    }

    #[test]
    fn test_jitter_bounds() {
        let mut rng = SessionRng::from_seed(Some(&SessionSeed::from(99u64)));
        for _ in 0..1000 {
            let j = rng.jitter(0.1);
            assert!((-0.05..0.05).contains(&j), "Jitter {j} out of range");
        }
        assert_eq!(rng.jitter(0.0), 0.0);
    }

    #[test]
    fn test_shuffle_windows_keeps_items_in_window() {
        let mut rng = SessionRng::from_seed(Some(&SessionSeed::from("window")));
        let mut items: Vec<usize> = (0..23).collect();
        rng.shuffle_windows(&mut items, 5);

        for (position, item) in items.iter().enumerate() {
            assert_eq!(position / 5, item / 5, "Item {item} escaped its window");
        }
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..23).collect::<Vec<_>>(), "Shuffle must be a permutation");
    }

    #[test]
    fn test_resolve_jitter_scale() {
        assert_eq!(resolve_jitter_scale(None), DEFAULT_JITTER);
        assert_eq!(resolve_jitter_scale(Some(f64::NAN)), DEFAULT_JITTER);
        assert_eq!(resolve_jitter_scale(Some(0.5)), MAX_JITTER);
        assert_eq!(resolve_jitter_scale(Some(-1.0)), 0.0);
        assert_eq!(resolve_jitter_scale(Some(0.08)), 0.08);
    }
}
