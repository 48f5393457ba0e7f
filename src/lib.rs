//! Radio-style autoplay: picks what plays next once the current track ends.
//!
//! Given raw candidate lists (recommendations, trending) and the listener's
//! session, the engine returns an ordered batch that stays close to what just
//! played while avoiding repeats and artist/genre monotony.
//!
//! Core modules:
//! - [`features`] - Track Feature Normalizer
//! - [`candidates`] - Candidate Pool Builder
//! - [`algorithm`] - Feature Scorer
//! - [`queue`] - MMR Diversity Reranker and the end-to-end [`queue::RadioQueue`]
//! - [`rng`] - Session Randomizer
//!
//! ### Supporting Modules
//!
//! - [`track`] - Canonical track record and the raw-shape adapter
//! - [`session`] - Per-decision listener state
//! - [`wire`] - JSON request/response schema
//! - [`config`] - Engine tunables and config-file discovery
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```
//! use encore::queue::RadioQueue;
//! use encore::session::SessionContext;
//! use encore::track::Track;
//!
//! let current = Track::new(1, "Montagem Rave", &["DJ A"]).with_duration(150.0);
//! let recommendations = vec![
//!     Track::new(2, "Montagem Coral", &["DJ A"]).with_duration(140.0),
//!     Track::new(3, "Funk do Bailão", &["MC B"]),
//!     Track::new(4, "Seoul Nights", &["Idol C"]).with_genre("K-Pop"),
//! ];
//!
//! let ctx = SessionContext::new(Some(current)).with_seed("listener-1");
//! let batch = RadioQueue::default().next_batch(&[recommendations], &ctx, 20);
//!
//! // The K-pop track is outside the current genre and artist.
//! assert_eq!(batch.len(), 2);
//! ```
//!
//! ## Guarantees
//!
//! - Nothing here performs I/O except [`config`] and [`wire`] loaders.
//! - The engine never fails on incomplete input; the worst case is an empty
//!   batch.
//! - No state survives a call. Concurrent sessions need no locking.
//! - With a session seed, identical input gives identical output.

pub mod algorithm;
pub mod candidates;
pub mod cli;
pub mod completion;
pub mod config;
pub mod features;
pub mod queue;
pub mod rng;
pub mod session;
pub mod track;
pub mod wire;
