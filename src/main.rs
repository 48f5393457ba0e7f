//! # Encore - Radio-Style Autoplay
//!
//! Command-line front end for the autoplay engine. Requests and responses are
//! JSON, so the binary can sit behind any player or service that already has
//! candidate lists and session state.
//!
//! ## Usage
//!
//! ```bash
//! # Next ten tracks for a session
//! encore next --request session.json --limit 10
//!
//! # Why did these candidates score the way they did?
//! encore score --request session.json
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use encore::algorithm::statistics::{analyze_score_distribution, ScoreStatistics};
use encore::cli::{self, Command};
use encore::completion;
use encore::config::EngineConfig;
use encore::features::artist_display;
use encore::queue::{Explanation, RadioQueue, RankedTrack};
use encore::rng::SessionSeed;
use encore::wire::{RadioRequest, RadioResponse};
use log::info;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct ScoreReport {
    candidates: Vec<Explanation>,
    statistics: ScoreStatistics,
}

/// Human-readable ranking table for `--verbose`.
fn print_ranking(ranked: &[RankedTrack]) -> io::Result<()> {
    let mut err = io::stderr().lock();
    writeln!(err, "{:>3}  {:<40} {:<24} {:>6} {:>6} {:>6} {:>6} {:>7}", "#", "title", "artist", "score", "sim", "aff", "rel", "mmr")?;
    for (position, entry) in ranked.iter().enumerate() {
        let b = &entry.breakdown;
        writeln!(
            err,
            "{:>3}  {:<40.40} {:<24.24} {:>6.3} {:>6.3} {:>6.3} {:>6.3} {:>7.3}",
            position + 1,
            entry.track.title,
            artist_display(&entry.track),
            b.score,
            b.similarity,
            b.affinity,
            b.relatedness,
            entry.mmr
        )?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Main entry point for the Encore binary.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug encore next -r req.json` - Pool and filter decisions
/// - `RUST_LOG=encore::queue=trace encore next -r req.json` - Every MMR pick
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        Command::Next { request, limit, lambda, seed, verbose } => {
            let config = EngineConfig::load(args.config.as_deref())?;
            let request = RadioRequest::from_path(&request)?;

            let mut context = request.to_session();
            if let Some(seed) = seed.as_deref().map(SessionSeed::from_arg).filter(|s| !s.is_empty()) {
                context.seed = Some(seed);
            }
            let limit = limit.unwrap_or_else(|| request.limit_or(config.queue.default_limit));
            let lambda = lambda.or(request.lambda);

            let radio = RadioQueue::new(config);
            let ranked = radio.next_ranked(&request.sources(), &context, limit, lambda);
            info!("Picked {} tracks", ranked.len());

            if verbose {
                print_ranking(&ranked)?;
            }
            let tracks = ranked.into_iter().map(|entry| entry.track).collect::<Vec<_>>();
            print_json(&RadioResponse::from(tracks))?;
        }
        Command::Score { request } => {
            let config = EngineConfig::load(args.config.as_deref())?;
            let request = RadioRequest::from_path(&request)?;

            let candidates = RadioQueue::new(config).explain(&request.sources(), &request.to_session());
            let scores: Vec<f64> = candidates.iter().map(|c| c.breakdown.score).collect();
            print_json(&ScoreReport {
                statistics: analyze_score_distribution(&scores),
                candidates,
            })?;
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}
