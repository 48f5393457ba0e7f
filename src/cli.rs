//! # Command-Line Interface Module
//!
//! Clap definitions for the `encore` binary.
//!
//! ## Commands
//!
//! - `next`: Pick the next batch of tracks for a request
//! - `score`: Show how every pooled candidate scores
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! encore next --request session.json --limit 10
//! cat session.json | encore next --request - --seed listener-1 --verbose
//! encore score --request session.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "encore")]
#[command(about = "Encore: radio-style autoplay that keeps the music going")]
#[command(version)]
pub struct Args {
    /// Engine config file (JSON). Overrides $ENCORE_CONFIG and the default location.
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pick the next batch of tracks
    ///
    /// Reads a request (current track, candidate sources, session state)
    /// and prints the ordered batch as JSON.
    Next {
        /// Request file, or `-` for stdin
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        request: PathBuf,

        /// Batch size, overriding the request
        #[arg(short, long)]
        limit: Option<usize>,

        /// Relevance/diversity trade-off in [0, 1], overriding the request
        #[arg(long)]
        lambda: Option<f64>,

        /// Session seed, overriding the request
        #[arg(long)]
        seed: Option<String>,

        /// Print a ranked table with score breakdowns to stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Score every pooled candidate without reranking
    ///
    /// Useful for tuning weights: prints per-candidate breakdowns and
    /// distribution statistics as JSON.
    Score {
        /// Request file, or `-` for stdin
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        request: PathBuf,
    },

    /// Generate shell completions
    ///
    /// Usage: encore completion bash > ~/.local/share/bash-completion/completions/encore
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
