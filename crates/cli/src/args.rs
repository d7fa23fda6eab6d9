//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gamelog_core::STATUS_ALL;

/// Track the games you want to play, are playing and have finished.
#[derive(Parser, Debug)]
#[command(name = "gamelog", version)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// CSV store to use instead of the configured one
    #[arg(short, long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a game to the collection
    Add {
        /// Game title
        title: String,
        /// Platform the game is played on
        platform: String,
        /// Initial status (defaults to "Want to Play")
        #[arg(long)]
        status: Option<String>,
    },

    /// Change status, rating or review of a game
    Update {
        /// Id of the game
        id: u64,
        /// New status; "Completed" stamps today's date
        #[arg(long)]
        status: Option<String>,
        /// New rating (0 is a valid rating)
        #[arg(long)]
        rating: Option<f64>,
        /// New review text
        #[arg(long)]
        review: Option<String>,
    },

    /// List games, optionally filtered by status
    List {
        /// Status to show
        #[arg(long, default_value = STATUS_ALL)]
        status: String,
    },

    /// Show one game
    Show {
        /// Id of the game
        id: u64,
    },

    /// Count games per status
    Stats,
}
