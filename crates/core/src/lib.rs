#![warn(clippy::all, missing_docs)]

//! Keeps a personal list of games (what you want to play, are playing
//! or have finished) in a plain CSV file.
//!
//! [`GameLibrary`] is the entry point: it loads the file once, serves reads
//! from memory and writes every change back through [`CsvStore`] before
//! applying it. [`AppConfig`] says where that file lives.

pub mod config;
pub mod error;
pub mod library;
pub mod models;
pub mod store;

pub use config::AppConfig;
pub use error::{LibraryError, Result};
pub use library::GameLibrary;
pub use models::{Game, GameMapping, COMPLETED, PLAYING, STATUS_ALL, WANT_TO_PLAY};
pub use store::CsvStore;
