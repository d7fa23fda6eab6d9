//! In-memory game collection mirrored to a [`CsvStore`].

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    error::{LibraryError, Result},
    models::{Game, GameMapping, STATUS_ALL},
    store::CsvStore,
};

/// Owns every loaded [`Game`] and mediates all reads and writes to the store.
///
/// Mutations hit the store first and are committed to memory only once the
/// write succeeded, so the file stays the authoritative copy.
#[derive(Debug)]
pub struct GameLibrary {
    games: Vec<Game>,
    next_id: u64,
    store: CsvStore,
}

impl GameLibrary {
    /// Create an empty library bound to the store at `path`.
    ///
    /// Call [`GameLibrary::load`] to pull in previously saved games.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            games: Vec::new(),
            next_id: 1,
            store: CsvStore::open(path)?,
        })
    }

    /// Create an empty library using the configured store path.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::open(&config.store_path)
    }

    /// Location of the backing store.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Number of games held in memory.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether no games are held in memory.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Id the next added game will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Borrow the games in insertion order.
    pub fn games(&self) -> &[Game] {
        &self.games
    }

    /// Add a new game and return its mapping.
    ///
    /// Title, platform and status are trimmed before anything else, so the
    /// duplicate check compares the trimmed pair exactly (case-sensitive)
    /// against what is stored. The row is appended to the store before the
    /// game becomes visible in memory.
    pub fn add(
        &mut self,
        title: &str,
        platform: &str,
        status: Option<&str>,
    ) -> Result<GameMapping> {
        let title = required("title", title)?;
        let platform = required("platform", platform)?;
        let status = status.map(|value| required("status", value)).transpose()?;

        if self.games.iter().any(|game| game.matches(title, platform)) {
            warn!(title, platform, "Duplicate game rejected");
            return Err(LibraryError::Duplicate {
                title: title.to_string(),
                platform: platform.to_string(),
            });
        }

        let game = Game::new(self.next_id, title, platform, status);
        if let Err(err) = self.store.append(&game) {
            error!(id = game.id, title, error = %err, "Failed to save game");
            return Err(err);
        }
        info!(id = game.id, title, platform, "Game added");

        let mapping = game.to_mapping();
        self.games.push(game);
        self.next_id += 1;
        Ok(mapping)
    }

    /// Apply a partial update to game `id` and rewrite its stored row.
    ///
    /// An unknown id yields [`LibraryError::NotFound`] without touching the
    /// store. If the store cannot be rewritten the in-memory game keeps its
    /// previous values.
    pub fn update(
        &mut self,
        id: u64,
        status: Option<&str>,
        rating: Option<f64>,
        review: Option<&str>,
    ) -> Result<GameMapping> {
        let index = self
            .games
            .iter()
            .position(|game| game.id == id)
            .ok_or(LibraryError::NotFound(id))?;
        let status = status.map(|value| required("status", value)).transpose()?;

        let mut updated = self.games[index].clone();
        updated.update(status, rating, review);

        match self.store.replace(&updated) {
            Ok(()) => info!(id, status = %updated.status, "Game updated"),
            Err(err @ LibraryError::NotInStore(_)) => {
                warn!(id, path = %self.path().display(), "Game missing from store");
                return Err(err);
            }
            Err(err @ LibraryError::StoreMissing(_)) => {
                warn!(id, path = %self.path().display(), "Store missing, update not saved");
                return Err(err);
            }
            Err(err) => {
                error!(id, error = %err, "Failed to update game");
                return Err(err);
            }
        }

        let mapping = updated.to_mapping();
        self.games[index] = updated;
        Ok(mapping)
    }

    /// Mappings for every game, optionally narrowed to one status.
    ///
    /// `None` and [`STATUS_ALL`] both return the whole collection. Insertion
    /// order is preserved either way.
    pub fn get_all(&self, status_filter: Option<&str>) -> Vec<GameMapping> {
        match status_filter {
            None | Some(STATUS_ALL) => self.games.iter().map(Game::to_mapping).collect(),
            Some(status) => self
                .games
                .iter()
                .filter(|game| game.status == status)
                .map(Game::to_mapping)
                .collect(),
        }
    }

    /// Mapping for game `id`.
    pub fn get_by_id(&self, id: u64) -> Result<GameMapping> {
        self.games
            .iter()
            .find(|game| game.id == id)
            .map(Game::to_mapping)
            .ok_or(LibraryError::NotFound(id))
    }

    /// Number of games per status, in order of first appearance.
    pub fn status_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for game in &self.games {
            match counts.iter_mut().find(|(status, _)| *status == game.status) {
                Some((_, count)) => *count += 1,
                None => counts.push((game.status.clone(), 1)),
            }
        }
        counts
    }

    /// Replace the in-memory collection with the store's contents.
    ///
    /// A missing store loads as an empty collection. On any other failure the
    /// current games and id counter are left as they were. The counter is
    /// reset to one past the highest loaded id.
    pub fn load(&mut self) -> Result<usize> {
        let games = match self.store.read_all() {
            Ok(Some(games)) => games,
            Ok(None) => {
                info!(path = %self.path().display(), "Store not found, starting empty");
                Vec::new()
            }
            Err(err) => {
                error!(path = %self.path().display(), error = %err, "Failed to load games");
                return Err(err);
            }
        };

        self.next_id = games.iter().map(|game| game.id).max().unwrap_or(0) + 1;
        self.games = games;
        info!(total = self.games.len(), next_id = self.next_id, "Games loaded");
        Ok(self.games.len())
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::invalid(field, "must not be empty"));
    }
    Ok(trimmed)
}
