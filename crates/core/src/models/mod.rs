//! Shared domain models.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status given to newly added games.
pub const WANT_TO_PLAY: &str = "Want to Play";
/// Status for games currently in progress.
pub const PLAYING: &str = "Playing";
/// Status that stamps a completion date.
pub const COMPLETED: &str = "Completed";
/// Filter value that matches every status.
pub const STATUS_ALL: &str = "All";

/// Format used for dates in mappings and in the store.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field-name to value mapping handed to presentation layers.
///
/// Keys keep the declaration order of [`Game`]; unset values are `null`.
pub type GameMapping = Map<String, Value>;

/// One tracked game and its review state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Identifier assigned by the library.
    pub id: u64,
    /// Game title.
    pub title: String,
    /// Platform the game is played on.
    pub platform: String,
    /// Progress label, e.g. [`WANT_TO_PLAY`] or [`COMPLETED`].
    pub status: String,
    /// Optional score; `Some(0.0)` is a real rating.
    pub rating: Option<f64>,
    /// Optional free-text review.
    pub review: Option<String>,
    /// Day the game entered the library.
    pub date_added: NaiveDate,
    /// Day the game was marked completed.
    pub completion_date: Option<NaiveDate>,
}

impl Game {
    /// Build a fresh record dated today. `status` defaults to [`WANT_TO_PLAY`].
    ///
    /// `completion_date` starts unset whatever the status; only
    /// [`Game::update`] stamps it.
    pub fn new(
        id: u64,
        title: impl Into<String>,
        platform: impl Into<String>,
        status: Option<&str>,
    ) -> Self {
        let status = status.unwrap_or(WANT_TO_PLAY).to_string();
        Self {
            id,
            title: title.into(),
            platform: platform.into(),
            status,
            rating: None,
            review: None,
            date_added: today(),
            completion_date: None,
        }
    }

    /// Apply a partial update. Omitted fields keep their value.
    ///
    /// Supplying a status always rewrites `completion_date`: today for
    /// [`COMPLETED`], cleared for anything else.
    pub fn update(&mut self, status: Option<&str>, rating: Option<f64>, review: Option<&str>) {
        if let Some(status) = status {
            self.status = status.to_string();
            self.completion_date = self.is_completed().then(today);
        }
        if let Some(rating) = rating {
            self.rating = Some(rating);
        }
        if let Some(review) = review {
            self.review = Some(review.to_string());
        }
    }

    /// Whether the status is [`COMPLETED`].
    pub fn is_completed(&self) -> bool {
        self.status == COMPLETED
    }

    /// Case-sensitive match on the (title, platform) pair.
    pub fn matches(&self, title: &str, platform: &str) -> bool {
        self.title == title && self.platform == platform
    }

    /// Snapshot every attribute as an ordered mapping.
    pub fn to_mapping(&self) -> GameMapping {
        let mut map = Map::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("title".into(), Value::from(self.title.clone()));
        map.insert("platform".into(), Value::from(self.platform.clone()));
        map.insert("status".into(), Value::from(self.status.clone()));
        map.insert("rating".into(), self.rating.map_or(Value::Null, Value::from));
        map.insert(
            "review".into(),
            self.review.clone().map_or(Value::Null, Value::from),
        );
        map.insert("date_added".into(), Value::from(format_date(self.date_added)));
        map.insert(
            "completion_date".into(),
            self.completion_date
                .map_or(Value::Null, |date| Value::from(format_date(date))),
        );
        map
    }
}

/// Current local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Render a date in [`DATE_FORMAT`].
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
