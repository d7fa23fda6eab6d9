//! Comma-delimited backing store for the game library.
//!
//! The file holds one header row followed by one row per game. Rows are
//! appended for new games and rewritten through a temporary file for updates,
//! so a half-written store is never visible under the configured path.

use std::{
    collections::HashSet,
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use fs2::FileExt;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    error::{LibraryError, Result},
    models::{format_date, today, Game},
};

/// Column order used when creating a store.
pub const HEADER: [&str; 8] = [
    "id",
    "title",
    "platform",
    "status",
    "rating",
    "review",
    "date_added",
    "completion_date",
];

/// Row shape accepted when reading. Columns are matched by header name, and
/// the optional columns may be absent in files written by older tools.
#[derive(Debug, Deserialize)]
struct StoredRow {
    id: u64,
    title: String,
    platform: String,
    status: String,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    review: Option<String>,
    #[serde(default)]
    date_added: Option<NaiveDate>,
    #[serde(default)]
    completion_date: Option<NaiveDate>,
}

impl StoredRow {
    fn into_game(self, line: u64) -> Game {
        let date_added = self.date_added.unwrap_or_else(|| {
            warn!(line, id = self.id, "Stored game has no date_added, using today");
            today()
        });
        Game {
            id: self.id,
            title: self.title,
            platform: self.platform,
            status: self.status,
            rating: self.rating,
            review: self.review,
            date_added,
            completion_date: self.completion_date,
        }
    }
}

/// Handle to the delimited file that durably holds the library.
///
/// Opening a store takes an exclusive advisory lock on `<path>.lock`; the lock
/// is held until the handle is dropped.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    _lock: File,
}

impl CsvStore {
    /// Bind to the store at `path`, creating parent directories as needed.
    ///
    /// The data file itself is not created until the first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(parent_dir(&path))?;

        let lock_path = lock_path(&path);
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| LibraryError::Locked(path.clone()))?;
        debug!(path = %path.display(), "Store lock acquired");

        Ok(Self { path, _lock: lock })
    }

    /// Location of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the data file exists yet.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read every stored game in file order.
    ///
    /// Returns `Ok(None)` when the file does not exist. A single unreadable
    /// row fails the whole read, as does a repeated id or a repeated
    /// (title, platform) pair.
    pub fn read_all(&self) -> Result<Option<Vec<Game>>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut reader = ReaderBuilder::new().from_reader(file);
        let headers = reader.headers()?.clone();
        let mut games: Vec<Game> = Vec::new();
        let mut ids = HashSet::new();
        let mut pairs = HashSet::new();
        for record in reader.records() {
            let record = record.map_err(row_error)?;
            let line = record.position().map_or(0, |pos| pos.line());
            let row: StoredRow =
                record
                    .deserialize(Some(&headers))
                    .map_err(|err| LibraryError::Corrupt {
                        line,
                        reason: err.to_string(),
                    })?;
            let game = row.into_game(line);

            if !ids.insert(game.id) {
                return Err(LibraryError::Corrupt {
                    line,
                    reason: format!("duplicate id {}", game.id),
                });
            }
            if !pairs.insert((game.title.clone(), game.platform.clone())) {
                return Err(LibraryError::Corrupt {
                    line,
                    reason: format!("'{}' on {} is stored twice", game.title, game.platform),
                });
            }
            games.push(game);
        }
        Ok(Some(games))
    }

    /// Number of data rows, excluding the header. A missing file counts as zero.
    pub fn row_count(&self) -> Result<usize> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut reader = ReaderBuilder::new().from_reader(file);
        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Append one row, writing the header first when the file is new or empty.
    ///
    /// An existing file keeps its own header: the row is laid out to match it,
    /// and columns the file does not have are left out. A missing final line
    /// break is restored before the row is written.
    pub fn append(&self, game: &Game) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        let headers = if len == 0 {
            None
        } else {
            if !ends_with_newline(&mut file)? {
                file.write_all(b"\n")?;
            }
            Some(self.stored_headers()?)
        };

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        let row = match &headers {
            Some(headers) => {
                let names: Vec<&str> = headers.iter().collect();
                record_for(game, &names)
            }
            None => {
                writer.write_record(HEADER)?;
                record_for(game, &HEADER)
            }
        };
        writer.write_record(&row)?;
        writer.flush()?;

        debug!(id = game.id, path = %self.path.display(), "Row appended");
        Ok(())
    }

    /// Rewrite the store with the row whose id matches `game` replaced.
    ///
    /// Other rows are copied verbatim in their original order. The new content
    /// goes to a temporary file beside the store which is renamed over the
    /// original only when a row matched; otherwise it is discarded and
    /// [`LibraryError::NotInStore`] is returned.
    pub fn replace(&self, game: &Game) -> Result<()> {
        let source = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LibraryError::StoreMissing(self.path.clone()))
            }
            Err(err) => return Err(err.into()),
        };

        let mut reader = ReaderBuilder::new().from_reader(source);
        let headers = reader.headers()?.clone();
        let id_column = id_column(&headers)?;
        let names: Vec<&str> = headers.iter().collect();
        let replacement = record_for(game, &names);

        let mut temp = NamedTempFile::new_in(parent_dir(&self.path))?;
        let mut matched = false;
        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut temp);
            writer.write_record(&headers)?;

            let mut record = StringRecord::new();
            while reader.read_record(&mut record)? {
                let line = record.position().map_or(0, |pos| pos.line());
                let stored_id = record
                    .get(id_column)
                    .unwrap_or_default()
                    .trim()
                    .parse::<u64>()
                    .map_err(|err| LibraryError::Corrupt {
                        line,
                        reason: format!("invalid id: {err}"),
                    })?;

                if stored_id == game.id {
                    if matched {
                        return Err(LibraryError::Corrupt {
                            line,
                            reason: format!("duplicate id {stored_id}"),
                        });
                    }
                    writer.write_record(&replacement)?;
                    matched = true;
                } else {
                    writer.write_record(&record)?;
                }
            }
            writer.flush()?;
        }

        if !matched {
            return Err(LibraryError::NotInStore(game.id));
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;
        debug!(id = game.id, path = %self.path.display(), "Row replaced");
        Ok(())
    }

    fn stored_headers(&self) -> Result<StringRecord> {
        let mut reader = ReaderBuilder::new().from_reader(File::open(&self.path)?);
        let headers = reader.headers()?.clone();
        id_column(&headers)?;
        Ok(headers)
    }
}

fn id_column(headers: &StringRecord) -> Result<usize> {
    headers
        .iter()
        .position(|name| name == "id")
        .ok_or_else(|| LibraryError::Corrupt {
            line: 1,
            reason: "header has no id column".to_string(),
        })
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Serialise `game` into the given column order. Unknown columns are left empty.
fn record_for(game: &Game, columns: &[&str]) -> StringRecord {
    columns
        .iter()
        .map(|column| field_value(game, column))
        .collect()
}

fn field_value(game: &Game, column: &str) -> String {
    match column {
        "id" => game.id.to_string(),
        "title" => game.title.clone(),
        "platform" => game.platform.clone(),
        "status" => game.status.clone(),
        "rating" => game.rating.map(|value| value.to_string()).unwrap_or_default(),
        "review" => game.review.clone().unwrap_or_default(),
        "date_added" => format_date(game.date_added),
        "completion_date" => game.completion_date.map(format_date).unwrap_or_default(),
        _ => String::new(),
    }
}

fn row_error(err: csv::Error) -> LibraryError {
    if let csv::ErrorKind::UnequalLengths { pos, .. } = err.kind() {
        return LibraryError::Corrupt {
            line: pos.as_ref().map_or(0, |pos| pos.line()),
            reason: err.to_string(),
        };
    }
    LibraryError::Csv(err)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{COMPLETED, PLAYING};
    use anyhow::Result;
    use tempfile::tempdir;

    fn sample(id: u64, title: &str) -> Game {
        Game::new(id, title, "PC", None)
    }

    #[test]
    fn append_writes_header_once() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStore::open(dir.path().join("games.csv"))?;
        store.append(&sample(1, "Hades"))?;
        store.append(&sample(2, "Celeste"))?;

        let content = fs::read_to_string(store.path())?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "id,title,platform,status,rating,review,date_added,completion_date"
        );
        assert!(lines[1].starts_with("1,Hades,PC,Want to Play,,,"));
        assert_eq!(store.row_count()?, 2);
        Ok(())
    }

    #[test]
    fn missing_file_reads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStore::open(dir.path().join("games.csv"))?;
        assert!(store.read_all()?.is_none());
        assert_eq!(store.row_count()?, 0);
        assert!(!store.exists());
        Ok(())
    }

    #[test]
    fn reviews_with_delimiters_survive() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStore::open(dir.path().join("games.csv"))?;
        let mut game = sample(1, "Disco Elysium");
        game.update(Some(COMPLETED), Some(0.0), Some("dense, \"wordy\"\nand great"));
        store.append(&game)?;

        let games = store.read_all()?.expect("store exists");
        assert_eq!(games, vec![game]);
        Ok(())
    }

    #[test]
    fn replace_swaps_only_the_matching_row() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStore::open(dir.path().join("games.csv"))?;
        for (id, title) in [(1, "Hades"), (2, "Celeste"), (3, "Tunic")] {
            store.append(&sample(id, title))?;
        }

        let mut celeste = sample(2, "Celeste");
        celeste.update(Some(PLAYING), Some(8.5), Some("chapter 7"));
        store.replace(&celeste)?;

        let games = store.read_all()?.expect("store exists");
        let titles: Vec<&str> = games.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, ["Hades", "Celeste", "Tunic"]);
        assert_eq!(games[1], celeste);
        assert_eq!(games[0], sample(1, "Hades"));
        Ok(())
    }

    #[test]
    fn replace_on_missing_store_reports_missing() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStore::open(dir.path().join("games.csv"))?;
        let err = store.replace(&sample(1, "Hades")).unwrap_err();
        assert!(matches!(err, LibraryError::StoreMissing(_)));
        assert!(!store.exists());
        Ok(())
    }

    #[test]
    fn replace_of_unknown_id_leaves_store_and_no_temp_file() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStore::open(dir.path().join("games.csv"))?;
        store.append(&sample(1, "Hades"))?;
        let before = fs::read(store.path())?;

        let err = store.replace(&sample(9, "Ghost")).unwrap_err();
        assert!(matches!(err, LibraryError::NotInStore(9)));
        assert_eq!(fs::read(store.path())?, before);

        let leftovers = fs::read_dir(dir.path())?.count();
        assert_eq!(leftovers, 2, "only the store and its lock file remain");
        Ok(())
    }

    #[test]
    fn reads_rows_written_by_older_tools() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(
            &path,
            "id,title,platform,status,rating,review,date_added,completion_date\r\n\
             1,Hollow Knight,PC,Completed,9,,2024-03-01,2024-04-12\r\n\
             2,Celeste,Switch,Want to Play,,,,\r\n",
        )?;
        let store = CsvStore::open(&path)?;
        let games = store.read_all()?.expect("store exists");

        assert_eq!(games[0].rating, Some(9.0));
        assert_eq!(games[0].review, None);
        assert_eq!(
            games[0].completion_date,
            NaiveDate::from_ymd_opt(2024, 4, 12)
        );
        assert_eq!(games[1].date_added, today());
        assert_eq!(games[1].completion_date, None);
        Ok(())
    }

    #[test]
    fn corrupt_row_fails_the_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(
            &path,
            "id,title,platform,status\n1,Hades,PC,Playing\nabc,Tunic,PC,Playing\n",
        )?;
        let store = CsvStore::open(&path)?;
        let err = store.read_all().unwrap_err();
        assert!(matches!(err, LibraryError::Corrupt { line: 3, .. }), "{err}");
        Ok(())
    }

    #[test]
    fn second_handle_is_locked_out() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        let first = CsvStore::open(&path)?;
        let err = CsvStore::open(&path).unwrap_err();
        assert!(matches!(err, LibraryError::Locked(_)));

        drop(first);
        CsvStore::open(&path)?;
        Ok(())
    }

    #[test]
    fn append_follows_a_narrower_existing_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(&path, "id,title,platform,status\n1,Hades,PC,Playing\n")?;
        let store = CsvStore::open(&path)?;

        let mut tunic = sample(2, "Tunic");
        tunic.update(None, Some(8.0), Some("foxy"));
        store.append(&tunic)?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().last(), Some("2,Tunic,PC,Want to Play"));

        let games = store.read_all()?.expect("store exists");
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].title, "Tunic");
        assert_eq!(games[1].rating, None);
        Ok(())
    }

    #[test]
    fn append_restores_missing_final_line_break() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(
            &path,
            "id,title,platform,status,rating,review,date_added,completion_date\n\
             1,Hades,PC,Playing,,,2024-01-01,",
        )?;
        let store = CsvStore::open(&path)?;
        store.append(&sample(2, "Tunic"))?;

        let games = store.read_all()?.expect("store exists");
        let titles: Vec<&str> = games.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, ["Hades", "Tunic"]);
        assert_eq!(games[0].date_added, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        Ok(())
    }

    #[test]
    fn append_refuses_header_without_id() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(&path, "title,platform\nHades,PC\n")?;
        let before = fs::read(&path)?;
        let store = CsvStore::open(&path)?;

        let err = store.append(&sample(1, "Tunic")).unwrap_err();
        assert!(matches!(err, LibraryError::Corrupt { line: 1, .. }), "{err}");
        assert_eq!(fs::read(&path)?, before);
        Ok(())
    }

    #[test]
    fn repeated_id_fails_the_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(
            &path,
            "id,title,platform,status\n1,Hades,PC,Playing\n1,Tunic,PC,Playing\n",
        )?;
        let store = CsvStore::open(&path)?;
        let err = store.read_all().unwrap_err();
        assert!(matches!(err, LibraryError::Corrupt { line: 3, .. }), "{err}");
        Ok(())
    }

    #[test]
    fn repeated_title_and_platform_fails_the_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(
            &path,
            "id,title,platform,status\n1,Hades,PC,Playing\n2,Hades,PC,Completed\n",
        )?;
        let store = CsvStore::open(&path)?;
        let err = store.read_all().unwrap_err();
        assert!(matches!(err, LibraryError::Corrupt { line: 3, .. }), "{err}");
        Ok(())
    }

    #[test]
    fn replace_refuses_a_repeated_id() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.csv");
        fs::write(
            &path,
            "id,title,platform,status\n1,Hades,PC,Playing\n1,Tunic,PC,Playing\n",
        )?;
        let before = fs::read(&path)?;
        let store = CsvStore::open(&path)?;

        let mut hades = sample(1, "Hades");
        hades.update(Some(COMPLETED), None, None);
        let err = store.replace(&hades).unwrap_err();
        assert!(matches!(err, LibraryError::Corrupt { line: 3, .. }), "{err}");
        assert_eq!(fs::read(&path)?, before);
        assert_eq!(fs::read_dir(dir.path())?.count(), 2);
        Ok(())
    }
}
