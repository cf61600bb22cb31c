//! SQLite-backed countdown store and day marker.
//!
//! Schema (shared with earlier deployments of the bot, do not change):
//! - `posts(id INTEGER PRIMARY KEY, feature_type TEXT, days_left INTEGER)`
//! - `time(key TEXT PRIMARY KEY, value INTEGER)`, one row with `key = 'day'`

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::countdown::{CountdownStore, FeatureRecord};
use crate::day_marker::{DayMarker, RolloverStore, INITIAL_DAY};
use crate::error::StoreError;
use crate::platform::{FeatureType, PostId};

const DAY_KEY: &str = "day";

/// Writers on other handles (a CLI `tick` next to a running bot) wait this
/// long for the write lock before failing with [`StoreError::Locked`].
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Rows left negative by older builds are normalized to zero here.
const DECREMENT_SQL: &str =
    "UPDATE posts SET days_left = MAX(days_left - 1, 0) WHERE days_left != 0";

/// SQLite database holding feature records and the day marker.
///
/// All access goes through one connection behind a mutex, so concurrent
/// jobs queue on it rather than race.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file at `path` and ensure the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrate(&conn)?;
        tracing::debug!(path = ?path, "loaded posts and time tables");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush and close the connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::from(e))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS posts (
            id           INTEGER PRIMARY KEY,
            feature_type TEXT,
            days_left    INTEGER
        );

        CREATE TABLE IF NOT EXISTS time (
            key   TEXT PRIMARY KEY,
            value INTEGER
        );

        INSERT OR IGNORE INTO time (key, value) VALUES ('day', 0);",
    )
}

fn read_marker(conn: &Connection) -> Result<u8, rusqlite::Error> {
    let value: Option<Option<i64>> = conn
        .query_row(
            "SELECT value FROM time WHERE key = ?1",
            params![DAY_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value
        .flatten()
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(INITIAL_DAY))
}

fn write_marker(conn: &Connection, day: u8) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO time (key, value) VALUES (?1, ?2)",
        params![DAY_KEY, day],
    )?;
    Ok(())
}

fn row_to_record(row: &rusqlite::Row) -> Result<FeatureRecord, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let feature_type: Option<String> = row.get(1)?;
    let days_left: Option<i64> = row.get(2)?;
    Ok(FeatureRecord {
        post_id: PostId(id),
        feature_type: FeatureType::parse(feature_type.as_deref()),
        days_left: days_left.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32,
    })
}

impl CountdownStore for Database {
    fn register(
        &self,
        post_id: PostId,
        feature_type: FeatureType,
        days: u32,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO posts (id, feature_type, days_left) VALUES (?1, ?2, ?3)",
            params![post_id.0, feature_type.as_str(), days],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateRecord(post_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn decrement_all(&self) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let touched = tx.execute(DECREMENT_SQL, [])?;
        tx.commit()?;
        Ok(touched)
    }

    fn list_expired(&self) -> Result<Vec<FeatureRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, feature_type, days_left FROM posts
             WHERE days_left IS NULL OR days_left <= 0
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn remove(&self, post_id: PostId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id.0])?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<FeatureRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, feature_type, days_left FROM posts ORDER BY id")?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get(&self, post_id: PostId) -> Result<Option<FeatureRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, feature_type, days_left FROM posts WHERE id = ?1",
                params![post_id.0],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }
}

impl DayMarker for Database {
    fn get(&self) -> Result<u8, StoreError> {
        let conn = self.lock()?;
        Ok(read_marker(&conn)?)
    }

    fn set(&self, day: u8) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Ok(write_marker(&conn, day)?)
    }
}

impl RolloverStore for Database {
    fn advance_day(&self, day: u8) -> Result<Option<usize>, StoreError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock before the marker is read, so a
        // second handle blocks here and then sees the new marker.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if read_marker(&tx)? == day {
            return Ok(None);
        }
        let touched = tx.execute(DECREMENT_SQL, [])?;
        write_marker(&tx, day)?;
        tx.commit()?;
        Ok(Some(touched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(records: &[FeatureRecord]) -> Vec<i64> {
        records.iter().map(|r| r.post_id.0).collect()
    }

    #[test]
    fn register_and_get() {
        let db = Database::open_memory().unwrap();
        db.register(PostId(10), FeatureType::Community, 3).unwrap();

        let record = CountdownStore::get(&db, PostId(10)).unwrap().unwrap();
        assert_eq!(record.days_left, 3);
        assert_eq!(record.feature_type, FeatureType::Community);
        assert!(CountdownStore::get(&db, PostId(11)).unwrap().is_none());
    }

    #[test]
    fn register_duplicate_is_rejected() {
        let db = Database::open_memory().unwrap();
        db.register(PostId(10), FeatureType::Community, 3).unwrap();
        let err = db.register(PostId(10), FeatureType::Community, 5).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRecord(PostId(10))));

        // The original record is untouched.
        let record = CountdownStore::get(&db, PostId(10)).unwrap().unwrap();
        assert_eq!(record.days_left, 3);
    }

    #[test]
    fn decrement_floors_at_zero() {
        let db = Database::open_memory().unwrap();
        db.register(PostId(1), FeatureType::Community, 2).unwrap();
        db.register(PostId(2), FeatureType::Community, 0).unwrap();

        assert_eq!(db.decrement_all().unwrap(), 1);
        assert_eq!(ids(&db.list_expired().unwrap()), vec![2]);

        db.decrement_all().unwrap();
        db.decrement_all().unwrap();
        let all = db.list_all().unwrap();
        assert!(all.iter().all(|r| r.days_left == 0));
        assert_eq!(ids(&db.list_expired().unwrap()), vec![1, 2]);
    }

    #[test]
    fn remove_is_idempotent() {
        let db = Database::open_memory().unwrap();
        db.register(PostId(1), FeatureType::Community, 1).unwrap();
        db.remove(PostId(1)).unwrap();
        db.remove(PostId(1)).unwrap();
        db.remove(PostId(404)).unwrap();
        assert!(db.list_all().unwrap().is_empty());
    }

    #[test]
    fn day_marker_defaults_to_initial_day() {
        let db = Database::open_memory().unwrap();
        assert_eq!(DayMarker::get(&db).unwrap(), INITIAL_DAY);
        db.set(4).unwrap();
        assert_eq!(DayMarker::get(&db).unwrap(), 4);
    }

    #[test]
    fn legacy_rows_are_readable() {
        let db = Database::open_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            conn.execute("INSERT INTO posts (id, days_left) VALUES (5, 2)", [])
                .unwrap();
            conn.execute("INSERT INTO posts (id, days_left) VALUES (6, -1)", [])
                .unwrap();
        }

        let record = CountdownStore::get(&db, PostId(5)).unwrap().unwrap();
        assert_eq!(record.feature_type, FeatureType::Community);
        assert_eq!(ids(&db.list_expired().unwrap()), vec![6]);

        db.decrement_all().unwrap();
        let legacy = CountdownStore::get(&db, PostId(6)).unwrap().unwrap();
        assert_eq!(legacy.days_left, 0);
    }

    #[test]
    fn advance_day_decrements_once_per_day() {
        let db = Database::open_memory().unwrap();
        db.register(PostId(1), FeatureType::Community, 3).unwrap();

        assert_eq!(db.advance_day(2).unwrap(), Some(1));
        assert_eq!(db.advance_day(2).unwrap(), None);
        assert_eq!(DayMarker::get(&db).unwrap(), 2);
        assert_eq!(CountdownStore::get(&db, PostId(1)).unwrap().unwrap().days_left, 2);
    }

    #[test]
    fn advance_day_is_shared_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.sqlite3");
        let daemon = Database::open(&path).unwrap();
        let cli = Database::open(&path).unwrap();
        daemon.register(PostId(1), FeatureType::Community, 3).unwrap();

        assert_eq!(cli.advance_day(2).unwrap(), Some(1));
        assert_eq!(daemon.advance_day(2).unwrap(), None);
        assert_eq!(DayMarker::get(&daemon).unwrap(), 2);
        assert_eq!(
            CountdownStore::get(&daemon, PostId(1)).unwrap().unwrap().days_left,
            2
        );

        // The next day is claimed by whichever handle gets there first.
        assert_eq!(daemon.advance_day(3).unwrap(), Some(1));
        assert_eq!(cli.advance_day(3).unwrap(), None);
        assert_eq!(CountdownStore::get(&cli, PostId(1)).unwrap().unwrap().days_left, 1);
    }

    #[test]
    fn advance_day_on_empty_store_still_moves_marker() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.advance_day(5).unwrap(), Some(0));
        assert_eq!(DayMarker::get(&db).unwrap(), 5);
    }

    #[test]
    fn reopen_keeps_records_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.sqlite3");

        let db = Database::open(&path).unwrap();
        db.register(PostId(77), FeatureType::Local, 4).unwrap();
        db.set(3).unwrap();
        db.close().unwrap();

        let db = Database::open(&path).unwrap();
        let record = CountdownStore::get(&db, PostId(77)).unwrap().unwrap();
        assert_eq!(record.feature_type, FeatureType::Local);
        assert_eq!(record.days_left, 4);
        assert_eq!(DayMarker::get(&db).unwrap(), 3);
        assert_eq!(db.path(), Some(path.as_path()));
    }
}
