//! SQLite-based record storage.
//!
//! Persists finished recordings. The live session never touches the
//! database until the commit on finish.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, RecordStore};
use crate::error::StoreError;
use crate::recording::Record;

/// SQLite database for finished records.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/actrec/actrec.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .join("actrec.db");
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                activity_id   INTEGER NOT NULL,
                category_id   INTEGER NOT NULL,
                started_at    TEXT NOT NULL,
                finished_at   TEXT,
                elapsed_secs  INTEGER NOT NULL DEFAULT 0,
                repetitions   INTEGER NOT NULL DEFAULT 0,
                distance_m    REAL NOT NULL DEFAULT 0,
                max_speed_ms  REAL NOT NULL DEFAULT 0,
                note          TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_records_activity ON records(activity_id);
            CREATE INDEX IF NOT EXISTS idx_records_category ON records(category_id);
            CREATE INDEX IF NOT EXISTS idx_records_started_at ON records(started_at);",
        )?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<Record>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, activity_id, category_id, started_at, finished_at, elapsed_secs,
                        repetitions, distance_m, max_speed_ms, note
                 FROM records WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_by_activity(&self, activity_id: i64) -> Result<u64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE activity_id = ?1",
            params![activity_id],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let started_at: String = row.get(3)?;
    let finished_at: Option<String> = row.get(4)?;
    Ok(Record {
        id: Some(row.get(0)?),
        activity_id: row.get(1)?,
        category_id: row.get(2)?,
        started_at: parse_time(3, &started_at)?,
        finished_at: finished_at.map(|t| parse_time(4, &t)).transpose()?,
        elapsed_secs: row.get(5)?,
        repetitions: row.get(6)?,
        distance_m: row.get(7)?,
        max_speed_ms: row.get(8)?,
        note: row.get(9)?,
    })
}

impl RecordStore for Database {
    fn insert(&mut self, record: &Record) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO records (activity_id, category_id, started_at, finished_at,
                                  elapsed_secs, repetitions, distance_m, max_speed_ms, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.activity_id,
                record.category_id,
                record.started_at.to_rfc3339(),
                record.finished_at.map(|t| t.to_rfc3339()),
                record.elapsed_secs,
                record.repetitions,
                record.distance_m,
                record.max_speed_ms,
                record.note,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, record: &Record) -> Result<(), StoreError> {
        let id = record
            .id
            .ok_or_else(|| StoreError::QueryFailed("record has no id".into()))?;
        let changed = self.conn.execute(
            "UPDATE records SET activity_id = ?2, category_id = ?3, started_at = ?4,
                    finished_at = ?5, elapsed_secs = ?6, repetitions = ?7,
                    distance_m = ?8, max_speed_ms = ?9, note = ?10
             WHERE id = ?1",
            params![
                id,
                record.activity_id,
                record.category_id,
                record.started_at.to_rfc3339(),
                record.finished_at.map(|t| t.to_rfc3339()),
                record.elapsed_secs,
                record.repetitions,
                record.distance_m,
                record.max_speed_ms,
                record.note,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn remove_by_activity(&mut self, activity_id: i64) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM records WHERE activity_id = ?1",
            params![activity_id],
        )?)
    }

    fn remove_by_category(&mut self, category_id: i64) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM records WHERE category_id = ?1",
            params![category_id],
        )?)
    }

    fn remove_all(&mut self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM records", [])?)
    }

    fn list(&self) -> Result<Vec<Record>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, activity_id, category_id, started_at, finished_at, elapsed_secs,
                    repetitions, distance_m, max_speed_ms, note
             FROM records
             ORDER BY started_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
