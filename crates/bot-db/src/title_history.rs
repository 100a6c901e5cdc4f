//! Stream title history.
//!
//! One row per distinct title; `edit_time` is the last time the channel
//! switched to it, stored as unix milliseconds (UTC).

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use crate::{Database, DbError};

impl Database {
    /// Record `title` as seen at `edit_time`.
    ///
    /// An existing row keeps a single entry and takes the new edit time.
    pub fn upsert_title(&self, title: &str, edit_time: DateTime<Utc>) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO title_history (title, edit_time) VALUES (?1, ?2)
                 ON CONFLICT(title) DO UPDATE SET edit_time = excluded.edit_time",
                rusqlite::params![title, edit_time.timestamp_millis()],
            )?;
            Ok(())
        })
    }

    /// Titles ordered newest first, skipping `offset` rows.
    pub fn get_titles(&self, limit: u32, offset: u32) -> Result<Vec<String>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT title FROM title_history
                 ORDER BY edit_time DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![limit, offset], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
        })
    }

    pub fn get_title_edit_time(&self, title: &str) -> Result<Option<DateTime<Utc>>, DbError> {
        let millis: Option<i64> = self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT edit_time FROM title_history WHERE title = ?1",
                    [title],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })?;

        millis
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| DbError::InvalidData(format!("edit_time out of range: {ms}")))
            })
            .transpose()
    }

    /// Delete titles last seen strictly before `cutoff`. Returns the number removed.
    pub fn delete_titles_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM title_history WHERE edit_time < ?1",
                [cutoff.timestamp_millis()],
            )?;
            Ok(removed)
        })
    }
}
