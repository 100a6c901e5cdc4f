//! Extra channels whose chat the bot reads besides the home channel.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinedChannel {
    pub user_id: String,
    pub user_name: String,
    pub added_at: i64,
}

impl Database {
    /// Add a channel. Returns `false` if it was already joined (its name is refreshed).
    pub fn add_joined_channel(&self, user_id: &str, user_name: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO joined_channels (user_id, user_name, added_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                rusqlite::params![user_id, user_name, Utc::now().timestamp()],
            )?;
            if inserted == 0 {
                conn.execute(
                    "UPDATE joined_channels SET user_name = ?2 WHERE user_id = ?1",
                    rusqlite::params![user_id, user_name],
                )?;
            }
            Ok(inserted > 0)
        })
    }

    /// Remove a channel. Returns `false` if it was not joined.
    pub fn remove_joined_channel(&self, user_id: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM joined_channels WHERE user_id = ?1", [user_id])?;
            Ok(removed > 0)
        })
    }

    pub fn list_joined_channels(&self) -> Result<Vec<JoinedChannel>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, user_name, added_at FROM joined_channels ORDER BY added_at, user_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(JoinedChannel {
                    user_id: row.get(0)?,
                    user_name: row.get(1)?,
                    added_at: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }
}
