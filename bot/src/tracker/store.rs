use async_trait::async_trait;
use bot_db::Database;
use chrono::{DateTime, Utc};

use super::TitleHistoryStore;
use crate::error::BotError;

#[async_trait]
impl TitleHistoryStore for Database {
    async fn upsert_title(&self, title: &str, edit_time: DateTime<Utc>) -> Result<(), BotError> {
        Ok(Database::upsert_title(self, title, edit_time)?)
    }

    async fn query_titles(&self, limit: u32, offset: u32) -> Result<Vec<String>, BotError> {
        Ok(self.get_titles(limit, offset)?)
    }

    async fn delete_titles_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, BotError> {
        Ok(Database::delete_titles_older_than(self, cutoff)?)
    }
}
