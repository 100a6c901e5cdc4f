//! OAuth token storage, one active token per role. The newest row wins.
//!
//! Channel edits need the broadcaster's token; chat goes out as the bot
//! account. A deployment with a single account stores only the broadcaster
//! token and uses it for both.

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    Broadcaster,
    Bot,
}

impl TokenRole {
    pub const ALL: [TokenRole; 2] = [TokenRole::Broadcaster, TokenRole::Bot];

    pub fn as_str(self) -> &'static str {
        match self {
            TokenRole::Broadcaster => "broadcaster",
            TokenRole::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Twitch user the token was issued to; empty when unknown.
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_at: i64,
}

impl Database {
    pub fn save_token(&self, role: TokenRole, token: &Token) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tokens (role, user_id, access_token, refresh_token, scope, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    role.as_str(),
                    token.user_id,
                    token.access_token,
                    token.refresh_token,
                    token.scope,
                    token.expires_at
                ],
            )?;
            // Older rows of the same role are never read again.
            conn.execute(
                "DELETE FROM tokens
                 WHERE role = ?1 AND id < (SELECT MAX(id) FROM tokens WHERE role = ?1)",
                [role.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn get_latest_token(&self, role: TokenRole) -> Result<Option<Token>, DbError> {
        self.with_conn(|conn| {
            let token = conn
                .query_row(
                    "SELECT user_id, access_token, refresh_token, scope, expires_at
                     FROM tokens WHERE role = ?1 ORDER BY id DESC LIMIT 1",
                    [role.as_str()],
                    |row| {
                        Ok(Token {
                            user_id: row.get(0)?,
                            access_token: row.get(1)?,
                            refresh_token: row.get(2)?,
                            scope: row.get(3)?,
                            expires_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(token)
        })
    }

    pub fn delete_tokens(&self, role: TokenRole) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM tokens WHERE role = ?1", [role.as_str()])?;
            Ok(())
        })
    }
}
