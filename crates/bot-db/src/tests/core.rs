use super::test_db;
use crate::tokens::{Token, TokenRole};

#[test]
fn test_open_and_migrate() {
    let db = test_db();
    let settings = db.get_all_settings().unwrap();
    assert!(settings.is_empty());
    assert!(db.get_titles(10, 0).unwrap().is_empty());
    assert!(db.list_joined_channels().unwrap().is_empty());
}

#[test]
fn test_settings_crud() {
    let db = test_db();
    db.set_setting("COMMAND_PREFIX", "!", "normal").unwrap();
    assert_eq!(db.get_setting("COMMAND_PREFIX").unwrap(), Some("!".into()));

    db.set_setting("COMMAND_PREFIX", "?", "normal").unwrap();
    assert_eq!(db.get_setting("COMMAND_PREFIX").unwrap(), Some("?".into()));
    assert_eq!(db.get_all_settings().unwrap().len(), 1);

    db.delete_setting("COMMAND_PREFIX").unwrap();
    assert_eq!(db.get_setting("COMMAND_PREFIX").unwrap(), None);
}

#[test]
fn test_tokens_keep_latest_only() {
    let db = test_db();
    assert!(db.get_latest_token(TokenRole::Broadcaster).unwrap().is_none());

    let mut token = token("100", "abc");
    db.save_token(TokenRole::Broadcaster, &token).unwrap();
    token.access_token = "xyz".into();
    db.save_token(TokenRole::Broadcaster, &token).unwrap();

    let got = db.get_latest_token(TokenRole::Broadcaster).unwrap().unwrap();
    assert_eq!(got.access_token, "xyz");
    assert_eq!(got.user_id, "100");

    let rows: i64 = db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tokens", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(rows, 1);

    db.delete_tokens(TokenRole::Broadcaster).unwrap();
    assert!(db.get_latest_token(TokenRole::Broadcaster).unwrap().is_none());
}

#[test]
fn test_tokens_are_kept_per_role() {
    let db = test_db();
    db.save_token(TokenRole::Broadcaster, &token("100", "streamer"))
        .unwrap();
    db.save_token(TokenRole::Bot, &token("200", "bot-1")).unwrap();
    db.save_token(TokenRole::Bot, &token("200", "bot-2")).unwrap();

    let broadcaster = db.get_latest_token(TokenRole::Broadcaster).unwrap().unwrap();
    let bot = db.get_latest_token(TokenRole::Bot).unwrap().unwrap();
    assert_eq!(broadcaster.access_token, "streamer");
    assert_eq!(bot.access_token, "bot-2");
    assert_eq!(bot.user_id, "200");

    db.delete_tokens(TokenRole::Bot).unwrap();
    assert!(db.get_latest_token(TokenRole::Bot).unwrap().is_none());
    assert!(db.get_latest_token(TokenRole::Broadcaster).unwrap().is_some());
}

#[test]
fn test_legacy_tokens_table_gains_user_id_and_role() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tokens (
            id INTEGER PRIMARY KEY,
            access_token TEXT NOT NULL,
            refresh_token TEXT NOT NULL DEFAULT '',
            scope TEXT NOT NULL DEFAULT '',
            expires_at INTEGER NOT NULL DEFAULT 0
        );
        INSERT INTO tokens (access_token) VALUES ('old');",
    )
    .unwrap();

    crate::schema::run_migrations(&conn).unwrap();

    let (user_id, role): (String, String) = conn
        .query_row("SELECT user_id, role FROM tokens", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .unwrap();
    assert_eq!(user_id, "");
    assert_eq!(role, "broadcaster");
}

fn token(user_id: &str, access_token: &str) -> Token {
    Token {
        user_id: user_id.into(),
        access_token: access_token.into(),
        refresh_token: "refresh".into(),
        scope: "channel:manage:broadcast".into(),
        expires_at: 9_999_999,
    }
}
