use chrono::{DateTime, Duration, TimeZone, Utc};

use super::test_db;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn upsert_same_title_keeps_one_row_with_last_written_time() {
    let db = test_db();
    db.upsert_title("Chatting", at(0)).unwrap();
    db.upsert_title("Chatting", at(60)).unwrap();

    assert_eq!(db.get_titles(10, 0).unwrap(), vec!["Chatting"]);
    assert_eq!(db.get_title_edit_time("Chatting").unwrap(), Some(at(60)));

    // Last write wins, even with an earlier clock reading.
    db.upsert_title("Chatting", at(30)).unwrap();
    assert_eq!(db.get_title_edit_time("Chatting").unwrap(), Some(at(30)));
    assert_eq!(db.get_titles(10, 0).unwrap(), vec!["Chatting"]);
}

#[test]
fn re_seen_title_moves_to_front_after_clock_step_back() {
    let db = test_db();
    db.upsert_title("A", at(100)).unwrap();
    db.upsert_title("B", at(50)).unwrap();
    // Clock stepped back: "B" is seen again at an earlier reading than "A".
    db.upsert_title("B", at(60)).unwrap();
    db.upsert_title("A", at(55)).unwrap();

    assert_eq!(db.get_titles(10, 0).unwrap(), vec!["B", "A"]);
}

#[test]
fn titles_are_newest_first_with_offset() {
    let db = test_db();
    db.upsert_title("Dota 2 grind", at(10)).unwrap();
    db.upsert_title("Chatting", at(20)).unwrap();
    db.upsert_title("Elden Ring Hype", at(30)).unwrap();
    db.upsert_title("Current title", at(40)).unwrap();

    assert_eq!(
        db.get_titles(3, 1).unwrap(),
        vec!["Elden Ring Hype", "Chatting", "Dota 2 grind"]
    );
    assert_eq!(db.get_titles(1, 3).unwrap(), vec!["Dota 2 grind"]);
    assert!(db.get_titles(1, 10).unwrap().is_empty());
}

#[test]
fn re_seen_title_moves_to_front() {
    let db = test_db();
    db.upsert_title("A", at(0)).unwrap();
    db.upsert_title("B", at(10)).unwrap();
    db.upsert_title("A", at(20)).unwrap();

    assert_eq!(db.get_titles(10, 0).unwrap(), vec!["A", "B"]);
}

#[test]
fn prune_keeps_row_exactly_at_cutoff() {
    let db = test_db();
    let now = at(100 * 86_400);
    let cutoff = now - Duration::days(30);

    db.upsert_title("too old", cutoff - Duration::milliseconds(1)).unwrap();
    db.upsert_title("boundary", cutoff).unwrap();
    db.upsert_title("fresh", now).unwrap();

    assert_eq!(db.delete_titles_older_than(cutoff).unwrap(), 1);
    assert_eq!(db.get_titles(10, 0).unwrap(), vec!["fresh", "boundary"]);

    // Running it again is a no-op.
    assert_eq!(db.delete_titles_older_than(cutoff).unwrap(), 0);
}
