use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bot_db::Database;
use tokio::sync::Notify;

use super::management::*;
use super::meta::{ChannelUser, MetaCommands, UserDirectory};
use super::*;
use crate::tracker::tests::{MockChannel, MockChat, harness_with, seed_history};
use crate::tracker::{ChannelChange, UNCATEGORIZED_GAME_ID};

const HOME: &str = "1000";
const OWNER: &str = "1000";

struct MockUsers(HashMap<String, ChannelUser>);

impl MockUsers {
    fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(
            "gorgc".to_string(),
            ChannelUser {
                id: "2000".into(),
                login: "gorgc".into(),
            },
        );
        Self(users)
    }
}

#[async_trait]
impl UserDirectory for MockUsers {
    async fn find_user(&self, login: &str) -> Result<Option<ChannelUser>, BotError> {
        let login = login.trim_start_matches('@').to_lowercase();
        Ok(self.0.get(&login).cloned())
    }
}

struct Setup {
    router: CommandRouter,
    channel: Arc<MockChannel>,
    chat: Arc<MockChat>,
    db: Database,
    channels_changed: Arc<Notify>,
}

async fn setup_with(channel: MockChannel) -> Setup {
    let h = harness_with(channel).await;
    let channels_changed = Arc::new(Notify::new());
    let meta = MetaCommands::new(
        Arc::new(MockUsers::new()),
        h.db.clone(),
        channels_changed.clone(),
    );
    let router = CommandRouter::new("!".into(), OWNER.into(), h.tracker, meta, h.chat.clone());
    Setup {
        router,
        channel: h.channel,
        chat: h.chat,
        db: h.db,
        channels_changed,
    }
}

async fn setup() -> Setup {
    setup_with(MockChannel::with_info("Just Chatting", "Current title")).await
}

fn moderator() -> CommandContext {
    CommandContext {
        channel_id: HOME.into(),
        chatter_id: "3000".into(),
        chatter_login: "modguy".into(),
        is_moderator: true,
    }
}

fn viewer() -> CommandContext {
    CommandContext {
        is_moderator: false,
        chatter_id: "4000".into(),
        chatter_login: "viewer".into(),
        ..moderator()
    }
}

fn owner() -> CommandContext {
    CommandContext {
        chatter_id: OWNER.into(),
        chatter_login: "owner".into(),
        ..moderator()
    }
}

#[test]
fn parse_invocation_splits_name_and_rest() {
    let inv = parse_invocation("!", "  !Title   set  New stream ").unwrap();
    assert_eq!(inv.name, "title");
    assert_eq!(inv.rest, "set  New stream");

    let inv = parse_invocation("!", "!game").unwrap();
    assert_eq!(inv.name, "game");
    assert_eq!(inv.rest, "");

    assert!(parse_invocation("!", "hello !game").is_none());
    assert!(parse_invocation("!", "! game").is_none());
    assert!(parse_invocation("?", "!game").is_none());
}

#[tokio::test]
async fn plain_chat_is_ignored() {
    let mut s = setup().await;
    assert!(!s.router.handle_message(&moderator(), "hello there").await);
    assert!(!s.router.handle_message(&moderator(), "!unknown").await);
    assert!(s.chat.texts().is_empty());
}

#[tokio::test]
async fn game_query_replies_current_game() {
    let mut s = setup_with(MockChannel::with_info("", "Title")).await;
    assert!(s.router.handle_message(&viewer(), "!game").await);
    assert_eq!(s.chat.texts(), vec!["No game category"]);
}

#[tokio::test]
async fn viewer_cannot_change_game() {
    let mut s = setup().await;
    s.router.handle_message(&viewer(), "!game dota").await;
    assert_eq!(s.chat.texts(), vec![GAME_MODERATORS_ONLY]);
    assert!(s.channel.modifications().is_empty());
    assert!(s.channel.searches().is_empty());
}

#[tokio::test]
async fn moderator_changes_game_by_synonym() {
    let mut s = setup().await;
    s.router.handle_message(&moderator(), "!game dota").await;
    assert_eq!(s.chat.texts(), vec!["Changed game to \"Dota 2\""]);
    assert_eq!(
        s.channel.modifications(),
        vec![ChannelChange {
            game_id: Some("29595".into()),
            title: None,
        }]
    );
}

#[tokio::test]
async fn moderator_clears_game_without_search() {
    let mut s = setup().await;
    s.router.handle_message(&moderator(), "!game clear").await;
    assert_eq!(s.chat.texts(), vec!["Set game to \"No game category\""]);
    assert!(s.channel.searches().is_empty());
    assert_eq!(
        s.channel.modifications()[0].game_id.as_deref(),
        Some(UNCATEGORIZED_GAME_ID)
    );
}

#[tokio::test]
async fn unknown_game_reply() {
    let mut s = setup().await;
    s.router.handle_message(&moderator(), "!game Nonexistent").await;
    assert_eq!(s.chat.texts(), vec![GAME_NOT_FOUND]);
    assert!(s.channel.modifications().is_empty());
}

#[tokio::test]
async fn title_query_and_plain_set() {
    let mut s = setup().await;
    s.router.handle_message(&viewer(), "!title").await;
    s.router.handle_message(&moderator(), "!title Road to 10k").await;
    assert_eq!(
        s.chat.texts(),
        vec!["Current title", "Changed title to \"Road to 10k\""]
    );
    assert_eq!(
        s.channel.modifications()[0].title.as_deref(),
        Some("Road to 10k")
    );
}

#[tokio::test]
async fn title_set_subcommand() {
    let mut s = setup().await;
    s.router.handle_message(&moderator(), "!title set Ranked grind").await;
    s.router.handle_message(&moderator(), "!title set").await;
    assert_eq!(
        s.chat.texts(),
        vec!["Set title to \"Ranked grind\"", "Usage: !title set <text>"]
    );
    assert_eq!(s.channel.modifications().len(), 1);
}

#[tokio::test]
async fn viewer_cannot_touch_title() {
    let mut s = setup().await;
    for text in ["!title hi", "!title set hi", "!title restore", "!title history"] {
        s.router.handle_message(&viewer(), text).await;
    }
    assert_eq!(s.chat.texts(), vec![TITLE_MODERATORS_ONLY; 4]);
    assert!(s.channel.modifications().is_empty());
}

#[tokio::test]
async fn title_restore_reports_ordinal() {
    let mut s = setup().await;
    seed_history(
        &s.db,
        "Current title",
        &["Elden Ring Hype", "Chatting", "Dota 2 grind"],
    );

    s.router.handle_message(&moderator(), "!title restore").await;
    s.router.handle_message(&moderator(), "!title prev 3").await;
    s.router.handle_message(&moderator(), "!title previous 10").await;
    s.router.handle_message(&moderator(), "!title restore zero").await;

    assert_eq!(
        s.chat.texts(),
        vec![
            "Set the title to 1st in history: Elden Ring Hype",
            "Set the title to 3rd in history: Dota 2 grind",
            NO_SUCH_TITLE,
            "Usage: !title restore [offset]",
        ]
    );
    assert_eq!(s.channel.modifications().len(), 2);
}

#[tokio::test]
async fn title_history_lists_one_line_per_title() {
    let mut s = setup().await;
    s.router.handle_message(&moderator(), "!title history").await;
    assert_eq!(s.chat.texts(), vec![HISTORY_EMPTY]);

    seed_history(
        &s.db,
        "Current title",
        &["Elden Ring Hype", "Chatting", "Dota 2 grind"],
    );
    s.chat.sent.lock().unwrap().clear();
    s.router.handle_message(&moderator(), "!title history 2").await;
    assert_eq!(s.chat.texts(), vec!["1. Elden Ring Hype", "2. Chatting"]);
}

#[tokio::test]
async fn management_commands_only_work_in_home_channel() {
    let mut s = setup().await;
    let elsewhere = CommandContext {
        channel_id: "2000".into(),
        ..moderator()
    };
    assert!(!s.router.handle_message(&elsewhere, "!game dota").await);
    assert!(s.router.handle_message(&elsewhere, "!mmr").await);
    assert_eq!(s.chat.texts(), vec!["Not implemented yet!"]);
    assert_eq!(s.chat.sent.lock().unwrap()[0].0, "2000");
}

#[tokio::test]
async fn provider_failure_yields_generic_reply() {
    let mut channel = MockChannel::with_info("Just Chatting", "Current title");
    channel.fail_modify = true;
    let mut s = setup_with(channel).await;

    assert!(s.router.handle_message(&moderator(), "!title Broken").await);
    assert_eq!(s.chat.texts(), vec![GENERIC_FAILURE_REPLY]);
}

#[tokio::test]
async fn owner_adds_and_removes_channels() {
    let mut s = setup().await;
    s.router.handle_message(&owner(), "!channel_add @GorgC").await;
    assert_eq!(s.chat.texts(), vec!["Added the channel gorgc."]);
    let joined = s.db.list_joined_channels().unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].user_id, "2000");
    // A permit is stored when nobody is waiting yet.
    s.channels_changed.notified().await;

    s.router.handle_message(&owner(), "!channel_del gorgc").await;
    assert!(s.db.list_joined_channels().unwrap().is_empty());
    assert_eq!(s.chat.texts()[1], "Deleted the channel gorgc");
}

#[tokio::test]
async fn meta_commands_ignore_non_owners() {
    let mut s = setup().await;
    assert!(!s.router.handle_message(&moderator(), "!channel_add gorgc").await);
    assert!(s.db.list_joined_channels().unwrap().is_empty());
    assert!(s.chat.texts().is_empty());
}

#[tokio::test]
async fn channel_add_unknown_login() {
    let mut s = setup().await;
    s.router.handle_message(&owner(), "!channel_add nobody").await;
    assert_eq!(s.chat.texts(), vec!["Couldn't find a channel named nobody"]);
}

#[tokio::test]
async fn router_exposes_tracker_for_events() {
    let mut s = setup().await;
    assert_eq!(s.router.tracker().broadcaster_id(), HOME);
    s.router.handle_message(&moderator(), "!title set Bot title").await;
    assert_eq!(s.router.tracker().state().title_changed_at, crate::tracker::tests::t0());
}
