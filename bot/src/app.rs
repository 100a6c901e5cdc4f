use std::sync::Arc;

use bot_db::Database;
use tokio::sync::{Mutex, Notify, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use twitch_client::api::TwitchApiClient;

use crate::config::{AppConfig, SettingsManager};

/// Application state shared by the EventSub handler and background loops.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Application configuration (reloadable)
    config: RwLock<AppConfig>,
    db: Database,
    api: Arc<TwitchApiClient>,
    shutdown_token: CancellationToken,
    /// Notified when the joined channel set changes and EventSub must resubscribe.
    channels_changed: Arc<Notify>,
    eventsub_shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl SharedState {
    /// Create shared state from an already-opened database and loaded config.
    pub fn new(db: Database, config: AppConfig) -> Self {
        let api = Arc::new(TwitchApiClient::new(config.client_id.clone()));

        Self {
            inner: Arc::new(SharedStateInner {
                config: RwLock::new(config),
                db,
                api,
                shutdown_token: CancellationToken::new(),
                channels_changed: Arc::new(Notify::new()),
                eventsub_shutdown: Mutex::new(None),
            }),
        }
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn api(&self) -> &Arc<TwitchApiClient> {
        &self.inner.api
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    pub fn channels_changed(&self) -> &Arc<Notify> {
        &self.inner.channels_changed
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Reload config from the database.
    pub async fn reload_config(&self) -> Result<(), anyhow::Error> {
        let sm = SettingsManager::new(self.inner.db.clone());
        let mut config = self.inner.config.write().await;
        config.reload(&sm)?;
        Ok(())
    }

    /// Remember the stop handle of the running EventSub client.
    pub async fn set_eventsub_shutdown(&self, tx: mpsc::Sender<()>) {
        *self.inner.eventsub_shutdown.lock().await = Some(tx);
    }

    pub async fn take_eventsub_shutdown(&self) -> Option<mpsc::Sender<()>> {
        self.inner.eventsub_shutdown.lock().await.take()
    }
}
