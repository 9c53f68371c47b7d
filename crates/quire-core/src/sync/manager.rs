//! Sync façade used by the application.
//!
//! Each call snapshots the preferences, checks that sync is enabled, that a
//! valid provider config can be built and that the network suits the sync
//! mode, and only then forwards the request to the actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::PreferencesSource;
use crate::models::{Note, ProviderKind};

use super::actor::SyncActorHandle;
use super::config::ProviderConfig;
use super::connectivity::ConnectivityMonitor;
use super::error::{SyncError, SyncResult};
use super::file_storage::FileStorageProvider;
use super::nextcloud::NextcloudProvider;
use super::provider::SyncProvider;
use super::reconciler::SyncReport;

/// Invoked with the error whenever a precondition short-circuits a request
pub type FallbackCallback = Arc<dyn Fn(&SyncError) + Send + Sync>;

#[derive(Clone)]
pub struct SyncManager {
    actor: SyncActorHandle,
    preferences: Arc<dyn PreferencesSource>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    nextcloud: NextcloudProvider,
    file_storage: FileStorageProvider,
    fallback: Option<FallbackCallback>,
}

impl SyncManager {
    pub fn new(
        actor: SyncActorHandle,
        preferences: Arc<dyn PreferencesSource>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> SyncResult<Self> {
        Ok(Self {
            actor,
            preferences,
            connectivity,
            nextcloud: NextcloudProvider::new()?,
            file_storage: FileStorageProvider::new(),
            fallback: None,
        })
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Fn(&SyncError) + Send + Sync + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    fn provider(&self, kind: ProviderKind) -> SyncProvider {
        match kind {
            ProviderKind::Nextcloud => SyncProvider::Nextcloud(self.nextcloud.clone()),
            ProviderKind::FileStorage => SyncProvider::FileStorage(self.file_storage),
        }
    }

    fn check_preconditions(
        &self,
        override_config: Option<ProviderConfig>,
    ) -> SyncResult<(SyncProvider, ProviderConfig)> {
        let preferences = self.preferences.preferences();
        let kind = preferences
            .provider_kind()
            .ok_or(SyncError::SyncingNotEnabled)?;

        let config = override_config
            .or_else(|| ProviderConfig::from_preferences(&preferences))
            .ok_or_else(|| SyncError::InvalidConfig(format!("{kind} settings are incomplete")))?;
        if config.provider() != kind {
            return Err(SyncError::InvalidConfig(format!(
                "{} configuration supplied while {kind} is selected",
                config.provider()
            )));
        }

        let status = self.connectivity.status();
        if !status.allows(preferences.sync_mode) {
            tracing::debug!(
                "Network {:?} does not allow {:?} sync",
                status,
                preferences.sync_mode
            );
            return Err(SyncError::NoConnectivity);
        }

        Ok((self.provider(kind), config))
    }

    fn gate(
        &self,
        operation: &str,
        override_config: Option<ProviderConfig>,
    ) -> SyncResult<(SyncProvider, ProviderConfig)> {
        self.check_preconditions(override_config)
            .inspect_err(|error| {
                tracing::debug!("Skipping {}: {}", operation, error);
                if let Some(fallback) = &self.fallback {
                    fallback(error);
                }
            })
    }

    /// Run a full two-way sync
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let (provider, config) = self.gate("sync", None)?;
        self.actor.sync(provider, config).await
    }

    pub async fn create_note(&self, note: &Note) -> SyncResult<()> {
        let (provider, config) = self.gate("create_note", None)?;
        self.actor.create_note(provider, config, note.clone()).await
    }

    pub async fn update_note(&self, note: &Note) -> SyncResult<()> {
        let (provider, config) = self.gate("update_note", None)?;
        self.actor.update_note(provider, config, note.clone()).await
    }

    /// Update the remote copy if the note is linked, create it otherwise
    pub async fn update_or_create(&self, note: &Note) -> SyncResult<()> {
        let (provider, config) = self.gate("update_or_create", None)?;
        self.actor
            .update_or_create_note(provider, config, note.clone())
            .await
    }

    pub async fn delete_note(&self, note: &Note) -> SyncResult<()> {
        let (provider, config) = self.gate("delete_note", None)?;
        self.actor.delete_note(provider, config, note.clone()).await
    }

    pub async fn move_note_to_bin(&self, note: &Note) -> SyncResult<()> {
        let (provider, config) = self.gate("move_note_to_bin", None)?;
        self.actor.move_to_bin(provider, config, note.clone()).await
    }

    pub async fn restore_note(&self, note: &Note) -> SyncResult<()> {
        let (provider, config) = self.gate("restore_note", None)?;
        self.actor.restore_note(provider, config, note.clone()).await
    }

    /// Check credentials; `config` overrides the one built from preferences
    pub async fn authenticate(&self, config: Option<ProviderConfig>) -> SyncResult<()> {
        let (provider, config) = self.gate("authenticate", config)?;
        self.actor.authenticate(provider, config).await
    }

    /// Check protocol support; `config` overrides the one built from preferences
    pub async fn is_server_compatible(&self, config: Option<ProviderConfig>) -> SyncResult<()> {
        let (provider, config) = self.gate("is_server_compatible", config)?;
        self.actor.is_server_compatible(provider, config).await
    }

    /// Sync every `interval` while background sync is switched on.
    ///
    /// The task runs until aborted; it holds an actor handle, so abort it
    /// before shutting the actor down.
    pub fn spawn_background_sync(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !manager.preferences.preferences().background_sync {
                    continue;
                }
                match manager.sync().await {
                    Ok(report) => tracing::debug!("Background sync finished: {:?}", report),
                    Err(error) => tracing::warn!("Background sync failed: {}", error),
                }
            }
        })
    }
}
