//! Single-consumer sync actor.
//!
//! Every mutating sync operation is a message on one unbounded mailbox. The
//! loop runs each message to completion before taking the next, so mapping
//! writes never interleave. Callers await a oneshot reply; abandoning the wait
//! does not cancel the message.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::models::{IdMapping, Note};
use crate::services::DatabaseService;
use crate::util::unix_timestamp_now;

use super::config::ProviderConfig;
use super::error::{SyncError, SyncResult};
use super::provider::SyncProvider;
use super::reconciler::{notebook_name, Reconciler, SyncReport};

type Reply<T> = oneshot::Sender<SyncResult<T>>;

enum Command {
    CreateNote { note: Note, reply: Reply<()> },
    UpdateNote { note: Note, reply: Reply<()> },
    UpdateOrCreateNote { note: Note, reply: Reply<()> },
    DeleteNote { note: Note, reply: Reply<()> },
    MoveToBin { note: Note, reply: Reply<()> },
    RestoreNote { note: Note, reply: Reply<()> },
    Sync { reply: Reply<SyncReport> },
    Authenticate { reply: Reply<()> },
    IsServerCompatible { reply: Reply<()> },
}

impl Command {
    const fn name(&self) -> &'static str {
        match self {
            Self::CreateNote { .. } => "create_note",
            Self::UpdateNote { .. } => "update_note",
            Self::UpdateOrCreateNote { .. } => "update_or_create_note",
            Self::DeleteNote { .. } => "delete_note",
            Self::MoveToBin { .. } => "move_to_bin",
            Self::RestoreNote { .. } => "restore_note",
            Self::Sync { .. } => "sync",
            Self::Authenticate { .. } => "authenticate",
            Self::IsServerCompatible { .. } => "is_server_compatible",
        }
    }
}

struct Envelope {
    provider: SyncProvider,
    config: ProviderConfig,
    command: Command,
}

/// Cloneable sender side of the actor mailbox
#[derive(Clone)]
pub struct SyncActorHandle {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl SyncActorHandle {
    async fn request<T>(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> SyncResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope {
                provider,
                config,
                command: command(reply),
            })
            .map_err(|_| SyncError::Generic("sync actor has stopped".to_string()))?;

        response
            .await
            .map_err(|_| SyncError::Generic("sync actor dropped the request".to_string()))?
    }

    pub async fn create_note(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        note: Note,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::CreateNote { note, reply })
            .await
    }

    pub async fn update_note(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        note: Note,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::UpdateNote { note, reply })
            .await
    }

    pub async fn update_or_create_note(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        note: Note,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::UpdateOrCreateNote {
            note,
            reply,
        })
        .await
    }

    pub async fn delete_note(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        note: Note,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::DeleteNote { note, reply })
            .await
    }

    pub async fn move_to_bin(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        note: Note,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::MoveToBin { note, reply })
            .await
    }

    pub async fn restore_note(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
        note: Note,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::RestoreNote { note, reply })
            .await
    }

    pub async fn sync(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
    ) -> SyncResult<SyncReport> {
        self.request(provider, config, |reply| Command::Sync { reply })
            .await
    }

    pub async fn authenticate(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::Authenticate { reply })
            .await
    }

    pub async fn is_server_compatible(
        &self,
        provider: SyncProvider,
        config: ProviderConfig,
    ) -> SyncResult<()> {
        self.request(provider, config, |reply| Command::IsServerCompatible {
            reply,
        })
        .await
    }
}

/// Owner of the actor task.
///
/// Hand out [`SyncActorHandle`]s with [`SyncActor::handle`]; call
/// [`SyncActor::shutdown`] after dropping them to drain the mailbox.
pub struct SyncActor {
    handle: SyncActorHandle,
    task: JoinHandle<()>,
}

impl SyncActor {
    /// Start the message loop on the current tokio runtime
    pub fn spawn(db: DatabaseService) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            db,
            receiver,
            last_sync_finished: 0,
        };
        Self {
            handle: SyncActorHandle { sender },
            task: tokio::spawn(worker.run()),
        }
    }

    pub fn handle(&self) -> SyncActorHandle {
        self.handle.clone()
    }

    /// Close the mailbox and wait for queued messages to finish.
    ///
    /// Returns once every outstanding handle has been dropped.
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Err(error) = self.task.await {
            tracing::error!("Sync actor task failed: {}", error);
        }
    }
}

struct Worker {
    db: DatabaseService,
    receiver: mpsc::UnboundedReceiver<Envelope>,
    /// Unix seconds at which the last successful sync completed
    last_sync_finished: i64,
}

impl Worker {
    async fn run(mut self) {
        while let Some(envelope) = self.receiver.recv().await {
            self.handle(envelope).await;
        }
        tracing::debug!("Sync actor mailbox closed");
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope {
            provider,
            config,
            command,
        } = envelope;
        let name = command.name();
        tracing::debug!("Sync actor handling {} for {}", name, provider.kind());

        match command {
            Command::CreateNote { note, reply } => {
                respond(name, reply, self.create_note(&provider, &config, &note).await);
            }
            Command::UpdateNote { note, reply } => {
                respond(name, reply, self.update_note(&provider, &config, &note).await);
            }
            Command::UpdateOrCreateNote { note, reply } => {
                let result = self.update_or_create_note(&provider, &config, &note).await;
                respond(name, reply, result);
            }
            Command::DeleteNote { note, reply } => {
                respond(name, reply, self.delete_note(&provider, &config, &note).await);
            }
            Command::MoveToBin { note, reply } => {
                respond(name, reply, self.move_to_bin(&provider, &config, &note).await);
            }
            Command::RestoreNote { note, reply } => {
                respond(name, reply, self.restore_note(&provider, &config, &note).await);
            }
            Command::Sync { reply } => {
                respond(name, reply, self.sync(&provider, &config).await);
            }
            Command::Authenticate { reply } => {
                respond(name, reply, provider.authenticate(&config).await);
            }
            Command::IsServerCompatible { reply } => {
                respond(name, reply, provider.is_server_compatible(&config).await);
            }
        }
    }

    fn reject_stale(&self, note: &Note) -> SyncResult<()> {
        if note.modified_date <= self.last_sync_finished {
            tracing::warn!(
                "Rejecting update of note {} modified at {} (last sync finished at {})",
                note.id,
                note.modified_date,
                self.last_sync_finished
            );
            return Err(SyncError::MutationWhileSyncing);
        }
        Ok(())
    }

    async fn create_note(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        if !note.id.is_saved() {
            return Err(SyncError::Generic(
                "note must be saved before it can be synced".to_string(),
            ));
        }
        if !note.is_syncable() {
            return Ok(());
        }
        if self
            .db
            .get_mapping_by_local_id(note.id, provider.kind())
            .await?
            .is_some()
        {
            tracing::debug!("Note {} is already linked to {}", note.id, provider.kind());
            return Ok(());
        }
        self.push_new(provider, config, note).await
    }

    async fn push_new(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        let notebook = notebook_name(&self.db, note).await?;
        let remote = provider
            .create_note(note, notebook.as_deref(), config)
            .await?;
        self.db
            .assign_provider_to_note(&remote.to_mapping(note.id))
            .await?;
        Ok(())
    }

    async fn update_note(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        self.reject_stale(note)?;
        if note.is_local_only {
            return Ok(());
        }

        let Some(mapping) = self
            .db
            .get_mapping_by_local_id(note.id, provider.kind())
            .await?
        else {
            return Err(SyncError::Generic(format!(
                "note {} is not linked to {}",
                note.id,
                provider.kind()
            )));
        };

        let notebook = notebook_name(&self.db, note).await?;
        let remote = provider
            .update_note(note, notebook.as_deref(), config, &mapping)
            .await?;
        self.db
            .update_mappings(&[IdMapping {
                remote_note_id: Some(remote.id()),
                extras: Some(remote.token()),
                ..mapping
            }])
            .await?;
        Ok(())
    }

    async fn update_or_create_note(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        self.reject_stale(note)?;
        let linked = self
            .db
            .get_mapping_by_local_id(note.id, provider.kind())
            .await?
            .is_some();
        if linked {
            self.update_note(provider, config, note).await
        } else {
            self.create_note(provider, config, note).await
        }
    }

    async fn delete_note(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        let Some(mapping) = self
            .db
            .get_mapping_by_local_id(note.id, provider.kind())
            .await?
        else {
            return Ok(());
        };
        provider.delete_note(note, config, &mapping).await?;
        self.db.delete_mappings(&[mapping]).await?;
        Ok(())
    }

    async fn move_to_bin(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        let Some(mapping) = self
            .db
            .get_mapping_by_local_id(note.id, provider.kind())
            .await?
        else {
            return Ok(());
        };

        match provider.move_to_bin(note, config, &mapping).await {
            Err(SyncError::OperationNotSupported) => {
                tracing::debug!(
                    "{} has no bin, deleting note {} instead",
                    provider.kind(),
                    note.id
                );
                provider.delete_note(note, config, &mapping).await?;
                self.db.delete_mappings(&[mapping]).await?;
                Ok(())
            }
            result => result,
        }
    }

    async fn restore_note(
        &self,
        provider: &SyncProvider,
        config: &ProviderConfig,
        note: &Note,
    ) -> SyncResult<()> {
        if note.is_local_only {
            return Ok(());
        }

        let mapping = self
            .db
            .get_mapping_by_local_id(note.id, provider.kind())
            .await?;
        match mapping {
            Some(mapping) if provider.supports_bin() => {
                let remote = provider.restore_note(note, config, &mapping).await?;
                self.db
                    .update_mappings(&[IdMapping {
                        remote_note_id: Some(remote.id()),
                        extras: Some(remote.token()),
                        ..mapping
                    }])
                    .await?;
                Ok(())
            }
            Some(_) => Ok(()),
            None => self.push_new(provider, config, note).await,
        }
    }

    async fn sync(
        &mut self,
        provider: &SyncProvider,
        config: &ProviderConfig,
    ) -> SyncResult<SyncReport> {
        provider.is_server_compatible(config).await?;
        let report = Reconciler::new(&self.db, provider, config).run().await?;
        self.last_sync_finished = unix_timestamp_now();
        Ok(report)
    }
}

fn respond<T>(name: &str, reply: Reply<T>, result: SyncResult<T>) {
    if let Err(error) = &result {
        tracing::warn!("Sync {} failed: {}", name, error);
    }
    if reply.send(result).is_err() {
        tracing::debug!("Caller stopped waiting for {}", name);
    }
}
