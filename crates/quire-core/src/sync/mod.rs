//! Sync engine: providers, reconciliation, the serializing actor and the
//! precondition-checking manager.

mod actor;
mod config;
mod connectivity;
mod error;
mod file_storage;
mod manager;
mod nextcloud;
mod provider;
mod reconciler;

pub use actor::{SyncActor, SyncActorHandle};
pub use config::{CloudConfig, DirectoryConfig, ProviderConfig};
pub use connectivity::{ConnectivityMonitor, NetworkStatus, StaticConnectivity};
pub use error::{SyncError, SyncResult};
pub use file_storage::{FileMetadata, FileNote, FileStorageProvider};
pub use manager::{FallbackCallback, SyncManager};
pub use nextcloud::{NextcloudNote, NextcloudProvider};
pub use provider::{Comparison, RemoteNote, SyncProvider};
pub use reconciler::SyncReport;
