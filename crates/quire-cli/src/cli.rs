use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quire_core::config::SyncMode;
use quire_core::sync::NetworkStatus;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Local-first notes with Nextcloud or directory sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the sync preferences file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Network the sync gate should assume
    #[arg(long, global = true, value_enum, default_value_t = NetworkArg::Unmetered)]
    pub network: NetworkArg,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        #[arg(short, long)]
        title: Option<String>,
        /// Notebook to file the note under
        #[arg(short, long)]
        notebook: Option<String>,
        /// Keep the note on this device only
        #[arg(long)]
        local_only: bool,
        /// Note content
        content: Vec<String>,
    },
    /// List notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Show binned notes instead of active ones
        #[arg(long)]
        bin: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note in $EDITOR
    Edit {
        /// Note ID
        id: String,
    },
    /// Move a note to the bin
    Bin {
        /// Note ID
        id: String,
    },
    /// Restore a note from the bin
    Restore {
        /// Note ID
        id: String,
    },
    /// Permanently delete a note
    Delete {
        /// Note ID
        id: String,
    },
    /// Reconcile local notes with the configured provider
    Sync {
        /// Keep syncing on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Verify the configured credentials
    Auth,
    /// Check that the configured server speaks a supported API
    Check,
    /// Manage sync preferences
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current preferences (password redacted)
    Show,
    /// Sync with a Nextcloud Notes server
    Nextcloud {
        /// Instance URL, for example <https://cloud.example.com>
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: String,
        /// Falls back to `QUIRE_NEXTCLOUD_PASSWORD` when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sync with a local directory of text files
    Directory {
        /// Root directory for note files
        path: PathBuf,
    },
    /// Turn syncing off
    Disable,
    /// Choose when syncing may use the network
    Mode {
        #[arg(value_enum)]
        mode: SyncModeArg,
        /// Enable or disable background sync for `sync --watch`
        #[arg(long)]
        background: Option<bool>,
        /// Background sync interval in minutes
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum NetworkArg {
    Unmetered,
    Metered,
    Offline,
}

impl From<NetworkArg> for NetworkStatus {
    fn from(value: NetworkArg) -> Self {
        match value {
            NetworkArg::Unmetered => Self::Unmetered,
            NetworkArg::Metered => Self::Metered,
            NetworkArg::Offline => Self::Offline,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SyncModeArg {
    WifiOnly,
    Always,
}

impl From<SyncModeArg> for SyncMode {
    fn from(value: SyncModeArg) -> Self {
        match value {
            SyncModeArg::WifiOnly => Self::WifiOnly,
            SyncModeArg::Always => Self::Always,
        }
    }
}
