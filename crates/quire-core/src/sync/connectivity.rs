//! Network availability as seen by the sync gate.

use serde::{Deserialize, Serialize};

use crate::config::SyncMode;

/// Current network connection class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Offline,
    /// Mobile data or another connection billed by volume
    Metered,
    /// Wi-Fi, ethernet
    Unmetered,
}

impl NetworkStatus {
    /// Whether this connection satisfies the configured sync mode
    pub const fn allows(self, mode: SyncMode) -> bool {
        match (self, mode) {
            (Self::Offline, _) | (Self::Metered, SyncMode::WifiOnly) => false,
            (Self::Unmetered, _) | (Self::Metered, SyncMode::Always) => true,
        }
    }
}

/// Source of the current network status
pub trait ConnectivityMonitor: Send + Sync {
    fn status(&self) -> NetworkStatus;
}

/// A fixed status, for hosts that cannot observe the network
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub NetworkStatus);

impl ConnectivityMonitor for StaticConnectivity {
    fn status(&self) -> NetworkStatus {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_only_requires_unmetered() {
        assert!(NetworkStatus::Unmetered.allows(SyncMode::WifiOnly));
        assert!(!NetworkStatus::Metered.allows(SyncMode::WifiOnly));
        assert!(!NetworkStatus::Offline.allows(SyncMode::WifiOnly));
    }

    #[test]
    fn always_accepts_any_connection() {
        assert!(NetworkStatus::Unmetered.allows(SyncMode::Always));
        assert!(NetworkStatus::Metered.allows(SyncMode::Always));
        assert!(!NetworkStatus::Offline.allows(SyncMode::Always));
    }
}
