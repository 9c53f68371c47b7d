//! Sync result taxonomy.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::util::compact_text;

/// Why a sync operation did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("No network connection suitable for syncing")]
    NoConnectivity,
    #[error("Syncing is not enabled")]
    SyncingNotEnabled,
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),
    #[error("The server does not support a compatible notes API")]
    ServerNotSupported,
    #[error("Authentication failed")]
    Unauthorized,
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },
    #[error("Operation not supported by this provider")]
    OperationNotSupported,
    #[error("Sync failed: {0}")]
    Generic(String),
    #[error("Note changed before the last sync finished")]
    MutationWhileSyncing,
}

/// Result of a sync operation; `Ok` is success carrying the operation's payload
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Build the error for a non-success HTTP response
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return Self::Unauthorized;
        }
        Self::Api {
            code: status.as_u16(),
            message: parse_api_message(status, body),
        }
    }
}

impl From<crate::Error> for SyncError {
    fn from(error: crate::Error) -> Self {
        Self::Generic(error.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        Self::Generic(error.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::Generic(error.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            return Self::NoConnectivity;
        }
        if let Some(status) = error.status() {
            return Self::from_status(status, "");
        }
        Self::Generic(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        trimmed
    }
}
