//! Nextcloud Notes REST provider (API v1).

use std::time::Duration;

use reqwest::header::{ACCEPT, IF_MATCH};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{IdMapping, Note};

use super::config::CloudConfig;
use super::error::{SyncError, SyncResult};

const NOTES_API_PATH: &str = "/index.php/apps/notes/api/v1/notes";
const CAPABILITIES_PATH: &str = "/ocs/v2.php/cloud/capabilities?format=json";
const MIN_API_MAJOR_VERSION: u32 = 1;
const HTTP_TIMEOUT_SECS: u64 = 30;

/// A note as served by the Nextcloud Notes API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextcloudNote {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub etag: String,
    /// Unix seconds
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub favorite: bool,
}

impl NextcloudNote {
    pub(crate) fn from_local(note: &Note, notebook: Option<&str>, old: Option<&Self>) -> Self {
        Self {
            id: old.map_or(0, |old| old.id),
            etag: old.map(|old| old.etag.clone()).unwrap_or_default(),
            modified: note.modified_date,
            title: note.title.clone(),
            category: notebook.unwrap_or_default().to_string(),
            content: note.body_text(),
            favorite: note.is_pinned,
        }
    }

    pub(crate) fn to_local_note(&self, old: Option<&Note>) -> Note {
        let mut note = old.cloned().unwrap_or_else(|| Note {
            creation_date: self.modified,
            ..Note::new(String::new(), String::new())
        });
        note.title.clone_from(&self.title);
        note.set_body_text(&self.content);
        note.is_pinned = self.favorite;
        note.modified_date = self.modified;
        note
    }
}

/// Request body for create and update calls
#[derive(Debug, Serialize)]
struct NotePayload<'a> {
    title: &'a str,
    content: &'a str,
    category: &'a str,
    favorite: bool,
    modified: i64,
}

impl<'a> From<&'a NextcloudNote> for NotePayload<'a> {
    fn from(note: &'a NextcloudNote) -> Self {
        Self {
            title: &note.title,
            content: &note.content,
            category: &note.category,
            favorite: note.favorite,
            modified: note.modified,
        }
    }
}

/// HTTP client for the Nextcloud Notes API
#[derive(Debug, Clone)]
pub struct NextcloudProvider {
    client: reqwest::Client,
}

impl NextcloudProvider {
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub const fn supports_bin(&self) -> bool {
        false
    }

    fn request(&self, method: Method, url: &str, config: &CloudConfig) -> RequestBuilder {
        config.auth_headers.iter().fold(
            self.client
                .request(method, url)
                .header(ACCEPT, "application/json"),
            |request, (name, value)| request.header(name.as_str(), value.as_str()),
        )
    }

    fn notes_url(config: &CloudConfig) -> String {
        format!("{}{NOTES_API_PATH}", config.remote_address)
    }

    fn note_url(config: &CloudConfig, mapping: &IdMapping) -> SyncResult<String> {
        let remote_id = mapping
            .remote_note_id
            .as_deref()
            .ok_or_else(|| SyncError::Generic("mapping has no remote note id".to_string()))?;
        Ok(format!("{}/{remote_id}", Self::notes_url(config)))
    }

    pub async fn get_all(&self, config: &CloudConfig) -> SyncResult<Vec<NextcloudNote>> {
        let response = self
            .request(Method::GET, &Self::notes_url(config), config)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn create_note(
        &self,
        remote: &NextcloudNote,
        config: &CloudConfig,
    ) -> SyncResult<NextcloudNote> {
        let response = self
            .request(Method::POST, &Self::notes_url(config), config)
            .json(&NotePayload::from(remote))
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn update_note(
        &self,
        remote: &NextcloudNote,
        config: &CloudConfig,
        mapping: &IdMapping,
    ) -> SyncResult<NextcloudNote> {
        let mut request = self
            .request(Method::PUT, &Self::note_url(config, mapping)?, config)
            .json(&NotePayload::from(remote));
        if let Some(etag) = mapping.extras.as_deref().filter(|etag| !etag.is_empty()) {
            request = request.header(IF_MATCH, format!("\"{etag}\""));
        }

        let response = request.send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn delete_note(
        &self,
        _note: &Note,
        config: &CloudConfig,
        mapping: &IdMapping,
    ) -> SyncResult<()> {
        let response = self
            .request(Method::DELETE, &Self::note_url(config, mapping)?, config)
            .send()
            .await?;
        // Already gone is as good as deleted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    pub fn move_to_bin(
        &self,
        _note: &Note,
        _config: &CloudConfig,
        _mapping: &IdMapping,
    ) -> SyncResult<()> {
        Err(SyncError::OperationNotSupported)
    }

    pub fn restore_note(
        &self,
        _note: &Note,
        _config: &CloudConfig,
        _mapping: &IdMapping,
    ) -> SyncResult<NextcloudNote> {
        Err(SyncError::OperationNotSupported)
    }

    /// Cheapest authenticated call: list notes without their bodies
    pub async fn authenticate(&self, config: &CloudConfig) -> SyncResult<()> {
        let response = self
            .request(Method::GET, &Self::notes_url(config), config)
            .query(&[("exclude", "content")])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn is_server_compatible(&self, config: &CloudConfig) -> SyncResult<()> {
        let url = format!("{}{CAPABILITIES_PATH}", config.remote_address);
        let response = self
            .request(Method::GET, &url, config)
            .header("OCS-APIRequest", "true")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::ServerNotSupported);
        }

        let capabilities = ensure_success(response).await?.json::<Value>().await?;
        let versions = notes_api_versions(&capabilities);
        tracing::debug!("Server advertises notes API versions {:?}", versions);

        if versions
            .iter()
            .filter_map(|version| major_version(version))
            .any(|major| major >= MIN_API_MAJOR_VERSION)
        {
            Ok(())
        } else {
            Err(SyncError::ServerNotSupported)
        }
    }
}

async fn ensure_success(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::from_status(status, &body))
}

/// `ocs.data.capabilities.notes.api_version` is either a string or a list
fn notes_api_versions(capabilities: &Value) -> Vec<String> {
    match capabilities.pointer("/ocs/data/capabilities/notes/api_version") {
        Some(Value::String(version)) => vec![version.clone()],
        Some(Value::Array(versions)) => versions
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn major_version(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteId, ProviderKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn api_versions_accept_string_or_list() {
        let single = json!({"ocs": {"data": {"capabilities": {"notes": {"api_version": "1.3"}}}}});
        assert_eq!(notes_api_versions(&single), vec!["1.3".to_string()]);

        let list = json!({"ocs": {"data": {"capabilities": {"notes": {"api_version": ["0.2", "1.2"]}}}}});
        assert_eq!(notes_api_versions(&list), vec!["0.2", "1.2"]);

        let missing = json!({"ocs": {"data": {"capabilities": {}}}});
        assert!(notes_api_versions(&missing).is_empty());
    }

    #[test]
    fn major_version_parsing() {
        assert_eq!(major_version("1.3"), Some(1));
        assert_eq!(major_version("0.2"), Some(0));
        assert_eq!(major_version("v1"), None);
    }

    #[test]
    fn local_projection_keeps_local_state() {
        let mut old = Note::new("old", "old body");
        old.id = NoteId::new(4);
        old.is_local_only = false;
        old.tags = vec!["kept".to_string()];

        let remote = NextcloudNote {
            id: 9,
            etag: "abc".to_string(),
            modified: 500,
            title: "new".to_string(),
            category: "Work".to_string(),
            content: "new body".to_string(),
            favorite: true,
        };
        let note = remote.to_local_note(Some(&old));

        assert_eq!(note.id, NoteId::new(4));
        assert_eq!(note.title, "new");
        assert_eq!(note.content, "new body");
        assert!(note.is_pinned);
        assert_eq!(note.modified_date, 500);
        assert_eq!(note.tags, vec!["kept".to_string()]);
    }

    #[test]
    fn remote_projection_uses_local_modified_date() {
        let mut note = Note::new("title", "");
        note.is_list = true;
        note.set_body_text("- [x] one");
        note.modified_date = 77;

        let old = NextcloudNote {
            id: 3,
            etag: "e1".to_string(),
            ..NextcloudNote::default()
        };
        let remote = NextcloudNote::from_local(&note, Some("Home"), Some(&old));
        assert_eq!(remote.id, 3);
        assert_eq!(remote.etag, "e1");
        assert_eq!(remote.modified, 77);
        assert_eq!(remote.category, "Home");
        assert_eq!(remote.content, "- [x] one");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_server_is_no_connectivity() {
        let provider = NextcloudProvider::new().unwrap();
        let config = CloudConfig::with_basic_auth("http://127.0.0.1:1", "alice", "secret");

        assert_eq!(
            provider.get_all(&config).await,
            Err(SyncError::NoConnectivity)
        );
        let mapping = IdMapping::new(NoteId::new(1), "5", ProviderKind::Nextcloud, None);
        assert_eq!(
            provider
                .delete_note(&Note::new("a", "b"), &config, &mapping)
                .await,
            Err(SyncError::NoConnectivity)
        );
    }

    #[test]
    fn bin_operations_are_not_supported() {
        let provider = NextcloudProvider::new().unwrap();
        let config = CloudConfig::with_basic_auth("https://cloud.example.com", "alice", "secret");
        let mapping = IdMapping::new(NoteId::new(1), "5", ProviderKind::Nextcloud, None);
        let note = Note::new("a", "b");

        assert_eq!(
            provider.move_to_bin(&note, &config, &mapping),
            Err(SyncError::OperationNotSupported)
        );
        assert_eq!(
            provider.restore_note(&note, &config, &mapping),
            Err(SyncError::OperationNotSupported)
        );
    }
}
