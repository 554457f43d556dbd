//! Word Online adapter — Graph-style drive-items API.
//!
//! Remote documents are a heading-delimited text stream; the adapter maps
//! them to and from the canonical section model.

use super::{parse_modified, transport_err, ProviderAdapter, RemotePull};
use crate::credentials::CredentialManager;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use draftbridge_types::{CompanyId, ContentKind, DocumentContent, Provider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

const WORD_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Word Online specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordConfig {
    /// Base URL for the Graph-style API (e.g. `https://graph.microsoft.com/v1.0`).
    pub api_base_url: String,
}

impl Default for WordConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://graph.microsoft.com/v1.0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DriveItemMeta {
    #[serde(rename = "lastModifiedDateTime")]
    last_modified: String,
    #[serde(rename = "webUrl")]
    web_url: Option<String>,
}

/// Word Online adapter implementation.
pub struct WordOnlineAdapter {
    config: WordConfig,
    client: Client,
    credentials: Arc<CredentialManager>,
}

impl WordOnlineAdapter {
    /// Creates a new adapter sharing the given credential manager.
    #[must_use]
    pub fn new(config: WordConfig, credentials: Arc<CredentialManager>) -> Self {
        let client = Client::builder()
            .timeout(DOCUMENT_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            credentials,
        }
    }

    fn item_url(&self, remote_file_id: &str) -> String {
        format!(
            "{}/me/drive/items/{}",
            self.config.api_base_url,
            urlencoding::encode(remote_file_id)
        )
    }

    async fn metadata(&self, token: &str, remote_file_id: &str) -> SyncResult<DriveItemMeta> {
        let response = self
            .client
            .get(self.item_url(remote_file_id))
            .bearer_auth(token)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_err("metadata fetch failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "metadata fetch failed ({status}): {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| transport_err("failed to parse metadata", &e))
    }
}

#[async_trait]
impl ProviderAdapter for WordOnlineAdapter {
    fn provider(&self) -> Provider {
        Provider::Word
    }

    fn call_timeout(&self) -> Duration {
        DOCUMENT_TIMEOUT
    }

    async fn pull(&self, company_id: CompanyId, remote_file_id: &str) -> SyncResult<RemotePull> {
        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Word)
            .await?;

        let meta = self.metadata(&token, remote_file_id).await?;

        debug!(%company_id, remote_file_id, "pulling word document");

        let response = self
            .client
            .get(format!("{}/content", self.item_url(remote_file_id)))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| transport_err("content fetch failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "content fetch failed ({status}): {body}"
            )));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| transport_err("failed to read content body", &e))?;

        let content = DocumentContent::from_canonical(ContentKind::Sections, &raw)?;

        Ok(RemotePull {
            content,
            modified_at: parse_modified(&meta.last_modified)?,
        })
    }

    async fn push(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
        content: &DocumentContent,
    ) -> SyncResult<()> {
        if content.as_sections().is_none() {
            return Err(SyncError::Content(
                "word adapter requires section content".to_string(),
            ));
        }

        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Word)
            .await?;

        let body = content.canonical_text();
        debug!(%company_id, remote_file_id, bytes = body.len(), "pushing word document");

        let response = self
            .client
            .put(format!("{}/content", self.item_url(remote_file_id)))
            .bearer_auth(&token)
            .header("Content-Type", WORD_MIME)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_err("content push failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "content push failed ({status}): {body}"
            )));
        }

        info!(remote_file_id, "pushed word document");
        Ok(())
    }

    async fn resolve_view_url(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
    ) -> SyncResult<Option<String>> {
        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Word)
            .await?;
        let meta = self.metadata(&token, remote_file_id).await?;
        Ok(meta.web_url)
    }
}
