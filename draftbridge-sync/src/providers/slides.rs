//! Slide-deck adapter — Graph-style presentation API.
//!
//! Each slide maps to one named section: the slide title (or a positional
//! `Slide N` name) keys the section, the section body carries the slide
//! body text with speaker notes in a trailing `[Notes]` block.

use super::{parse_modified, transport_err, ProviderAdapter, RemotePull};
use crate::credentials::CredentialManager;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use draftbridge_types::{CompanyId, DocumentContent, Provider};
use indexmap::IndexMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DECK_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

const DECK_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Delimiter between a slide's body text and its speaker notes inside a
/// section body.
const NOTES_DELIMITER: &str = "\n\n[Notes]\n";

/// Slide-deck specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidesConfig {
    /// Base URL for the Graph-style API (e.g. `https://graph.microsoft.com/v1.0`).
    pub api_base_url: String,
}

impl Default for SlidesConfig {
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

#[derive(Debug, Deserialize)]
struct SlideList {
    #[serde(default)]
    value: Vec<SlideData>,
}

#[derive(Debug, Deserialize)]
struct SlideData {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    shapes: Vec<SlideShape>,
    #[serde(default)]
    notes: Option<SlideNotes>,
}

#[derive(Debug, Deserialize)]
struct SlideShape {
    #[serde(rename = "type", default)]
    shape_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "textFrame", default)]
    text_frame: Option<TextFrame>,
}

#[derive(Debug, Deserialize)]
struct SlideNotes {
    #[serde(rename = "textFrame", default)]
    text_frame: Option<TextFrame>,
}

#[derive(Debug, Default, Deserialize)]
struct TextFrame {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    text: String,
}

/// Slide-deck adapter implementation.
pub struct SlideDeckAdapter {
    config: SlidesConfig,
    client: Client,
    credentials: Arc<CredentialManager>,
}

impl SlideDeckAdapter {
    /// Creates a new adapter sharing the given credential manager.
    #[must_use]
    pub fn new(config: SlidesConfig, credentials: Arc<CredentialManager>) -> Self {
        let client = Client::builder()
            .timeout(DECK_TIMEOUT)
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
impl ProviderAdapter for SlideDeckAdapter {
    fn provider(&self) -> Provider {
        Provider::Slides
    }

    fn call_timeout(&self) -> Duration {
        DECK_TIMEOUT
    }

    async fn pull(&self, company_id: CompanyId, remote_file_id: &str) -> SyncResult<RemotePull> {
        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Slides)
            .await?;

        let meta = self.metadata(&token, remote_file_id).await?;

        debug!(%company_id, remote_file_id, "pulling slide deck");

        let response = self
            .client
            .get(format!("{}/presentation/slides", self.item_url(remote_file_id)))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| transport_err("slide fetch failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "slide fetch failed ({status}): {body}"
            )));
        }

        let slides: SlideList = response
            .json()
            .await
            .map_err(|e| transport_err("failed to parse slides", &e))?;

        Ok(RemotePull {
            content: DocumentContent::Sections(extract_slide_sections(&slides.value)),
            modified_at: parse_modified(&meta.last_modified)?,
        })
    }

    async fn push(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
        content: &DocumentContent,
    ) -> SyncResult<()> {
        let Some(sections) = content.as_sections() else {
            return Err(SyncError::Content(
                "slide adapter requires section content".to_string(),
            ));
        };

        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Slides)
            .await?;

        let slides: Vec<serde_json::Value> = sections
            .iter()
            .enumerate()
            .map(|(index, (title, value))| {
                let (body, notes) = value
                    .split_once(NOTES_DELIMITER)
                    .unwrap_or((value.as_str(), ""));
                serde_json::json!({
                    "slideIndex": index,
                    "title": title,
                    "body": body,
                    "notes": notes,
                })
            })
            .collect();

        debug!(%company_id, remote_file_id, slides = slides.len(), "pushing slide deck");

        let response = self
            .client
            .put(format!("{}/content", self.item_url(remote_file_id)))
            .bearer_auth(&token)
            .header("Content-Type", DECK_MIME)
            .json(&serde_json::json!({ "slides": slides }))
            .send()
            .await
            .map_err(|e| transport_err("deck push failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "deck push failed ({status}): {body}"
            )));
        }

        info!(remote_file_id, "pushed slide deck");
        Ok(())
    }

    async fn resolve_view_url(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
    ) -> SyncResult<Option<String>> {
        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Slides)
            .await?;
        let meta = self.metadata(&token, remote_file_id).await?;
        Ok(meta.web_url)
    }
}

/// Maps raw slide data to named sections. The title shape keys the
/// section; untitled slides get a positional name.
fn extract_slide_sections(slides: &[SlideData]) -> IndexMap<String, String> {
    let mut sections = IndexMap::new();

    for (position, slide) in slides.iter().enumerate() {
        let mut title = String::new();
        let mut body_parts: Vec<String> = Vec::new();

        for shape in &slide.shapes {
            let text = frame_text(shape.text_frame.as_ref());
            if text.is_empty() {
                continue;
            }

            let is_title = shape
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains("title"))
                || shape
                    .shape_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("title"));

            if is_title && title.is_empty() {
                title = text;
            } else {
                body_parts.push(text);
            }
        }

        let notes = frame_text(slide.notes.as_ref().and_then(|n| n.text_frame.as_ref()));

        let index = slide.index.unwrap_or(position);
        let name = if title.is_empty() {
            format!("Slide {}", index + 1)
        } else {
            title
        };

        let mut body = body_parts.join("\n\n");
        if !notes.is_empty() {
            body.push_str(NOTES_DELIMITER);
            body.push_str(&notes);
        }

        sections.insert(name, body);
    }

    sections
}

fn frame_text(frame: Option<&TextFrame>) -> String {
    frame
        .map(|f| {
            f.paragraphs
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}
