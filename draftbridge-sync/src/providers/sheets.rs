//! Spreadsheet adapter — Sheets-style values API.
//!
//! Remote worksheets are read as sparse A1-keyed cell maps. The numeric
//! vs. textual distinction is preserved losslessly across pull/push: a
//! raw value that parses as a number and re-serializes identically is
//! numeric, anything else is text.

use super::{parse_modified, transport_err, ProviderAdapter, RemotePull};
use crate::credentials::CredentialManager;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use draftbridge_types::{
    column_letter_to_index, index_to_column_letter, split_cell_ref, CellValue, CompanyId,
    DocumentContent, Provider,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SHEET_TIMEOUT: Duration = Duration::from_secs(20);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Spreadsheet specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Base URL for the values API (e.g. `https://sheets.googleapis.com/v4`).
    pub api_base_url: String,
    /// Base URL for file metadata (e.g. `https://www.googleapis.com/drive/v3`).
    pub drive_base_url: String,
    /// Base URL for the human editor (e.g. `https://docs.google.com/spreadsheets/d`).
    pub edit_base_url: String,
    /// Worksheet read and written by sync.
    pub sheet_name: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://sheets.googleapis.com/v4".to_string(),
            drive_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            edit_base_url: "https://docs.google.com/spreadsheets/d".to_string(),
            sheet_name: "Sheet1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DriveFileMeta {
    #[serde(rename = "modifiedTime")]
    modified_time: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Spreadsheet adapter implementation.
pub struct SheetsOnlineAdapter {
    config: SheetsConfig,
    client: Client,
    credentials: Arc<CredentialManager>,
}

impl SheetsOnlineAdapter {
    /// Creates a new adapter sharing the given credential manager.
    #[must_use]
    pub fn new(config: SheetsConfig, credentials: Arc<CredentialManager>) -> Self {
        let client = Client::builder()
            .timeout(SHEET_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            credentials,
        }
    }

    async fn modified_time(
        &self,
        token: &str,
        remote_file_id: &str,
    ) -> SyncResult<chrono::DateTime<chrono::Utc>> {
        let response = self
            .client
            .get(format!(
                "{}/files/{}?fields=modifiedTime",
                self.config.drive_base_url,
                urlencoding::encode(remote_file_id)
            ))
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

        let meta: DriveFileMeta = response
            .json()
            .await
            .map_err(|e| transport_err("failed to parse metadata", &e))?;
        parse_modified(&meta.modified_time)
    }
}

#[async_trait]
impl ProviderAdapter for SheetsOnlineAdapter {
    fn provider(&self) -> Provider {
        Provider::Sheets
    }

    fn call_timeout(&self) -> Duration {
        SHEET_TIMEOUT
    }

    async fn pull(&self, company_id: CompanyId, remote_file_id: &str) -> SyncResult<RemotePull> {
        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Sheets)
            .await?;

        let modified_at = self.modified_time(&token, remote_file_id).await?;

        debug!(%company_id, remote_file_id, "pulling spreadsheet values");

        let response = self
            .client
            .get(format!(
                "{}/spreadsheets/{}/values/{}",
                self.config.api_base_url,
                urlencoding::encode(remote_file_id),
                urlencoding::encode(&self.config.sheet_name)
            ))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| transport_err("values fetch failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "values fetch failed ({status}): {body}"
            )));
        }

        let value_range: ValueRange = response
            .json()
            .await
            .map_err(|e| transport_err("failed to parse values", &e))?;

        Ok(RemotePull {
            content: DocumentContent::Cells(extract_cells(&value_range)),
            modified_at,
        })
    }

    async fn push(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
        content: &DocumentContent,
    ) -> SyncResult<()> {
        let Some(cells) = content.as_cells() else {
            return Err(SyncError::Content(
                "sheets adapter requires cell content".to_string(),
            ));
        };

        if cells.is_empty() {
            debug!(remote_file_id, "no cells to push");
            return Ok(());
        }

        let token = self
            .credentials
            .get_valid_token(company_id, Provider::Sheets)
            .await?;

        let data: Vec<serde_json::Value> = cells
            .iter()
            .map(|(reference, value)| {
                let json_value = match value {
                    CellValue::Number(n) => serde_json::json!(n),
                    CellValue::Text(t) => serde_json::json!(t),
                };
                serde_json::json!({
                    "range": format!("{}!{}", self.config.sheet_name, reference),
                    "majorDimension": "ROWS",
                    "values": [[json_value]],
                })
            })
            .collect();

        debug!(%company_id, remote_file_id, cells = data.len(), "pushing spreadsheet values");

        let response = self
            .client
            .post(format!(
                "{}/spreadsheets/{}/values:batchUpdate",
                self.config.api_base_url,
                urlencoding::encode(remote_file_id)
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "valueInputOption": "USER_ENTERED",
                "data": data,
            }))
            .send()
            .await
            .map_err(|e| transport_err("values push failed", &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "values push failed ({status}): {body}"
            )));
        }

        info!(remote_file_id, "pushed spreadsheet values");
        Ok(())
    }

    /// The editor URL is deterministic; no metadata call needed.
    async fn resolve_view_url(
        &self,
        _company_id: CompanyId,
        remote_file_id: &str,
    ) -> SyncResult<Option<String>> {
        Ok(Some(format!(
            "{}/{}/edit",
            self.config.edit_base_url, remote_file_id
        )))
    }
}

/// Flattens a values response into the sparse cell map, anchoring offsets
/// at the range's start cell.
fn extract_cells(value_range: &ValueRange) -> BTreeMap<String, CellValue> {
    let mut cells = BTreeMap::new();

    let Some((start_col, start_row)) = value_range.range.as_deref().and_then(range_start) else {
        return cells;
    };

    for (row_offset, row) in value_range.values.iter().enumerate() {
        for (col_offset, raw) in row.iter().enumerate() {
            let value = match raw {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) if s.is_empty() => continue,
                serde_json::Value::String(s) => CellValue::parse(s),
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(f) if f.is_finite() => CellValue::Number(f),
                    _ => continue,
                },
                serde_json::Value::Bool(b) => {
                    CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string())
                }
                _ => continue,
            };

            let reference = format!(
                "{}{}",
                index_to_column_letter(start_col + col_offset as u32),
                start_row + row_offset as u32
            );
            cells.insert(reference, value);
        }
    }

    cells
}

/// Parses the start cell of a range like `Sheet1!A1:D10` or `A1:D10`.
fn range_start(range: &str) -> Option<(u32, u32)> {
    let after_sheet = range.rsplit('!').next().unwrap_or(range);
    let start = after_sheet.split(':').next()?;
    let (letters, row) = split_cell_ref(start.trim())?;
    Some((column_letter_to_index(letters), row))
}

// ── Pricing extraction ───────────────────────────────────────────

/// One row of a pricing table (category, rate, hours).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRow {
    pub category: String,
    pub rate: f64,
    pub hours: f64,
}

/// Maps a cell map laid out as a pricing table (column A = category,
/// B = rate, C = hours) into typed rows. Skips the header row and rows
/// whose rate or hours are not numeric.
#[must_use]
pub fn pricing_rows(cells: &BTreeMap<String, CellValue>) -> Vec<PricingRow> {
    let max_row = cells
        .keys()
        .filter_map(|reference| split_cell_ref(reference).map(|(_, row)| row))
        .max()
        .unwrap_or(0);

    let mut rows = Vec::new();
    for row in 2..=max_row {
        let Some(CellValue::Text(category)) = cells.get(&format!("A{row}")) else {
            continue;
        };
        if category.trim().is_empty() {
            continue;
        }
        let Some(rate) = cell_number(cells.get(&format!("B{row}"))) else {
            continue;
        };
        let Some(hours) = cell_number(cells.get(&format!("C{row}"))) else {
            continue;
        };

        rows.push(PricingRow {
            category: category.trim().to_string(),
            rate,
            hours,
        });
    }

    rows
}

/// Missing cells count as zero; non-numeric text disqualifies the row.
fn cell_number(value: Option<&CellValue>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(CellValue::Number(n)) => Some(*n),
        Some(CellValue::Text(t)) => t.trim().parse().ok(),
    }
}
