use chrono::{Duration, Utc};
use draftbridge_sync::providers::{pricing_rows, ProviderAdapter, SheetsConfig, SheetsOnlineAdapter};
use draftbridge_sync::{CredentialManager, StoredCredential, SyncError};
use draftbridge_types::{CellValue, CompanyId, ContentKind, DocumentContent, Provider};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn make_adapter(server: &MockServer) -> (SheetsOnlineAdapter, CompanyId) {
    let credentials = Arc::new(CredentialManager::new(HashMap::new()));
    let company = CompanyId::new();
    credentials
        .set_credential(
            company,
            Provider::Sheets,
            StoredCredential {
                access_token: "sheets-token".to_string(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .await;

    let adapter = SheetsOnlineAdapter::new(
        SheetsConfig {
            api_base_url: server.uri(),
            drive_base_url: server.uri(),
            ..Default::default()
        },
        credentials,
    );
    (adapter, company)
}

fn metadata_mock(file_id: &str) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/files/{file_id}")))
        .and(query_param("fields", "modifiedTime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "modifiedTime": "2026-08-03T14:15:00Z"
        })))
}

// ── Config defaults ─────────────────────────────────────────────

#[test]
fn sheets_config_default() {
    let cfg = SheetsConfig::default();
    assert_eq!(cfg.api_base_url, "https://sheets.googleapis.com/v4");
    assert_eq!(cfg.drive_base_url, "https://www.googleapis.com/drive/v3");
    assert_eq!(cfg.sheet_name, "Sheet1");
}

// ── Pull ────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_classifies_numeric_and_text_cells() {
    let server = MockServer::start().await;
    metadata_mock("s-1").mount(&server).await;

    Mock::given(method("GET"))
        .and(path("/spreadsheets/s-1/values/Sheet1"))
        .and(header("authorization", "Bearer sheets-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": "Sheet1!A1:C3",
            "majorDimension": "ROWS",
            "values": [
                ["Labor Category", "Rate", "Hours"],
                ["Senior Engineer", "42.5", "v2.5"],
                [null, 185, ""]
            ]
        })))
        .mount(&server)
        .await;

    let (adapter, company) = make_adapter(&server).await;
    let pulled = adapter.pull(company, "s-1").await.unwrap();
    let cells = pulled.content.as_cells().unwrap();

    // The string "42.5" round-trips as a number; "v2.5" stays text.
    assert_eq!(cells.get("B2"), Some(&CellValue::Number(42.5)));
    assert_eq!(cells.get("C2"), Some(&CellValue::Text("v2.5".to_string())));
    assert_eq!(
        cells.get("A1"),
        Some(&CellValue::Text("Labor Category".to_string()))
    );
    assert_eq!(cells.get("B3"), Some(&CellValue::Number(185.0)));

    // null and empty-string cells are absent from the sparse map.
    assert!(!cells.contains_key("A3"));
    assert!(!cells.contains_key("C3"));
}

#[tokio::test]
async fn pull_honors_range_offset() {
    let server = MockServer::start().await;
    metadata_mock("s-1").mount(&server).await;

    Mock::given(method("GET"))
        .and(path("/spreadsheets/s-1/values/Sheet1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": "Sheet1!B7:C8",
            "values": [["x", "y"], ["z", 1]]
        })))
        .mount(&server)
        .await;

    let (adapter, company) = make_adapter(&server).await;
    let pulled = adapter.pull(company, "s-1").await.unwrap();
    let cells = pulled.content.as_cells().unwrap();

    assert_eq!(cells.get("B7"), Some(&CellValue::Text("x".to_string())));
    assert_eq!(cells.get("C7"), Some(&CellValue::Text("y".to_string())));
    assert_eq!(cells.get("B8"), Some(&CellValue::Text("z".to_string())));
    assert_eq!(cells.get("C8"), Some(&CellValue::Number(1.0)));
}

// ── Push ────────────────────────────────────────────────────────

#[tokio::test]
async fn push_batches_cells_with_user_entered_values() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/spreadsheets/s-1/values:batchUpdate"))
        .and(header("authorization", "Bearer sheets-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut cells = BTreeMap::new();
    cells.insert("A1".to_string(), CellValue::Text("CUI".to_string()));
    cells.insert("B2".to_string(), CellValue::Number(42.5));

    let (adapter, company) = make_adapter(&server).await;
    adapter
        .push(company, "s-1", &DocumentContent::Cells(cells))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["valueInputOption"], "USER_ENTERED");

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["range"], "Sheet1!A1");
    assert_eq!(data[0]["values"], serde_json::json!([["CUI"]]));
    assert_eq!(data[1]["range"], "Sheet1!B2");
    assert_eq!(data[1]["values"], serde_json::json!([[42.5]]));
}

#[tokio::test]
async fn push_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/spreadsheets/s-1/values:batchUpdate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let mut cells = BTreeMap::new();
    cells.insert("A1".to_string(), CellValue::Number(7.0));
    let content = DocumentContent::Cells(cells);

    let (adapter, company) = make_adapter(&server).await;
    adapter.push(company, "s-1", &content).await.unwrap();
    adapter.push(company, "s-1", &content).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn push_of_empty_cells_skips_network() {
    let server = MockServer::start().await;
    let (adapter, company) = make_adapter(&server).await;

    adapter
        .push(company, "s-1", &DocumentContent::Cells(BTreeMap::new()))
        .await
        .unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn push_rejects_section_content() {
    let server = MockServer::start().await;
    let (adapter, company) = make_adapter(&server).await;

    let sections =
        DocumentContent::from_canonical(ContentKind::Sections, "# A\nbody").unwrap();
    let err = adapter.push(company, "s-1", &sections).await.unwrap_err();
    assert!(matches!(err, SyncError::Content(_)));
}

// ── View URL ────────────────────────────────────────────────────

#[tokio::test]
async fn view_url_is_deterministic() {
    let credentials = Arc::new(CredentialManager::new(HashMap::new()));
    let adapter = SheetsOnlineAdapter::new(SheetsConfig::default(), credentials);

    // No credential, no network: the editor URL is derived from the id.
    let url = adapter
        .resolve_view_url(CompanyId::new(), "s-1")
        .await
        .unwrap();
    assert_eq!(
        url.as_deref(),
        Some("https://docs.google.com/spreadsheets/d/s-1/edit")
    );
}

// ── Pricing extraction ──────────────────────────────────────────

#[test]
fn pricing_rows_skip_header_and_invalid_rows() {
    let mut cells = BTreeMap::new();
    cells.insert("A1".to_string(), CellValue::Text("Labor Category".to_string()));
    cells.insert("B1".to_string(), CellValue::Text("Rate".to_string()));
    cells.insert("C1".to_string(), CellValue::Text("Hours".to_string()));

    cells.insert("A2".to_string(), CellValue::Text("Senior Engineer".to_string()));
    cells.insert("B2".to_string(), CellValue::Number(185.0));
    cells.insert("C2".to_string(), CellValue::Number(1920.0));

    // Text rate that parses numerically is accepted.
    cells.insert("A3".to_string(), CellValue::Text("PM".to_string()));
    cells.insert("B3".to_string(), CellValue::Text("165".to_string()));
    cells.insert("C3".to_string(), CellValue::Number(960.0));

    // Non-numeric rate disqualifies the row.
    cells.insert("A4".to_string(), CellValue::Text("TBD".to_string()));
    cells.insert("B4".to_string(), CellValue::Text("call us".to_string()));
    cells.insert("C4".to_string(), CellValue::Number(100.0));

    // Numeric category is not a labor category.
    cells.insert("A5".to_string(), CellValue::Number(12.0));
    cells.insert("B5".to_string(), CellValue::Number(99.0));

    let rows = pricing_rows(&cells);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].category, "Senior Engineer");
    assert_eq!(rows[0].rate, 185.0);
    assert_eq!(rows[0].hours, 1920.0);
    assert_eq!(rows[1].category, "PM");
    assert_eq!(rows[1].rate, 165.0);
}

#[test]
fn pricing_rows_default_missing_cells_to_zero() {
    let mut cells = BTreeMap::new();
    cells.insert("A2".to_string(), CellValue::Text("Analyst".to_string()));
    // B2 and C2 missing entirely.

    let rows = pricing_rows(&cells);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].rate, 0.0);
    assert_eq!(rows[0].hours, 0.0);
}
