//! Google Sheets v4 REST client.
//!
//! One `SheetsClient` is built per request around the caller's access token.
//! Non-success responses become `ProxyError::Store` carrying the backend's
//! status and error body untouched.

use crate::a1;
use crate::cell::Row;
use crate::error::{ProxyError, Result};
use crate::store::{SheetHandle, SheetRef, SheetValueStore, SpreadsheetMetadata};
use log::{info, warn};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const METADATA_FIELDS: &str = "properties(title),sheets(properties(sheetId,title,index))";

/// How the backend interprets written values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    Raw,
    #[default]
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

/// One `deleteDimension` request removing rows `[start, end)`.
pub fn delete_rows_request(sheet_id: i64, start: usize, end: usize) -> Value {
    json!({
        "deleteDimension": {
            "range": {
                "sheetId": sheet_id,
                "dimension": "ROWS",
                "startIndex": start,
                "endIndex": end,
            }
        }
    })
}

pub struct SheetsClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, base: impl Into<String>, access_token: impl Into<String>) -> Self {
        SheetsClient {
            http,
            base: base.into(),
            access_token: access_token.into(),
        }
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!("{}/spreadsheets/{}", self.base, urlencoding::encode(spreadsheet_id))
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let details = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            return Err(ProxyError::Store {
                status: status.as_u16(),
                details,
            });
        }
        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&body).map_err(|e| ProxyError::Store {
            status: status.as_u16(),
            details: Value::String(format!("unreadable response body: {}", e)),
        })
    }

    pub async fn get_metadata(&self, spreadsheet_id: &str) -> Result<Value> {
        info!("Getting metadata for spreadsheet '{}'", spreadsheet_id);
        self.send(
            self.http
                .get(self.spreadsheet_url(spreadsheet_id))
                .query(&[("fields", METADATA_FIELDS)]),
        )
        .await
    }

    pub async fn fetch_metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMetadata> {
        let raw = self.get_metadata(spreadsheet_id).await?;
        serde_json::from_value(raw).map_err(|e| ProxyError::Store {
            status: 502,
            details: Value::String(format!("unexpected metadata shape: {}", e)),
        })
    }

    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Row>> {
        info!("Getting values from '{}', range '{}'", spreadsheet_id, range);
        let raw = self
            .send(self.http.get(self.values_url(spreadsheet_id, range)))
            .await?;
        let values: ValueRange = serde_json::from_value(raw).map_err(|e| ProxyError::Store {
            status: 502,
            details: Value::String(format!("unexpected value range shape: {}", e)),
        })?;
        info!("Got {} row(s)", values.values.len());
        Ok(values.values)
    }

    pub async fn update_cell(
        &self,
        spreadsheet_id: &str,
        cell_range: &str,
        new_value: Value,
        option: ValueInputOption,
    ) -> Result<Value> {
        info!(
            "Updating cell '{}' in '{}' ({})",
            cell_range,
            spreadsheet_id,
            option.as_str()
        );
        self.send(
            self.http
                .put(self.values_url(spreadsheet_id, cell_range))
                .query(&[("valueInputOption", option.as_str())])
                .json(&json!({ "values": [[new_value]] })),
        )
        .await
    }

    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        option: ValueInputOption,
    ) -> Result<Value> {
        info!(
            "Appending {} row(s) to '{}', range '{}'",
            values.len(),
            spreadsheet_id,
            range
        );
        self.send(
            self.http
                .post(format!("{}:append", self.values_url(spreadsheet_id, range)))
                .query(&[
                    ("valueInputOption", option.as_str()),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&json!({ "values": values })),
        )
        .await
    }

    pub async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<Value> {
        info!("Clearing '{}' in '{}'", range, spreadsheet_id);
        self.send(
            self.http
                .post(format!("{}:clear", self.values_url(spreadsheet_id, range)))
                .json(&json!({})),
        )
        .await
    }

    pub async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<Value> {
        info!(
            "Sending batchUpdate with {} request(s) to '{}'",
            requests.len(),
            spreadsheet_id
        );
        self.send(
            self.http
                .post(format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id)))
                .json(&json!({ "requests": requests })),
        )
        .await
    }

    pub async fn delete_rows(&self, spreadsheet_id: &str, sheet_id: i64, start: usize, end: usize) -> Result<Value> {
        info!(
            "Deleting rows {}..{} from sheet {} in '{}'",
            start, end, sheet_id, spreadsheet_id
        );
        self.batch_update(spreadsheet_id, vec![delete_rows_request(sheet_id, start, end)])
            .await
    }

    pub async fn create_tab(&self, spreadsheet_id: &str, title: &str) -> Result<Value> {
        info!("Creating tab '{}' in '{}'", title, spreadsheet_id);
        self.batch_update(
            spreadsheet_id,
            vec![json!({ "addSheet": { "properties": { "title": title } } })],
        )
        .await
    }
}

impl SheetValueStore for SheetsClient {
    async fn resolve_sheet(&self, spreadsheet_id: &str, sheet: &SheetRef) -> Result<SheetHandle> {
        let handle = self.fetch_metadata(spreadsheet_id).await?.resolve(spreadsheet_id, sheet)?;
        info!(
            "Resolved sheet {} to '{}' (sheetId {})",
            sheet, handle.title, handle.sheet_id
        );
        Ok(handle)
    }

    async fn read_all_rows(&self, sheet: &SheetHandle) -> Result<Vec<Row>> {
        match self
            .get_values(&sheet.spreadsheet_id, &a1::full_width_range(&sheet.title))
            .await
        {
            Err(ProxyError::Store { status: 400, details }) => {
                warn!(
                    "Full-width range rejected for '{}', retrying with the bare sheet range: {}",
                    sheet.title, details
                );
                self.get_values(&sheet.spreadsheet_id, &a1::bare_range(&sheet.title))
                    .await
            }
            other => other,
        }
    }

    async fn batch_delete_rows(&self, sheet: &SheetHandle, positions: &[usize]) -> Result<()> {
        let requests = positions
            .iter()
            .map(|&p| delete_rows_request(sheet.sheet_id, p, p + 1))
            .collect();
        self.batch_update(&sheet.spreadsheet_id, requests).await?;
        Ok(())
    }
}
