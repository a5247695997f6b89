//! Request and response bodies of the HTTP API.
//!
//! Field names are camelCase on the wire; the older snake_case names are
//! accepted as aliases. Every request is checked by `validate` before any
//! upstream call is made.

use crate::dedup::DeduplicationRequest;
use crate::engine::DedupOutcome;
use crate::error::{ProxyError, Result};
use crate::sheets::ValueInputOption;
use crate::store::SheetRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProxyError::invalid(format!("'{}' cannot be empty.", field)));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(alias = "cell_range")]
    pub cell_range: String,
    #[serde(alias = "new_value")]
    pub new_value: Value,
    #[serde(default, alias = "value_input_option")]
    pub value_input_option: ValueInputOption,
}

impl UpdateCellRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        require("cell_range", &self.cell_range)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRowsRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(alias = "range_name")]
    pub range_name: String,
    #[serde(alias = "values_data")]
    pub values_data: Vec<Vec<Value>>,
    #[serde(default, alias = "value_input_option")]
    pub value_input_option: ValueInputOption,
}

impl AppendRowsRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        require("range_name", &self.range_name)?;
        if self.values_data.is_empty() {
            return Err(ProxyError::invalid("'values_data' cannot be empty."));
        }
        Ok(())
    }
}

/// Used by values get and values clear.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(alias = "range_name")]
    pub range_name: String,
}

impl RangeRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        require("range_name", &self.range_name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSheetRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    /// Sent to the values API as the range, unchanged. A bare title reads
    /// the whole tab; `Sheet1!A1:C9` or a quoted `'My Tab'` also work.
    #[serde(alias = "sheet_name")]
    pub sheet_name: String,
}

impl ReadSheetRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        require("sheet_name", &self.sheet_name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(alias = "sheet_id")]
    pub sheet_id: i64,
    #[serde(alias = "start_row_index")]
    pub start_row_index: usize,
    #[serde(alias = "end_row_index")]
    pub end_row_index: usize,
}

impl DeleteRowsRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        if self.start_row_index >= self.end_row_index {
            return Err(ProxyError::invalid(
                "'start_row_index' must be less than 'end_row_index'.",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTabRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(alias = "new_sheet_title")]
    pub new_sheet_title: String,
}

impl CreateTabRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        require("new_sheet_title", &self.new_sheet_title)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
}

impl MetadataRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)
    }
}

/// Raw `batchUpdate` pass-through, used for formatting (borders, header
/// styling, merges, number formats).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    pub requests: Vec<Value>,
}

impl BatchUpdateRequest {
    pub fn validate(&self) -> Result<()> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        if self.requests.is_empty() {
            return Err(ProxyError::invalid("'requests' cannot be empty."));
        }
        if !self.requests.iter().all(Value::is_object) {
            return Err(ProxyError::invalid("every entry of 'requests' must be an object."));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicateRequest {
    #[serde(alias = "spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(default, alias = "sheet_name")]
    pub sheet_name: Option<String>,
    #[serde(default, alias = "sheet_id")]
    pub sheet_id: Option<i64>,
    #[serde(alias = "key_columns")]
    pub key_columns: Vec<i64>,
    #[serde(default, alias = "header_rows")]
    pub header_rows: Option<i64>,
    #[serde(default)]
    pub keep: Option<String>,
}

impl DeduplicateRequest {
    /// Split into the sheet to work on and the validated engine parameters.
    pub fn validate(&self) -> Result<(SheetRef, DeduplicationRequest)> {
        require("spreadsheet_id", &self.spreadsheet_id)?;
        let sheet = SheetRef::from_parts(self.sheet_name.clone(), self.sheet_id)?;
        let request = DeduplicationRequest::from_raw(
            &self.key_columns,
            self.header_rows,
            self.keep.as_deref(),
        )?;
        Ok((sheet, request))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicateResponse {
    pub success: bool,
    pub message: String,
    pub rows_deleted_count: usize,
    #[serde(rename = "deletedRowIndices0Based")]
    pub deleted_row_indices_0_based: Vec<usize>,
}

impl From<DedupOutcome> for DeduplicateResponse {
    fn from(outcome: DedupOutcome) -> Self {
        DeduplicateResponse {
            success: true,
            message: outcome.message,
            rows_deleted_count: outcome.rows_deleted,
            deleted_row_indices_0_based: outcome.deleted_positions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCodeRequest {
    pub code: String,
    #[serde(default, alias = "redirect_uri")]
    pub redirect_uri: Option<String>,
}

impl ExchangeCodeRequest {
    // Installed-app flows without a registered redirect use this marker.
    pub const DEFAULT_REDIRECT_URI: &'static str = "urn:ietf:wg:oauth:2.0:oob";

    pub fn validate(&self) -> Result<()> {
        require("code", &self.code)
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri
            .as_deref()
            .unwrap_or(Self::DEFAULT_REDIRECT_URI)
    }
}

/// Envelope for every successful pass-through call.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub details: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(details: T) -> Self {
        SuccessResponse {
            success: true,
            details,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&ProxyError> for ErrorResponse {
    fn from(err: &ProxyError) -> Self {
        let details = match err {
            ProxyError::Store { details, .. } => Some(details.clone()),
            ProxyError::InvalidRequest(_) | ProxyError::SheetNotFound(_) => None,
            other => Some(Value::String(other.to_string())),
        };
        let error = match err {
            ProxyError::InvalidRequest(msg) | ProxyError::SheetNotFound(msg) => {
                format!("{}: {}", err.category(), msg)
            }
            other => other.category().to_string(),
        };
        ErrorResponse {
            success: false,
            error,
            details,
        }
    }
}
