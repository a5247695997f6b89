use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::api::*;
use crate::auth::{Credentials, OAuthClient, TokenResponse};
use crate::cell::Row;
use crate::config::Config;
use crate::engine::RowDeduplicator;
use crate::error::{ProxyError, Result};
use crate::sheets::SheetsClient;

pub struct AppState {
    config: Config,
    http: reqwest::Client,
    oauth: OAuthClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let oauth = OAuthClient::new(http.clone(), &config);
        Ok(AppState { config, http, oauth })
    }

    /// Sheets client authenticated with the request's credentials.
    async fn sheets(&self, headers: &HeaderMap) -> Result<SheetsClient> {
        let credentials = Credentials::from_headers(headers, self.config.refresh_token.as_deref())?;
        let token = self.oauth.access_token(&credentials).await?;
        Ok(SheetsClient::new(
            self.http.clone(),
            self.config.sheets_api_base.clone(),
            token,
        ))
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ProxyError>;

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        if status.is_server_error() {
            error!("{} ({}): {}", self.category(), status, self);
        } else {
            warn!("{} ({}): {}", self.category(), status, self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ProxyError::invalid(rejection.body_text()))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sheets/cell/update", post(update_cell))
        .route("/sheets/rows/append", post(append_rows))
        .route("/sheets/values/get", post(get_values))
        .route("/sheets/sheet/read_all", post(read_entire_sheet))
        .route("/sheets/rows/delete", post(delete_rows))
        .route("/sheets/tabs/create", post(create_tab))
        .route("/sheets/values/clear", post(clear_values))
        .route("/sheets/metadata", post(get_metadata))
        .route("/sheets/batch_update", post(batch_update))
        .route("/sheets/deduplicate", post(deduplicate))
        .route("/oauth2/exchange", post(exchange_code))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    info!("Starting sheets proxy with {:?}", config);
    let bind_addr = config.bind_addr;
    let app = router(Arc::new(AppState::new(config)?));

    let listener = TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn update_cell(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpdateCellRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets
        .update_cell(
            &req.spreadsheet_id,
            &req.cell_range,
            req.new_value,
            req.value_input_option,
        )
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn append_rows(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<AppendRowsRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets
        .append_rows(
            &req.spreadsheet_id,
            &req.range_name,
            req.values_data,
            req.value_input_option,
        )
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn get_values(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<RangeRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Vec<Row>>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let rows = sheets.get_values(&req.spreadsheet_id, &req.range_name).await?;
    Ok(Json(SuccessResponse::new(rows)))
}

async fn read_entire_sheet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ReadSheetRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Vec<Row>>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let rows = sheets.get_values(&req.spreadsheet_id, &req.sheet_name).await?;
    Ok(Json(SuccessResponse::new(rows)))
}

async fn delete_rows(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<DeleteRowsRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets
        .delete_rows(
            &req.spreadsheet_id,
            req.sheet_id,
            req.start_row_index,
            req.end_row_index,
        )
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn create_tab(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateTabRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets
        .create_tab(&req.spreadsheet_id, &req.new_sheet_title)
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn clear_values(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<RangeRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets
        .clear_values(&req.spreadsheet_id, &req.range_name)
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn get_metadata(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<MetadataRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets.get_metadata(&req.spreadsheet_id).await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn batch_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<BatchUpdateRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<Value>> {
    let req = body(payload)?;
    req.validate()?;
    let sheets = state.sheets(&headers).await?;
    let result = sheets
        .batch_update(&req.spreadsheet_id, req.requests)
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}

#[axum::debug_handler]
async fn deduplicate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<DeduplicateRequest>, JsonRejection>,
) -> ApiResult<DeduplicateResponse> {
    let req = body(payload)?;
    let (sheet, request) = req.validate()?;
    let sheets = state.sheets(&headers).await?;

    let outcome = RowDeduplicator::new(&sheets)
        .with_run_id(Uuid::new_v4().to_string())
        .run(&req.spreadsheet_id, &sheet, &request)
        .await?;
    Ok(Json(DeduplicateResponse::from(outcome)))
}

async fn exchange_code(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ExchangeCodeRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse<TokenResponse>> {
    let req = body(payload)?;
    req.validate()?;
    let tokens = state
        .oauth
        .exchange_code(&req.code, req.redirect_uri())
        .await?;
    Ok(Json(SuccessResponse::new(tokens)))
}
