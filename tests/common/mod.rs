#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Value, json};
use sheets_proxy::Config;
use sheets_proxy::app::{AppState, router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const ACCESS_TOKEN: &str = "ya29.fake-access";
pub const REFRESH_TOKEN: &str = "1//fake-refresh";
pub const SERVICE_ACCOUNT_EMAIL: &str = "robot@proxy-test.iam.gserviceaccount.com";

const PRIVATE_KEY: &str = include_str!("../fixtures/service_account.pem");
const PUBLIC_KEY: &str = include_str!("../fixtures/service_account.pub.pem");

/// Key file for the service account the fake token endpoint trusts.
pub fn service_account_json() -> String {
    json!({
        "type": "service_account",
        "project_id": "proxy-test",
        "private_key_id": "key-1",
        "private_key": PRIVATE_KEY,
        "client_email": SERVICE_ACCOUNT_EMAIL,
        "client_id": "1234567890",
        "token_uri": "https://oauth2.googleapis.com/token"
    })
    .to_string()
}

pub struct Tab {
    pub sheet_id: i64,
    pub title: String,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct Backend {
    pub tabs: Vec<Tab>,
    pub metadata_reads: usize,
    pub value_reads: Vec<String>,
    pub batch_updates: Vec<Vec<Value>>,
    pub value_writes: Vec<(String, Value)>,
    pub token_grants: Vec<HashMap<String, String>>,
    /// Fail reads of ranges with a column span with this status, like the
    /// backend does (400) for some empty tabs
    pub reject_column_span: Option<StatusCode>,
}

impl Backend {
    pub fn tab(&self, title: &str) -> &Tab {
        self.tabs.iter().find(|t| t.title == title).expect("tab exists")
    }
}

pub type Shared = Arc<Mutex<Backend>>;

/// Fake Sheets backend plus the proxy router pointed at it.
pub struct Harness {
    pub backend: Shared,
    pub app: Router,
}

pub fn tab(sheet_id: i64, title: &str, rows: &[&[&str]]) -> Tab {
    Tab {
        sheet_id,
        title: title.to_string(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| json!(c)).collect())
            .collect(),
    }
}

impl Harness {
    pub async fn start(tabs: Vec<Tab>) -> Self {
        Self::start_with(tabs, |config| config).await
    }

    pub async fn start_with(tabs: Vec<Tab>, configure: impl FnOnce(Config) -> Config) -> Self {
        let backend: Shared = Arc::new(Mutex::new(Backend {
            tabs,
            ..Default::default()
        }));
        let addr = serve_backend(backend.clone()).await;

        let config = configure(
            Config::default()
                .sheets_api_base(format!("http://{}/v4", addr))
                .token_url(format!("http://{}/token", addr))
                .client("client-id", "client-secret"),
        );
        let app = router(Arc::new(AppState::new(config).expect("app state")));
        Harness { backend, app }
    }

    pub fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let bearer = format!("Bearer {}", ACCESS_TOKEN);
        self.post_with(path, &[("authorization", bearer.as_str())], body)
            .await
    }

    pub async fn post_with(&self, path: &str, headers: &[(&str, &str)], body: Value) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = request.body(Body::from(body.to_string())).unwrap();
        send(self.app.clone(), request).await
    }
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn serve_backend(backend: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/v4/spreadsheets/:id", get(metadata).post(spreadsheet_action))
        .route(
            "/v4/spreadsheets/:id/values/:range",
            get(read_values).put(write_values).post(values_action),
        )
        .route("/token", post(token))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn google_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": { "code": status.as_u16(), "message": message }
        })),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {}", ACCESS_TOKEN);
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(google_error(
            StatusCode::UNAUTHORIZED,
            "Request had invalid authentication credentials.",
        )),
    }
}

// `'Bob''s tab'!A:ZZZ` -> ("Bob's tab", true)
fn parse_range(range: &str) -> (String, bool) {
    let (sheet, span) = match range.rsplit_once('!') {
        Some((sheet, _)) => (sheet, true),
        None => (range, false),
    };
    let title = sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(sheet)
        .replace("''", "'");
    (title, span)
}

async fn metadata(
    State(backend): State<Shared>,
    Path(_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut backend = backend.lock().unwrap();
    backend.metadata_reads += 1;
    let sheets: Vec<Value> = backend
        .tabs
        .iter()
        .enumerate()
        .map(|(index, t)| {
            json!({ "properties": { "sheetId": t.sheet_id, "title": t.title, "index": index } })
        })
        .collect();
    Json(json!({ "properties": { "title": "Fixture" }, "sheets": sheets })).into_response()
}

async fn spreadsheet_action(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    if !id.ends_with(":batchUpdate") {
        return google_error(StatusCode::NOT_FOUND, "unknown method");
    }

    let requests = body["requests"].as_array().cloned().unwrap_or_default();
    let mut backend = backend.lock().unwrap();
    backend.batch_updates.push(requests.clone());

    let mut replies = Vec::new();
    for request in &requests {
        if let Some(range) = request.get("deleteDimension").map(|d| &d["range"]) {
            let sheet_id = range["sheetId"].as_i64().unwrap_or(-1);
            let start = range["startIndex"].as_u64().unwrap_or(0) as usize;
            let end = range["endIndex"].as_u64().unwrap_or(0) as usize;
            let Some(tab) = backend.tabs.iter_mut().find(|t| t.sheet_id == sheet_id) else {
                return google_error(StatusCode::BAD_REQUEST, "No grid with id");
            };
            if end > tab.rows.len() || start >= end {
                return google_error(StatusCode::BAD_REQUEST, "Invalid deleteDimension range");
            }
            tab.rows.drain(start..end);
            replies.push(json!({}));
        } else if let Some(props) = request.get("addSheet").map(|a| &a["properties"]) {
            let title = props["title"].as_str().unwrap_or_default().to_string();
            let sheet_id = 1000 + backend.tabs.len() as i64;
            backend.tabs.push(Tab {
                sheet_id,
                title: title.clone(),
                rows: Vec::new(),
            });
            replies.push(json!({ "addSheet": { "properties": { "sheetId": sheet_id, "title": title } } }));
        } else {
            replies.push(json!({}));
        }
    }
    let spreadsheet_id = id.trim_end_matches(":batchUpdate");
    Json(json!({ "spreadsheetId": spreadsheet_id, "replies": replies })).into_response()
}

async fn read_values(
    State(backend): State<Shared>,
    Path((_id, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut backend = backend.lock().unwrap();
    backend.value_reads.push(range.clone());

    let (title, span) = parse_range(&range);
    if let (true, Some(status)) = (span, backend.reject_column_span) {
        return google_error(status, &format!("Unable to parse range: {}", range));
    }
    let Some(tab) = backend.tabs.iter().find(|t| t.title == title) else {
        return google_error(StatusCode::BAD_REQUEST, &format!("Unable to parse range: {}", range));
    };
    if tab.rows.is_empty() {
        return Json(json!({ "range": range, "majorDimension": "ROWS" })).into_response();
    }
    Json(json!({ "range": range, "majorDimension": "ROWS", "values": tab.rows })).into_response()
}

async fn write_values(
    State(backend): State<Shared>,
    Path((id, range)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    backend
        .lock()
        .unwrap()
        .value_writes
        .push((range.clone(), body.clone()));
    Json(json!({
        "spreadsheetId": id,
        "updatedRange": range,
        "updatedCells": 1
    }))
    .into_response()
}

async fn values_action(
    State(backend): State<Shared>,
    Path((id, range)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut backend = backend.lock().unwrap();
    if let Some(range) = range.strip_suffix(":append") {
        let (title, _) = parse_range(range);
        let rows = body["values"].as_array().cloned().unwrap_or_default();
        let appended = rows.len();
        if let Some(tab) = backend.tabs.iter_mut().find(|t| t.title == title) {
            tab.rows
                .extend(rows.into_iter().map(|r| r.as_array().cloned().unwrap_or_default()));
        }
        return Json(json!({
            "spreadsheetId": id,
            "updates": { "updatedRows": appended }
        }))
        .into_response();
    }
    if let Some(range) = range.strip_suffix(":clear") {
        let (title, _) = parse_range(range);
        if let Some(tab) = backend.tabs.iter_mut().find(|t| t.title == title) {
            tab.rows.clear();
        }
        return Json(json!({ "spreadsheetId": id, "clearedRange": range })).into_response();
    }
    google_error(StatusCode::NOT_FOUND, "unknown method")
}

async fn token(State(backend): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = form.get("grant_type").cloned().unwrap_or_default();
    let client_ok = form.get("client_id").map(String::as_str) == Some("client-id")
        && form.get("client_secret").map(String::as_str) == Some("client-secret");
    let ok = match grant.as_str() {
        "refresh_token" => {
            client_ok && form.get("refresh_token").map(String::as_str) == Some(REFRESH_TOKEN)
        }
        "authorization_code" => client_ok && form.get("code").map(String::as_str) == Some("good-code"),
        "urn:ietf:params:oauth:grant-type:jwt-bearer" => {
            form.get("assertion").is_some_and(|a| trusted_assertion(a))
        }
        _ => false,
    };
    backend.lock().unwrap().token_grants.push(form);

    if !ok {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Bad Request" })),
        )
            .into_response();
    }
    let mut response = json!({
        "access_token": ACCESS_TOKEN,
        "expires_in": 3599,
        "scope": "https://www.googleapis.com/auth/spreadsheets",
        "token_type": "Bearer"
    });
    if grant == "authorization_code" {
        response["refresh_token"] = json!(REFRESH_TOKEN);
    }
    Json(response).into_response()
}

// Signature checked against the fixture public key, claims against the
// trusted service account.
fn trusted_assertion(assertion: &str) -> bool {
    let Ok(key) = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()) else {
        return false;
    };
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    match jsonwebtoken::decode::<Value>(assertion, &key, &validation) {
        Ok(data) => {
            data.claims["iss"] == SERVICE_ACCOUNT_EMAIL
                && data.claims["scope"] == "https://www.googleapis.com/auth/spreadsheets"
                && data.claims["aud"]
                    .as_str()
                    .is_some_and(|aud| aud.ends_with("/token"))
        }
        Err(_) => false,
    }
}
