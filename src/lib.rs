/*!
# Sheets Proxy

An HTTP service that fronts the Google Sheets v4 REST API with a small JSON
API and handles OAuth2 tokens on the server side.

## Overview

Callers post simple JSON bodies (`spreadsheetId`, `rangeName`, ...) and the
proxy turns them into Sheets API calls, attaching an access token obtained
from the caller's bearer token, service-account key, or refresh token, or
from the server's own refresh token.

Besides the pass-through operations the proxy carries one piece of real
logic: row deduplication. It reads a whole tab, groups rows by a composite
key over caller-chosen columns, and removes duplicates with a single
batched structural delete.

## Architecture

### HTTP layer
- **app**: axum router, handlers, error responses
- **api**: request/response bodies and their validation
- **config**: settings read from the environment

### Upstream
- **auth**: service-account, refresh-token and authorization-code grants, token cache
- **sheets**: Sheets v4 client, implements `SheetValueStore`

### Deduplication
- **store**: `SheetValueStore` trait, sheet identifiers and metadata
- **dedup**: composite keys, keep policy, deletion plan (no I/O)
- **engine**: resolve, read, detect, delete, report
- **cell**: cell values and key cells
- **a1**: A1-notation helpers

## Deletion order

Deleting a row shifts every row below it up by one. The deletion plan is
therefore emitted in strictly descending order, so each delete in the batch
still targets the position observed when the sheet was read.

## REST API Endpoints

- `/sheets/cell/update` - Write one cell
- `/sheets/rows/append` - Append rows after a range
- `/sheets/values/get`, `/sheets/sheet/read_all` - Read values
- `/sheets/rows/delete` - Delete a span of rows
- `/sheets/tabs/create` - Add a tab
- `/sheets/values/clear` - Clear a range
- `/sheets/metadata` - Spreadsheet title and tab list
- `/sheets/batch_update` - Raw batchUpdate (formatting)
- `/sheets/deduplicate` - Remove duplicate rows
- `/oauth2/exchange` - Trade an authorization code for tokens
*/

pub mod a1;
pub mod cell;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod store;

#[cfg(feature = "web")]
pub mod api;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod auth;
#[cfg(feature = "web")]
pub mod sheets;

pub use cell::{CellValue, CompositeKey, KeyCell, Row};
pub use config::Config;
pub use dedup::{DeduplicationRequest, DeletionPlan, KeepPolicy, detect_duplicates};
pub use engine::{DedupOutcome, RowDeduplicator};
pub use error::{ProxyError, Result};
pub use store::{SheetHandle, SheetRef, SheetValueStore, SpreadsheetMetadata};
