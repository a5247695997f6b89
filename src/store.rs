//! The spreadsheet backend as seen by the deduplication engine.

use crate::cell::Row;
use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// How a caller names a tab: by title or by the backend's numeric `sheetId`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetRef {
    Title(String),
    Id(i64),
}

impl SheetRef {
    /// Exactly one of `title`/`id` must be given.
    pub fn from_parts(title: Option<String>, id: Option<i64>) -> Result<Self> {
        match (title, id) {
            (Some(title), None) if !title.is_empty() => Ok(SheetRef::Title(title)),
            (Some(_), None) => Err(ProxyError::invalid("'sheet_name' cannot be empty.")),
            (None, Some(id)) => Ok(SheetRef::Id(id)),
            (None, None) => Err(ProxyError::invalid(
                "Either 'sheet_name' or 'sheet_id' must be provided.",
            )),
            (Some(_), Some(_)) => Err(ProxyError::invalid(
                "Provide only one of 'sheet_name' or 'sheet_id'.",
            )),
        }
    }
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetRef::Title(title) => write!(f, "'{}'", title),
            SheetRef::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// A tab with both its title and numeric id known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetHandle {
    pub spreadsheet_id: String,
    pub title: String,
    pub sheet_id: i64,
}

/// Tab properties as listed in spreadsheet metadata. `index` is the tab's
/// display position, unrelated to `sheet_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetEntry {
    pub properties: SheetProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetProperties {
    #[serde(default)]
    pub title: String,
}

/// The subset of `spreadsheets.get` used for title/id resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetMetadata {
    #[serde(default)]
    pub properties: SpreadsheetProperties,
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

impl SpreadsheetMetadata {
    pub fn resolve(&self, spreadsheet_id: &str, sheet: &SheetRef) -> Result<SheetHandle> {
        let found = self.sheets.iter().map(|s| &s.properties).find(|p| match sheet {
            SheetRef::Title(title) => p.title == *title,
            SheetRef::Id(id) => p.sheet_id == *id,
        });

        match found {
            Some(p) => Ok(SheetHandle {
                spreadsheet_id: spreadsheet_id.to_string(),
                title: p.title.clone(),
                sheet_id: p.sheet_id,
            }),
            None => Err(ProxyError::SheetNotFound(format!(
                "Sheet {} not found in spreadsheet '{}'.",
                sheet, spreadsheet_id
            ))),
        }
    }
}

/// Read-all and batched structural delete over one tab of a spreadsheet.
pub trait SheetValueStore: Send + Sync {
    /// Look up the title/id pair for `sheet`. Fails with `SheetNotFound`.
    fn resolve_sheet(
        &self,
        spreadsheet_id: &str,
        sheet: &SheetRef,
    ) -> impl Future<Output = Result<SheetHandle>> + Send;

    /// Every row of the tab, read as one snapshot.
    fn read_all_rows(&self, sheet: &SheetHandle) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Delete one row per position in a single batch, in the given order.
    fn batch_delete_rows(
        &self,
        sheet: &SheetHandle,
        positions: &[usize],
    ) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> SpreadsheetMetadata {
        serde_json::from_str(
            r#"{
                "properties": {"title": "Budget"},
                "sheets": [
                    {"properties": {"sheetId": 0, "title": "Summary", "index": 0}},
                    {"properties": {"sheetId": 918273, "title": "Orders", "index": 1}}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_by_title_and_id() {
        let meta = metadata();
        let by_title = meta.resolve("abc", &SheetRef::Title("Orders".into())).unwrap();
        let by_id = meta.resolve("abc", &SheetRef::Id(918273)).unwrap();
        assert_eq!(by_title, by_id);
        assert_eq!(by_title.sheet_id, 918273);
        assert_eq!(by_id.title, "Orders");
    }

    #[test]
    fn positional_index_is_not_an_id() {
        let meta = metadata();
        assert!(matches!(
            meta.resolve("abc", &SheetRef::Id(1)),
            Err(ProxyError::SheetNotFound(_))
        ));
    }

    #[test]
    fn unknown_title() {
        let meta = metadata();
        let err = meta.resolve("abc", &SheetRef::Title("orders".into())).unwrap_err();
        assert!(matches!(err, ProxyError::SheetNotFound(_)));
    }

    #[test]
    fn sheet_ref_needs_exactly_one_part() {
        assert_eq!(
            SheetRef::from_parts(Some("Orders".into()), None).unwrap(),
            SheetRef::Title("Orders".into())
        );
        assert_eq!(SheetRef::from_parts(None, Some(7)).unwrap(), SheetRef::Id(7));
        assert!(SheetRef::from_parts(None, None).is_err());
        assert!(SheetRef::from_parts(Some("Orders".into()), Some(7)).is_err());
        assert!(SheetRef::from_parts(Some(String::new()), None).is_err());
    }
}
