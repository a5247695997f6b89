use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value as returned by the values API.
///
/// The store hands back JSON scalars: strings for formatted values, and
/// numbers or booleans when an unformatted render option is used.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

/// One row of a value range. Trailing empty cells are not present, so rows
/// of the same sheet can have different lengths.
pub type Row = Vec<CellValue>;

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value.into())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// A cell as seen through a key column.
///
/// `Absent` marks a key column past the end of a short row. It only equals
/// another `Absent`, never an empty string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyCell {
    Absent,
    Present(CellValue),
}

/// Tuple of key-column values extracted from one row, in key-column order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeKey(Vec<KeyCell>);

impl CompositeKey {
    pub fn from_row(row: &[CellValue], key_columns: &[usize]) -> Self {
        CompositeKey(
            key_columns
                .iter()
                .map(|&col| match row.get(col) {
                    Some(value) => KeyCell::Present(value.clone()),
                    None => KeyCell::Absent,
                })
                .collect(),
        )
    }

    pub fn cells(&self) -> &[KeyCell] {
        &self.0
    }
}
