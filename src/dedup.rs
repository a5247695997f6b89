//! Duplicate-row detection.
//!
//! Pure, I/O-free half of the deduplication engine: validates the caller's
//! key columns and retention policy, then walks a snapshot of rows once and
//! produces the positions to delete.

use crate::cell::{CompositeKey, Row};
use crate::error::{ProxyError, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;

/// Which row of a duplicate group survives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeepPolicy {
    /// Keep the earliest row, delete later ones
    #[default]
    First,
    /// Keep the most recent row, delete earlier ones
    Last,
}

impl FromStr for KeepPolicy {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(KeepPolicy::First),
            "last" => Ok(KeepPolicy::Last),
            _ => Err(ProxyError::invalid(
                "Invalid 'keep' option. Must be 'first' or 'last'.",
            )),
        }
    }
}

impl fmt::Display for KeepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepPolicy::First => f.write_str("first"),
            KeepPolicy::Last => f.write_str("last"),
        }
    }
}

/// Validated deduplication parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeduplicationRequest {
    key_columns: Vec<usize>,
    header_rows: usize,
    keep: KeepPolicy,
}

impl DeduplicationRequest {
    pub const DEFAULT_HEADER_ROWS: usize = 1;

    pub fn new(key_columns: Vec<usize>, header_rows: usize, keep: KeepPolicy) -> Result<Self> {
        if key_columns.is_empty() {
            return Err(ProxyError::invalid("'key_columns' cannot be empty."));
        }
        Ok(DeduplicationRequest {
            key_columns,
            header_rows,
            keep,
        })
    }

    /// Build from loosely typed wire values. Negative indices, a negative
    /// header count and unknown `keep` values are rejected.
    pub fn from_raw(key_columns: &[i64], header_rows: Option<i64>, keep: Option<&str>) -> Result<Self> {
        let columns = key_columns
            .iter()
            .map(|&c| usize::try_from(c))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ProxyError::invalid("'key_columns' must be a list of non-negative integers."))?;

        let header_rows = match header_rows {
            None => Self::DEFAULT_HEADER_ROWS,
            Some(n) => usize::try_from(n)
                .map_err(|_| ProxyError::invalid("'header_rows' must be a non-negative integer."))?,
        };

        let keep = match keep {
            None => KeepPolicy::default(),
            Some(s) => s.parse()?,
        };

        Self::new(columns, header_rows, keep)
    }

    pub fn key_columns(&self) -> &[usize] {
        &self.key_columns
    }

    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    pub fn keep(&self) -> KeepPolicy {
        self.keep
    }
}

/// Row positions to delete, unique and strictly descending so that removing
/// one entry never shifts a position still waiting in the plan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    positions: Vec<usize>,
}

impl DeletionPlan {
    pub fn from_marked(mut marked: Vec<usize>) -> Self {
        marked.sort_unstable_by(|a, b| b.cmp(a));
        marked.dedup();
        DeletionPlan { positions: marked }
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn into_positions(self) -> Vec<usize> {
        self.positions
    }
}

/// Compute which rows of `rows` are duplicates under `request`.
///
/// Positions are zero-based indices into `rows`, header rows included. Header
/// rows are never marked. A key column beyond the end of a short row yields
/// an absent key cell, which only matches another absent cell.
pub fn detect_duplicates(rows: &[Row], request: &DeduplicationRequest) -> DeletionPlan {
    if rows.len() <= request.header_rows {
        return DeletionPlan::default();
    }

    let mut kept: HashMap<CompositeKey, usize> = HashMap::new();
    let mut marked = Vec::new();

    for (position, row) in rows.iter().enumerate().skip(request.header_rows) {
        let key = CompositeKey::from_row(row, &request.key_columns);
        match kept.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(position);
            }
            Entry::Occupied(mut slot) => match request.keep {
                KeepPolicy::First => marked.push(position),
                KeepPolicy::Last => marked.push(slot.insert(position)),
            },
        }
    }

    DeletionPlan::from_marked(marked)
}
