use crate::dedup::{DeduplicationRequest, detect_duplicates};
use crate::error::Result;
use crate::store::{SheetRef, SheetValueStore};
use log::info;

/// Summary of one deduplication run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DedupOutcome {
    pub message: String,
    pub rows_deleted: usize,
    /// Removed positions, descending
    pub deleted_positions: Vec<usize>,
}

impl DedupOutcome {
    fn nothing(message: &str) -> Self {
        DedupOutcome {
            message: message.to_string(),
            rows_deleted: 0,
            deleted_positions: Vec::new(),
        }
    }
}

/// Drives a `SheetValueStore` through resolve, read, detect and delete.
pub struct RowDeduplicator<'a, S> {
    store: &'a S,
    run_id: String,
}

impl<'a, S: SheetValueStore> RowDeduplicator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        RowDeduplicator {
            store,
            run_id: "-".to_string(),
        }
    }

    /// Tag log lines of this run.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub async fn run(
        &self,
        spreadsheet_id: &str,
        sheet: &SheetRef,
        request: &DeduplicationRequest,
    ) -> Result<DedupOutcome> {
        info!(
            "[{}] Deduplication started for sheet {} in '{}'. Key columns: {:?}, header rows: {}, keep: {}",
            self.run_id,
            sheet,
            spreadsheet_id,
            request.key_columns(),
            request.header_rows(),
            request.keep()
        );

        let handle = self.store.resolve_sheet(spreadsheet_id, sheet).await?;
        let rows = self.store.read_all_rows(&handle).await?;
        if rows.is_empty() {
            info!("[{}] Sheet '{}' is empty", self.run_id, handle.title);
            return Ok(DedupOutcome::nothing(
                "Sheet is empty, no duplicates to remove.",
            ));
        }
        if rows.len() <= request.header_rows() {
            info!(
                "[{}] Sheet '{}' has {} row(s), all header",
                self.run_id,
                handle.title,
                rows.len()
            );
            return Ok(DedupOutcome::nothing(
                "No data rows below the header, no duplicates to remove.",
            ));
        }

        let plan = detect_duplicates(&rows, request);
        if plan.is_empty() {
            info!(
                "[{}] No duplicates among {} data row(s)",
                self.run_id,
                rows.len() - request.header_rows()
            );
            return Ok(DedupOutcome::nothing("No duplicate rows found."));
        }

        self.store
            .batch_delete_rows(&handle, plan.positions())
            .await?;

        let deleted = plan.into_positions();
        info!(
            "[{}] Deleted {} row(s) from '{}': {:?}",
            self.run_id,
            deleted.len(),
            handle.title,
            deleted
        );
        Ok(DedupOutcome {
            message: format!("Deduplication complete. {} row(s) removed.", deleted.len()),
            rows_deleted: deleted.len(),
            deleted_positions: deleted,
        })
    }
}
