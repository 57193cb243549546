//! Batched transactional writes for validated rows.
//!
//! Rows are partitioned into contiguous batches of at most
//! [`MAX_BATCH_SIZE`] and committed strictly in input order, one atomic
//! store operation per batch. Batches are independent: a failed commit does
//! not stop later batches from attempting.
//!
//! Counters are incremented optimistically before each commit; when a
//! commit fails the whole batch is void, so the increments are reversed,
//! every row in the batch counts as failed, and exactly one batch-level
//! error is recorded with the batch's starting line number. Rows inside a
//! failed batch are not enumerated individually.

use crate::api::events;
use crate::import::{ImportError, ImportPhase, ImportResult, ValidatedRow};
use crate::store::{DocumentStore, WriteOp};

/// Maximum rows per batch; stays under the 500-operation platform cap on
/// atomic batches.
pub const MAX_BATCH_SIZE: usize = 490;

/// Commits validated rows in fixed-size atomic batches.
pub struct BatchWriter {
    batch_size: usize,
}

impl BatchWriter {
    pub fn new() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Override the batch size. Used by tests to exercise partitioning
    /// without building hundreds of rows.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Write all rows, updating `result` counters and errors in place.
    pub async fn write<S: DocumentStore>(
        &self,
        store: &S,
        collection: &str,
        tenant_id: &str,
        rows: &[ValidatedRow],
        result: &mut ImportResult,
    ) {
        let total = rows.len();
        let mut written = 0;

        for (batch_index, batch) in rows.chunks(self.batch_size).enumerate() {
            let start_row = batch[0].original_row;
            let end_row = batch[batch.len() - 1].original_row;

            // A row with an explicit id is an upsert-merge (updated); one
            // without gets a generated id (created). Counted optimistically,
            // reversed below if the commit fails.
            let created = batch.iter().filter(|r| r.id.is_none()).count();
            let updated = batch.len() - created;
            result.created += created;
            result.updated += updated;

            let ops: Vec<WriteOp> = batch
                .iter()
                .map(|row| WriteOp {
                    id: row.id.clone(),
                    data: row.data.clone(),
                })
                .collect();

            match store.commit_batch(collection, tenant_id, ops).await {
                Ok(()) => {
                    events::log_info(format!(
                        "batch {} committed ({} rows)",
                        batch_index + 1,
                        batch.len()
                    ));
                }
                Err(err) => {
                    result.created -= created;
                    result.updated -= updated;
                    result.failed += batch.len();
                    let message = format!(
                        "batch {} (rows {}-{}) failed to commit: {}",
                        batch_index + 1,
                        start_row,
                        end_row,
                        err
                    );
                    events::log_error(message.clone());
                    result.errors.push(ImportError {
                        row: start_row,
                        message,
                    });
                }
            }

            written += batch.len();
            let percent = 50 + (written * 50 / total) as u8;
            events::emit_progress(ImportPhase::Importing, percent);
        }
    }
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self::new()
    }
}
