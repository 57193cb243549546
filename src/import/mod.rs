//! Import orchestration: parse -> transform -> validate -> batch-write.
//!
//! One call to [`run_import`] drives the whole pipeline for one uploaded
//! file and produces one [`ImportResult`]. The state machine is
//! `idle -> parsing -> validating -> importing -> complete`, with an error
//! path back to `idle` when the file itself cannot be parsed (before any
//! row-level work).
//!
//! Validation never short-circuits: every row is processed even after
//! earlier rows fail, so the final error list reflects the whole file.
//! Exactly one audit entry is recorded per run, success or failure, through
//! the best-effort channel in [`crate::audit`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::events;
use crate::audit::{self, Actor};
use crate::entity::EntityRegistry;
use crate::error::ImportRunError;
use crate::parser;
use crate::store::DocumentStore;
use crate::validation;

mod batch;

pub use batch::{BatchWriter, MAX_BATCH_SIZE};

/// Import pipeline phases, reported through the progress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    Idle,
    Parsing,
    Validating,
    Importing,
    Complete,
}

/// One rejected row or failed batch.
///
/// `row` is the 1-based line number in the uploaded file (data rows start
/// at 2, after the header). Insertion order, never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    pub row: usize,
    pub message: String,
}

/// Aggregate outcome of one import run.
///
/// For every run, `created + updated + skipped + failed` equals the number
/// of data rows in the file; a failed batch's rows count toward `failed`
/// while contributing a single batch-level entry to `errors`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    /// Rows that actually landed in the store.
    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }
}

/// A row that passed schema validation and is ready for storage.
#[derive(Debug, Clone)]
pub struct ValidatedRow {
    /// Line number in the uploaded file, for error attribution.
    pub original_row: usize,
    /// Explicit document id, when the row carried one.
    pub id: Option<String>,
    pub data: Map<String, Value>,
}

/// Run one import: parse the file, validate every row, commit batches,
/// record the audit entry.
///
/// Returns `Err` only for failures that abort before row-level work (a
/// malformed file, an unknown entity); rejected rows and failed batches are
/// reported inside the `Ok` result.
pub async fn run_import<S: DocumentStore>(
    store: &S,
    registry: &EntityRegistry,
    actor: &Actor,
    entity_name: &str,
    bytes: &[u8],
) -> Result<ImportResult, ImportRunError> {
    let config = registry
        .get(entity_name)
        .ok_or_else(|| ImportRunError::UnknownEntity(entity_name.to_string()))?;

    // -------------------------------------------------------------------------
    // Phase 1: parsing (0-10%)
    // -------------------------------------------------------------------------
    events::emit_progress(ImportPhase::Parsing, 0);
    let parsed = match parser::parse_bytes(bytes) {
        Ok(parsed) => parsed,
        Err(err) => {
            events::log_error(format!("import aborted: {}", err));
            audit::record_import_failure(store, actor, entity_name, &err.to_string()).await;
            events::emit_progress(ImportPhase::Idle, 0);
            return Err(err.into());
        }
    };
    events::log_info(format!(
        "parsed {} data rows ({} encoding)",
        parsed.rows.len(),
        parsed.encoding
    ));
    events::emit_progress(ImportPhase::Parsing, 10);

    // -------------------------------------------------------------------------
    // Phase 2: validation (10-50%), never short-circuits
    // -------------------------------------------------------------------------
    events::emit_progress(ImportPhase::Validating, 10);
    let mut result = ImportResult::default();
    let mut validated: Vec<ValidatedRow> = Vec::new();
    let total = parsed.rows.len();

    for (index, raw) in parsed.rows.iter().enumerate() {
        // 1-based data index + 1 for the header line
        let original_row = index + 2;

        let transformed = (config.transform)(raw);
        let row_value = Value::Object(transformed.clone());

        match validation::validate_row(&config.validator, &row_value) {
            Ok(()) => {
                let mut data = transformed;
                let id = data
                    .remove("id")
                    .and_then(|v| v.as_str().map(str::to_string));
                validated.push(ValidatedRow {
                    original_row,
                    id,
                    data,
                });
            }
            Err(violations) => {
                result.failed += 1;
                result.errors.push(ImportError {
                    row: original_row,
                    message: validation::rejection_message(&violations),
                });
            }
        }

        let percent = 10 + ((index + 1) * 40 / total) as u8;
        events::emit_progress(ImportPhase::Validating, percent);
    }

    if !result.errors.is_empty() {
        events::log_warning(format!("{} rows rejected by validation", result.errors.len()));
    }

    // -------------------------------------------------------------------------
    // Phase 3: importing (50-100%)
    // -------------------------------------------------------------------------
    events::emit_progress(ImportPhase::Importing, 50);
    if !validated.is_empty() {
        let collection = config.collection(&actor.company_id);
        BatchWriter::new()
            .write(store, &collection, &actor.company_id, &validated, &mut result)
            .await;
    }

    events::emit_progress(ImportPhase::Complete, 100);
    events::log_success(format!(
        "import finished: {} created, {} updated, {} skipped, {} failed",
        result.created, result.updated, result.skipped, result.failed
    ));

    audit::record_import(store, actor, entity_name, &result).await;

    Ok(result)
}
