//! Error types for the import/export pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`StoreError`] - document store errors
//! - [`ImportRunError`] - fatal import pipeline errors
//! - [`ExportError`] - export pipeline errors
//! - [`ServerError`] - HTTP server errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Row-level and batch-level import failures are deliberately NOT part of
//! this hierarchy: they are accounting data, carried inside
//! [`crate::import::ImportResult`], so a partially failed import still
//! returns `Ok`.

use thiserror::Error;

use crate::parser::ParseError;

// =============================================================================
// Document Store Errors
// =============================================================================

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A batch exceeded the platform's atomic-operation cap.
    #[error("batch of {size} operations exceeds the {max}-operation cap")]
    BatchTooLarge { size: usize, max: usize },

    /// Stored document is not valid JSON.
    #[error("corrupt document {id} in {collection}: {source}")]
    CorruptDocument {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Import Errors (fatal to the run)
// =============================================================================

/// Fatal import pipeline errors.
///
/// Only failures that abort the run before row-level work live here; rejected
/// rows and failed batches are reported through
/// [`crate::import::ImportResult::errors`] instead.
#[derive(Debug, Error)]
pub enum ImportRunError {
    /// Malformed input file; no row was processed.
    #[error("CSV parse error: {0}")]
    Parse(#[from] ParseError),

    /// No entity registered under this name.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Export pipeline errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// No entity registered under this name.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The tenant has no records for this entity; no file is produced.
    #[error("nothing to export: no {entity} records found")]
    NothingToExport { entity: String },

    /// Document store failure while fetching records.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Workbook encoding failure.
    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import pipeline error.
    #[error("import error: {0}")]
    Import(#[from] ImportRunError),

    /// Export pipeline error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid request.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ParseError -> ImportRunError
        let parse_err = ParseError::new(1, "empty CSV file");
        let run_err: ImportRunError = parse_err.into();
        assert!(run_err.to_string().contains("empty"));

        // StoreError -> ExportError
        let store_err = StoreError::BatchTooLarge { size: 600, max: 500 };
        let export_err: ExportError = store_err.into();
        assert!(export_err.to_string().contains("600"));
    }

    #[test]
    fn test_nothing_to_export_message() {
        let err = ExportError::NothingToExport {
            entity: "contacts".into(),
        };
        assert!(err.to_string().contains("nothing to export"));
        assert!(err.to_string().contains("contacts"));
    }
}
