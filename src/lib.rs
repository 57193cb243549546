//! # crmport - bulk contact import/export for a multi-tenant CRM
//!
//! crmport moves CRM contact records between CSV files and a tenant-scoped
//! document store, with per-row schema validation, batched transactional
//! writes, partial-failure accounting and an audit trail.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────┐   ┌───────────┐   ┌──────────┐   ┌───────────────┐
//! │ CSV File │──▶│ Parser │──▶│ Transform │──▶│ Validate │──▶│ Batched Write │
//! │ (upload) │   │ (auto- │   │ (coerce)  │   │ (schema) │   │ (atomic ≤490) │
//! └──────────┘   │  enc)  │   └───────────┘   └──────────┘   └───────┬───────┘
//!                └────────┘                                          ▼
//!                                                            ┌──────────────┐
//!                ┌────────────────────────────────────────── │ Document     │
//!                ▼                                           │ Store        │
//!          ┌───────────┐   ┌──────────┐                      └──────────────┘
//!          │  Flatten  │──▶│  .xlsx   │   + one audit entry per run
//!          └───────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crmport::{run_import, Actor, EntityRegistry, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SqliteStore::in_memory().await.unwrap();
//!     let registry = EntityRegistry::with_defaults();
//!     let actor = Actor {
//!         user_id: "u1".into(),
//!         user_email: "ops@acme.test".into(),
//!         company_id: "acme".into(),
//!     };
//!     let csv = b"name,tags\nAlice,vip|emea\n";
//!     let result = run_import(&store, &registry, &actor, "contacts", csv)
//!         .await
//!         .unwrap();
//!     println!("created {}", result.created);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`parser`] - CSV parsing with encoding auto-detection
//! - [`transform`] - Field coercion helpers
//! - [`validation`] - JSON Schema row validation
//! - [`entity`] - Entity registry (schema, paths, transforms)
//! - [`store`] - Document store trait and SQLite backend
//! - [`import`] - Import orchestrator and batch writer
//! - [`export`] - Spreadsheet export pipeline
//! - [`audit`] - Immutable audit trail
//! - [`api`] - HTTP API server and SSE events
//! - [`config`] - Environment configuration

// Core modules
pub mod config;
pub mod error;

// Parsing and row shaping
pub mod parser;
pub mod transform;
pub mod validation;

// Entities
pub mod entity;

// Storage
pub mod store;

// Pipelines
pub mod export;
pub mod import;

// Audit trail
pub mod audit;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ExportError, ImportRunError, ServerError, StoreError};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{parse_bytes, ParseError, ParsedFile, RawRow};

// =============================================================================
// Re-exports - Entities
// =============================================================================

pub use entity::{EntityConfig, EntityRegistry, ExportRow};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{Document, DocumentStore, SqliteStore, WriteOp, MAX_OPS_PER_BATCH};

// =============================================================================
// Re-exports - Import pipeline
// =============================================================================

pub use import::{
    run_import, BatchWriter, ImportError, ImportPhase, ImportResult, ValidatedRow, MAX_BATCH_SIZE,
};

// =============================================================================
// Re-exports - Export pipeline
// =============================================================================

pub use export::{export_entity, run_export, ExportPayload};

// =============================================================================
// Re-exports - Audit
// =============================================================================

pub use audit::{derive_status, Actor, AuditAction, AuditLogEntry, AuditStatus};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::Config;

// Server
pub mod server {
    pub use crate::api::server::{start_server, AppState};
}
