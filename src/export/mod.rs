//! Export pipeline: fetch -> flatten -> spreadsheet payload.
//!
//! Fetches every record of an entity for one tenant, flattens each document
//! through the entity's config, and encodes a single-sheet `.xlsx` workbook
//! named after the entity. The whole dataset is held in memory during
//! serialization; contact tables are assumed to fit.
//!
//! An empty record set is an error surfaced before any bytes are produced;
//! no partial file ever exists.

use chrono::Utc;
use rust_xlsxwriter::Workbook;

use crate::api::events;
use crate::audit::{self, Actor};
use crate::entity::{EntityConfig, EntityRegistry};
use crate::error::{ExportError, ExportResult};
use crate::store::{Document, DocumentStore};

/// A finished export: the workbook bytes plus the pre-flatten record count.
#[derive(Debug, Clone)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub record_count: usize,
    pub filename: String,
}

/// Fetch and encode one entity's records for a tenant.
pub async fn export_entity<S: DocumentStore>(
    store: &S,
    registry: &EntityRegistry,
    tenant_id: &str,
    entity_name: &str,
) -> ExportResult<ExportPayload> {
    let config = registry
        .get(entity_name)
        .ok_or_else(|| ExportError::UnknownEntity(entity_name.to_string()))?;

    let docs = store.fetch_all(&config.collection(tenant_id)).await?;
    if docs.is_empty() {
        return Err(ExportError::NothingToExport {
            entity: entity_name.to_string(),
        });
    }

    let record_count = docs.len();
    let bytes = encode_workbook(config, &docs)?;
    events::log_success(format!(
        "exported {} {} records ({} bytes)",
        record_count,
        entity_name,
        bytes.len()
    ));

    Ok(ExportPayload {
        bytes,
        record_count,
        filename: format!("{}-{}.xlsx", entity_name, Utc::now().format("%Y-%m-%d")),
    })
}

/// [`export_entity`] plus the audit entry for the run, success or failure.
pub async fn run_export<S: DocumentStore>(
    store: &S,
    registry: &EntityRegistry,
    actor: &Actor,
    entity_name: &str,
) -> ExportResult<ExportPayload> {
    match export_entity(store, registry, &actor.company_id, entity_name).await {
        Ok(payload) => {
            audit::record_export(store, actor, entity_name, payload.record_count).await;
            Ok(payload)
        }
        Err(err) => {
            events::log_error(format!("export failed: {}", err));
            audit::record_export_failure(store, actor, entity_name, &err.to_string()).await;
            Err(err)
        }
    }
}

/// Encode flattened rows into a single-worksheet workbook.
fn encode_workbook(config: &EntityConfig, docs: &[Document]) -> ExportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(config.name)?;

    for (col, header) in config.export_columns.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    for (row_idx, doc) in docs.iter().enumerate() {
        let flat = (config.flatten)(&doc.data);
        for (col, column) in config.export_columns.iter().enumerate() {
            if let Some(value) = flat.get(*column) {
                if !value.is_empty() {
                    sheet.write_string((row_idx + 1) as u32, col as u16, value)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
