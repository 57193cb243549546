//! Immutable audit trail for import and export runs.
//!
//! One [`AuditLogEntry`] is appended per pipeline run to
//! `tenants/{tenantId}/auditLogs`, after the run completes. Entries are
//! never updated or deleted; consumers page through them newest first.
//!
//! Audit writes are best-effort by construction: the `record_*` functions
//! return `()` and push failures into the diagnostic channel
//! (`tracing::warn!`) instead of any `Result`, so an audit failure cannot
//! mask or reverse the outcome of the run it describes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::StoreResult;
use crate::import::ImportResult;
use crate::store::DocumentStore;

/// Most row errors recorded per audit entry; counts stay exact regardless.
const MAX_RECORDED_ERRORS: usize = 20;

/// Who triggered a pipeline run.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub user_email: String,
    /// Tenant id; scopes every collection the run touches.
    pub company_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Import,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetails {
    pub entity: String,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub user_id: String,
    pub user_email: String,
    pub company_id: String,
    pub action: AuditAction,
    pub status: AuditStatus,
    pub details: AuditDetails,
    /// Server-assigned on write; absent until stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Audit collection path for a tenant.
pub fn audit_collection(tenant_id: &str) -> String {
    format!("tenants/{}/auditLogs", tenant_id)
}

/// Derive the entry status from run counters.
///
/// Failures with nothing landed mean `failed`; failures alongside landed
/// rows mean `partial`; no failures mean `success`.
pub fn derive_status(succeeded: usize, failed: usize) -> AuditStatus {
    if failed > 0 && succeeded == 0 {
        AuditStatus::Failed
    } else if failed > 0 {
        AuditStatus::Partial
    } else {
        AuditStatus::Success
    }
}

/// Record the outcome of a completed import run.
pub async fn record_import<S: DocumentStore>(
    store: &S,
    actor: &Actor,
    entity: &str,
    result: &ImportResult,
) {
    let errors: Vec<String> = result
        .errors
        .iter()
        .take(MAX_RECORDED_ERRORS)
        .map(|e| format!("row {}: {}", e.row, e.message))
        .collect();

    let entry = AuditLogEntry {
        user_id: actor.user_id.clone(),
        user_email: actor.user_email.clone(),
        company_id: actor.company_id.clone(),
        action: AuditAction::Import,
        status: derive_status(result.succeeded(), result.failed),
        details: AuditDetails {
            entity: entity.to_string(),
            file_type: "csv".to_string(),
            record_count: Some(result.succeeded()),
            errors: (!errors.is_empty()).then_some(errors),
        },
        created_at: None,
    };
    write_entry(store, entry).await;
}

/// Record an import that aborted before any row work (parse failure).
pub async fn record_import_failure<S: DocumentStore>(
    store: &S,
    actor: &Actor,
    entity: &str,
    message: &str,
) {
    let entry = AuditLogEntry {
        user_id: actor.user_id.clone(),
        user_email: actor.user_email.clone(),
        company_id: actor.company_id.clone(),
        action: AuditAction::Import,
        status: AuditStatus::Failed,
        details: AuditDetails {
            entity: entity.to_string(),
            file_type: "csv".to_string(),
            record_count: None,
            errors: Some(vec![message.to_string()]),
        },
        created_at: None,
    };
    write_entry(store, entry).await;
}

/// Record the outcome of an export run.
pub async fn record_export<S: DocumentStore>(
    store: &S,
    actor: &Actor,
    entity: &str,
    record_count: usize,
) {
    let entry = AuditLogEntry {
        user_id: actor.user_id.clone(),
        user_email: actor.user_email.clone(),
        company_id: actor.company_id.clone(),
        action: AuditAction::Export,
        status: AuditStatus::Success,
        details: AuditDetails {
            entity: entity.to_string(),
            file_type: "xlsx".to_string(),
            record_count: Some(record_count),
            errors: None,
        },
        created_at: None,
    };
    write_entry(store, entry).await;
}

/// Record an export that produced no file.
pub async fn record_export_failure<S: DocumentStore>(
    store: &S,
    actor: &Actor,
    entity: &str,
    message: &str,
) {
    let entry = AuditLogEntry {
        user_id: actor.user_id.clone(),
        user_email: actor.user_email.clone(),
        company_id: actor.company_id.clone(),
        action: AuditAction::Export,
        status: AuditStatus::Failed,
        details: AuditDetails {
            entity: entity.to_string(),
            file_type: "xlsx".to_string(),
            record_count: None,
            errors: Some(vec![message.to_string()]),
        },
        created_at: None,
    };
    write_entry(store, entry).await;
}

/// Append one entry, swallowing failures into the diagnostic channel.
async fn write_entry<S: DocumentStore>(store: &S, entry: AuditLogEntry) {
    let collection = audit_collection(&entry.company_id);
    let data = match serde_json::to_value(&entry) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(collection = %collection, "audit entry did not serialize to an object");
            return;
        }
    };

    if let Err(err) = store.append(&collection, data).await {
        warn!(collection = %collection, error = %err, "audit write failed; outcome unaffected");
    }
}

/// Fetch the most recent audit entries for a tenant, newest first.
///
/// Entries that no longer deserialize are skipped with a warning rather
/// than failing the page.
pub async fn recent<S: DocumentStore>(
    store: &S,
    tenant_id: &str,
    limit: usize,
) -> StoreResult<Vec<AuditLogEntry>> {
    let docs = store
        .fetch_recent(&audit_collection(tenant_id), limit)
        .await?;

    Ok(docs
        .into_iter()
        .filter_map(|doc| {
            match serde_json::from_value::<AuditLogEntry>(Value::Object(doc.data)) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed audit entry");
                    None
                }
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportError;
    use crate::store::testing::FailingStore;
    use crate::store::SqliteStore;

    fn actor() -> Actor {
        Actor {
            user_id: "u1".to_string(),
            user_email: "ops@acme.test".to_string(),
            company_id: "acme".to_string(),
        }
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(derive_status(3, 0), AuditStatus::Success);
        assert_eq!(derive_status(2, 1), AuditStatus::Partial);
        assert_eq!(derive_status(0, 3), AuditStatus::Failed);
        // empty run counts as success
        assert_eq!(derive_status(0, 0), AuditStatus::Success);
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let store = SqliteStore::in_memory().await.unwrap();
        let result = ImportResult {
            created: 2,
            updated: 0,
            skipped: 0,
            failed: 1,
            errors: vec![ImportError {
                row: 3,
                message: "name: required".to_string(),
            }],
        };

        record_import(&store, &actor(), "contacts", &result).await;

        let entries = recent(&store, "acme", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.action, AuditAction::Import);
        assert_eq!(entry.status, AuditStatus::Partial);
        assert_eq!(entry.details.record_count, Some(2));
        assert_eq!(entry.details.errors.as_ref().unwrap().len(), 1);
        assert!(entry.created_at.is_some());
    }

    #[tokio::test]
    async fn test_error_list_is_bounded() {
        let store = SqliteStore::in_memory().await.unwrap();
        let result = ImportResult {
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 50,
            errors: (0..50)
                .map(|i| ImportError {
                    row: i + 2,
                    message: "bad".to_string(),
                })
                .collect(),
        };

        record_import(&store, &actor(), "contacts", &result).await;

        let entries = recent(&store, "acme", 10).await.unwrap();
        assert_eq!(
            entries[0].details.errors.as_ref().unwrap().len(),
            MAX_RECORDED_ERRORS
        );
        assert_eq!(entries[0].status, AuditStatus::Failed);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        // must not panic or surface an error
        let store = FailingStore;
        record_export(&store, &actor(), "contacts", 5).await;
    }
}
