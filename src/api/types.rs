//! REST API types for frontend integration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::audit::{derive_status, AuditStatus};
use crate::import::ImportResult;

/// Response sent to the frontend after an import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Overall run status: success, partial or failed.
    pub status: AuditStatus,

    /// Counters and the ordered row/batch error list.
    pub result: ImportResult,
}

impl From<ImportResult> for ImportResponse {
    fn from(result: ImportResult) -> Self {
        ImportResponse {
            status: derive_status(result.succeeded(), result.failed),
            result,
        }
    }
}

/// Create an error response body.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportError;

    #[test]
    fn test_status_success() {
        let response = ImportResponse::from(ImportResult {
            created: 3,
            ..Default::default()
        });
        assert_eq!(response.status, AuditStatus::Success);
    }

    #[test]
    fn test_status_partial() {
        let response = ImportResponse::from(ImportResult {
            created: 2,
            failed: 1,
            errors: vec![ImportError {
                row: 2,
                message: "bad".to_string(),
            }],
            ..Default::default()
        });
        assert_eq!(response.status, AuditStatus::Partial);
    }

    #[test]
    fn test_serialized_shape() {
        let response = ImportResponse::from(ImportResult {
            created: 1,
            ..Default::default()
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"]["created"], 1);
        assert_eq!(json["result"]["errors"], json!([]));
    }
}
