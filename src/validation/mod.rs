//! JSON Schema validation for transformed rows.
//!
//! Validation uses JSON Schema Draft 7 via the `jsonschema` crate. A row is
//! either accepted or rejected with every violation found, not just the
//! first; the rejection message is the comma-joined list of
//! `field.path: message` strings so the user sees the full picture for a row
//! in one line.
//!
//! Tenant/company id fields are never part of the schemas used here: they
//! are injected by the store at write time and must not be expected in the
//! input (see [`crate::store`]).

use jsonschema::Validator;
use serde_json::Value;

/// Compile a schema for repeated row validation.
///
/// Entity schemas are embedded at compile time, so a failure to compile is a
/// programmer error, not an input error.
pub fn compile(schema: &Value) -> Validator {
    jsonschema::draft7::new(schema).expect("invalid embedded schema")
}

/// Validate a transformed row against a compiled schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one `field.path: message` entry per violation
pub fn validate_row(validator: &Validator, row: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator
        .iter_errors(row)
        .map(|e| format!("{}: {}", field_path(&e.instance_path().to_string()), e))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Comma-join violations into the single human-readable rejection message
/// recorded per row.
pub fn rejection_message(errors: &[String]) -> String {
    errors.join(", ")
}

/// Render a JSON pointer (`/tags/0`) as a dotted field path (`tags.0`).
fn field_path(pointer: &str) -> String {
    let trimmed = pointer.trim_start_matches('/');
    if trimmed.is_empty() {
        "row".to_string()
    } else {
        trimmed.replace('/', ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "score": { "type": "integer", "minimum": 0, "maximum": 100 },
                "tags": { "type": "array", "items": { "type": "string", "minLength": 1 } }
            }
        })
    }

    #[test]
    fn test_valid_row() {
        let validator = compile(&contact_schema());
        let row = json!({ "name": "Alice", "score": 90, "tags": ["vip"] });
        assert!(validate_row(&validator, &row).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let validator = compile(&contact_schema());
        let row = json!({ "score": 90 });
        let errors = validate_row(&validator, &row).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("name"));
    }

    #[test]
    fn test_all_violations_reported() {
        let validator = compile(&contact_schema());
        let row = json!({ "score": 900, "tags": [42] });
        let errors = validate_row(&validator, &row).unwrap_err();
        // missing name + score out of range + bad tag type
        assert!(errors.len() >= 3, "expected every violation, got {:?}", errors);
    }

    #[test]
    fn test_field_path_rendering() {
        let validator = compile(&contact_schema());
        let row = json!({ "name": "Alice", "tags": ["ok", 42] });
        let errors = validate_row(&validator, &row).unwrap_err();
        assert!(errors[0].starts_with("tags.1:"), "got {:?}", errors);
    }

    #[test]
    fn test_rejection_message_is_comma_joined() {
        let msg = rejection_message(&["a: bad".into(), "b: worse".into()]);
        assert_eq!(msg, "a: bad, b: worse");
    }

    #[test]
    fn test_root_violation_uses_row_path() {
        let validator = compile(&contact_schema());
        let errors = validate_row(&validator, &json!("not an object")).unwrap_err();
        assert!(errors[0].starts_with("row:"), "got {:?}", errors);
    }
}
