//! Entity registry: which record types can be imported and exported.
//!
//! Each [`EntityConfig`] bundles an entity's validation schema, its
//! collection path template, its row transform, and its export flattening.
//! The registry is built once at startup and passed by reference into the
//! pipelines; nothing here is ambient global state.
//!
//! Currently the only registered entity is `contacts`.

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::{Map, Value};

use crate::parser::RawRow;
use crate::validation;

pub mod contacts;

/// A flat, stringly-typed projection of a stored record, ready for
/// spreadsheet encoding.
pub type ExportRow = HashMap<String, String>;

/// Static configuration for one importable/exportable entity.
pub struct EntityConfig {
    /// Entity name; doubles as the worksheet name on export.
    pub name: &'static str,
    /// Compiled row schema. Excludes tenant/company id fields, which the
    /// store injects at write time.
    pub validator: Validator,
    /// Normalizes one raw CSV row into the shapes the schema expects.
    pub transform: fn(&RawRow) -> Map<String, Value>,
    /// Fixed export column order, so the header row is deterministic.
    pub export_columns: &'static [&'static str],
    /// Denormalizes one stored document into an [`ExportRow`].
    pub flatten: fn(&Map<String, Value>) -> ExportRow,
}

impl EntityConfig {
    /// Collection path for this entity's records under a tenant.
    pub fn collection(&self, tenant_id: &str) -> String {
        format!("tenants/{}/{}", tenant_id, self.name)
    }
}

/// Registry of all known entities, keyed by name.
pub struct EntityRegistry {
    entities: HashMap<&'static str, EntityConfig>,
}

impl EntityRegistry {
    /// Build the registry with every shipped entity.
    pub fn with_defaults() -> Self {
        let mut entities = HashMap::new();

        let contacts = EntityConfig {
            name: contacts::NAME,
            validator: validation::compile(&contacts::schema()),
            transform: contacts::transform_row,
            export_columns: contacts::EXPORT_COLUMNS,
            flatten: contacts::flatten_row,
        };
        entities.insert(contacts.name, contacts);

        Self { entities }
    }

    /// Look up an entity by name.
    pub fn get(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.get(name)
    }

    /// Names of all registered entities.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entities.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_contacts() {
        let registry = EntityRegistry::with_defaults();
        assert!(registry.get("contacts").is_some());
        assert!(registry.get("invoices").is_none());
        assert_eq!(registry.names(), vec!["contacts"]);
    }

    #[test]
    fn test_collection_path() {
        let registry = EntityRegistry::with_defaults();
        let config = registry.get("contacts").unwrap();
        assert_eq!(config.collection("acme"), "tenants/acme/contacts");
    }
}
