//! Persisted registry layout and schema migration
//!
//! The registry is stored as a single JSON document carrying an explicit
//! schema version. Documents written by an older schema are migrated forward
//! on load; documents from a newer schema are refused.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use somnus_types::FunctionRecord;

/// Schema version written by this build.
///
/// - v1: dependency list stored under `dependencies`
/// - v2: dependency list stored under `depends_on`; `extensions` map added
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// On-disk registry document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryDocument {
    /// Schema version marker
    pub schema_version: u32,

    /// When the document was last written
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,

    /// All records, ordered by id
    pub records: Vec<FunctionRecord>,
}

impl RegistryDocument {
    pub fn new(records: Vec<FunctionRecord>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at: Some(Utc::now()),
            records,
        }
    }

    /// Parse a raw document, migrating older schema versions.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))?;

        let version = value
            .get("schema_version")
            .and_then(Value::as_u64)
            .ok_or_else(|| "missing or non-numeric schema_version".to_string())?;
        let version = u32::try_from(version)
            .map_err(|_| format!("schema_version {} out of range", version))?;

        if version == 0 {
            return Err("schema_version 0 is not valid".to_string());
        }
        if version > CURRENT_SCHEMA_VERSION {
            return Err(format!(
                "schema_version {} is newer than supported version {}",
                version, CURRENT_SCHEMA_VERSION
            ));
        }

        let migrated = migrate(value, version)?;
        serde_json::from_value(migrated).map_err(|e| format!("invalid record layout: {}", e))
    }

    /// Check every record invariant plus id uniqueness.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            record
                .check_invariants()
                .map_err(|e| format!("record {:?}: {}", record.id.as_str(), e))?;
            if !seen.insert(record.id.clone()) {
                return Err(format!("duplicate function id {}", record.id));
            }
        }
        Ok(())
    }
}

fn migrate(mut value: Value, from: u32) -> Result<Value, String> {
    let mut version = from;
    while version < CURRENT_SCHEMA_VERSION {
        value = match version {
            1 => migrate_v1_to_v2(value)?,
            other => return Err(format!("no migration from schema_version {}", other)),
        };
        version += 1;
    }
    value["schema_version"] = Value::from(CURRENT_SCHEMA_VERSION);
    Ok(value)
}

fn migrate_v1_to_v2(mut value: Value) -> Result<Value, String> {
    let records = value
        .get_mut("records")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| "v1 document has no records array".to_string())?;

    for record in records.iter_mut() {
        let object = record
            .as_object_mut()
            .ok_or_else(|| "v1 record is not an object".to_string())?;
        if let Some(deps) = object.remove("dependencies") {
            if object.contains_key("depends_on") {
                return Err("v1 record carries both dependencies and depends_on".to_string());
            }
            object.insert("depends_on".to_string(), deps);
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v2_record(id: &str) -> Value {
        json!({
            "id": id,
            "name": "ledger",
            "status": "active",
            "is_critical": false,
            "version": 1,
            "last_transition_at": "2026-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_parse_current_version() {
        let raw = json!({ "schema_version": 2, "records": [v2_record("F1")] }).to_string();
        let doc = RegistryDocument::parse(&raw).unwrap();
        assert_eq!(doc.records.len(), 1);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_migrate_v1_dependencies() {
        let mut record = v2_record("F2");
        record["dependencies"] = json!(["F1"]);
        let raw = json!({ "schema_version": 1, "records": [record] }).to_string();

        let doc = RegistryDocument::parse(&raw).unwrap();
        assert_eq!(doc.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(doc.records[0].depends_on.contains(&"F1".into()));
    }

    #[test]
    fn test_newer_schema_refused() {
        let raw = json!({ "schema_version": 99, "records": [] }).to_string();
        let err = RegistryDocument::parse(&raw).unwrap_err();
        assert!(err.contains("newer"));
    }

    #[test]
    fn test_missing_schema_version_refused() {
        let raw = json!({ "records": [] }).to_string();
        assert!(RegistryDocument::parse(&raw).is_err());
    }

    #[test]
    fn test_unknown_record_field_refused() {
        let mut record = v2_record("F1");
        record["surprise"] = json!(true);
        let raw = json!({ "schema_version": 2, "records": [record] }).to_string();
        assert!(RegistryDocument::parse(&raw).is_err());
    }

    #[test]
    fn test_duplicate_ids_fail_validation() {
        let raw = json!({ "schema_version": 2, "records": [v2_record("F1"), v2_record("F1")] })
            .to_string();
        let doc = RegistryDocument::parse(&raw).unwrap();
        assert!(doc.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_sleeping_without_snapshot_fails_validation() {
        let mut record = v2_record("F1");
        record["status"] = json!("sleeping");
        let raw = json!({ "schema_version": 2, "records": [record] }).to_string();
        let doc = RegistryDocument::parse(&raw).unwrap();
        assert!(doc.validate().is_err());
    }
}
