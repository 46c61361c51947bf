//! Request-body validation
//!
//! Optional JSON-Schema check applied to raw attribute maps before the
//! lifecycle sees them. Schemas are loaded from `<type>.schema.json` files;
//! types without a schema pass through unchecked.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{CatalogError, Result, ValidationError};

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Compiled per-type schemas
#[derive(Default)]
pub struct PayloadValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl PayloadValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<type>.schema.json` under `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut validator = Self::new();

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(type_name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(SCHEMA_SUFFIX))
            else {
                continue;
            };

            let content = fs::read_to_string(path)?;
            let schema: Value = serde_json::from_str(&content).map_err(|e| {
                CatalogError::InvalidFormat(format!("Failed to parse JSON in {}: {}", path.display(), e))
            })?;
            validator.add_schema(type_name, &schema)?;
            debug!(type_name, path = %path.display(), "loaded payload schema");
        }

        info!(schemas = validator.len(), dir = %dir.display(), "payload validator ready");
        Ok(validator)
    }

    /// Compile and register the schema for `type_name`
    pub fn add_schema(&mut self, type_name: &str, schema: &Value) -> Result<()> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| CatalogError::InvalidFormat(format!("Invalid schema for {}: {}", type_name, e)))?;
        self.schemas.insert(type_name.to_string(), compiled);
        Ok(())
    }

    pub fn has_schema(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Check `body` against the schema of `type_name`, joining all messages
    pub fn validate(&self, type_name: &str, body: &Value) -> std::result::Result<(), ValidationError> {
        let Some(schema) = self.schemas.get(type_name) else {
            return Ok(());
        };
        if let Err(errors) = schema.validate(body) {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect();
            return Err(ValidationError::Schema(messages.join("\n")));
        }
        Ok(())
    }
}

impl fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.schemas.keys().collect();
        types.sort();
        f.debug_struct("PayloadValidator").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn device_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "connection_type": {"enum": ["ssh", "netconf"]}
            },
            "required": ["name"]
        })
    }

    #[test]
    fn test_validate_against_schema() {
        let mut validator = PayloadValidator::new();
        validator.add_schema("device", &device_schema()).unwrap();

        assert!(validator.validate("device", &json!({"name": "d1", "connection_type": "ssh"})).is_ok());

        let err = validator
            .validate("device", &json!({"connection_type": "telnet"}))
            .unwrap_err();
        let ValidationError::Schema(message) = err else {
            panic!("schema error expected");
        };
        assert!(message.contains("name"));
        assert!(message.contains("/connection_type"));
    }

    #[test]
    fn test_types_without_schema_pass() {
        let validator = PayloadValidator::new();
        assert!(validator.validate("domain", &json!({"anything": 1})).is_ok());
    }

    #[test]
    fn test_from_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("device.schema.json"),
            serde_json::to_string(&device_schema()).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let validator = PayloadValidator::from_dir(dir.path()).unwrap();
        assert_eq!(validator.len(), 1);
        assert!(validator.has_schema("device"));
        assert!(!validator.has_schema("notes"));
    }

    #[test]
    fn test_invalid_schema_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("device.schema.json"), "{not json").unwrap();
        assert!(matches!(
            PayloadValidator::from_dir(dir.path()),
            Err(CatalogError::InvalidFormat(_))
        ));
    }
}
