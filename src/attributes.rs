//! Attribute boundary
//!
//! Every raw attribute map passes through [`EntityInput::parse`] exactly
//! once. Identity keys are lifted into typed fields, ref entries are decoded,
//! normalized fields move to their columns, and derived keys are dropped.
//! Whatever remains is the opaque attribute bag.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::fqname::FqName;
use crate::names;
use crate::refs::RefSpec;
use crate::registry::TypeDescriptor;

/// Keys owned by typed columns; never stored in the bag
pub const IDENTITY_KEYS: &[&str] = &[
    "uuid",
    "uri",
    "name",
    "display_name",
    "fq_name",
    "parent_type",
    "parent_uuid",
    "parent_uri",
];

/// Refs supplied for one target type
#[derive(Debug, Clone, PartialEq)]
pub struct RefGroup {
    pub to_type: String,
    pub specs: Vec<RefSpec>,
}

/// A raw attribute map after boundary coercion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityInput {
    pub uuid: Option<Uuid>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub fq_name: Option<FqName>,
    pub parent_type: Option<String>,
    pub parent_uuid: Option<Uuid>,
    pub refs: Vec<RefGroup>,
    /// Normalized fields
    pub columns: Map<String, Value>,
    /// Cleansed attribute bag
    pub payload: Map<String, Value>,
}

impl EntityInput {
    pub fn parse(descriptor: &TypeDescriptor, mut raw: Map<String, Value>) -> Result<Self, ValidationError> {
        let mut input = EntityInput {
            uuid: take_uuid(&mut raw, "uuid")?,
            name: take_string(&mut raw, "name")?,
            display_name: take_string(&mut raw, "display_name")?.filter(|s| !s.is_empty()),
            fq_name: take_fq_name(&mut raw)?,
            parent_type: take_string(&mut raw, "parent_type")?.filter(|s| !s.is_empty()),
            parent_uuid: take_uuid(&mut raw, "parent_uuid")?,
            ..Self::default()
        };
        raw.remove("uri");
        raw.remove("parent_uri");

        for to_type in descriptor.ref_types() {
            let key = names::ref_field(to_type);
            if let Some(value) = raw.remove(&key) {
                let specs = parse_ref_entries(&key, value)?;
                if !specs.is_empty() {
                    input.refs.push(RefGroup {
                        to_type: to_type.clone(),
                        specs,
                    });
                }
            }
        }

        for (key, value) in raw {
            if descriptor.is_relationship_field(&key) {
                continue;
            }
            if descriptor.is_normalized(&key) {
                input.columns.insert(key, value);
            } else {
                input.payload.insert(key, value);
            }
        }

        Ok(input)
    }
}

fn take_string(raw: &mut Map<String, Value>, key: &str) -> Result<Option<String>, ValidationError> {
    match raw.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ValidationError::invalid_field(
            key,
            format!("expected string, got {}", other),
        )),
    }
}

fn take_uuid(raw: &mut Map<String, Value>, key: &str) -> Result<Option<Uuid>, ValidationError> {
    match take_string(raw, key)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|e| ValidationError::invalid_field(key, format!("{}: {}", s, e))),
    }
}

fn take_fq_name(raw: &mut Map<String, Value>) -> Result<Option<FqName>, ValidationError> {
    match raw.remove("fq_name") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(value @ Value::Array(_)) => serde_json::from_value::<FqName>(value)
            .map(Some)
            .map_err(|e| ValidationError::MalformedFqName(e.to_string())),
        Some(Value::String(encoded)) => FqName::decode(&encoded).map(Some),
        Some(other) => Err(ValidationError::MalformedFqName(other.to_string())),
    }
}

fn parse_ref_entries(key: &str, value: Value) -> Result<Vec<RefSpec>, ValidationError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries
            .into_iter()
            .map(|entry| {
                serde_json::from_value::<RefSpec>(entry)
                    .map_err(|e| ValidationError::invalid_field(key, e.to_string()))
            })
            .collect(),
        other => Err(ValidationError::invalid_field(
            key,
            format!("expected array of refs, got {}", other),
        )),
    }
}
