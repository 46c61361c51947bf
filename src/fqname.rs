//! Fully-qualified names
//!
//! An [`FqName`] is the chain of name segments from the root ancestor down to
//! an entity, e.g. `["default", "juniper"]`. It is globally unique and stored
//! in its compact JSON encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CatalogError, Result, ValidationError};
use crate::names;
use crate::store::{EntityFilter, ReadTxn};

/// Ordered name segments, root first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(Vec<String>);

impl FqName {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment (the entity's own name)
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Encoded form, e.g. `["default","juniper"]`. An empty chain encodes
    /// as the empty string.
    pub fn encode(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Inverse of [`FqName::encode`]
    pub fn decode(encoded: &str) -> std::result::Result<Self, ValidationError> {
        let segments: Vec<String> = serde_json::from_str(encoded)
            .map_err(|e| ValidationError::MalformedFqName(format!("{}: {}", encoded, e)))?;
        if segments.is_empty() {
            return Err(ValidationError::MalformedFqName(format!("{}: empty chain", encoded)));
        }
        Ok(Self(segments))
    }

    /// Parse the colon-joined form used in query strings (`default:juniper`)
    pub fn from_colon_str(s: &str) -> Self {
        Self(s.split(':').map(str::to_string).collect())
    }

    /// Chain without its last segment, empty for roots
    pub fn parent(&self) -> FqName {
        match self.0.split_last() {
            Some((_, rest)) if !rest.is_empty() => Self(rest.to_vec()),
            _ => Self::default(),
        }
    }

    /// Append `name` to `parent`
    pub fn construct(parent: &FqName, name: &str) -> FqName {
        let mut segments = parent.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

impl From<Vec<String>> for FqName {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for FqName {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

/// Id of the unique `type_name` entity named `fq_name`
pub fn resolve_id_by_name<T>(txn: &T, type_name: &str, fq_name: &FqName) -> Result<Uuid>
where
    T: ReadTxn + ?Sized,
{
    let table = names::entity_table(type_name);
    let rows = txn.find_entities(&table, &EntityFilter::by_fq_name(fq_name.encode()))?;
    match rows.as_slice() {
        [] => Err(CatalogError::not_found(type_name, fq_name)),
        [row] => Ok(row.id),
        _ => Err(CatalogError::Consistency(format!(
            "{} rows of {} share fq_name {}",
            rows.len(),
            type_name,
            fq_name
        ))),
    }
}

/// FQName of the `type_name` entity with `id`
pub fn resolve_name_by_id<T>(txn: &T, type_name: &str, id: Uuid) -> Result<FqName>
where
    T: ReadTxn + ?Sized,
{
    let table = names::entity_table(type_name);
    let row = txn
        .find_entities(&table, &EntityFilter::by_id(id))?
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::not_found(type_name, id))?;
    Ok(FqName::decode(&row.fq_name)?)
}
