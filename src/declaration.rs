//! Static type declarations
//!
//! Each declared type names its allowed parents, the types it refs and the
//! normalized fields that live in typed columns. Declarations are plain data:
//! the built-in table below, or a JSON/TOML file with the same shape:
//!
//! ```toml
//! [[types]]
//! name = "device"
//! parents = ["domain", "project"]
//! refs = ["device_family"]
//! normalized_fields = ["connection_type"]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{CatalogError, Result};

/// Declaration of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    /// snake_case type name, e.g. "device_family"
    pub name: String,
    /// Allowed parent types; the first one is the default
    #[serde(default)]
    pub parents: Vec<String>,
    /// Types this type may ref (attributed many-to-many)
    #[serde(default)]
    pub refs: Vec<String>,
    /// Fields kept in typed columns and always rendered
    #[serde(default)]
    pub normalized_fields: Vec<String>,
}

impl TypeDecl {
    /// Declare a root type with no parents, refs or normalized fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            refs: Vec::new(),
            normalized_fields: Vec::new(),
        }
    }

    pub fn with_parents(mut self, parents: &[&str]) -> Self {
        self.parents = parents.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_refs(mut self, refs: &[&str]) -> Self {
        self.refs = refs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_normalized_fields(mut self, fields: &[&str]) -> Self {
        self.normalized_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// A file of declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Declarations {
    pub types: Vec<TypeDecl>,
}

impl Declarations {
    /// Load declarations from a `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                CatalogError::InvalidFormat(format!(
                    "Failed to parse TOML in {}: {}",
                    path.display(),
                    e
                ))
            }),
            _ => Ok(serde_json::from_str(&content)?),
        }
    }
}

/// The built-in catalog: domain → project → device / device_family,
/// with device refs device_family.
pub fn builtin() -> Vec<TypeDecl> {
    vec![
        TypeDecl::new("domain"),
        TypeDecl::new("project").with_parents(&["domain"]),
        TypeDecl::new("device_family").with_parents(&["project"]),
        TypeDecl::new("device")
            .with_parents(&["domain", "project"])
            .with_refs(&["device_family"])
            .with_normalized_fields(&["connection_type"]),
    ]
}
