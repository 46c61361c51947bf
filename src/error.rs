//! Error types for the resource catalog

use thiserror::Error;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid type declarations: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{type_name} not found: {key}")]
    NotFound { type_name: String, key: String },

    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn not_found(type_name: impl Into<String>, key: impl ToString) -> Self {
        CatalogError::NotFound {
            type_name: type_name.into(),
            key: key.to_string(),
        }
    }

    /// Whether the caller caused this error (bad input, missing resource).
    ///
    /// Everything else is a server fault: storage failures, broken invariants
    /// and IO are never the caller's doing and are not retried here.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            CatalogError::Validation(_) | CatalogError::NotFound { .. }
        )
    }
}

/// Structural validation failures. Always local, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty name not allowed")]
    EmptyName,

    #[error("Invalid parent type for {type_name}: {parent_type}")]
    InvalidParentType { type_name: String, parent_type: String },

    #[error("Neither fq_name nor parent_uuid is set for {type_name}")]
    AmbiguousParent { type_name: String },

    #[error("Parent {parent_type} not found: {key}")]
    ParentNotFound { parent_type: String, key: String },

    #[error("Unknown {ref_type} ref target: {key}")]
    UnknownRefTarget { ref_type: String, key: String },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Malformed fq_name: {0}")]
    MalformedFqName(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Name {name} does not match last fq_name segment {segment}")]
    NameMismatch { name: String, segment: String },

    #[error("Payload does not match schema:\n{0}")]
    Schema(String),
}

impl ValidationError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Unresolvable type declarations. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("[{type_name}] Invalid parent type: {parent}")]
    UnresolvedParent { type_name: String, parent: String },

    #[error("[{type_name}] Invalid ref type: {target}")]
    UnresolvedRef { type_name: String, target: String },

    #[error("Type declared twice: {0}")]
    DuplicateType(String),

    #[error("Type declaration with empty name")]
    EmptyTypeName,
}

/// Failures reported by the persistence port
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Unique constraint violated on {table}: {key}")]
    UniqueViolation { table: String, key: String },

    #[error("Row not found in {table}: {id}")]
    RowNotFound { table: String, id: String },

    #[error("Backend failure: {0}")]
    Backend(String),
}
