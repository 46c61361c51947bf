//! Persistence Port
//!
//! The minimal storage contract the catalog needs: typed entity rows with an
//! attribute blob, ref rows in their own tables, predicate lookups, and
//! all-or-nothing atomic units. Backends live in submodules.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, Tables};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, StorageError};

/// Stored entity: typed columns plus the attribute bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    /// None for root entities
    pub parent_type: Option<String>,
    /// None for root entities
    pub parent_id: Option<Uuid>,
    /// Encoded fq_name, e.g. `["default","juniper"]`
    pub fq_name: String,
    /// Normalized fields
    #[serde(default)]
    pub columns: Map<String, Value>,
    /// Everything else
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Stored ref, typed by the table it lives in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefRow {
    pub from_id: Uuid,
    pub to_id: Uuid,
    /// Snapshot taken at write time
    pub from_fq_name: String,
    /// Snapshot taken at write time
    pub to_fq_name: String,
    #[serde(default)]
    pub attr: Value,
}

/// Predicate over entity rows. Unset criteria match everything; set
/// criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityFilter {
    pub ids: Option<Vec<Uuid>>,
    pub fq_names: Option<Vec<String>>,
    pub parent_ids: Option<Vec<Uuid>>,
    pub parent_type: Option<String>,
}

impl EntityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            ids: Some(vec![id]),
            ..Self::default()
        }
    }

    pub fn by_fq_name(fq_name: impl Into<String>) -> Self {
        Self {
            fq_names: Some(vec![fq_name.into()]),
            ..Self::default()
        }
    }

    /// Children of `parent_id` whose parent is of `parent_type`
    pub fn by_parent(parent_type: impl Into<String>, parent_id: Uuid) -> Self {
        Self {
            parent_ids: Some(vec![parent_id]),
            parent_type: Some(parent_type.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &EntityRow) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&row.id) {
                return false;
            }
        }
        if let Some(fq_names) = &self.fq_names {
            if !fq_names.contains(&row.fq_name) {
                return false;
            }
        }
        if let Some(parent_ids) = &self.parent_ids {
            match row.parent_id {
                Some(parent_id) if parent_ids.contains(&parent_id) => {}
                _ => return false,
            }
        }
        if let Some(parent_type) = &self.parent_type {
            if row.parent_type.as_deref() != Some(parent_type.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Predicate over ref rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefFilter {
    pub from_id: Option<Uuid>,
    pub to_id: Option<Uuid>,
}

impl RefFilter {
    pub fn from(from_id: Uuid) -> Self {
        Self {
            from_id: Some(from_id),
            to_id: None,
        }
    }

    pub fn to(to_id: Uuid) -> Self {
        Self {
            from_id: None,
            to_id: Some(to_id),
        }
    }

    pub fn matches(&self, row: &RefRow) -> bool {
        self.from_id.map_or(true, |id| row.from_id == id)
            && self.to_id.map_or(true, |id| row.to_id == id)
    }
}

/// Read side of a storage handle
pub trait ReadTxn {
    /// Rows of `table` matching `filter`, in insertion order
    fn find_entities(&self, table: &str, filter: &EntityFilter) -> std::result::Result<Vec<EntityRow>, StorageError>;

    /// Ref rows of `table` matching `filter`, in insertion order
    fn find_refs(&self, table: &str, filter: &RefFilter) -> std::result::Result<Vec<RefRow>, StorageError>;
}

/// Write side of a storage handle, only handed out inside an atomic unit
pub trait Transaction: ReadTxn {
    fn insert_entity(&mut self, table: &str, row: EntityRow) -> std::result::Result<Uuid, StorageError>;

    /// Replace the row with the same id
    fn update_entity(&mut self, table: &str, row: EntityRow) -> std::result::Result<(), StorageError>;

    /// Returns false when no row had that id
    fn delete_entity(&mut self, table: &str, id: Uuid) -> std::result::Result<bool, StorageError>;

    fn insert_ref(&mut self, table: &str, row: RefRow) -> std::result::Result<(), StorageError>;
}

/// A storage backend
pub trait Store: Send + Sync {
    type Txn: Transaction;

    /// Run `f` as one atomic unit. Either everything `f` wrote commits, or
    /// (on any error) nothing does.
    fn run_atomic<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self::Txn) -> Result<R>;

    /// Run `f` against the latest committed state
    fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Self::Txn) -> Result<R>;
}
