//! In-memory backend
//!
//! Tables are persistent (`im`) collections, so an atomic unit works on a
//! cheap clone of the committed state and is swapped in only on success.
//! Dropping the clone is the rollback.

use std::sync::RwLock;

use im::{HashMap, Vector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{EntityFilter, EntityRow, ReadTxn, RefFilter, RefRow, Store, Transaction};
use crate::error::{Result, StorageError};

/// Committed (or working) state of the in-memory backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    entities: HashMap<String, Vector<EntityRow>>,
    refs: HashMap<String, Vector<RefRow>>,
    /// Global unique index: encoded fq_name -> (table, id)
    fq_index: HashMap<String, (String, Uuid)>,
}

impl Tables {
    pub fn entity_count(&self) -> usize {
        self.entities.values().map(Vector::len).sum()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.values().map(Vector::len).sum()
    }

    fn position(&self, table: &str, id: Uuid) -> Option<usize> {
        self.entities.get(table)?.iter().position(|r| r.id == id)
    }
}

impl ReadTxn for Tables {
    fn find_entities(&self, table: &str, filter: &EntityFilter) -> std::result::Result<Vec<EntityRow>, StorageError> {
        Ok(self
            .entities
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    fn find_refs(&self, table: &str, filter: &RefFilter) -> std::result::Result<Vec<RefRow>, StorageError> {
        Ok(self
            .refs
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

impl Transaction for Tables {
    fn insert_entity(&mut self, table: &str, row: EntityRow) -> std::result::Result<Uuid, StorageError> {
        if self.position(table, row.id).is_some() {
            return Err(StorageError::UniqueViolation {
                table: table.to_string(),
                key: row.id.to_string(),
            });
        }
        if self.fq_index.contains_key(&row.fq_name) {
            return Err(StorageError::UniqueViolation {
                table: table.to_string(),
                key: row.fq_name.clone(),
            });
        }

        let id = row.id;
        self.fq_index.insert(row.fq_name.clone(), (table.to_string(), id));
        self.entities.entry(table.to_string()).or_insert_with(Vector::new).push_back(row);
        Ok(id)
    }

    fn update_entity(&mut self, table: &str, row: EntityRow) -> std::result::Result<(), StorageError> {
        let index = self.position(table, row.id).ok_or_else(|| StorageError::RowNotFound {
            table: table.to_string(),
            id: row.id.to_string(),
        })?;

        let previous = self
            .entities
            .get(table)
            .map(|rows| rows[index].fq_name.clone())
            .unwrap_or_default();
        if previous != row.fq_name {
            if self.fq_index.contains_key(&row.fq_name) {
                return Err(StorageError::UniqueViolation {
                    table: table.to_string(),
                    key: row.fq_name.clone(),
                });
            }
            self.fq_index.remove(&previous);
            self.fq_index.insert(row.fq_name.clone(), (table.to_string(), row.id));
        }

        if let Some(rows) = self.entities.get_mut(table) {
            rows.set(index, row);
        }
        Ok(())
    }

    fn delete_entity(&mut self, table: &str, id: Uuid) -> std::result::Result<bool, StorageError> {
        let Some(index) = self.position(table, id) else {
            return Ok(false);
        };
        if let Some(rows) = self.entities.get_mut(table) {
            let removed = rows.remove(index);
            self.fq_index.remove(&removed.fq_name);
        }
        Ok(true)
    }

    fn insert_ref(&mut self, table: &str, row: RefRow) -> std::result::Result<(), StorageError> {
        self.refs.entry(table.to_string()).or_insert_with(Vector::new).push_back(row);
        Ok(())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing tables (e.g. a loaded snapshot)
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            state: RwLock::new(tables),
        }
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> Result<Tables> {
        self.read(|tables| Ok(tables.clone()))
    }

    /// Run an atomic unit, calling `on_commit` with the new state before it
    /// is published. An error from `on_commit` rolls the unit back.
    pub fn run_atomic_with<R, F, C>(&self, f: F, on_commit: C) -> Result<R>
    where
        F: FnOnce(&mut Tables) -> Result<R>,
        C: FnOnce(&Tables) -> Result<()>,
    {
        let mut committed = self.state.write().map_err(|_| poisoned())?;
        let mut working = committed.clone();

        match f(&mut working) {
            Ok(out) => {
                on_commit(&working)?;
                *committed = working;
                debug!("atomic unit committed");
                Ok(out)
            }
            Err(e) => {
                debug!(error = %e, "atomic unit rolled back");
                Err(e)
            }
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Backend("store lock poisoned".to_string())
}

impl Store for MemoryStore {
    type Txn = Tables;

    fn run_atomic<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Tables) -> Result<R>,
    {
        self.run_atomic_with(f, |_| Ok(()))
    }

    fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Tables) -> Result<R>,
    {
        let committed = self.state.read().map_err(|_| poisoned())?;
        f(&committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use serde_json::{Map, Value};

    fn row(name: &str) -> EntityRow {
        EntityRow {
            id: Uuid::new_v4(),
            name: name.into(),
            display_name: name.into(),
            parent_type: None,
            parent_id: None,
            fq_name: format!(r#"["{}"]"#, name),
            columns: Map::new(),
            payload: Map::new(),
        }
    }

    #[test]
    fn test_insert_and_find_in_order() {
        let store = MemoryStore::new();
        let (a, b) = (row("a"), row("b"));
        let (a_id, b_id) = (a.id, b.id);

        store
            .run_atomic(|tx| {
                tx.insert_entity("domains", a)?;
                tx.insert_entity("domains", b)?;
                Ok(())
            })
            .unwrap();

        let rows = store.read(|tx| Ok(tx.find_entities("domains", &EntityFilter::all())?)).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a_id, b_id]);
        assert!(store.read(|tx| Ok(tx.find_entities("projects", &EntityFilter::all())?)).unwrap().is_empty());
    }

    #[test]
    fn test_failed_unit_leaves_no_trace() {
        let store = MemoryStore::new();
        let result: Result<()> = store.run_atomic(|tx| {
            tx.insert_entity("domains", row("a"))?;
            Err(CatalogError::Consistency("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().unwrap().entity_count(), 0);
    }

    #[test]
    fn test_fq_name_is_globally_unique() {
        let store = MemoryStore::new();
        store.run_atomic(|tx| Ok(tx.insert_entity("domains", row("a"))?)).unwrap();

        let err = store
            .run_atomic(|tx| Ok(tx.insert_entity("projects", row("a"))?))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Storage(StorageError::UniqueViolation { .. })));
    }

    #[test]
    fn test_update_and_delete() {
        let store = MemoryStore::new();
        let mut a = row("a");
        let id = a.id;
        store.run_atomic(|tx| Ok(tx.insert_entity("domains", a.clone())?)).unwrap();

        a.display_name = "Alpha".into();
        store.run_atomic(|tx| Ok(tx.update_entity("domains", a)?)).unwrap();
        let rows = store.read(|tx| Ok(tx.find_entities("domains", &EntityFilter::by_id(id))?)).unwrap();
        assert_eq!(rows[0].display_name, "Alpha");

        assert!(store.run_atomic(|tx| Ok(tx.delete_entity("domains", id)?)).unwrap());
        assert!(!store.run_atomic(|tx| Ok(tx.delete_entity("domains", id)?)).unwrap());

        // fq_name is free again once the row is gone
        store.run_atomic(|tx| Ok(tx.insert_entity("domains", row("a"))?)).unwrap();
    }

    #[test]
    fn test_update_missing_row() {
        let store = MemoryStore::new();
        let err = store.run_atomic(|tx| Ok(tx.update_entity("domains", row("a"))?)).unwrap_err();
        assert!(matches!(err, CatalogError::Storage(StorageError::RowNotFound { .. })));
    }

    #[test]
    fn test_refs() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .run_atomic(|tx| {
                Ok(tx.insert_ref(
                    "device_device_family_refs",
                    RefRow {
                        from_id: a,
                        to_id: b,
                        from_fq_name: String::new(),
                        to_fq_name: String::new(),
                        attr: Value::Null,
                    },
                )?)
            })
            .unwrap();
        let forward = store
            .read(|tx| Ok(tx.find_refs("device_device_family_refs", &RefFilter::from(a))?))
            .unwrap();
        assert_eq!(forward.len(), 1);
        let backward = store
            .read(|tx| Ok(tx.find_refs("device_device_family_refs", &RefFilter::to(a))?))
            .unwrap();
        assert!(backward.is_empty());
    }
}
