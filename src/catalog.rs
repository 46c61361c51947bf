//! Catalog facade
//!
//! Owns the registry, the store and the optional payload validator, and runs
//! every write as one atomic unit of the store.

use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::declaration::{self, Declarations};
use crate::error::{Result, ValidationError};
use crate::lifecycle::EntityLifecycle;
use crate::projector::Projector;
use crate::registry::TypeRegistry;
use crate::store::{MemoryStore, Store};
use crate::validation::PayloadValidator;
use crate::view::{ListFilter, ViewConfig};

/// A resource catalog over store `S`
#[derive(Debug)]
pub struct Catalog<S: Store> {
    registry: TypeRegistry,
    store: S,
    validator: Option<PayloadValidator>,
}

impl Catalog<MemoryStore> {
    /// Catalog of the built-in types on a fresh in-memory store
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(TypeRegistry::build(declaration::builtin())?, MemoryStore::new()))
    }
}

impl<S: Store> Catalog<S> {
    pub fn new(registry: TypeRegistry, store: S) -> Self {
        Self {
            registry,
            store,
            validator: None,
        }
    }

    /// Build registry and validator from `config` on top of `store`
    pub fn from_config(config: &CatalogConfig, store: S) -> Result<Self> {
        let catalog = Self::new(load_registry(config)?, store);
        Ok(match load_validator(config)? {
            Some(validator) => catalog.with_validator(validator),
            None => catalog,
        })
    }

    pub fn with_validator(mut self, validator: PayloadValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an entity from a JSON object body; returns its id
    pub fn create(&self, type_name: &str, body: Value) -> Result<Uuid> {
        self.registry.descriptor(type_name)?;
        if let Some(validator) = &self.validator {
            validator.validate(type_name, &body)?;
        }
        let attrs = into_object(body)?;
        let lifecycle = EntityLifecycle::new(&self.registry);
        self.store.run_atomic(|txn| lifecycle.create(txn, type_name, attrs))
    }

    /// Partially update an entity
    pub fn update(&self, type_name: &str, id: Uuid, body: Value) -> Result<()> {
        let attrs = into_object(body)?;
        let lifecycle = EntityLifecycle::new(&self.registry);
        self.store.run_atomic(|txn| lifecycle.update(txn, type_name, id, attrs))
    }

    /// Delete an entity; refs mentioning it are kept
    pub fn delete(&self, type_name: &str, id: Uuid) -> Result<Uuid> {
        let lifecycle = EntityLifecycle::new(&self.registry);
        self.store.run_atomic(|txn| lifecycle.delete(txn, type_name, id))
    }

    /// `{"<type>": {...}}` for one entity
    pub fn get(&self, type_name: &str, id: Uuid, view: &ViewConfig) -> Result<Value> {
        let descriptor = self.registry.descriptor(type_name)?;
        let lifecycle = EntityLifecycle::new(&self.registry);
        let projector = Projector::new(&self.registry);
        self.store.read(|txn| {
            let row = lifecycle.fetch(txn, type_name, id)?;
            projector.single(txn, descriptor, &row, view)
        })
    }

    /// `{"total": N, "<type>": [...]}` for the entities matching `filter`
    pub fn list(&self, type_name: &str, filter: &ListFilter, view: &ViewConfig) -> Result<Value> {
        let descriptor = self.registry.descriptor(type_name)?;
        let lifecycle = EntityLifecycle::new(&self.registry);
        let projector = Projector::new(&self.registry);
        self.store.read(|txn| {
            let rows = lifecycle.list(txn, type_name, filter)?;
            projector.collection(txn, descriptor, &rows, view)
        })
    }
}

/// Registry from the configured declarations file, or the built-in table
pub fn load_registry(config: &CatalogConfig) -> Result<TypeRegistry> {
    let decls = match &config.schema.declarations {
        Some(path) => {
            info!(path = %path.display(), "loading type declarations");
            Declarations::from_file(path)?.types
        }
        None => declaration::builtin(),
    };
    Ok(TypeRegistry::build(decls)?)
}

/// Validator from the configured schema directory, if enabled
pub fn load_validator(config: &CatalogConfig) -> Result<Option<PayloadValidator>> {
    match (&config.validation.schema_dir, config.validation.enabled) {
        (Some(dir), true) => Ok(Some(PayloadValidator::from_dir(dir)?)),
        _ => Ok(None),
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::invalid_field(
            "body",
            format!("expected a JSON object, got {}", other),
        )
        .into()),
    }
}
