//! Entity lifecycle
//!
//! Create, update and delete orchestration. Each operation takes a
//! transaction handle and is meant to run inside one atomic unit of the
//! store: a failure anywhere leaves no trace.
//!
//! ## Addressing
//!
//! A non-root entity is placed either by `fq_name` or by `parent_uuid`.
//! When both are given `fq_name` wins and the parent id is re-derived from
//! it; when one is given the other is looked up; when neither is given the
//! create fails.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attributes::EntityInput;
use crate::error::{CatalogError, Result, ValidationError};
use crate::fqname::{self, FqName};
use crate::refs::{self, RefSource};
use crate::registry::{TypeDescriptor, TypeRegistry};
use crate::store::{EntityFilter, EntityRow, ReadTxn, Transaction};
use crate::view::ListFilter;

/// Lifecycle operations bound to a registry
#[derive(Debug, Clone, Copy)]
pub struct EntityLifecycle<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> EntityLifecycle<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Create an entity of `type_name` plus its refs; returns its id
    pub fn create<T>(&self, txn: &mut T, type_name: &str, raw: Map<String, Value>) -> Result<Uuid>
    where
        T: Transaction + ?Sized,
    {
        let descriptor = self.registry.descriptor(type_name)?;
        let input = EntityInput::parse(descriptor, raw)?;

        let name = match (&input.name, &input.fq_name) {
            (Some(name), _) => name.clone(),
            (None, Some(fq_name)) => fq_name.last().unwrap_or_default().to_string(),
            (None, None) => String::new(),
        };
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if let Some(segment) = input.fq_name.as_ref().and_then(FqName::last) {
            if segment != name {
                return Err(ValidationError::NameMismatch {
                    name,
                    segment: segment.to_string(),
                }
                .into());
            }
        }

        let display_name = input.display_name.clone().unwrap_or_else(|| name.clone());
        let id = input.uuid.unwrap_or_else(Uuid::new_v4);
        let parent_type = resolve_parent_type(descriptor, input.parent_type.as_deref())?;

        let (fq_name, parent_id) = match &parent_type {
            None => (root_fq_name(type_name, &name, &input), None),
            Some(parent_type) => {
                let (fq_name, parent_id) = place_under_parent(&*txn, type_name, parent_type, &name, &input)?;
                (fq_name, Some(parent_id))
            }
        };

        let row = EntityRow {
            id,
            name,
            display_name,
            parent_type,
            parent_id,
            fq_name: fq_name.encode(),
            columns: input.columns,
            payload: input.payload,
        };
        txn.insert_entity(&descriptor.table(), row)?;

        let source = RefSource {
            type_name,
            id,
            fq_name: &fq_name,
        };
        for group in &input.refs {
            for spec in &group.specs {
                refs::add_ref(txn, source, &group.to_type, spec).map_err(|e| match e {
                    CatalogError::NotFound { key, .. } => ValidationError::UnknownRefTarget {
                        ref_type: group.to_type.clone(),
                        key,
                    }
                    .into(),
                    other => other,
                })?;
            }
        }

        info!(type_name, %id, fq_name = %fq_name, "entity created");
        Ok(id)
    }

    /// Merge `raw` into the stored entity. Identity and placement fields
    /// are ignored, refs are not touched.
    pub fn update<T>(&self, txn: &mut T, type_name: &str, id: Uuid, raw: Map<String, Value>) -> Result<()>
    where
        T: Transaction + ?Sized,
    {
        let descriptor = self.registry.descriptor(type_name)?;
        let mut row = self.fetch(&*txn, type_name, id)?;
        let input = EntityInput::parse(descriptor, raw)?;

        if input.uuid.is_some_and(|uuid| uuid != id) {
            debug!(type_name, %id, "ignoring uuid in update");
        }
        if input.name.is_some() || input.fq_name.is_some() || input.parent_type.is_some() || input.parent_uuid.is_some() {
            debug!(type_name, %id, "ignoring immutable fields in update");
        }
        if !input.refs.is_empty() {
            warn!(type_name, %id, "refs are not updatable, ignoring");
        }

        if let Some(display_name) = input.display_name {
            row.display_name = display_name;
        }
        row.columns.extend(input.columns);
        row.payload.extend(input.payload);

        txn.update_entity(&descriptor.table(), row)?;
        info!(type_name, %id, "entity updated");
        Ok(())
    }

    /// Remove the entity row. Ref rows that mention it stay.
    pub fn delete<T>(&self, txn: &mut T, type_name: &str, id: Uuid) -> Result<Uuid>
    where
        T: Transaction + ?Sized,
    {
        let descriptor = self.registry.descriptor(type_name)?;
        if !txn.delete_entity(&descriptor.table(), id)? {
            return Err(CatalogError::not_found(type_name, id));
        }
        info!(type_name, %id, "entity deleted");
        Ok(id)
    }

    /// Stored row of `type_name` with `id`
    pub fn fetch<T>(&self, txn: &T, type_name: &str, id: Uuid) -> Result<EntityRow>
    where
        T: ReadTxn + ?Sized,
    {
        let descriptor = self.registry.descriptor(type_name)?;
        txn.find_entities(&descriptor.table(), &EntityFilter::by_id(id))?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::not_found(type_name, id))
    }

    /// Stored rows of `type_name` matching `filter`, in insertion order
    pub fn list<T>(&self, txn: &T, type_name: &str, filter: &ListFilter) -> Result<Vec<EntityRow>>
    where
        T: ReadTxn + ?Sized,
    {
        let descriptor = self.registry.descriptor(type_name)?;
        let predicate = EntityFilter {
            ids: non_empty(filter.obj_uuids.clone()),
            parent_ids: non_empty(filter.parent_ids.clone()),
            fq_names: non_empty(filter.fq_names.iter().map(FqName::encode).collect()),
            parent_type: None,
        };
        Ok(txn.find_entities(&descriptor.table(), &predicate)?)
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Explicit parent type must be allowed; absent means the first allowed one
fn resolve_parent_type(descriptor: &TypeDescriptor, explicit: Option<&str>) -> Result<Option<String>> {
    match explicit {
        Some(parent_type) if descriptor.allows_parent(parent_type) => Ok(Some(parent_type.to_string())),
        Some(parent_type) => Err(ValidationError::InvalidParentType {
            type_name: descriptor.name().to_string(),
            parent_type: parent_type.to_string(),
        }
        .into()),
        None => {
            let default = descriptor.default_parent_type().map(str::to_string);
            if let Some(parent_type) = &default {
                debug!(type_name = descriptor.name(), parent_type = %parent_type, "defaulted parent type");
            }
            Ok(default)
        }
    }
}

/// Root entities are always named `[name]`; a supplied parent is dropped
fn root_fq_name(type_name: &str, name: &str, input: &EntityInput) -> FqName {
    if let Some(parent_id) = input.parent_uuid {
        debug!(type_name, %parent_id, "ignoring parent_uuid on root entity");
    }
    let fq_name = FqName::construct(&FqName::default(), name);
    if input.fq_name.as_ref().is_some_and(|supplied| *supplied != fq_name) {
        debug!(type_name, fq_name = %fq_name, "root fq_name reduced to its last segment");
    }
    fq_name
}

fn place_under_parent<T>(
    txn: &T,
    type_name: &str,
    parent_type: &str,
    name: &str,
    input: &EntityInput,
) -> Result<(FqName, Uuid)>
where
    T: ReadTxn + ?Sized,
{
    let parent_not_found = |e: CatalogError| match e {
        CatalogError::NotFound { key, .. } => ValidationError::ParentNotFound {
            parent_type: parent_type.to_string(),
            key,
        }
        .into(),
        other => other,
    };

    match (&input.fq_name, input.parent_uuid) {
        (Some(fq_name), explicit_parent) => {
            let parent_fq_name = fq_name.parent();
            if parent_fq_name.is_empty() {
                return Err(ValidationError::invalid_field(
                    "fq_name",
                    format!("{} needs a parent segment in fq_name", type_name),
                )
                .into());
            }
            let parent_id = fqname::resolve_id_by_name(txn, parent_type, &parent_fq_name).map_err(parent_not_found)?;
            if explicit_parent.is_some_and(|p| p != parent_id) {
                debug!(type_name, %parent_id, "parent_uuid overridden by fq_name");
            }
            debug!(type_name, %parent_id, "derived parent id from fq_name");
            Ok((fq_name.clone(), parent_id))
        }
        (None, Some(parent_id)) => {
            let parent_fq_name = fqname::resolve_name_by_id(txn, parent_type, parent_id).map_err(parent_not_found)?;
            let fq_name = FqName::construct(&parent_fq_name, name);
            debug!(type_name, fq_name = %fq_name, "derived fq_name from parent");
            Ok((fq_name, parent_id))
        }
        (None, None) => Err(ValidationError::AmbiguousParent {
            type_name: type_name.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::builtin;
    use crate::store::{MemoryStore, Store};
    use serde_json::json;

    fn setup() -> (TypeRegistry, MemoryStore) {
        (TypeRegistry::build(builtin()).unwrap(), MemoryStore::new())
    }

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    fn create(registry: &TypeRegistry, store: &MemoryStore, type_name: &str, value: Value) -> Result<Uuid> {
        let lifecycle = EntityLifecycle::new(registry);
        store.run_atomic(|tx| lifecycle.create(tx, type_name, attrs(value)))
    }

    fn fetch(registry: &TypeRegistry, store: &MemoryStore, type_name: &str, id: Uuid) -> EntityRow {
        let lifecycle = EntityLifecycle::new(registry);
        store.read(|tx| lifecycle.fetch(tx, type_name, id)).unwrap()
    }

    #[test]
    fn test_create_root() {
        let (registry, store) = setup();
        let id = create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let row = fetch(&registry, &store, "domain", id);
        assert_eq!(row.display_name, "default");
        assert_eq!(row.fq_name, r#"["default"]"#);
        assert!(row.parent_type.is_none());
        assert!(row.parent_id.is_none());
    }

    #[test]
    fn test_create_root_ignores_placement() {
        let (registry, store) = setup();
        let id = create(
            &registry,
            &store,
            "domain",
            json!({"name": "default", "parent_uuid": Uuid::new_v4().to_string()}),
        )
        .unwrap();
        let row = fetch(&registry, &store, "domain", id);
        assert!(row.parent_id.is_none());
        assert_eq!(row.fq_name, r#"["default"]"#);

        let id = create(&registry, &store, "domain", json!({"name": "a", "fq_name": ["x", "a"]})).unwrap();
        assert_eq!(fetch(&registry, &store, "domain", id).fq_name, r#"["a"]"#);
    }

    #[test]
    fn test_create_keeps_supplied_uuid() {
        let (registry, store) = setup();
        let id = Uuid::new_v4();
        let created = create(&registry, &store, "domain", json!({"name": "d", "uuid": id.to_string()})).unwrap();
        assert_eq!(created, id);
    }

    #[test]
    fn test_create_by_fq_name_derives_parent() {
        let (registry, store) = setup();
        let domain = create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let project = create(
            &registry,
            &store,
            "project",
            json!({"fq_name": ["default", "juniper"], "display_name": "Juniper Networks"}),
        )
        .unwrap();

        let row = fetch(&registry, &store, "project", project);
        assert_eq!(row.name, "juniper");
        assert_eq!(row.display_name, "Juniper Networks");
        assert_eq!(row.parent_type.as_deref(), Some("domain"));
        assert_eq!(row.parent_id, Some(domain));
    }

    #[test]
    fn test_create_by_parent_uuid_derives_fq_name() {
        let (registry, store) = setup();
        let domain = create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let device = create(
            &registry,
            &store,
            "device",
            json!({"name": "d1", "parent_uuid": domain.to_string()}),
        )
        .unwrap();
        assert_eq!(fetch(&registry, &store, "device", device).fq_name, r#"["default","d1"]"#);
    }

    #[test]
    fn test_fq_name_wins_over_parent_uuid() {
        let (registry, store) = setup();
        let first = create(&registry, &store, "domain", json!({"name": "first"})).unwrap();
        let second = create(&registry, &store, "domain", json!({"name": "second"})).unwrap();
        let device = create(
            &registry,
            &store,
            "device",
            json!({"fq_name": ["second", "d1"], "parent_uuid": first.to_string()}),
        )
        .unwrap();
        assert_eq!(fetch(&registry, &store, "device", device).parent_id, Some(second));
    }

    #[test]
    fn test_explicit_parent_type() {
        let (registry, store) = setup();
        create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let project = create(&registry, &store, "project", json!({"fq_name": ["default", "juniper"]})).unwrap();
        let device = create(
            &registry,
            &store,
            "device",
            json!({"name": "d1", "parent_type": "project", "parent_uuid": project.to_string()}),
        )
        .unwrap();
        let row = fetch(&registry, &store, "device", device);
        assert_eq!(row.parent_type.as_deref(), Some("project"));
        assert_eq!(row.fq_name, r#"["default","juniper","d1"]"#);

        let err = create(
            &registry,
            &store,
            "device",
            json!({"name": "d2", "parent_type": "device_family", "parent_uuid": project.to_string()}),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::InvalidParentType { .. })));
    }

    #[test]
    fn test_create_validation_failures() {
        let (registry, store) = setup();
        let err = create(&registry, &store, "domain", json!({"display_name": "x"})).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::EmptyName)));

        let err = create(&registry, &store, "project", json!({"name": "juniper"})).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::AmbiguousParent { .. })));

        let err = create(&registry, &store, "project", json!({"fq_name": ["nowhere", "juniper"]})).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::ParentNotFound { .. })));

        let err = create(&registry, &store, "project", json!({"name": "p", "parent_uuid": Uuid::new_v4().to_string()}))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::ParentNotFound { .. })));

        let err = create(&registry, &store, "site", json!({"name": "s"})).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::UnknownType(_))));

        let err = create(&registry, &store, "domain", json!({"name": "a", "fq_name": ["b"]})).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::NameMismatch { .. })));
    }

    #[test]
    fn test_unknown_ref_target_rolls_back() {
        let (registry, store) = setup();
        create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let err = create(
            &registry,
            &store,
            "device",
            json!({
                "fq_name": ["default", "d1"],
                "device_family_refs": [{"to": ["default", "juniper", "nope"]}]
            }),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationError::UnknownRefTarget { .. })));

        let lifecycle = EntityLifecycle::new(&registry);
        let devices = store.read(|tx| lifecycle.list(tx, "device", &ListFilter::default())).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_duplicate_fq_name() {
        let (registry, store) = setup();
        create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let err = create(&registry, &store, "domain", json!({"name": "default"})).unwrap_err();
        assert!(matches!(err, CatalogError::Storage(_)));
    }

    #[test]
    fn test_update_merges_and_keeps_identity() {
        let (registry, store) = setup();
        let domain = create(&registry, &store, "domain", json!({"name": "default"})).unwrap();
        let device = create(
            &registry,
            &store,
            "device",
            json!({"fq_name": ["default", "d1"], "connection_type": "ssh", "region": "emea", "rack": 4}),
        )
        .unwrap();

        let lifecycle = EntityLifecycle::new(&registry);
        store
            .run_atomic(|tx| {
                lifecycle.update(
                    tx,
                    "device",
                    device,
                    attrs(json!({
                        "name": "renamed",
                        "fq_name": ["default", "renamed"],
                        "parent_uuid": Uuid::new_v4().to_string(),
                        "display_name": "Device One",
                        "connection_type": "netconf",
                        "region": "apac"
                    })),
                )
            })
            .unwrap();

        let row = fetch(&registry, &store, "device", device);
        assert_eq!(row.name, "d1");
        assert_eq!(row.fq_name, r#"["default","d1"]"#);
        assert_eq!(row.parent_id, Some(domain));
        assert_eq!(row.display_name, "Device One");
        assert_eq!(row.columns["connection_type"], json!("netconf"));
        assert_eq!(row.payload["region"], json!("apac"));
        assert_eq!(row.payload["rack"], json!(4));
    }

    #[test]
    fn test_update_and_delete_missing() {
        let (registry, store) = setup();
        let lifecycle = EntityLifecycle::new(&registry);
        let id = Uuid::new_v4();
        let err = store
            .run_atomic(|tx| lifecycle.update(tx, "domain", id, Map::new()))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
        let err = store.run_atomic(|tx| lifecycle.delete(tx, "domain", id)).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[test]
    fn test_list_filters() {
        let (registry, store) = setup();
        let d1 = create(&registry, &store, "domain", json!({"name": "d1"})).unwrap();
        let d2 = create(&registry, &store, "domain", json!({"name": "d2"})).unwrap();
        let a = create(&registry, &store, "device", json!({"fq_name": ["d1", "a"]})).unwrap();
        let b = create(&registry, &store, "device", json!({"fq_name": ["d2", "b"]})).unwrap();
        let c = create(&registry, &store, "device", json!({"fq_name": ["d2", "c"]})).unwrap();

        let lifecycle = EntityLifecycle::new(&registry);
        let ids = |filter: ListFilter| -> Vec<Uuid> {
            store
                .read(|tx| lifecycle.list(tx, "device", &filter))
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect()
        };

        assert_eq!(ids(ListFilter::default()), vec![a, b, c]);
        assert_eq!(
            ids(ListFilter {
                obj_uuids: vec![c, a],
                ..ListFilter::default()
            }),
            vec![a, c]
        );
        assert_eq!(
            ids(ListFilter {
                parent_ids: vec![d2],
                ..ListFilter::default()
            }),
            vec![b, c]
        );
        assert_eq!(
            ids(ListFilter {
                fq_names: vec![FqName::from_colon_str("d2:c"), FqName::from_colon_str("d1:a")],
                parent_ids: vec![d1, d2],
                ..ListFilter::default()
            }),
            vec![a, c]
        );
    }
}
