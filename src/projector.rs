//! Payload projection
//!
//! Turns stored rows into the externally visible JSON documents under a
//! [`ViewConfig`]. Documents are built as `serde_json` values; key order
//! follows insertion (identity keys first).

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::fqname::FqName;
use crate::names;
use crate::refs;
use crate::registry::{TypeDescriptor, TypeRegistry};
use crate::store::{EntityFilter, EntityRow, ReadTxn, RefRow};
use crate::view::ViewConfig;

/// Builds documents for one registry
#[derive(Debug, Clone, Copy)]
pub struct Projector<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Projector<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Document for one entity (unwrapped)
    pub fn project<T>(&self, txn: &T, descriptor: &TypeDescriptor, row: &EntityRow, view: &ViewConfig) -> Result<Value>
    where
        T: ReadTxn + ?Sized,
    {
        let type_name = descriptor.name();
        if !view.show_details {
            return Ok(json!({
                "fq_name": stored_fq_name(&row.fq_name)?,
                "uuid": row.id,
                "uri": names::uri(type_name, &row.id),
            }));
        }

        let mut doc = base_document(descriptor, row)?;

        for (key, value) in &row.payload {
            if view.strict_fields && !view.fields.is_empty() && !view.fields.contains(key) {
                continue;
            }
            doc.insert(key.clone(), value.clone());
        }

        for to_type in selected(descriptor.ref_types(), view, view.show_refs, |t| vec![names::ref_field(t)]) {
            let rows = refs::forward_refs(txn, type_name, row.id, to_type)?;
            let entries = rows
                .iter()
                .map(|r| ref_entry(to_type, r.to_id, &r.to_fq_name, r))
                .collect::<Result<Vec<_>>>()?;
            insert_category(&mut doc, names::ref_field(to_type), entries);
        }

        for from_type in selected(descriptor.back_ref_types(), view, view.show_back_refs, |t| {
            vec![names::back_ref_field(t)]
        }) {
            let rows = refs::backward_refs(txn, type_name, row.id, from_type)?;
            let entries = rows
                .iter()
                .map(|r| ref_entry(from_type, r.from_id, &r.from_fq_name, r))
                .collect::<Result<Vec<_>>>()?;
            insert_category(&mut doc, names::back_ref_field(from_type), entries);
        }

        for child_type in selected(descriptor.child_types(), view, view.show_children, |t| {
            vec![t.to_string(), names::pluralize(t)]
        }) {
            let children = txn.find_entities(
                &names::entity_table(child_type),
                &EntityFilter::by_parent(type_name, row.id),
            )?;
            let entries = children
                .iter()
                .map(|child| -> Result<Value> {
                    Ok(json!({
                        "to": stored_fq_name(&child.fq_name)?,
                        "uuid": child.id,
                        "uri": names::uri(child_type, &child.id),
                        "attr": Value::Null,
                    }))
                })
                .collect::<Result<Vec<_>>>()?;
            insert_category(&mut doc, names::pluralize(child_type), entries);
        }

        Ok(Value::Object(doc))
    }

    /// `{"<type>": {...}}`
    pub fn single<T>(&self, txn: &T, descriptor: &TypeDescriptor, row: &EntityRow, view: &ViewConfig) -> Result<Value>
    where
        T: ReadTxn + ?Sized,
    {
        let doc = self.project(txn, descriptor, row, view)?;
        let mut wrapper = Map::new();
        wrapper.insert(descriptor.name().to_string(), doc);
        Ok(Value::Object(wrapper))
    }

    /// `{"total": N, "<type>": [...]}` in row order
    pub fn collection<T>(&self, txn: &T, descriptor: &TypeDescriptor, rows: &[EntityRow], view: &ViewConfig) -> Result<Value>
    where
        T: ReadTxn + ?Sized,
    {
        let docs = rows
            .iter()
            .map(|row| self.project(txn, descriptor, row, view))
            .collect::<Result<Vec<_>>>()?;
        let mut wrapper = Map::new();
        wrapper.insert("total".to_string(), Value::from(docs.len()));
        wrapper.insert(descriptor.name().to_string(), Value::Array(docs));
        Ok(Value::Object(wrapper))
    }
}

/// Identity keys plus normalized columns
fn base_document(descriptor: &TypeDescriptor, row: &EntityRow) -> Result<Map<String, Value>> {
    let mut doc = Map::new();
    doc.insert("uuid".into(), json!(row.id));
    doc.insert("uri".into(), json!(names::uri(descriptor.name(), &row.id)));
    doc.insert("name".into(), json!(row.name));
    doc.insert("display_name".into(), json!(row.display_name));
    doc.insert("fq_name".into(), json!(stored_fq_name(&row.fq_name)?));
    if let (Some(parent_type), Some(parent_id)) = (&row.parent_type, row.parent_id) {
        doc.insert("parent_type".into(), json!(parent_type));
        doc.insert("parent_uuid".into(), json!(parent_id));
        doc.insert("parent_uri".into(), json!(names::uri(parent_type, &parent_id)));
    }
    for field in descriptor.normalized_fields() {
        let value = row.columns.get(field).cloned().unwrap_or(Value::Null);
        doc.insert(field.clone(), value);
    }
    Ok(doc)
}

/// Type names of one category to render.
///
/// A non-empty `fields` list decides alone; otherwise the category flag does.
fn selected<'a, F>(types: &'a [String], view: &ViewConfig, flag: bool, keys: F) -> Vec<&'a str>
where
    F: Fn(&str) -> Vec<String>,
{
    if !view.fields.is_empty() {
        types
            .iter()
            .filter(|t| keys(t.as_str()).iter().any(|k| view.fields.contains(k)))
            .map(String::as_str)
            .collect()
    } else if flag {
        types.iter().map(String::as_str).collect()
    } else {
        Vec::new()
    }
}

fn ref_entry(type_name: &str, id: Uuid, encoded_fq_name: &str, row: &RefRow) -> Result<Value> {
    Ok(json!({
        "to": stored_fq_name(encoded_fq_name)?,
        "uuid": id,
        "uri": names::uri(type_name, &id),
        "attr": row.attr,
    }))
}

fn insert_category(doc: &mut Map<String, Value>, key: String, entries: Vec<Value>) {
    if !entries.is_empty() {
        doc.insert(key, Value::Array(entries));
    }
}

fn stored_fq_name(encoded: &str) -> Result<FqName> {
    FqName::decode(encoded)
        .map_err(|e| CatalogError::Consistency(format!("stored fq_name is unreadable: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::builtin;
    use crate::store::{MemoryStore, Store, Transaction};

    struct Fixture {
        registry: TypeRegistry,
        store: MemoryStore,
        domain: EntityRow,
        device: EntityRow,
        family: Uuid,
    }

    fn row(name: &str, fq: &[&str], parent: Option<(&str, Uuid)>) -> EntityRow {
        EntityRow {
            id: Uuid::new_v4(),
            name: name.into(),
            display_name: name.into(),
            parent_type: parent.map(|(t, _)| t.to_string()),
            parent_id: parent.map(|(_, id)| id),
            fq_name: FqName::from(fq).encode(),
            columns: Map::new(),
            payload: Map::new(),
        }
    }

    fn fixture() -> Fixture {
        let registry = TypeRegistry::build(builtin()).unwrap();
        let store = MemoryStore::new();

        let domain = row("default", &["default"], None);
        let project = row("juniper", &["default", "juniper"], Some(("domain", domain.id)));
        let family = row("srx", &["default", "juniper", "srx"], Some(("project", project.id)));
        let mut device = row("srx-1", &["default", "srx-1"], Some(("domain", domain.id)));
        device.columns.insert("connection_type".into(), json!("ssh"));
        device.payload.insert("region".into(), json!("emea"));

        let family_id = family.id;
        store
            .run_atomic(|tx| {
                tx.insert_entity("domains", domain.clone())?;
                tx.insert_entity("projects", project)?;
                tx.insert_entity("device_families", family.clone())?;
                tx.insert_entity("devices", device.clone())?;
                tx.insert_ref(
                    "device_device_family_refs",
                    RefRow {
                        from_id: device.id,
                        to_id: family.id,
                        from_fq_name: device.fq_name.clone(),
                        to_fq_name: family.fq_name.clone(),
                        attr: json!({"role": "edge"}),
                    },
                )?;
                Ok(())
            })
            .unwrap();

        Fixture {
            registry,
            store,
            domain,
            device,
            family: family_id,
        }
    }

    fn project(f: &Fixture, type_name: &str, row: &EntityRow, view: &ViewConfig) -> Value {
        let projector = Projector::new(&f.registry);
        let descriptor = f.registry.lookup(type_name).unwrap();
        f.store.read(|tx| projector.project(tx, descriptor, row, view)).unwrap()
    }

    #[test]
    fn test_summary_view() {
        let f = fixture();
        let doc = project(&f, "domain", &f.domain, &ViewConfig::collection());
        assert_eq!(
            doc,
            json!({
                "fq_name": ["default"],
                "uuid": f.domain.id,
                "uri": format!("/domain/{}", f.domain.id),
            })
        );
    }

    #[test]
    fn test_detail_view_has_refs_by_default() {
        let f = fixture();
        let doc = project(&f, "device", &f.device, &ViewConfig::single());
        assert_eq!(doc["region"], json!("emea"));
        assert_eq!(doc["connection_type"], json!("ssh"));
        assert_eq!(doc["parent_type"], json!("domain"));
        assert_eq!(doc["parent_uri"], json!(format!("/domain/{}", f.domain.id)));
        assert_eq!(
            doc["device_family_refs"],
            json!([{
                "to": ["default", "juniper", "srx"],
                "uuid": f.family,
                "uri": format!("/device_family/{}", f.family),
                "attr": {"role": "edge"},
            }])
        );
    }

    #[test]
    fn test_strict_fields_narrow_scalars_only() {
        let f = fixture();
        let view = ViewConfig::single().strict().with_fields(&["connection_type"]);
        let doc = project(&f, "device", &f.device, &view);
        assert!(doc.get("region").is_none());
        assert_eq!(doc["connection_type"], json!("ssh"));
        assert!(doc.get("device_family_refs").is_none());
        assert_eq!(doc["name"], json!("srx-1"));

        let view = ViewConfig::single()
            .strict()
            .with_fields(&["device_family_refs", "connection_type"]);
        let doc = project(&f, "device", &f.device, &view);
        assert!(doc.get("region").is_none());
        assert_eq!(doc["device_family_refs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_lenient_fields_keep_scalars() {
        let f = fixture();
        let view = ViewConfig::single().with_fields(&["connection_type"]);
        let doc = project(&f, "device", &f.device, &view);
        assert_eq!(doc["region"], json!("emea"));
        assert!(doc.get("device_family_refs").is_none());
    }

    #[test]
    fn test_children_and_back_refs() {
        let f = fixture();
        let view = ViewConfig::single().with_children(true);
        let doc = project(&f, "domain", &f.domain, &view);
        assert_eq!(doc["projects"][0]["to"], json!(["default", "juniper"]));
        assert_eq!(doc["projects"][0]["attr"], Value::Null);
        assert_eq!(doc["devices"][0]["uuid"], json!(f.device.id));

        let family = f
            .store
            .read(|tx| Ok(tx.find_entities("device_families", &EntityFilter::by_id(f.family))?))
            .unwrap()
            .remove(0);
        let doc = project(&f, "device_family", &family, &ViewConfig::single().with_back_refs(true));
        assert_eq!(doc["device_back_refs"][0]["uuid"], json!(f.device.id));
        assert_eq!(doc["device_back_refs"][0]["to"], json!(["default", "srx-1"]));

        // children selected by field name, plural or singular
        let doc = project(&f, "domain", &f.domain, &ViewConfig::single().with_fields(&["project"]));
        assert!(doc.get("projects").is_some());
        assert!(doc.get("devices").is_none());
    }

    #[test]
    fn test_empty_categories_are_omitted() {
        let f = fixture();
        let doc = project(&f, "domain", &f.domain, &ViewConfig::single().with_back_refs(true));
        assert!(doc.get("projects").is_none());
        assert_eq!(doc["fq_name"], json!(["default"]));
    }

    #[test]
    fn test_collection_wrapper() {
        let f = fixture();
        let projector = Projector::new(&f.registry);
        let descriptor = f.registry.lookup("domain").unwrap();
        let doc = f
            .store
            .read(|tx| projector.collection(tx, descriptor, &[f.domain.clone()], &ViewConfig::collection()))
            .unwrap();
        assert_eq!(doc["total"], json!(1));
        assert_eq!(doc["domain"][0]["uuid"], json!(f.domain.id));
    }
}
