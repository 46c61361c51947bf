//! Type Registry
//!
//! Process-wide catalog of entity types, built once from declarations and
//! read-only afterwards. Child and back-ref lists are derived here as the
//! inverse of the declared parent and ref lists, so every relationship is
//! known before the first request is served.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, info};

use crate::declaration::TypeDecl;
use crate::error::{ConfigError, ValidationError};
use crate::names;

/// Typed handle of a registered type (index into the registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

/// Kind of an edge in the type graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// child → parent
    Parent,
    /// from → to
    Ref,
}

/// Immutable descriptor of one entity type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    id: TypeId,
    name: String,
    parent_types: Vec<String>,
    child_types: Vec<String>,
    ref_types: Vec<String>,
    back_ref_types: Vec<String>,
    normalized_fields: Vec<String>,
}

impl TypeDescriptor {
    fn from_decl(id: TypeId, decl: &TypeDecl) -> Self {
        Self {
            id,
            name: decl.name.clone(),
            parent_types: decl.parents.clone(),
            child_types: Vec::new(),
            ref_types: decl.refs.clone(),
            back_ref_types: Vec::new(),
            normalized_fields: decl.normalized_fields.clone(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_types(&self) -> &[String] {
        &self.parent_types
    }

    pub fn child_types(&self) -> &[String] {
        &self.child_types
    }

    pub fn ref_types(&self) -> &[String] {
        &self.ref_types
    }

    pub fn back_ref_types(&self) -> &[String] {
        &self.back_ref_types
    }

    pub fn normalized_fields(&self) -> &[String] {
        &self.normalized_fields
    }

    /// Root types have no allowed parents
    pub fn is_root(&self) -> bool {
        self.parent_types.is_empty()
    }

    /// Parent type used when a create omits one
    pub fn default_parent_type(&self) -> Option<&str> {
        self.parent_types.first().map(String::as_str)
    }

    pub fn allows_parent(&self, parent_type: &str) -> bool {
        self.parent_types.iter().any(|p| p == parent_type)
    }

    pub fn has_ref(&self, to_type: &str) -> bool {
        self.ref_types.iter().any(|r| r == to_type)
    }

    pub fn is_normalized(&self, field: &str) -> bool {
        self.normalized_fields.iter().any(|f| f == field)
    }

    /// Storage table for entities of this type
    pub fn table(&self) -> String {
        names::entity_table(&self.name)
    }

    /// Whether `key` is a derived relationship field of this type
    /// (refs, back-refs or children) rather than a stored attribute.
    pub fn is_relationship_field(&self, key: &str) -> bool {
        self.ref_types.iter().any(|t| names::ref_field(t) == key)
            || self.back_ref_types.iter().any(|t| names::back_ref_field(t) == key)
            || self
                .child_types
                .iter()
                .any(|t| t == key || names::pluralize(t) == key)
    }
}

/// The type registry
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
    graph: DiGraph<String, Relation>,
    node_indices: HashMap<TypeId, NodeIndex>,
}

impl TypeRegistry {
    /// Build the registry from declarations.
    ///
    /// Pass one creates a descriptor per type; pass two resolves every parent
    /// and ref name and appends the inverse edge to its target. Any name that
    /// does not resolve is a fatal configuration error.
    pub fn build(decls: impl IntoIterator<Item = TypeDecl>) -> Result<Self, ConfigError> {
        let decls: Vec<TypeDecl> = decls.into_iter().collect();

        let mut descriptors = Vec::with_capacity(decls.len());
        let mut by_name = HashMap::with_capacity(decls.len());
        let mut graph = DiGraph::with_capacity(decls.len(), decls.len() * 2);
        let mut node_indices = HashMap::with_capacity(decls.len());

        for decl in &decls {
            if decl.name.is_empty() {
                return Err(ConfigError::EmptyTypeName);
            }
            let id = TypeId(descriptors.len());
            if by_name.insert(decl.name.clone(), id).is_some() {
                return Err(ConfigError::DuplicateType(decl.name.clone()));
            }
            node_indices.insert(id, graph.add_node(decl.name.clone()));
            descriptors.push(TypeDescriptor::from_decl(id, decl));
        }

        for decl in &decls {
            let id = by_name[&decl.name];
            for parent in &decl.parents {
                let parent_id = *by_name.get(parent).ok_or_else(|| ConfigError::UnresolvedParent {
                    type_name: decl.name.clone(),
                    parent: parent.clone(),
                })?;
                descriptors[parent_id.0].child_types.push(decl.name.clone());
                graph.add_edge(node_indices[&id], node_indices[&parent_id], Relation::Parent);
                debug!(child = %decl.name, parent = %parent, "derived child edge");
            }
            for target in &decl.refs {
                let target_id = *by_name.get(target).ok_or_else(|| ConfigError::UnresolvedRef {
                    type_name: decl.name.clone(),
                    target: target.clone(),
                })?;
                descriptors[target_id.0].back_ref_types.push(decl.name.clone());
                graph.add_edge(node_indices[&id], node_indices[&target_id], Relation::Ref);
                debug!(from = %decl.name, to = %target, "derived back-ref edge");
            }
        }

        info!(types = descriptors.len(), "type registry built");

        Ok(Self {
            descriptors,
            by_name,
            graph,
            node_indices,
        })
    }

    /// Look up a type by name
    pub fn lookup(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.by_name.get(type_name).map(|id| &self.descriptors[id.0])
    }

    /// Look up a type by name, failing with `UnknownType`
    pub fn descriptor(&self, type_name: &str) -> Result<&TypeDescriptor, ValidationError> {
        self.lookup(type_name)
            .ok_or_else(|| ValidationError::UnknownType(type_name.to_string()))
    }

    /// Descriptor behind a typed handle
    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.descriptors[id.0]
    }

    /// All type names in registration order
    pub fn all_type_names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Number of parent + ref edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Export the type graph in DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph TypeRegistry {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=rounded, fontname=\"Helvetica\"];\n");
        output.push('\n');

        for descriptor in &self.descriptors {
            let shape = if descriptor.is_root() { ", peripheries=2" } else { "" };
            output.push_str(&format!("  \"{}\" [label=\"{}\"{}];\n", descriptor.name, descriptor.name, shape));
        }
        output.push('\n');

        for descriptor in &self.descriptors {
            let node = self.node_indices[&descriptor.id];
            for edge in self.graph.edges(node) {
                let target = &self.graph[edge.target()];
                let style = match edge.weight() {
                    Relation::Parent => "[label=\"parent\"]",
                    Relation::Ref => "[label=\"ref\", style=dashed]",
                };
                output.push_str(&format!("  \"{}\" -> \"{}\" {};\n", descriptor.name, target, style));
            }
        }

        output.push_str("}\n");
        output
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.all_type_names())
            .field("edges", &self.edge_count())
            .finish()
    }
}
