//! Resource Catalog
//!
//! A catalog of typed, hierarchically-named resources rendered as shaped
//! JSON views.
//!
//! ## Features
//!
//! - **Declarative types**: parent, child, ref and back-ref relationships are
//!   derived from a static declaration table at startup
//! - **FQName addressing**: every entity is reachable by id or by its
//!   globally unique name chain, and the two are kept consistent
//! - **Attributed refs**: many-to-many links with a JSON payload, queryable
//!   in both directions
//! - **View projection**: summary/detail documents with field selection,
//!   strict filtering and ref/back-ref/children inclusion
//! - **Atomic writes**: an entity and its refs commit together or not at all
//!
//! ## Architecture
//!
//! ```text
//! declaration ──▶ registry ─────────────┐
//!                    │                  ▼
//! attributes ──▶ lifecycle ──▶ refs ──▶ store (memory | file)
//!                    │          ▲        ▲
//!                    ▼          │        │
//!                  catalog ──▶ projector ┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use resource_catalog::{Catalog, ViewConfig};
//! use serde_json::json;
//!
//! let catalog = Catalog::in_memory()?;
//! let domain = catalog.create("domain", json!({"name": "default"}))?;
//! catalog.create("project", json!({"fq_name": ["default", "juniper"]}))?;
//! let doc = catalog.get("domain", domain, &ViewConfig::single().with_children(true))?;
//! println!("{}", doc);
//! # Ok::<(), resource_catalog::CatalogError>(())
//! ```

pub mod attributes;
pub mod catalog;
pub mod config;
pub mod declaration;
pub mod error;
pub mod fqname;
pub mod lifecycle;
pub mod names;
pub mod projector;
pub mod refs;
pub mod registry;
pub mod store;
pub mod validation;
pub mod view;

pub use catalog::Catalog;
pub use config::CatalogConfig;
pub use declaration::{Declarations, TypeDecl};
pub use error::{CatalogError, ConfigError, Result, StorageError, ValidationError};
pub use fqname::FqName;
pub use lifecycle::EntityLifecycle;
pub use projector::Projector;
pub use refs::RefSpec;
pub use registry::{TypeDescriptor, TypeId, TypeRegistry};
pub use store::{FileStore, MemoryStore, Store};
pub use validation::PayloadValidator;
pub use view::{FetchScope, ListFilter, ViewConfig};
