//! Ref graph
//!
//! Refs are attributed, directed many-to-many links between entities. Each
//! (from type, to type) pair has its own table; rows snapshot both FQNames at
//! write time and are never rewritten afterwards.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::fqname::{self, FqName};
use crate::names;
use crate::store::{ReadTxn, RefFilter, RefRow, Transaction};

/// Target of one ref entry, as supplied under `<type>_refs`.
///
/// Either `uuid` or `to` addresses the target; `uuid` wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RefSpec {
    #[serde(default, deserialize_with = "blank_uuid")]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub to: Option<FqName>,
    #[serde(default)]
    pub attr: Value,
}

/// An empty string counts as an unset uuid
fn blank_uuid<'de, D>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

impl RefSpec {
    pub fn by_id(uuid: Uuid) -> Self {
        Self {
            uuid: Some(uuid),
            ..Self::default()
        }
    }

    pub fn by_name(to: FqName) -> Self {
        Self {
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, attr: Value) -> Self {
        self.attr = attr;
        self
    }
}

/// The "from" side of a ref being written
#[derive(Debug, Clone, Copy)]
pub struct RefSource<'a> {
    pub type_name: &'a str,
    pub id: Uuid,
    pub fq_name: &'a FqName,
}

/// Resolve `spec` against `to_type` and persist one ref row.
///
/// Fails with `NotFound` when the target does not exist.
pub fn add_ref<T>(txn: &mut T, from: RefSource<'_>, to_type: &str, spec: &RefSpec) -> Result<RefRow>
where
    T: Transaction + ?Sized,
{
    let (to_id, to_fq_name) = match (spec.uuid, &spec.to) {
        (Some(id), _) => (id, fqname::resolve_name_by_id(&*txn, to_type, id)?),
        (None, Some(to)) => (fqname::resolve_id_by_name(&*txn, to_type, to)?, to.clone()),
        (None, None) => {
            return Err(ValidationError::invalid_field(
                names::ref_field(to_type),
                "ref entry needs uuid or to",
            )
            .into())
        }
    };

    let row = RefRow {
        from_id: from.id,
        to_id,
        from_fq_name: from.fq_name.encode(),
        to_fq_name: to_fq_name.encode(),
        attr: spec.attr.clone(),
    };
    txn.insert_ref(&names::ref_table(from.type_name, to_type), row.clone())?;
    debug!(from = %from.id, to = %to_id, "{} ref added", names::ref_table(from.type_name, to_type));
    Ok(row)
}

/// Refs from `from_id` (a `from_type`) to entities of `to_type`
pub fn forward_refs<T>(txn: &T, from_type: &str, from_id: Uuid, to_type: &str) -> Result<Vec<RefRow>>
where
    T: ReadTxn + ?Sized,
{
    Ok(txn.find_refs(&names::ref_table(from_type, to_type), &RefFilter::from(from_id))?)
}

/// Refs from entities of `from_type` to `to_id` (a `to_type`)
pub fn backward_refs<T>(txn: &T, to_type: &str, to_id: Uuid, from_type: &str) -> Result<Vec<RefRow>>
where
    T: ReadTxn + ?Sized,
{
    Ok(txn.find_refs(&names::ref_table(from_type, to_type), &RefFilter::to(to_id))?)
}
