//! View configuration and collection filters
//!
//! Both can be built directly or parsed from query-string pairs
//! (`fields=a,b&strict_fields&exclude_back_refs=false`).

use uuid::Uuid;

use crate::error::ValidationError;
use crate::fqname::FqName;

/// Single-entity or collection fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    Single,
    Collection,
}

/// How an entity document is shaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub show_details: bool,
    pub strict_fields: bool,
    pub fields: Vec<String>,
    pub show_refs: bool,
    pub show_back_refs: bool,
    pub show_children: bool,
}

impl ViewConfig {
    /// Default for a single fetch: details and refs
    pub fn single() -> Self {
        Self {
            show_details: true,
            strict_fields: false,
            fields: Vec::new(),
            show_refs: true,
            show_back_refs: false,
            show_children: false,
        }
    }

    /// Default for a collection fetch: summaries only
    pub fn collection() -> Self {
        Self {
            show_details: false,
            show_refs: false,
            ..Self::single()
        }
    }

    pub fn for_scope(scope: FetchScope) -> Self {
        match scope {
            FetchScope::Single => Self::single(),
            FetchScope::Collection => Self::collection(),
        }
    }

    pub fn with_details(mut self, show: bool) -> Self {
        self.show_details = show;
        self
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_fields = true;
        self
    }

    pub fn with_refs(mut self, show: bool) -> Self {
        self.show_refs = show;
        self
    }

    pub fn with_back_refs(mut self, show: bool) -> Self {
        self.show_back_refs = show;
        self
    }

    pub fn with_children(mut self, show: bool) -> Self {
        self.show_children = show;
        self
    }

    /// Parse query pairs on top of the scope's defaults.
    ///
    /// `detail=true` only applies to collections. The `exclude_*` flags are
    /// ignored when `fields` is present.
    pub fn from_query<K, V>(scope: FetchScope, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut view = Self::for_scope(scope);

        if scope == FetchScope::Collection {
            view.show_details = values(pairs, "detail").any(|v| v == "true");
        }
        if values(pairs, "strict_fields").next().is_some() {
            view.strict_fields = true;
        }

        let fields: Vec<String> = values(pairs, "fields").flat_map(split_list).collect();
        if values(pairs, "fields").next().is_some() {
            view.fields = fields;
            return view;
        }

        if let Some(exclude) = flag(pairs, "exclude_refs") {
            view.show_refs = !exclude;
        }
        if let Some(exclude) = flag(pairs, "exclude_back_refs") {
            view.show_back_refs = !exclude;
        }
        if let Some(exclude) = flag(pairs, "exclude_children") {
            view.show_children = !exclude;
        }
        view
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::single()
    }
}

/// Restrictions on a collection fetch, combined with AND.
/// An empty list does not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub obj_uuids: Vec<Uuid>,
    pub parent_ids: Vec<Uuid>,
    pub fq_names: Vec<FqName>,
}

impl ListFilter {
    pub fn is_empty(&self) -> bool {
        self.obj_uuids.is_empty() && self.parent_ids.is_empty() && self.fq_names.is_empty()
    }

    /// Parse `obj_uuids`, `parent_id` and `fq_name_str` (colon-joined names)
    pub fn from_query<K, V>(pairs: &[(K, V)]) -> Result<Self, ValidationError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Self {
            obj_uuids: uuid_list(pairs, "obj_uuids")?,
            parent_ids: uuid_list(pairs, "parent_id")?,
            fq_names: values(pairs, "fq_name_str")
                .flat_map(split_list)
                .map(|s| FqName::from_colon_str(&s))
                .collect(),
        })
    }
}

/// Split `a=1&b&c=x,y` into pairs. No percent-decoding.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

fn values<'a, K, V>(pairs: &'a [(K, V)], key: &'a str) -> impl Iterator<Item = &'a str> + 'a
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .filter(move |(k, _)| k.as_ref() == key)
        .map(|(_, v)| v.as_ref())
}

/// Present-without-value counts as true
fn flag<K, V>(pairs: &[(K, V)], key: &str) -> Option<bool>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    values(pairs, key).last().map(|v| v.is_empty() || v == "true")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn uuid_list<K, V>(pairs: &[(K, V)], key: &str) -> Result<Vec<Uuid>, ValidationError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    values(pairs, key)
        .flat_map(split_list)
        .map(|s| {
            Uuid::parse_str(&s).map_err(|e| ValidationError::invalid_field(key, format!("{}: {}", s, e)))
        })
        .collect()
}
