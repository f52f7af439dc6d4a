//! Query string assembly for data source arguments.

use serde_json::Value;

use crate::schema::{Attribute, AttributeFlags, AttributeType};

/// The shape of a filter argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// A string argument.
    String,
    /// A boolean argument, rendered as `true`/`false`.
    Bool,
    /// A list of strings; the parameter is repeated once per element.
    StringList,
}

/// A data source argument that maps to a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    /// Argument name in the configuration.
    pub attr: &'static str,
    /// Query parameter name.
    pub param: &'static str,
    /// Argument shape.
    pub kind: FilterKind,
    /// Schema description.
    pub description: &'static str,
}

impl Filter {
    const fn new(attr: &'static str, param: &'static str, kind: FilterKind) -> Self {
        Self {
            attr,
            param,
            kind,
            description: "",
        }
    }

    /// A string filter.
    pub const fn string(attr: &'static str, param: &'static str) -> Self {
        Self::new(attr, param, FilterKind::String)
    }

    /// A boolean filter.
    pub const fn bool(attr: &'static str, param: &'static str) -> Self {
        Self::new(attr, param, FilterKind::Bool)
    }

    /// A repeated string filter.
    pub const fn string_list(attr: &'static str, param: &'static str) -> Self {
        Self::new(attr, param, FilterKind::StringList)
    }

    /// Set the schema description.
    pub const fn describe(self, description: &'static str) -> Self {
        Self {
            description,
            ..self
        }
    }

    /// The optional schema attribute for this argument.
    pub fn attribute(&self) -> Attribute {
        let attr = Attribute::new(filter_type(self.kind), AttributeFlags::optional());
        if self.description.is_empty() {
            attr
        } else {
            attr.with_description(self.description)
        }
    }

    fn render(&self, value: &Value, query: &mut Vec<(String, String)>) {
        let mut push = |v: String| query.push((self.param.to_string(), v));
        match (self.kind, value) {
            (FilterKind::StringList, Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).for_each(|s| push(s.to_string()));
            },
            (_, Value::String(s)) => push(s.clone()),
            (_, Value::Bool(b)) => push(b.to_string()),
            (_, Value::Number(n)) => push(n.to_string()),
            _ => {},
        }
    }
}

/// Build query parameters from a data source configuration.
///
/// Unset (absent or null) arguments are skipped. Parameters keep the order
/// of `filters`.
pub fn build_query(config: &Value, filters: &[Filter]) -> Vec<(String, String)> {
    let mut query = Vec::new();
    for filter in filters {
        if let Some(value) = config.get(filter.attr).filter(|v| !v.is_null()) {
            filter.render(value, &mut query);
        }
    }
    query
}

/// Render query parameters as a sorted, percent-encoded string.
///
/// Two configurations with the same arguments always produce the same
/// string, whatever order the parameters were collected in.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut sorted: Vec<_> = query.iter().collect();
    sorted.sort();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted)
        .finish()
}

/// Schema type of a filter argument.
pub fn filter_type(kind: FilterKind) -> AttributeType {
    match kind {
        FilterKind::String => AttributeType::String,
        FilterKind::Bool => AttributeType::Bool,
        FilterKind::StringList => AttributeType::list(AttributeType::String),
    }
}
