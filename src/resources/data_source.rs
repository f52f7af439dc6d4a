use serde_json::{json, Value};
use tracing::debug;

use crate::client::{ApiFamily, Clients};
use crate::error::ProviderError;
use crate::fields::{self, Field};
use crate::query::{build_query, canonical_query, Filter};
use crate::schema::{Attribute, Schema};
use crate::validation::Constraint;

/// Page size used when fetching every page of a list.
pub const PAGE_SIZE: u64 = 100;

/// Both products take 32-bit paging parameters.
const PAGING_MAX: i64 = i32::MAX as i64;

const AZURE_PAGING: &[Constraint] = &[
    Constraint::IntRange {
        attribute: "offset",
        min: 0,
        max: PAGING_MAX,
    },
    Constraint::IntRange {
        attribute: "limit",
        min: 1,
        max: PAGING_MAX,
    },
];

const VBR_PAGING: &[Constraint] = &[
    Constraint::IntRange {
        attribute: "skip",
        min: 0,
        max: PAGING_MAX,
    },
    Constraint::IntRange {
        attribute: "limit",
        min: 1,
        max: PAGING_MAX,
    },
];

/// A read-only view over one list endpoint.
#[derive(Debug)]
pub struct ListDataSource {
    /// Data source type name.
    pub name: &'static str,
    /// Schema description.
    pub description: &'static str,
    /// Product the endpoint belongs to.
    pub family: ApiFamily,
    /// List endpoint path.
    pub path: &'static str,
    /// Arguments sent as query parameters.
    pub filters: &'static [Filter],
    /// Cross-field rules on the arguments.
    pub constraints: &'static [Constraint],
    /// Name of the computed list attribute holding the items.
    pub items_attribute: &'static str,
    /// Mapping of one item.
    pub item_fields: &'static [Field],
}

impl ListDataSource {
    /// Names of the paging arguments, following the product's conventions.
    fn paging_arguments(&self) -> (&'static str, &'static str) {
        match self.family {
            ApiFamily::Azure => ("offset", "limit"),
            ApiFamily::Vbr => ("skip", "limit"),
        }
    }

    /// Bounds on the paging arguments, checked alongside [`Self::constraints`].
    pub fn paging_constraints(&self) -> &'static [Constraint] {
        match self.family {
            ApiFamily::Azure => AZURE_PAGING,
            ApiFamily::Vbr => VBR_PAGING,
        }
    }

    /// Schema: filters and paging arguments in, `id`, items and `total_count` out.
    pub fn schema(&self) -> Schema {
        let (offset, limit) = self.paging_arguments();
        let schema = self
            .filters
            .iter()
            .fold(Schema::v0().with_description(self.description), |schema, f| {
                schema.with_attribute(f.attr, f.attribute())
            });

        schema
            .with_attribute(
                offset,
                Attribute::optional_int64().with_description("Number of items to skip"),
            )
            .with_attribute(
                limit,
                Attribute::optional_int64().with_description(
                    "Maximum number of items to return. \
                     When neither paging argument is set every page is fetched",
                ),
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                self.items_attribute,
                Attribute::computed_list(fields::object_type(self.item_fields)),
            )
            .with_attribute(
                "total_count",
                Attribute::computed_int64()
                    .with_description("Total number of matching items on the server"),
            )
    }

    /// Query the endpoint and build the data source state.
    pub async fn read(&self, clients: &Clients, config: &Value) -> Result<Value, ProviderError> {
        let client = clients.get(self.family)?;
        let query = build_query(config, self.filters);

        let (offset_arg, limit_arg) = self.paging_arguments();
        let offset = config.get(offset_arg).and_then(Value::as_u64);
        let limit = config.get(limit_arg).and_then(Value::as_u64);

        let page = if offset.is_some() || limit.is_some() {
            client
                .list_page(self.path, &query, offset.unwrap_or(0), limit.unwrap_or(PAGE_SIZE))
                .await?
        } else {
            client.list_all(self.path, &query, 0, PAGE_SIZE).await?
        };

        let items: Vec<Value> = page
            .items
            .iter()
            .map(|item| fields::flatten(item, self.item_fields))
            .collect();
        let total = page.total.unwrap_or(items.len() as u64);
        debug!(data_source = self.name, count = items.len(), total, "Read data source");

        let mut state = match config {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        state.insert("id".to_string(), json!(self.state_id(&query, offset, limit)));
        state.insert(self.items_attribute.to_string(), Value::Array(items));
        state.insert("total_count".to_string(), json!(total));
        Ok(Value::Object(state))
    }

    /// Deterministic id: the endpoint path plus the canonical query string.
    fn state_id(
        &self,
        query: &[(String, String)],
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> String {
        let paging = self.family.paging();
        let mut query = query.to_vec();
        if let Some(offset) = offset {
            query.push((paging.offset_param.to_string(), offset.to_string()));
        }
        if let Some(limit) = limit {
            query.push((paging.limit_param.to_string(), limit.to_string()));
        }

        let canonical = canonical_query(&query);
        if canonical.is_empty() {
            self.path.to_string()
        } else {
            format!("{}?{}", self.path, canonical)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::check_constraints;

    const ITEM_FIELDS: &[Field] = &[
        Field::string("id", "id").computed(),
        Field::string("name", "name").computed(),
    ];

    const FILTERS: &[Filter] = &[
        Filter::string("name_filter", "nameFilter"),
        Filter::bool("order_asc", "orderAsc"),
    ];

    const PROXIES: ListDataSource = ListDataSource {
        name: "veeam_vbr_test_proxies",
        description: "Backup proxies",
        family: ApiFamily::Vbr,
        path: "/backupInfrastructure/proxies",
        filters: FILTERS,
        constraints: &[Constraint::OneOf {
            attribute: "name_filter",
            allowed: &["a"],
        }],
        items_attribute: "proxies",
        item_fields: ITEM_FIELDS,
    };

    #[test]
    fn test_schema_shape() {
        let schema = PROXIES.schema();
        let attrs = &schema.block.attributes;

        assert!(attrs["name_filter"].flags.optional);
        assert!(attrs["skip"].flags.optional);
        assert!(attrs["limit"].flags.optional);
        assert!(!attrs.contains_key("offset"));
        assert!(attrs["proxies"].is_computed_only());
        assert!(attrs["total_count"].is_computed_only());
        assert!(attrs["id"].is_computed_only());
    }

    #[test]
    fn test_state_id_is_deterministic() {
        let a = vec![
            ("orderAsc".to_string(), "true".to_string()),
            ("nameFilter".to_string(), "proxy*".to_string()),
        ];
        let b: Vec<_> = a.iter().rev().cloned().collect();

        assert_eq!(PROXIES.state_id(&a, None, None), PROXIES.state_id(&b, None, None));
        assert_eq!(
            PROXIES.state_id(&a, Some(0), Some(10)),
            "/backupInfrastructure/proxies?limit=10&nameFilter=proxy*&orderAsc=true&skip=0"
        );
        assert_eq!(PROXIES.state_id(&[], None, None), "/backupInfrastructure/proxies");
    }

    #[test]
    fn test_constraints_apply_to_config() {
        let diagnostics = check_constraints(PROXIES.constraints, &json!({"name_filter": "b"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_paging_bounds() {
        let paging = PROXIES.paging_constraints();
        assert!(check_constraints(paging, &json!({"skip": 0, "limit": 1})).is_empty());

        let diagnostics = check_constraints(paging, &json!({"skip": -5, "limit": 0}));
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].summary.contains("'skip'"));
        assert!(diagnostics[1].summary.contains("'limit'"));
    }
}
