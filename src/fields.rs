//! Mapping between provider state and Veeam API models.
//!
//! Every data source item and resource is described by a static table of
//! [`Field`]s. A field ties one state attribute to a dotted path in the API
//! JSON, so the same table drives the schema, the request body
//! ([`expand`]) and the state written back after a call ([`flatten`]).
//!
//! ```
//! use hemmer_provider_veeam::fields::{expand, flatten, Field};
//! use serde_json::json;
//!
//! const FIELDS: &[Field] = &[
//!     Field::string("id", "id").computed(),
//!     Field::string("name", "name").required(),
//!     Field::string("azure_storage_folder", "azureStorageFolder.name"),
//! ];
//!
//! let body = expand(&json!({"name": "repo-01", "azure_storage_folder": "backups"}), FIELDS);
//! assert_eq!(body, json!({"name": "repo-01", "azureStorageFolder": {"name": "backups"}}));
//!
//! let state = flatten(&json!({"id": "42", "name": "repo-01"}), FIELDS);
//! assert_eq!(state["azure_storage_folder"], "");
//! ```

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock};

/// The shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// A string.
    String,
    /// An integer.
    Int,
    /// A boolean.
    Bool,
    /// A list of strings.
    StringList,
    /// A list of ids, wrapped in objects under the given key on the API side:
    /// `["x"]` in state is `[{"regionId": "x"}]` in the API.
    IdList(&'static str),
    /// A nested object. Input objects are single nested blocks in the schema.
    Object(&'static [Field]),
    /// A list of nested objects.
    ObjectList(&'static [Field]),
}

/// Who sets a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Set by the user and echoed back by the API.
    Input,
    /// Set by the API only.
    Computed,
    /// Sent to the API but never returned, e.g. passwords.
    WriteOnly,
}

/// Default applied to an unset optional input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    /// No default.
    None,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Int(i64),
    /// String default.
    Str(&'static str),
}

impl FieldDefault {
    fn to_value(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Bool(b) => Some(json!(b)),
            Self::Int(n) => Some(json!(n)),
            Self::Str(s) => Some(json!(s)),
        }
    }
}

/// One state attribute and where it lives in the API model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    /// State attribute name.
    pub attr: &'static str,
    /// Dotted path in the API JSON.
    pub api: &'static str,
    /// Value shape.
    pub kind: FieldKind,
    /// Who sets the value.
    pub mode: FieldMode,
    /// The attribute must be configured.
    pub required: bool,
    /// Changing the attribute replaces the object.
    pub force_new: bool,
    /// Hide the value in plan output.
    pub sensitive: bool,
    /// Default for an unset optional input.
    pub default: FieldDefault,
    /// Schema description.
    pub description: &'static str,
}

impl Field {
    /// An optional input of the given kind.
    pub const fn new(attr: &'static str, api: &'static str, kind: FieldKind) -> Self {
        Self {
            attr,
            api,
            kind,
            mode: FieldMode::Input,
            required: false,
            force_new: false,
            sensitive: false,
            default: FieldDefault::None,
            description: "",
        }
    }

    /// A string field.
    pub const fn string(attr: &'static str, api: &'static str) -> Self {
        Self::new(attr, api, FieldKind::String)
    }

    /// An integer field.
    pub const fn int(attr: &'static str, api: &'static str) -> Self {
        Self::new(attr, api, FieldKind::Int)
    }

    /// A boolean field.
    pub const fn bool(attr: &'static str, api: &'static str) -> Self {
        Self::new(attr, api, FieldKind::Bool)
    }

    /// A string list field.
    pub const fn string_list(attr: &'static str, api: &'static str) -> Self {
        Self::new(attr, api, FieldKind::StringList)
    }

    /// An id list wrapped under `key` on the API side.
    pub const fn id_list(attr: &'static str, api: &'static str, key: &'static str) -> Self {
        Self::new(attr, api, FieldKind::IdList(key))
    }

    /// A nested object field.
    pub const fn object(attr: &'static str, api: &'static str, fields: &'static [Field]) -> Self {
        Self::new(attr, api, FieldKind::Object(fields))
    }

    /// A nested object list field.
    pub const fn object_list(
        attr: &'static str,
        api: &'static str,
        fields: &'static [Field],
    ) -> Self {
        Self::new(attr, api, FieldKind::ObjectList(fields))
    }

    /// Mark the field as set by the API only.
    pub const fn computed(self) -> Self {
        Self {
            mode: FieldMode::Computed,
            ..self
        }
    }

    /// Mark the field as sent but never read back.
    pub const fn write_only(self) -> Self {
        Self {
            mode: FieldMode::WriteOnly,
            ..self
        }
    }

    /// Mark the field as required.
    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    /// Mark the field as forcing replacement when changed.
    pub const fn force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
    }

    /// Mark the field as sensitive.
    pub const fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }

    /// Set a default value.
    pub const fn defaults_to(self, default: FieldDefault) -> Self {
        Self { default, ..self }
    }

    /// Set the schema description.
    pub const fn describe(self, description: &'static str) -> Self {
        Self {
            description,
            ..self
        }
    }

    /// Schema type of the flattened value.
    pub fn attribute_type(&self) -> AttributeType {
        match self.kind {
            FieldKind::String => AttributeType::String,
            FieldKind::Int => AttributeType::Int64,
            FieldKind::Bool => AttributeType::Bool,
            FieldKind::StringList | FieldKind::IdList(_) => {
                AttributeType::list(AttributeType::String)
            },
            FieldKind::Object(fields) => object_type(fields),
            FieldKind::ObjectList(fields) => AttributeType::list(object_type(fields)),
        }
    }

    fn flags(&self) -> AttributeFlags {
        let flags = match (self.mode, self.required) {
            (FieldMode::Computed, _) => AttributeFlags::computed(),
            (_, true) => AttributeFlags::required(),
            // Unset inputs keep the value the server chose, unless a default applies.
            (FieldMode::Input, false) if self.default == FieldDefault::None => {
                AttributeFlags::optional_computed()
            },
            (_, false) => AttributeFlags::optional(),
        };
        if self.sensitive {
            flags.sensitive()
        } else {
            flags
        }
    }

    fn schema_attribute(&self) -> Attribute {
        let mut attr = Attribute::new(self.attribute_type(), self.flags());
        if !self.description.is_empty() {
            attr = attr.with_description(self.description);
        }
        if self.force_new {
            attr = attr.with_force_new();
        }
        if let Some(default) = self.default.to_value() {
            attr = attr.with_default(default);
        }
        attr
    }
}

/// Object type of a flattened field table, used for computed list items.
pub fn object_type(fields: &[Field]) -> AttributeType {
    AttributeType::object(
        fields
            .iter()
            .filter(|f| f.mode != FieldMode::WriteOnly)
            .map(|f| (f.attr.to_string(), f.attribute_type()))
            .collect::<HashMap<_, _>>(),
    )
}

/// Build a schema block from a field table.
///
/// Input objects become nested blocks; computed objects become attributes.
pub fn block(fields: &[Field]) -> Block {
    fields.iter().fold(Block::new(), |block, field| {
        let nested = match (field.kind, field.mode) {
            (FieldKind::Object(sub), FieldMode::Input) => {
                Some(NestedBlock::single(self::block(sub)))
            },
            (FieldKind::ObjectList(sub), FieldMode::Input) => {
                Some(NestedBlock::list(self::block(sub)))
            },
            _ => None,
        };
        match nested {
            Some(mut nested) => {
                if field.required {
                    nested = nested.with_min_items(1);
                }
                if !field.description.is_empty() {
                    nested.block = nested.block.with_description(field.description);
                }
                block.with_block(field.attr, nested)
            },
            None => block.with_attribute(field.attr, field.schema_attribute()),
        }
    })
}

/// Build state from an API object.
///
/// Absent primitives become their zero value and absent lists become empty,
/// so state never carries nulls for scalar attributes. Absent objects are
/// `null`. Write-only fields are skipped.
pub fn flatten(api: &Value, fields: &[Field]) -> Value {
    let mut state = Map::new();
    for field in fields.iter().filter(|f| f.mode != FieldMode::WriteOnly) {
        state.insert(field.attr.to_string(), flatten_value(get_path(api, field.api), field.kind));
    }
    Value::Object(state)
}

fn flatten_value(raw: Option<&Value>, kind: FieldKind) -> Value {
    match kind {
        FieldKind::String => match raw {
            Some(Value::String(s)) => json!(s),
            Some(Value::Null) | None => json!(""),
            Some(other) => json!(other.to_string()),
        },
        FieldKind::Int => {
            let n = raw
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
                .unwrap_or(0);
            json!(n)
        },
        FieldKind::Bool => Value::Bool(raw.and_then(Value::as_bool).unwrap_or(false)),
        FieldKind::StringList => Value::Array(
            raw.and_then(Value::as_array)
                .map(|items| items.iter().filter(|v| v.is_string()).cloned().collect())
                .unwrap_or_default(),
        ),
        FieldKind::IdList(key) => Value::Array(
            raw.and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get(key).unwrap_or(item).as_str())
                        .map(|id| json!(id))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        FieldKind::Object(sub) => match raw {
            Some(v @ Value::Object(_)) => flatten(v, sub),
            _ => Value::Null,
        },
        FieldKind::ObjectList(sub) => Value::Array(
            raw.and_then(Value::as_array)
                .map(|items| items.iter().map(|item| flatten(item, sub)).collect())
                .unwrap_or_default(),
        ),
    }
}

/// Build an API request body from state or configuration.
///
/// Unset attributes are left out of the body entirely, as are computed
/// fields and nested objects with nothing set.
pub fn expand(state: &Value, fields: &[Field]) -> Value {
    let mut body = Value::Object(Map::new());
    for field in fields.iter().filter(|f| f.mode != FieldMode::Computed) {
        let Some(value) = state.get(field.attr).filter(|v| !v.is_null()) else {
            continue;
        };
        if let Some(expanded) = expand_value(value, field.kind) {
            set_path(&mut body, field.api, expanded);
        }
    }
    body
}

fn expand_value(value: &Value, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::IdList(key) => Some(Value::Array(
            value
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(|id| json!({ key: id }))
                .collect(),
        )),
        FieldKind::Object(sub) => {
            let object = match value {
                Value::Array(items) => items.first()?,
                v => v,
            };
            let expanded = expand(object, sub);
            let empty = expanded.as_object().is_some_and(Map::is_empty);
            (!empty).then_some(expanded)
        },
        FieldKind::ObjectList(sub) => Some(Value::Array(
            value.as_array()?.iter().map(|item| expand(item, sub)).collect(),
        )),
        _ => Some(value.clone()),
    }
}

/// Whether a value is the zero filler [`flatten`] writes for an absent field.
pub fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Build an update body from the planned state.
///
/// Like [`expand`], but optional fields without a default whose value is a
/// zero filler carried over unchanged from `prior` are left out.
pub fn expand_update(prior: &Value, planned: &Value, fields: &[Field]) -> Value {
    let mut body = Value::Object(Map::new());
    for field in fields.iter().filter(|f| f.mode != FieldMode::Computed) {
        let Some(value) = planned.get(field.attr).filter(|v| !v.is_null()) else {
            continue;
        };
        let previous = prior.get(field.attr).unwrap_or(&NULL);
        let expanded = match field.kind {
            FieldKind::Object(sub) => {
                let expanded = expand_update(single(previous), single(value), sub);
                let empty = expanded.as_object().is_some_and(Map::is_empty);
                (!empty).then_some(expanded)
            },
            FieldKind::ObjectList(sub) => value.as_array().map(|items| {
                let before = previous.as_array();
                let expanded = items.iter().enumerate().map(|(i, item)| {
                    let old = before.and_then(|b| b.get(i)).unwrap_or(&NULL);
                    expand_update(old, item, sub)
                });
                Value::Array(expanded.collect())
            }),
            _ if is_filler(field, value, previous) => None,
            kind => expand_value(value, kind),
        };
        if let Some(expanded) = expanded {
            set_path(&mut body, field.api, expanded);
        }
    }
    body
}

static NULL: Value = Value::Null;

fn is_filler(field: &Field, value: &Value, previous: &Value) -> bool {
    !field.required
        && field.default == FieldDefault::None
        && is_zero_value(value)
        && value == previous
}

fn single(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(&NULL),
        v => v,
    }
}

/// Overlay freshly flattened API values onto a prior state.
///
/// Keys absent from `fresh` keep their prior value, which is how write-only
/// inputs such as passwords survive a read.
pub fn merge_state(prior: &Value, fresh: Value) -> Value {
    match (prior, fresh) {
        (Value::Object(prior), Value::Object(fresh)) => {
            let mut merged = prior.clone();
            for (key, value) in fresh {
                let value = match merged.get(&key) {
                    Some(existing) => merge_state(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            Value::Object(merged)
        },
        (_, fresh) => fresh,
    }
}

/// Resolve a dotted path in a JSON object.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, part| current.get(part))
}

/// Set a dotted path in a JSON object, creating intermediate objects.
pub fn set_path(target: &mut Value, path: &str, value: Value) {
    let mut current = target;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BlockNestingMode;

    const RETENTION: &[Field] = &[
        Field::int("time_retention_duration", "timeRetentionDuration"),
        Field::string("retention_duration_type", "retentionDurationType"),
    ];

    const SCHEDULE: &[Field] = &[
        Field::string("daily_type", "dailyType").required(),
        Field::string_list("selected_days", "selectedDays"),
        Field::object("retention", "backupSchedule.retention", RETENTION),
    ];

    const POLICY: &[Field] = &[
        Field::string("id", "id").computed(),
        Field::string("name", "name").required(),
        Field::bool("is_enabled", "isEnabled").defaults_to(FieldDefault::Bool(true)),
        Field::id_list("regions", "regions", "regionId").required(),
        Field::string("password", "password").write_only().sensitive(),
        Field::string("tenant_id", "tenantId").force_new(),
        Field::int("priority", "priority").computed(),
        Field::object("daily_schedule", "dailySchedule", SCHEDULE),
    ];

    #[test]
    fn test_flatten_defaults_absent_values() {
        let state = flatten(&json!({"id": "p-1", "name": "sql-daily"}), POLICY);

        assert_eq!(state["id"], "p-1");
        assert_eq!(state["is_enabled"], false);
        assert_eq!(state["regions"], json!([]));
        assert_eq!(state["tenant_id"], "");
        assert_eq!(state["priority"], 0);
        assert_eq!(state["daily_schedule"], Value::Null);
        assert!(state.get("password").is_none());
    }

    #[test]
    fn test_flatten_nested_and_id_lists() {
        let api = json!({
            "id": "p-1",
            "name": "sql-daily",
            "isEnabled": true,
            "regions": [{"regionId": "eastus"}, {"regionId": "westeurope"}],
            "priority": 3,
            "dailySchedule": {
                "dailyType": "SelectedDays",
                "selectedDays": ["Monday", "Friday"],
                "backupSchedule": {
                    "retention": {"timeRetentionDuration": 14, "retentionDurationType": "Days"}
                }
            }
        });

        let state = flatten(&api, POLICY);
        assert_eq!(state["regions"], json!(["eastus", "westeurope"]));
        assert_eq!(state["priority"], 3);
        assert_eq!(state["daily_schedule"]["selected_days"], json!(["Monday", "Friday"]));
        assert_eq!(
            state["daily_schedule"]["retention"],
            json!({"time_retention_duration": 14, "retention_duration_type": "Days"})
        );
    }

    #[test]
    fn test_expand_skips_unset_and_computed() {
        let state = json!({
            "id": "p-1",
            "name": "sql-daily",
            "is_enabled": null,
            "regions": ["eastus"],
            "password": "s3cret",
            "priority": 9,
            "daily_schedule": {
                "daily_type": "EveryDay",
                "selected_days": null,
                "retention": {"time_retention_duration": 7, "retention_duration_type": null}
            }
        });

        let body = expand(&state, POLICY);
        assert_eq!(
            body,
            json!({
                "name": "sql-daily",
                "regions": [{"regionId": "eastus"}],
                "password": "s3cret",
                "dailySchedule": {
                    "dailyType": "EveryDay",
                    "backupSchedule": {"retention": {"timeRetentionDuration": 7}}
                }
            })
        );
    }

    #[test]
    fn test_expand_omits_empty_objects() {
        let state = json!({"name": "x", "daily_schedule": [{"retention": {}}]});
        assert_eq!(expand(&state, POLICY), json!({"name": "x"}));
    }

    #[test]
    fn test_expand_update_skips_unchanged_fillers() {
        let prior = flatten(
            &json!({
                "id": "p-1",
                "name": "sql-daily",
                "isEnabled": false,
                "regions": [{"regionId": "eastus"}],
                "dailySchedule": {"dailyType": "EveryDay"}
            }),
            POLICY,
        );
        let mut planned = prior.clone();
        planned["name"] = json!("sql-nightly");

        let body = expand_update(&prior, &planned, POLICY);
        assert_eq!(
            body,
            json!({
                "name": "sql-nightly",
                "isEnabled": false,
                "regions": [{"regionId": "eastus"}],
                "dailySchedule": {"dailyType": "EveryDay"}
            })
        );
    }

    #[test]
    fn test_expand_update_sends_cleared_values() {
        let prior = json!({"name": "sql-daily", "tenant_id": "t-1", "regions": ["eastus"]});
        let planned = json!({"name": "sql-daily", "tenant_id": "", "regions": ["eastus"]});

        let body = expand_update(&prior, &planned, POLICY);
        assert_eq!(body["tenantId"], "");
    }

    #[test]
    fn test_merge_state_keeps_write_only() {
        let prior = json!({"id": "p-1", "name": "old", "password": "s3cret"});
        let fresh = flatten(&json!({"id": "p-1", "name": "new"}), POLICY);

        let merged = merge_state(&prior, fresh);
        assert_eq!(merged["password"], "s3cret");
        assert_eq!(merged["name"], "new");
    }

    #[test]
    fn test_block_from_fields() {
        let block = block(POLICY);

        assert!(block.attributes["id"].is_computed_only());
        assert!(block.attributes["name"].flags.required);
        assert!(block.attributes["tenant_id"].force_new);
        assert!(block.attributes["tenant_id"].flags.computed);
        assert!(block.attributes["password"].flags.sensitive);
        assert!(!block.attributes["password"].flags.computed);
        assert_eq!(block.attributes["is_enabled"].default, Some(json!(true)));
        assert_eq!(
            block.attributes["regions"].attr_type,
            AttributeType::list(AttributeType::String)
        );

        let schedule = &block.blocks["daily_schedule"];
        assert_eq!(schedule.nesting_mode, BlockNestingMode::Single);
        assert!(schedule.block.attributes["daily_type"].flags.required);
        assert!(schedule.block.blocks.contains_key("retention"));
    }

    #[test]
    fn test_object_type_skips_write_only() {
        let AttributeType::Object(attrs) = object_type(POLICY) else {
            panic!("expected object type");
        };
        assert!(!attrs.contains_key("password"));
        assert_eq!(attrs["priority"], AttributeType::Int64);
    }

    #[test]
    fn test_paths() {
        let mut body = json!({});
        set_path(&mut body, "share.gatewayServer.autoSelectEnabled", json!(true));
        set_path(&mut body, "share.sharePath", json!("\\\\nas\\backups"));
        assert_eq!(
            get_path(&body, "share.gatewayServer.autoSelectEnabled"),
            Some(&json!(true))
        );
        assert_eq!(body["share"]["sharePath"], "\\\\nas\\backups");
        assert!(get_path(&body, "share.credentialsId").is_none());
    }
}
