//! Configuration validation.
//!
//! Two layers run before anything is sent to a Veeam server:
//!
//! - [`validate`] checks a `serde_json::Value` against a [`Schema`]: required
//!   attributes, attribute types, and nested block counts.
//! - [`check_constraints`] applies cross-field [`Constraint`]s, for rules such
//!   as "`share` is required when `type` is `Smb`" that a schema alone
//!   cannot express.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_veeam::schema::{Attribute, Schema};
//! use hemmer_provider_veeam::validation::{check_constraints, validate, Condition, Constraint};
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("enable_encryption", Attribute::optional_bool())
//!     .with_attribute("password", Attribute::optional_string().sensitive());
//!
//! let config = json!({"enable_encryption": true});
//! assert!(validate(&schema, &config).is_empty());
//!
//! let constraints = [Constraint::RequiredWhen {
//!     attribute: "password",
//!     when: Condition::IsTrue("enable_encryption"),
//! }];
//! let diagnostics = check_constraints(&constraints, &config);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("password".to_string()));
//! ```

use crate::fields::is_zero_value;
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema,
};
use serde_json::Value;
use std::collections::HashMap;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Object(attrs) => match value.as_object() {
            Some(obj) => validate_object_type(attrs, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Object members carry no required/optional flags; only present members are checked.
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail(format!(
                            "At least {} block(s) required",
                            nested.min_items
                        ))
                        .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        (BlockNestingMode::List, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // max_items of 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        (BlockNestingMode::List, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

// =========================================================================
// Cross-field constraints
// =========================================================================

/// A predicate over another attribute of the same configuration.
///
/// Attribute names are dotted paths that may step through single nested
/// blocks, e.g. `repository.path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// The attribute is a string equal to one of the listed values.
    In {
        /// Attribute path.
        attribute: &'static str,
        /// Accepted values.
        values: &'static [&'static str],
    },
    /// The attribute is set to `true`.
    IsTrue(&'static str),
    /// The attribute is set to a non-null, non-empty value.
    IsSet(&'static str),
}

impl Condition {
    /// Evaluate the condition against a configuration object.
    pub fn holds(&self, config: &Value) -> bool {
        match self {
            Self::In { attribute, values } => lookup(config, attribute)
                .and_then(Value::as_str)
                .is_some_and(|s| values.contains(&s)),
            Self::IsTrue(attribute) => lookup(config, attribute)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Self::IsSet(attribute) => lookup(config, attribute).is_some(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::In { attribute, values } if values.len() == 1 => {
                format!("{} is \"{}\"", attribute, values[0])
            },
            Self::In { attribute, values } => {
                format!("{} is one of {}", attribute, quoted_list(values))
            },
            Self::IsTrue(attribute) => format!("{} is true", attribute),
            Self::IsSet(attribute) => format!("{} is set", attribute),
        }
    }
}

/// A cross-field validation rule evaluated at validate and plan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// A string attribute, when set, must be one of the allowed values.
    OneOf {
        /// Attribute path.
        attribute: &'static str,
        /// Allowed values.
        allowed: &'static [&'static str],
    },
    /// An integer attribute, when set, must lie in `min..=max`.
    IntRange {
        /// Attribute path.
        attribute: &'static str,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// The attribute must be set whenever the condition holds.
    RequiredWhen {
        /// Attribute path.
        attribute: &'static str,
        /// Triggering condition.
        when: Condition,
    },
    /// The attribute may only be set while the condition holds.
    OnlyWhen {
        /// Attribute path.
        attribute: &'static str,
        /// Condition under which the attribute is allowed.
        when: Condition,
    },
    /// At most one of the attributes may be set.
    ConflictsWith {
        /// Mutually exclusive attribute paths.
        attributes: &'static [&'static str],
    },
}

impl Constraint {
    fn check(&self, config: &Value, diagnostics: &mut Vec<Diagnostic>) {
        match *self {
            Self::OneOf { attribute, allowed } => {
                let Some(value) = lookup(config, attribute) else {
                    return;
                };
                if !value.as_str().is_some_and(|s| allowed.contains(&s)) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", attribute))
                            .with_detail(format!(
                                "Expected one of {}, got {}",
                                quoted_list(allowed),
                                value
                            ))
                            .with_attribute(attribute),
                    );
                }
            },
            Self::IntRange { attribute, min, max } => {
                let Some(value) = lookup(config, attribute) else {
                    return;
                };
                let in_range = value.as_i64().is_some_and(|n| (min..=max).contains(&n));
                if !in_range {
                    diagnostics.push(
                        Diagnostic::error(format!(
                            "Value out of range for attribute '{}'",
                            attribute
                        ))
                        .with_detail(format!(
                            "Expected a value between {} and {}, got {}",
                            min, max, value
                        ))
                        .with_attribute(attribute),
                    );
                }
            },
            Self::RequiredWhen { attribute, when } => {
                if when.holds(config) && lookup(config, attribute).is_none() {
                    diagnostics.push(
                        Diagnostic::error(format!("Missing required attribute '{}'", attribute))
                            .with_detail(format!("Required when {}", when.describe()))
                            .with_attribute(attribute),
                    );
                }
            },
            Self::OnlyWhen { attribute, when } => {
                if lookup(config, attribute).is_some() && !when.holds(config) {
                    diagnostics.push(
                        Diagnostic::error(format!("Attribute '{}' is not allowed", attribute))
                            .with_detail(format!("Only valid when {}", when.describe()))
                            .with_attribute(attribute),
                    );
                }
            },
            Self::ConflictsWith { attributes } => {
                let set: Vec<&str> = attributes
                    .iter()
                    .copied()
                    .filter(|a| lookup(config, a).is_some())
                    .collect();
                if set.len() > 1 {
                    diagnostics.push(
                        Diagnostic::error("Conflicting attributes")
                            .with_detail(format!(
                                "Only one of {} may be set, got {}",
                                attributes.join(", "),
                                set.join(", ")
                            ))
                            .with_attribute(set[1]),
                    );
                }
            },
        }
    }
}

/// Evaluate constraints against a configuration object.
pub fn check_constraints(constraints: &[Constraint], config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for constraint in constraints {
        constraint.check(config, &mut diagnostics);
    }
    diagnostics
}

/// Resolve a dotted attribute path, treating null and empty lists as unset.
///
/// Single nested blocks may arrive as an object or as a one-element list.
pub fn lookup<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = config;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) if items.len() == 1 => items[0].get(part)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        Value::Array(items) if items.is_empty() => None,
        v => Some(v),
    }
}

/// Drop the zero fillers a read writes for absent optional attributes.
///
/// Attributes that are optional, computed and without a default are left
/// out when they hold `""`, `0`, `false` or `[]`, so a refreshed state can be
/// checked like configuration. Optional nested blocks that end up empty are
/// left out as well.
pub fn strip_fillers(block: &Block, value: &Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };

    let mut stripped = serde_json::Map::new();
    for (key, item) in map {
        let keep = if let Some(attr) = block.attributes.get(key) {
            let filler = attr.flags.optional && attr.flags.computed && attr.default.is_none();
            Some(item.clone()).filter(|v| !(filler && is_zero_value(v)))
        } else if let Some(nested) = block.blocks.get(key) {
            strip_nested(nested, item)
        } else {
            Some(item.clone())
        };
        if let Some(item) = keep {
            stripped.insert(key.clone(), item);
        }
    }
    Value::Object(stripped)
}

fn strip_nested(nested: &NestedBlock, value: &Value) -> Option<Value> {
    let is_empty = |v: &Value| v.as_object().is_some_and(serde_json::Map::is_empty);
    let stripped = match value {
        Value::Array(items) => {
            let items: Vec<Value> = items
                .iter()
                .map(|item| strip_fillers(&nested.block, item))
                .collect();
            if items.iter().all(is_empty) && nested.min_items == 0 {
                return None;
            }
            Value::Array(items)
        },
        v => strip_fillers(&nested.block, v),
    };
    if is_empty(&stripped) && nested.min_items == 0 {
        return None;
    }
    Some(stripped)
}

// Helper functions

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn quoted_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}
