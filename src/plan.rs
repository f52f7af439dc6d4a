//! Plan computation for resources.
//!
//! A plan starts from the proposed state sent by the host and:
//!
//! 1. fills schema defaults for unset optional attributes,
//! 2. carries computed values (and blocks the user left out) over from the
//!    prior state,
//! 3. diffs every configurable top-level attribute and block against the
//!    prior state,
//! 4. flags replacement when a changed value is marked `force_new`.

use serde_json::{Map, Value};

use crate::schema::{Attribute, Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Compute the plan for one resource instance.
///
/// A `null` proposed state plans a destroy. A missing prior state plans a
/// create.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let changes = prior
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = proposed.clone();
    apply_defaults(&schema.block, &mut planned);

    let Some(prior) = prior else {
        let changes = configurable_names(&schema.block)
            .filter_map(|name| {
                planned
                    .get(name)
                    .filter(|v| !v.is_null())
                    .map(|v| AttributeChange::added(name, v.clone()))
            })
            .collect();
        return PlanResult::with_changes(planned, changes, false);
    };

    fill_from_prior(&schema.block, &mut planned, prior);

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in configurable_names(&schema.block) {
        let before = prior.get(name).cloned().unwrap_or(Value::Null);
        let after = planned.get(name).cloned().unwrap_or(Value::Null);
        if before == after {
            continue;
        }

        let attribute = schema.block.attributes.get(name);
        requires_replace |= match (attribute, schema.block.blocks.get(name)) {
            (Some(attr), _) => attr.force_new,
            (None, Some(nested)) => block_forces_new(nested, &before, &after),
            (None, None) => false,
        };

        changes.push(match (before.is_null(), after.is_null()) {
            (true, _) => AttributeChange::added(name, after),
            (_, true) => AttributeChange::removed(name, before),
            _ => AttributeChange::modified(name, before, after),
        });
    }

    PlanResult::with_changes(planned, changes, requires_replace)
}

fn configurable_names(block: &Block) -> impl Iterator<Item = &str> {
    let mut names: Vec<&str> = block
        .attributes
        .iter()
        .filter(|(_, attr)| !attr.is_computed_only())
        .map(|(name, _)| name.as_str())
        .chain(block.blocks.keys().map(String::as_str))
        .collect();
    names.sort_unstable();
    names.into_iter()
}

fn is_unset(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

fn apply_defaults(block: &Block, value: &mut Value) {
    let Value::Object(obj) = value else {
        return;
    };

    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            if is_unset(obj.get(name)) {
                obj.insert(name.clone(), default.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        if let Some(inner) = obj.get_mut(name) {
            for_each_block_value(nested, inner, |item| apply_defaults(&nested.block, item));
        }
    }
}

fn fill_from_prior(block: &Block, planned: &mut Value, prior: &Value) {
    let (Value::Object(obj), Value::Object(prior)) = (planned, prior) else {
        return;
    };

    for (name, attr) in &block.attributes {
        if carries_over(attr) && is_unset(obj.get(name)) {
            if let Some(previous) = prior.get(name) {
                obj.insert(name.clone(), previous.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        let Some(previous) = prior.get(name).filter(|v| !v.is_null()) else {
            continue;
        };
        if is_unset(obj.get(name)) {
            // Blocks left out of the configuration keep their server-side values.
            obj.insert(name.clone(), previous.clone());
        } else if let Some(current) = obj.get_mut(name) {
            fill_nested(nested, current, previous);
        }
    }
}

fn fill_nested(nested: &NestedBlock, current: &mut Value, previous: &Value) {
    match (nested.nesting_mode, current, previous) {
        (BlockNestingMode::Single, current, previous) => {
            let previous = single_item(previous);
            match current {
                Value::Array(items) => {
                    if let Some(first) = items.first_mut() {
                        fill_from_prior(&nested.block, first, previous);
                    }
                },
                current => fill_from_prior(&nested.block, current, previous),
            }
        },
        (BlockNestingMode::List, Value::Array(items), Value::Array(previous)) => {
            for (item, prev) in items.iter_mut().zip(previous) {
                fill_from_prior(&nested.block, item, prev);
            }
        },
        _ => {},
    }
}

fn single_item(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(value),
        v => v,
    }
}

fn carries_over(attr: &Attribute) -> bool {
    attr.flags.computed && attr.default.is_none()
}

fn for_each_block_value(nested: &NestedBlock, value: &mut Value, mut f: impl FnMut(&mut Value)) {
    match (nested.nesting_mode, value) {
        (_, Value::Array(items)) => items.iter_mut().for_each(&mut f),
        (BlockNestingMode::Single, v) if v.is_object() => f(v),
        _ => {},
    }
}

fn block_forces_new(nested: &NestedBlock, before: &Value, after: &Value) -> bool {
    let before_items = block_items(before);
    let after_items = block_items(after);
    if before_items.len() != after_items.len() {
        return has_force_new(&nested.block);
    }

    before_items
        .iter()
        .zip(&after_items)
        .any(|(b, a)| object_forces_new(&nested.block, b, a))
}

fn object_forces_new(
    block: &Block,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> bool {
    let attrs = block.attributes.iter().filter(|(_, attr)| attr.force_new).any(|(name, _)| {
        before.get(name).unwrap_or(&Value::Null) != after.get(name).unwrap_or(&Value::Null)
    });
    attrs
        || block.blocks.iter().any(|(name, nested)| {
            block_forces_new(
                nested,
                before.get(name).unwrap_or(&Value::Null),
                after.get(name).unwrap_or(&Value::Null),
            )
        })
}

fn block_items(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Object(obj) => vec![obj],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

fn has_force_new(block: &Block) -> bool {
    block.attributes.values().any(|attr| attr.force_new)
        || block.blocks.values().any(|nested| has_force_new(&nested.block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;

    fn repository_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_computed_string())
            .with_attribute("type", Attribute::required_string().with_force_new())
            .with_attribute(
                "storage_tier",
                Attribute::optional_string().with_default(json!("Inferred")),
            )
            .with_attribute("password", Attribute::optional_string().sensitive())
            .with_block(
                "repository",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("path", Attribute::required_string().with_force_new())
                        .with_attribute("max_task_count", Attribute::optional_computed_int64()),
                ),
            )
    }

    #[test]
    fn test_create_plan() {
        let plan = plan(
            &repository_schema(),
            None,
            &json!({"name": "repo-01", "type": "WinLocal", "description": null}),
        );

        assert_eq!(plan.planned_state["storage_tier"], "Inferred");
        assert!(!plan.requires_replace);
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "storage_tier", "type"]);
        assert!(plan.changes.iter().all(|c| c.before.is_none()));
    }

    #[test]
    fn test_unchanged_plan_keeps_computed_values() {
        let prior = json!({
            "id": "88788f9e",
            "name": "repo-01",
            "description": "Created by Veeam",
            "type": "WinLocal",
            "storage_tier": "Inferred",
            "password": null,
            "repository": {"path": "D:\\Backups", "max_task_count": 4}
        });
        let proposed = json!({
            "name": "repo-01",
            "type": "WinLocal",
            "repository": {"path": "D:\\Backups"}
        });

        let plan = plan(&repository_schema(), Some(&prior), &proposed);
        assert!(!plan.has_changes(), "unexpected changes: {:?}", plan.changes);
        assert_eq!(plan.planned_state["id"], "88788f9e");
        assert_eq!(plan.planned_state["description"], "Created by Veeam");
        assert_eq!(plan.planned_state["repository"]["max_task_count"], 4);
    }

    #[test]
    fn test_in_place_update() {
        let prior =
            json!({"id": "r1", "name": "repo-01", "type": "WinLocal", "storage_tier": "Inferred"});
        let proposed = json!({"name": "repo-02", "type": "WinLocal"});

        let plan = plan(&repository_schema(), Some(&prior), &proposed);
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(
            plan.changes[0],
            AttributeChange::modified("name", json!("repo-01"), json!("repo-02"))
        );
    }

    #[test]
    fn test_force_new_attribute_replaces() {
        let prior =
            json!({"id": "r1", "name": "repo", "type": "WinLocal", "storage_tier": "Inferred"});
        let proposed = json!({"name": "repo", "type": "LinuxLocal"});

        let plan = plan(&repository_schema(), Some(&prior), &proposed);
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_force_new_nested_attribute_replaces() {
        let prior = json!({
            "id": "r1", "name": "repo", "type": "WinLocal", "storage_tier": "Inferred",
            "repository": {"path": "D:\\Backups", "max_task_count": 4}
        });

        let moved =
            json!({"name": "repo", "type": "WinLocal", "repository": {"path": "E:\\Backups"}});
        let plan_moved = plan(&repository_schema(), Some(&prior), &moved);
        assert!(plan_moved.requires_replace);

        let tuned = json!({
            "name": "repo",
            "type": "WinLocal",
            "repository": [{"path": "D:\\Backups", "max_task_count": 8}]
        });
        let plan_tuned = plan(&repository_schema(), Some(&prior), &tuned);
        assert!(plan_tuned.has_changes());
        assert!(!plan_tuned.requires_replace);
    }

    #[test]
    fn test_destroy_plan() {
        let prior = json!({"id": "r1", "name": "repo", "description": null});
        let plan = plan(&repository_schema(), Some(&prior), &Value::Null);

        assert!(plan.planned_state.is_null());
        let mut removed: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        removed.sort();
        assert_eq!(removed, vec!["id", "name"]);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }
}
