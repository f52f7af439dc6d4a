use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::client::{ApiFamily, Clients};
use crate::error::ProviderError;
use crate::fields::{Field, FieldDefault};
use crate::resources::{field_matches, state_id, Resource, RestObject};
use crate::schema::Schema;
use crate::validation::{Condition, Constraint};

const ITEMS: &[Field] = &[
    Field::id_list("subscription_ids", "subscriptions", "subscriptionId"),
    Field::id_list("sql_server_ids", "sqlServers", "id"),
    Field::id_list("database_ids", "databases", "id"),
];

const RETENTION: &[Field] = &[
    Field::int("time_retention_duration", "timeRetentionDuration").required(),
    Field::string("retention_duration_type", "retentionDurationType").required(),
];

const DAILY_SCHEDULE: &[Field] = &[
    Field::string("daily_type", "dailyType").required(),
    Field::string_list("selected_days", "selectedDays"),
    Field::int("runs_per_hour", "runsPerHour"),
    Field::string("target_repository_id", "backupSchedule.targetRepositoryId"),
    Field::object("retention", "backupSchedule.retention", RETENTION),
];

const RETRY_SETTINGS: &[Field] = &[Field::int("retry_count", "retryCount").required()];

const FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").required(),
    Field::string("description", "description"),
    Field::bool("is_enabled", "isEnabled").defaults_to(FieldDefault::Bool(true)),
    Field::string("tenant_id", "tenantId").required().force_new(),
    Field::string("service_account_id", "serviceAccountId").required(),
    Field::string("backup_type", "backupType").required(),
    Field::id_list("regions", "regions", "regionId")
        .required()
        .describe("Azure region ids covered by the policy"),
    Field::object("selected_items", "selectedItems", ITEMS)
        .describe("Items to protect when backup_type is SelectedItems"),
    Field::object("excluded_items", "excludedItems", ITEMS),
    Field::string("staging_server_id", "stagingServerId"),
    Field::bool(
        "create_private_endpoint_to_workload_automatically",
        "createPrivateEndpointToWorkloadAutomatically",
    ),
    Field::object("daily_schedule", "dailySchedule", DAILY_SCHEDULE),
    Field::object("retry_settings", "retrySettings", RETRY_SETTINGS),
    Field::int("priority", "priority").computed(),
];

const OBJECT: RestObject = RestObject {
    kind: "SQL backup policy",
    family: ApiFamily::Azure,
    collection: "/policies/sql",
    fields: FIELDS,
};

const SELECTED_ITEMS: Condition = Condition::In {
    attribute: "backup_type",
    values: &["SelectedItems"],
};

const SELECTED_DAYS: Condition = Condition::In {
    attribute: "daily_schedule.daily_type",
    values: &["SelectedDays"],
};

const CONSTRAINTS: &[Constraint] = &[
    Constraint::OneOf {
        attribute: "backup_type",
        allowed: &["AllSubscriptions", "SelectedItems"],
    },
    Constraint::RequiredWhen {
        attribute: "selected_items",
        when: SELECTED_ITEMS,
    },
    Constraint::OnlyWhen {
        attribute: "selected_items",
        when: SELECTED_ITEMS,
    },
    Constraint::OneOf {
        attribute: "daily_schedule.daily_type",
        allowed: &["EveryDay", "Workdays", "SelectedDays"],
    },
    Constraint::RequiredWhen {
        attribute: "daily_schedule.selected_days",
        when: SELECTED_DAYS,
    },
    Constraint::OnlyWhen {
        attribute: "daily_schedule.selected_days",
        when: SELECTED_DAYS,
    },
    Constraint::OneOf {
        attribute: "daily_schedule.retention.retention_duration_type",
        allowed: &["Days", "Months", "Years"],
    },
    Constraint::IntRange {
        attribute: "retry_settings.retry_count",
        min: 1,
        max: 99,
    },
];

/// `veeam_azure_sql_backup_policy`
pub struct SqlBackupPolicy;

#[async_trait]
impl Resource for SqlBackupPolicy {
    fn name(&self) -> &'static str {
        "veeam_azure_sql_backup_policy"
    }

    fn schema(&self) -> Schema {
        OBJECT.schema("Azure SQL backup policy of Veeam Backup for Microsoft Azure")
    }

    fn constraints(&self) -> &'static [Constraint] {
        CONSTRAINTS
    }

    async fn create(&self, clients: &Clients, planned: &Value) -> Result<Value, ProviderError> {
        let client = OBJECT.client(clients)?;
        let object = match OBJECT.post(client, &OBJECT.body(planned)).await? {
            Some(object) => object,
            None => {
                let name = planned.get("name").and_then(Value::as_str).unwrap_or_default();
                let query = [("SearchPattern".to_string(), name.to_string())];
                OBJECT
                    .find(client, &query, |item| field_matches(item, "name", name))
                    .await?
            },
        };

        let state = OBJECT.state(planned, &object);
        info!(id = %state["id"], "Created SQL backup policy");
        Ok(state)
    }

    async fn read(&self, clients: &Clients, state: &Value) -> Result<Option<Value>, ProviderError> {
        let client = OBJECT.client(clients)?;
        let id = state_id(state)?;
        Ok(OBJECT
            .fetch(client, id)
            .await?
            .map(|object| OBJECT.state(state, &object)))
    }

    async fn update(
        &self,
        clients: &Clients,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let client = OBJECT.client(clients)?;
        let id = state_id(prior)?;
        match OBJECT.put(client, id, &OBJECT.update_body(prior, planned)).await? {
            Some(object) => Ok(OBJECT.state(planned, &object)),
            None => OBJECT.refresh(client, planned, id).await,
        }
    }

    async fn delete(&self, clients: &Clients, state: &Value) -> Result<(), ProviderError> {
        let client = OBJECT.client(clients)?;
        OBJECT.remove(client, state_id(state)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BlockNestingMode;
    use crate::validation::{check_constraints, validate};
    use serde_json::json;

    fn config() -> Value {
        json!({
            "name": "sql-daily",
            "tenant_id": "t-1",
            "service_account_id": "sa-1",
            "backup_type": "AllSubscriptions",
            "regions": ["eastus"],
            "daily_schedule": {
                "daily_type": "EveryDay",
                "target_repository_id": "repo-1",
                "retention": {"time_retention_duration": 14, "retention_duration_type": "Days"}
            }
        })
    }

    #[test]
    fn test_schema_blocks() {
        let schema = SqlBackupPolicy.schema();
        let block = &schema.block;

        assert_eq!(block.blocks["selected_items"].nesting_mode, BlockNestingMode::Single);
        assert!(block.blocks["daily_schedule"].block.blocks.contains_key("retention"));
        assert!(block.attributes["tenant_id"].force_new);
        assert!(block.attributes["priority"].is_computed_only());
        assert!(validate(&schema, &config()).is_empty());
    }

    #[test]
    fn test_valid_config_passes_constraints() {
        assert!(check_constraints(CONSTRAINTS, &config()).is_empty());
    }

    #[test]
    fn test_selected_items_follow_backup_type() {
        let mut config = config();
        config["backup_type"] = json!("SelectedItems");
        let diagnostics = check_constraints(CONSTRAINTS, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("selected_items"));

        config["selected_items"] = json!({"database_ids": ["db-1"]});
        assert!(check_constraints(CONSTRAINTS, &config).is_empty());

        config["backup_type"] = json!("AllSubscriptions");
        let diagnostics = check_constraints(CONSTRAINTS, &config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("not allowed"));
    }

    #[test]
    fn test_selected_days_follow_daily_type() {
        let mut config = config();
        config["daily_schedule"]["daily_type"] = json!("SelectedDays");
        let diagnostics = check_constraints(CONSTRAINTS, &config);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("daily_schedule.selected_days")
        );

        config["daily_schedule"]["selected_days"] = json!(["Monday"]);
        assert!(check_constraints(CONSTRAINTS, &config).is_empty());

        config["daily_schedule"]["daily_type"] = json!("Workdays");
        assert_eq!(check_constraints(CONSTRAINTS, &config).len(), 1);
    }

    #[test]
    fn test_retention_type() {
        let mut config = config();
        config["daily_schedule"]["retention"]["retention_duration_type"] = json!("Weeks");
        let diagnostics = check_constraints(CONSTRAINTS, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("daily_schedule.retention.retention_duration_type")
        );
    }

    #[test]
    fn test_body() {
        let mut planned = config();
        planned["backup_type"] = json!("SelectedItems");
        planned["selected_items"] = json!({
            "subscription_ids": ["sub-1"],
            "database_ids": ["db-1", "db-2"]
        });

        let body = OBJECT.body(&planned);
        assert_eq!(body["regions"], json!([{"regionId": "eastus"}]));
        assert_eq!(
            body["selectedItems"],
            json!({
                "subscriptions": [{"subscriptionId": "sub-1"}],
                "databases": [{"id": "db-1"}, {"id": "db-2"}]
            })
        );
        assert_eq!(
            body["dailySchedule"],
            json!({
                "dailyType": "EveryDay",
                "backupSchedule": {
                    "targetRepositoryId": "repo-1",
                    "retention": {"timeRetentionDuration": 14, "retentionDurationType": "Days"}
                }
            })
        );
        assert!(body.get("excludedItems").is_none());
    }

    #[test]
    fn test_state_from_api() {
        let api = json!({
            "id": "pol-1",
            "name": "sql-daily",
            "priority": 2,
            "regions": [{"regionId": "eastus"}],
            "dailySchedule": {
                "dailyType": "EveryDay",
                "backupSchedule": {"targetRepositoryId": "repo-1"}
            }
        });

        let state = OBJECT.state(&config(), &api);
        assert_eq!(state["id"], "pol-1");
        assert_eq!(state["priority"], 2);
        assert_eq!(state["regions"], json!(["eastus"]));
        assert_eq!(state["daily_schedule"]["target_repository_id"], "repo-1");
        assert_eq!(state["selected_items"], Value::Null);
    }
}
