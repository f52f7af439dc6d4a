//! List data sources of the Azure REST API.
//!
//! Azure list endpoints take PascalCase query parameters and answer with a
//! `results` array plus `totalCount`.

use crate::client::ApiFamily;
use crate::fields::Field;
use crate::query::Filter;
use crate::resources::ListDataSource;
use crate::validation::Constraint;

const SEARCH_PATTERN: Filter = Filter::string("search_pattern", "SearchPattern")
    .describe("Only return items whose name matches this pattern");
const SUBSCRIPTION_ID: Filter = Filter::string("subscription_id", "SubscriptionId");
const TENANT_ID: Filter = Filter::string("tenant_id", "TenantId");
const SERVICE_ACCOUNT_ID: Filter = Filter::string("service_account_id", "ServiceAccountId");
const REGION_ID: Filter = Filter::string("region_id", "RegionId");

const SERVICE_ACCOUNT_FIELDS: &[Field] = &[
    Field::string("account_id", "accountId").computed(),
    Field::string("name", "name").computed(),
    Field::string("description", "description").computed(),
    Field::string("purpose", "purpose").computed(),
    Field::string("tenant_id", "tenantId").computed(),
    Field::string("application_id", "applicationId").computed(),
    Field::string("expiration_date", "expirationDate").computed(),
    Field::string("azure_permissions_state", "azurePermissionsState").computed(),
    Field::string_list("subscription_ids", "subscriptionIds").computed(),
];

/// `veeam_azure_service_accounts`
pub const SERVICE_ACCOUNTS: ListDataSource = ListDataSource {
    name: "veeam_azure_service_accounts",
    description: "Service accounts registered in Veeam Backup for Microsoft Azure",
    family: ApiFamily::Azure,
    path: "/accounts/azure/service",
    filters: &[
        Filter::string("purpose", "FilterPurpose")
            .describe("Only return accounts with this purpose"),
        SEARCH_PATTERN,
    ],
    constraints: &[],
    items_attribute: "service_accounts",
    item_fields: SERVICE_ACCOUNT_FIELDS,
};

const REPOSITORY_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").computed(),
    Field::string("description", "description").computed(),
    Field::string("azure_storage_account_id", "azureStorageAccountId").computed(),
    Field::string("azure_storage_folder", "azureStorageFolder.name").computed(),
    Field::string("azure_storage_container", "azureStorageContainer.name").computed(),
    Field::string("azure_account_id", "azureAccountId").computed(),
    Field::string("storage_tier", "storageTier").computed(),
    Field::bool("enable_encryption", "enableEncryption").computed(),
    Field::string("key_vault_id", "keyVaultId").computed(),
    Field::string("key_vault_key_uri", "keyVaultKeyUri").computed(),
    Field::string("region_id", "regionId").computed(),
    Field::string("region_name", "regionName").computed(),
    Field::string("status", "status").computed(),
    Field::string("repository_type", "repositoryType").computed(),
];

/// `veeam_azure_repositories`
pub const REPOSITORIES: ListDataSource = ListDataSource {
    name: "veeam_azure_repositories",
    description: "Backup repositories of Veeam Backup for Microsoft Azure",
    family: ApiFamily::Azure,
    path: "/repositories",
    filters: &[
        SEARCH_PATTERN,
        Filter::string("status", "Status"),
        Filter::string("repository_type", "RepositoryType"),
    ],
    constraints: &[],
    items_attribute: "repositories",
    item_fields: REPOSITORY_FIELDS,
};

const SQL_SERVER_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("resource_id", "resourceId").computed(),
    Field::string("name", "name").computed(),
    Field::string("server_type", "serverType").computed(),
    Field::string("subscription_id", "subscriptionId").computed(),
    Field::string("tenant_id", "tenantId").computed(),
    Field::string("resource_group_name", "resourceGroupName").computed(),
    Field::string("region_id", "region.id").computed(),
    Field::string("region_name", "region.name").computed(),
];

/// `veeam_azure_sql_servers`
pub const SQL_SERVERS: ListDataSource = ListDataSource {
    name: "veeam_azure_sql_servers",
    description: "Azure SQL servers discovered by Veeam Backup for Microsoft Azure",
    family: ApiFamily::Azure,
    path: "/cloudInfrastructure/sqlServers",
    filters: &[
        SEARCH_PATTERN,
        SUBSCRIPTION_ID,
        TENANT_ID,
        SERVICE_ACCOUNT_ID,
        Filter::string("credentials_state", "CredentialsState"),
    ],
    constraints: &[Constraint::OneOf {
        attribute: "credentials_state",
        allowed: &["Exist", "NotExist"],
    }],
    items_attribute: "sql_servers",
    item_fields: SQL_SERVER_FIELDS,
};

const SQL_DATABASE_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("resource_id", "resourceId").computed(),
    Field::string("name", "name").computed(),
    Field::string("server_id", "serverId").computed(),
    Field::string("server_name", "serverName").computed(),
    Field::string("subscription_id", "subscriptionId").computed(),
    Field::string("region_id", "region.id").computed(),
    Field::string("region_name", "region.name").computed(),
    Field::int("size_in_mb", "sizeInMb").computed(),
    Field::bool("has_elastic_pool", "hasElasticPool").computed(),
];

/// `veeam_azure_sql_databases`
pub const SQL_DATABASES: ListDataSource = ListDataSource {
    name: "veeam_azure_sql_databases",
    description: "Azure SQL databases discovered by Veeam Backup for Microsoft Azure",
    family: ApiFamily::Azure,
    path: "/cloudInfrastructure/sqlDatabases",
    filters: &[
        SEARCH_PATTERN,
        SUBSCRIPTION_ID,
        TENANT_ID,
        SERVICE_ACCOUNT_ID,
        REGION_ID,
        Filter::string("sql_server_id", "SqlServerId"),
        Filter::bool("db_from_protected_regions", "DbFromProtectedRegions")
            .describe("Only return databases located in regions covered by a backup policy"),
    ],
    constraints: &[],
    items_attribute: "sql_databases",
    item_fields: SQL_DATABASE_FIELDS,
};

const COSMOSDB_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("resource_id", "resourceId").computed(),
    Field::string("name", "name").computed(),
    Field::string("account_type", "accountType").computed(),
    Field::string("subscription_id", "subscriptionId").computed(),
    Field::string("resource_group_name", "resourceGroupName").computed(),
    Field::string("region_id", "region.id").computed(),
    Field::string("region_name", "region.name").computed(),
];

/// `veeam_azure_cosmosdb_accounts`
pub const COSMOSDB_ACCOUNTS: ListDataSource = ListDataSource {
    name: "veeam_azure_cosmosdb_accounts",
    description: "Azure Cosmos DB accounts discovered by Veeam Backup for Microsoft Azure",
    family: ApiFamily::Azure,
    path: "/cloudInfrastructure/cosmosDb",
    filters: &[
        SEARCH_PATTERN,
        SUBSCRIPTION_ID,
        TENANT_ID,
        SERVICE_ACCOUNT_ID,
        Filter::string_list("region_ids", "RegionIds"),
    ],
    constraints: &[],
    items_attribute: "cosmosdb_accounts",
    item_fields: COSMOSDB_FIELDS,
};

const STORAGE_ACCOUNT_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("resource_id", "resourceId").computed(),
    Field::string("name", "name").computed(),
    Field::string("subscription_id", "subscriptionId").computed(),
    Field::string("resource_group_name", "resourceGroupName").computed(),
    Field::string("region_id", "regionId").computed(),
    Field::string("region_name", "regionName").computed(),
    Field::string("performance", "performance").computed(),
    Field::string("redundancy", "redundancy").computed(),
    Field::string("access_tier", "accessTier").computed(),
];

/// `veeam_azure_storage_accounts`
pub const STORAGE_ACCOUNTS: ListDataSource = ListDataSource {
    name: "veeam_azure_storage_accounts",
    description: "Azure storage accounts available to Veeam Backup for Microsoft Azure",
    family: ApiFamily::Azure,
    path: "/cloudInfrastructure/storageAccounts",
    filters: &[
        SEARCH_PATTERN,
        SUBSCRIPTION_ID,
        TENANT_ID,
        SERVICE_ACCOUNT_ID,
        REGION_ID,
    ],
    constraints: &[],
    items_attribute: "storage_accounts",
    item_fields: STORAGE_ACCOUNT_FIELDS,
};

const SUBSCRIPTION_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").computed(),
    Field::string("tenant_id", "tenantId").computed(),
    Field::string("tenant_name", "tenantName").computed(),
    Field::string("status", "status").computed(),
    Field::string("availability", "availability").computed(),
];

/// `veeam_azure_subscriptions`
pub const SUBSCRIPTIONS: ListDataSource = ListDataSource {
    name: "veeam_azure_subscriptions",
    description: "Azure subscriptions reachable through the configured service accounts",
    family: ApiFamily::Azure,
    path: "/cloudInfrastructure/subscriptions",
    filters: &[SEARCH_PATTERN, TENANT_ID, SERVICE_ACCOUNT_ID],
    constraints: &[],
    items_attribute: "subscriptions",
    item_fields: SUBSCRIPTION_FIELDS,
};

const RESTORE_POINT_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("type", "type").computed(),
    Field::string("backup_destination", "backupDestination").computed(),
    Field::string("point_in_time", "pointInTime").computed(),
    Field::int("backup_size_bytes", "backupSizeBytes").computed(),
    Field::string("job_session_id", "jobSessionId").computed(),
    Field::string("data_retrieval_status", "dataRetrievalStatus").computed(),
    Field::string("immutable_till", "immutableTill").computed(),
];

/// `veeam_azure_restore_points`
pub const RESTORE_POINTS: ListDataSource = ListDataSource {
    name: "veeam_azure_restore_points",
    description: "Restore points of one protected Azure workload",
    family: ApiFamily::Azure,
    path: "/restorePoints",
    filters: &[
        Filter::string("virtual_machine_id", "VirtualMachineId"),
        Filter::string("sql_database_id", "SqlDatabaseId"),
        Filter::string("file_share_id", "FileShareId"),
        Filter::string("cosmos_db_account_id", "CosmosDbAccountId"),
        Filter::bool("only_latest", "OnlyLatest").describe("Return only the latest restore point"),
    ],
    constraints: &[Constraint::ConflictsWith {
        attributes: &[
            "virtual_machine_id",
            "sql_database_id",
            "file_share_id",
            "cosmos_db_account_id",
        ],
    }],
    items_attribute: "restore_points",
    item_fields: RESTORE_POINT_FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::build_query;
    use crate::schema::DiagnosticSeverity;
    use crate::validation::check_constraints;
    use serde_json::json;

    #[test]
    fn test_restore_points_allow_one_workload() {
        let ok = json!({"sql_database_id": "db-1", "only_latest": true});
        assert!(check_constraints(RESTORE_POINTS.constraints, &ok).is_empty());

        let both = json!({"virtual_machine_id": "vm-1", "file_share_id": "fs-1"});
        let diagnostics = check_constraints(RESTORE_POINTS.constraints, &both);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("file_share_id"));
    }

    #[test]
    fn test_sql_database_query() {
        let query = build_query(
            &json!({
                "search_pattern": "prod-*",
                "sql_server_id": "srv-1",
                "db_from_protected_regions": true
            }),
            SQL_DATABASES.filters,
        );
        assert_eq!(
            query,
            vec![
                ("SearchPattern".to_string(), "prod-*".to_string()),
                ("SqlServerId".to_string(), "srv-1".to_string()),
                ("DbFromProtectedRegions".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_schemas_use_azure_paging() {
        for ds in [&SERVICE_ACCOUNTS, &SUBSCRIPTIONS, &RESTORE_POINTS] {
            let schema = ds.schema();
            assert!(schema.block.attributes.contains_key("offset"), "{}", ds.name);
            assert!(schema.block.attributes.contains_key(ds.items_attribute));
        }
    }

    #[test]
    fn test_credentials_state_values() {
        let bad = json!({"credentials_state": "Unknown"});
        assert_eq!(check_constraints(SQL_SERVERS.constraints, &bad).len(), 1);
        let good = json!({"credentials_state": "Exist"});
        assert!(check_constraints(SQL_SERVERS.constraints, &good).is_empty());
    }
}
