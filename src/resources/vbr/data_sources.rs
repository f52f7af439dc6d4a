//! List data sources of the VBR REST API.
//!
//! VBR list endpoints take camelCase query parameters and answer with a
//! `data` array plus `pagination.total`.

use crate::client::ApiFamily;
use crate::fields::Field;
use crate::query::Filter;
use crate::resources::ListDataSource;
use crate::validation::Constraint;

const NAME_FILTER: Filter = Filter::string("name_filter", "nameFilter")
    .describe("Only return items whose name matches this pattern");
const TYPE_FILTER: Filter = Filter::string("type_filter", "typeFilter");
const HOST_ID_FILTER: Filter = Filter::string("host_id_filter", "hostIdFilter");
const ORDER_COLUMN: Filter = Filter::string("order_column", "orderColumn");
const ORDER_ASC: Filter =
    Filter::bool("order_asc", "orderAsc").describe("Sort in ascending order of order_column");

const REPOSITORY_TYPES: &[&str] = &[
    "WinLocal",
    "LinuxLocal",
    "LinuxHardened",
    "Smb",
    "Nfs",
    "AzureBlob",
    "AzureArchive",
    "AmazonS3",
    "AmazonS3Glacier",
    "S3Compatible",
    "GoogleCloud",
    "IBMCloud",
    "WasabiCloud",
];

const REPOSITORY_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").computed(),
    Field::string("description", "description").computed(),
    Field::string("type", "type").computed(),
    Field::string("unique_id", "uniqueId").computed(),
    Field::string("host_id", "hostId").computed(),
    Field::string("path", "repository.path").computed(),
    Field::int("max_task_count", "repository.maxTaskCount").computed(),
    Field::bool("use_immutable_backups", "repository.useImmutableBackups").computed(),
    Field::string("share_path", "share.sharePath").computed(),
    Field::string("credentials_id", "share.credentialsId").computed(),
    Field::string("mount_server_id", "mountServer.mountServerId").computed(),
];

/// `veeam_vbr_repositories`
pub const REPOSITORIES: ListDataSource = ListDataSource {
    name: "veeam_vbr_repositories",
    description: "Backup repositories of Veeam Backup & Replication",
    family: ApiFamily::Vbr,
    path: "/backupInfrastructure/repositories",
    filters: &[
        NAME_FILTER,
        TYPE_FILTER,
        HOST_ID_FILTER,
        Filter::string("path_filter", "pathFilter"),
        ORDER_COLUMN,
        ORDER_ASC,
    ],
    constraints: &[
        Constraint::OneOf {
            attribute: "type_filter",
            allowed: REPOSITORY_TYPES,
        },
        Constraint::OneOf {
            attribute: "order_column",
            allowed: &["Name", "Description", "Type", "Host", "Path"],
        },
    ],
    items_attribute: "repositories",
    item_fields: REPOSITORY_FIELDS,
};

const DATASTORE_FIELDS: &[Field] = &[
    Field::string("host_name", "datastore.hostName").computed(),
    Field::string("name", "datastore.name").computed(),
    Field::string("object_id", "datastore.objectId").computed(),
];

const PROXY_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").computed(),
    Field::string("description", "description").computed(),
    Field::string("type", "type").computed(),
    Field::string("host_id", "server.hostId").computed(),
    Field::string("host_name", "server.hostName").computed(),
    Field::string("transport_mode", "server.transportMode").computed(),
    Field::bool("failover_to_network", "server.failoverToNetwork").computed(),
    Field::bool("host_to_proxy_encryption", "server.hostToProxyEncryption").computed(),
    Field::int("max_task_count", "server.maxTaskCount").computed(),
    Field::bool("connected_datastores_auto_select", "server.connectedDatastores.autoSelectEnabled")
        .computed(),
    Field::object_list(
        "connected_datastores",
        "server.connectedDatastores.datastores",
        DATASTORE_FIELDS,
    )
    .computed(),
];

/// `veeam_vbr_proxies`
pub const PROXIES: ListDataSource = ListDataSource {
    name: "veeam_vbr_proxies",
    description: "Backup proxies of Veeam Backup & Replication",
    family: ApiFamily::Vbr,
    path: "/backupInfrastructure/proxies",
    filters: &[NAME_FILTER, TYPE_FILTER, HOST_ID_FILTER, ORDER_COLUMN, ORDER_ASC],
    constraints: &[
        Constraint::OneOf {
            attribute: "type_filter",
            allowed: &["ViProxy", "HvProxy", "GeneralPurposeProxy"],
        },
        Constraint::OneOf {
            attribute: "order_column",
            allowed: &["Name", "Type", "Description"],
        },
    ],
    items_attribute: "proxies",
    item_fields: PROXY_FIELDS,
};

const UNSTRUCTURED_DATA_SERVER_FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("type", "type").computed(),
    Field::string("host_id", "hostId").computed(),
    Field::string("path", "path").computed(),
    Field::bool("access_credentials_required", "accessCredentialsRequired").computed(),
    Field::string("access_credentials_id", "accessCredentialsId").computed(),
    Field::bool("backup_proxies_auto_select", "processing.backupProxies.autoSelectEnabled")
        .computed(),
    Field::string_list("backup_proxy_ids", "processing.backupProxies.proxyIds").computed(),
    Field::string("cache_repository_id", "processing.cacheRepositoryId").computed(),
    Field::string("backup_io_control_level", "processing.backupIOControlLevel").computed(),
];

/// `veeam_vbr_unstructured_data_servers`
pub const UNSTRUCTURED_DATA_SERVERS: ListDataSource = ListDataSource {
    name: "veeam_vbr_unstructured_data_servers",
    description: "File servers and NAS shares registered in Veeam Backup & Replication",
    family: ApiFamily::Vbr,
    path: "/inventory/unstructuredDataServers",
    filters: &[NAME_FILTER, TYPE_FILTER, ORDER_COLUMN, ORDER_ASC],
    constraints: &[
        Constraint::OneOf {
            attribute: "type_filter",
            allowed: &["FileServer", "SMBShare", "NFSShare"],
        },
        Constraint::OneOf {
            attribute: "order_column",
            allowed: &["Name", "Type"],
        },
    ],
    items_attribute: "servers",
    item_fields: UNSTRUCTURED_DATA_SERVER_FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::flatten;
    use crate::query::build_query;
    use crate::validation::check_constraints;
    use serde_json::json;

    #[test]
    fn test_schemas_use_vbr_paging() {
        for ds in [&REPOSITORIES, &PROXIES, &UNSTRUCTURED_DATA_SERVERS] {
            let attrs = ds.schema().block.attributes;
            assert!(attrs.contains_key("skip"), "{}", ds.name);
            assert!(!attrs.contains_key("offset"), "{}", ds.name);
            assert!(attrs["order_asc"].flags.optional);
        }
    }

    #[test]
    fn test_repository_query() {
        let query = build_query(
            &json!({"name_filter": "backup*", "type_filter": "Smb", "order_asc": false}),
            REPOSITORIES.filters,
        );
        assert_eq!(
            query,
            vec![
                ("nameFilter".to_string(), "backup*".to_string()),
                ("typeFilter".to_string(), "Smb".to_string()),
                ("orderAsc".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_order_and_type_values() {
        let bad = json!({"type_filter": "Tape", "order_column": "Size"});
        assert_eq!(check_constraints(REPOSITORIES.constraints, &bad).len(), 2);

        let good = json!({"type_filter": "ViProxy", "order_column": "Name"});
        assert!(check_constraints(PROXIES.constraints, &good).is_empty());

        let bad = json!({"type_filter": "ViProxy"});
        assert_eq!(check_constraints(UNSTRUCTURED_DATA_SERVERS.constraints, &bad).len(), 1);
    }

    #[test]
    fn test_proxy_item_flattening() {
        let item = json!({
            "id": "px-1",
            "name": "proxy01",
            "type": "ViProxy",
            "server": {
                "hostId": "h-1",
                "transportMode": "Auto",
                "maxTaskCount": 4,
                "connectedDatastores": {
                    "autoSelectEnabled": false,
                    "datastores": [{"datastore": {"name": "ds01", "objectId": "datastore-12"}}]
                }
            }
        });

        let state = flatten(&item, PROXY_FIELDS);
        assert_eq!(state["host_id"], "h-1");
        assert_eq!(state["max_task_count"], 4);
        assert_eq!(state["description"], "");
        assert_eq!(state["connected_datastores"][0]["name"], "ds01");
        assert_eq!(state["connected_datastores"][0]["object_id"], "datastore-12");
    }
}
