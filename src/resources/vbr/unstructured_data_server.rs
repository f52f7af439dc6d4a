use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::with_id;
use crate::client::{ApiFamily, Clients};
use crate::error::ProviderError;
use crate::fields::Field;
use crate::resources::{field_matches, state_id, Resource, RestObject};
use crate::schema::Schema;
use crate::validation::{Condition, Constraint};

const PROCESSING: &[Field] = &[
    Field::bool("backup_proxies_auto_select", "backupProxies.autoSelectEnabled"),
    Field::string_list("backup_proxy_ids", "backupProxies.proxyIds"),
    Field::string("cache_repository_id", "cacheRepositoryId")
        .required()
        .describe("Repository keeping the cache of the file share"),
    Field::string("backup_io_control_level", "backupIOControlLevel"),
];

const FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("type", "type")
        .required()
        .force_new()
        .describe("FileServer, SMBShare or NFSShare"),
    Field::string("host_id", "hostId").force_new(),
    Field::string("path", "path").force_new(),
    Field::bool("access_credentials_required", "accessCredentialsRequired"),
    Field::string("access_credentials_id", "accessCredentialsId"),
    Field::object("processing", "processing", PROCESSING).required(),
];

const OBJECT: RestObject = RestObject {
    kind: "unstructured data server",
    family: ApiFamily::Vbr,
    collection: "/inventory/unstructuredDataServers",
    fields: FIELDS,
};

const FILE_SERVER: Condition = Condition::In {
    attribute: "type",
    values: &["FileServer"],
};

const SHARE: Condition = Condition::In {
    attribute: "type",
    values: &["SMBShare", "NFSShare"],
};

const CONSTRAINTS: &[Constraint] = &[
    Constraint::OneOf {
        attribute: "type",
        allowed: &["FileServer", "SMBShare", "NFSShare"],
    },
    Constraint::RequiredWhen {
        attribute: "host_id",
        when: FILE_SERVER,
    },
    Constraint::OnlyWhen {
        attribute: "host_id",
        when: FILE_SERVER,
    },
    Constraint::RequiredWhen {
        attribute: "path",
        when: SHARE,
    },
    Constraint::OnlyWhen {
        attribute: "path",
        when: SHARE,
    },
    Constraint::OnlyWhen {
        attribute: "access_credentials_id",
        when: Condition::In {
            attribute: "type",
            values: &["SMBShare"],
        },
    },
    Constraint::RequiredWhen {
        attribute: "access_credentials_id",
        when: Condition::IsTrue("access_credentials_required"),
    },
    Constraint::OneOf {
        attribute: "processing.backup_io_control_level",
        allowed: &["Lowest", "Low", "Medium", "High", "Highest"],
    },
];

/// `veeam_vbr_unstructured_data_server`: a file server or NAS share in the
/// VBR inventory.
pub struct UnstructuredDataServer;

impl UnstructuredDataServer {
    /// Whether a listed server is the one described by `planned`.
    ///
    /// File servers are identified by host, shares by path.
    fn is_planned(item: &Value, planned: &Value) -> bool {
        let attr = |name: &str| planned.get(name).and_then(Value::as_str).unwrap_or_default();
        match attr("type") {
            "FileServer" => field_matches(item, "hostId", attr("host_id")),
            _ => field_matches(item, "path", attr("path")),
        }
    }
}

#[async_trait]
impl Resource for UnstructuredDataServer {
    fn name(&self) -> &'static str {
        "veeam_vbr_unstructured_data_server"
    }

    fn schema(&self) -> Schema {
        OBJECT.schema("File server or NAS share registered in Veeam Backup & Replication")
    }

    fn constraints(&self) -> &'static [Constraint] {
        CONSTRAINTS
    }

    async fn create(&self, clients: &Clients, planned: &Value) -> Result<Value, ProviderError> {
        let client = OBJECT.client(clients)?;
        let object = match OBJECT.post(client, &OBJECT.body(planned)).await? {
            Some(object) => object,
            None => {
                let kind = planned.get("type").and_then(Value::as_str).unwrap_or_default();
                let query = [("typeFilter".to_string(), kind.to_string())];
                OBJECT
                    .find(client, &query, |item| Self::is_planned(item, planned))
                    .await?
            },
        };

        let state = OBJECT.state(planned, &object);
        info!(id = %state["id"], "Added unstructured data server");
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
        let body = with_id(OBJECT.update_body(prior, planned), id);
        match OBJECT.put(client, id, &body).await? {
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
    use crate::validation::{check_constraints, validate};
    use serde_json::json;

    fn processing() -> Value {
        json!({"cache_repository_id": "repo-1", "backup_io_control_level": "Medium"})
    }

    fn attributes(config: &Value) -> Vec<String> {
        check_constraints(CONSTRAINTS, config)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect()
    }

    #[test]
    fn test_file_server() {
        let config = json!({"type": "FileServer", "host_id": "h-1", "processing": processing()});
        assert!(validate(&UnstructuredDataServer.schema(), &config).is_empty());
        assert!(attributes(&config).is_empty());

        let config = json!({"type": "FileServer", "path": "\\\\fs\\x", "processing": processing()});
        assert_eq!(attributes(&config), vec!["host_id", "path"]);
    }

    #[test]
    fn test_shares() {
        let smb = json!({
            "type": "SMBShare",
            "path": "\\\\nas01\\projects",
            "access_credentials_required": true,
            "access_credentials_id": "cred-1",
            "processing": processing()
        });
        assert!(attributes(&smb).is_empty());

        let nfs = json!({
            "type": "NFSShare",
            "path": "nas01:/projects",
            "access_credentials_id": "cred-1",
            "processing": processing()
        });
        assert_eq!(attributes(&nfs), vec!["access_credentials_id"]);

        let missing = json!({
            "type": "SMBShare",
            "access_credentials_required": true,
            "processing": processing()
        });
        assert_eq!(attributes(&missing), vec!["path", "access_credentials_id"]);
    }

    #[test]
    fn test_io_control_level() {
        let config = json!({
            "type": "FileServer",
            "host_id": "h-1",
            "processing": {"cache_repository_id": "repo-1", "backup_io_control_level": "Maximum"}
        });
        assert_eq!(attributes(&config), vec!["processing.backup_io_control_level"]);
    }

    #[test]
    fn test_lookup_match() {
        let planned = json!({"type": "NFSShare", "path": "nas01:/projects"});
        assert!(UnstructuredDataServer::is_planned(
            &json!({"id": "u-1", "type": "NFSShare", "path": "nas01:/projects"}),
            &planned
        ));
        assert!(!UnstructuredDataServer::is_planned(
            &json!({"id": "u-2", "type": "NFSShare", "path": "nas01:/other"}),
            &planned
        ));

        let planned = json!({"type": "FileServer", "host_id": "h-1"});
        assert!(UnstructuredDataServer::is_planned(&json!({"hostId": "H-1"}), &planned));
    }

    #[test]
    fn test_body() {
        let planned = json!({
            "type": "SMBShare",
            "path": "\\\\nas01\\projects",
            "access_credentials_required": true,
            "access_credentials_id": "cred-1",
            "processing": {
                "backup_proxies_auto_select": false,
                "backup_proxy_ids": ["px-1"],
                "cache_repository_id": "repo-1"
            }
        });
        let body = with_id(OBJECT.body(&planned), "u-1");
        assert_eq!(body["id"], "u-1");
        assert_eq!(
            body["processing"],
            json!({
                "backupProxies": {"autoSelectEnabled": false, "proxyIds": ["px-1"]},
                "cacheRepositoryId": "repo-1"
            })
        );
    }
}
