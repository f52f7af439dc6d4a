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

const LOCAL_TYPES: &[&str] = &["WinLocal", "LinuxLocal", "LinuxHardened"];
const SHARE_TYPES: &[&str] = &["Smb", "Nfs"];

const STORAGE_SETTINGS: &[Field] = &[
    Field::string("path", "path").describe("Folder on the repository host"),
    Field::bool("task_limit_enabled", "taskLimitEnabled"),
    Field::int("max_task_count", "maxTaskCount"),
    Field::bool("read_write_limit_enabled", "readWriteLimitEnabled"),
    Field::int("read_write_rate", "readWriteRate"),
    Field::bool("use_fast_cloning_on_xfs_volumes", "useFastCloningOnXFSVolumes"),
    Field::bool("use_immutable_backups", "useImmutableBackups"),
    Field::int("make_recent_backups_immutable_days", "makeRecentBackupsImmutableDays"),
];

const GATEWAY_SERVER: &[Field] = &[
    Field::bool("auto_select_enabled", "autoSelectEnabled"),
    Field::string_list("gateway_server_ids", "gatewayServerIds"),
];

const SHARE_SETTINGS: &[Field] = &[
    Field::string("share_path", "sharePath").required(),
    Field::string("credentials_id", "credentialsId"),
    Field::object("gateway_server", "gatewayServer", GATEWAY_SERVER),
];

const MOUNT_SERVER: &[Field] = &[
    Field::string("mount_server_id", "mountServerId").required(),
    Field::string("write_cache_folder", "writeCacheFolder"),
    Field::bool("v_power_nfs_enabled", "vPowerNFSEnabled"),
];

const FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").required(),
    Field::string("description", "description"),
    Field::string("type", "type")
        .required()
        .force_new()
        .describe("WinLocal, LinuxLocal, LinuxHardened, Smb or Nfs"),
    Field::string("host_id", "hostId")
        .force_new()
        .describe("Managed server hosting a local repository"),
    Field::string("unique_id", "uniqueId").computed(),
    Field::object("repository", "repository", STORAGE_SETTINGS),
    Field::object("share", "share", SHARE_SETTINGS)
        .describe("Network share settings for Smb and Nfs repositories"),
    Field::object("mount_server", "mountServer", MOUNT_SERVER).required(),
];

const OBJECT: RestObject = RestObject {
    kind: "VBR repository",
    family: ApiFamily::Vbr,
    collection: "/backupInfrastructure/repositories",
    fields: FIELDS,
};

const LOCAL: Condition = Condition::In {
    attribute: "type",
    values: LOCAL_TYPES,
};

const SHARE: Condition = Condition::In {
    attribute: "type",
    values: SHARE_TYPES,
};

const HARDENED: Condition = Condition::In {
    attribute: "type",
    values: &["LinuxHardened"],
};

const CONSTRAINTS: &[Constraint] = &[
    Constraint::OneOf {
        attribute: "type",
        allowed: &["WinLocal", "LinuxLocal", "LinuxHardened", "Smb", "Nfs"],
    },
    Constraint::RequiredWhen {
        attribute: "host_id",
        when: LOCAL,
    },
    Constraint::OnlyWhen {
        attribute: "host_id",
        when: LOCAL,
    },
    Constraint::RequiredWhen {
        attribute: "repository.path",
        when: LOCAL,
    },
    Constraint::RequiredWhen {
        attribute: "share",
        when: SHARE,
    },
    Constraint::OnlyWhen {
        attribute: "share",
        when: SHARE,
    },
    Constraint::RequiredWhen {
        attribute: "share.credentials_id",
        when: Condition::In {
            attribute: "type",
            values: &["Smb"],
        },
    },
    Constraint::OnlyWhen {
        attribute: "repository.use_immutable_backups",
        when: HARDENED,
    },
    Constraint::OnlyWhen {
        attribute: "repository.make_recent_backups_immutable_days",
        when: HARDENED,
    },
    Constraint::IntRange {
        attribute: "repository.make_recent_backups_immutable_days",
        min: 7,
        max: 9999,
    },
    Constraint::IntRange {
        attribute: "repository.max_task_count",
        min: 1,
        max: 9999,
    },
];

/// `veeam_vbr_repository`: a direct attached storage or network share
/// backup repository.
///
/// Adding, editing and removing repositories are infrastructure sessions on
/// the VBR side, so create and update re-read the object instead of trusting
/// the response body.
pub struct VbrRepository;

#[async_trait]
impl Resource for VbrRepository {
    fn name(&self) -> &'static str {
        "veeam_vbr_repository"
    }

    fn schema(&self) -> Schema {
        OBJECT.schema("Backup repository of Veeam Backup & Replication")
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
                let query = [("nameFilter".to_string(), name.to_string())];
                OBJECT
                    .find(client, &query, |item| field_matches(item, "name", name))
                    .await?
            },
        };

        let state = OBJECT.state(planned, &object);
        info!(id = %state["id"], "Created VBR repository");
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

    fn hardened() -> Value {
        json!({
            "name": "hardened-01",
            "type": "LinuxHardened",
            "host_id": "h-1",
            "repository": {
                "path": "/mnt/backups",
                "use_immutable_backups": true,
                "make_recent_backups_immutable_days": 14
            },
            "mount_server": {"mount_server_id": "h-1"}
        })
    }

    fn smb() -> Value {
        json!({
            "name": "nas-01",
            "type": "Smb",
            "share": {
                "share_path": "\\\\nas01\\backups",
                "credentials_id": "cred-1",
                "gateway_server": {"auto_select_enabled": true}
            },
            "mount_server": {"mount_server_id": "h-2"}
        })
    }

    fn attributes(config: &Value) -> Vec<String> {
        check_constraints(CONSTRAINTS, config)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect()
    }

    #[test]
    fn test_valid_configs() {
        let schema = VbrRepository.schema();
        for config in [hardened(), smb()] {
            assert!(validate(&schema, &config).is_empty());
            assert!(attributes(&config).is_empty(), "{}", config);
        }
    }

    #[test]
    fn test_mount_server_is_required() {
        let mut config = smb();
        config.as_object_mut().unwrap().remove("mount_server");
        let diagnostics = validate(&VbrRepository.schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("mount_server"));
    }

    #[test]
    fn test_local_types_need_host_and_path() {
        let config = json!({
            "name": "local",
            "type": "WinLocal",
            "mount_server": {"mount_server_id": "h-1"}
        });
        assert_eq!(attributes(&config), vec!["host_id", "repository.path"]);
    }

    #[test]
    fn test_share_types() {
        let mut config = smb();
        config["host_id"] = json!("h-1");
        config["share"]["credentials_id"] = Value::Null;
        assert_eq!(attributes(&config), vec!["host_id", "share.credentials_id"]);

        let nfs = json!({
            "name": "nfs-01",
            "type": "Nfs",
            "share": {"share_path": "nas01:/export/backups"},
            "mount_server": {"mount_server_id": "h-2"}
        });
        assert!(attributes(&nfs).is_empty());

        let mut missing = nfs;
        missing.as_object_mut().unwrap().remove("share");
        assert_eq!(attributes(&missing), vec!["share"]);
    }

    #[test]
    fn test_immutability_only_for_hardened() {
        let mut config = hardened();
        config["type"] = json!("LinuxLocal");
        assert_eq!(
            attributes(&config),
            vec![
                "repository.use_immutable_backups",
                "repository.make_recent_backups_immutable_days"
            ]
        );

        let mut config = hardened();
        config["repository"]["make_recent_backups_immutable_days"] = json!(3);
        assert_eq!(
            attributes(&config),
            vec!["repository.make_recent_backups_immutable_days"]
        );
    }

    #[test]
    fn test_update_body_carries_id_and_type() {
        let body = with_id(OBJECT.body(&smb()), "r-1");
        assert_eq!(body["id"], "r-1");
        assert_eq!(body["type"], "Smb");
        assert_eq!(body["share"]["sharePath"], "\\\\nas01\\backups");
        assert_eq!(body["share"]["gatewayServer"], json!({"autoSelectEnabled": true}));
        assert_eq!(body["mountServer"], json!({"mountServerId": "h-2"}));
        assert!(body.get("repository").is_none());
    }
}
