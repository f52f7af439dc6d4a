use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::client::{ApiFamily, Clients};
use crate::error::ProviderError;
use crate::fields::{Field, FieldDefault};
use crate::resources::{field_matches, state_id, Resource, RestObject};
use crate::schema::Schema;
use crate::validation::{Condition, Constraint};

const FIELDS: &[Field] = &[
    Field::string("id", "id").computed(),
    Field::string("name", "name").required(),
    Field::string("description", "description"),
    Field::string("azure_storage_account_id", "azureStorageAccountId")
        .required()
        .force_new()
        .describe("Azure storage account that holds the backups"),
    Field::string("azure_storage_container", "azureStorageContainer.name")
        .required()
        .force_new(),
    Field::string("azure_storage_folder", "azureStorageFolder.name")
        .required()
        .force_new(),
    Field::string("azure_account_id", "azureAccountId")
        .required()
        .describe("Service account used to access the storage account"),
    Field::string("storage_tier", "storageTier")
        .force_new()
        .defaults_to(FieldDefault::Str("Inferred")),
    Field::int("concurrency_limit", "concurrencyLimit"),
    Field::bool("enable_encryption", "enableEncryption").defaults_to(FieldDefault::Bool(false)),
    Field::string("password", "password")
        .write_only()
        .sensitive()
        .describe("Encryption password, required when enable_encryption is true"),
    Field::string("hint", "hint"),
    Field::string("key_vault_id", "keyVaultId"),
    Field::string("key_vault_key_uri", "keyVaultKeyUri"),
    Field::bool("auto_create_tiers", "autoCreateTiers"),
    Field::bool("import_if_folder_has_backup", "importIfFolderHasBackup")
        .write_only()
        .defaults_to(FieldDefault::Bool(false)),
    Field::string("status", "status").computed(),
    Field::string("region_id", "regionId").computed(),
    Field::string("region_name", "regionName").computed(),
    Field::string("repository_type", "repositoryType").computed(),
];

const OBJECT: RestObject = RestObject {
    kind: "Azure repository",
    family: ApiFamily::Azure,
    collection: "/repositories",
    fields: FIELDS,
};

const CONSTRAINTS: &[Constraint] = &[
    Constraint::OneOf {
        attribute: "storage_tier",
        allowed: &["Inferred", "Hot", "Cool", "Archive"],
    },
    Constraint::RequiredWhen {
        attribute: "password",
        when: Condition::IsTrue("enable_encryption"),
    },
    Constraint::RequiredWhen {
        attribute: "key_vault_key_uri",
        when: Condition::IsSet("key_vault_id"),
    },
    Constraint::IntRange {
        attribute: "concurrency_limit",
        min: 1,
        max: 9999,
    },
];

/// `veeam_azure_repository`: a backup repository in an Azure storage account.
pub struct AzureRepository;

#[async_trait]
impl Resource for AzureRepository {
    fn name(&self) -> &'static str {
        "veeam_azure_repository"
    }

    fn schema(&self) -> Schema {
        OBJECT.schema("Backup repository of Veeam Backup for Microsoft Azure")
    }

    fn constraints(&self) -> &'static [Constraint] {
        CONSTRAINTS
    }

    async fn create(&self, clients: &Clients, planned: &Value) -> Result<Value, ProviderError> {
        let client = OBJECT.client(clients)?;
        let object = match OBJECT.post(client, &OBJECT.body(planned)).await? {
            Some(object) => object,
            None => {
                // Adding a repository runs as a session; find it by name.
                let name = planned.get("name").and_then(Value::as_str).unwrap_or_default();
                let query = [("SearchPattern".to_string(), name.to_string())];
                OBJECT
                    .find(client, &query, |item| field_matches(item, "name", name))
                    .await?
            },
        };

        let state = OBJECT.state(planned, &object);
        info!(id = %state["id"], "Created Azure repository");
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
