//! Veeam data sources and resources.
//!
//! Data sources are static [`ListDataSource`] descriptors. Resources
//! implement [`Resource`], most of them on top of the shared [`RestObject`]
//! helpers for the create/read/update/delete calls.

pub mod azure;
mod data_source;
pub mod vbr;

pub use data_source::{ListDataSource, PAGE_SIZE};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{ApiFamily, Clients, VeeamClient};
use crate::error::ProviderError;
use crate::fields::{self, Field};
use crate::schema::Schema;
use crate::validation::Constraint;

/// A managed Veeam object.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `veeam_vbr_repository`.
    fn name(&self) -> &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Cross-field rules checked on validate and plan.
    fn constraints(&self) -> &'static [Constraint] {
        &[]
    }

    /// Create the object and return its state.
    async fn create(&self, clients: &Clients, planned: &Value) -> Result<Value, ProviderError>;

    /// Refresh the state. `None` means the object no longer exists.
    async fn read(&self, clients: &Clients, state: &Value) -> Result<Option<Value>, ProviderError>;

    /// Apply a planned change in place and return the new state.
    async fn update(
        &self,
        clients: &Clients,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object. Deleting an object that is already gone succeeds.
    async fn delete(&self, clients: &Clients, state: &Value) -> Result<(), ProviderError>;

    /// Read an existing object by id for import.
    async fn import(&self, clients: &Clients, id: &str) -> Result<Option<Value>, ProviderError> {
        self.read(clients, &json!({ "id": id })).await
    }
}

static RESOURCES: &[&dyn Resource] = &[
    &azure::AzureRepository,
    &azure::SqlBackupPolicy,
    &vbr::VbrRepository,
    &vbr::UnstructuredDataServer,
];

static DATA_SOURCES: &[&ListDataSource] = &[
    &azure::SERVICE_ACCOUNTS,
    &azure::REPOSITORIES,
    &azure::SQL_SERVERS,
    &azure::SQL_DATABASES,
    &azure::COSMOSDB_ACCOUNTS,
    &azure::STORAGE_ACCOUNTS,
    &azure::SUBSCRIPTIONS,
    &azure::RESTORE_POINTS,
    &vbr::REPOSITORIES,
    &vbr::PROXIES,
    &vbr::UNSTRUCTURED_DATA_SERVERS,
];

/// Every resource the provider serves.
pub fn resources() -> impl Iterator<Item = &'static dyn Resource> {
    RESOURCES.iter().copied()
}

/// Look up a resource by type name.
pub fn resource(name: &str) -> Option<&'static dyn Resource> {
    resources().find(|r| r.name() == name)
}

/// Every data source the provider serves.
pub fn data_sources() -> impl Iterator<Item = &'static ListDataSource> {
    DATA_SOURCES.iter().copied()
}

/// Look up a data source by type name.
pub fn data_source(name: &str) -> Option<&'static ListDataSource> {
    data_sources().find(|d| d.name == name)
}

/// The `id` attribute of a state, if set.
pub fn state_id(state: &Value) -> Result<&str, ProviderError> {
    state
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::InvalidRequest("state has no id".to_string()))
}

/// Collection endpoint plus the field table of one REST object type.
#[derive(Debug, Clone, Copy)]
pub struct RestObject {
    /// Human readable kind, used in messages.
    pub kind: &'static str,
    /// Product the object lives on.
    pub family: ApiFamily,
    /// Collection path, e.g. `/backupInfrastructure/repositories`.
    pub collection: &'static str,
    /// State mapping.
    pub fields: &'static [Field],
}

impl RestObject {
    /// The client for this object's product.
    pub fn client<'a>(&self, clients: &'a Clients) -> Result<&'a VeeamClient, ProviderError> {
        clients.get(self.family)
    }

    /// Path of one object.
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection, id)
    }

    /// Request body for a state or plan.
    pub fn body(&self, state: &Value) -> Value {
        fields::expand(state, self.fields)
    }

    /// Request body for an update, leaving out zero fillers that nobody set.
    pub fn update_body(&self, prior: &Value, planned: &Value) -> Value {
        fields::expand_update(prior, planned, self.fields)
    }

    /// State after an API call: the API object overlaid on the planned state.
    pub fn state(&self, planned: &Value, api: &Value) -> Value {
        fields::merge_state(planned, fields::flatten(api, self.fields))
    }

    /// The schema built from the field table.
    pub fn schema(&self, description: &str) -> Schema {
        Schema {
            version: 0,
            block: fields::block(self.fields),
        }
        .with_description(description)
    }

    /// POST a new object. Returns the object, or `None` when the server
    /// answered with an asynchronous session instead.
    pub async fn post(
        &self,
        client: &VeeamClient,
        body: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let response = client.post(self.collection, body).await?;
        Ok(created_object(response))
    }

    /// GET one object. A 404 yields `None`.
    pub async fn fetch(
        &self,
        client: &VeeamClient,
        id: &str,
    ) -> Result<Option<Value>, ProviderError> {
        match client.get(&self.item_path(id), &[]).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => {
                warn!(kind = self.kind, id, "Object no longer exists");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// PUT a full object. Returns the object when the server echoes it.
    pub async fn put(
        &self,
        client: &VeeamClient,
        id: &str,
        body: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let response = client.put(&self.item_path(id), body).await?;
        Ok(created_object(response))
    }

    /// DELETE one object. A 404 counts as success.
    pub async fn remove(&self, client: &VeeamClient, id: &str) -> Result<(), ProviderError> {
        match client.delete(&self.item_path(id)).await {
            Err(e) if e.is_not_found() => {
                debug!(kind = self.kind, id, "Object already deleted");
                Ok(())
            },
            result => result,
        }
    }

    /// Find an object in the collection after an asynchronous create.
    pub async fn find(
        &self,
        client: &VeeamClient,
        query: &[(String, String)],
        matches: impl Fn(&Value) -> bool,
    ) -> Result<Value, ProviderError> {
        let page = client.list_page(self.collection, query, 0, PAGE_SIZE).await?;
        page.items.into_iter().find(|item| matches(item)).ok_or_else(|| {
            ProviderError::NotFound(format!(
                "{} was accepted by the server but could not be found afterwards",
                self.kind
            ))
        })
    }

    /// Fetch after a write, falling back to the planned state when the
    /// object cannot be re-read.
    pub async fn refresh(
        &self,
        client: &VeeamClient,
        planned: &Value,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let object = self.fetch(client, id).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "{} {} disappeared after it was written",
                self.kind, id
            ))
        })?;
        Ok(self.state(planned, &object))
    }
}

/// The object in a POST/PUT response, unless the response is a session.
///
/// VBR answers long-running infrastructure changes with a session model
/// (`sessionType`), whose `id` is not the object's.
fn created_object(response: Value) -> Option<Value> {
    let has_id = response.get("id").and_then(Value::as_str).is_some_and(|id| !id.is_empty());
    let is_session = response.get("sessionType").is_some();
    (has_id && !is_session).then_some(response)
}

/// Whether an item's string field equals the expected value, ignoring case.
pub fn field_matches(item: &Value, path: &str, expected: &str) -> bool {
    fields::get_path(item, path)
        .and_then(Value::as_str)
        .is_some_and(|actual| actual.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_names_are_unique() {
        let resources: HashSet<_> = resources().map(|r| r.name()).collect();
        assert_eq!(resources.len(), RESOURCES.len());

        let data_sources: HashSet<_> = data_sources().map(|d| d.name).collect();
        assert_eq!(data_sources.len(), DATA_SOURCES.len());
        assert!(resources.is_disjoint(&data_sources));
    }

    #[test]
    fn test_lookup() {
        assert!(resource("veeam_vbr_repository").is_some());
        assert!(resource("veeam_vbr_repositories").is_none());
        assert!(data_source("veeam_azure_subscriptions").is_some());
        assert!(data_source("veeam_azure_repository").is_none());
    }

    #[test]
    fn test_every_resource_has_an_id() {
        for resource in resources() {
            let schema = resource.schema();
            let id = &schema.block.attributes["id"];
            assert!(id.is_computed_only(), "{} id must be computed", resource.name());
        }
    }

    #[test]
    fn test_created_object() {
        assert!(created_object(json!({"id": "r1", "name": "repo"})).is_some());
        assert!(created_object(json!({"id": "s1", "sessionType": "Infrastructure"})).is_none());
        assert!(created_object(json!({"name": "repo"})).is_none());
        assert!(created_object(Value::Null).is_none());
    }

    #[test]
    fn test_state_id() {
        assert_eq!(state_id(&json!({"id": "abc"})).unwrap(), "abc");
        assert!(state_id(&json!({"id": ""})).is_err());
        assert!(state_id(&Value::Null).is_err());
    }

    #[test]
    fn test_field_matches() {
        let item = json!({"name": "Repo-01", "share": {"sharePath": "\\\\nas\\b"}});
        assert!(field_matches(&item, "name", "repo-01"));
        assert!(field_matches(&item, "share.sharePath", "\\\\nas\\b"));
        assert!(!field_matches(&item, "description", "x"));
    }
}
