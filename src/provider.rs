//! The Veeam provider: dispatches host requests to the resource and data
//! source registries.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::Clients;
use crate::config::{self, ProviderConfig};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, ListDataSource, Resource};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::{check_constraints, strip_fillers, validate, Constraint};

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Provider for Veeam Backup & Replication and Veeam Backup for Microsoft Azure.
pub struct VeeamProvider {
    clients: RwLock<Option<Clients>>,
    env: EnvLookup,
}

impl Default for VeeamProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VeeamProvider {
    /// A provider that fills unset connection values from the process environment.
    pub fn new() -> Self {
        Self::with_env_lookup(|key| std::env::var(key).ok())
    }

    /// A provider that reads environment fallbacks through `lookup`.
    pub fn with_env_lookup(
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            clients: RwLock::new(None),
            env: Arc::new(lookup),
        }
    }

    async fn clients(&self) -> Result<Clients, ProviderError> {
        self.clients.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition(
                "provider is not configured; Configure must be called first".to_string(),
            )
        })
    }

    fn parse_config(&self, config: &Value) -> Result<ProviderConfig, Vec<Diagnostic>> {
        let parsed = ProviderConfig::from_value(config).map_err(|e| {
            vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
        })?;
        let env = Arc::clone(&self.env);
        Ok(parsed.with_env_from(move |key| env(key)))
    }
}

fn resource(name: &str) -> Result<&'static dyn Resource, ProviderError> {
    resources::resource(name)
        .ok_or_else(|| ProviderError::UnknownResource(format!("Unknown resource type: {}", name)))
}

fn data_source(name: &str) -> Result<&'static ListDataSource, ProviderError> {
    resources::data_source(name)
        .ok_or_else(|| {
            ProviderError::UnknownResource(format!("Unknown data source type: {}", name))
        })
}

/// Schema validation followed by the cross-field rules.
fn check(schema: &Schema, constraints: &[Constraint], config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(schema, config);
    diagnostics.extend(check_constraints(constraints, config));
    diagnostics
}

/// Data source checks: schema, the data source's own rules and the paging bounds.
fn check_data_source(data_source: &ListDataSource, config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = check(&data_source.schema(), data_source.constraints, config);
    diagnostics.extend(check_constraints(data_source.paging_constraints(), config));
    diagnostics
}

/// Turn error diagnostics into a single validation error.
fn ensure_valid(diagnostics: Vec<Diagnostic>) -> Result<(), ProviderError> {
    let errors: Vec<String> = diagnostics
        .into_iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .map(|d| match d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary,
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(errors.join("; ")))
    }
}

#[async_trait]
impl ProviderService for VeeamProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(config::provider_schema());
        let schema = resources::resources().fold(schema, |schema, r| {
            schema.with_resource(r.name(), r.schema())
        });
        resources::data_sources().fold(schema, |schema, d| {
            schema.with_data_source(d.name, d.schema())
        })
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut resource_names: Vec<String> =
            resources::resources().map(|r| r.name().to_string()).collect();
        let mut data_source_names: Vec<String> =
            resources::data_sources().map(|d| d.name.to_string()).collect();
        resource_names.sort();
        data_source_names.sort();
        ProviderMetadata {
            resources: resource_names,
            data_sources: data_source_names,
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&config::provider_schema(), &config);
        if !diagnostics.is_empty() {
            return Ok(diagnostics);
        }

        match self.parse_config(&config).and_then(|c| c.resolve()) {
            Ok(_) => {},
            Err(errors) => diagnostics.extend(errors),
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let settings = match self.parse_config(&config).and_then(|c| c.resolve()) {
            Ok(settings) => settings,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let mut diagnostics = Vec::new();
        for connection in [&settings.azure, &settings.vbr].into_iter().flatten() {
            if connection.insecure_skip_verify {
                diagnostics.push(
                    Diagnostic::warning("TLS certificate verification is disabled")
                        .with_detail(format!(
                            "Connections to {} accept any certificate",
                            connection.base_url
                        ))
                        .with_attribute(format!(
                            "{}.insecure_skip_verify",
                            connection.family.config_block()
                        )),
                );
            }
        }

        let clients = match Clients::from_settings(&settings) {
            Ok(clients) => clients,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("Failed to create Veeam API clients")
                        .with_detail(e.to_string()),
                );
                return Ok(diagnostics);
            },
        };

        *self.clients.write().await = Some(clients);
        info!(
            azure = settings.azure.is_some(),
            vbr = settings.vbr.is_some(),
            "Provider configured"
        );
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.clients.write().await.take();
        debug!("Dropped API clients");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = resource(resource_type)?;
        Ok(check(&resource.schema(), resource.constraints(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = resource(resource_type)?;
        let schema = resource.schema();

        if !proposed_state.is_null() {
            // Zero fillers in a refreshed state were never configured.
            let config = if config.is_null() {
                strip_fillers(&schema.block, &proposed_state)
            } else {
                config
            };
            ensure_valid(check(&schema, resource.constraints(), &config))?;
        }

        Ok(plan::plan(&schema, prior_state.as_ref(), &proposed_state))
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        let clients = self.clients().await?;
        resource.create(&clients, &planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        let clients = self.clients().await?;
        match resource.read(&clients, &current_state).await? {
            Some(state) => Ok(state),
            None => {
                warn!(resource_type, "Removing vanished object from state");
                Ok(Value::Null)
            },
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        let clients = self.clients().await?;
        resource.update(&clients, &prior_state, &planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = resource(resource_type)?;
        let clients = self.clients().await?;
        resource.delete(&clients, &current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = resource(resource_type)?;
        let clients = self.clients().await?;
        let state = resource
            .import(&clients, id)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("{} {} does not exist", resource_type, id))
            })?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = data_source(data_source_type)?;
        Ok(check_data_source(data_source, &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = data_source(data_source_type)?;
        ensure_valid(check_data_source(data_source, &config))?;
        let clients = self.clients().await?;
        data_source.read(&clients, &config).await
    }
}
