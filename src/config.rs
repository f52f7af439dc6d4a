//! Provider configuration.
//!
//! The provider block carries one optional connection block per Veeam
//! product. Any connection value left out of the configuration is read from
//! the environment (`VEEAM_AZURE_*` / `VEEAM_VBR_*`).

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::client::ApiFamily;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};

/// Default request timeout applied to every REST call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for one Veeam REST endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Hostname, `host:port`, or full URL of the server.
    pub host: Option<String>,
    /// TCP port, used when `host` does not carry one.
    pub port: Option<u16>,
    /// User for the OAuth2 password grant.
    pub username: Option<String>,
    /// Password for the OAuth2 password grant.
    pub password: Option<String>,
    /// API version segment (Azure) or `x-api-version` header value (VBR).
    pub api_version: Option<String>,
    /// Accept self-signed server certificates.
    pub insecure_skip_verify: bool,
}

/// Raw provider configuration as sent by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Veeam Backup for Microsoft Azure connection.
    pub azure: Option<ConnectionConfig>,
    /// Veeam Backup & Replication connection.
    pub vbr: Option<ConnectionConfig>,
    /// Per-request timeout in seconds.
    pub request_timeout_seconds: Option<u64>,
}

/// A validated connection, ready to build a client from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Product family this connection talks to.
    pub family: ApiFamily,
    /// Server root, e.g. `https://vba.example.com:443/`.
    pub base_url: Url,
    /// OAuth2 user.
    pub username: String,
    /// OAuth2 password.
    pub password: String,
    /// API version, see [`ConnectionConfig::api_version`].
    pub api_version: String,
    /// Accept self-signed server certificates.
    pub insecure_skip_verify: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Validated provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Azure connection, when configured.
    pub azure: Option<ConnectionSettings>,
    /// VBR connection, when configured.
    pub vbr: Option<ConnectionSettings>,
}

impl ProviderConfig {
    /// Parse the JSON configuration sent by the host. `null` means "no block set".
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
    }

    /// Fill unset values from an arbitrary variable source.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.azure = merge_env(self.azure, ApiFamily::Azure, &lookup);
        self.vbr = merge_env(self.vbr, ApiFamily::Vbr, &lookup);
        self
    }

    /// Check the configuration and resolve defaults.
    ///
    /// Every problem is reported, not just the first.
    pub fn resolve(&self) -> Result<Settings, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let timeout_secs = self.request_timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            diagnostics.push(
                Diagnostic::error("Invalid request timeout")
                    .with_detail("request_timeout_seconds must be greater than zero")
                    .with_attribute("request_timeout_seconds"),
            );
        }
        let timeout = Duration::from_secs(timeout_secs);

        if self.azure.is_none() && self.vbr.is_none() {
            diagnostics.push(
                Diagnostic::error("No Veeam server configured").with_detail(
                    "Configure an `azure` or `vbr` block, or set VEEAM_AZURE_HOST / VEEAM_VBR_HOST",
                ),
            );
        }

        let azure = self
            .azure
            .as_ref()
            .and_then(|c| resolve_connection(c, ApiFamily::Azure, timeout, &mut diagnostics));
        let vbr = self
            .vbr
            .as_ref()
            .and_then(|c| resolve_connection(c, ApiFamily::Vbr, timeout, &mut diagnostics));

        if diagnostics.is_empty() {
            Ok(Settings { azure, vbr })
        } else {
            Err(diagnostics)
        }
    }
}

fn merge_env(
    block: Option<ConnectionConfig>,
    family: ApiFamily,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<ConnectionConfig> {
    let prefix = family.env_prefix();
    let var = |name: &str| lookup(&format!("{}_{}", prefix, name)).filter(|v| !v.is_empty());

    let env_host = var("HOST");
    if block.is_none() && env_host.is_none() {
        return None;
    }

    let mut block = block.unwrap_or_default();
    block.host = block.host.or(env_host);
    block.username = block.username.or_else(|| var("USERNAME"));
    block.password = block.password.or_else(|| var("PASSWORD"));
    Some(block)
}

fn resolve_connection(
    config: &ConnectionConfig,
    family: ApiFamily,
    timeout: Duration,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ConnectionSettings> {
    let block = family.config_block();
    let before = diagnostics.len();

    let mut required = |name: &str, value: &Option<String>| -> String {
        match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None => {
                diagnostics.push(
                    Diagnostic::error(format!("Missing {} {}", block, name))
                        .with_detail(format!(
                            "Set {}.{} or the {}_{} environment variable",
                            block,
                            name,
                            family.env_prefix(),
                            name.to_uppercase()
                        ))
                        .with_attribute(format!("{}.{}", block, name)),
                );
                String::new()
            },
        }
    };

    let host = required("host", &config.host);
    let username = required("username", &config.username);
    let password = required("password", &config.password);

    let port = config.port.unwrap_or(family.default_port());
    if port == 0 {
        diagnostics.push(
            Diagnostic::error("Invalid port")
                .with_detail("port must be between 1 and 65535")
                .with_attribute(format!("{}.port", block)),
        );
    }

    let base_url = if host.is_empty() {
        None
    } else {
        match base_url(&host, port) {
            Ok(url) => Some(url),
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("Invalid host")
                        .with_detail(format!("'{}' is not a valid host or URL: {}", host, e))
                        .with_attribute(format!("{}.host", block)),
                );
                None
            },
        }
    };

    if diagnostics.len() > before {
        return None;
    }

    Some(ConnectionSettings {
        family,
        base_url: base_url?,
        username,
        password,
        api_version: config
            .api_version
            .clone()
            .unwrap_or_else(|| family.default_api_version().to_string()),
        insecure_skip_verify: config.insecure_skip_verify,
        timeout,
    })
}

/// Build the server root URL. A port already present in `host` wins.
pub fn base_url(host: &str, port: u16) -> Result<Url, url::ParseError> {
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    let mut url = Url::parse(&with_scheme)?;
    if url.port().is_none() {
        // set_port only fails for cannot-be-a-base URLs, which parse rejects above
        let _ = url.set_port(Some(port));
    }
    url.set_path("/");
    url.set_query(None);
    Ok(url)
}

fn connection_block(family: ApiFamily) -> NestedBlock {
    let api_version_doc = match family {
        ApiFamily::Azure => "REST API version path segment",
        ApiFamily::Vbr => "Value of the x-api-version header",
    };
    NestedBlock::single(
        Block::new()
            .with_description(format!("Connection to {}", family.product_name()))
            .with_attribute(
                "host",
                Attribute::optional_string().with_description(format!(
                    "Server hostname or URL. Falls back to {}_HOST",
                    family.env_prefix()
                )),
            )
            .with_attribute(
                "port",
                Attribute::optional_int64()
                    .with_description("Server port")
                    .with_default(json!(family.default_port())),
            )
            .with_attribute(
                "username",
                Attribute::optional_string().with_description(format!(
                    "User name. Falls back to {}_USERNAME",
                    family.env_prefix()
                )),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!(
                        "Password. Falls back to {}_PASSWORD",
                        family.env_prefix()
                    )),
            )
            .with_attribute(
                "api_version",
                Attribute::optional_string()
                    .with_description(api_version_doc)
                    .with_default(json!(family.default_api_version())),
            )
            .with_attribute(
                "insecure_skip_verify",
                Attribute::optional_bool()
                    .with_description("Skip TLS certificate verification")
                    .with_default(json!(false)),
            ),
    )
}

/// Schema of the provider configuration block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Veeam Backup for Microsoft Azure and Veeam Backup & Replication")
        .with_block("azure", connection_block(ApiFamily::Azure))
        .with_block("vbr", connection_block(ApiFamily::Vbr))
        .with_attribute(
            "request_timeout_seconds",
            Attribute::optional_int64()
                .with_description("Timeout for each REST request")
                .with_default(json!(DEFAULT_TIMEOUT_SECS)),
        )
}
