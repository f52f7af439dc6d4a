//! REST clients for the Veeam servers.
//!
//! Both products expose an OAuth2 password-grant token endpoint at
//! `/api/oauth2/token` and a JSON REST API under `/api/...`. They differ in
//! the API root, the list envelope, and VBR's mandatory `x-api-version`
//! header, all captured by [`ApiFamily`].

mod auth;
mod http;

pub use auth::{AccessToken, TokenResponse};
pub use http::{Page, VeeamClient};

use crate::config::Settings;
use crate::error::ProviderError;

/// The Veeam product a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFamily {
    /// Veeam Backup for Microsoft Azure.
    Azure,
    /// Veeam Backup & Replication.
    Vbr,
}

/// Query parameter and envelope names used by a family's list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// Name of the offset parameter.
    pub offset_param: &'static str,
    /// Name of the page size parameter.
    pub limit_param: &'static str,
    /// Key of the item array in the response.
    pub items_key: &'static str,
    /// JSON pointer to the total item count in the response.
    pub total_pointer: &'static str,
}

impl ApiFamily {
    /// Path of the OAuth2 token endpoint, relative to the server root.
    pub const TOKEN_PATH: &'static str = "api/oauth2/token";

    /// Human readable product name.
    pub fn product_name(self) -> &'static str {
        match self {
            Self::Azure => "Veeam Backup for Microsoft Azure",
            Self::Vbr => "Veeam Backup & Replication",
        }
    }

    /// Name of the provider configuration block.
    pub fn config_block(self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::Vbr => "vbr",
        }
    }

    /// Prefix of the environment variables used as configuration fallback.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Azure => "VEEAM_AZURE",
            Self::Vbr => "VEEAM_VBR",
        }
    }

    /// Default server port.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Azure => 443,
            Self::Vbr => 9419,
        }
    }

    /// Default API version.
    pub fn default_api_version(self) -> &'static str {
        match self {
            Self::Azure => "v8",
            Self::Vbr => "1.2-rev0",
        }
    }

    /// API root relative to the server root, with a trailing slash.
    ///
    /// VBR versions its API through a header, so its path is fixed.
    pub fn api_root(self, api_version: &str) -> String {
        match self {
            Self::Azure => format!("api/{}/", api_version),
            Self::Vbr => "api/v1/".to_string(),
        }
    }

    /// List pagination conventions.
    pub fn paging(self) -> Paging {
        match self {
            Self::Azure => Paging {
                offset_param: "Offset",
                limit_param: "Limit",
                items_key: "results",
                total_pointer: "/totalCount",
            },
            Self::Vbr => Paging {
                offset_param: "skip",
                limit_param: "limit",
                items_key: "data",
                total_pointer: "/pagination/total",
            },
        }
    }
}

/// The set of configured clients, one per product.
#[derive(Clone, Default)]
pub struct Clients {
    azure: Option<VeeamClient>,
    vbr: Option<VeeamClient>,
}

impl Clients {
    /// Create a client set from already built clients.
    pub fn new(azure: Option<VeeamClient>, vbr: Option<VeeamClient>) -> Self {
        Self { azure, vbr }
    }

    /// Build clients for every configured connection.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        Ok(Self {
            azure: settings.azure.clone().map(VeeamClient::new).transpose()?,
            vbr: settings.vbr.clone().map(VeeamClient::new).transpose()?,
        })
    }

    /// The client for a family, or a configuration error when it is not set up.
    pub fn get(&self, family: ApiFamily) -> Result<&VeeamClient, ProviderError> {
        let client = match family {
            ApiFamily::Azure => self.azure.as_ref(),
            ApiFamily::Vbr => self.vbr.as_ref(),
        };
        client.ok_or_else(|| {
            ProviderError::Configuration(format!(
                "{} is not configured; add a `{}` block to the provider configuration",
                family.product_name(),
                family.config_block()
            ))
        })
    }

    /// The Azure client.
    pub fn azure(&self) -> Result<&VeeamClient, ProviderError> {
        self.get(ApiFamily::Azure)
    }

    /// The VBR client.
    pub fn vbr(&self) -> Result<&VeeamClient, ProviderError> {
        self.get(ApiFamily::Vbr)
    }
}
