//! Hemmer provider for Veeam
//!
//! Exposes the REST APIs of Veeam Backup & Replication (VBR) and Veeam
//! Backup for Microsoft Azure as Hemmer resources and data sources.
//!
//! # Overview
//!
//! - **Configuration**: one optional connection block per product, with
//!   `VEEAM_AZURE_*` / `VEEAM_VBR_*` environment fallbacks ([`config`])
//! - **REST clients**: OAuth2 password grant, token caching and list
//!   pagination for both products ([`client`])
//! - **Resources**: Azure repositories and SQL backup policies, VBR
//!   repositories and unstructured data servers ([`resources`])
//! - **Data sources**: read-only list endpoints with filters and paging
//! - **Server**: the `hemmer.provider.v1` gRPC service and handshake
//!   ([`server`])
//!
//! # Running
//!
//! ```no_run
//! use hemmer_provider_veeam::{init_logging, serve, VeeamProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(VeeamProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! Once listening, the provider prints a single line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Logs go to stderr.
//!
//! # Example configuration
//!
//! ```text
//! provider "veeam" {
//!   vbr {
//!     host     = "vbr01.corp.local"
//!     username = "CORP\\svc-hemmer"
//!     password = var.vbr_password
//!   }
//!   azure {
//!     host = "vba.example.com"
//!   }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod fields;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod query;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::VeeamProvider;
pub use schema::{
    Attribute, AttributeFlags, AttributeType, Block, BlockNestingMode, Diagnostic,
    DiagnosticSeverity, NestedBlock, ProviderSchema, Schema,
};
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{check_constraints, validate, Condition, Constraint};
