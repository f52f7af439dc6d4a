//! Veeam Backup & Replication.

mod data_sources;
mod repository;
mod unstructured_data_server;

use serde_json::{json, Value};

pub use data_sources::{PROXIES, REPOSITORIES, UNSTRUCTURED_DATA_SERVERS};
pub use repository::VbrRepository;
pub use unstructured_data_server::UnstructuredDataServer;

/// VBR rejects PUT bodies that do not repeat the object id.
fn with_id(mut body: Value, id: &str) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("id".to_string(), json!(id));
    }
    body
}
