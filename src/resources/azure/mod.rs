//! Veeam Backup for Microsoft Azure.

mod data_sources;
mod repository;
mod sql_backup_policy;

pub use data_sources::{
    COSMOSDB_ACCOUNTS, REPOSITORIES, RESTORE_POINTS, SERVICE_ACCOUNTS, SQL_DATABASES, SQL_SERVERS,
    STORAGE_ACCOUNTS, SUBSCRIPTIONS,
};
pub use repository::AzureRepository;
pub use sql_backup_policy::SqlBackupPolicy;
