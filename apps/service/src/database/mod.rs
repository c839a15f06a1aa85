/// Stream registry persistence layer
///
/// Holds the list of monitored streams and their check history in a
/// LibSQL (SQLite) database shared with the rest of the deployment.
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{LibsqlRegistry, StreamRegistry};

use anyhow::Result;

/// Initialize the registry schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
