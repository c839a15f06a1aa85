use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations.
///
/// This is the single source of truth for the registry schema; other
/// consumers of the database only read it.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Initial streams and checks schema").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Index checks by stream and time").await?;
    }

    tracing::info!("Database migrations completed (now at version {})", SCHEMA_VERSION);
    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, chrono::Utc::now().timestamp(), description],
    )
    .await?;
    Ok(())
}

/// V1: streams registry and check history.
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS streams (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            account_id TEXT NOT NULL,
            status TEXT,
            last_check INTEGER,
            last_online INTEGER,
            last_outage INTEGER,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS checks (
            id TEXT PRIMARY KEY,
            stream_id TEXT NOT NULL REFERENCES streams(id) ON DELETE CASCADE,
            account_id TEXT NOT NULL,
            status TEXT NOT NULL,
            volume_db REAL,
            completed INTEGER NOT NULL,
            timestamp INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    Ok(())
}

/// V2: check history is always read newest-first per stream.
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_checks_stream_time
         ON checks (stream_id, timestamp DESC)",
        (),
    )
    .await?;

    Ok(())
}
