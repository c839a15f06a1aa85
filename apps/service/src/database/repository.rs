use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use uuid::Uuid;

use super::models::Stream;
use crate::monitoring::types::{CheckResult, StreamStatus};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Registry trait for abstracting stream storage operations
#[async_trait]
pub trait StreamRegistry: Send + Sync {
    /// Full snapshot of all registered streams.
    async fn list_streams(&self) -> Result<Vec<Stream>>;

    /// Look up a stream by id.
    async fn get_stream(&self, id: Uuid) -> Result<Option<Stream>>;

    /// Register a new stream.
    async fn save_stream(&self, stream: &Stream) -> Result<()>;

    /// Insert a check record, returning the number of rows written.
    ///
    /// A redelivered check (same id) writes zero rows instead of failing,
    /// which keeps at-least-once delivery from corrupting history.
    async fn insert_check(&self, check: &CheckResult) -> Result<u64>;

    /// Update a stream's denormalized status fields after a check.
    ///
    /// `last_online` advances only for online outcomes, `last_outage` for
    /// everything else; `last_check` advances either way.
    async fn update_stream_status(
        &self,
        stream_id: Uuid,
        status: StreamStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Most recent checks for a stream, newest first.
    async fn recent_checks(&self, stream_id: Uuid, limit: usize) -> Result<Vec<CheckResult>>;
}

/// LibSQL-backed registry implementation
pub struct LibsqlRegistry {
    pool: LibsqlPool,
}

impl LibsqlRegistry {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn stream_from_row(row: &libsql::Row) -> Result<Stream> {
    let id: String = row.get(0)?;
    let account_id: String = row.get(2)?;
    let status: Option<String> = row.get(3)?;
    let created_at: i64 = row.get(7)?;

    Ok(Stream {
        id: Uuid::parse_str(&id)?,
        url: row.get(1)?,
        account_id: Uuid::parse_str(&account_id)?,
        status: status.as_deref().map(StreamStatus::parse).unwrap_or(StreamStatus::Unknown),
        last_check: row.get::<Option<i64>>(4)?.and_then(Stream::timestamp_from_i64),
        last_online: row.get::<Option<i64>>(5)?.and_then(Stream::timestamp_from_i64),
        last_outage: row.get::<Option<i64>>(6)?.and_then(Stream::timestamp_from_i64),
        created_at: Stream::timestamp_from_i64(created_at).unwrap_or_default(),
    })
}

const STREAM_COLUMNS: &str =
    "id, url, account_id, status, last_check, last_online, last_outage, created_at";

#[async_trait]
impl StreamRegistry for LibsqlRegistry {
    async fn list_streams(&self) -> Result<Vec<Stream>> {
        let conn = self.get_conn().await?;
        let mut rows =
            conn.query(&format!("SELECT {STREAM_COLUMNS} FROM streams"), ()).await?;

        let mut streams = Vec::new();
        while let Some(row) = rows.next().await? {
            streams.push(stream_from_row(&row)?);
        }

        Ok(streams)
    }

    async fn get_stream(&self, id: Uuid) -> Result<Option<Stream>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {STREAM_COLUMNS} FROM streams WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(stream_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_stream(&self, stream: &Stream) -> Result<()> {
        let conn = self.get_conn().await?;
        let status = match stream.status {
            StreamStatus::Unknown => None,
            other => Some(other.to_string()),
        };

        conn.execute(
            "INSERT INTO streams (id, url, account_id, status, last_check, last_online, last_outage, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                stream.id.to_string(),
                stream.url.clone(),
                stream.account_id.to_string(),
                status,
                stream.last_check.map(|t| t.timestamp()),
                stream.last_online.map(|t| t.timestamp()),
                stream.last_outage.map(|t| t.timestamp()),
                stream.created_at.timestamp()
            ],
        )
        .await?;

        Ok(())
    }

    async fn insert_check(&self, check: &CheckResult) -> Result<u64> {
        let conn = self.get_conn().await?;

        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO checks (id, stream_id, account_id, status, volume_db, completed, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    check.id.to_string(),
                    check.stream_id.to_string(),
                    check.account_id.to_string(),
                    check.status.to_string(),
                    check.volume_db,
                    if check.completed { 1 } else { 0 },
                    check.timestamp.timestamp()
                ],
            )
            .await?;

        Ok(rows)
    }

    async fn update_stream_status(
        &self,
        stream_id: Uuid,
        status: StreamStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.get_conn().await?;
        let timestamp = at.timestamp();

        if status.is_online() {
            conn.execute(
                "UPDATE streams SET status = ?, last_check = ?, last_online = ? WHERE id = ?",
                params![status.to_string(), timestamp, timestamp, stream_id.to_string()],
            )
            .await?;
        } else {
            conn.execute(
                "UPDATE streams SET status = ?, last_check = ?, last_outage = ? WHERE id = ?",
                params![status.to_string(), timestamp, timestamp, stream_id.to_string()],
            )
            .await?;
        }

        Ok(())
    }

    async fn recent_checks(&self, stream_id: Uuid, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, stream_id, account_id, status, volume_db, completed, timestamp
                 FROM checks WHERE stream_id = ? ORDER BY timestamp DESC LIMIT ?",
                params![stream_id.to_string(), limit as i64],
            )
            .await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let stream_id: String = row.get(1)?;
            let account_id: String = row.get(2)?;
            let status: String = row.get(3)?;
            let timestamp: i64 = row.get(6)?;

            checks.push(CheckResult {
                id: Uuid::parse_str(&id)?,
                stream_id: Uuid::parse_str(&stream_id)?,
                account_id: Uuid::parse_str(&account_id)?,
                status: StreamStatus::parse(&status),
                volume_db: row.get::<Option<f64>>(4)?,
                completed: row.get::<i64>(5)? != 0,
                timestamp: Stream::timestamp_from_i64(timestamp).unwrap_or_default(),
            });
        }

        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::build_pool;
    use tempfile::tempdir;

    async fn test_registry() -> (LibsqlRegistry, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("registry.db");
        let pool = build_pool(db_path.to_str().unwrap()).await.unwrap();

        let conn = pool.get().await.unwrap();
        super::super::initialize_database(&conn).await.unwrap();
        drop(conn);

        (LibsqlRegistry::new_from_pool(pool), dir)
    }

    #[tokio::test]
    async fn streams_round_trip_through_the_registry() {
        let (registry, _dir) = test_registry().await;

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        registry.save_stream(&stream).await.unwrap();

        let listed = registry.list_streams().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, stream.id);
        assert_eq!(listed[0].url, stream.url);
        assert_eq!(listed[0].status, StreamStatus::Unknown);
        assert!(listed[0].last_check.is_none());
    }

    #[tokio::test]
    async fn check_insert_reports_rows_written() {
        let (registry, _dir) = test_registry().await;

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        registry.save_stream(&stream).await.unwrap();

        let check = CheckResult::classified(&stream, -12.0, -30.0);
        let rows = registry.insert_check(&check).await.unwrap();
        assert_eq!(rows, 1);

        let recent = registry.recent_checks(stream.id, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, check.id);
        assert_eq!(recent[0].status, StreamStatus::Online);
        assert_eq!(recent[0].volume_db, Some(-12.0));
        assert!(recent[0].completed);
    }

    #[tokio::test]
    async fn online_update_advances_last_online_only() {
        let (registry, _dir) = test_registry().await;

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        registry.save_stream(&stream).await.unwrap();

        let at = Utc::now();
        registry.update_stream_status(stream.id, StreamStatus::Online, at).await.unwrap();

        let updated = registry.get_stream(stream.id).await.unwrap().unwrap();
        assert_eq!(updated.status, StreamStatus::Online);
        assert_eq!(updated.last_check.map(|t| t.timestamp()), Some(at.timestamp()));
        assert_eq!(updated.last_online.map(|t| t.timestamp()), Some(at.timestamp()));
        assert!(updated.last_outage.is_none());
    }

    #[tokio::test]
    async fn down_update_advances_last_outage_only() {
        let (registry, _dir) = test_registry().await;

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        registry.save_stream(&stream).await.unwrap();

        let at = Utc::now();
        registry.update_stream_status(stream.id, StreamStatus::Down, at).await.unwrap();

        let updated = registry.get_stream(stream.id).await.unwrap().unwrap();
        assert_eq!(updated.status, StreamStatus::Down);
        assert_eq!(updated.last_outage.map(|t| t.timestamp()), Some(at.timestamp()));
        assert!(updated.last_online.is_none());
    }
}
