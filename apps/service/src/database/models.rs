use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::StreamStatus;

/// A monitored audio stream endpoint.
///
/// The engine reads `id`/`url`/`account_id` and writes back the rolling
/// status fields after a check. `status` is a denormalized cache of the
/// stream's most recent check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    pub url: String,
    pub account_id: Uuid,
    pub status: StreamStatus,
    pub last_check: Option<DateTime<Utc>>,
    /// Advances only on an online outcome.
    pub last_online: Option<DateTime<Utc>>,
    /// Advances only on a non-online outcome.
    pub last_outage: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Stream {
    /// Create a stream that has never been checked.
    pub fn new(url: String, account_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            account_id,
            status: StreamStatus::Unknown,
            last_check: None,
            last_online: None,
            last_outage: None,
            created_at: Utc::now(),
        }
    }

    /// Convert a stored unix timestamp back to a `DateTime`.
    pub fn timestamp_from_i64(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }
}
